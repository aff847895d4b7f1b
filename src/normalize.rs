//! ブラジル形式の数値文字列の正規化
//!
//! 画面から取得した `R$ 1.234,56` や `1.172 títulos` を数値に変換する。
//! 変換できない値はエラーにせずセンチネル値（`0.0` / `None`）を返す。

/// 通貨記号
const CURRENCY_SYMBOL: &str = "R$";

/// 件数の単位（小文字で比較）
const TITULOS_UNITS: [&str; 4] = ["títulos", "título", "titulos", "titulo"];

/// `R$ 1.234,56` → `1234.56`
///
/// 空文字・数値でない文字列（祝日ラベル等）は `0.0`。
pub fn parse_brl(value: &str) -> f64 {
    let without_symbol = value.replace(CURRENCY_SYMBOL, "");
    let cleaned = without_symbol.trim();
    if cleaned.is_empty() {
        return 0.0;
    }

    let cleaned = cleaned.replace('.', "").replace(',', ".");
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// 値が存在しない場合も `0.0`
pub fn parse_brl_opt(value: Option<&str>) -> f64 {
    value.map(parse_brl).unwrap_or(0.0)
}

/// `1.172 títulos` → `Some(1172)`、`Feriado` → `None`
pub fn parse_titulos(value: &str) -> Option<u64> {
    let (number, unit) = value.trim().split_once(char::is_whitespace)?;

    let unit = unit.trim().to_lowercase();
    if !TITULOS_UNITS.contains(&unit.as_str()) {
        return None;
    }

    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }

    number.replace('.', "").parse().ok()
}

pub fn parse_titulos_opt(value: Option<&str>) -> Option<u64> {
    value.and_then(parse_titulos)
}

/// `CNPJ: 12.345` から `CNPJ:` ラベルを取り除く（大文字小文字は無視）
pub fn strip_label(text: &str, label: &str) -> String {
    let text = text.trim();
    let label = label.trim().trim_end_matches(':');

    match text.get(..label.len()) {
        Some(head) if !label.is_empty() && head.to_lowercase() == label.to_lowercase() => text
            [label.len()..]
            .trim_start_matches(|c: char| c == ':' || c.is_whitespace())
            .trim()
            .to_string(),
        _ => text.to_string(),
    }
}

/// セル文字列の空白（NBSP含む）を取り除く。空なら `None`
pub fn clean_cell(text: &str) -> Option<String> {
    let trimmed = text.trim_matches(|c: char| c.is_whitespace() || c == '\u{a0}');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
