//! 抽出レコード（フィールド名 → テキスト、挿入順を保持）

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 値が取得できなかったフィールドのマーカー
pub const NOT_AVAILABLE: &str = "N/E";

/// 1画面単位（カレンダー日、詳細ページ、テーブル行）の抽出結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapedRecord {
    fields: Vec<(String, String)>,
}

impl ScrapedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// 既存キーは同じ位置で上書き
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((key, value)),
        }
    }

    /// 値が空なら `NOT_AVAILABLE` を入れる
    pub fn insert_or_missing(&mut self, key: impl Into<String>, value: Option<String>) {
        let value = value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        self.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_missing(&self, key: &str) -> bool {
        self.get(key).map_or(true, |v| v == NOT_AVAILABLE)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ScrapedRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl Serialize for ScrapedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ScrapedRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = ScrapedRecord;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of field name to text")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut record = ScrapedRecord::new();
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    record.insert(k, v);
                }
                Ok(record)
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_order_and_replaces_in_place() {
        let mut record = ScrapedRecord::new();
        record.insert("Loja", "Centro");
        record.insert("CNPJ", "123");
        record.insert("Loja", "Norte");

        let keys: Vec<&str> = record.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Loja", "CNPJ"]);
        assert_eq!(record.get("Loja"), Some("Norte"));
    }

    #[test]
    fn test_missing_marker() {
        let mut record = ScrapedRecord::new();
        record.insert_or_missing("Período", Some("  ".to_string()));
        record.insert_or_missing("Situação", None);
        record.insert_or_missing("CNPJ", Some(" 1 ".to_string()));

        assert_eq!(record.get("Período"), Some(NOT_AVAILABLE));
        assert!(record.is_missing("Situação"));
        assert!(record.is_missing("desconhecido"));
        assert_eq!(record.get("CNPJ"), Some("1"));
    }

    #[test]
    fn test_serialize_in_insertion_order() {
        let record: ScrapedRecord = vec![("z", "1"), ("a", "2")].into_iter().collect();
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"z":"1","a":"2"}"#);
    }

    #[test]
    fn test_deserialize_keeps_order() {
        let record: ScrapedRecord =
            serde_json::from_str(r#"{"Loja":"Centro","CNPJ":"1","Data da Visita":"N/E"}"#)
                .unwrap();
        let keys: Vec<&str> = record.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Loja", "CNPJ", "Data da Visita"]);
        assert!(record.is_missing("Data da Visita"));
    }
}
