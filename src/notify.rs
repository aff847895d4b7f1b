//! WhatsApp通知（Evolution API）

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{error, info};

use crate::auditoria::AuditResult;
use crate::cursor::ChangeStatus;
use crate::error::ScraperError;

const SEND_TEXT_PATH: &str = "message/sendText";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Evolution API の接続設定
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub api_url: String,
    pub api_key: String,
    pub instance: String,
    /// 送信前の入力中表示（ミリ秒）
    pub delay_ms: Option<u64>,
    pub link_preview: Option<bool>,
}

impl NotifierConfig {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        instance: impl Into<String>,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            instance: instance.into(),
            delay_ms: None,
            link_preview: None,
        }
    }

    /// `EVOLUTION_API_URL` / `EVOLUTION_API_KEY` / `EVOLUTION_INSTANCE`
    pub fn from_env() -> Result<Self, ScraperError> {
        let var = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ScraperError::Config(format!("{} が設定されていません", name)))
        };
        Ok(Self::new(
            var("EVOLUTION_API_URL")?,
            var("EVOLUTION_API_KEY")?,
            var("EVOLUTION_INSTANCE")?,
        ))
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }

    pub fn with_link_preview(mut self, link_preview: bool) -> Self {
        self.link_preview = Some(link_preview);
        self
    }

    pub fn send_text_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.api_url.trim_end_matches('/'),
            SEND_TEXT_PATH,
            self.instance
        )
    }
}

#[derive(Debug, Serialize)]
struct SendTextPayload<'a> {
    number: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    delay: Option<u64>,
    #[serde(rename = "linkPreview", skip_serializing_if = "Option::is_none")]
    link_preview: Option<bool>,
}

pub struct WhatsAppNotifier {
    client: Client,
    config: NotifierConfig,
}

impl WhatsAppNotifier {
    pub fn new(config: NotifierConfig) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, config })
    }

    /// テキストメッセージを送信。2xx以外はレスポンス本文付きのエラー（リトライなし）
    pub async fn send_text(&self, number: &str, text: &str) -> Result<(), ScraperError> {
        if number.trim().is_empty() {
            return Err(ScraperError::Config("送信先が設定されていません".into()));
        }

        let payload = SendTextPayload {
            number,
            text,
            delay: self.config.delay_ms,
            link_preview: self.config.link_preview,
        };

        info!("Sending WhatsApp message to {} ({} chars)", number, text.len());
        let response = self
            .client
            .post(self.config.send_text_url())
            .header("apikey", &self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!("WhatsApp request failed: {}", e);
                ScraperError::Http(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("WhatsApp send failed: status={}, body={}", status, body);
            return Err(ScraperError::Notify {
                status: status.as_u16(),
                body,
            });
        }

        info!("WhatsApp message sent: status={}", status);
        Ok(())
    }
}

/// 監査フォームの新着メッセージ。変更なしなら `None`
pub fn audit_message(result: &AuditResult) -> Option<String> {
    match result.report.status {
        ChangeStatus::Changed => {
            let details = result
                .report
                .detail
                .as_ref()
                .map(|d| {
                    d.iter()
                        .map(|(k, v)| format!("*{}:* {}", k, v))
                        .collect::<Vec<_>>()
                        .join("\n")
                })
                .unwrap_or_default();
            Some(format!(
                "⚠️ *NOVA AUDITORIA DETECTADA!* ⚠️\n\n📄 *{}*\n\n{}",
                result.report.current, details
            ))
        }
        ChangeStatus::FirstSeen => Some(format!(
            "✅ *Monitoramento VIDIBR Iniciado*\n\n🆕 Primeiro: *{}*\n📋 Total: {}",
            result.report.current, result.total_forms
        )),
        ChangeStatus::Unchanged => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::ChangeReport;
    use crate::record::ScrapedRecord;
    use std::io::Read;
    use std::sync::mpsc;
    use std::thread;

    /// 1リクエストだけ受けて (path, apikey, body) を返すスタブ
    fn spawn_stub(status: u16, body: &'static str) -> (String, mpsc::Receiver<(String, String, String)>) {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start stub server");
        let base_url = format!("http://{}", server.server_addr());
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            if let Ok(mut request) = server.recv() {
                let mut received = String::new();
                let _ = request.as_reader().read_to_string(&mut received);
                let apikey = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("apikey"))
                    .map(|h| h.value.to_string())
                    .unwrap_or_default();
                let _ = tx.send((request.url().to_string(), apikey, received));
                let _ = request
                    .respond(tiny_http::Response::from_string(body).with_status_code(status));
            }
        });

        (base_url, rx)
    }

    fn audit_result(status: ChangeStatus, detail: Option<ScrapedRecord>) -> AuditResult {
        AuditResult {
            total_forms: 3,
            report: ChangeReport {
                status,
                current: "Auditoria Março".into(),
                previous: None,
                detail,
                persisted: true,
            },
        }
    }

    #[tokio::test]
    async fn test_send_text_posts_payload() {
        let (base_url, rx) = spawn_stub(201, r#"{"key":"ok"}"#);
        let config = NotifierConfig::new(format!("{}/", base_url), "secret", "loja1")
            .with_delay_ms(2000)
            .with_link_preview(false);
        let notifier = WhatsAppNotifier::new(config).unwrap();

        notifier.send_text("5511999999999", "Olá").await.unwrap();

        let (path, apikey, body) = rx.recv().unwrap();
        assert_eq!(path, "/message/sendText/loja1");
        assert_eq!(apikey, "secret");
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["number"], "5511999999999");
        assert_eq!(json["text"], "Olá");
        assert_eq!(json["delay"], 2000);
        assert_eq!(json["linkPreview"], false);
    }

    #[tokio::test]
    async fn test_send_text_error_keeps_body() {
        let (base_url, _rx) = spawn_stub(401, "invalid apikey");
        let notifier = WhatsAppNotifier::new(NotifierConfig::new(base_url, "bad", "x")).unwrap();

        let err = notifier.send_text("123", "oi").await.unwrap_err();

        match err {
            ScraperError::Notify { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid apikey");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_send_text_url() {
        let config = NotifierConfig::new("https://evo.example.com/", "k", "inst");
        assert_eq!(
            config.send_text_url(),
            "https://evo.example.com/message/sendText/inst"
        );
    }

    #[test]
    fn test_audit_message_changed_lists_details() {
        let detail: ScrapedRecord = vec![("Loja", "Centro"), ("Situação", "Concluída")]
            .into_iter()
            .collect();
        let msg = audit_message(&audit_result(ChangeStatus::Changed, Some(detail))).unwrap();

        assert!(msg.contains("NOVA AUDITORIA"));
        assert!(msg.contains("*Auditoria Março*"));
        assert!(msg.contains("*Loja:* Centro\n*Situação:* Concluída"));
    }

    #[test]
    fn test_audit_message_first_and_unchanged() {
        let msg = audit_message(&audit_result(ChangeStatus::FirstSeen, None)).unwrap();
        assert!(msg.contains("Primeiro: *Auditoria Março*"));
        assert!(msg.contains("Total: 3"));

        assert!(audit_message(&audit_result(ChangeStatus::Unchanged, None)).is_none());
    }
}
