//! Notification delivery: Bot API client, and the [`Notifier`] that wraps it
//! with error reporting so failures never propagate past the relay.
pub mod format;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::ledger::Ledger;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sendMessage failed: {status} body={body}")]
    Rejected { status: StatusCode, body: String },
}

/// Inline URL button shown under a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkButton {
    pub text: String,
    pub url: String,
}

/// Something that can put an HTML message into a chat.
#[async_trait]
pub trait Relay: Send + Sync {
    async fn send(
        &self,
        chat_id: i64,
        html: &str,
        button: Option<&LinkButton>,
    ) -> Result<(), RelayError>;
}

// ---------------------------------------------------------------------------
// Bot API client
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SendMessagePayload<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboard<'a>>,
}

#[derive(Serialize)]
struct InlineKeyboard<'a> {
    inline_keyboard: Vec<Vec<InlineButton<'a>>>,
}

#[derive(Serialize)]
struct InlineButton<'a> {
    text: &'a str,
    url: &'a str,
}

const SEND_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct TelegramRelay {
    http: HttpClient,
    api_base: String,
    token: String,
}

impl TelegramRelay {
    pub fn new(http: HttpClient, api_base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// `{api_base}/bot{token}/{method}`
    pub fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token)
    }
}

#[async_trait]
impl Relay for TelegramRelay {
    async fn send(
        &self,
        chat_id: i64,
        html: &str,
        button: Option<&LinkButton>,
    ) -> Result<(), RelayError> {
        let body = SendMessagePayload {
            chat_id,
            text: html,
            parse_mode: "HTML",
            disable_web_page_preview: true,
            reply_markup: button.map(|b| InlineKeyboard {
                inline_keyboard: vec![vec![InlineButton {
                    text: &b.text,
                    url: &b.url,
                }]],
            }),
        };
        let resp = self
            .http
            .post(self.method_url("sendMessage"))
            .timeout(SEND_TIMEOUT)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RelayError::Rejected { status, body });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Delivers notifications to the target chat and reports failures to the
/// operator chat and the ledger's error log.
pub struct Notifier {
    relay: Arc<dyn Relay>,
    ledger: Arc<dyn Ledger>,
    target_chat: i64,
    operator_chat: i64,
    button: Option<LinkButton>,
}

impl Notifier {
    pub fn new(
        relay: Arc<dyn Relay>,
        ledger: Arc<dyn Ledger>,
        target_chat: i64,
        operator_chat: i64,
    ) -> Self {
        Self {
            relay,
            ledger,
            target_chat,
            operator_chat,
            button: None,
        }
    }

    pub fn with_button(mut self, button: Option<LinkButton>) -> Self {
        self.button = button;
        self
    }

    /// Send a rendered notification.  Never fails: errors are logged,
    /// persisted and reported to the operator, and `false` is returned.
    pub async fn deliver(&self, rendered: &str) -> bool {
        match self
            .relay
            .send(self.target_chat, rendered, self.button.as_ref())
            .await
        {
            Ok(()) => {
                info!("Notification delivered to chat_id={}", self.target_chat);
                true
            }
            Err(e) => {
                error!("Failed to relay notification: {e}");
                if let Err(le) = self
                    .ledger
                    .save_error(&format!("Failed to forward message to group: {e}"))
                {
                    warn!("Could not persist relay error: {le}");
                }
                self.notify_operator(&format!(
                    "❌ Failed to forward message: {}",
                    html_escape::encode_text(&e.to_string())
                ))
                .await;
                false
            }
        }
    }

    /// Best-effort message to the operator.
    pub async fn notify_operator(&self, html: &str) {
        if let Err(e) = self.relay.send(self.operator_chat, html, None).await {
            warn!("Failed to notify operator: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::SqliteLedger;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn send_posts_html_with_button() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .and(body_string_contains(r#""parse_mode":"HTML""#))
            .and(body_string_contains(r#""url":"https://t.me/owner""#))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
            .expect(1)
            .mount(&server)
            .await;

        let relay = TelegramRelay::new(HttpClient::new(), server.uri(), "TOKEN");
        let button = LinkButton {
            text: "Owner".into(),
            url: "https://t.me/owner".into(),
        };
        relay.send(-100, "<b>hi</b>", Some(&button)).await.unwrap();

        server.verify().await;
    }

    #[tokio::test]
    async fn send_reports_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("chat not found"))
            .mount(&server)
            .await;

        let relay = TelegramRelay::new(HttpClient::new(), server.uri(), "TOKEN");
        let err = relay.send(-100, "hi", None).await.unwrap_err();
        match err {
            RelayError::Rejected { status, body } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(body, "chat not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn deliver_failure_is_contained_and_reported() {
        let server = MockServer::start().await;
        // Group chat rejected, operator chat accepted.
        Mock::given(method("POST"))
            .and(body_string_contains(r#""chat_id":-100"#))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains(r#""chat_id":42"#))
            .and(body_string_contains("Failed to forward"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let ledger = Arc::new(SqliteLedger::open_in_memory().unwrap());
        let relay = Arc::new(TelegramRelay::new(HttpClient::new(), server.uri(), "TOKEN"));
        let notifier = Notifier::new(relay, ledger.clone(), -100, 42);

        assert!(!notifier.deliver("<b>code</b>").await);
        assert_eq!(ledger.recent_errors(10).unwrap().len(), 1);

        server.verify().await;
    }
}
