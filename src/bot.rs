//! Operator bot: long-poll loop and the admin command set.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::ledger::{LedgerError, SqliteLedger};
use crate::relay::{Relay, TelegramRelay};
use crate::worker::{StartOutcome, StopOutcome, WorkerControl};

const ERRORS_SHOWN: i64 = 20;

// ---------------------------------------------------------------------------
// Bot API types (getUpdates)
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct GetUpdatesResponse {
    ok: bool,
    result: Vec<TgUpdate>,
}

#[derive(Deserialize)]
struct TgUpdate {
    update_id: i64,
    message: Option<TgMessage>,
}

#[derive(Deserialize)]
struct TgMessage {
    chat: TgChat,
    from: Option<TgUser>,
    text: Option<String>,
}

#[derive(Deserialize)]
struct TgChat {
    id: i64,
}

#[derive(Deserialize)]
struct TgUser {
    id: i64,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Thin command layer over the worker supervisor and the ledger.
pub struct OperatorBot {
    relay: TelegramRelay,
    admin_id: i64,
    control: Arc<WorkerControl>,
    ledger: Arc<SqliteLedger>,
}

fn ledger_failure(e: LedgerError) -> String {
    warn!("Ledger query failed: {e}");
    format!("❌ Ledger error: {}", html_escape::encode_text(&e.to_string()))
}

impl OperatorBot {
    pub fn new(
        relay: TelegramRelay,
        admin_id: i64,
        control: Arc<WorkerControl>,
        ledger: Arc<SqliteLedger>,
    ) -> Self {
        Self {
            relay,
            admin_id,
            control,
            ledger,
        }
    }

    /// Reply (HTML) for one incoming text, or `None` when it is not a command.
    pub async fn handle_command(&self, from_id: i64, text: &str) -> Option<String> {
        // Strip optional @BotName suffix (e.g. /status@MyBot)
        let cmd = text.trim().split('@').next().unwrap_or("").trim();
        if !matches!(
            cmd,
            "/start" | "/on" | "/off" | "/status" | "/check" | "/clear" | "/errors" | "/relogin"
        ) {
            return None;
        }
        if from_id != self.admin_id {
            info!("Rejected {cmd} from user_id={from_id}");
            return Some("⛔ No permission.".into());
        }

        let reply = match cmd {
            "/start" => self.menu(),
            "/on" => match self.control.start().await {
                Ok(StartOutcome::Started) => "✅ Live SMS Worker started!".into(),
                Ok(StartOutcome::AlreadyRunning) => {
                    "ℹ️ Live SMS Worker is already running.".into()
                }
                Err(e) => format!(
                    "❌ Could not start worker: {}",
                    html_escape::encode_text(&e.to_string())
                ),
            },
            "/off" => match self.control.stop().await {
                StopOutcome::Stopped(summary) => {
                    info!("Worker stopped by operator ({summary})");
                    "🛑 Live SMS Worker stopped.".into()
                }
                StopOutcome::NotRunning => "ℹ️ Live SMS Worker is not running.".into(),
            },
            "/status" => self.status(),
            "/check" => match self.ledger.count_otps() {
                Ok(n) => format!("Stored OTPs: <b>{n}</b>"),
                Err(e) => ledger_failure(e),
            },
            "/clear" => match self.ledger.clear_otps() {
                Ok(()) => "🗑 OTP DB cleared.".into(),
                Err(e) => ledger_failure(e),
            },
            "/errors" => self.errors(),
            "/relogin" => {
                if self.control.is_running().await {
                    self.control.request_resync();
                    "🔄 Resync requested, it runs on the next tick.".into()
                } else {
                    "🔄 Worker is not running. A fresh session is opened on /on.".into()
                }
            }
            _ => return None,
        };
        Some(reply)
    }

    fn menu(&self) -> String {
        let status = self
            .ledger
            .status()
            .map(|s| s.to_string())
            .unwrap_or_else(|_| "?".into());
        let stored = self
            .ledger
            .count_otps()
            .map(|n| n.to_string())
            .unwrap_or_else(|_| "?".into());
        format!(
            "⚙️ <b>Live SMS OTP Receiver</b>\n\
             Status: <b>{status}</b>\n\
             Stored OTPs: <b>{stored}</b>\n\
             Current position: <b>{}</b>\n\n\
             /on – start worker\n\
             /off – stop worker\n\
             /status – worker status\n\
             /check – stored OTP count\n\
             /clear – clear stored OTPs\n\
             /errors – recent errors\n\
             /relogin – resync the live view",
            self.control.shared().position()
        )
    }

    fn status(&self) -> String {
        let shared = self.control.shared();
        let persisted = match self.ledger.status() {
            Ok(s) => s.to_string(),
            Err(e) => return ledger_failure(e),
        };
        let (stored, delivered) = match (self.ledger.count_otps(), self.ledger.count_sent()) {
            (Ok(stored), Ok(delivered)) => (stored, delivered),
            (Err(e), _) | (_, Err(e)) => return ledger_failure(e),
        };
        format!(
            "📡 Status: <b>{persisted}</b>\n\
             ⚙️ Worker: <b>{}</b>\n\
             📄 Position: <b>{}</b>\n\
             📥 Stored OTPs: <b>{stored}</b>\n\
             📨 Delivered (retained): <b>{delivered}</b>\n\
             📤 Relayed this run: <b>{}</b>",
            self.control.state(),
            shared.position(),
            shared.relayed()
        )
    }

    fn errors(&self) -> String {
        match self.ledger.recent_errors(ERRORS_SHOWN) {
            Ok(rows) if rows.is_empty() => "✅ No errors recorded.".into(),
            Ok(rows) => {
                let text = rows
                    .iter()
                    .map(|(msg, at)| format!("{at} – {}", html_escape::encode_text(msg)))
                    .collect::<Vec<_>>()
                    .join("\n\n");
                format!("<b>Recent Errors</b>:\n\n{text}")
            }
            Err(e) => ledger_failure(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Long-poll loop
// ---------------------------------------------------------------------------

/// Runs forever: polls `getUpdates` and answers operator commands.
pub async fn run_bot_polling(bot: Arc<OperatorBot>) {
    let mut offset: i64 = 0;
    info!("Bot long-poll loop started.");

    loop {
        let url = format!(
            "{}?timeout=30&offset={offset}&allowed_updates=[\"message\"]",
            bot.relay.method_url("getUpdates")
        );

        let resp = match tokio::time::timeout(
            Duration::from_secs(40),
            bot.relay.http().get(&url).send(),
        )
        .await
        {
            Ok(Ok(r)) => r,
            Ok(Err(e)) => {
                warn!("getUpdates HTTP error: {e}");
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
            Err(_elapsed) => {
                warn!("getUpdates request timed out locally – retrying");
                continue;
            }
        };

        let updates: GetUpdatesResponse = match resp.json().await {
            Ok(u) => u,
            Err(e) => {
                warn!("Failed to deserialize getUpdates response: {e}");
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
        };

        if !updates.ok {
            warn!("getUpdates returned ok=false");
            tokio::time::sleep(Duration::from_secs(5)).await;
            continue;
        }

        for update in updates.result {
            offset = update.update_id + 1;

            let Some(msg) = update.message else {
                continue;
            };
            let chat_id = msg.chat.id;
            let from_id = msg.from.map(|u| u.id).unwrap_or(chat_id);
            let text = msg.text.unwrap_or_default();

            if let Some(reply) = bot.handle_command(from_id, &text).await {
                if let Err(e) = bot.relay.send(chat_id, &reply, None).await {
                    warn!("Failed to reply to chat_id={chat_id}: {e}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use reqwest::Client as HttpClient;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::classify::Classifier;
    use crate::collaborator::feed_file;
    use crate::ledger::Ledger;
    use crate::relay::Notifier;
    use crate::relay::format::MaskCfg;
    use crate::worker::{PollConfig, Poller, WorkerState};

    const ADMIN: i64 = 42;

    struct Fixture {
        bot: OperatorBot,
        ledger: Arc<SqliteLedger>,
        _server: MockServer,
        _feed: tempfile::NamedTempFile,
    }

    async fn fixture() -> Fixture {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
            .mount(&server)
            .await;

        let mut feed = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            feed,
            r#"{{"range_info":"EGYPT 201001234567","message_text":"Your WhatsApp code is 482-913. Do not share."}}"#
        )
        .unwrap();

        let relay = TelegramRelay::new(HttpClient::new(), server.uri(), "TOKEN");
        let ledger = Arc::new(SqliteLedger::open_in_memory().unwrap());
        let notifier = Notifier::new(Arc::new(relay.clone()), ledger.clone(), -100, ADMIN);
        let poller = Poller::new(
            Arc::new(Classifier::standard()),
            ledger.clone(),
            Arc::new(notifier),
            MaskCfg::default(),
            PollConfig {
                tick_interval: Duration::from_millis(10),
                error_backoff: Duration::from_millis(10),
                empty_poll_threshold: 5,
                suppression_window: Duration::from_secs(600),
                retry_failed_relays: true,
                ledger_retention: Duration::from_secs(3600),
            },
        );
        let feed_path = feed.path().to_path_buf();
        let control = WorkerControl::new(
            Arc::new(poller),
            Box::new(move || feed_file::spawn(&feed_path)),
        );

        Fixture {
            bot: OperatorBot::new(relay, ADMIN, Arc::new(control), ledger.clone()),
            ledger,
            _server: server,
            _feed: feed,
        }
    }

    #[tokio::test]
    async fn non_admin_is_rejected() {
        let f = fixture().await;
        assert_eq!(
            f.bot.handle_command(7, "/clear").await.as_deref(),
            Some("⛔ No permission.")
        );
        assert_eq!(f.bot.handle_command(7, "hello").await, None);
    }

    #[tokio::test]
    async fn unknown_text_is_ignored() {
        let f = fixture().await;
        assert_eq!(f.bot.handle_command(ADMIN, "/subscribe").await, None);
        assert_eq!(f.bot.handle_command(ADMIN, "just chatting").await, None);
    }

    #[tokio::test]
    async fn errors_listed_newest_first_and_escaped() {
        let f = fixture().await;
        assert_eq!(
            f.bot.handle_command(ADMIN, "/errors").await.as_deref(),
            Some("✅ No errors recorded.")
        );

        f.ledger.save_error("first").unwrap();
        f.ledger.save_error("bad <tag>").unwrap();
        let reply = f.bot.handle_command(ADMIN, "/errors").await.unwrap();
        assert!(reply.starts_with("<b>Recent Errors</b>"));
        let second = reply.find("bad &lt;tag&gt;").unwrap();
        let first = reply.find("first").unwrap();
        assert!(second < first);
    }

    #[tokio::test]
    async fn worker_lifecycle_through_commands() {
        let f = fixture().await;

        assert_eq!(
            f.bot.handle_command(ADMIN, "/off").await.as_deref(),
            Some("ℹ️ Live SMS Worker is not running.")
        );
        assert_eq!(
            f.bot.handle_command(ADMIN, "/on@OtpBot").await.as_deref(),
            Some("✅ Live SMS Worker started!")
        );
        assert_eq!(
            f.bot.handle_command(ADMIN, "/on").await.as_deref(),
            Some("ℹ️ Live SMS Worker is already running.")
        );

        for _ in 0..200 {
            if f.ledger.count_sent().unwrap() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(
            f.bot.handle_command(ADMIN, "/check").await.as_deref(),
            Some("Stored OTPs: <b>1</b>")
        );
        let status = f.bot.handle_command(ADMIN, "/status").await.unwrap();
        assert!(status.contains("Status: <b>online</b>"));
        assert!(status.contains("Relayed this run: <b>1</b>"));

        assert!(
            f.bot
                .handle_command(ADMIN, "/relogin")
                .await
                .unwrap()
                .contains("Resync requested")
        );
        assert_eq!(
            f.bot.handle_command(ADMIN, "/off").await.as_deref(),
            Some("🛑 Live SMS Worker stopped.")
        );
        assert_eq!(f.bot.control.state(), WorkerState::Stopped);
        assert_eq!(f.ledger.status().unwrap().as_str(), "offline");

        assert_eq!(
            f.bot.handle_command(ADMIN, "/clear").await.as_deref(),
            Some("🗑 OTP DB cleared.")
        );
        assert_eq!(f.ledger.count_otps().unwrap(), 0);
    }

    #[tokio::test]
    async fn menu_shows_counts() {
        let f = fixture().await;
        let menu = f.bot.handle_command(ADMIN, "/start").await.unwrap();
        assert!(menu.contains("Status: <b>offline</b>"));
        assert!(menu.contains("Stored OTPs: <b>0</b>"));
        assert!(menu.contains("/relogin"));
        f.ledger.set_status(crate::worker::WorkerStatus::Online).unwrap();
        let menu = f.bot.handle_command(ADMIN, "/start").await.unwrap();
        assert!(menu.contains("Status: <b>online</b>"));
    }
}
