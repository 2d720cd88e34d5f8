//! Environment-driven configuration.
//!
//! | Env var | Default |
//! |---|---|
//! | `BOT_TOKEN`, `NOTIFY_CHAT_ID`, `ADMIN_ID` | required |
//! | `TELEGRAM_API_BASE` | `https://api.telegram.org` |
//! | `OWNER_LINK` | unset |
//! | `LEDGER_DB_PATH` | `./otp_ledger.sqlite` |
//! | `LEDGER_RETENTION_HOURS` | `168` |
//! | `FEED_PATH` | `./live_sms.jsonl` |
//! | `MASK_PREFIX_LEN` / `MASK_SUFFIX_LEN` | `3` / `3` |
//! | `TICK_INTERVAL_SECS` | `3` |
//! | `EMPTY_POLL_THRESHOLD` | `5` |
//! | `ERROR_BACKOFF_SECS` | `5` |
//! | `SUPPRESSION_WINDOW_SECS` | required |
//! | `RELAY_RETRY_ON_FAILURE` | `true` |
//! | `CLASSIFIER_TABLES_PATH` | unset |
//! | `REPLAY_INPUT_PATH` | required in replay mode |

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::warn;

use crate::relay::format::MaskCfg;
use crate::worker::PollConfig;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

fn must(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow!("Missing env var {key}"))
}

fn must_parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    must(lookup, key)?
        .parse()
        .with_context(|| format!("{key} has an invalid value"))
}

/// Unset → `default`; unparsable → `default` with a warning.
fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{key}={raw:?} is not valid, using default");
            default
        }),
    }
}

fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    lookup(key)
        .map(|v| {
            let v = v.trim();
            v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes")
        })
        .unwrap_or(default)
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

// ─── Bot ──────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct BotCfg {
    pub token: String,
    pub api_base: String,
    /// Chat receiving OTP notifications.
    pub notify_chat_id: i64,
    /// The single operator; user id and private chat id.
    pub admin_id: i64,
    pub owner_link: Option<String>,
}

impl BotCfg {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            token: must(&lookup, "BOT_TOKEN")?,
            api_base: optional(&lookup, "TELEGRAM_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.into()),
            notify_chat_id: must_parse(&lookup, "NOTIFY_CHAT_ID")?,
            admin_id: must_parse(&lookup, "ADMIN_ID")?,
            owner_link: optional(&lookup, "OWNER_LINK"),
        })
    }
}

// ─── Live ─────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Config {
    pub bot: BotCfg,
    pub ledger_path: String,
    pub feed_path: String,
    pub classifier_tables_path: Option<String>,
    pub mask: MaskCfg,
    pub poll: PollConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bot = BotCfg::from_lookup(&lookup)?;
        let suppression_secs: u64 = must_parse(&lookup, "SUPPRESSION_WINDOW_SECS")?;
        let retention_hours: u64 = parse_or(&lookup, "LEDGER_RETENTION_HOURS", 168);

        Ok(Self {
            bot,
            ledger_path: optional(&lookup, "LEDGER_DB_PATH")
                .unwrap_or_else(|| "./otp_ledger.sqlite".into()),
            feed_path: optional(&lookup, "FEED_PATH").unwrap_or_else(|| "./live_sms.jsonl".into()),
            classifier_tables_path: optional(&lookup, "CLASSIFIER_TABLES_PATH"),
            mask: mask_from(&lookup),
            poll: PollConfig {
                tick_interval: Duration::from_secs(
                    parse_or(&lookup, "TICK_INTERVAL_SECS", 3u64).max(1),
                ),
                error_backoff: Duration::from_secs(parse_or(&lookup, "ERROR_BACKOFF_SECS", 5)),
                empty_poll_threshold: parse_or(&lookup, "EMPTY_POLL_THRESHOLD", 5u32).max(1),
                suppression_window: Duration::from_secs(suppression_secs),
                retry_failed_relays: parse_bool(&lookup, "RELAY_RETRY_ON_FAILURE", true),
                ledger_retention: Duration::from_secs(retention_hours.saturating_mul(3600)),
            },
        })
    }
}

fn mask_from(lookup: &impl Fn(&str) -> Option<String>) -> MaskCfg {
    let d = MaskCfg::default();
    MaskCfg {
        prefix: parse_or(lookup, "MASK_PREFIX_LEN", d.prefix),
        suffix: parse_or(lookup, "MASK_SUFFIX_LEN", d.suffix),
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Config(notify_chat={}, admin={}, ledger={}, feed={}, mask={}/{}, tick={}s, \
             empty_threshold={}, backoff={}s, suppression={}s, retry_failed={}, retention={}h)",
            self.bot.notify_chat_id,
            self.bot.admin_id,
            self.ledger_path,
            self.feed_path,
            self.mask.prefix,
            self.mask.suffix,
            self.poll.tick_interval.as_secs(),
            self.poll.empty_poll_threshold,
            self.poll.error_backoff.as_secs(),
            self.poll.suppression_window.as_secs(),
            self.poll.retry_failed_relays,
            self.poll.ledger_retention.as_secs() / 3600,
        )
    }
}

// ─── Replay ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct ReplayCfg {
    pub input_path: String,
    pub classifier_tables_path: Option<String>,
    pub mask: MaskCfg,
}

impl ReplayCfg {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            input_path: must(&lookup, "REPLAY_INPUT_PATH")?,
            classifier_tables_path: optional(&lookup, "CLASSIFIER_TABLES_PATH"),
            mask: mask_from(&lookup),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const BASE: &[(&str, &str)] = &[
        ("BOT_TOKEN", "123:abc"),
        ("NOTIFY_CHAT_ID", "-1001234"),
        ("ADMIN_ID", "42"),
        ("SUPPRESSION_WINDOW_SECS", "600"),
    ];

    #[test]
    fn defaults_apply() {
        let cfg = Config::from_lookup(env(BASE)).unwrap();
        assert_eq!(cfg.bot.api_base, DEFAULT_API_BASE);
        assert_eq!(cfg.bot.notify_chat_id, -1001234);
        assert_eq!(cfg.bot.owner_link, None);
        assert_eq!(cfg.ledger_path, "./otp_ledger.sqlite");
        assert_eq!(cfg.feed_path, "./live_sms.jsonl");
        assert_eq!(cfg.mask, MaskCfg::default());
        assert_eq!(cfg.poll.tick_interval, Duration::from_secs(3));
        assert_eq!(cfg.poll.error_backoff, Duration::from_secs(5));
        assert_eq!(cfg.poll.empty_poll_threshold, 5);
        assert_eq!(cfg.poll.suppression_window, Duration::from_secs(600));
        assert!(cfg.poll.retry_failed_relays);
        assert_eq!(cfg.poll.ledger_retention, Duration::from_secs(168 * 3600));
    }

    #[test]
    fn suppression_window_is_required() {
        let pairs: Vec<_> = BASE
            .iter()
            .copied()
            .filter(|(k, _)| *k != "SUPPRESSION_WINDOW_SECS")
            .collect();
        let err = Config::from_lookup(env(&pairs)).err().unwrap();
        assert!(err.to_string().contains("SUPPRESSION_WINDOW_SECS"));
    }

    #[test]
    fn bad_chat_id_is_an_error() {
        let mut pairs = BASE.to_vec();
        pairs[1] = ("NOTIFY_CHAT_ID", "group");
        assert!(Config::from_lookup(env(&pairs)).is_err());
    }

    #[test]
    fn overrides_and_bad_values() {
        let mut pairs = BASE.to_vec();
        pairs.extend([
            ("MASK_PREFIX_LEN", "5"),
            ("MASK_SUFFIX_LEN", "2"),
            ("TICK_INTERVAL_SECS", "soon"),
            ("RELAY_RETRY_ON_FAILURE", "no"),
            ("OWNER_LINK", "https://t.me/owner"),
            ("TELEGRAM_API_BASE", "http://localhost:8081"),
        ]);
        let cfg = Config::from_lookup(env(&pairs)).unwrap();
        assert_eq!(cfg.mask, MaskCfg { prefix: 5, suffix: 2 });
        assert_eq!(cfg.poll.tick_interval, Duration::from_secs(3));
        assert!(!cfg.poll.retry_failed_relays);
        assert_eq!(cfg.bot.owner_link.as_deref(), Some("https://t.me/owner"));
        assert_eq!(cfg.bot.api_base, "http://localhost:8081");
    }

    #[test]
    fn extreme_intervals_are_clamped() {
        let mut pairs = BASE.to_vec();
        pairs.extend([
            ("TICK_INTERVAL_SECS", "0"),
            ("LEDGER_RETENTION_HOURS", "18446744073709551615"),
        ]);
        let cfg = Config::from_lookup(env(&pairs)).unwrap();
        assert_eq!(cfg.poll.tick_interval, Duration::from_secs(1));
        assert_eq!(cfg.poll.ledger_retention, Duration::from_secs(u64::MAX));
    }

    #[test]
    fn display_hides_token() {
        let cfg = Config::from_lookup(env(BASE)).unwrap();
        let shown = cfg.to_string();
        assert!(shown.contains("suppression=600s"));
        assert!(!shown.contains("123:abc"));
    }

    #[test]
    fn replay_needs_only_input() {
        let cfg = ReplayCfg::from_lookup(env(&[("REPLAY_INPUT_PATH", "dump.jsonl")])).unwrap();
        assert_eq!(cfg.input_path, "dump.jsonl");
        assert!(ReplayCfg::from_lookup(env(&[])).is_err());
    }
}
