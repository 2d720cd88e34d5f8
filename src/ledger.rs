//! Idempotency ledger (SQLite): which `(number, otp)` pairs have been seen,
//! which were delivered and when, plus the operator error log and the
//! persisted worker status.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlite::State;
use thiserror::Error;
use tracing::info;

use crate::pipeline::OtpEvent;
use crate::worker::WorkerStatus;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlite::Error),

    #[error("ledger lock poisoned")]
    Poisoned,
}

/// Operations the poll worker depends on.
pub trait Ledger: Send + Sync {
    /// `true` if the pair was ever recorded.
    fn exists(&self, number: &str, otp: &str) -> Result<bool, LedgerError>;

    /// `true` if the pair was delivered within `window`.
    fn recently_sent(&self, number: &str, otp: &str, window: Duration)
    -> Result<bool, LedgerError>;

    /// Idempotent existence write; done before relay.
    fn record(&self, event: &OtpEvent) -> Result<(), LedgerError>;

    /// Idempotent delivery write with the current time; done after a
    /// confirmed relay.
    fn mark_sent(&self, number: &str, otp: &str) -> Result<(), LedgerError>;

    /// Drop the existence entry so a failed relay can be retried next tick.
    fn release(&self, number: &str, otp: &str) -> Result<(), LedgerError>;

    fn save_error(&self, message: &str) -> Result<(), LedgerError>;

    fn set_status(&self, status: WorkerStatus) -> Result<(), LedgerError>;

    /// Purge rows older than `age`.  Returns the number of rows removed.
    fn cleanup_older_than(&self, age: Duration) -> Result<usize, LedgerError>;
}

pub struct SqliteLedger {
    conn: Mutex<sqlite::Connection>,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS otps (
    number     TEXT    NOT NULL,
    otp        TEXT    NOT NULL,
    full_msg   TEXT    NOT NULL,
    service    TEXT    NOT NULL,
    country    TEXT    NOT NULL,
    range_info TEXT    NOT NULL DEFAULT '',
    fetched_at INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE (number, otp)
);
CREATE TABLE IF NOT EXISTS sent_otps (
    number  TEXT    NOT NULL,
    otp     TEXT    NOT NULL,
    sent_at INTEGER NOT NULL,
    PRIMARY KEY (number, otp)
);
CREATE TABLE IF NOT EXISTS errors (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    message    TEXT    NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS worker_state (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

fn now_ts() -> i64 {
    Utc::now().timestamp()
}

fn cutoff(age: Duration) -> i64 {
    now_ts().saturating_sub(i64::try_from(age.as_secs()).unwrap_or(i64::MAX))
}

fn fmt_ts(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

impl SqliteLedger {
    /// Open (or create) the ledger and ensure the schema exists.
    pub fn open(path: &str) -> Result<Self, LedgerError> {
        let conn = sqlite::open(path)?;
        conn.execute(SCHEMA)?;
        info!("Ledger opened at {path}");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, LedgerError> {
        Self::open(":memory:")
    }

    fn db(&self) -> Result<MutexGuard<'_, sqlite::Connection>, LedgerError> {
        self.conn.lock().map_err(|_| LedgerError::Poisoned)
    }

    fn pair_exists(
        &self,
        sql: &str,
        number: &str,
        otp: &str,
        extra: Option<i64>,
    ) -> Result<bool, LedgerError> {
        let db = self.db()?;
        let mut stmt = db.prepare(sql)?;
        stmt.bind((1, number))?;
        stmt.bind((2, otp))?;
        if let Some(v) = extra {
            stmt.bind((3, v))?;
        }
        Ok(matches!(stmt.next()?, State::Row))
    }

    /// Delivery write with an explicit timestamp (unix seconds).
    pub fn mark_sent_at(&self, number: &str, otp: &str, sent_at: i64) -> Result<(), LedgerError> {
        let db = self.db()?;
        let mut stmt =
            db.prepare("INSERT OR REPLACE INTO sent_otps (number, otp, sent_at) VALUES (?, ?, ?)")?;
        stmt.bind((1, number))?;
        stmt.bind((2, otp))?;
        stmt.bind((3, sent_at))?;
        stmt.next()?;
        Ok(())
    }

    pub fn count_otps(&self) -> Result<i64, LedgerError> {
        let db = self.db()?;
        let mut stmt = db.prepare("SELECT COUNT(*) FROM otps")?;
        stmt.next()?;
        Ok(stmt.read::<i64, _>(0)?)
    }

    pub fn count_sent(&self) -> Result<i64, LedgerError> {
        let db = self.db()?;
        let mut stmt = db.prepare("SELECT COUNT(*) FROM sent_otps")?;
        stmt.next()?;
        Ok(stmt.read::<i64, _>(0)?)
    }

    /// Forget every stored code and delivery.
    pub fn clear_otps(&self) -> Result<(), LedgerError> {
        let db = self.db()?;
        db.execute("DELETE FROM otps; DELETE FROM sent_otps;")?;
        Ok(())
    }

    /// Most recent errors first, as `(message, formatted time)`.
    pub fn recent_errors(&self, limit: i64) -> Result<Vec<(String, String)>, LedgerError> {
        let db = self.db()?;
        let mut stmt =
            db.prepare("SELECT message, created_at FROM errors ORDER BY id DESC LIMIT ?")?;
        stmt.bind((1, limit))?;
        let mut out = Vec::new();
        while let State::Row = stmt.next()? {
            out.push((
                stmt.read::<String, _>(0)?,
                fmt_ts(stmt.read::<i64, _>(1)?),
            ));
        }
        Ok(out)
    }

    pub fn status(&self) -> Result<WorkerStatus, LedgerError> {
        let db = self.db()?;
        let mut stmt = db.prepare("SELECT value FROM worker_state WHERE key = 'status'")?;
        if let State::Row = stmt.next()? {
            return Ok(WorkerStatus::parse(&stmt.read::<String, _>(0)?));
        }
        Ok(WorkerStatus::Offline)
    }
}

impl Ledger for SqliteLedger {
    fn exists(&self, number: &str, otp: &str) -> Result<bool, LedgerError> {
        self.pair_exists("SELECT 1 FROM otps WHERE number = ? AND otp = ?", number, otp, None)
    }

    fn recently_sent(
        &self,
        number: &str,
        otp: &str,
        window: Duration,
    ) -> Result<bool, LedgerError> {
        self.pair_exists(
            "SELECT 1 FROM sent_otps WHERE number = ? AND otp = ? AND sent_at >= ?",
            number,
            otp,
            Some(cutoff(window)),
        )
    }

    fn record(&self, e: &OtpEvent) -> Result<(), LedgerError> {
        let db = self.db()?;
        let mut stmt = db.prepare(
            "INSERT OR IGNORE INTO otps
                (number, otp, full_msg, service, country, range_info, fetched_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        stmt.bind((1, e.number.as_str()))?;
        stmt.bind((2, e.otp.as_str()))?;
        stmt.bind((3, e.full_message.as_str()))?;
        stmt.bind((4, e.service.as_str()))?;
        stmt.bind((5, e.country.as_str()))?;
        stmt.bind((6, e.range_info.as_str()))?;
        stmt.bind((7, e.fetched_at.timestamp()))?;
        stmt.bind((8, now_ts()))?;
        stmt.next()?;
        Ok(())
    }

    fn mark_sent(&self, number: &str, otp: &str) -> Result<(), LedgerError> {
        self.mark_sent_at(number, otp, now_ts())
    }

    fn release(&self, number: &str, otp: &str) -> Result<(), LedgerError> {
        let db = self.db()?;
        let mut stmt = db.prepare("DELETE FROM otps WHERE number = ? AND otp = ?")?;
        stmt.bind((1, number))?;
        stmt.bind((2, otp))?;
        stmt.next()?;
        Ok(())
    }

    fn save_error(&self, message: &str) -> Result<(), LedgerError> {
        let db = self.db()?;
        let mut stmt = db.prepare("INSERT INTO errors (message, created_at) VALUES (?, ?)")?;
        stmt.bind((1, message))?;
        stmt.bind((2, now_ts()))?;
        stmt.next()?;
        Ok(())
    }

    fn set_status(&self, status: WorkerStatus) -> Result<(), LedgerError> {
        let db = self.db()?;
        let mut stmt = db
            .prepare("INSERT OR REPLACE INTO worker_state (key, value) VALUES ('status', ?)")?;
        stmt.bind((1, status.as_str()))?;
        stmt.next()?;
        Ok(())
    }

    fn cleanup_older_than(&self, age: Duration) -> Result<usize, LedgerError> {
        let before = cutoff(age);
        let db = self.db()?;
        let mut removed = 0;
        for sql in [
            "DELETE FROM otps WHERE created_at < ?",
            "DELETE FROM sent_otps WHERE sent_at < ?",
            "DELETE FROM errors WHERE created_at < ?",
        ] {
            let mut stmt = db.prepare(sql)?;
            stmt.bind((1, before))?;
            stmt.next()?;
            removed += db.change_count();
        }
        if removed > 0 {
            info!("Ledger cleanup removed {removed} rows");
        }
        Ok(removed)
    }
}
