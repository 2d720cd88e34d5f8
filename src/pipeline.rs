//! Turns one raw table row into at most one classified [`OtpEvent`].

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::debug;

use crate::classify::Classifier;
use crate::collaborator::RawRow;
use crate::extract::{self, digits_only};

/// A code ready for the dedup check and relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpEvent {
    /// Receiving phone number, digits only.
    pub number: String,
    pub otp: String,
    pub full_message: String,
    pub service: String,
    pub country: String,
    pub range_info: String,
    pub fetched_at: DateTime<Utc>,
}

/// Status text the portal shows instead of real rows.
const PLACEHOLDER_MARKERS: &[&str] = &["no data", "no records", "loading", "processing"];

static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+[0-9]{1,4}[-.\s]?)?\b[0-9]{10,15}\b").expect("phone regex")
});

/// `true` for empty rows and loading / "no data" indicators.
pub fn is_placeholder_row(row: &RawRow) -> bool {
    let text = row.message_text.trim();
    if text.chars().count() < 5 {
        return true;
    }
    let lower = text.to_lowercase();
    PLACEHOLDER_MARKERS.iter().any(|m| lower.contains(m))
}

/// First phone number in the range column, else in the message body.
pub fn extract_phone(row: &RawRow) -> Option<String> {
    [&row.range_info, &row.message_text]
        .into_iter()
        .find_map(|s| PHONE.find(s))
        .map(|m| digits_only(m.as_str()))
}

/// Extraction → classification for one row.  `None` when the row is a
/// placeholder, carries no phone number, or carries no code.
pub fn build_event(row: &RawRow, classifier: &Classifier, now: DateTime<Utc>) -> Option<OtpEvent> {
    if is_placeholder_row(row) {
        debug!("Placeholder row skipped: {:?}", row.message_text);
        return None;
    }

    let hit = extract::extract_detailed(&row.message_text)?;
    debug!("Matched {} (priority {})", hit.rule, hit.priority);
    let otp = hit.code;

    let Some(number) = extract_phone(row) else {
        debug!("Code {otp} found but row has no phone number – skipping");
        return None;
    };

    Some(OtpEvent {
        service: classifier.detect_service(&row.message_text),
        country: classifier.detect_country(&number, &row.range_info),
        number,
        otp,
        full_message: row.message_text.trim().to_string(),
        range_info: row.range_info.trim().to_string(),
        fetched_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn builds_event_from_row() {
        let row = RawRow::new(
            "EGYPT 201001234567",
            "Your WhatsApp code is 123-456. Do not share.",
        );
        let ev = build_event(&row, &Classifier::standard(), now()).unwrap();
        assert_eq!(ev.number, "201001234567");
        assert_eq!(ev.otp, "123456");
        assert_eq!(ev.service, "WhatsApp");
        assert_eq!(ev.country, "🇪🇬 Egypt");
        assert_eq!(ev.fetched_at, now());
    }

    #[test]
    fn phone_from_message_when_range_has_none() {
        let row = RawRow::new("Range A", "To +234 8031234567: your code 582013");
        assert_eq!(extract_phone(&row).as_deref(), Some("2348031234567"));
    }

    #[test]
    fn row_without_phone_yields_nothing() {
        let row = RawRow::new("Range A", "Your code 582013");
        assert_eq!(build_event(&row, &Classifier::standard(), now()), None);
    }

    #[test]
    fn row_without_code_yields_nothing() {
        let row = RawRow::new("201001234567", "Welcome to the service");
        assert_eq!(build_event(&row, &Classifier::standard(), now()), None);
    }

    #[test]
    fn placeholder_rows() {
        assert!(is_placeholder_row(&RawRow::new("", "")));
        assert!(is_placeholder_row(&RawRow::new("", "abc")));
        assert!(is_placeholder_row(&RawRow::new("", "No data available in table")));
        assert!(is_placeholder_row(&RawRow::new("", "Processing...")));
        assert!(!is_placeholder_row(&RawRow::new("", "Your code 582013")));
    }
}
