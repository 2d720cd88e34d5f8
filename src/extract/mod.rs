//! Verification-code extraction from noisy, multilingual SMS text.
//!
//! The engine is an ordered cascade of independent rules.  Each rule either
//! accepts the text and yields a code, or passes.  The first accepting rule
//! wins; when nothing matches the message simply carries no code.
//!
//! Handles **English, Arabic and Russian** message bodies.  Arabic-Indic
//! digits are folded to ASCII before any rule runs, so codes are always
//! plain `0-9` strings.
pub mod rules;

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::extract::rules::{BareSixDigit, Contextual, LabeledGrouped, SecondaryLanguage};

/// One rule of the cascade.
pub trait ExtractRule: Send + Sync {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    /// Cascade priority, 1 = tried first.
    fn priority(&self) -> u8;

    /// Return the code this rule finds in `text`, if any.  `text` has
    /// already been through [`prepare`].
    fn try_match(&self, text: &str) -> Option<String>;
}

/// A successful extraction together with the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub code: String,
    pub priority: u8,
    pub rule: &'static str,
}

/// Ordered list of rules, sorted by priority at construction.
pub struct Cascade {
    rules: Vec<Box<dyn ExtractRule>>,
}

impl Cascade {
    /// The production rule set.
    pub fn standard() -> Self {
        Self::with_rules(vec![
            Box::new(LabeledGrouped),
            Box::new(SecondaryLanguage),
            Box::new(BareSixDigit),
            Box::new(Contextual),
        ])
    }

    pub fn with_rules(mut rules: Vec<Box<dyn ExtractRule>>) -> Self {
        rules.sort_by_key(|r| r.priority());
        Self { rules }
    }

    /// Run the cascade.  `None` means "no code in this message", which is a
    /// normal outcome.
    pub fn extract(&self, raw: &str) -> Option<Extraction> {
        let text = prepare(raw);
        if text.is_empty() {
            return None;
        }

        for rule in &self.rules {
            if let Some(code) = rule.try_match(&text) {
                debug!(
                    "Extracted {code} via {} (priority {})",
                    rule.name(),
                    rule.priority()
                );
                return Some(Extraction {
                    code,
                    priority: rule.priority(),
                    rule: rule.name(),
                });
            }
        }

        debug!("No code found in message");
        None
    }
}

impl fmt::Display for Cascade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self
            .rules
            .iter()
            .map(|r| format!("{}:{}", r.priority(), r.name()))
            .collect();
        write!(f, "Cascade[{}]", names.join(", "))
    }
}

static STANDARD: LazyLock<Cascade> = LazyLock::new(Cascade::standard);

/// Extract a verification code with the standard cascade.
pub fn extract(text: &str) -> Option<String> {
    STANDARD.extract(text).map(|e| e.code)
}

/// Extract with the standard cascade, keeping rule metadata.
pub fn extract_detailed(text: &str) -> Option<Extraction> {
    STANDARD.extract(text)
}

// ───────────────────────────── Helpers ───────────────────────────────────

/// Trim, decode HTML entities and fold Arabic-Indic digits to ASCII.
pub fn prepare(raw: &str) -> String {
    let decoded = html_escape::decode_html_entities(raw.trim());
    decoded
        .chars()
        .map(|c| match c {
            '\u{0660}'..='\u{0669}' => char::from(b'0' + (c as u32 - 0x0660) as u8),
            '\u{06F0}'..='\u{06F9}' => char::from(b'0' + (c as u32 - 0x06F0) as u8),
            _ => c,
        })
        .collect()
}

static PHONE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+?\b[0-9]{10,15}\b").expect("phone run regex"));

/// Blank out 10–15 digit runs so phone numbers are never mistaken for codes.
pub fn strip_phone_numbers(text: &str) -> String {
    PHONE_RUN.replace_all(text, " ").into_owned()
}

/// Keep ASCII digits only.
pub fn digits_only(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// `true` for codes made of one repeated digit (`111111`, `0000`).
pub fn is_repeated_digit(code: &str) -> bool {
    let mut chars = code.chars();
    match chars.next() {
        Some(first) => chars.all(|c| c == first),
        None => true,
    }
}

/// `true` for runs whose digits step by +1 or −1 modulo 10
/// (`123456`, `567890`, `654321`, `098765`, `1234`).
pub fn is_sequential(code: &str) -> bool {
    let digits: Vec<u8> = code.bytes().map(|b| b.wrapping_sub(b'0')).collect();
    if digits.len() < 4 || digits.iter().any(|d| *d > 9) {
        return false;
    }
    let step = |a: u8, b: u8| (10 + b - a) % 10;
    let first = step(digits[0], digits[1]);
    if first != 1 && first != 9 {
        return false;
    }
    digits.windows(2).all(|w| step(w[0], w[1]) == first)
}

/// Codes that real senders never issue: repeated digits and plain sequences.
pub fn is_denied(code: &str) -> bool {
    is_repeated_digit(code) || is_sequential(code)
}
