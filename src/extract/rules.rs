use std::sync::LazyLock;

use regex::Regex;

use crate::extract::{ExtractRule, digits_only, is_denied, is_repeated_digit, strip_phone_numbers};

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("extraction pattern"))
        .collect()
}

// ─────────────────────── Priority 1: labeled 3+3 code ─────────────────────

/// WhatsApp-style `123-456` codes.  **Order matters**: labeled forms come
/// first so the label wins when several groups appear.
static LABELED_GROUPED: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        // AR: "WhatsApp code" / "WhatsApp"
        r"(?i)(?:رمز واتساب|كود واتساب|واتساب)[\s:]*[:؛]?\s*([0-9]{3}[-.\s][0-9]{3})",
        // EN
        r"(?i)(?:code whatsapp|whatsapp code|whatsapp)[\s:]*[:؛]?\s*([0-9]{3}[-.\s][0-9]{3})",
        // AR: "do not share (code)"
        r"(?i)(?:لا تشارك رمز|لا تشارك)[\s:]+(?:واتساب)?[\s:]*([0-9]{3}[-.\s][0-9]{3})",
        // EN: "do not share"
        r"(?i)(?:do not share|don't share)[\s:]+(?:whatsapp)?[\s:]*([0-9]{3}[-.\s][0-9]{3})",
    ])
});

/// A 3+3 group with no label next to it.  Only tried when a label appears
/// somewhere in the message.
static BARE_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([0-9]{3}[-.][0-9]{3})\b").expect("bare group regex"));

static GROUP_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)whatsapp|واتساب|do not share|don't share|لا تشارك").expect("group label regex")
});

static LABELED_CONTIGUOUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:whatsapp|واتساب)[\s:]*([0-9]{6})").expect("labeled contiguous regex")
});

pub struct LabeledGrouped;

impl ExtractRule for LabeledGrouped {
    fn name(&self) -> &'static str {
        "labeled_grouped"
    }

    fn priority(&self) -> u8 {
        1
    }

    fn try_match(&self, text: &str) -> Option<String> {
        let text = strip_phone_numbers(text);
        let accept = |caps: regex::Captures<'_>| {
            let code = digits_only(&caps[1]);
            (code.len() == 6 && !is_repeated_digit(&code)).then_some(code)
        };

        if let Some(code) = LABELED_GROUPED
            .iter()
            .find_map(|re| re.captures(&text).and_then(accept))
        {
            return Some(code);
        }
        if !GROUP_LABEL.is_match(&text) {
            return None;
        }
        BARE_GROUP
            .captures(&text)
            .and_then(accept)
            .or_else(|| LABELED_CONTIGUOUS.captures(&text).and_then(accept))
    }
}

// ──────────────── Priority 2: secondary-language label + 6 digits ─────────

/// One language's labeled-code patterns, gated by the presence of its script.
struct LanguagePatterns {
    script: Regex,
    patterns: Vec<Regex>,
}

static SECONDARY_LANGUAGES: LazyLock<Vec<LanguagePatterns>> = LazyLock::new(|| {
    vec![
        // Arabic
        LanguagePatterns {
            script: Regex::new(r"[\x{0600}-\x{06FF}]").expect("arabic script regex"),
            patterns: compile(&[
                r"(?i)(?:الرمز|الكود|رمز|كود)[\s:]*[:؛]?\s*([0-9]{6})\b",
                r"(?i)(?:رمز|كود)\s+(?:التحقق|التفعيل)[\s:]*[:؛]?\s*([0-9]{6})\b",
                r"(?i)\b([0-9]{6})\s+(?:هو|هي)\s+(?:الرمز|الكود|رمز|كود)",
            ]),
        },
        // Russian
        LanguagePatterns {
            script: Regex::new(r"[\x{0400}-\x{04FF}]").expect("cyrillic script regex"),
            patterns: compile(&[
                r"(?i)(?:код подтверждения|код)[\s:]*[:;]?\s*([0-9]{6})\b",
                r"(?i)\b([0-9]{6})\s*[-–—]?\s*(?:ваш|это)\s+код",
            ]),
        },
    ]
});

pub struct SecondaryLanguage;

impl ExtractRule for SecondaryLanguage {
    fn name(&self) -> &'static str {
        "secondary_language"
    }

    fn priority(&self) -> u8 {
        2
    }

    fn try_match(&self, text: &str) -> Option<String> {
        let clean = strip_phone_numbers(text);
        for lang in SECONDARY_LANGUAGES.iter() {
            if !lang.script.is_match(&clean) {
                continue;
            }
            for re in &lang.patterns {
                let Some(caps) = re.captures(&clean) else {
                    continue;
                };
                let code = digits_only(&caps[1]);
                if code.len() == 6 && !is_denied(&code) {
                    return Some(code);
                }
            }
        }
        None
    }
}

// ───────────────────── Priority 3: any standalone 6 digits ────────────────

static SIX_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[0-9]{6}\b").expect("six digit regex"));

pub struct BareSixDigit;

impl ExtractRule for BareSixDigit {
    fn name(&self) -> &'static str {
        "bare_six_digit"
    }

    fn priority(&self) -> u8 {
        3
    }

    fn try_match(&self, text: &str) -> Option<String> {
        let clean = strip_phone_numbers(text);
        SIX_DIGITS
            .find_iter(&clean)
            .map(|m| m.as_str())
            .find(|code| !is_denied(code))
            .map(str::to_owned)
    }
}

// ─────────────────────── Priority 4: contextual 4–6 digits ────────────────

static CONTEXTUAL: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        // keyword before
        r"(?i)\b(?:code|otp|verification|رمز|كود|код)[\s:]*[:؛]?\s*([0-9]{4,6})\b",
        // keyword after
        r"(?i)\b([0-9]{4,6})\b\s+(?:is|are|رمز|كود|код|code|otp|verification)",
        // bracketed
        r"[\[\(\{]\s*([0-9]{4,6})\s*[\]\)\}]",
        // colon-prefixed
        r"[:؛]\s*([0-9]{4,6})\b",
    ])
});

pub struct Contextual;

impl ExtractRule for Contextual {
    fn name(&self) -> &'static str {
        "contextual"
    }

    fn priority(&self) -> u8 {
        4
    }

    fn try_match(&self, text: &str) -> Option<String> {
        let clean = strip_phone_numbers(text);
        let mut first: Option<String> = None;

        for re in CONTEXTUAL.iter() {
            for caps in re.captures_iter(&clean) {
                let code = digits_only(&caps[1]);
                if !(4..=6).contains(&code.len()) || is_denied(&code) {
                    continue;
                }
                if code.len() == 6 {
                    return Some(code);
                }
                first.get_or_insert(code);
            }
        }

        first
    }
}
