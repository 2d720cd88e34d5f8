//! Rendering of notifications (Telegram HTML parse mode).

use std::sync::LazyLock;

use regex::Regex;

use crate::pipeline::OtpEvent;

pub const MASK_PLACEHOLDER: &str = "****";
pub const MAX_BODY_CHARS: usize = 500;
const MIN_BODY_CHARS: usize = 5;
pub const EMPTY_BODY: &str = "No full message received";

/// How much of the phone number stays visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskCfg {
    pub prefix: usize,
    pub suffix: usize,
}

impl Default for MaskCfg {
    fn default() -> Self {
        Self {
            prefix: 3,
            suffix: 3,
        }
    }
}

/// Keep `prefix` leading and `suffix` trailing characters, replace the
/// middle with [`MASK_PLACEHOLDER`].  Numbers too short to mask are shown
/// as is.
pub fn mask_number(num: &str, prefix: usize, suffix: usize) -> String {
    let chars: Vec<char> = num.trim().chars().collect();
    if chars.len() <= prefix + suffix {
        return chars.into_iter().collect();
    }
    let head: String = chars[..prefix].iter().collect();
    let tail: String = chars[chars.len() - suffix..].iter().collect();
    format!("{head}{MASK_PLACEHOLDER}{tail}")
}

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<[^>]+>").expect("tag regex"));
static WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Plain-text message body: entities decoded, markup stripped, bounded in
/// length.  Not yet escaped.
pub fn sanitize_body(raw: &str) -> String {
    let mut text = html_escape::decode_html_entities(raw).into_owned();

    if text.contains('<') && text.contains('>') {
        let stripped = TAG.replace_all(&text, " ");
        text = WS.replace_all(stripped.trim(), " ").into_owned();
    }

    let text = text.trim();
    if text.chars().count() < MIN_BODY_CHARS {
        return EMPTY_BODY.to_string();
    }
    if text.chars().count() > MAX_BODY_CHARS {
        let head: String = text.chars().take(MAX_BODY_CHARS).collect();
        return format!("{head}...");
    }
    text.to_string()
}

fn esc(s: &str) -> String {
    html_escape::encode_text(s).into_owned()
}

/// Full notification text for one event.
pub fn render(event: &OtpEvent, mask: MaskCfg) -> String {
    let number = mask_number(&event.number, mask.prefix, mask.suffix);
    let body = sanitize_body(&event.full_message);
    let time = event.fetched_at.format("%Y-%m-%d %H:%M:%S");

    format!(
        "🔔 <b>NEW LIVE SMS OTP DETECTED</b>\n\n\
         🕰 <b>Time:</b> {time}\n\
         🌍 <b>Country:</b> {country}\n\
         ⚙️ <b>Service:</b> {service}\n\
         📱 <b>Number:</b> {number}\n\
         🔑 <b>OTP:</b> <code>{otp}</code>\n\n\
         📩 <b>Full Message:</b>\n\
         <pre>{body}</pre>",
        country = esc(&event.country),
        service = esc(&event.service),
        number = esc(&number),
        otp = esc(&event.otp),
        body = esc(&body),
    )
}
