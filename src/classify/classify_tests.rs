use std::io::Write;

use crate::classify::*;

fn table(pairs: &[(&str, &str)]) -> Option<Vec<(String, String)>> {
    Some(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

// ── Service detection ──

#[test]
fn detects_service_en() {
    let c = Classifier::standard();
    assert_eq!(c.detect_service("Your Telegram code is 48291"), "Telegram");
    assert_eq!(c.detect_service("Netflix: 482910 is your code"), "Netflix");
}

#[test]
fn detects_service_case_insensitive() {
    let c = Classifier::standard();
    assert_eq!(c.detect_service("INSTAGRAM CODE 582013"), "Instagram");
}

#[test]
fn first_language_checked_before_general() {
    let c = Classifier::standard();
    // Arabic "Telegram" plus the English word "google": Arabic table wins.
    assert_eq!(c.detect_service("رمز تليجرام 582013 google"), "Telegram");
}

#[test]
fn longer_general_key_wins() {
    let c = Classifier::standard();
    assert_eq!(
        c.detect_service("Google Pay verification code 582013"),
        "Google Pay"
    );
    assert_eq!(c.detect_service("Google verification code 582013"), "Google");
}

#[test]
fn longer_key_wins_regardless_of_table_order() {
    let c = Classifier::from_tables(ClassifierTables {
        general_services: table(&[("bank", "Bank"), ("bank of cairo", "Bank of Cairo")]),
        ..Default::default()
    });
    assert_eq!(c.detect_service("Bank of Cairo OTP 582013"), "Bank of Cairo");

    let reversed = Classifier::from_tables(ClassifierTables {
        general_services: table(&[("bank of cairo", "Bank of Cairo"), ("bank", "Bank")]),
        ..Default::default()
    });
    assert_eq!(
        reversed.detect_service("Bank of Cairo OTP 582013"),
        "Bank of Cairo"
    );
}

#[test]
fn special_case_gateway_vendor() {
    let c = Classifier::standard();
    assert_eq!(c.detect_service("Sent via Twilio: 582013"), "Twilio");
}

#[test]
fn unknown_service_default() {
    let c = Classifier::standard();
    assert_eq!(c.detect_service("582013"), UNKNOWN_SERVICE);
}

// ── Country detection ──

#[test]
fn detects_country_by_prefix() {
    let c = Classifier::standard();
    assert_eq!(c.detect_country("201001234567", ""), "🇪🇬 Egypt");
    assert_eq!(c.detect_country("+966501234567", ""), "🇸🇦 Saudi Arabia");
}

#[test]
fn overlapping_prefix_longest_first() {
    let c = Classifier::standard();
    // "77" (Kazakhstan) shares its leading digit with "7" (Russia).
    assert_eq!(c.detect_country("77011234567", ""), "🇰🇿 Kazakhstan");
    assert_eq!(c.detect_country("79161234567", ""), "🇷🇺 Russia");
    // "1876" (Jamaica) inside the "1" (USA/Canada) plan.
    assert_eq!(c.detect_country("18765551234", ""), "🇯🇲 Jamaica");
    assert_eq!(c.detect_country("12025551234", ""), "🇺🇸 USA/Canada");
}

#[test]
fn overlapping_prefix_independent_of_table_order() {
    let c = Classifier::from_tables(ClassifierTables {
        country_prefixes: table(&[("88", "Short"), ("880", "Bangladesh")]),
        ..Default::default()
    });
    assert_eq!(c.detect_country("8801712345678", ""), "Bangladesh");
    assert_eq!(c.detect_country("8812345678", ""), "Short");
}

#[test]
fn country_from_context_keyword() {
    let c = Classifier::standard();
    assert_eq!(c.detect_country("3001234567", "PERU Mobile 51"), "🇵🇪 Peru");
    assert_eq!(
        c.detect_country("3001234567", "range Nigeria MTN"),
        "🇳🇬 Nigeria"
    );
}

#[test]
fn country_from_context_plus_code() {
    let c = Classifier::standard();
    assert_eq!(c.detect_country("", "from +97455512345"), "🇶🇦 Qatar");
}

#[test]
fn unknown_country_default() {
    let c = Classifier::standard();
    assert_eq!(c.detect_country("3001234567", "nothing here"), "Unknown");
    assert_eq!(c.detect_country("", ""), "Unknown");
}

// ── Table loading ──

#[test]
fn load_without_path_is_standard() {
    let c = Classifier::load(None).unwrap();
    assert_eq!(c.detect_service("whatsapp"), "WhatsApp");
}

#[test]
fn load_override_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"special_services": [["infobip", "Infobip"]], "country_prefixes": [["3", "Test Land"]]}}"#
    )
    .unwrap();

    let c = Classifier::load(Some(file.path().to_str().unwrap())).unwrap();
    assert_eq!(c.detect_service("via infobip 582013"), "Infobip");
    // Replaced table: twilio is no longer special.
    assert_eq!(c.detect_service("twilio"), UNKNOWN_SERVICE);
    assert_eq!(c.detect_country("3001234567", ""), "Test Land");
    // Untouched table still built in.
    assert_eq!(c.detect_service("tiktok"), "TikTok");
}

#[test]
fn load_rejects_unknown_fields() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"servicez": []}}"#).unwrap();
    assert!(Classifier::load(Some(file.path().to_str().unwrap())).is_err());
}
