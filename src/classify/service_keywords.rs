/// Arabic service names.  Checked first, literal substring match, table
/// order decides ties.
pub const FIRST_LANGUAGE_SERVICES: &[(&str, &str)] = &[
    ("واتساب", "WhatsApp"),
    ("تليجرام", "Telegram"),
    ("فيسبوك", "Facebook"),
    ("انستغرام", "Instagram"),
    ("تويتر", "Twitter"),
    ("جوجل", "Google"),
    ("بايبال", "PayPal"),
    ("امازون", "Amazon"),
    ("بنكي", "Bank"),
    ("بنك", "Bank"),
    ("فيزا", "Visa"),
    ("ماستركارد", "Mastercard"),
    ("أبل", "Apple"),
    ("ابل", "Apple"),
    ("مايكروسوفت", "Microsoft"),
    ("ياهو", "Yahoo"),
];

/// General (lowercase, mostly Latin) service keywords.  Order here does not
/// matter: the classifier sorts keys by descending length so that
/// "google pay" wins over "google".
pub const GENERAL_SERVICES: &[(&str, &str)] = &[
    ("whatsapp", "WhatsApp"),
    ("whatsapp business", "WhatsApp Business"),
    ("telegram", "Telegram"),
    ("facebook", "Facebook"),
    ("messenger", "Messenger"),
    ("instagram", "Instagram"),
    ("tiktok", "TikTok"),
    ("twitter", "Twitter"),
    ("snapchat", "Snapchat"),
    ("google", "Google"),
    ("google pay", "Google Pay"),
    ("gmail", "Google"),
    ("youtube", "YouTube"),
    ("apple", "Apple"),
    ("apple pay", "Apple Pay"),
    ("icloud", "Apple"),
    ("microsoft", "Microsoft"),
    ("microsoft teams", "Microsoft Teams"),
    ("outlook", "Microsoft"),
    ("amazon", "Amazon"),
    ("amazon pay", "Amazon Pay"),
    ("paypal", "PayPal"),
    ("netflix", "Netflix"),
    ("discord", "Discord"),
    ("linkedin", "LinkedIn"),
    ("yahoo", "Yahoo"),
    ("signal", "Signal"),
    ("viber", "Viber"),
    ("wechat", "WeChat"),
    ("uber", "Uber"),
    ("careem", "Careem"),
    ("binance", "Binance"),
    ("bybit", "Bybit"),
    ("tinder", "Tinder"),
    ("airbnb", "Airbnb"),
    ("steam", "Steam"),
    ("openai", "OpenAI"),
    ("chatgpt", "OpenAI"),
    ("shopee", "Shopee"),
];

/// Single-keyword special cases checked after both dictionaries
/// (SMS gateway vendors that sign messages with their own name).
pub const SPECIAL_SERVICES: &[(&str, &str)] = &[
    ("twilio", "Twilio"),
    ("vonage", "Vonage"),
    ("nexmo", "Vonage"),
];
