/// International calling-code prefixes and their display labels.
///
/// The classifier tries longer prefixes first; entries of equal length keep
/// table order.  `1` / `1876` and `7` / `77` are the overlapping pairs.
pub const COUNTRY_PREFIXES: &[(&str, &str)] = &[
    ("1", "🇺🇸 USA/Canada"),
    ("1876", "🇯🇲 Jamaica"),
    ("7", "🇷🇺 Russia"),
    ("77", "🇰🇿 Kazakhstan"),
    ("20", "🇪🇬 Egypt"),
    ("27", "🇿🇦 South Africa"),
    ("33", "🇫🇷 France"),
    ("34", "🇪🇸 Spain"),
    ("39", "🇮🇹 Italy"),
    ("44", "🇬🇧 United Kingdom"),
    ("49", "🇩🇪 Germany"),
    ("51", "🇵🇪 Peru"),
    ("52", "🇲🇽 Mexico"),
    ("55", "🇧🇷 Brazil"),
    ("57", "🇨🇴 Colombia"),
    ("58", "🇻🇪 Venezuela"),
    ("60", "🇲🇾 Malaysia"),
    ("62", "🇮🇩 Indonesia"),
    ("63", "🇵🇭 Philippines"),
    ("66", "🇹🇭 Thailand"),
    ("84", "🇻🇳 Vietnam"),
    ("86", "🇨🇳 China"),
    ("90", "🇹🇷 Turkey"),
    ("91", "🇮🇳 India"),
    ("92", "🇵🇰 Pakistan"),
    ("93", "🇦🇫 Afghanistan"),
    ("212", "🇲🇦 Morocco"),
    ("213", "🇩🇿 Algeria"),
    ("216", "🇹🇳 Tunisia"),
    ("218", "🇱🇾 Libya"),
    ("221", "🇸🇳 Senegal"),
    ("225", "🇨🇮 Ivory Coast"),
    ("233", "🇬🇭 Ghana"),
    ("234", "🇳🇬 Nigeria"),
    ("254", "🇰🇪 Kenya"),
    ("255", "🇹🇿 Tanzania"),
    ("256", "🇺🇬 Uganda"),
    ("380", "🇺🇦 Ukraine"),
    ("880", "🇧🇩 Bangladesh"),
    ("961", "🇱🇧 Lebanon"),
    ("962", "🇯🇴 Jordan"),
    ("963", "🇸🇾 Syria"),
    ("964", "🇮🇶 Iraq"),
    ("965", "🇰🇼 Kuwait"),
    ("966", "🇸🇦 Saudi Arabia"),
    ("967", "🇾🇪 Yemen"),
    ("968", "🇴🇲 Oman"),
    ("970", "🇵🇸 Palestine"),
    ("971", "🇦🇪 UAE"),
    ("973", "🇧🇭 Bahrain"),
    ("974", "🇶🇦 Qatar"),
    ("992", "🇹🇯 Tajikistan"),
    ("994", "🇦🇿 Azerbaijan"),
    ("995", "🇬🇪 Georgia"),
    ("996", "🇰🇬 Kyrgyzstan"),
    ("998", "🇺🇿 Uzbekistan"),
];

/// Text fallback: uppercase country keyword and the calling code whose label
/// it resolves to.  The same code is also matched as a literal `+<code>`.
pub const COUNTRY_KEYWORDS: &[(&str, &str)] = &[
    ("PERU", "51"),
    ("BANGLADESH", "880"),
    ("NIGERIA", "234"),
    ("EGYPT", "20"),
    ("SAUDI", "966"),
    ("UAE", "971"),
    ("QATAR", "974"),
    ("KUWAIT", "965"),
];

pub const UNKNOWN_COUNTRY: &str = "Unknown";
