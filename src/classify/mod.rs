//! Service and country classification for extracted codes.
//!
//! All tables are loaded once at startup into an immutable [`Classifier`].
//! The built-in tables live in [`service_keywords`] and [`country_codes`];
//! any of them can be replaced from a JSON file (`CLASSIFIER_TABLES_PATH`).
#[cfg(test)]
mod classify_tests;
pub mod country_codes;
pub mod service_keywords;

use std::fmt;
use std::fs;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::classify::country_codes::{COUNTRY_KEYWORDS, COUNTRY_PREFIXES, UNKNOWN_COUNTRY};
use crate::classify::service_keywords::{
    FIRST_LANGUAGE_SERVICES, GENERAL_SERVICES, SPECIAL_SERVICES,
};
use crate::extract::digits_only;

pub const UNKNOWN_SERVICE: &str = "Unknown Service";

type Table = Vec<(String, String)>;

/// Optional replacements for the built-in tables.  Each table is a JSON array
/// of `[key, label]` pairs; missing tables keep the built-in value.
///
/// ```json
/// { "general_services": [["google", "Google"], ["google pay", "Google Pay"]] }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierTables {
    #[serde(default)]
    pub first_language_services: Option<Table>,
    #[serde(default)]
    pub general_services: Option<Table>,
    #[serde(default)]
    pub special_services: Option<Table>,
    #[serde(default)]
    pub country_prefixes: Option<Table>,
    #[serde(default)]
    pub country_keywords: Option<Table>,
}

/// Immutable lookup tables for service and country detection.
#[derive(Debug, Clone)]
pub struct Classifier {
    first_language: Table,
    /// Sorted by descending key length.
    general: Table,
    special: Table,
    /// Sorted by descending prefix length, ties in table order.
    prefixes: Table,
    /// `(UPPERCASE keyword, calling code)`.
    country_keywords: Table,
}

fn owned(table: &[(&str, &str)]) -> Table {
    table
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl Classifier {
    /// Built-in tables only.
    pub fn standard() -> Self {
        Self::from_tables(ClassifierTables::default())
    }

    /// Built-in tables overridden by whatever `tables` provides.
    pub fn from_tables(tables: ClassifierTables) -> Self {
        let lower = |t: Table| -> Table {
            t.into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .filter(|(k, _)| !k.is_empty())
                .collect()
        };

        let mut general = lower(
            tables
                .general_services
                .unwrap_or_else(|| owned(GENERAL_SERVICES)),
        );
        general.sort_by_key(|(k, _)| std::cmp::Reverse(k.chars().count()));

        let mut prefixes: Table = tables
            .country_prefixes
            .unwrap_or_else(|| owned(COUNTRY_PREFIXES))
            .into_iter()
            .map(|(k, v)| (digits_only(&k), v))
            .filter(|(k, _)| !k.is_empty())
            .collect();
        // Stable sort: equal lengths keep table order.
        prefixes.sort_by_key(|(k, _)| std::cmp::Reverse(k.len()));

        let country_keywords = tables
            .country_keywords
            .unwrap_or_else(|| owned(COUNTRY_KEYWORDS))
            .into_iter()
            .map(|(k, v)| (k.to_uppercase(), digits_only(&v)))
            .collect();

        Self {
            first_language: lower(
                tables
                    .first_language_services
                    .unwrap_or_else(|| owned(FIRST_LANGUAGE_SERVICES)),
            ),
            general,
            special: lower(
                tables
                    .special_services
                    .unwrap_or_else(|| owned(SPECIAL_SERVICES)),
            ),
            prefixes,
            country_keywords,
        }
    }

    /// Load from an optional JSON override file.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::standard());
        };
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read classifier tables {path}"))?;
        let tables: ClassifierTables = serde_json::from_str(&raw)
            .with_context(|| format!("invalid classifier tables in {path}"))?;
        info!("Classifier tables loaded from {path}");
        Ok(Self::from_tables(tables))
    }

    /// Map message text to a service label.
    ///
    /// First-language dictionary (table order), then the general dictionary
    /// (longest key first), then the single-keyword special cases.
    pub fn detect_service(&self, text: &str) -> String {
        let lower = text.to_lowercase();

        let hit = self
            .first_language
            .iter()
            .chain(self.general.iter())
            .chain(self.special.iter())
            .find(|(k, _)| lower.contains(k.as_str()));

        match hit {
            Some((key, label)) => {
                debug!("Service {label} via keyword {key:?}");
                label.clone()
            }
            None => UNKNOWN_SERVICE.to_string(),
        }
    }

    /// Map a phone number (and the text around it) to a country label.
    pub fn detect_country(&self, number: &str, context: &str) -> String {
        let digits = digits_only(number);

        let hit = self
            .prefixes
            .iter()
            .find(|(p, _)| !digits.is_empty() && digits.starts_with(p.as_str()));
        if let Some((prefix, label)) = hit {
            debug!("Country {label} via prefix {prefix}");
            return label.clone();
        }

        let upper = context.to_uppercase();
        for (keyword, code) in &self.country_keywords {
            let plus_code = format!("+{code}");
            if upper.contains(keyword.as_str()) || context.contains(&plus_code) {
                debug!("Country via context keyword {keyword:?}");
                return self.label_for_code(code);
            }
        }

        UNKNOWN_COUNTRY.to_string()
    }

    fn label_for_code(&self, code: &str) -> String {
        self.prefixes
            .iter()
            .find(|(p, _)| p == code)
            .map(|(_, label)| label.clone())
            .unwrap_or_else(|| format!("+{code}"))
    }
}

impl fmt::Display for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Classifier(services={}+{}+{}, prefixes={}, country_keywords={})",
            self.first_language.len(),
            self.general.len(),
            self.special.len(),
            self.prefixes.len(),
            self.country_keywords.len(),
        )
    }
}
