use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ConfigError;

const PAYMENT_SCOPES: [&str; 2] = ["academic_year", "all_years"];

/// Stores engine preferences shared by the library facade and the shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "Config::default_locale")]
    pub locale: String,
    #[serde(default = "Config::default_currency")]
    pub currency: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Optional custom root directory for school data. Defaults to `~/Documents/FeeLedger`.
    pub data_root: Option<PathBuf>,

    /// Which payments feed a statement: `academic_year` or `all_years`.
    #[serde(default = "Config::default_payment_scope")]
    pub payment_scope: String,

    /// Whether generating a statement records its year-end carry.
    #[serde(default = "Config::default_true")]
    pub persist_carry_forward: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,

    #[serde(default = "Config::default_true")]
    pub ui_color_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locale: Self::default_locale(),
            currency: Self::default_currency(),
            data_root: None,
            payment_scope: Self::default_payment_scope(),
            persist_carry_forward: true,
            log_filter: None,
            ui_color_enabled: true,
        }
    }
}

impl Config {
    pub fn default_locale() -> String {
        "en-KE".into()
    }

    pub fn default_currency() -> String {
        "KES".into()
    }

    pub fn default_payment_scope() -> String {
        PAYMENT_SCOPES[0].into()
    }

    fn default_true() -> bool {
        true
    }

    pub fn resolve_data_root(&self) -> PathBuf {
        if let Some(path) = &self.data_root {
            return path.clone();
        }

        let base = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        base.join("FeeLedger")
    }

    /// Key/value pairs in display order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("locale", self.locale.clone()),
            ("currency", self.currency.clone()),
            ("data_root", self.resolve_data_root().display().to_string()),
            ("payment_scope", self.payment_scope.clone()),
            (
                "persist_carry_forward",
                self.persist_carry_forward.to_string(),
            ),
            (
                "log_filter",
                self.log_filter.clone().unwrap_or_else(|| "-".into()),
            ),
            ("ui_color_enabled", self.ui_color_enabled.to_string()),
        ]
    }

    /// Updates one setting from its textual form.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        let trimmed = value.trim();
        match key.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "locale" if !trimmed.is_empty() => self.locale = trimmed.into(),
            "currency" if !trimmed.is_empty() => self.currency = trimmed.to_ascii_uppercase(),
            "data_root" => {
                self.data_root = (!trimmed.is_empty()).then(|| PathBuf::from(trimmed));
            }
            "payment_scope" => {
                let normalized = trimmed.to_ascii_lowercase().replace('-', "_");
                if !PAYMENT_SCOPES.contains(&normalized.as_str()) {
                    return Err(invalid());
                }
                self.payment_scope = normalized;
            }
            "persist_carry_forward" => {
                self.persist_carry_forward = parse_flag(trimmed).ok_or_else(invalid)?;
            }
            "log_filter" => {
                self.log_filter = (!trimmed.is_empty()).then(|| trimmed.to_string());
            }
            "ui_color_enabled" => {
                self.ui_color_enabled = parse_flag(trimmed).ok_or_else(invalid)?;
            }
            "locale" | "currency" => return Err(invalid()),
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}
