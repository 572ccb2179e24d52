use crate::error::LinkmapError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Deployment stage a variable is scoped to.
///
/// Variant order is importance order: `Development < Staging < Production`.
/// Ordered collections keyed by `Environment` therefore iterate in the
/// canonical listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub const ALL: [Environment; 3] = [
        Environment::Development,
        Environment::Staging,
        Environment::Production,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::Development
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = LinkmapError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" => Ok(Self::Production),
            _ => Err(LinkmapError::InvalidEnvironment(value.to_string())),
        }
    }
}

pub const KEY_NAME_MAX_LEN: usize = 255;

/// Validated variable name: `[A-Z][A-Z0-9_]*`, at most 255 characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyName(String);

impl KeyName {
    pub fn parse(value: impl Into<String>) -> Result<Self, LinkmapError> {
        let value = value.into();
        if Self::is_valid(&value) {
            Ok(Self(value))
        } else {
            Err(LinkmapError::InvalidKeyName(value))
        }
    }

    pub fn is_valid(value: &str) -> bool {
        let mut chars = value.chars();
        match chars.next() {
            Some(first) if first.is_ascii_uppercase() => {}
            _ => return false,
        }
        value.len() <= KEY_NAME_MAX_LEN
            && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
    }

    /// Uppercases and replaces every character outside `[A-Z0-9_]` with `_`.
    /// The result is not guaranteed to be valid (e.g. a leading digit).
    pub fn normalize(raw: &str) -> String {
        raw.trim()
            .to_uppercase()
            .chars()
            .map(|c| {
                if c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for KeyName {
    type Error = LinkmapError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<KeyName> for String {
    fn from(value: KeyName) -> Self {
        value.0
    }
}

impl fmt::Display for KeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A decrypted environment variable handed to the conflict detector.
///
/// Optional fields tolerate absence so that partially populated rows
/// normalize to empty values. `environment` is required: a record without one
/// cannot be placed and is rejected rather than defaulted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVarRecord {
    #[serde(default)]
    pub id: Uuid,
    #[serde(default)]
    pub key_name: String,
    pub environment: Environment,
    #[serde(default)]
    pub decrypted_value: String,
    #[serde(default)]
    pub service_id: Option<Uuid>,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub is_secret: bool,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for EnvVarRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvVarRecord")
            .field("id", &self.id)
            .field("key_name", &self.key_name)
            .field("environment", &self.environment)
            .field("decrypted_value", &"<redacted>")
            .field("service_id", &self.service_id)
            .field("service_name", &self.service_name)
            .field("is_secret", &self.is_secret)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_name_validation() {
        assert!(KeyName::parse("DATABASE_URL").is_ok());
        assert!(KeyName::parse("A1").is_ok());
        assert!(KeyName::parse("").is_err());
        assert!(KeyName::parse("1ABC").is_err());
        assert!(KeyName::parse("_ABC").is_err());
        assert!(KeyName::parse("lower").is_err());
        assert!(KeyName::parse("A".repeat(256)).is_err());
        assert!(KeyName::parse("A".repeat(255)).is_ok());
    }

    #[test]
    fn normalize_maps_separators_to_underscore() {
        assert_eq!(KeyName::normalize(" next.public-url "), "NEXT_PUBLIC_URL");
        assert_eq!(KeyName::normalize("api key"), "API_KEY");
    }

    #[test]
    fn environment_parse_and_order() {
        assert_eq!("Production".parse::<Environment>().unwrap(), Environment::Production);
        assert!("prod".parse::<Environment>().is_err());
        assert!(Environment::Development < Environment::Staging);
        assert!(Environment::Staging < Environment::Production);
    }

    #[test]
    fn record_tolerates_missing_fields() {
        let record: EnvVarRecord =
            serde_json::from_str(r#"{"key_name":"API_URL","environment":"staging"}"#).unwrap();
        assert_eq!(record.decrypted_value, "");
        assert_eq!(record.service_id, None);
        assert!(!record.is_secret);
    }

    #[test]
    fn record_without_environment_is_rejected() {
        let parsed = serde_json::from_str::<EnvVarRecord>(r#"{"key_name":"API_URL"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn record_debug_redacts_value() {
        let record = EnvVarRecord {
            id: Uuid::nil(),
            key_name: "TOKEN".to_string(),
            environment: Environment::Production,
            decrypted_value: "sk-live-123".to_string(),
            service_id: None,
            service_name: None,
            is_secret: true,
            updated_at: Utc::now(),
        };
        assert!(!format!("{:?}", record).contains("sk-live-123"));
    }
}
