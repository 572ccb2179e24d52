use thiserror::Error;

/// Linkmap core errors.
#[derive(Debug, Error)]
pub enum LinkmapError {
    #[error("invalid key name '{0}': expected [A-Z][A-Z0-9_]* with at most 255 characters")]
    InvalidKeyName(String),

    #[error("invalid environment '{0}'; expected one of: development, staging, production")]
    InvalidEnvironment(String),

    #[error("encryption key error: {0}")]
    InvalidKey(String),

    #[error("crypto error: {0}")]
    Crypto(String),
}

impl LinkmapError {
    pub fn malformed_envelope() -> Self {
        Self::Crypto("invalid encrypted data format".to_string())
    }
}
