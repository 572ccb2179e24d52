//! Linkmap environment variable core.
//!
//! Domain types for project environment variables, the cross-environment
//! conflict detector, at-rest value encryption, and dotenv parsing. Nothing in
//! this crate performs I/O; callers fetch, decrypt and scope records.

#![deny(unsafe_code)]

pub mod conflict;
pub mod crypto;
pub mod dotenv;
pub mod error;
pub mod types;

pub use conflict::{
    detect_conflicts, is_placeholder, Conflict, ConflictEntry, ConflictKind, ConflictSeverity,
};
pub use crypto::{mask_value, SecretBox};
pub use dotenv::{parse_content, parse_line, ParsedEnvVar};
pub use error::LinkmapError;
pub use types::{EnvVarRecord, Environment, KeyName};
