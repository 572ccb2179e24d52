//! Linkmap service library
//!
//! REST surface over encrypted, per-environment project variables:
//! - project and variable management with dotenv import
//! - cross-environment conflict scans and resolution
//! - audit trail of every mutation and scan

#![deny(unsafe_code)]

pub mod api;
pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod model;
pub mod server;
pub mod storage;

pub use api::{create_router, AppState};
pub use config::LinkmapConfig;
pub use error::{ApiError, ServiceError, StorageError};
pub use server::Server;
pub use storage::{InMemoryStorage, PostgresStorage, Storage};
