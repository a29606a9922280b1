//! Models Module - Data Structures & Configuration
//!
//! Shared types, the error taxonomy and environment-driven configuration.

pub mod config;
pub mod errors;
pub mod types;

pub use config::{AggregatorSettings, FallbackSettings, GuardianConfig, IndexerSettings, SourceRegistry};
pub use errors::{AppError, AppResult, ErrorCode};
pub use types::*;
