//! Utils Module - Helper Functions & Shared Utilities
//!
//! Source templates, the value cache, the extraction heuristic and telemetry.

pub mod cache;
pub mod constants;
pub mod extract;
pub mod source;
pub mod telemetry;

pub use cache::{CacheStats, CacheStore, DashMapStore, QueryFingerprint, QueryParams, ValueCache};
pub use source::{format_sources, SourceDescriptor, TemplateError};
pub use telemetry::{TelemetryCollector, TelemetryStats};
