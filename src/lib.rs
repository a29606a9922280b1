//! GuardianX Library
//!
//! Address reputation core for Kadena (and a minimal XRPL path):
//! - Balance aggregation across all Kadena chains with node and indexer fallback
//! - Transaction count, age and scam lookups over interchangeable explorer sources
//! - Rule-based or model-assisted 0-100 risk scoring
//!
//! Upstream failures never surface as errors; they degrade to sentinel values.

pub mod core;
pub mod models;
pub mod providers;
pub mod utils;

pub use crate::core::{
    AddressValidator, BalanceAggregator, JsonReportGenerator, ReportGenerator, RiskClassifier,
    RwaChecker, WeightedClassifier,
};
pub use models::{AggregateBalance, AppError, AppResult, Chain, GuardianConfig, ValidationReport};
pub use providers::{FallbackQueryEngine, HttpTransport, MockTransport, ReqwestTransport};
pub use utils::{TelemetryCollector, ValueCache};
