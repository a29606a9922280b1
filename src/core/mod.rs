//! Core Module - Aggregation & Risk Scoring
//!
//! Balance fan-out, the rule baseline, the model-assisted scorer and the
//! validator that ties them into one report.

pub mod aggregator;
pub mod ml_risk;
pub mod risk_score;
pub mod validator;

pub use aggregator::BalanceAggregator;
pub use ml_risk::{hybrid_risk_score, FeatureVector, ModelAssessment, RiskClassifier, WeightedClassifier};
pub use risk_score::{log_bonus, risk_score, RiskScoreBuilder};
pub use validator::{AddressValidator, JsonReportGenerator, NoopRwaChecker, ReportGenerator, RwaChecker};
