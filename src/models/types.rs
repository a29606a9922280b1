//! Type definitions for GuardianX
//! Core data structures shared by the aggregator, the risk model and the report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::models::errors::AppError;

/// Ledger a validation request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Kadena,
    Xrpl,
}

impl Chain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Kadena => "kadena",
            Chain::Xrpl => "xrpl",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "kadena" | "kda" => Ok(Chain::Kadena),
            "xrpl" | "xrp" => Ok(Chain::Xrpl),
            other => Err(AppError::unsupported_chain(other)),
        }
    }
}

/// What the extraction heuristic looks for in a response body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Transaction-like counts
    Count,
    /// Address age in whole days
    AgeDays,
    /// Boolean hit (scam databases), reported as 0/1
    Flag,
}

impl ExtractionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMode::Count => "tx",
            ExtractionMode::AgeDays => "age",
            ExtractionMode::Flag => "flag",
        }
    }
}

/// Shard id -> positive balance. Never holds zero or negative entries.
pub type PerChainBalances = BTreeMap<u32, f64>;

/// Balance summed over every shard that answered with a positive value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateBalance {
    pub total: f64,
    pub winning_chain: Option<u32>,
    pub per_chain: PerChainBalances,
}

impl AggregateBalance {
    /// Build from raw per-shard values, enforcing the positive-only invariant.
    /// The winning chain is the lowest shard id holding a positive balance.
    pub fn from_per_chain<I>(raw: I) -> Self
    where
        I: IntoIterator<Item = (u32, f64)>,
    {
        let per_chain: PerChainBalances = raw
            .into_iter()
            .filter(|(_, v)| v.is_finite() && *v > 0.0)
            .collect();
        let total = per_chain.values().sum();
        let winning_chain = per_chain.keys().next().copied();

        Self {
            total,
            winning_chain,
            per_chain,
        }
    }

    /// Sentinel returned when every source failed
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.per_chain.is_empty()
    }
}

/// Rule-based risk score and advisory flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Score in [0, 100]
    pub score: u8,
    pub flags: BTreeSet<String>,
}

/// Which risk model produced the score of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    Rules,
    Hybrid,
}

/// Real-world-asset lookup block carried by every report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RwaCheck {
    pub tokens: Vec<String>,
    pub flags: Vec<String>,
}

/// Everything the report generator receives. All fields are always populated;
/// under upstream failure they carry sentinels (0, empty) instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub report_id: uuid::Uuid,
    pub chain: Chain,
    pub address: String,
    pub score: f64,
    pub flags: BTreeSet<String>,
    pub rwa_check: RwaCheck,
    pub balance: f64,
    pub chain_found: Option<u32>,
    pub per_chain: PerChainBalances,
    pub tx_count: u64,
    pub tx_count_24h: Option<u64>,
    pub age_days: u64,
    pub is_contract: Option<bool>,
    pub scoring_mode: ScoringMode,
    pub model_version: String,
    pub duration_ms: u64,
    pub generated_at: DateTime<Utc>,
}

impl ValidationReport {
    /// One-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "{} {} | Score: {:.1} | Balance: {:.4} | Tx: {} | Age: {}d | Flags: [{}]",
            self.chain,
            self.address,
            self.score,
            self.balance,
            self.tx_count,
            self.age_days,
            self.flags.iter().cloned().collect::<Vec<_>>().join(", ")
        )
    }

    /// True when no upstream contributed anything
    pub fn is_degraded(&self) -> bool {
        self.balance == 0.0 && self.tx_count == 0 && self.age_days == 0 && self.tx_count_24h.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_parsing() {
        assert_eq!("Kadena".parse::<Chain>().unwrap(), Chain::Kadena);
        assert_eq!(" xrpl ".parse::<Chain>().unwrap(), Chain::Xrpl);
        assert!("eth".parse::<Chain>().is_err());
    }

    #[test]
    fn test_aggregate_drops_non_positive() {
        let agg = AggregateBalance::from_per_chain(vec![
            (3, 2.0),
            (0, 5.0),
            (1, 0.0),
            (2, -1.0),
            (4, f64::NAN),
        ]);
        assert_eq!(agg.per_chain.len(), 2);
        assert_eq!(agg.total, 7.0);
        assert_eq!(agg.winning_chain, Some(0));
        assert_eq!(agg.total, agg.per_chain.values().sum::<f64>());
    }

    #[test]
    fn test_empty_aggregate() {
        let agg = AggregateBalance::empty();
        assert_eq!(agg.total, 0.0);
        assert!(agg.winning_chain.is_none());
        assert!(agg.is_empty());
    }
}
