//! Constants Module - Single Source of Truth
//!
//! Defaults for every tunable the aggregation layer exposes. Configuration
//! (`models::config`) reads overrides from the environment and falls back
//! to the values defined here.

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Application name
pub const APP_NAME: &str = "GuardianX";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent for upstream HTTP requests
pub const USER_AGENT: &str = "GuardianX/0.1.0";

// ============================================
// FALLBACK QUERY ENGINE
// ============================================

/// Per-call timeout for explorer/indexer sources (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 4;

/// Attempts per source before moving on
pub const DEFAULT_RETRY_PER_SOURCE: u32 = 1;

/// Fixed pause between two sources (milliseconds)
pub const DEFAULT_SOURCE_DELAY_MS: u64 = 50;

/// TTL for generic metrics: tx count, age, scam flag (seconds)
pub const DEFAULT_METRIC_CACHE_TTL_SECS: u64 = 900;

/// Placeholder substituted by the source formatter
pub const ADDRESS_PLACEHOLDER: &str = "{address}";

/// Maximum nesting the extraction visitor descends into
pub const MAX_EXTRACTION_DEPTH: usize = 4;

/// Epoch values above this are milliseconds, below are seconds
pub const EPOCH_MILLIS_THRESHOLD: f64 = 10_000_000_000.0;

// ============================================
// CHAIN BALANCE AGGREGATOR
// ============================================

/// TTL for aggregated balances (seconds)
pub const DEFAULT_BALANCE_CACHE_TTL_SECS: u64 = 20;

/// Per-call timeout for Pact node calls (seconds)
pub const DEFAULT_NODE_TIMEOUT_SECS: f64 = 8.0;

/// Shard queries allowed in flight at once
pub const DEFAULT_BALANCE_CONCURRENCY: usize = 6;

/// Wall-clock budget for one whole shard fan-out (seconds)
pub const DEFAULT_FANOUT_DEADLINE_SECS: u64 = 30;

/// Number of Kadena chains (shards)
pub const DEFAULT_CHAIN_COUNT: u32 = 20;

/// Shard retried alone when the fan-out found nothing
pub const DEFAULT_SHARD: u32 = 0;

/// Kadena mainnet network id
pub const DEFAULT_NETWORK_ID: &str = "mainnet01";

/// Public Pact API bases, tried in order
pub const DEFAULT_PACT_BASES: [&str; 3] = [
    "https://api.chainweb.com",
    "https://us-e1.chainweb.com",
    "https://fr-eu.chainweb.com",
];

/// Gas settings of the local (read-only) Pact envelope
pub const PACT_GAS_LIMIT: u64 = 150_000;
pub const PACT_GAS_PRICE: f64 = 1e-6;
pub const PACT_TTL_SECS: u64 = 600;

// ============================================
// SECONDARY SOURCES
// ============================================

/// Legacy block explorer API
pub const DEFAULT_EXPLORER_BASE: &str = "https://explorer.chainweb.com/mainnet/api";

/// Kadindexer v1 REST API
pub const DEFAULT_INDEXER_BASE: &str = "https://api.mainnet.kadindexer.io/v1";

/// Header carrying the indexer API key
pub const INDEXER_API_KEY_HEADER: &str = "x-api-key";

/// Explorer account endpoint used for tx count and age when nothing is configured
pub const DEFAULT_KADENA_ACCOUNT_SOURCE: &str =
    "https://explorer.chainweb.com/mainnet/account/{address}";

/// Explorer page size when counting recent transactions
pub const EXPLORER_TX_PAGE_LIMIT: u32 = 200;

// ============================================
// RISK MODEL
// ============================================

/// Neutral starting score of the rule baseline
pub const BASE_RISK_SCORE: i32 = 50;

/// Cap of the balance contribution
pub const MAX_BALANCE_BONUS: i32 = 15;

/// Default model version reported alongside scores
pub const DEFAULT_MODEL_VERSION: &str = "1.0.0";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_defaults_within_documented_ranges() {
        assert!((4..=8).contains(&DEFAULT_REQUEST_TIMEOUT_SECS));
        assert!((1..=2).contains(&DEFAULT_RETRY_PER_SOURCE));
        assert!(DEFAULT_SOURCE_DELAY_MS < 100);
    }

    #[test]
    fn test_default_shard_is_in_range() {
        assert!(DEFAULT_SHARD < DEFAULT_CHAIN_COUNT);
        assert!(DEFAULT_BALANCE_CONCURRENCY > 0);
    }
}
