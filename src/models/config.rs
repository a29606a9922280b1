//! Configuration module for GuardianX
//!
//! Every value is optional. Missing variables use the defaults from
//! `utils/constants.rs`; unparsable ones log a warning and fall back too,
//! so configuration never fails startup.

use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::utils::constants::{
    DEFAULT_BALANCE_CACHE_TTL_SECS, DEFAULT_BALANCE_CONCURRENCY, DEFAULT_CHAIN_COUNT,
    DEFAULT_EXPLORER_BASE, DEFAULT_FANOUT_DEADLINE_SECS, DEFAULT_INDEXER_BASE,
    DEFAULT_KADENA_ACCOUNT_SOURCE, DEFAULT_METRIC_CACHE_TTL_SECS, DEFAULT_MODEL_VERSION,
    DEFAULT_NETWORK_ID, DEFAULT_NODE_TIMEOUT_SECS, DEFAULT_PACT_BASES,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RETRY_PER_SOURCE, DEFAULT_SHARD,
    DEFAULT_SOURCE_DELAY_MS,
};
use crate::utils::source::SourceDescriptor;

/// Settings of the sequential fallback engine
#[derive(Debug, Clone)]
pub struct FallbackSettings {
    /// Timeout of every single HTTP call
    pub request_timeout: Duration,
    /// Attempts per source
    pub retry_per_source: u32,
    /// Pause between two sources
    pub source_delay: Duration,
    /// Default TTL of cached metrics
    pub metric_ttl: Duration,
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            retry_per_source: DEFAULT_RETRY_PER_SOURCE,
            source_delay: Duration::from_millis(DEFAULT_SOURCE_DELAY_MS),
            metric_ttl: Duration::from_secs(DEFAULT_METRIC_CACHE_TTL_SECS),
        }
    }
}

/// Credentials of the secondary aggregate indexer
#[derive(Clone)]
pub struct IndexerSettings {
    pub base_url: String,
    pub api_key: String,
}

impl std::fmt::Debug for IndexerSettings {
    // API key is never printed
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexerSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &"***HIDDEN***")
            .finish()
    }
}

/// Settings of the shard balance aggregator
#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    /// Pact API bases, tried in order for every shard
    pub pact_bases: Vec<String>,
    pub network_id: String,
    pub chain_count: u32,
    /// Shard retried alone after an all-zero fan-out
    pub default_shard: u32,
    /// Shard queries in flight at once
    pub concurrency: usize,
    /// Timeout of every node call
    pub node_timeout: Duration,
    /// Budget of the whole fan-out
    pub fanout_deadline: Duration,
    pub balance_ttl: Duration,
    pub explorer_base: String,
    pub indexer: Option<IndexerSettings>,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            pact_bases: DEFAULT_PACT_BASES.iter().map(|s| s.to_string()).collect(),
            network_id: DEFAULT_NETWORK_ID.to_string(),
            chain_count: DEFAULT_CHAIN_COUNT,
            default_shard: DEFAULT_SHARD,
            concurrency: DEFAULT_BALANCE_CONCURRENCY,
            node_timeout: Duration::from_secs_f64(DEFAULT_NODE_TIMEOUT_SECS),
            fanout_deadline: Duration::from_secs(DEFAULT_FANOUT_DEADLINE_SECS),
            balance_ttl: Duration::from_secs(DEFAULT_BALANCE_CACHE_TTL_SECS),
            explorer_base: DEFAULT_EXPLORER_BASE.to_string(),
            indexer: None,
        }
    }
}

/// Source templates per metric
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    pub kadena_tx: Vec<SourceDescriptor>,
    pub kadena_age: Vec<SourceDescriptor>,
    pub kadena_related: Vec<SourceDescriptor>,
    pub xrpl_tx: Vec<SourceDescriptor>,
    pub xrpl_age: Vec<SourceDescriptor>,
    /// Scam databases, queried with an `address` parameter
    pub scamdb: Vec<SourceDescriptor>,
}

/// Complete configuration of the core
#[derive(Debug, Clone)]
pub struct GuardianConfig {
    pub fallback: FallbackSettings,
    pub aggregator: AggregatorSettings,
    pub sources: SourceRegistry,
    /// JSON weights of the optional classifier
    pub model_path: Option<String>,
    pub model_version: String,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        let account = SourceDescriptor::parse_list(DEFAULT_KADENA_ACCOUNT_SOURCE);
        Self {
            fallback: FallbackSettings::default(),
            aggregator: AggregatorSettings::default(),
            sources: SourceRegistry {
                kadena_tx: account.clone(),
                kadena_age: account,
                ..Default::default()
            },
            model_path: None,
            model_version: DEFAULT_MODEL_VERSION.to_string(),
        }
    }
}

impl GuardianConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup (environment, test maps)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let fallback = FallbackSettings {
            request_timeout: Duration::from_secs(parse_or(
                &get,
                "REQUEST_TIMEOUT_SEC",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
            retry_per_source: parse_or(&get, "RETRY_PER_SOURCE", DEFAULT_RETRY_PER_SOURCE),
            source_delay: Duration::from_millis(parse_or(
                &get,
                "SOURCE_DELAY_MS",
                DEFAULT_SOURCE_DELAY_MS,
            )),
            metric_ttl: Duration::from_secs(parse_or(
                &get,
                "METRIC_CACHE_TTL",
                DEFAULT_METRIC_CACHE_TTL_SECS,
            )),
        };

        let indexer = get("KADINDEXER_API_KEY").map(|api_key| IndexerSettings {
            base_url: get("KADINDEXER_BASE").unwrap_or_else(|| DEFAULT_INDEXER_BASE.to_string()),
            api_key,
        });

        let pact_bases = get("KADENA_PACT_BASES")
            .map(|v| split_list(&v))
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.aggregator.pact_bases);

        let chain_count = parse_or(&get, "KADENA_CHAIN_COUNT", DEFAULT_CHAIN_COUNT).max(1);
        let concurrency = parse_or(&get, "BALANCE_CONCURRENCY", DEFAULT_BALANCE_CONCURRENCY).max(1);
        let node_timeout = parse_or(&get, "API_TIMEOUT", DEFAULT_NODE_TIMEOUT_SECS);
        let node_timeout = match Duration::try_from_secs_f64(node_timeout) {
            Ok(timeout) if !timeout.is_zero() => timeout,
            _ => {
                warn!(
                    "⚠️ API_TIMEOUT must be a positive number of seconds, using {}s",
                    DEFAULT_NODE_TIMEOUT_SECS
                );
                Duration::from_secs_f64(DEFAULT_NODE_TIMEOUT_SECS)
            }
        };

        let aggregator = AggregatorSettings {
            pact_bases,
            network_id: get("MAINNET").unwrap_or(defaults.aggregator.network_id),
            chain_count,
            default_shard: DEFAULT_SHARD.min(chain_count - 1),
            concurrency,
            node_timeout,
            fanout_deadline: Duration::from_secs(parse_or(
                &get,
                "FANOUT_DEADLINE_SEC",
                DEFAULT_FANOUT_DEADLINE_SECS,
            )),
            balance_ttl: Duration::from_secs(parse_or(
                &get,
                "BALANCE_CACHE_TTL",
                DEFAULT_BALANCE_CACHE_TTL_SECS,
            )),
            explorer_base: get("KADENA_EXPLORER_BASE").unwrap_or(defaults.aggregator.explorer_base),
            indexer,
        };

        let sources_or = |key: &str, default: &[SourceDescriptor]| {
            get(key)
                .map(|v| SourceDescriptor::parse_list(&v))
                .unwrap_or_else(|| default.to_vec())
        };

        let sources = SourceRegistry {
            kadena_tx: sources_or("KADENA_TX_SOURCES", &defaults.sources.kadena_tx),
            kadena_age: sources_or("KADENA_AGE_SOURCES", &defaults.sources.kadena_age),
            kadena_related: sources_or("KADENA_RELATED_SOURCES", &[]),
            xrpl_tx: sources_or("XRPL_TX_SOURCES", &[]),
            xrpl_age: sources_or("XRPL_AGE_SOURCES", &[]),
            scamdb: sources_or("SCAMDB_URLS", &[]),
        };

        Self {
            fallback,
            aggregator,
            sources,
            model_path: get("MODEL_PATH"),
            model_version: get("MODEL_VERSION").unwrap_or(defaults.model_version),
        }
    }

    /// Log the effective configuration. Secrets are masked.
    pub fn log_summary(&self) {
        info!("⚙️ Pact bases: {:?}", self.aggregator.pact_bases);
        info!(
            "⚙️ Network: {} ({} chains, {} in flight, node timeout {:?})",
            self.aggregator.network_id,
            self.aggregator.chain_count,
            self.aggregator.concurrency,
            self.aggregator.node_timeout
        );
        info!(
            "⚙️ Fallback: timeout {:?}, {} attempt(s)/source, metric TTL {:?}, balance TTL {:?}",
            self.fallback.request_timeout,
            self.fallback.retry_per_source,
            self.fallback.metric_ttl,
            self.aggregator.balance_ttl
        );
        match &self.aggregator.indexer {
            Some(indexer) => info!("🔑 Indexer configured at {} (key hidden)", indexer.base_url),
            None => info!("⚙️ No indexer API key, aggregate fallback disabled"),
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('/').to_string())
        .collect()
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => default,
        Some(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                warn!("⚠️ Invalid value for {}: {:?}, using default {}", key, raw, default);
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> GuardianConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GuardianConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = config_from(&[]);
        assert_eq!(config.fallback.request_timeout, Duration::from_secs(4));
        assert_eq!(config.fallback.metric_ttl, Duration::from_secs(900));
        assert_eq!(config.aggregator.balance_ttl, Duration::from_secs(20));
        assert_eq!(config.aggregator.concurrency, 6);
        assert_eq!(config.aggregator.chain_count, 20);
        assert_eq!(config.aggregator.pact_bases.len(), 3);
        assert!(config.aggregator.indexer.is_none());
        assert_eq!(config.sources.kadena_tx.len(), 1);
        assert!(config.sources.scamdb.is_empty());
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("REQUEST_TIMEOUT_SEC", "soon"),
            ("BALANCE_CONCURRENCY", "0"),
            ("API_TIMEOUT", "-3"),
        ]);
        assert_eq!(config.fallback.request_timeout, Duration::from_secs(4));
        assert_eq!(config.aggregator.concurrency, 1);
        assert_eq!(config.aggregator.node_timeout, Duration::from_secs(8));

        for raw in ["1e20", "NaN", "inf", "0"] {
            let config = config_from(&[("API_TIMEOUT", raw)]);
            assert_eq!(config.aggregator.node_timeout, Duration::from_secs(8), "API_TIMEOUT={}", raw);
        }
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("KADENA_PACT_BASES", "https://a.example/, https://b.example"),
            ("KADINDEXER_API_KEY", "secret"),
            ("KADENA_TX_SOURCES", "https://x/{address},,https://y/{address}"),
            ("BALANCE_CACHE_TTL", "5"),
            ("API_TIMEOUT", "2.5"),
        ]);
        assert_eq!(
            config.aggregator.pact_bases,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert_eq!(config.sources.kadena_tx.len(), 2);
        assert_eq!(config.aggregator.balance_ttl, Duration::from_secs(5));
        assert_eq!(config.aggregator.node_timeout, Duration::from_millis(2500));
        let indexer = config.aggregator.indexer.expect("indexer configured");
        assert_eq!(indexer.base_url, DEFAULT_INDEXER_BASE);
        assert!(!format!("{:?}", indexer).contains("secret"));
    }
}
