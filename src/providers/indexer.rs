//! Secondary Sources - Kadindexer REST API and legacy block explorer
//!
//! The indexer is only used when an API key is configured; the key travels
//! in the `x-api-key` header and never appears in logs. The explorer needs no
//! credentials and is the last resort for recent activity.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::config::IndexerSettings;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::AggregateBalance;
use crate::providers::pact::normalize_balance;
use crate::providers::transport::{HttpRequest, HttpTransport};
use crate::utils::constants::{EXPLORER_TX_PAGE_LIMIT, INDEXER_API_KEY_HEADER};
use crate::utils::extract::{coerce_count, parse_iso8601};

#[derive(Clone)]
pub struct IndexerClient {
    transport: Arc<dyn HttpTransport>,
    indexer: Option<IndexerSettings>,
    explorer_base: String,
    timeout: Duration,
}

impl IndexerClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        indexer: Option<IndexerSettings>,
        explorer_base: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            indexer,
            explorer_base: explorer_base.into(),
            timeout,
        }
    }

    pub fn has_indexer(&self) -> bool {
        self.indexer.is_some()
    }

    async fn indexer_get(&self, settings: &IndexerSettings, path: &str) -> AppResult<Value> {
        let url = format!("{}/{}", settings.base_url.trim_end_matches('/'), path);
        let request = HttpRequest::get(url)
            .with_header(INDEXER_API_KEY_HEADER, settings.api_key.as_str())
            .with_timeout(self.timeout);
        tokio::time::timeout(self.timeout, self.transport.execute(request)).await?
    }

    /// Aggregate balance from the indexer. A response without a per-chain
    /// breakdown is rejected so the total always equals the sum of its parts.
    pub async fn aggregate_balance(&self, address: &str) -> AppResult<AggregateBalance> {
        let settings = self
            .indexer
            .as_ref()
            .ok_or_else(|| AppError::no_endpoints("Indexer API key not configured"))?;

        let body = self
            .indexer_get(settings, &format!("account/{}/balance", address))
            .await?;
        let aggregate = parse_indexer_balance(&body)?;

        if let Some(reported) = body.get("total").and_then(normalize_balance) {
            if (reported - aggregate.total).abs() > 1e-9 {
                debug!(
                    "Indexer total {} differs from per-chain sum {}, using the sum",
                    reported, aggregate.total
                );
            }
        }
        Ok(aggregate)
    }

    /// Transactions in the last 24 hours. Indexer first, explorer second;
    /// `None` when neither could answer.
    pub async fn tx_count_24h(&self, address: &str) -> Option<u64> {
        if let Some(settings) = &self.indexer {
            match self
                .indexer_get(settings, &format!("account/{}/txcount24h", address))
                .await
            {
                Ok(body) => match body.get("txcount24h").and_then(coerce_count) {
                    Some(n) => return Some(n),
                    None => debug!("Indexer txcount24h response without a count"),
                },
                Err(e) => debug!("⚠️ Indexer txcount24h failed: {}", e),
            }
        }

        match self.explorer_recent_transactions(address).await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!("⚠️ Explorer tx lookup failed: {}", e);
                None
            }
        }
    }

    async fn explorer_recent_transactions(&self, address: &str) -> AppResult<u64> {
        let url = format!("{}/transactions", self.explorer_base.trim_end_matches('/'));
        let request = HttpRequest::get(url)
            .with_query([
                ("search", address.to_string()),
                ("limit", EXPLORER_TX_PAGE_LIMIT.to_string()),
            ])
            .with_timeout(self.timeout);
        let body = tokio::time::timeout(self.timeout, self.transport.execute(request)).await??;

        let items = body
            .get("items")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(count_since(items, Utc::now() - ChronoDuration::hours(24)))
    }
}

/// `{"total": n, "per_chain": {"0": n, ...}}` into an aggregate
pub fn parse_indexer_balance(body: &Value) -> AppResult<AggregateBalance> {
    let per_chain = body
        .get("per_chain")
        .and_then(Value::as_object)
        .ok_or_else(|| AppError::invalid_response("Indexer balance without per_chain breakdown"))?;

    let entries = per_chain.iter().filter_map(|(chain, value)| {
        let chain_id = chain.trim().parse::<u32>().ok()?;
        Some((chain_id, normalize_balance(value)?))
    });
    Ok(AggregateBalance::from_per_chain(entries))
}

/// Explorer items stamped at or after `cutoff`
pub fn count_since(items: &[Value], cutoff: DateTime<Utc>) -> u64 {
    items
        .iter()
        .filter_map(|item| item.get("creationTime").or_else(|| item.get("timestamp")))
        .filter_map(item_timestamp)
        .filter(|ts| *ts >= cutoff)
        .count() as u64
}

fn item_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => DateTime::from_timestamp(n.as_f64()?.trunc() as i64, 0),
        Value::String(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => {
            DateTime::from_timestamp(s.parse::<i64>().ok()?, 0)
        }
        Value::String(s) => parse_iso8601(s),
        _ => None,
    }
}

/// Contract-likeness from the principal prefix: guarded principals
/// (`m:`, `u:`, `c:`) are module or capability owned, keyset principals
/// (`k:`, `w:`, `r:`) are plain accounts. Vanity names are unknown.
pub fn is_contract_address(address: &str) -> Option<bool> {
    match address.trim().get(..2) {
        Some("m:") | Some("u:") | Some("c:") => Some(true),
        Some("k:") | Some("w:") | Some("r:") => Some(false),
        _ => None,
    }
}
