//! Chain Balance Aggregator
//!
//! Sums an account's balance over every Kadena chain:
//! 1. Fresh cached aggregate is returned as-is
//! 2. One `coin.get-balance` local query per chain, at most `concurrency`
//!    in flight, the whole fan-out bounded by one deadline
//! 3. All-zero result → the default chain is asked once more on its own
//! 4. Still zero and an indexer key is configured → indexer aggregate
//! 5. Result (zero included) is cached under the balance TTL
//!
//! Never fails; total upstream failure yields `AggregateBalance::empty()`.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::models::config::AggregatorSettings;
use crate::models::types::{AggregateBalance, PerChainBalances};
use crate::providers::indexer::IndexerClient;
use crate::providers::pact::{PactClient, ShardQueryResult};
use crate::providers::transport::HttpTransport;
use crate::utils::cache::{clock_now, QueryFingerprint, ValueCache};
use crate::utils::telemetry::TelemetryCollector;

#[derive(Clone)]
pub struct BalanceAggregator {
    pact: PactClient,
    indexer: IndexerClient,
    cache: ValueCache<AggregateBalance>,
    settings: AggregatorSettings,
    telemetry: Option<Arc<TelemetryCollector>>,
}

impl BalanceAggregator {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        cache: ValueCache<AggregateBalance>,
        settings: AggregatorSettings,
    ) -> Self {
        let pact = PactClient::new(
            transport.clone(),
            settings.pact_bases.clone(),
            settings.network_id.clone(),
            settings.node_timeout,
        );
        let indexer = IndexerClient::new(
            transport,
            settings.indexer.clone(),
            settings.explorer_base.clone(),
            settings.node_timeout,
        );

        Self {
            pact,
            indexer,
            cache,
            settings,
            telemetry: None,
        }
    }

    /// Report fan-out durations to `telemetry`
    pub fn with_telemetry(mut self, telemetry: Arc<TelemetryCollector>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn indexer(&self) -> &IndexerClient {
        &self.indexer
    }

    pub fn cache(&self) -> &ValueCache<AggregateBalance> {
        &self.cache
    }

    fn cache_key(address: &str) -> QueryFingerprint {
        QueryFingerprint::raw(format!("balance:{}", address))
    }

    /// Total balance across chains with its per-chain breakdown
    pub async fn get_balance_any_chain(&self, address: &str) -> AggregateBalance {
        let key = Self::cache_key(address);
        if let Some(hit) = self.cache.get_fresh_at(&key, self.settings.balance_ttl, clock_now()) {
            return hit;
        }

        let started = Instant::now();
        let result = self.aggregate(address).await;
        let elapsed = started.elapsed();

        if let Some(telemetry) = &self.telemetry {
            telemetry.record_aggregation(elapsed);
        }
        info!(
            "💰 {} total={} chain={:?} chains_with_balance={} ({}ms)",
            address,
            result.total,
            result.winning_chain,
            result.per_chain.len(),
            elapsed.as_millis()
        );

        self.cache.put(key, result.clone(), clock_now());
        result
    }

    async fn aggregate(&self, address: &str) -> AggregateBalance {
        let shards: Vec<u32> = (0..self.settings.chain_count).collect();
        let fanned = self.fan_out(address, &shards).await;
        if !fanned.is_empty() {
            return AggregateBalance::from_per_chain(fanned);
        }

        let default_shard = self.settings.default_shard;
        debug!("🔄 All chains empty for {}, retrying chain {}", address, default_shard);
        let retried = self.fan_out(address, &[default_shard]).await;
        if !retried.is_empty() {
            return AggregateBalance::from_per_chain(retried);
        }

        if self.indexer.has_indexer() {
            match self.indexer.aggregate_balance(address).await {
                Ok(aggregate) => {
                    info!("🔑 Indexer aggregate used for {}", address);
                    return aggregate;
                }
                Err(e) => warn!("⚠️ Indexer balance fallback failed: {}", e),
            }
        }

        AggregateBalance::empty()
    }

    /// Query `shards` concurrently; positive balances only
    async fn fan_out(&self, address: &str, shards: &[u32]) -> PerChainBalances {
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for &chain_id in shards {
            let pact = self.pact.clone();
            let semaphore = semaphore.clone();
            let address = address.to_string();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                pact.query_balance(chain_id, &address).await
            });
        }

        let mut per_chain = PerChainBalances::new();
        let collect = async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(result) => record(&mut per_chain, result),
                    Err(e) => debug!("Shard task ended abnormally: {}", e),
                }
            }
        };

        let finished = tokio::time::timeout(self.settings.fanout_deadline, collect).await;
        if finished.is_err() {
            warn!(
                "⏱️ Fan-out deadline {:?} reached, {} chain(s) abandoned",
                self.settings.fanout_deadline,
                tasks.len()
            );
            tasks.abort_all();
        }

        per_chain
    }
}

fn record(per_chain: &mut PerChainBalances, result: ShardQueryResult) {
    match (&result.outcome, result.balance()) {
        (_, Some(balance)) => {
            per_chain.insert(result.chain_id, balance);
        }
        (Err(e), None) => debug!("Chain {} failed: {}", result.chain_id, e),
        (Ok(_), None) => {}
    }
}
