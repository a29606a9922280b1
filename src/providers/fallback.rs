//! Fallback Query Engine
//!
//! Asks a list of interchangeable sources for one numeric metric, strictly
//! in order, and answers with the first value the extraction heuristic can
//! find. The engine never fails: when every source is exhausted it caches and
//! returns the `0` sentinel, so a dead explorer costs at most one sweep per TTL.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::config::FallbackSettings;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::ExtractionMode;
use crate::providers::transport::{HttpRequest, HttpTransport};
use crate::utils::cache::{clock_now, QueryFingerprint, QueryParams, ValueCache};
use crate::utils::extract::extract_now;

/// Sentinel answered when no source produced a value
pub const SENTINEL: u64 = 0;

#[derive(Clone)]
pub struct FallbackQueryEngine {
    transport: Arc<dyn HttpTransport>,
    cache: ValueCache<u64>,
    settings: FallbackSettings,
}

impl FallbackQueryEngine {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        cache: ValueCache<u64>,
        settings: FallbackSettings,
    ) -> Self {
        Self {
            transport,
            cache,
            settings,
        }
    }

    pub fn cache(&self) -> &ValueCache<u64> {
        &self.cache
    }

    pub fn settings(&self) -> &FallbackSettings {
        &self.settings
    }

    /// First extractable value across `sources`, or the cached result of an
    /// identical query younger than `ttl`.
    pub async fn try_sources(
        &self,
        sources: &[String],
        params: &QueryParams,
        ttl: Duration,
        mode: ExtractionMode,
    ) -> u64 {
        let key = QueryFingerprint::new(sources, params, mode);
        if let Some(value) = self.cache.get_fresh_at(&key, ttl, clock_now()) {
            return value;
        }

        let attempts = self.settings.retry_per_source.max(1);

        for (idx, url) in sources.iter().enumerate() {
            if idx > 0 && !self.settings.source_delay.is_zero() {
                tokio::time::sleep(self.settings.source_delay).await;
            }

            for attempt in 1..=attempts {
                match self.query_source(url, params, mode).await {
                    Ok(value) => {
                        info!("✅ {} = {} from {}", mode.as_str(), value, url);
                        self.cache.put(key, value, clock_now());
                        return value;
                    }
                    Err(e) if e.code == ErrorCode::ExtractionMiss => {
                        debug!("🔍 No {} value in response of {}", mode.as_str(), url);
                        break;
                    }
                    Err(e) if !e.code.is_retryable() => {
                        debug!("⚠️ {} refused the query, moving on: {}", url, e);
                        break;
                    }
                    Err(e) => {
                        debug!(
                            "⚠️ {} attempt {}/{} failed: {}",
                            url, attempt, attempts, e
                        );
                    }
                }
            }
        }

        if !sources.is_empty() {
            warn!(
                "🚫 All {} source(s) exhausted for {} query, caching sentinel",
                sources.len(),
                mode.as_str()
            );
        }
        self.cache.put(key, SENTINEL, clock_now());
        SENTINEL
    }

    /// One attempt against one source
    async fn query_source(
        &self,
        url: &str,
        params: &QueryParams,
        mode: ExtractionMode,
    ) -> AppResult<u64> {
        let timeout = self.settings.request_timeout;
        let request = HttpRequest::get(url)
            .with_query(params.iter().map(|(k, v)| (k.clone(), v.clone())))
            .with_timeout(timeout);

        let body = tokio::time::timeout(timeout, self.transport.execute(request)).await??;

        extract_now(&body, mode).ok_or_else(|| {
            AppError::new(
                ErrorCode::ExtractionMiss,
                format!("no {} field in response", mode.as_str()),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::errors::AppError;
    use crate::providers::mock::MockTransport;
    use serde_json::json;

    fn settings(retries: u32) -> FallbackSettings {
        FallbackSettings {
            request_timeout: Duration::from_secs(4),
            retry_per_source: retries,
            source_delay: Duration::from_millis(50),
            metric_ttl: Duration::from_secs(900),
        }
    }

    fn engine(mock: &MockTransport, retries: u32) -> FallbackQueryEngine {
        FallbackQueryEngine::new(
            Arc::new(mock.clone()),
            ValueCache::new(Duration::from_secs(900)),
            settings(retries),
        )
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn addr_params() -> QueryParams {
        [("address".to_string(), "k:abc".to_string())].into_iter().collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_failing_sources_return_sentinel_and_cache_it() {
        let mock = MockTransport::failing();
        let engine = engine(&mock, 1);
        let sources = urls(&["https://a", "https://b", "https://c"]);
        let ttl = Duration::from_secs(900);

        let first = engine
            .try_sources(&sources, &QueryParams::new(), ttl, ExtractionMode::Count)
            .await;
        assert_eq!(first, 0);
        assert_eq!(mock.call_count(), 3);

        let second = engine
            .try_sources(&sources, &QueryParams::new(), ttl, ExtractionMode::Count)
            .await;
        assert_eq!(second, 0);
        assert_eq!(mock.call_count(), 3, "sentinel must be served from cache");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failover_to_second_source() {
        let mock = MockTransport::new(|req| {
            if req.url.starts_with("https://dead") {
                Err(AppError::from_status(503, "down"))
            } else {
                Ok(json!({"chains": [{"transactions": 3}, {"transactions": 5}]}))
            }
        });
        let engine = engine(&mock, 2);
        let value = engine
            .try_sources(
                &urls(&["https://dead/1", "https://live/2"]),
                &addr_params(),
                Duration::from_secs(900),
                ExtractionMode::Count,
            )
            .await;

        assert_eq!(value, 8);
        // two attempts on the dead source, one on the live one
        assert_eq!(mock.call_count(), 3);
        assert_eq!(mock.requests()[2].query_param("address"), Some("k:abc"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_source_is_not_retried() {
        let mock = MockTransport::new(|req| {
            if req.url.starts_with("https://strict") {
                Err(AppError::from_status(400, "bad request"))
            } else {
                Ok(json!({"txCount": 6}))
            }
        });
        let engine = engine(&mock, 3);
        let value = engine
            .try_sources(
                &urls(&["https://strict/1", "https://live/2"]),
                &QueryParams::new(),
                Duration::from_secs(900),
                ExtractionMode::Count,
            )
            .await;

        assert_eq!(value, 6);
        assert_eq!(mock.requests_to("https://strict").len(), 1);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_source_is_retried() {
        let mock = MockTransport::new(|_| Err(AppError::from_status(429, "slow down")));
        let engine = engine(&mock, 3);
        let value = engine
            .try_sources(
                &urls(&["https://busy"]),
                &QueryParams::new(),
                Duration::from_secs(900),
                ExtractionMode::Count,
            )
            .await;

        assert_eq!(value, 0);
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_value_makes_no_network_calls() {
        let mock = MockTransport::always(json!({"txCount": 12}));
        let engine = engine(&mock, 1);
        let sources = urls(&["https://a/{address}"]);
        let ttl = Duration::from_secs(900);

        assert_eq!(engine.try_sources(&sources, &addr_params(), ttl, ExtractionMode::Count).await, 12);
        assert_eq!(engine.try_sources(&sources, &addr_params(), ttl, ExtractionMode::Count).await, 12);
        assert_eq!(mock.call_count(), 1);
        assert_eq!(engine.cache().stats().hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mode_is_part_of_the_key() {
        let mock = MockTransport::always(json!({"txCount": 12, "ageDays": 40}));
        let engine = engine(&mock, 1);
        let sources = urls(&["https://a"]);
        let ttl = Duration::from_secs(900);

        assert_eq!(engine.try_sources(&sources, &QueryParams::new(), ttl, ExtractionMode::Count).await, 12);
        assert_eq!(engine.try_sources(&sources, &QueryParams::new(), ttl, ExtractionMode::AgeDays).await, 40);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extraction_miss_skips_to_next_source() {
        let mock = MockTransport::new(|req| {
            if req.url.contains("first") {
                Ok(json!({"status": "ok"}))
            } else {
                Ok(json!({"count": "17"}))
            }
        });
        let engine = engine(&mock, 3);
        let value = engine
            .try_sources(
                &urls(&["https://first", "https://second"]),
                &QueryParams::new(),
                Duration::from_secs(900),
                ExtractionMode::Count,
            )
            .await;
        assert_eq!(value, 17);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_times_out() {
        let mock = MockTransport::always(json!({"txCount": 5})).with_latency(Duration::from_secs(30));
        let engine = engine(&mock, 1);
        let value = engine
            .try_sources(
                &urls(&["https://slow"]),
                &QueryParams::new(),
                Duration::from_secs(900),
                ExtractionMode::Count,
            )
            .await;
        assert_eq!(value, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_still_attempts_once() {
        let mock = MockTransport::always(json!({"txCount": 2}));
        let engine = engine(&mock, 0);
        let value = engine
            .try_sources(&urls(&["https://a"]), &QueryParams::new(), Duration::from_secs(900), ExtractionMode::Count)
            .await;
        assert_eq!(value, 2);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_triggers_refetch() {
        let mock = MockTransport::always(json!({"txCount": 4}));
        let engine = engine(&mock, 1);
        let sources = urls(&["https://a"]);
        let ttl = Duration::from_secs(20);

        engine.try_sources(&sources, &QueryParams::new(), ttl, ExtractionMode::Count).await;
        tokio::time::advance(Duration::from_secs(21)).await;
        engine.try_sources(&sources, &QueryParams::new(), ttl, ExtractionMode::Count).await;
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_source_list() {
        let mock = MockTransport::failing();
        let engine = engine(&mock, 1);
        let value = engine
            .try_sources(&[], &QueryParams::new(), Duration::from_secs(900), ExtractionMode::Flag)
            .await;
        assert_eq!(value, 0);
        assert_eq!(mock.call_count(), 0);
    }
}
