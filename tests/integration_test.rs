//! Integration tests for GuardianX
//!
//! Every test drives the public API over a scripted transport; nothing here
//! touches the network.

use guardianx::{
    core::risk_score::{log_bonus, risk_score},
    models::{AggregatorSettings, ExtractionMode, IndexerSettings, ScoringMode},
    providers::HttpRequest,
    utils::{format_sources, QueryParams, SourceDescriptor},
    AddressValidator, AppError, BalanceAggregator, Chain, FallbackQueryEngine, GuardianConfig,
    JsonReportGenerator, MockTransport, ReportGenerator, ValueCache,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const ADDRESS: &str = "k:4d7a9c2e";

fn chain_of(req: &HttpRequest) -> Option<u32> {
    req.url
        .split("/chain/")
        .nth(1)?
        .split('/')
        .next()?
        .parse()
        .ok()
}

fn pact_success(value: Value) -> Value {
    json!({"result": {"status": "success", "data": value}})
}

/// Nodes answering from `balances`, explorer answering `explorer_body`
fn scripted_upstreams(balances: HashMap<u32, Value>, explorer_body: Value) -> MockTransport {
    MockTransport::new(move |req| {
        if let Some(chain) = chain_of(req) {
            return match balances.get(&chain) {
                Some(v) => Ok(pact_success(v.clone())),
                None => Ok(json!({"result": {"status": "failure", "error": {"message": "row not found"}}})),
            };
        }
        if req.url.contains("/account/") {
            return Ok(explorer_body.clone());
        }
        Err(AppError::connection_failed(format!("no route for {}", req.url)))
    })
}

fn test_config() -> GuardianConfig {
    let mut config = GuardianConfig::default();
    config.aggregator.pact_bases = vec!["https://node-a".to_string(), "https://node-b".to_string()];
    config.fallback.source_delay = Duration::ZERO;
    config
}

#[tokio::test]
async fn test_end_to_end_kadena_report() {
    let now_ms = chrono::Utc::now().timestamp_millis();
    let forty_days_ms = 40 * 86_400 * 1000;
    let mock = scripted_upstreams(
        HashMap::from([(0, json!({"int": "5"})), (3, json!({"decimal": "2.0"}))]),
        json!({"chains": [
            {"transactions": 3, "firstSeen": now_ms - forty_days_ms},
            {"transactions": 5, "firstSeen": now_ms - 1000}
        ]}),
    );

    let validator = AddressValidator::new(test_config(), Arc::new(mock.clone()));
    let report = validator.validate(Chain::Kadena, ADDRESS).await;

    assert_eq!(report.balance, 7.0);
    assert_eq!(report.per_chain.len(), 2);
    assert_eq!(report.chain_found, Some(0));
    assert_eq!(report.tx_count, 8);
    assert_eq!(report.age_days, 40);
    assert_eq!(report.is_contract, Some(false));
    assert_eq!(report.scoring_mode, ScoringMode::Rules);

    // explorer 24h lookup has no route, so activity is unknown
    assert_eq!(report.tx_count_24h, None);
    let expected = risk_score(7.0, None, Some(false));
    assert_eq!(report.score, f64::from(expected.score));
    assert_eq!(report.score, f64::from(50 + log_bonus(7.0) as u8));
    assert!(report.flags.is_empty());

    let rendered = JsonReportGenerator::default().render(&report).unwrap();
    assert!(rendered.contains("\"balance\":7.0"));
}

#[tokio::test]
async fn test_second_validation_is_served_from_caches() {
    let mock = scripted_upstreams(
        HashMap::from([(2, json!(1.5))]),
        json!({"txCount": 4, "ageDays": 9}),
    );
    let validator = AddressValidator::new(test_config(), Arc::new(mock.clone()));

    validator.validate(Chain::Kadena, ADDRESS).await;
    let pact_calls = mock.requests_to("/pact/").len();
    let account_calls = mock.requests_to("/account/").len();

    validator.validate(Chain::Kadena, ADDRESS).await;
    assert_eq!(mock.requests_to("/pact/").len(), pact_calls);
    assert_eq!(mock.requests_to("/account/").len(), account_calls);
}

#[tokio::test]
async fn test_total_upstream_failure_never_errors() {
    let validator = AddressValidator::new(test_config(), Arc::new(MockTransport::failing()));

    for chain in [Chain::Kadena, Chain::Xrpl] {
        let report = validator.validate(chain, ADDRESS).await;
        assert_eq!(report.balance, 0.0);
        assert_eq!(report.tx_count, 0);
        assert_eq!(report.age_days, 0);
        assert!(report.flags.contains("dormant-or-new"));
        assert!((0.0..=100.0).contains(&report.score));
    }
    assert_eq!(validator.telemetry().get_stats().total_validations, 2);
}

#[tokio::test]
async fn test_aggregator_reports_positive_chains_only() {
    let mock = scripted_upstreams(
        HashMap::from([(0, json!(5.0)), (3, json!("2.0")), (4, json!(0)), (5, json!(-1))]),
        json!({}),
    );
    let settings = AggregatorSettings {
        pact_bases: vec!["https://node".to_string()],
        ..AggregatorSettings::default()
    };
    let aggregator =
        BalanceAggregator::new(Arc::new(mock), ValueCache::new(Duration::from_secs(20)), settings);

    let agg = aggregator.get_balance_any_chain(ADDRESS).await;
    assert_eq!(agg.total, 7.0);
    assert_eq!(agg.per_chain.keys().copied().collect::<Vec<_>>(), vec![0, 3]);
    assert_eq!(agg.winning_chain, Some(0));
    assert_eq!(agg.total, agg.per_chain.values().sum::<f64>());
}

#[tokio::test]
async fn test_aggregator_uses_indexer_after_empty_fanout() {
    let mock = MockTransport::new(|req| {
        if req.url.contains("kadindexer") {
            assert_eq!(req.header("x-api-key"), Some("k3y"));
            Ok(json!({"total": 12.0, "per_chain": {"8": 12.0}}))
        } else {
            Err(AppError::from_status(503, "maintenance"))
        }
    });
    let settings = AggregatorSettings {
        pact_bases: vec!["https://node".to_string()],
        indexer: Some(IndexerSettings {
            base_url: "https://api.mainnet.kadindexer.io/v1".to_string(),
            api_key: "k3y".to_string(),
        }),
        ..AggregatorSettings::default()
    };
    let aggregator = BalanceAggregator::new(
        Arc::new(mock.clone()),
        ValueCache::new(Duration::from_secs(20)),
        settings,
    );

    let agg = aggregator.get_balance_any_chain(ADDRESS).await;
    assert_eq!(agg.total, 12.0);
    assert_eq!(agg.winning_chain, Some(8));
    assert_eq!(mock.requests_to("kadindexer").len(), 1);
}

#[tokio::test]
async fn test_malformed_template_does_not_block_other_sources() {
    let sources = SourceDescriptor::parse_list(
        "https://broken.example/{addr}/tx,https://good.example/account/{address}",
    );
    let urls = format_sources(&sources, ADDRESS);
    assert_eq!(urls[0], "https://broken.example/{addr}/tx");

    let mock = MockTransport::new(|req| {
        if req.url.starts_with("https://good.example") {
            Ok(json!({"transactions": [1, 2, 3, 4]}))
        } else {
            Err(AppError::from_status(404, "not found"))
        }
    });
    let engine = FallbackQueryEngine::new(
        Arc::new(mock.clone()),
        ValueCache::new(Duration::from_secs(900)),
        test_config().fallback,
    );
    let value = engine
        .try_sources(&urls, &QueryParams::new(), Duration::from_secs(900), ExtractionMode::Count)
        .await;

    assert_eq!(value, 4);
    assert_eq!(mock.call_count(), 2);
    assert_eq!(mock.requests()[1].url, format!("https://good.example/account/{}", ADDRESS));
}

#[test]
fn test_config_from_lookup_never_fails() {
    let env: HashMap<&str, &str> = HashMap::from([
        ("RETRY_PER_SOURCE", "many"),
        ("BALANCE_CONCURRENCY", "-1"),
        ("SCAMDB_URLS", "https://scamdb.example/api/check"),
    ]);
    let config = GuardianConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()));

    assert_eq!(config.fallback.retry_per_source, 1);
    assert_eq!(config.aggregator.concurrency, 6);
    assert_eq!(config.sources.scamdb.len(), 1);
}
