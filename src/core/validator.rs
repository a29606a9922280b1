//! Address Validator - orchestrates one validation request
//!
//! Gathers every metric concurrently, scores it and hands a complete
//! `ValidationReport` to the caller. Upstream failures only ever show up as
//! sentinel values and flags; `validate` itself cannot fail.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::core::aggregator::BalanceAggregator;
use crate::core::ml_risk::{hybrid_risk_score, FeatureVector, RiskClassifier, WeightedClassifier};
use crate::core::risk_score::risk_score;
use crate::models::config::GuardianConfig;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::{
    AggregateBalance, Chain, ExtractionMode, RwaCheck, ScoringMode, ValidationReport,
};
use crate::providers::fallback::FallbackQueryEngine;
use crate::providers::indexer::is_contract_address;
use crate::providers::transport::{HttpTransport, ReqwestTransport};
use crate::utils::cache::{QueryParams, ValueCache};
use crate::utils::source::{format_sources, SourceDescriptor};
use crate::utils::telemetry::TelemetryCollector;

/// Real-world-asset lookup for an address
#[async_trait]
pub trait RwaChecker: Send + Sync {
    async fn check(&self, chain: Chain, address: &str) -> RwaCheck;
}

/// No RWA registry wired in: empty tokens and flags
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRwaChecker;

#[async_trait]
impl RwaChecker for NoopRwaChecker {
    async fn check(&self, _chain: Chain, _address: &str) -> RwaCheck {
        RwaCheck::default()
    }
}

/// Renders a finished report for the outside world
pub trait ReportGenerator: Send + Sync {
    fn content_type(&self) -> &'static str;
    fn render(&self, report: &ValidationReport) -> AppResult<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReportGenerator {
    pub pretty: bool,
}

impl ReportGenerator for JsonReportGenerator {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn render(&self, report: &ValidationReport) -> AppResult<String> {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(report)
        } else {
            serde_json::to_string(report)
        };
        rendered.map_err(|e| AppError::with_source(ErrorCode::Unknown, "Report serialization failed", e))
    }
}

/// Raw metrics of one address, before scoring
#[derive(Debug, Clone, Default)]
struct Metrics {
    balance: AggregateBalance,
    tx_count: u64,
    tx_count_24h: Option<u64>,
    age_days: u64,
    related_address_count: u64,
    scam_flag: bool,
    is_contract: Option<bool>,
}

pub struct AddressValidator {
    config: GuardianConfig,
    engine: FallbackQueryEngine,
    aggregator: BalanceAggregator,
    classifier: Option<Arc<dyn RiskClassifier>>,
    rwa: Arc<dyn RwaChecker>,
    telemetry: Arc<TelemetryCollector>,
}

impl AddressValidator {
    /// Validator over the production HTTP client
    pub fn from_config(config: GuardianConfig) -> AppResult<Self> {
        let transport = Arc::new(ReqwestTransport::new()?);
        Ok(Self::new(config, transport))
    }

    /// Validator over any transport. A model configured through `model_path`
    /// is loaded here; an unreadable model leaves the rule baseline in charge.
    pub fn new(config: GuardianConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let telemetry = Arc::new(TelemetryCollector::new());

        let engine = FallbackQueryEngine::new(
            transport.clone(),
            ValueCache::new(config.fallback.metric_ttl),
            config.fallback.clone(),
        );
        let aggregator = BalanceAggregator::new(
            transport,
            ValueCache::new(config.aggregator.balance_ttl),
            config.aggregator.clone(),
        )
        .with_telemetry(telemetry.clone());

        let classifier = config.model_path.as_deref().and_then(|path| {
            match WeightedClassifier::load(path) {
                Ok(model) => Some(Arc::new(model) as Arc<dyn RiskClassifier>),
                Err(e) => {
                    warn!("⚠️ Risk model unavailable ({:#}), using rule baseline", e);
                    None
                }
            }
        });

        Self {
            config,
            engine,
            aggregator,
            classifier,
            rwa: Arc::new(NoopRwaChecker),
            telemetry,
        }
    }

    /// Score with `classifier` instead of the rule baseline
    pub fn with_classifier(mut self, classifier: Arc<dyn RiskClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_rwa_checker(mut self, rwa: Arc<dyn RwaChecker>) -> Self {
        self.rwa = rwa;
        self
    }

    pub fn telemetry(&self) -> &Arc<TelemetryCollector> {
        &self.telemetry
    }

    pub fn scoring_mode(&self) -> ScoringMode {
        if self.classifier.is_some() {
            ScoringMode::Hybrid
        } else {
            ScoringMode::Rules
        }
    }

    /// Full assessment of `address` on `chain`
    pub async fn validate(&self, chain: Chain, address: &str) -> ValidationReport {
        let started = Instant::now();

        let (metrics, rwa_check) = tokio::join!(
            self.gather(chain, address),
            self.rwa.check(chain, address)
        );

        let (score, flags, model_version) = match &self.classifier {
            Some(classifier) => {
                let features = FeatureVector {
                    tx_count: metrics.tx_count,
                    age_days: metrics.age_days,
                    balance: metrics.balance.total,
                    related_address_count: metrics.related_address_count,
                    scam_flag: metrics.scam_flag,
                };
                let assessment = hybrid_risk_score(classifier.as_ref(), features);
                (assessment.score, assessment.flags, classifier.version().to_string())
            }
            None => {
                let assessment =
                    risk_score(metrics.balance.total, metrics.tx_count_24h, metrics.is_contract);
                (
                    f64::from(assessment.score),
                    assessment.flags,
                    self.config.model_version.clone(),
                )
            }
        };

        let report = ValidationReport {
            report_id: uuid::Uuid::new_v4(),
            chain,
            address: address.to_string(),
            score,
            flags,
            rwa_check,
            balance: metrics.balance.total,
            chain_found: metrics.balance.winning_chain,
            per_chain: metrics.balance.per_chain,
            tx_count: metrics.tx_count,
            tx_count_24h: metrics.tx_count_24h,
            age_days: metrics.age_days,
            is_contract: metrics.is_contract,
            scoring_mode: self.scoring_mode(),
            model_version,
            duration_ms: started.elapsed().as_millis() as u64,
            generated_at: Utc::now(),
        };

        self.telemetry.record_validation(&report);
        info!("📋 {} ({}ms)", report.summary(), report.duration_ms);
        report
    }

    async fn gather(&self, chain: Chain, address: &str) -> Metrics {
        match chain {
            Chain::Kadena => self.gather_kadena(address).await,
            Chain::Xrpl => self.gather_xrpl(address).await,
        }
    }

    async fn gather_kadena(&self, address: &str) -> Metrics {
        let sources = &self.config.sources;
        let (balance, tx_count_24h, tx_count, age_days, related, scam_flag) = tokio::join!(
            self.aggregator.get_balance_any_chain(address),
            self.aggregator.indexer().tx_count_24h(address),
            self.metric(&sources.kadena_tx, address, ExtractionMode::Count),
            self.metric(&sources.kadena_age, address, ExtractionMode::AgeDays),
            self.metric(&sources.kadena_related, address, ExtractionMode::Count),
            self.scam_flag(address),
        );

        Metrics {
            balance,
            tx_count,
            tx_count_24h,
            age_days,
            related_address_count: related,
            scam_flag,
            is_contract: is_contract_address(address),
        }
    }

    /// XRPL has no balance aggregator; only configured explorer sources count
    async fn gather_xrpl(&self, address: &str) -> Metrics {
        let sources = &self.config.sources;
        let (tx_count, age_days, scam_flag) = tokio::join!(
            self.metric(&sources.xrpl_tx, address, ExtractionMode::Count),
            self.metric(&sources.xrpl_age, address, ExtractionMode::AgeDays),
            self.scam_flag(address),
        );

        Metrics {
            tx_count,
            age_days,
            scam_flag,
            ..Metrics::default()
        }
    }

    async fn metric(
        &self,
        templates: &[SourceDescriptor],
        address: &str,
        mode: ExtractionMode,
    ) -> u64 {
        if templates.is_empty() {
            return 0;
        }
        let urls = format_sources(templates, address);
        self.engine
            .try_sources(&urls, &QueryParams::new(), self.config.fallback.metric_ttl, mode)
            .await
    }

    async fn scam_flag(&self, address: &str) -> bool {
        let templates = &self.config.sources.scamdb;
        if templates.is_empty() {
            return false;
        }
        let urls = format_sources(templates, address);
        let params: QueryParams = [("address".to_string(), address.to_string())]
            .into_iter()
            .collect();
        self.engine
            .try_sources(&urls, &params, self.config.fallback.metric_ttl, ExtractionMode::Flag)
            .await
            > 0
    }
}
