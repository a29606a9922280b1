//! Telemetry Module for GuardianX
//!
//! Collects anonymous statistics about validations:
//! - Aggregator latency per request
//! - How often reports degrade to sentinel values
//! - Which risk flags fire most
//!
//! Privacy-first: no addresses are stored, only counters

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::models::types::ValidationReport;

/// Aggregated statistics for reporting
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelemetryStats {
    /// Validations completed
    pub total_validations: u64,
    /// Reports built purely from sentinels
    pub degraded_reports: u64,
    /// Balance aggregations that ran (cache misses only)
    pub total_aggregations: u64,
    /// Average aggregation latency (ms)
    pub avg_aggregation_ms: f64,
    /// Slowest aggregation seen (ms)
    pub max_aggregation_ms: u64,
    /// Average end-to-end validation latency (ms)
    pub avg_validation_ms: f64,
    /// Flag -> number of reports carrying it
    pub flags_by_name: HashMap<String, u64>,
    /// Period start timestamp
    pub period_start: u64,
    /// Period end timestamp
    pub period_end: u64,
}

impl TelemetryStats {
    /// Share of reports that carried no upstream data
    pub fn degraded_rate(&self) -> f64 {
        if self.total_validations == 0 {
            0.0
        } else {
            self.degraded_reports as f64 / self.total_validations as f64
        }
    }

    /// Export as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "📊 {} validation(s), {:.1}% degraded | aggregation avg {:.1}ms max {}ms",
            self.total_validations,
            self.degraded_rate() * 100.0,
            self.avg_aggregation_ms,
            self.max_aggregation_ms,
        )
    }
}

/// Main telemetry collector
pub struct TelemetryCollector {
    total_validations: AtomicU64,
    degraded_reports: AtomicU64,
    total_validation_ms: AtomicU64,
    total_aggregations: AtomicU64,
    total_aggregation_ms: AtomicU64,
    max_aggregation_ms: AtomicU64,
    flag_counts: RwLock<HashMap<String, u64>>,
    session_start: u64,
}

impl TelemetryCollector {
    pub fn new() -> Self {
        Self {
            total_validations: AtomicU64::new(0),
            degraded_reports: AtomicU64::new(0),
            total_validation_ms: AtomicU64::new(0),
            total_aggregations: AtomicU64::new(0),
            total_aggregation_ms: AtomicU64::new(0),
            max_aggregation_ms: AtomicU64::new(0),
            flag_counts: RwLock::new(HashMap::new()),
            session_start: current_timestamp(),
        }
    }

    /// Record one balance fan-out
    pub fn record_aggregation(&self, elapsed: Duration) {
        let ms = elapsed.as_millis() as u64;
        self.total_aggregations.fetch_add(1, Ordering::Relaxed);
        self.total_aggregation_ms.fetch_add(ms, Ordering::Relaxed);
        self.max_aggregation_ms.fetch_max(ms, Ordering::Relaxed);
    }

    /// Record a finished report
    pub fn record_validation(&self, report: &ValidationReport) {
        self.total_validations.fetch_add(1, Ordering::Relaxed);
        self.total_validation_ms
            .fetch_add(report.duration_ms, Ordering::Relaxed);

        if report.is_degraded() {
            self.degraded_reports.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut counts) = self.flag_counts.write() {
            for flag in &report.flags {
                *counts.entry(flag.clone()).or_insert(0) += 1;
            }
        }
    }

    /// Get current statistics
    pub fn get_stats(&self) -> TelemetryStats {
        let total_validations = self.total_validations.load(Ordering::Relaxed);
        let total_aggregations = self.total_aggregations.load(Ordering::Relaxed);

        let avg = |total: u64, n: u64| if n > 0 { total as f64 / n as f64 } else { 0.0 };

        TelemetryStats {
            total_validations,
            degraded_reports: self.degraded_reports.load(Ordering::Relaxed),
            total_aggregations,
            avg_aggregation_ms: avg(
                self.total_aggregation_ms.load(Ordering::Relaxed),
                total_aggregations,
            ),
            max_aggregation_ms: self.max_aggregation_ms.load(Ordering::Relaxed),
            avg_validation_ms: avg(
                self.total_validation_ms.load(Ordering::Relaxed),
                total_validations,
            ),
            flags_by_name: self
                .flag_counts
                .read()
                .map(|counts| counts.clone())
                .unwrap_or_default(),
            period_start: self.session_start,
            period_end: current_timestamp(),
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::types::{Chain, RwaCheck, ScoringMode};
    use chrono::Utc;
    use std::collections::{BTreeMap, BTreeSet};

    fn report(balance: f64, flags: &[&str]) -> ValidationReport {
        ValidationReport {
            report_id: uuid::Uuid::new_v4(),
            chain: Chain::Kadena,
            address: "k:abc".to_string(),
            score: 50.0,
            flags: flags.iter().map(|f| f.to_string()).collect::<BTreeSet<_>>(),
            rwa_check: RwaCheck::default(),
            balance,
            chain_found: None,
            per_chain: BTreeMap::new(),
            tx_count: 0,
            tx_count_24h: None,
            age_days: 0,
            is_contract: None,
            scoring_mode: ScoringMode::Rules,
            model_version: "test".to_string(),
            duration_ms: 40,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_collector_basic() {
        let collector = TelemetryCollector::new();
        collector.record_aggregation(Duration::from_millis(10));
        collector.record_aggregation(Duration::from_millis(30));
        collector.record_validation(&report(0.0, &["dormant-or-new"]));
        collector.record_validation(&report(5.0, &[]));

        let stats = collector.get_stats();
        assert_eq!(stats.total_validations, 2);
        assert_eq!(stats.degraded_reports, 1);
        assert_eq!(stats.total_aggregations, 2);
        assert_eq!(stats.avg_aggregation_ms, 20.0);
        assert_eq!(stats.max_aggregation_ms, 30);
        assert_eq!(stats.flags_by_name.get("dormant-or-new"), Some(&1));
        assert_eq!(stats.degraded_rate(), 0.5);
    }

    #[test]
    fn test_stats_json_export() {
        let stats = TelemetryStats {
            total_validations: 1000,
            degraded_reports: 12,
            ..Default::default()
        };
        let json = stats.to_json();
        assert!(json.contains("1000"));
        assert!(json.contains("degraded_reports"));
    }
}
