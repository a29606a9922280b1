//! Model-Assisted Risk Scoring Module
//!
//! Hybrid mode: a classifier scores a fixed-order feature vector while
//! independent threshold rules derive the advisory flags.
//!
//! Feature order (must match the model's training order):
//! 1. tx_count
//! 2. age_days
//! 3. balance
//! 4. related_address_count
//! 5. scam_flag (0/1)
//!
//! A failing classifier never fails the assessment: the score becomes 0.0
//! and the failure is logged.

use eyre::{ensure, eyre, WrapErr};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, warn};

pub const FEATURE_NAMES: [&str; 5] = [
    "tx_count",
    "age_days",
    "balance",
    "related_address_count",
    "scam_flag",
];

/// Score substituted when the classifier fails
pub const FALLBACK_MODEL_SCORE: f64 = 0.0;

// ============================================
// FLAG THRESHOLDS
// ============================================

pub mod thresholds {
    /// Fewer transactions than this → `low_tx`
    pub const LOW_TX: u64 = 3;
    /// Younger than this many days → `new_address`
    pub const NEW_ADDRESS_DAYS: u64 = 30;
    /// Less balance than this → `low_balance`
    pub const LOW_BALANCE: f64 = 1.0;
    /// More related addresses than this → `many_related_addr`
    pub const MANY_RELATED: u64 = 10;
}

/// Inputs of the classifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub tx_count: u64,
    pub age_days: u64,
    pub balance: f64,
    pub related_address_count: u64,
    pub scam_flag: bool,
}

impl FeatureVector {
    /// Values in `FEATURE_NAMES` order
    pub fn as_array(&self) -> [f64; 5] {
        [
            self.tx_count as f64,
            self.age_days as f64,
            self.balance,
            self.related_address_count as f64,
            if self.scam_flag { 1.0 } else { 0.0 },
        ]
    }
}

/// Anything that turns a feature vector into a risk score
pub trait RiskClassifier: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> eyre::Result<f64>;

    fn version(&self) -> &str {
        "unversioned"
    }
}

/// Linear model with optional logistic squashing onto [0, 100]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedClassifier {
    pub bias: f64,
    /// One weight per feature, in `FEATURE_NAMES` order
    pub weights: Vec<f64>,
    #[serde(default)]
    pub logistic: bool,
    #[serde(default)]
    pub version: Option<String>,
}

impl WeightedClassifier {
    pub fn from_json_str(raw: &str) -> eyre::Result<Self> {
        let model: Self = serde_json::from_str(raw).wrap_err("Invalid model JSON")?;
        ensure!(
            model.weights.len() == FEATURE_NAMES.len(),
            "Model has {} weights, expected {}",
            model.weights.len(),
            FEATURE_NAMES.len()
        );
        ensure!(
            model.bias.is_finite() && model.weights.iter().all(|w| w.is_finite()),
            "Model parameters must be finite"
        );
        Ok(model)
    }

    /// Load weights from a JSON file
    pub fn load(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Cannot read model file {}", path.display()))?;
        let model = Self::from_json_str(&raw)?;
        info!("🤖 Loaded risk model {} from {}", model.version(), path.display());
        Ok(model)
    }
}

impl RiskClassifier for WeightedClassifier {
    fn predict(&self, features: &FeatureVector) -> eyre::Result<f64> {
        let linear = self.bias
            + self
                .weights
                .iter()
                .zip(features.as_array())
                .map(|(w, x)| w * x)
                .sum::<f64>();

        let score = if self.logistic {
            100.0 / (1.0 + (-linear).exp())
        } else {
            linear
        };

        if score.is_finite() {
            Ok(score)
        } else {
            Err(eyre!("Non-finite model output for {:?}", features))
        }
    }

    fn version(&self) -> &str {
        self.version.as_deref().unwrap_or("unversioned")
    }
}

/// Hybrid score with its flags and the features it was computed from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelAssessment {
    /// Score in [0, 100]
    pub score: f64,
    pub flags: BTreeSet<String>,
    pub features: FeatureVector,
}

/// Threshold flags, independent of the classifier
pub fn hybrid_flags(features: &FeatureVector) -> BTreeSet<String> {
    let mut flags = BTreeSet::new();
    if features.scam_flag {
        flags.insert("scamdb".to_string());
    }
    if features.tx_count < thresholds::LOW_TX {
        flags.insert("low_tx".to_string());
    }
    if features.age_days < thresholds::NEW_ADDRESS_DAYS {
        flags.insert("new_address".to_string());
    }
    if features.balance < thresholds::LOW_BALANCE {
        flags.insert("low_balance".to_string());
    }
    if features.related_address_count > thresholds::MANY_RELATED {
        flags.insert("many_related_addr".to_string());
    }
    flags
}

/// Score `features` with `classifier`, falling back to 0.0 on failure
pub fn hybrid_risk_score(classifier: &dyn RiskClassifier, features: FeatureVector) -> ModelAssessment {
    let score = match classifier.predict(&features) {
        Ok(score) if score.is_finite() => score.clamp(0.0, 100.0),
        Ok(score) => {
            warn!("⚠️ Model {} returned {}, using fallback score", classifier.version(), score);
            FALLBACK_MODEL_SCORE
        }
        Err(e) => {
            warn!("⚠️ Model {} prediction failed: {:#}, features={:?}", classifier.version(), e, features);
            FALLBACK_MODEL_SCORE
        }
    };

    let flags = hybrid_flags(&features);
    debug!("🤖 Hybrid score {:.2}, flags {:?}", score, flags);

    ModelAssessment {
        score,
        flags,
        features,
    }
}
