//! Risk Scoring Module
//! Deterministic rule baseline: a 0-100 score plus advisory flags
//!
//! - Base 50 (neutral)
//! - Balance bonus: `min(15, floor(log10(balance + 1) * 6))`
//! - Activity bonus: +10 at >= 20 transactions in 24h, +5 at >= 5
//! - Contract-like principal: -10
//!
//! Unknown inputs (`None`) contribute nothing.

use std::collections::BTreeSet;
use tracing::debug;

use crate::models::types::RiskAssessment;
use crate::utils::constants::{BASE_RISK_SCORE, MAX_BALANCE_BONUS};

pub const FLAG_CONTRACT_LIKE: &str = "contract-like";
pub const FLAG_DORMANT_OR_NEW: &str = "dormant-or-new";

/// Balance contribution, in [0, 15] and monotone in `balance`
pub fn log_bonus(balance: f64) -> i32 {
    if balance.is_nan() || balance <= 0.0 {
        return 0;
    }
    let bonus = ((balance + 1.0).log10() * 6.0).floor();
    (bonus as i32).clamp(0, MAX_BALANCE_BONUS)
}

/// Activity contribution from the 24h transaction count
pub fn activity_bonus(tx_count_24h: Option<u64>) -> i32 {
    match tx_count_24h {
        Some(n) if n >= 20 => 10,
        Some(n) if n >= 5 => 5,
        _ => 0,
    }
}

/// Individual factor contributing to score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreFactor {
    pub name: &'static str,
    pub delta: i32,
}

/// Builder for the rule baseline
#[derive(Debug, Clone)]
pub struct RiskScoreBuilder {
    balance: f64,
    tx_count_24h: Option<u64>,
    is_contract: Option<bool>,
}

impl RiskScoreBuilder {
    pub fn new() -> Self {
        Self {
            balance: 0.0,
            tx_count_24h: None,
            is_contract: None,
        }
    }

    pub fn with_balance(mut self, balance: f64) -> Self {
        self.balance = balance;
        self
    }

    pub fn with_tx_count_24h(mut self, tx_count_24h: Option<u64>) -> Self {
        self.tx_count_24h = tx_count_24h;
        self
    }

    pub fn with_contract(mut self, is_contract: Option<bool>) -> Self {
        self.is_contract = is_contract;
        self
    }

    /// Non-zero contributions, in application order
    pub fn factors(&self) -> Vec<ScoreFactor> {
        let contract = if self.is_contract == Some(true) { -10 } else { 0 };
        [
            ScoreFactor { name: "balance", delta: log_bonus(self.balance) },
            ScoreFactor { name: "activity", delta: activity_bonus(self.tx_count_24h) },
            ScoreFactor { name: "contract", delta: contract },
        ]
        .into_iter()
        .filter(|f| f.delta != 0)
        .collect()
    }

    pub fn build(self) -> RiskAssessment {
        let factors = self.factors();
        let raw = BASE_RISK_SCORE + factors.iter().map(|f| f.delta).sum::<i32>();
        let score = raw.clamp(0, 100) as u8;

        let mut flags = BTreeSet::new();
        if self.is_contract == Some(true) {
            flags.insert(FLAG_CONTRACT_LIKE.to_string());
        }
        if self.balance == 0.0 && matches!(self.tx_count_24h, None | Some(0)) {
            flags.insert(FLAG_DORMANT_OR_NEW.to_string());
        }

        debug!("📐 Rule score {} from {:?}", score, factors);
        RiskAssessment { score, flags }
    }
}

impl Default for RiskScoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Rule-baseline score of an account
pub fn risk_score(
    balance: f64,
    tx_count_24h: Option<u64>,
    is_contract: Option<bool>,
) -> RiskAssessment {
    RiskScoreBuilder::new()
        .with_balance(balance)
        .with_tx_count_24h(tx_count_24h)
        .with_contract(is_contract)
        .build()
}
