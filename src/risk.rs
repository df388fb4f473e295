//! Risk tier assignment
//!
//! The forest's outlier verdict gates risk elevation; severity of an
//! elevated record is rule-driven, so every verdict carries a reason an
//! analyst can audit instead of a bare score.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::features::UnseenCategory;
use crate::parser::{AuthStatus, ParsedRecord};

/// Account names that escalate an outlier straight to high risk.
pub const PRIVILEGED_USERS: [&str; 2] = ["root", "admin"];

/// Final categorical verdict for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scored and classified record handed to report consumers.
#[derive(Debug, Clone)]
pub struct RiskResult {
    pub record: ParsedRecord,
    pub anomaly_score: f64,
    pub is_outlier: bool,
    pub risk_level: RiskLevel,
    /// Human-readable justification; always embeds the score.
    pub reason: String,
}

pub fn is_privileged(user: &str) -> bool {
    PRIVILEGED_USERS.contains(&user)
}

/// Map a forest verdict onto a risk tier.
///
/// Non-outliers are always low. Outliers touching a privileged account or a
/// failed authentication are high; remaining outliers are medium. Unseen
/// categories reported by the encoder are appended to the reason so the
/// analyst sees why the encoding was degraded.
pub fn classify(
    record: &ParsedRecord,
    anomaly_score: f64,
    is_outlier: bool,
    unseen: &[UnseenCategory],
) -> (RiskLevel, String) {
    let (level, mut reason) = if !is_outlier {
        (
            RiskLevel::Low,
            format!("within normal profile (score={:.4})", anomaly_score),
        )
    } else if is_privileged(&record.user) {
        (
            RiskLevel::High,
            format!(
                "anomaly on privileged account '{}' (score={:.4})",
                record.user, anomaly_score
            ),
        )
    } else if record.status == AuthStatus::Failed {
        (
            RiskLevel::High,
            format!("anomalous failed authentication (score={:.4})", anomaly_score),
        )
    } else {
        (
            RiskLevel::Medium,
            format!("detected as anomaly (score={:.4})", anomaly_score),
        )
    };

    for category in unseen {
        reason.push_str(&format!(
            "; {} '{}' not seen during training",
            category.column, category.value
        ));
    }

    (level, reason)
}
