//! JSON output format for analysis reports

use serde::{Deserialize, Serialize};

use crate::report::RiskSummary;
use crate::risk::{RiskLevel, RiskResult};

/// A single scored record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRiskResult {
    /// Event time, ISO-8601 without timezone
    pub timestamp: String,
    pub user: String,
    pub ip: String,
    /// "Accepted" or "Failed"
    pub status: String,
    pub port: u16,
    /// Anomaly score (0.0 to 1.0, higher is more anomalous)
    pub anomaly_score: f64,
    pub is_outlier: bool,
    pub risk_level: RiskLevel,
    /// Human-readable justification for the tier
    pub reason: String,
}

impl From<&RiskResult> for JsonRiskResult {
    fn from(result: &RiskResult) -> Self {
        Self {
            timestamp: result
                .record
                .timestamp
                .format("%Y-%m-%dT%H:%M:%S")
                .to_string(),
            user: result.record.user.clone(),
            ip: result.record.ip.clone(),
            status: result.record.status.to_string(),
            port: result.record.port,
            anomaly_score: result.anomaly_score,
            is_outlier: result.is_outlier,
            risk_level: result.risk_level,
            reason: result.reason.clone(),
        }
    }
}

/// Flagged source address with its elevated-record count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonIpCount {
    pub ip: String,
    pub count: usize,
}

/// Tier counts and leaderboards for the report header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSummary {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub outliers: usize,
    /// Elevated-record source addresses, most frequent first
    pub flagged_ips: Vec<JsonIpCount>,
    /// Record counts by hour of day, index 0-23
    pub hourly_counts: Vec<usize>,
}

/// Root JSON report structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReport {
    /// Tool version that produced the report
    pub version: String,
    /// Format name
    pub format: String,
    pub summary: JsonSummary,
    pub results: Vec<JsonRiskResult>,
}

impl JsonReport {
    pub fn new(summary: &RiskSummary, results: &[RiskResult]) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "sshlens-json-v1".to_string(),
            summary: JsonSummary {
                total: summary.total,
                high: summary.high,
                medium: summary.medium,
                low: summary.low,
                outliers: summary.outliers,
                flagged_ips: summary
                    .flagged_ips
                    .iter()
                    .map(|(ip, count)| JsonIpCount {
                        ip: ip.clone(),
                        count: *count,
                    })
                    .collect(),
                hourly_counts: summary.hourly_counts.to_vec(),
            },
            results: results.iter().map(JsonRiskResult::from).collect(),
        }
    }

    /// Serialize to a pretty-printed JSON string
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
