//! Risk summary aggregates and text report rendering

use std::collections::HashMap;

use chrono::Timelike;

use crate::risk::{RiskLevel, RiskResult};

/// How many flagged source addresses the text report lists.
const TOP_IPS: usize = 5;

/// Width of the hourly activity bars in the text report.
const BAR_WIDTH: usize = 40;

/// Aggregates over one scored batch.
#[derive(Debug, Clone, Default)]
pub struct RiskSummary {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub outliers: usize,
    /// Source addresses of elevated (non-low) records, most frequent first;
    /// ties break on the address so the ordering is stable.
    pub flagged_ips: Vec<(String, usize)>,
    /// Record counts by hour of day, index 0-23.
    pub hourly_counts: [usize; 24],
}

impl RiskSummary {
    pub fn from_results(results: &[RiskResult]) -> Self {
        let mut summary = RiskSummary {
            total: results.len(),
            ..Default::default()
        };

        let mut ip_counts: HashMap<&str, usize> = HashMap::new();
        for result in results {
            match result.risk_level {
                RiskLevel::High => summary.high += 1,
                RiskLevel::Medium => summary.medium += 1,
                RiskLevel::Low => summary.low += 1,
            }
            if result.is_outlier {
                summary.outliers += 1;
            }
            if result.risk_level != RiskLevel::Low {
                *ip_counts.entry(result.record.ip.as_str()).or_default() += 1;
            }
            summary.hourly_counts[result.record.timestamp.hour() as usize] += 1;
        }

        let mut flagged: Vec<(String, usize)> = ip_counts
            .into_iter()
            .map(|(ip, count)| (ip.to_string(), count))
            .collect();
        flagged.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        summary.flagged_ips = flagged;

        summary
    }

    /// Render the analyst-facing text summary.
    pub fn format(&self) -> String {
        let mut output = String::new();

        output.push_str("\n=== SSH Auth Risk Summary ===\n");
        output.push_str(&format!("Total records: {}\n", self.total));
        output.push_str(&format!("High risk:     {}\n", self.high));
        output.push_str(&format!("Medium risk:   {}\n", self.medium));
        output.push_str(&format!("Low risk:      {}\n", self.low));
        output.push_str(&format!("Outliers:      {}\n", self.outliers));

        if !self.flagged_ips.is_empty() {
            output.push_str("\n=== Top Flagged Source Addresses ===\n");
            for (ip, count) in self.flagged_ips.iter().take(TOP_IPS) {
                output.push_str(&format!("  {:<15} {} records\n", ip, count));
            }
        }

        let max_count = self.hourly_counts.iter().copied().max().unwrap_or(0);
        if max_count > 0 {
            output.push_str("\n=== Records by Hour ===\n");
            for (hour, &count) in self.hourly_counts.iter().enumerate() {
                if count == 0 {
                    continue;
                }
                let bar_len = (count * BAR_WIDTH).div_ceil(max_count);
                output.push_str(&format!(
                    "  {:02}:00 {:>5}  {}\n",
                    hour,
                    count,
                    "#".repeat(bar_len)
                ));
            }
        }

        output
    }
}

/// Render the elevated records in detail, high tier first.
pub fn format_flagged(results: &[RiskResult]) -> String {
    let mut output = String::new();

    for tier in [RiskLevel::High, RiskLevel::Medium] {
        let flagged: Vec<&RiskResult> = results.iter().filter(|r| r.risk_level == tier).collect();
        if flagged.is_empty() {
            continue;
        }
        output.push_str(&format!(
            "\n=== {} Risk Records ({}) ===\n",
            capitalize(tier.as_str()),
            flagged.len()
        ));
        for result in flagged {
            output.push_str(&format!(
                "  {} - {}\n",
                result.record.display_line(),
                result.reason
            ));
        }
    }

    output
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
