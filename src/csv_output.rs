//! CSV output format for scored records
//!
//! For spreadsheet analysis and downstream tooling.

use crate::report::RiskSummary;
use crate::risk::RiskResult;

const HEADER: &str = "timestamp,user,ip,status,port,anomaly_score,is_outlier,risk_level,reason";

/// Render scored records as CSV, one row per record in input order.
pub fn results_to_csv(results: &[RiskResult]) -> String {
    let mut output = String::with_capacity(results.len() * 96 + HEADER.len());
    output.push_str(HEADER);
    output.push('\n');
    for result in results {
        output.push_str(&format_row(result));
        output.push('\n');
    }
    output
}

fn format_row(result: &RiskResult) -> String {
    [
        result
            .record
            .timestamp
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string(),
        escape_field(&result.record.user),
        escape_field(&result.record.ip),
        result.record.status.to_string(),
        result.record.port.to_string(),
        format!("{:.4}", result.anomaly_score),
        result.is_outlier.to_string(),
        result.risk_level.to_string(),
        escape_field(&result.reason),
    ]
    .join(",")
}

/// Render summary counters as metric,value rows.
pub fn summary_to_csv(summary: &RiskSummary) -> String {
    let mut output = String::from("metric,value\n");
    output.push_str(&format!("total,{}\n", summary.total));
    output.push_str(&format!("high,{}\n", summary.high));
    output.push_str(&format!("medium,{}\n", summary.medium));
    output.push_str(&format!("low,{}\n", summary.low));
    output.push_str(&format!("outliers,{}\n", summary.outliers));
    for (i, (ip, count)) in summary.flagged_ips.iter().take(5).enumerate() {
        output.push_str(&format!("top_flagged_ip_{},{}:{}\n", i + 1, ip, count));
    }
    output
}

/// Escape a CSV field per RFC 4180: fields containing commas, quotes or
/// newlines are quoted, with embedded quotes doubled.
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
