//! SSH authentication log parsing
//!
//! Turns raw sshd password-auth lines and structured CSV rows into typed
//! [`ParsedRecord`]s. Lines that do not match the grammar are skipped rather
//! than failing the batch, so one malformed line never aborts an analysis.
//!
//! The raw format carries no year. Timestamps are reconstructed with the
//! caller-supplied assumed year (default: the current calendar year), which
//! means logs spanning a year boundary are misdated unless the caller
//! supplies the correct year via [`LogParser::with_assumed_year`].

use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Datelike, Local, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Authentication outcome reported by sshd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthStatus {
    Accepted,
    Failed,
}

impl AuthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthStatus::Accepted => "Accepted",
            AuthStatus::Failed => "Failed",
        }
    }

    /// Parse the status token from a log line or CSV cell.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Accepted" => Some(AuthStatus::Accepted),
            "Failed" => Some(AuthStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single parsed authentication event. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedRecord {
    /// Event time in the log's own locale; no timezone normalization.
    pub timestamp: NaiveDateTime,
    pub user: String,
    /// Source address as it appeared in the log (dotted-quad expected).
    pub ip: String,
    pub status: AuthStatus,
    pub port: u16,
}

impl ParsedRecord {
    /// Display form used in reports, e.g.
    /// `2025-06-14 03:12:44 - root@203.0.113.9:50122 [Failed]`.
    pub fn display_line(&self) -> String {
        format!(
            "{} - {}@{}:{} [{}]",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.user,
            self.ip,
            self.port,
            self.status
        )
    }
}

/// Parser for the fixed sshd password-auth line format:
///
/// ```text
/// <Mon> <Day> <HH:MM:SS> <host> sshd[<pid>]: <Status> password for <user> from <ipv4> port <port> ssh2
/// ```
///
/// with `<Status>` one of `Accepted` or `Failed`. The day field tolerates
/// syslog's space padding ("Jun  4").
pub struct LogParser {
    line_re: Regex,
    assumed_year: Option<i32>,
}

impl LogParser {
    pub fn new() -> Self {
        let line_re = Regex::new(
            r"^(?P<month>\w{3})\s+(?P<day>\d{1,2}) (?P<time>\d{2}:\d{2}:\d{2}) .*sshd\[\d+\]: (?P<status>Accepted|Failed) password for (?P<user>\S+) from (?P<ip>[\d.]+) port (?P<port>\d+) ssh2$",
        )
        .expect("auth line pattern compiles");
        Self {
            line_re,
            assumed_year: None,
        }
    }

    /// Reconstruct timestamps with this year instead of the current one.
    pub fn with_assumed_year(mut self, year: i32) -> Self {
        self.assumed_year = Some(year);
        self
    }

    /// Parse one raw log line. Non-matching lines, out-of-range ports and
    /// impossible calendar dates all return `None`; callers skip them.
    pub fn parse_line(&self, line: &str) -> Option<ParsedRecord> {
        let caps = self.line_re.captures(line.trim_end())?;

        let year = self.assumed_year.unwrap_or_else(|| Local::now().year());
        let stamp = format!("{} {} {} {}", year, &caps["month"], &caps["day"], &caps["time"]);
        let timestamp = NaiveDateTime::parse_from_str(&stamp, "%Y %b %d %H:%M:%S").ok()?;

        let port = caps["port"].parse::<u16>().ok()?;
        let status = AuthStatus::parse(&caps["status"])?;

        Some(ParsedRecord {
            timestamp,
            user: caps["user"].to_string(),
            ip: caps["ip"].to_string(),
            status,
            port,
        })
    }

    /// Parse a newline-delimited log blob, silently skipping malformed lines.
    pub fn parse_lines(&self, text: &str) -> Vec<ParsedRecord> {
        let mut records = Vec::new();
        let mut skipped = 0usize;

        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match self.parse_line(line) {
                Some(record) => records.push(record),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            tracing::debug!("skipped {} lines that did not match the auth grammar", skipped);
        }
        records
    }

    /// Read and parse a raw log file.
    pub fn load_log_file<P: AsRef<Path>>(&self, path: P) -> Result<Vec<ParsedRecord>> {
        let text = fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read log file {}", path.as_ref().display()))?;
        Ok(self.parse_lines(&text))
    }

    /// Parse already-structured rows: a header line naming
    /// `timestamp,user,ip,status,port` (extra columns such as `risk_level`
    /// are ignored) followed by data rows. Only type coercion happens here;
    /// rows that fail coercion are skipped like malformed raw lines.
    pub fn parse_csv(&self, text: &str) -> Vec<ParsedRecord> {
        let mut lines = text.lines();
        let Some(header) = lines.next() else {
            return Vec::new();
        };

        let columns: Vec<&str> = header.split(',').map(str::trim).collect();
        let position = |name: &str| columns.iter().position(|c| *c == name);
        let (Some(ts_idx), Some(user_idx), Some(ip_idx), Some(status_idx), Some(port_idx)) = (
            position("timestamp"),
            position("user"),
            position("ip"),
            position("status"),
            position("port"),
        ) else {
            tracing::warn!("structured input is missing one of the required columns: timestamp, user, ip, status, port");
            return Vec::new();
        };

        let mut records = Vec::new();
        let mut skipped = 0usize;
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').collect();
            match coerce_row(&fields, ts_idx, user_idx, ip_idx, status_idx, port_idx) {
                Some(record) => records.push(record),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            tracing::debug!("skipped {} structured rows that failed type coercion", skipped);
        }
        records
    }

    /// Read and parse a structured CSV file.
    pub fn load_csv_file<P: AsRef<Path>>(&self, path: P) -> Result<Vec<ParsedRecord>> {
        let text = fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read csv file {}", path.as_ref().display()))?;
        Ok(self.parse_csv(&text))
    }
}

impl Default for LogParser {
    fn default() -> Self {
        Self::new()
    }
}

fn coerce_row(
    fields: &[&str],
    ts_idx: usize,
    user_idx: usize,
    ip_idx: usize,
    status_idx: usize,
    port_idx: usize,
) -> Option<ParsedRecord> {
    let timestamp = parse_iso_timestamp(fields.get(ts_idx)?.trim())?;
    let user = fields.get(user_idx)?.trim();
    let ip = fields.get(ip_idx)?.trim();
    let status = AuthStatus::parse(fields.get(status_idx)?.trim())?;
    let port = fields.get(port_idx)?.trim().parse::<u16>().ok()?;

    if user.is_empty() || ip.is_empty() {
        return None;
    }

    Some(ParsedRecord {
        timestamp,
        user: user.to_string(),
        ip: ip.to_string(),
        status,
        port,
    })
}

/// ISO-8601 timestamp coercion accepting `T` or space separators and
/// optional fractional seconds.
fn parse_iso_timestamp(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
}
