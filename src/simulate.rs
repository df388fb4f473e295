//! Synthetic auth-log generation
//!
//! Produces reproducible sshd-format login batches for demos and tests.
//! The generated population mimics a small fleet: privileged accounts only
//! ever fail, regular accounts succeed 70% of the time, and sources split
//! evenly between a local range and an external one.

use chrono::{Duration, Local, NaiveDateTime, Timelike};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::parser::{AuthStatus, ParsedRecord};
use crate::risk::is_privileged;

/// Account population for generated batches.
pub const SIMULATED_USERS: [&str; 6] = ["tom", "alice", "bob", "john", "root", "admin"];

/// Timestamps are spread over this many minutes before "now".
const TIME_SPREAD_MINUTES: i64 = 10_000;

/// Options for [`generate_batch`].
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub count: usize,
    /// Seed for reproducible batches. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            count: 200,
            seed: None,
        }
    }
}

/// One generated record plus the pid used when rendering the raw line and
/// the rule-of-thumb label the labeled CSV ships with.
#[derive(Debug, Clone)]
pub struct SimulatedRecord {
    pub record: ParsedRecord,
    pub pid: u32,
    pub label: &'static str,
}

/// Generate a batch of synthetic login events ending at the current time.
pub fn generate_batch(config: &SimulatorConfig) -> Vec<SimulatedRecord> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut source_ips: Vec<String> = (2..30).map(|i| format!("192.168.1.{}", i)).collect();
    source_ips.extend((2..30).map(|i| format!("203.0.113.{}", i)));

    // Whole-second precision, matching what the raw line format can carry
    let now = Local::now().naive_local();
    let now = now.with_nanosecond(0).unwrap_or(now);

    let mut batch = Vec::with_capacity(config.count);
    for _ in 0..config.count {
        let user = SIMULATED_USERS[rng.gen_range(0..SIMULATED_USERS.len())];
        let ip = source_ips[rng.gen_range(0..source_ips.len())].clone();
        let port: u16 = rng.gen_range(1024..65535);

        let status = if is_privileged(user) {
            AuthStatus::Failed
        } else if rng.gen_bool(0.7) {
            AuthStatus::Accepted
        } else {
            AuthStatus::Failed
        };

        let timestamp = back_dated(now, rng.gen_range(0..TIME_SPREAD_MINUTES));
        let record = ParsedRecord {
            timestamp,
            user: user.to_string(),
            ip,
            status,
            port,
        };
        let label = heuristic_label(&record);

        batch.push(SimulatedRecord {
            record,
            pid: rng.gen_range(1000..10_000),
            label,
        });
    }
    batch
}

fn back_dated(now: NaiveDateTime, minutes: i64) -> NaiveDateTime {
    now - Duration::minutes(minutes)
}

/// Label a record the way the companion dataset does: privileged failures
/// are high, external failures medium, everything else low.
fn heuristic_label(record: &ParsedRecord) -> &'static str {
    if is_privileged(&record.user) && record.status == AuthStatus::Failed {
        return "high";
    }
    if record.status == AuthStatus::Failed && record.ip.starts_with("203.0.113.") {
        return "medium";
    }
    "low"
}

/// Render one record in the raw sshd line format.
pub fn format_log_line(sim: &SimulatedRecord) -> String {
    format!(
        "{} ubuntu sshd[{}]: {} password for {} from {} port {} ssh2",
        sim.record.timestamp.format("%b %d %H:%M:%S"),
        sim.pid,
        sim.record.status,
        sim.record.user,
        sim.record.ip,
        sim.record.port
    )
}

/// Whole batch as a newline-joined raw log.
pub fn to_raw_log(batch: &[SimulatedRecord]) -> String {
    batch
        .iter()
        .map(format_log_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whole batch as a labeled CSV in the structured input format.
pub fn to_labeled_csv(batch: &[SimulatedRecord]) -> String {
    let mut output = String::from("timestamp,user,ip,status,port,risk_level\n");
    for sim in batch {
        output.push_str(&format!(
            "{},{},{},{},{},{}\n",
            sim.record.timestamp.format("%Y-%m-%dT%H:%M:%S"),
            sim.record.user,
            sim.record.ip,
            sim.record.status,
            sim.record.port,
            sim.label
        ));
    }
    output
}
