//! Feature encoding for authentication records
//!
//! Maps [`ParsedRecord`]s onto the fixed-width numeric vectors the isolation
//! forest consumes. Categorical columns (`user`, `status`) use code tables
//! learned while fitting; the tables are part of the persisted model
//! artifact and stay frozen during inference, so a score computed today and
//! a score computed after reload agree bit for bit.

use std::net::Ipv4Addr;

use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};

use crate::parser::ParsedRecord;

/// Number of features per record.
pub const NUM_FEATURES: usize = 6;

/// Column order consumed by the forest. Training and inference must agree.
pub const FEATURE_NAMES: [&str; NUM_FEATURES] =
    ["hour", "weekday", "ip_code", "port", "user_code", "status_code"];

/// Reserved code for categories first seen at inference time.
pub const UNKNOWN_CODE: i64 = -1;

/// One encoded record, in [`FEATURE_NAMES`] order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    /// Hour of day, 0-23.
    pub hour: u32,
    /// Day of week, Monday=0 through Sunday=6.
    pub weekday: u32,
    /// Big-endian integer form of the source address.
    pub ip_code: u32,
    pub port: u16,
    pub user_code: i64,
    pub status_code: i64,
}

impl FeatureVector {
    /// Flatten into the forest's input order.
    pub fn to_array(&self) -> [f64; NUM_FEATURES] {
        [
            f64::from(self.hour),
            f64::from(self.weekday),
            f64::from(self.ip_code),
            f64::from(self.port),
            self.user_code as f64,
            self.status_code as f64,
        ]
    }
}

/// Pack a dotted-quad address into its 32-bit big-endian integer form, so
/// numerically close codes correspond to adjacent addresses. Malformed
/// addresses map to 0 rather than failing the batch.
pub fn ip_to_code(ip: &str) -> u32 {
    ip.parse::<Ipv4Addr>().map(u32::from).unwrap_or(0)
}

/// Inverse of [`ip_to_code`] for well-formed addresses.
pub fn code_to_ip(code: u32) -> String {
    Ipv4Addr::from(code).to_string()
}

/// First-seen category-to-code table for one column. Codes are assigned in
/// order of first appearance: the position in the backing vector is the code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeTable {
    categories: Vec<String>,
}

impl CodeTable {
    /// Code for a known category.
    pub fn code_of(&self, category: &str) -> Option<i64> {
        self.categories
            .iter()
            .position(|c| c == category)
            .map(|i| i as i64)
    }

    /// Code for a category, assigning the next integer on first sight.
    fn intern(&mut self, category: &str) -> i64 {
        if let Some(code) = self.code_of(category) {
            return code;
        }
        self.categories.push(category.to_string());
        (self.categories.len() - 1) as i64
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// A category observed at inference time that was absent during training.
/// Reported to the caller alongside the encoded vector; never an error.
#[derive(Debug, Clone, PartialEq)]
pub struct UnseenCategory {
    /// Which categorical column ("user" or "status").
    pub column: &'static str,
    pub value: String,
}

/// Learned code tables for the categorical columns. Append-only while
/// fitting, read-only at inference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncoderState {
    pub user: CodeTable,
    pub status: CodeTable,
}

impl EncoderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Training mode: learn codes while encoding the batch.
    pub fn fit_transform(&mut self, records: &[ParsedRecord]) -> Vec<FeatureVector> {
        records.iter().map(|r| self.encode_fitting(r)).collect()
    }

    fn encode_fitting(&mut self, record: &ParsedRecord) -> FeatureVector {
        let user_code = self.user.intern(&record.user);
        let status_code = self.status.intern(record.status.as_str());
        assemble(record, user_code, status_code)
    }

    /// Inference mode: tables are frozen. Unseen categories encode as
    /// [`UNKNOWN_CODE`] and are reported back instead of aborting the batch.
    pub fn transform(&self, record: &ParsedRecord) -> (FeatureVector, Vec<UnseenCategory>) {
        let mut unseen = Vec::new();

        let user_code = match self.user.code_of(&record.user) {
            Some(code) => code,
            None => {
                unseen.push(UnseenCategory {
                    column: "user",
                    value: record.user.clone(),
                });
                UNKNOWN_CODE
            }
        };

        let status_code = match self.status.code_of(record.status.as_str()) {
            Some(code) => code,
            None => {
                unseen.push(UnseenCategory {
                    column: "status",
                    value: record.status.as_str().to_string(),
                });
                UNKNOWN_CODE
            }
        };

        (assemble(record, user_code, status_code), unseen)
    }
}

fn assemble(record: &ParsedRecord, user_code: i64, status_code: i64) -> FeatureVector {
    FeatureVector {
        hour: record.timestamp.hour(),
        weekday: record.timestamp.weekday().num_days_from_monday(),
        ip_code: ip_to_code(&record.ip),
        port: record.port,
        user_code,
        status_code,
    }
}
