//! Sshlens - SSH authentication log risk scoring
//!
//! This library parses sshd password-auth logs, encodes each event into a
//! fixed-width numeric feature vector, scores it with an isolation forest,
//! and folds the outlier verdict through interpretable risk rules. The
//! trained forest and its encoder tables persist together as one versioned
//! artifact, so scores survive a save/load round trip bit for bit.

pub mod cli;
pub mod csv_output;
pub mod features;
pub mod isolation_forest;
pub mod json_output;
pub mod model_store;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod risk;
pub mod simulate;
