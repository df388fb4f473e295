//! Training and scoring entrypoints
//!
//! The analysis surface the CLI drives: fit a model over a batch of parsed
//! records, or score a batch against a loaded artifact. All model state
//! lives in the [`ModelArtifact`] passed around by value; nothing here is
//! process-global, so two scoring runs against one artifact cannot
//! interfere.

use crate::features::EncoderState;
use crate::isolation_forest::{ForestConfig, ForestError, IsolationForest};
use crate::model_store::ModelArtifact;
use crate::parser::ParsedRecord;
use crate::risk::{classify, RiskResult};

/// Fit encoder tables and forest over a training batch, producing a fresh
/// immutable artifact. Fails with [`ForestError::InsufficientData`] when the
/// batch has fewer than two records.
pub fn train(records: &[ParsedRecord], config: &ForestConfig) -> Result<ModelArtifact, ForestError> {
    let mut encoders = EncoderState::new();
    let vectors = encoders.fit_transform(records);
    let samples: Vec<Vec<f64>> = vectors.iter().map(|v| v.to_array().to_vec()).collect();

    let forest = IsolationForest::fit(&samples, config)?;
    tracing::debug!(
        "trained on {} records: {} users, {} statuses, threshold {:.4}",
        records.len(),
        encoders.user.len(),
        encoders.status.len(),
        forest.threshold()
    );

    Ok(ModelArtifact { forest, encoders })
}

/// Score a batch against a trained artifact, in input order. Unseen
/// categories degrade individual encodings and surface in the reasons; they
/// never abort the batch.
pub fn score(
    records: &[ParsedRecord],
    artifact: &ModelArtifact,
) -> Result<Vec<RiskResult>, ForestError> {
    let mut results = Vec::with_capacity(records.len());

    for record in records {
        let (vector, unseen) = artifact.encoders.transform(record);
        let anomaly_score = artifact.forest.score(&vector.to_array())?;
        let is_outlier = artifact.forest.is_outlier(anomaly_score);
        let (risk_level, reason) = classify(record, anomaly_score, is_outlier, &unseen);

        results.push(RiskResult {
            record: record.clone(),
            anomaly_score,
            is_outlier,
            risk_level,
            reason,
        });
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::AuthStatus;
    use crate::risk::RiskLevel;
    use chrono::NaiveDate;

    fn record(day: u32, hour: u32, user: &str, ip: &str, status: AuthStatus, port: u16) -> ParsedRecord {
        ParsedRecord {
            timestamp: NaiveDate::from_ymd_opt(2025, 6, day)
                .unwrap()
                .and_hms_opt(hour, 15, 0)
                .unwrap(),
            user: user.to_string(),
            ip: ip.to_string(),
            status,
            port,
        }
    }

    /// Regular daytime logins plus a handful of out-of-profile records.
    fn training_batch() -> Vec<ParsedRecord> {
        let mut records = Vec::new();
        for day in 1..=25 {
            for (i, user) in ["alice", "bob", "tom"].iter().enumerate() {
                records.push(record(
                    day,
                    9 + (i as u32),
                    user,
                    &format!("192.168.1.{}", 10 + i),
                    AuthStatus::Accepted,
                    40000 + (day * 7 + i as u32 * 13) as u16,
                ));
            }
        }
        // Night-time failures from an external range
        records.push(record(3, 3, "root", "203.0.113.9", AuthStatus::Failed, 55501));
        records.push(record(11, 2, "admin", "203.0.113.17", AuthStatus::Failed, 55502));
        records.push(record(19, 4, "alice", "203.0.113.23", AuthStatus::Failed, 55503));
        records
    }

    #[test]
    fn test_train_insufficient_data() {
        let config = ForestConfig::default();
        assert!(matches!(
            train(&[], &config).unwrap_err(),
            ForestError::InsufficientData { .. }
        ));

        let one = vec![record(1, 9, "alice", "192.168.1.10", AuthStatus::Accepted, 40001)];
        assert!(matches!(
            train(&one, &config).unwrap_err(),
            ForestError::InsufficientData { .. }
        ));
    }

    #[test]
    fn test_train_then_score_same_batch() {
        let records = training_batch();
        let config = ForestConfig {
            n_estimators: 100,
            contamination: 0.1,
            seed: Some(42),
        };

        let artifact = train(&records, &config).unwrap();
        let results = score(&records, &artifact).unwrap();

        assert_eq!(results.len(), records.len());
        for result in &results {
            assert!(result.anomaly_score > 0.0 && result.anomaly_score <= 1.0);
            assert_eq!(
                result.is_outlier,
                result.anomaly_score >= artifact.forest.threshold()
            );
        }
    }

    #[test]
    fn test_scoring_is_repeatable() {
        let records = training_batch();
        let config = ForestConfig {
            n_estimators: 50,
            contamination: 0.1,
            seed: Some(7),
        };
        let artifact = train(&records, &config).unwrap();

        let first: Vec<f64> = score(&records, &artifact)
            .unwrap()
            .iter()
            .map(|r| r.anomaly_score)
            .collect();
        let second: Vec<f64> = score(&records, &artifact)
            .unwrap()
            .iter()
            .map(|r| r.anomaly_score)
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_privileged_failed_outliers_are_high() {
        let records = training_batch();
        let config = ForestConfig {
            n_estimators: 100,
            contamination: 0.1,
            seed: Some(42),
        };
        let artifact = train(&records, &config).unwrap();
        let results = score(&records, &artifact).unwrap();

        for result in &results {
            if result.is_outlier
                && crate::risk::is_privileged(&result.record.user)
                && result.record.status == AuthStatus::Failed
            {
                assert_eq!(result.risk_level, RiskLevel::High, "reason: {}", result.reason);
            }
            if !result.is_outlier {
                assert_eq!(result.risk_level, RiskLevel::Low);
            }
        }
    }

    #[test]
    fn test_unseen_user_degrades_not_fails() {
        let records = training_batch();
        let config = ForestConfig {
            n_estimators: 50,
            contamination: 0.1,
            seed: Some(42),
        };
        let artifact = train(&records, &config).unwrap();

        let probe = vec![record(5, 9, "mallory", "192.168.1.10", AuthStatus::Accepted, 40010)];
        let results = score(&probe, &artifact).unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].reason.contains("'mallory' not seen during training"));
    }
}
