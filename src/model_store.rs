//! Model artifact persistence
//!
//! A trained forest is only meaningful together with the encoder tables it
//! was fitted with, so the two are saved and loaded as one versioned unit:
//! `forest.json` and `encoders.json` under a model directory. Loading
//! refuses partial or version-skewed artifacts outright; there is no
//! halfway-loaded model state.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::EncoderState;
use crate::isolation_forest::IsolationForest;

/// Artifact schema version; bump when the persisted layout changes.
pub const FORMAT_VERSION: u32 = 1;

const FOREST_FILE: &str = "forest.json";
const ENCODERS_FILE: &str = "encoders.json";

/// Errors for saving and loading model artifacts
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("model artifact incomplete: {0} is missing (train a model first)")]
    NotFound(PathBuf),

    #[error("model format version mismatch in {path}: expected {expected}, found {found}")]
    VersionMismatch {
        path: PathBuf,
        expected: u32,
        found: u32,
    },

    #[error("malformed model blob {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Trained forest plus the encoder tables it was fitted with.
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub forest: IsolationForest,
    pub encoders: EncoderState,
}

#[derive(Serialize, Deserialize)]
struct ForestBlob {
    format_version: u32,
    forest: IsolationForest,
}

#[derive(Serialize, Deserialize)]
struct EncoderBlob {
    format_version: u32,
    encoders: EncoderState,
}

/// Filesystem store for one artifact pair under a model directory.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    /// Store rooted at `dir`. The directory is created on first save.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn forest_path(&self) -> PathBuf {
        self.dir.join(FOREST_FILE)
    }

    pub fn encoders_path(&self) -> PathBuf {
        self.dir.join(ENCODERS_FILE)
    }

    /// Persist both blobs. Each blob is written to a temp file and renamed
    /// into place, so an interrupted save leaves any previous artifact
    /// readable.
    pub fn save(&self, artifact: &ModelArtifact) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let forest_path = self.forest_path();
        let forest_blob = ForestBlob {
            format_version: FORMAT_VERSION,
            forest: artifact.forest.clone(),
        };
        write_blob(&forest_path, &forest_blob)?;

        let encoders_path = self.encoders_path();
        let encoder_blob = EncoderBlob {
            format_version: FORMAT_VERSION,
            encoders: artifact.encoders.clone(),
        };
        write_blob(&encoders_path, &encoder_blob)?;

        tracing::debug!("saved model artifact to {}", self.dir.display());
        Ok(())
    }

    /// Load both blobs, or fail with the first problem found. Both files
    /// must exist and carry the current format version.
    pub fn load(&self) -> Result<ModelArtifact> {
        let forest_path = self.forest_path();
        let encoders_path = self.encoders_path();

        // Refuse partial artifacts before reading anything.
        if !forest_path.exists() {
            return Err(StoreError::NotFound(forest_path));
        }
        if !encoders_path.exists() {
            return Err(StoreError::NotFound(encoders_path));
        }

        let forest_blob: ForestBlob = read_blob(&forest_path)?;
        check_version(&forest_path, forest_blob.format_version)?;

        let encoder_blob: EncoderBlob = read_blob(&encoders_path)?;
        check_version(&encoders_path, encoder_blob.format_version)?;

        Ok(ModelArtifact {
            forest: forest_blob.forest,
            encoders: encoder_blob.encoders,
        })
    }

    /// Whether both artifact files exist (no validation).
    pub fn exists(&self) -> bool {
        self.forest_path().exists() && self.encoders_path().exists()
    }
}

fn write_blob<T: Serialize>(path: &Path, blob: &T) -> Result<()> {
    let bytes = serde_json::to_vec(blob).map_err(|e| StoreError::Malformed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let tmp_path = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(&bytes)?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn read_blob<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| StoreError::Malformed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn check_version(path: &Path, found: u32) -> Result<()> {
    if found != FORMAT_VERSION {
        return Err(StoreError::VersionMismatch {
            path: path.to_path_buf(),
            expected: FORMAT_VERSION,
            found,
        });
    }
    Ok(())
}
