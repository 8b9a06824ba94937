//! Error types for the model panel, persistence and scoring.

use std::path::PathBuf;

use thiserror::Error;

/// A single family failed to fit or score. Isolated to that family.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("no training samples provided")]
    EmptyTrainingSet,

    #[error("feature count ({features}) does not match label count ({labels})")]
    LengthMismatch { features: usize, labels: usize },

    #[error("training labels contain a single class")]
    SingleClass,

    #[error("solver did not converge: {0}")]
    Numerical(String),

    #[error("model produced a non-finite probability")]
    NonFiniteOutput,
}

/// Persistence I/O or (de)serialisation failure.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to (de)serialise {path}: {source}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Corrupt model state: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn serde(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Serde {
            path: path.into(),
            source,
        }
    }
}

/// Prediction could not be served.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictError {
    #[error("No trained model available. Run `gamechurn train` first.")]
    NotReady,

    #[error("{model} returned {actual} probabilities for {expected} rows")]
    OutputLength {
        model: String,
        expected: usize,
        actual: usize,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;
