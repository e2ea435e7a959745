//! Error types for scoring, history lookup and startup.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Kind of artifact checked during startup validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Model,
    FeatureTable,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Model => write!(f, "model"),
            ArtifactKind::FeatureTable => write!(f, "feature table"),
        }
    }
}

/// Application error types
#[derive(Debug, Error)]
pub enum DashboardError {
    /// Model or feature file absent at startup
    #[error("{kind} not found: {}", path.display())]
    MissingArtifact { kind: ArtifactKind, path: PathBuf },

    /// Artifact exists but could not be loaded
    #[error("failed to load {kind} from {}: {reason}", path.display())]
    InvalidArtifact {
        kind: ArtifactKind,
        path: PathBuf,
        reason: String,
    },

    /// Predictor columns missing or malformed
    #[error("model input error: {0}")]
    ModelInput(String),

    /// Raw scores cannot be normalized into a distribution
    #[error("degenerate scores: {0}")]
    DegenerateScore(String),

    /// Model runtime failure
    #[error("inference failed: {0}")]
    Inference(String),

    /// Race history database missing or unreadable
    #[error("race history store unavailable: {0}")]
    StoreUnavailable(String),
}

impl DashboardError {
    pub fn missing(kind: ArtifactKind, path: impl Into<PathBuf>) -> Self {
        Self::MissingArtifact {
            kind,
            path: path.into(),
        }
    }

    pub fn invalid(kind: ArtifactKind, path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::InvalidArtifact {
            kind,
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
