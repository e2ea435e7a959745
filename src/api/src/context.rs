//! Application context: everything loaded once at startup.

use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::{ArtifactKind, DashboardError};
use crate::features::FeatureTable;
use crate::model::{OnnxScorer, WinScorer};
use crate::scoring;
use crate::storage::HistoryStore;
use crate::types::{HistoryView, Leaderboard, RaceContext};

/// Loaded scorer, feature table and store handle, passed explicitly to the
/// scoring and lookup operations.
pub struct AppContext {
    pub config: AppConfig,
    pub scorer: Arc<dyn WinScorer>,
    pub features: FeatureTable,
    pub store: HistoryStore,
}

impl AppContext {
    /// Validate every configured path, then load the model and feature table.
    ///
    /// A missing model or feature table is fatal. A missing store is only
    /// logged: history lookups then report `StoreUnavailable`.
    pub fn init(config: AppConfig) -> Result<Self, DashboardError> {
        let model_path = require_artifact(ArtifactKind::Model, &config.model.path)?;
        let features_path = require_artifact(ArtifactKind::FeatureTable, &config.data.features_path)?;

        let store = HistoryStore::new(&config.data.db_path);
        if let Err(e) = store.check_available() {
            warn!(
                "Race history at {} will be unavailable: {}",
                store.path().display(),
                e
            );
        }

        info!("Loading ONNX model from {}", model_path.display());
        let scorer = OnnxScorer::load(model_path)?;
        info!("Model loaded from {}", scorer.path().display());

        let features = FeatureTable::from_csv(features_path)?;

        Ok(Self::new(config, Arc::new(scorer), features, store))
    }

    pub fn new(
        config: AppConfig,
        scorer: Arc<dyn WinScorer>,
        features: FeatureTable,
        store: HistoryStore,
    ) -> Self {
        Self {
            config,
            scorer,
            features,
            store,
        }
    }

    /// Score the field under `context`.
    pub fn leaderboard(&self, context: &RaceContext) -> Result<Leaderboard, DashboardError> {
        scoring::score(&self.features, context, self.scorer.as_ref())
    }

    /// Race history of one horse, degraded rather than failing.
    pub fn history(&self, horse: &str) -> HistoryView {
        self.store.lookup(horse)
    }
}

fn require_artifact<'a>(kind: ArtifactKind, path: &'a str) -> Result<&'a Path, DashboardError> {
    let path = Path::new(path);
    if !path.is_file() {
        return Err(DashboardError::missing(kind, path));
    }
    Ok(path)
}
