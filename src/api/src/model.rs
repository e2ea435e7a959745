//! Win-probability scorers: the `WinScorer` seam and its ONNX implementation.

use ndarray::Array2;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::error::{ArtifactKind, DashboardError};

/// Number of input features
pub const NUM_FEATURES: usize = 10;

/// Number of classes in the classifier output (lose, win)
pub const NUM_CLASSES: usize = 2;

/// Column of the probability output holding the "win" class
pub const WIN_CLASS_INDEX: usize = 1;

/// Anything that can turn a feature matrix into per-horse win likelihoods.
pub trait WinScorer: Send + Sync {
    /// Score a matrix of shape (n_horses, NUM_FEATURES), columns in
    /// `FEATURE_NAMES` order. Returns one raw win score per row.
    fn predict_win_probability(&self, features: &Array2<f32>) -> Result<Vec<f64>, DashboardError>;
}

/// ONNX classifier wrapper (exported with class probabilities as output 1).
pub struct OnnxScorer {
    session: Mutex<Session>,
    path: PathBuf,
}

impl OnnxScorer {
    /// Load ONNX model from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DashboardError> {
        let path = path.as_ref();
        let invalid = |e: ort::Error| DashboardError::invalid(ArtifactKind::Model, path, e);

        let session = Session::builder()
            .map_err(invalid)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(invalid)?
            .with_intra_threads(1)
            .map_err(invalid)?
            .commit_from_file(path)
            .map_err(invalid)?;

        Ok(Self {
            session: Mutex::new(session),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WinScorer for OnnxScorer {
    fn predict_win_probability(&self, features: &Array2<f32>) -> Result<Vec<f64>, DashboardError> {
        let n_horses = features.nrows();
        if features.ncols() != NUM_FEATURES {
            return Err(DashboardError::ModelInput(format!(
                "expected {} feature columns, got {}",
                NUM_FEATURES,
                features.ncols()
            )));
        }

        let inference = |e: ort::Error| DashboardError::Inference(e.to_string());

        // Create input tensor from ndarray
        let input_tensor = Tensor::from_array(features.clone()).map_err(inference)?;

        // Lock the session for inference
        let mut session = self
            .session
            .lock()
            .map_err(|e| DashboardError::Inference(format!("failed to lock session: {}", e)))?;

        let outputs = session.run(ort::inputs![input_tensor]).map_err(inference)?;

        // Output 0 is the predicted labels, output 1 is probabilities
        if outputs.len() < 2 {
            return Err(DashboardError::Inference(
                "expected at least 2 outputs from model".to_string(),
            ));
        }

        let (shape, probs_data) = outputs[1].try_extract_tensor::<f32>().map_err(inference)?;

        let shape_dims: Vec<i64> = shape.iter().copied().collect();
        if shape_dims.len() != 2
            || shape_dims[0] as usize != n_horses
            || (shape_dims[1] as usize) < NUM_CLASSES
        {
            return Err(DashboardError::Inference(format!(
                "unexpected output shape: {:?}, expected [{}, {}]",
                shape_dims, n_horses, NUM_CLASSES
            )));
        }

        let n_cols = shape_dims[1] as usize;
        let scores: Vec<f64> = (0..n_horses)
            .map(|i| probs_data[i * n_cols + WIN_CLASS_INDEX] as f64)
            .collect();

        debug!(horses = n_horses, "scored feature matrix");
        Ok(scores)
    }
}
