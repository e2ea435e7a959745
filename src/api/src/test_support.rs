//! Fixtures shared by unit tests.

use ndarray::Array2;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::DashboardError;
use crate::features::FeatureTable;
use crate::model::WinScorer;
use crate::types::HorseFeatures;

/// The 2013 Arima Kinen field.
pub const ARIMA_2013_FIELD: [&str; 16] = [
    "Orfevre",
    "Gold Ship",
    "Win Variation",
    "Love Is Boo Shet",
    "Tamamo Best Play",
    "Curren Mirotic",
    "Desperado",
    "To The Glory",
    "T M Inazuma",
    "Verde Green",
    "Admire Rakti",
    "Lovely Day",
    "Nakayama Knight",
    "Tosen Jordan",
    "Danon Ballade",
    "Lelouch",
];

/// Feature table with the first `n` horses of the field.
pub fn sample_table(n: usize) -> FeatureTable {
    let horses = ARIMA_2013_FIELD
        .iter()
        .take(n)
        .enumerate()
        .map(|(i, name)| HorseFeatures {
            horse: name.to_string(),
            speed_kph: 60.0 - i as f32 * 0.1,
            pos_change: (i % 5) as f32,
            final_corner_pos: (i + 1) as f32,
            avg_placement_last3: 1.0 + i as f32 * 0.5,
            days_since_last_race: 28.0 + i as f32,
            runners: 18.0,
            distance: 2400.0,
            race_grade_numeric: 2.0,
            course: "TOK".to_string(),
            track: "Turf".to_string(),
        })
        .collect();
    FeatureTable::new(horses).expect("field names are unique")
}

/// Scorer returning a fixed list of scores regardless of input.
pub struct FixedScorer(pub Vec<f64>);

impl WinScorer for FixedScorer {
    fn predict_win_probability(&self, _features: &Array2<f32>) -> Result<Vec<f64>, DashboardError> {
        Ok(self.0.clone())
    }
}

/// Scorer returning the same score for every row.
pub struct UniformScorer(pub f64);

impl WinScorer for UniformScorer {
    fn predict_win_probability(&self, features: &Array2<f32>) -> Result<Vec<f64>, DashboardError> {
        Ok(vec![self.0; features.nrows()])
    }
}

/// Scorer that always fails at inference time.
pub struct FailingScorer;

impl WinScorer for FailingScorer {
    fn predict_win_probability(&self, _features: &Array2<f32>) -> Result<Vec<f64>, DashboardError> {
        Err(DashboardError::Inference("session crashed".to_string()))
    }
}

/// Unique path under the OS temp directory.
pub fn temp_path(name: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!(
        "arima-dashboard-{}-{}-{}",
        std::process::id(),
        n,
        name
    ))
}
