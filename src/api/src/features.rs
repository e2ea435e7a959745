//! Feature table loading.
//!
//! The table holds one row per horse with the `Horse` column plus the ten
//! predictors listed in `FEATURE_NAMES`. It is loaded once at startup and
//! copied for every scoring request.

use ndarray::Array2;
use polars::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::config::HORSE_COLUMN;
use crate::error::{ArtifactKind, DashboardError};
use crate::model::NUM_FEATURES;
use crate::types::{HorseFeatures, RaceContext};

/// In-memory feature table, one record per horse in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    horses: Vec<HorseFeatures>,
}

impl FeatureTable {
    /// Build a table, rejecting duplicate horse names.
    pub fn new(horses: Vec<HorseFeatures>) -> Result<Self, DashboardError> {
        let mut seen = HashSet::with_capacity(horses.len());
        for horse in &horses {
            if horse.horse.trim().is_empty() {
                return Err(DashboardError::ModelInput(
                    "feature table contains a row without a horse name".to_string(),
                ));
            }
            if !seen.insert(horse.horse.as_str()) {
                return Err(DashboardError::ModelInput(format!(
                    "duplicate horse in feature table: {}",
                    horse.horse
                )));
            }
        }
        Ok(Self { horses })
    }

    /// Load the feature table from a CSV file.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, DashboardError> {
        let path = path.as_ref();
        let invalid = |e: PolarsError| DashboardError::invalid(ArtifactKind::FeatureTable, path, e);

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .map_err(invalid)?
            .finish()
            .map_err(invalid)?;

        let table = Self::from_dataframe(&df)?;
        info!("Loaded {} horses from {}", table.len(), path.display());
        Ok(table)
    }

    /// Extract horse records from a DataFrame. Extra columns are ignored.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self, DashboardError> {
        let names = string_column(df, HORSE_COLUMN)?;
        let speed = numeric_column(df, "Speed_kph")?;
        let pos_change = numeric_column(df, "PosChange")?;
        let final_corner = numeric_column(df, "FinalCornerPos")?;
        let runners = numeric_column(df, "Runners")?;
        let avg_placement = numeric_column(df, "AvgPlacement_Last3")?;
        let days_since = numeric_column(df, "DaysSinceLastRace")?;
        let distance = numeric_column(df, "Distance")?;
        let grade = numeric_column(df, "RaceGrade_numeric")?;
        let course = string_column(df, "Course")?;
        let track = string_column(df, "Track")?;

        let horses = (0..df.height())
            .map(|i| HorseFeatures {
                horse: names[i].clone(),
                speed_kph: speed[i],
                pos_change: pos_change[i],
                final_corner_pos: final_corner[i],
                avg_placement_last3: avg_placement[i],
                days_since_last_race: days_since[i],
                runners: runners[i],
                distance: distance[i],
                race_grade_numeric: grade[i],
                course: course[i].clone(),
                track: track[i].clone(),
            })
            .collect();

        Self::new(horses)
    }

    pub fn horses(&self) -> &[HorseFeatures] {
        &self.horses
    }

    pub fn horse_names(&self) -> Vec<String> {
        self.horses().iter().map(|h| h.horse.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.horses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.horses.is_empty()
    }

    /// Copy of the table with the race context broadcast onto every row.
    pub fn with_context(&self, context: &RaceContext) -> FeatureTable {
        // The horse-specific columns are assumed independent of the
        // overwritten race columns; nothing here checks that.
        debug!(%context, horses = self.len(), "broadcasting race context");
        let horses = self
            .horses
            .iter()
            .cloned()
            .map(|mut h| {
                h.apply_context(context);
                h
            })
            .collect();
        FeatureTable { horses }
    }

    /// Build the (n_horses, NUM_FEATURES) model input matrix.
    pub fn to_matrix(&self) -> Result<Array2<f32>, DashboardError> {
        let mut features = Array2::<f32>::zeros((self.len(), NUM_FEATURES));
        for (i, horse) in self.horses.iter().enumerate() {
            let feature_array = horse.to_array()?;
            for (j, &val) in feature_array.iter().enumerate() {
                features[[i, j]] = val;
            }
        }
        Ok(features)
    }
}

fn get_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column, DashboardError> {
    df.column(name)
        .map_err(|_| DashboardError::ModelInput(format!("missing column `{}`", name)))
}

/// Read a predictor column as f32, failing on nulls or non-numeric values.
fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<f32>, DashboardError> {
    let col = get_column(df, name)?
        .cast(&DataType::Float64)
        .map_err(|e| DashboardError::ModelInput(format!("column `{}` is not numeric: {}", name, e)))?;
    let values = col
        .f64()
        .map_err(|e| DashboardError::ModelInput(format!("column `{}` is not numeric: {}", name, e)))?;

    values
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.map(|v| v as f32).ok_or_else(|| {
                DashboardError::ModelInput(format!(
                    "column `{}` has a missing or non-numeric value at row {}",
                    name, row
                ))
            })
        })
        .collect()
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<String>, DashboardError> {
    let col = get_column(df, name)?
        .cast(&DataType::String)
        .map_err(|e| DashboardError::ModelInput(format!("column `{}` is not text: {}", name, e)))?;
    let values = col
        .str()
        .map_err(|e| DashboardError::ModelInput(format!("column `{}` is not text: {}", name, e)))?;

    values
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.map(|s| s.trim().to_string()).ok_or_else(|| {
                DashboardError::ModelInput(format!(
                    "column `{}` has a missing value at row {}",
                    name, row
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_table, temp_path};

    fn sample_df() -> DataFrame {
        df!(
            "Horse" => ["Orfevre", "Gold Ship", "Win Variation"],
            "Speed_kph" => [60.1, 59.8, 59.5],
            "PosChange" => [4.0, 8.0, 2.0],
            "FinalCornerPos" => [3, 2, 5],
            "Runners" => [18, 16, 18],
            "AvgPlacement_Last3" => [1.3, 2.0, 3.7],
            "DaysSinceLastRace" => [56, 28, 28],
            "Distance" => [2400, 2400, 2400],
            "RaceGrade_numeric" => [3, 3, 3],
            "Course" => ["TOK", "TOK", "TOK"],
            "Track" => ["Turf", "Turf", "Turf"],
            "Jockey" => ["Ikezoe", "Uchida", "Iwata"]
        )
        .unwrap()
    }

    #[test]
    fn test_from_dataframe() {
        let table = FeatureTable::from_dataframe(&sample_df()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.horse_names(), vec!["Orfevre", "Gold Ship", "Win Variation"]);

        let gold_ship = &table.horses()[1];
        assert_eq!(gold_ship.final_corner_pos, 2.0);
        assert_eq!(gold_ship.runners, 16.0);
        assert_eq!(gold_ship.course, "TOK");
    }

    #[test]
    fn test_missing_column() {
        let df = sample_df().drop("DaysSinceLastRace").unwrap();
        let err = FeatureTable::from_dataframe(&df).unwrap_err();
        assert!(matches!(err, DashboardError::ModelInput(_)));
        assert!(err.to_string().contains("DaysSinceLastRace"));
    }

    #[test]
    fn test_non_numeric_column() {
        let mut df = sample_df();
        df.with_column(Series::new("Speed_kph".into(), ["fast", "60.0", "59.0"]))
            .unwrap();
        let err = FeatureTable::from_dataframe(&df).unwrap_err();
        assert!(err.to_string().contains("Speed_kph"));
    }

    #[test]
    fn test_null_value() {
        let mut df = sample_df();
        df.with_column(Series::new("PosChange".into(), [Some(4.0), None, Some(2.0)]))
            .unwrap();
        let err = FeatureTable::from_dataframe(&df).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn test_duplicate_horse_rejected() {
        let mut horses = sample_table(2).horses().to_vec();
        horses[1].horse = horses[0].horse.clone();
        assert!(matches!(
            FeatureTable::new(horses),
            Err(DashboardError::ModelInput(_))
        ));
    }

    #[test]
    fn test_with_context_leaves_original_untouched() {
        let table = sample_table(4);
        let ctx = RaceContext {
            distance: 1800,
            course: crate::types::Racecourse::Hanshin,
            ..RaceContext::default()
        };
        let broadcast = table.with_context(&ctx);

        assert!(broadcast.horses().iter().all(|h| h.distance == 1800.0));
        assert!(broadcast.horses().iter().all(|h| h.course == "HAN"));
        assert_ne!(table, broadcast);
        assert_eq!(table.horse_names(), broadcast.horse_names());
    }

    #[test]
    fn test_to_matrix_shape() {
        let table = sample_table(16).with_context(&RaceContext::default());
        let matrix = table.to_matrix().unwrap();
        assert_eq!(matrix.dim(), (16, NUM_FEATURES));
        assert_eq!(matrix[[0, 6]], 2500.0);
        assert_eq!(matrix[[15, 7]], 3.0);
    }

    #[test]
    fn test_from_csv() {
        let path = temp_path("features.csv");
        std::fs::write(
            &path,
            "Horse,Speed_kph,PosChange,FinalCornerPos,Runners,AvgPlacement_Last3,DaysSinceLastRace,Distance,RaceGrade_numeric,Course,Track\n\
             Orfevre,60.1,4,3,18,1.3,56,2400,3,TOK,Turf\n\
             Lelouch,58.9,-1,9,18,6.0,35,2400,3,TOK,Turf\n",
        )
        .unwrap();

        let table = FeatureTable::from_csv(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(table.horse_names(), vec!["Orfevre", "Lelouch"]);
        assert_eq!(table.horses()[1].pos_change, -1.0);
    }
}
