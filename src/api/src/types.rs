//! Domain, request and response types for the Arima dashboard.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DashboardError;
use crate::model::NUM_FEATURES;

/// Race grade selectable for the prediction context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum RaceGrade {
    #[serde(alias = "g1")]
    #[value(name = "G1")]
    G1,
    #[serde(alias = "g2")]
    #[value(name = "G2")]
    G2,
    #[serde(alias = "g3")]
    #[value(name = "G3")]
    G3,
}

impl RaceGrade {
    /// Ordinal used by the model (`RaceGrade_numeric`): G1 is the highest.
    pub fn ordinal(&self) -> u8 {
        match self {
            RaceGrade::G1 => 3,
            RaceGrade::G2 => 2,
            RaceGrade::G3 => 1,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RaceGrade::G1 => "G1",
            RaceGrade::G2 => "G2",
            RaceGrade::G3 => "G3",
        }
    }
}

/// Racecourse codes known to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum Racecourse {
    #[serde(rename = "NAK", alias = "nak")]
    #[value(name = "NAK")]
    Nakayama,
    #[serde(rename = "TOK", alias = "tok")]
    #[value(name = "TOK")]
    Tokyo,
    #[serde(rename = "KYO", alias = "kyo")]
    #[value(name = "KYO")]
    Kyoto,
    #[serde(rename = "HAN", alias = "han")]
    #[value(name = "HAN")]
    Hanshin,
}

impl Racecourse {
    pub fn code(&self) -> &'static str {
        match self {
            Racecourse::Nakayama => "NAK",
            Racecourse::Tokyo => "TOK",
            Racecourse::Kyoto => "KYO",
            Racecourse::Hanshin => "HAN",
        }
    }

    /// Ordinal encoding fed to the model
    pub fn encoded(&self) -> f32 {
        match self {
            Racecourse::Nakayama => 0.0,
            Racecourse::Tokyo => 1.0,
            Racecourse::Kyoto => 2.0,
            Racecourse::Hanshin => 3.0,
        }
    }
}

impl FromStr for Racecourse {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NAK" => Ok(Racecourse::Nakayama),
            "TOK" => Ok(Racecourse::Tokyo),
            "KYO" => Ok(Racecourse::Kyoto),
            "HAN" => Ok(Racecourse::Hanshin),
            other => Err(format!("unknown racecourse code: {}", other)),
        }
    }
}

/// Track surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum Track {
    #[serde(alias = "turf")]
    Turf,
    #[serde(alias = "dirt")]
    Dirt,
}

impl Track {
    pub fn label(&self) -> &'static str {
        match self {
            Track::Turf => "Turf",
            Track::Dirt => "Dirt",
        }
    }

    /// Ordinal encoding fed to the model
    pub fn encoded(&self) -> f32 {
        match self {
            Track::Turf => 0.0,
            Track::Dirt => 1.0,
        }
    }
}

impl FromStr for Track {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "turf" => Ok(Track::Turf),
            "dirt" => Ok(Track::Dirt),
            other => Err(format!("unknown track surface: {}", other)),
        }
    }
}

/// Race-wide parameters broadcast onto every horse before scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceContext {
    /// Race distance in meters
    pub distance: u32,
    pub grade: RaceGrade,
    pub course: Racecourse,
    pub track: Track,
    pub runners: u32,
}

impl RaceContext {
    pub const MIN_DISTANCE: u32 = 1800;
    pub const MAX_DISTANCE: u32 = 3200;
    pub const DISTANCE_STEP: u32 = 100;
    pub const DEFAULT_RUNNERS: u32 = 16;

    /// Reject contexts the model cannot score.
    pub fn validate(&self) -> Result<(), DashboardError> {
        if self.distance == 0 {
            return Err(DashboardError::ModelInput(
                "race distance must be positive".to_string(),
            ));
        }
        if self.runners == 0 {
            return Err(DashboardError::ModelInput(
                "runner count must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Check a distance against the selectable range (1800..=3200, step 100).
    pub fn check_distance(distance: u32) -> Result<u32, String> {
        if !(Self::MIN_DISTANCE..=Self::MAX_DISTANCE).contains(&distance) {
            return Err(format!(
                "distance must be between {} and {} meters, got {}",
                Self::MIN_DISTANCE,
                Self::MAX_DISTANCE,
                distance
            ));
        }
        if distance % Self::DISTANCE_STEP != 0 {
            return Err(format!(
                "distance must be a multiple of {} meters, got {}",
                Self::DISTANCE_STEP,
                distance
            ));
        }
        Ok(distance)
    }
}

impl Default for RaceContext {
    fn default() -> Self {
        Self {
            distance: 2500,
            grade: RaceGrade::G1,
            course: Racecourse::Nakayama,
            track: Track::Turf,
            runners: Self::DEFAULT_RUNNERS,
        }
    }
}

impl fmt::Display for RaceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}m ({} runners)",
            self.grade.label(),
            self.course.code(),
            self.track.label(),
            self.distance,
            self.runners
        )
    }
}

/// Horse features for prediction (one row of the feature table)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HorseFeatures {
    pub horse: String,
    // Horse-specific (5)
    pub speed_kph: f32,
    pub pos_change: f32,
    pub final_corner_pos: f32,
    pub avg_placement_last3: f32,
    pub days_since_last_race: f32,
    // Race context (5), overwritten before scoring
    pub runners: f32,
    pub distance: f32,
    pub race_grade_numeric: f32,
    pub course: String,
    pub track: String,
}

impl HorseFeatures {
    /// Overwrite the race-wide columns with the given context.
    pub fn apply_context(&mut self, context: &RaceContext) {
        self.distance = context.distance as f32;
        self.race_grade_numeric = context.grade.ordinal() as f32;
        self.course = context.course.code().to_string();
        self.track = context.track.label().to_string();
        self.runners = context.runners as f32;
    }

    /// Convert features to array in model input order (see `FEATURE_NAMES`)
    pub fn to_array(&self) -> Result<[f32; NUM_FEATURES], DashboardError> {
        let course = self
            .course
            .parse::<Racecourse>()
            .map_err(|e| DashboardError::ModelInput(format!("{}: {}", self.horse, e)))?;
        let track = self
            .track
            .parse::<Track>()
            .map_err(|e| DashboardError::ModelInput(format!("{}: {}", self.horse, e)))?;

        let values = [
            self.speed_kph,
            self.pos_change,
            self.final_corner_pos,
            self.runners,
            self.avg_placement_last3,
            self.days_since_last_race,
            self.distance,
            self.race_grade_numeric,
            course.encoded(),
            track.encoded(),
        ];

        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(DashboardError::ModelInput(format!(
                "{}: predictor `{}` is not finite",
                self.horse,
                crate::config::FEATURE_NAMES[pos]
            )));
        }

        Ok(values)
    }
}

/// One ranked row of the leaderboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub horse: String,
    /// Win-class probability straight from the model
    pub raw_score: f64,
    /// Normalized over the field, full precision
    pub probability: f64,
    /// `probability * 100` rounded to 2 decimals, for display only
    pub percentage: f64,
}

/// Ranked win probabilities for one race context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leaderboard {
    pub context: RaceContext,
    pub entries: Vec<LeaderboardEntry>,
}

/// Past race result for a horse (race date is used for ordering only)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceRecord {
    pub race: String,
    pub race_grade: String,
    pub finish: Option<i64>,
    pub runners: Option<i64>,
}

/// Summary statistics over a horse's history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySummary {
    pub total_races: usize,
    pub average_finish: Option<f64>,
}

impl HistorySummary {
    pub fn from_records(records: &[RaceRecord]) -> Self {
        let finishes: Vec<i64> = records.iter().filter_map(|r| r.finish).collect();
        let average_finish = if finishes.is_empty() {
            None
        } else {
            Some(finishes.iter().sum::<i64>() as f64 / finishes.len() as f64)
        };

        Self {
            total_races: records.len(),
            average_finish,
        }
    }
}

/// What the history section shows for a selected horse
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum HistoryView {
    Records {
        records: Vec<RaceRecord>,
        summary: HistorySummary,
    },
    Empty,
    Unavailable {
        message: String,
    },
}

/// Leaderboard query parameters; omitted values fall back to config
#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    pub distance: Option<u32>,
    pub grade: Option<RaceGrade>,
    pub course: Option<Racecourse>,
    pub track: Option<Track>,
}

/// Race history response
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub horse: String,
    #[serde(flatten)]
    pub view: HistoryView,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Model info response
#[derive(Debug, Serialize)]
pub struct ModelInfoResponse {
    pub model_path: String,
    pub num_features: usize,
    pub feature_names: Vec<String>,
    pub num_horses: usize,
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
