//! CLI commands for arima-dashboard.
//!
//! Supports API server mode, leaderboard prediction, race history lookup and
//! race history ingestion.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::context::AppContext;
use crate::storage::{ingest_race_history, HistoryStore};
use crate::types::{HistoryResponse, HistoryView, Leaderboard, RaceContext, RaceGrade, Racecourse, Track};

#[derive(Parser)]
#[command(name = "arima-dashboard")]
#[command(version, about = "Arima Kinen 2013: win probability leaderboard and race history", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Score the field and print the leaderboard
    Predict {
        /// Race distance in meters (1800-3200, step 100)
        #[arg(short, long, value_parser = parse_distance)]
        distance: Option<u32>,

        /// Race grade
        #[arg(short, long, value_enum, ignore_case = true)]
        grade: Option<RaceGrade>,

        /// Racecourse code
        #[arg(short, long, value_enum, ignore_case = true)]
        course: Option<Racecourse>,

        /// Track surface
        #[arg(short, long, value_enum, ignore_case = true)]
        track: Option<Track>,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,

        /// Model path override
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Feature table path override
        #[arg(long)]
        features: Option<PathBuf>,
    },

    /// Show the race history of a horse
    History {
        /// Horse name, as listed on the leaderboard
        #[arg(value_name = "HORSE")]
        horse: String,

        /// Database path override
        #[arg(long)]
        db: Option<PathBuf>,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Replace the race history table from a CSV or Parquet export
    Ingest {
        /// Path to the race history export
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        /// Database path override
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

fn parse_distance(s: &str) -> Result<u32, String> {
    let distance: u32 = s
        .parse()
        .map_err(|_| format!("`{}` is not a distance in meters", s))?;
    RaceContext::check_distance(distance)
}

/// Score the field and print the leaderboard.
pub fn run_predict(
    distance: Option<u32>,
    grade: Option<RaceGrade>,
    course: Option<Racecourse>,
    track: Option<Track>,
    format: String,
    model_path: Option<PathBuf>,
    features_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    // Load configuration
    let mut config = AppConfig::load()?;

    // Override paths if provided
    if let Some(path) = model_path {
        config.model.path = path.to_string_lossy().to_string();
    }
    if let Some(path) = features_path {
        config.data.features_path = path.to_string_lossy().to_string();
    }

    let defaults = config.race;
    let context = RaceContext {
        distance: distance.unwrap_or(defaults.distance),
        grade: grade.unwrap_or(defaults.grade),
        course: course.unwrap_or(defaults.course),
        track: track.unwrap_or(defaults.track),
        runners: defaults.runners,
    };

    let app = AppContext::init(config)?;
    tracing::info!("Scoring {} horses for {}", app.features.len(), context);
    let board = app.leaderboard(&context)?;

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&board)?);
        }
        "table" => {
            print_leaderboard(&board);
        }
        _ => {
            tracing::warn!("Unknown format: {}. Using JSON.", format);
            println!("{}", serde_json::to_string_pretty(&board)?);
        }
    }

    Ok(())
}

/// Look up and print a horse's race history.
pub fn run_history(horse: String, db_path: Option<PathBuf>, format: String) -> anyhow::Result<()> {
    let mut config = AppConfig::load()?;
    if let Some(path) = db_path {
        config.data.db_path = path.to_string_lossy().to_string();
    }

    let store = HistoryStore::new(&config.data.db_path);
    let response = HistoryResponse {
        view: store.lookup(&horse),
        horse,
    };

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        "table" => {
            print_history(&response);
        }
        _ => {
            tracing::warn!("Unknown format: {}. Using JSON.", format);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

/// Replace the race history table.
pub fn run_ingest(source: PathBuf, db_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let db_path = db_path.unwrap_or_else(|| PathBuf::from(&config.data.db_path));

    let inserted = ingest_race_history(&source, &db_path)?;
    println!("Database setup complete: {} rows saved to {}", inserted, db_path.display());

    Ok(())
}

/// Print the leaderboard in table format.
fn print_leaderboard(board: &Leaderboard) {
    println!("Race: {}", board.context);
    println!();

    println!("=== Predicted Win Probabilities ===");
    for entry in &board.entries {
        println!(
            "  {:2}. {:<20} {:>6.2}% chance",
            entry.rank, entry.horse, entry.percentage
        );
    }
    println!();
}

/// Print a horse's race history in table format.
fn print_history(response: &HistoryResponse) {
    println!("=== Race History for {} ===", response.horse);

    match &response.view {
        HistoryView::Records { records, summary } => {
            println!("  {:<36} {:<6} {:>6} {:>7}", "Race", "Grade", "Finish", "Runners");
            for r in records {
                println!(
                    "  {:<36} {:<6} {:>6} {:>7}",
                    r.race,
                    r.race_grade,
                    r.finish.map(|f| f.to_string()).unwrap_or_else(|| "-".to_string()),
                    r.runners.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string()),
                );
            }
            println!();
            println!("Total Races: {}", summary.total_races);
            match summary.average_finish {
                Some(avg) => println!("Average Finish: {:.2}", avg),
                None => println!("Average Finish: -"),
            }
        }
        HistoryView::Empty => {
            println!("No race history found for this horse.");
        }
        HistoryView::Unavailable { message } => {
            println!("Race history unavailable ({}).", message);
        }
    }
    println!();
}
