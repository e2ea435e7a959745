//! Read-only race history lookup

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Row};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::schema::RACE_HISTORY_TABLE;
use crate::error::DashboardError;
use crate::types::{HistorySummary, HistoryView, RaceRecord};

/// Handle to the race history database.
///
/// Holds only the path: every lookup opens its own connection and closes it
/// before returning.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    db_path: PathBuf,
}

impl HistoryStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Check that the database file exists and has a `race_history` table
    pub fn check_available(&self) -> Result<(), DashboardError> {
        let conn = self.open()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [RACE_HISTORY_TABLE],
                |row| row.get(0),
            )
            .map_err(|e| self.unavailable(e))?;
        if count == 0 {
            return Err(DashboardError::StoreUnavailable(format!(
                "{} has no {} table",
                self.db_path.display(),
                RACE_HISTORY_TABLE
            )));
        }
        Ok(())
    }

    /// Get all past races of a horse, most recent first.
    ///
    /// Unknown horses yield an empty list.
    pub fn history(&self, horse: &str) -> Result<Vec<RaceRecord>, DashboardError> {
        let conn = self.open()?;
        let mut stmt = conn
            .prepare(
                r#"
                SELECT Race, RaceGrade, Finish, Runners
                FROM race_history
                WHERE Horse = ?1
                ORDER BY RaceDate DESC
                "#,
            )
            .map_err(|e| self.unavailable(e))?;

        let records = stmt
            .query_map([horse], record_from_row)
            .map_err(|e| self.unavailable(e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.unavailable(e))?;

        debug!(horse, races = records.len(), "race history loaded");
        Ok(records)
    }

    /// History lookup for display; failures degrade to `Unavailable`.
    pub fn lookup(&self, horse: &str) -> HistoryView {
        match self.history(horse) {
            Ok(records) if records.is_empty() => HistoryView::Empty,
            Ok(records) => {
                let summary = HistorySummary::from_records(&records);
                HistoryView::Records { records, summary }
            }
            Err(e) => {
                warn!("Race history unavailable for {}: {}", horse, e);
                HistoryView::Unavailable {
                    message: e.to_string(),
                }
            }
        }
    }

    fn open(&self) -> Result<Connection, DashboardError> {
        if !self.db_path.is_file() {
            return Err(DashboardError::StoreUnavailable(format!(
                "database not found: {}",
                self.db_path.display()
            )));
        }

        Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| self.unavailable(e))
    }

    fn unavailable(&self, e: rusqlite::Error) -> DashboardError {
        DashboardError::StoreUnavailable(format!("{}: {}", self.db_path.display(), e))
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<RaceRecord> {
    Ok(RaceRecord {
        race: text_value(row.get_ref(0)?).unwrap_or_default(),
        race_grade: text_value(row.get_ref(1)?).unwrap_or_default(),
        finish: integer_value(row.get_ref(2)?),
        runners: integer_value(row.get_ref(3)?),
    })
}

// Databases written by other tools may store numbers as REAL or TEXT.
fn integer_value(value: ValueRef<'_>) -> Option<i64> {
    match value {
        ValueRef::Integer(i) => Some(i),
        ValueRef::Real(f) if f.is_finite() && f.fract() == 0.0 => Some(f as i64),
        ValueRef::Text(t) => std::str::from_utf8(t).ok()?.trim().parse().ok(),
        _ => None,
    }
}

fn text_value(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        _ => None,
    }
}
