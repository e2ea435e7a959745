//! SQLite schema definitions for historical race data
//!
//! Tables:
//! - race_history: one row per past race entry of a horse

use rusqlite::{Connection, Result};

/// Name of the race history table
pub const RACE_HISTORY_TABLE: &str = "race_history";

/// Create all tables in the database
pub fn create_tables(conn: &Connection) -> Result<()> {
    // Column names follow the spreadsheet headers the table is built from
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS race_history (
            Horse TEXT NOT NULL,
            Race TEXT NOT NULL,
            RaceGrade TEXT,
            Finish INTEGER,
            Runners INTEGER,
            RaceDate TEXT NOT NULL
        )
        "#,
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_race_history_horse ON race_history(Horse, RaceDate)",
        [],
    )?;

    Ok(())
}

/// Drop the race history table (and its index) if present
pub fn drop_tables(conn: &Connection) -> Result<()> {
    conn.execute("DROP TABLE IF EXISTS race_history", [])?;
    Ok(())
}
