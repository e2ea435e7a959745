//! Full-replace ingestion of race history exports into SQLite.
//!
//! The source is a CSV or Parquet export of the cleaned race spreadsheet.
//! Every run drops and recreates `race_history`; nothing is merged.

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::{info, warn};

use super::schema::{create_tables, drop_tables};

/// Columns the source must provide (extra columns are ignored)
pub const REQUIRED_COLUMNS: [&str; 6] = ["Horse", "Race", "RaceGrade", "Finish", "Runners", "RaceDate"];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// One source row ready to be written to `race_history`
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub horse: String,
    pub race: String,
    pub race_grade: Option<String>,
    pub finish: Option<i64>,
    pub runners: Option<i64>,
    pub race_date: NaiveDate,
}

/// Replace the race history table with the contents of `source`.
///
/// Returns the number of rows written.
pub fn ingest_race_history(source: &Path, db_path: &Path) -> Result<usize> {
    let df = read_source(source)?;
    let rows = rows_from_dataframe(&df)?;

    // Create parent directories if needed
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let mut conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    let inserted = replace_race_history(&mut conn, &rows).context("Failed to write race history")?;

    info!(
        "Ingested {} race history rows from {} into {}",
        inserted,
        source.display(),
        db_path.display()
    );
    Ok(inserted)
}

/// Read a CSV or Parquet export into a DataFrame.
pub fn read_source(path: &Path) -> Result<DataFrame> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let df = match extension.as_deref() {
        Some("csv") => CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()
            .with_context(|| format!("Failed to read CSV {}", path.display()))?,
        Some("parquet") => LazyFrame::scan_parquet(path, Default::default())?
            .collect()
            .with_context(|| format!("Failed to read Parquet {}", path.display()))?,
        Some("xlsx") | Some("xls") => bail!(
            "spreadsheets are not read directly; export {} to CSV first",
            path.display()
        ),
        _ => bail!("unsupported race history source: {}", path.display()),
    };

    Ok(df)
}

/// Convert the source frame into rows, skipping rows without a horse or a
/// readable date.
pub fn rows_from_dataframe(df: &DataFrame) -> Result<Vec<HistoryRow>> {
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|name| df.column(name).is_err())
        .collect();
    if !missing.is_empty() {
        bail!("race history source is missing columns: {}", missing.join(", "));
    }

    let horses = text_values(df, "Horse")?;
    let races = text_values(df, "Race")?;
    let grades = text_values(df, "RaceGrade")?;
    let finishes = integer_values(df, "Finish")?;
    let runners = integer_values(df, "Runners")?;
    let dates = text_values(df, "RaceDate")?;

    let mut rows = Vec::with_capacity(df.height());
    let mut skipped = 0usize;

    for i in 0..df.height() {
        let Some(horse) = horses[i].clone().filter(|h| !h.is_empty()) else {
            warn!("Skipping row {}: no horse name", i);
            skipped += 1;
            continue;
        };
        let Some(race_date) = dates[i].as_deref().and_then(parse_race_date) else {
            warn!("Skipping row {} ({}): unreadable race date {:?}", i, horse, dates[i]);
            skipped += 1;
            continue;
        };

        rows.push(HistoryRow {
            horse,
            race: races[i].clone().unwrap_or_default(),
            race_grade: grades[i].clone(),
            finish: finishes[i],
            runners: runners[i],
            race_date,
        });
    }

    if skipped > 0 {
        warn!("Skipped {} of {} rows", skipped, df.height());
    }

    Ok(rows)
}

/// Drop and recreate `race_history`, then insert `rows`, in one transaction.
pub fn replace_race_history(conn: &mut Connection, rows: &[HistoryRow]) -> rusqlite::Result<usize> {
    let tx = conn.transaction()?;
    drop_tables(&tx)?;
    create_tables(&tx)?;

    {
        let mut stmt = tx.prepare(
            r#"
            INSERT INTO race_history (Horse, Race, RaceGrade, Finish, Runners, RaceDate)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )?;
        for row in rows {
            stmt.execute(params![
                row.horse,
                row.race,
                row.race_grade,
                row.finish,
                row.runners,
                row.race_date.to_string(),
            ])?;
        }
    }

    tx.commit()?;
    Ok(rows.len())
}

/// Parse the date formats seen in race exports into a calendar date.
///
/// Slash dates with the year last are read day-first or month-first,
/// whichever is the only valid reading; `01/02/2013` has two and is rejected.
pub fn parse_race_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| parse_year_last_date(value))
}

fn parse_year_last_date(value: &str) -> Option<NaiveDate> {
    let day_first = NaiveDate::parse_from_str(value, "%d/%m/%Y").ok();
    let month_first = NaiveDate::parse_from_str(value, "%m/%d/%Y").ok();
    match (day_first, month_first) {
        (Some(a), Some(b)) if a != b => None,
        (Some(date), _) | (None, Some(date)) => Some(date),
        (None, None) => None,
    }
}

fn text_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let col = df
        .column(name)?
        .cast(&DataType::String)
        .with_context(|| format!("Column {} cannot be read as text", name))?;
    Ok(col
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.trim().to_string()))
        .collect())
}

/// Whole numbers only; anything else (e.g. "DNF") becomes NULL.
fn integer_values(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let col = df
        .column(name)?
        .cast(&DataType::Float64)
        .with_context(|| format!("Column {} cannot be read as a number", name))?;
    Ok(col
        .f64()?
        .into_iter()
        .map(|v| v.filter(|f| f.is_finite() && f.fract() == 0.0).map(|f| f as i64))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::temp_path;

    fn row(horse: &str, race: &str, date: (i32, u32, u32), finish: i64) -> HistoryRow {
        HistoryRow {
            horse: horse.to_string(),
            race: race.to_string(),
            race_grade: Some("G1".to_string()),
            finish: Some(finish),
            runners: Some(16),
            race_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
        }
    }

    fn count_rows(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM race_history", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_parse_race_date() {
        let expected = NaiveDate::from_ymd_opt(2013, 12, 22).unwrap();
        assert_eq!(parse_race_date("2013-12-22"), Some(expected));
        assert_eq!(parse_race_date("2013/12/22"), Some(expected));
        assert_eq!(parse_race_date("22/12/2013"), Some(expected));
        assert_eq!(parse_race_date("2013-12-22 00:00:00"), Some(expected));
        assert_eq!(parse_race_date("2013-12-22T15:25:00.000"), Some(expected));
        assert_eq!(parse_race_date(" 20131222 "), Some(expected));
        assert_eq!(parse_race_date("last week"), None);
    }

    #[test]
    fn test_parse_year_last_dates() {
        let arima = NaiveDate::from_ymd_opt(2013, 12, 22).unwrap();
        assert_eq!(parse_race_date("12/22/2013"), Some(arima));
        assert_eq!(parse_race_date("22/12/2013"), Some(arima));
        // Same day either way round
        assert_eq!(
            parse_race_date("06/06/2013"),
            NaiveDate::from_ymd_opt(2013, 6, 6)
        );
        // 1 February or 2 January: refuse to guess
        assert_eq!(parse_race_date("01/02/2013"), None);
        assert_eq!(parse_race_date("31/31/2013"), None);
    }

    #[test]
    fn test_ambiguous_date_row_skipped() {
        let df = df!(
            "Horse" => ["Gold Ship", "Gold Ship"],
            "Race" => ["Hanshin Daishoten", "Kyoto Kinen"],
            "RaceGrade" => ["G2", "G2"],
            "Finish" => [1, 1],
            "Runners" => [10, 11],
            "RaceDate" => ["03/17/2013", "01/02/2013"]
        )
        .unwrap();

        let rows = rows_from_dataframe(&df).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].race, "Hanshin Daishoten");
        assert_eq!(rows[0].race_date, NaiveDate::from_ymd_opt(2013, 3, 17).unwrap());
    }

    #[test]
    fn test_rows_from_dataframe() {
        let df = df!(
            "Horse" => [Some("Orfevre"), Some("Gold Ship"), None, Some("Lelouch")],
            "Race" => ["Japan Cup", "Kikuka Sho", "Unknown", "Arima Kinen"],
            "RaceGrade" => ["G1", "G1", "G1", "G1"],
            "Finish" => ["2", "1", "3", "DNF"],
            "Runners" => [17.0, 18.0, 16.0, 16.0],
            "RaceDate" => ["2012-11-25", "2012/10/21", "2012-12-23", "not a date"],
            "Jockey" => ["Ikezoe", "Uchida", "?", "?"]
        )
        .unwrap();

        let rows = rows_from_dataframe(&df).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].horse, "Orfevre");
        assert_eq!(rows[0].finish, Some(2));
        assert_eq!(rows[0].runners, Some(17));
        assert_eq!(rows[1].race_date, NaiveDate::from_ymd_opt(2012, 10, 21).unwrap());
    }

    #[test]
    fn test_non_numeric_finish_is_null() {
        let df = df!(
            "Horse" => ["Lelouch"],
            "Race" => ["Prix Niel"],
            "RaceGrade" => ["G2"],
            "Finish" => ["DNF"],
            "Runners" => [8],
            "RaceDate" => ["2013-09-15"]
        )
        .unwrap();

        let rows = rows_from_dataframe(&df).unwrap();
        assert_eq!(rows[0].finish, None);
        assert_eq!(rows[0].runners, Some(8));
    }

    #[test]
    fn test_missing_columns_rejected() {
        let df = df!(
            "Horse" => ["Orfevre"],
            "Race" => ["Japan Cup"]
        )
        .unwrap();

        let err = rows_from_dataframe(&df).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("RaceGrade"));
        assert!(msg.contains("RaceDate"));
    }

    #[test]
    fn test_replace_is_full_replace() {
        let mut conn = Connection::open_in_memory().unwrap();

        let first = vec![
            row("Orfevre", "Japan Cup", (2012, 11, 25), 2),
            row("Gold Ship", "Kikuka Sho", (2012, 10, 21), 1),
        ];
        assert_eq!(replace_race_history(&mut conn, &first).unwrap(), 2);
        assert_eq!(count_rows(&conn), 2);

        let second = vec![row("Lelouch", "Prix Niel", (2013, 9, 15), 1)];
        assert_eq!(replace_race_history(&mut conn, &second).unwrap(), 1);
        assert_eq!(count_rows(&conn), 1);

        let horse: String = conn
            .query_row("SELECT Horse FROM race_history", [], |r| r.get(0))
            .unwrap();
        assert_eq!(horse, "Lelouch");
    }

    #[test]
    fn test_dates_stored_as_iso() {
        let mut conn = Connection::open_in_memory().unwrap();
        replace_race_history(&mut conn, &[row("Orfevre", "Arima Kinen", (2011, 12, 25), 1)])
            .unwrap();

        let date: String = conn
            .query_row("SELECT RaceDate FROM race_history", [], |r| r.get(0))
            .unwrap();
        assert_eq!(date, "2011-12-25");
    }

    #[test]
    fn test_read_source_rejects_spreadsheet() {
        let err = read_source(Path::new("data/processed/cleaned.xlsx")).unwrap_err();
        assert!(err.to_string().contains("export"));
    }

    #[test]
    fn test_ingest_from_csv() {
        let source = temp_path("history.csv");
        let db = temp_path("ingest").join("races.db");
        std::fs::write(
            &source,
            "Horse,Race,RaceGrade,Finish,Runners,RaceDate\n\
             Orfevre,Takarazuka Kinen,G1,1,16,2012-06-24\n\
             Orfevre,Japan Cup,G1,2,17,2012-11-25\n\
             Gold Ship,Kikuka Sho,G1,1,18,2012-10-21\n",
        )
        .unwrap();

        let inserted = ingest_race_history(&source, &db).unwrap();
        assert_eq!(inserted, 3);

        // Second run replaces rather than appends
        let inserted = ingest_race_history(&source, &db).unwrap();
        assert_eq!(inserted, 3);
        let conn = Connection::open(&db).unwrap();
        assert_eq!(count_rows(&conn), 3);

        drop(conn);
        std::fs::remove_file(&source).ok();
        std::fs::remove_dir_all(db.parent().unwrap()).ok();
    }

    #[test]
    fn test_ingest_from_parquet() {
        let mut df = df!(
            "Horse" => ["Gold Ship", "Gold Ship", "Orfevre"],
            "Race" => ["Takarazuka Kinen", "Kyoto Daishoten", "Prix Foy"],
            "RaceGrade" => ["G1", "G2", "G2"],
            "Finish" => [1i64, 5, 1],
            "Runners" => [11i64, 8, 5],
            "RaceDate" => ["2013-06-23", "2013-10-06", "2013-09-15"]
        )
        .unwrap();
        let source = temp_path("history.parquet");
        let file = std::fs::File::create(&source).unwrap();
        ParquetWriter::new(file).finish(&mut df).unwrap();

        let db = temp_path("ingest-parquet").join("races.db");
        assert_eq!(ingest_race_history(&source, &db).unwrap(), 3);

        let conn = Connection::open(&db).unwrap();
        let races: Vec<String> = conn
            .prepare("SELECT Race FROM race_history WHERE Horse = ?1 ORDER BY RaceDate DESC")
            .unwrap()
            .query_map(["Gold Ship"], |r| r.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(races, vec!["Kyoto Daishoten", "Takarazuka Kinen"]);

        drop(conn);
        std::fs::remove_file(&source).ok();
        std::fs::remove_dir_all(db.parent().unwrap()).ok();
    }
}
