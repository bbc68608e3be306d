//! SQLite-based run history.
//!
//! Provides persistent storage for:
//! - Finished runs, one row per [`RunRecord`]
//! - Per-day listings and the set of days that have runs
//! - All-time history statistics

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use super::data_dir;
use super::store::RunRecordStore;
use crate::error::{CoreError, DatabaseError, StoreError};
use crate::session::RunRecord;

const DATE_FORMAT: &str = "%Y-%m-%d";

const SCHEMA: &str = indoc::indoc! {"
    CREATE TABLE IF NOT EXISTS runs (
        id                 INTEGER PRIMARY KEY AUTOINCREMENT,
        date               TEXT NOT NULL,
        start_time         TEXT NOT NULL,
        finish_time        TEXT NOT NULL,
        time_elapsed       TEXT NOT NULL,
        elapsed_hundredths INTEGER NOT NULL,
        steps              INTEGER NOT NULL,
        distance_meters    REAL NOT NULL,
        calories_kcal      REAL NOT NULL,
        max_speed_mps      REAL NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_runs_date ON runs(date);
    CREATE INDEX IF NOT EXISTS idx_runs_start_time ON runs(start_time);
"};

const SELECT_RUNS: &str = "SELECT id, date, start_time, finish_time, time_elapsed, steps,
        distance_meters, calories_kcal, max_speed_mps
 FROM runs";

/// A run as stored, with its row id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRun {
    pub id: i64,
    #[serde(flatten)]
    pub record: RunRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total_runs: u64,
    pub total_distance_meters: f64,
    pub total_steps: u64,
    pub total_calories_kcal: f64,
    pub total_elapsed_hundredths: u64,
    pub longest_distance_meters: f64,
    pub best_max_speed_mps: f64,
}

/// SQLite database for run history.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data dir>/runs.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("runs.db");
        Ok(Self::open_at(&path)?)
    }

    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests and dry runs).
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(SCHEMA)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    /// Insert a finished run and return its row id.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn insert_run(&self, record: &RunRecord) -> Result<i64, DatabaseError> {
        self.conn.execute(
            "INSERT INTO runs (date, start_time, finish_time, time_elapsed, elapsed_hundredths,
                               steps, distance_meters, calories_kcal, max_speed_mps)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.date().format(DATE_FORMAT).to_string(),
                record.start_time().to_rfc3339(),
                record.finish_time().to_rfc3339(),
                record.time_elapsed(),
                record.elapsed_hundredths().unwrap_or(0),
                record.steps(),
                record.distance_meters(),
                record.calories_kcal(),
                record.max_speed_mps(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// All runs, oldest first.
    pub fn list_runs(&self) -> Result<Vec<StoredRun>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_RUNS} ORDER BY start_time, id"))?;
        let rows = stmt.query_map([], raw_run)?;
        rows.map(|row| decode(row?)).collect()
    }

    /// Runs whose calendar date is `date`.
    pub fn runs_on(&self, date: NaiveDate) -> Result<Vec<StoredRun>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_RUNS} WHERE date = ?1 ORDER BY start_time, id"))?;
        let rows = stmt.query_map(params![date.format(DATE_FORMAT).to_string()], raw_run)?;
        rows.map(|row| decode(row?)).collect()
    }

    /// Distinct days that have at least one run, ascending.
    pub fn run_dates(&self) -> Result<Vec<NaiveDate>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT date FROM runs ORDER BY date")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut dates = Vec::new();
        for row in rows {
            let text = row?;
            let date = NaiveDate::parse_from_str(&text, DATE_FORMAT)
                .map_err(|e| DatabaseError::QueryFailed(format!("bad date '{text}': {e}")))?;
            dates.push(date);
        }
        Ok(dates)
    }

    /// Delete a run. Returns `false` if no such run exists.
    pub fn delete_run(&self, id: i64) -> Result<bool, DatabaseError> {
        let changed = self.conn.execute("DELETE FROM runs WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    pub fn stats(&self) -> Result<HistoryStats, DatabaseError> {
        let stats = self.conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(distance_meters), 0.0),
                    COALESCE(SUM(steps), 0),
                    COALESCE(SUM(calories_kcal), 0.0),
                    COALESCE(SUM(elapsed_hundredths), 0),
                    COALESCE(MAX(distance_meters), 0.0),
                    COALESCE(MAX(max_speed_mps), 0.0)
             FROM runs",
            [],
            |row| {
                Ok(HistoryStats {
                    total_runs: row.get(0)?,
                    total_distance_meters: row.get(1)?,
                    total_steps: row.get(2)?,
                    total_calories_kcal: row.get(3)?,
                    total_elapsed_hundredths: row.get(4)?,
                    longest_distance_meters: row.get(5)?,
                    best_max_speed_mps: row.get(6)?,
                })
            },
        )?;
        Ok(stats)
    }
}

impl RunRecordStore for Database {
    fn append(&mut self, record: &RunRecord) -> Result<(), StoreError> {
        let id = self.insert_run(record)?;
        tracing::debug!(id, "run saved");
        Ok(())
    }

    fn list(&self) -> Result<Vec<RunRecord>, StoreError> {
        Ok(self.list_runs()?.into_iter().map(|run| run.record).collect())
    }
}

/// Column values of one `runs` row before parsing.
struct RawRun {
    id: i64,
    date: String,
    start_time: String,
    finish_time: String,
    time_elapsed: String,
    steps: u64,
    distance_meters: f64,
    calories_kcal: f64,
    max_speed_mps: f64,
}

fn raw_run(row: &Row<'_>) -> rusqlite::Result<RawRun> {
    Ok(RawRun {
        id: row.get(0)?,
        date: row.get(1)?,
        start_time: row.get(2)?,
        finish_time: row.get(3)?,
        time_elapsed: row.get(4)?,
        steps: row.get(5)?,
        distance_meters: row.get(6)?,
        calories_kcal: row.get(7)?,
        max_speed_mps: row.get(8)?,
    })
}

fn decode(raw: RawRun) -> Result<StoredRun, DatabaseError> {
    let corrupt = |message: String| DatabaseError::CorruptRow { id: raw.id, message };
    let date = NaiveDate::parse_from_str(&raw.date, DATE_FORMAT)
        .map_err(|e| corrupt(format!("date: {e}")))?;
    let start_time = parse_time(&raw.start_time).map_err(|e| corrupt(format!("start_time: {e}")))?;
    let finish_time = parse_time(&raw.finish_time).map_err(|e| corrupt(format!("finish_time: {e}")))?;
    Ok(StoredRun {
        id: raw.id,
        record: RunRecord::restore(
            date,
            start_time,
            finish_time,
            raw.time_elapsed,
            raw.steps,
            raw.distance_meters,
            raw.calories_kcal,
            raw.max_speed_mps,
        ),
    })
}

fn parse_time(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(text).map(|t| t.with_timezone(&Utc))
}
