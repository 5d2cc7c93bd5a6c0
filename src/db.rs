//! Episode history in SQLite.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

use crate::error::Result;
use crate::stats::EpisodeReport;

#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeRow {
    pub episode: i64,
    pub score: i64,
    pub steps: i64,
    pub epsilon: f64,
    pub mean_loss: Option<f64>,
    pub recorded_at: String,
}

pub struct EpisodeLog {
    conn: Connection,
}

impl EpisodeLog {
    pub fn open(path: &Path) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS episodes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                episode INTEGER NOT NULL,
                score INTEGER NOT NULL,
                steps INTEGER NOT NULL,
                epsilon REAL NOT NULL,
                explored INTEGER NOT NULL,
                exploited INTEGER NOT NULL,
                mean_loss REAL,
                mean_accuracy REAL,
                recorded_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    pub fn insert(&self, report: &EpisodeReport) -> Result<()> {
        self.conn.execute(
            "INSERT INTO episodes
                (episode, score, steps, epsilon, explored, exploited, mean_loss, mean_accuracy, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                report.episode as i64,
                report.score,
                report.steps,
                report.epsilon,
                report.explored,
                report.exploited,
                report.mean_loss.map(f64::from),
                report.mean_accuracy.map(f64::from),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn best_score(&self) -> Result<Option<u32>> {
        let best: Option<i64> = self
            .conn
            .query_row("SELECT MAX(score) FROM episodes", [], |row| row.get(0))
            .optional()?
            .flatten();
        Ok(best.map(|s| s as u32))
    }

    pub fn count(&self) -> Result<u64> {
        let n: i64 = self.conn.query_row("SELECT COUNT(*) FROM episodes", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Latest `limit` episodes, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<EpisodeRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT episode, score, steps, epsilon, mean_loss, recorded_at
             FROM episodes ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map([limit as i64], |row| {
                Ok(EpisodeRow {
                    episode: row.get(0)?,
                    score: row.get(1)?,
                    steps: row.get(2)?,
                    epsilon: row.get(3)?,
                    mean_loss: row.get(4)?,
                    recorded_at: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
