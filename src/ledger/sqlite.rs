//! SQLite ledger implementation

use crate::ledger::schema::initialize_schema;
use crate::ledger::{LedgerError, LedgerResult, OutcomeRecord, RunRecord, RunStatus};
use crate::state::ArtifactKind;
use crate::sync::{EntryOutcome, RunReport};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use std::path::Path;

/// SQLite-backed run ledger
pub struct SqliteLedger {
    conn: Connection,
}

impl SqliteLedger {
    /// Opens or creates the ledger at `path`, creating parent directories
    pub fn new(path: &Path) -> LedgerResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;
        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory ledger (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> LedgerResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Records a finished run and all of its entries in one transaction
    ///
    /// Returns the new run's id.
    pub fn record_run(&mut self, report: &RunReport, config_hash: &str) -> LedgerResult<i64> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO runs (started_at, finished_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                report.started_at().to_rfc3339(),
                report.finished_at().to_rfc3339(),
                config_hash,
                RunStatus::of(report).to_db_string()
            ],
        )?;
        let run_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO outcomes (run_id, date, kind, outcome, attempts, message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for entry in report.entries() {
                stmt.execute(params![
                    run_id,
                    entry.date.format("%Y-%m-%d").to_string(),
                    entry.kind.to_db_string(),
                    entry.outcome.to_db_string(),
                    entry.attempts,
                    entry.message
                ])?;
            }
        }

        tx.commit()?;
        tracing::debug!(run_id, entries = report.entries().len(), "Recorded run in ledger");
        Ok(run_id)
    }

    /// Most recent runs first
    pub fn recent_runs(&self, limit: usize) -> LedgerResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.id, r.started_at, r.finished_at, r.config_hash, r.status,
                    (SELECT COUNT(*) FROM outcomes o WHERE o.run_id = r.id AND o.outcome = ?2),
                    (SELECT COUNT(*) FROM outcomes o WHERE o.run_id = r.id AND o.outcome = ?3)
             FROM runs r ORDER BY r.id DESC LIMIT ?1",
        )?;

        let rows = stmt
            .query_map(
                params![
                    limit as i64,
                    EntryOutcome::Failed.to_db_string(),
                    EntryOutcome::Complete.to_db_string()
                ],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, i64>(6)?,
                    ))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, started_at, finished_at, config_hash, status, failed, written)| {
                let status = RunStatus::from_db_string(&status)
                    .ok_or_else(|| LedgerError::Corrupt(format!("run {} status '{}'", id, status)))?;
                Ok(RunRecord {
                    id,
                    started_at,
                    finished_at,
                    config_hash,
                    status,
                    failed: failed as u64,
                    written: written as u64,
                })
            })
            .collect()
    }

    /// Entries of one run, ordered by date then dependency order
    pub fn outcomes_for(&self, run_id: i64) -> LedgerResult<Vec<OutcomeRecord>> {
        let exists: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM runs WHERE id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(LedgerError::RunNotFound(run_id));
        }

        let mut stmt = self.conn.prepare(
            "SELECT date, kind, outcome, attempts, message FROM outcomes WHERE run_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = rows
            .into_iter()
            .map(|(date, kind, outcome, attempts, message)| {
                Ok(OutcomeRecord {
                    date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                        .map_err(|_| LedgerError::Corrupt(format!("date '{}'", date)))?,
                    kind: ArtifactKind::from_db_string(&kind)
                        .ok_or_else(|| LedgerError::Corrupt(format!("kind '{}'", kind)))?,
                    outcome: EntryOutcome::from_db_string(&outcome)
                        .ok_or_else(|| LedgerError::Corrupt(format!("outcome '{}'", outcome)))?,
                    attempts,
                    message,
                })
            })
            .collect::<LedgerResult<Vec<_>>>()?;

        records.sort_by_key(|r| (r.date, r.kind));
        Ok(records)
    }
}
