//! Stage-keyed checkpoint store contracts and implementations.
//!
//! # Responsibility
//! - Persist one serialized payload per pipeline stage.
//! - Keep serialization separate from which stage produced the data.
//!
//! # Invariants
//! - A save replaces the previous payload for the stage atomically; readers
//!   never observe a partial write.
//! - `clear_all` removes every stage in one operation.
//! - Payloads that fail to decode are reported, never silently dropped.

use crate::db::DbError;
use log::{debug, info};
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("checkpoint `{stage}` could not be (de)serialized: {source}")]
    Serialization {
        stage: Stage,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid persisted checkpoint data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Pipeline stages, in execution order.
///
/// Payload per stage:
/// - `CsoSettlements`, `GroupedSettlements`: `Vec<Settlement>`
/// - `Locations`: `GeocodeCache`
/// - `ProcessedSettlements`: `ProcessedSettlements`
/// - `FinalSettlements`: `SettlementDataset`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    CsoSettlements,
    GroupedSettlements,
    Locations,
    ProcessedSettlements,
    FinalSettlements,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::CsoSettlements,
        Stage::GroupedSettlements,
        Stage::Locations,
        Stage::ProcessedSettlements,
        Stage::FinalSettlements,
    ];

    /// Stable storage key.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CsoSettlements => "cso_settlements",
            Self::GroupedSettlements => "grouped_settlements",
            Self::Locations => "locations",
            Self::ProcessedSettlements => "processed_settlements",
            Self::FinalSettlements => "final_settlements",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.as_str() == value)
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable key-value store for stage checkpoints.
///
/// Implementations are used by exactly one pipeline at a time.
pub trait CheckpointStore {
    fn load_payload(&self, stage: Stage) -> RepoResult<Option<String>>;
    fn save_payload(&self, stage: Stage, payload: &str) -> RepoResult<()>;
    /// Deletes every checkpoint and returns how many were removed.
    fn clear_all(&self) -> RepoResult<usize>;
    /// Stages currently holding a checkpoint, in execution order.
    fn saved_stages(&self) -> RepoResult<Vec<Stage>>;

    /// Loads and decodes the checkpoint for `stage`.
    fn load<T: DeserializeOwned>(&self, stage: Stage) -> RepoResult<Option<T>>
    where
        Self: Sized,
    {
        match self.load_payload(stage)? {
            Some(payload) => {
                let value = serde_json::from_str(&payload)
                    .map_err(|source| RepoError::Serialization { stage, source })?;
                info!("event=checkpoint_load module=repo status=ok stage={stage}");
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Encodes and stores `value` as the checkpoint for `stage`.
    fn save<T: Serialize>(&self, stage: Stage, value: &T) -> RepoResult<()>
    where
        Self: Sized,
    {
        let payload = serde_json::to_string(value)
            .map_err(|source| RepoError::Serialization { stage, source })?;
        self.save_payload(stage, &payload)?;
        info!(
            "event=checkpoint_save module=repo status=ok stage={stage} bytes={}",
            payload.len()
        );
        Ok(())
    }
}

/// SQLite-backed checkpoint store.
pub struct SqliteCheckpointStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCheckpointStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CheckpointStore for SqliteCheckpointStore<'_> {
    fn load_payload(&self, stage: Stage) -> RepoResult<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM checkpoints WHERE stage = ?1;")?;
        let mut rows = stmt.query([stage.as_str()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    fn save_payload(&self, stage: Stage, payload: &str) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO checkpoints (stage, payload, updated_at)
             VALUES (?1, ?2, strftime('%s', 'now') * 1000)
             ON CONFLICT(stage) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at;",
            params![stage.as_str(), payload],
        )?;
        Ok(())
    }

    fn clear_all(&self) -> RepoResult<usize> {
        let removed = self.conn.execute("DELETE FROM checkpoints;", [])?;
        info!("event=checkpoint_clear module=repo status=ok removed={removed}");
        Ok(removed)
    }

    fn saved_stages(&self) -> RepoResult<Vec<Stage>> {
        let mut stmt = self.conn.prepare("SELECT stage FROM checkpoints;")?;
        let mut rows = stmt.query([])?;
        let mut stages = Vec::new();
        while let Some(row) = rows.next()? {
            let key: String = row.get(0)?;
            let stage = Stage::parse(&key).ok_or_else(|| {
                RepoError::InvalidData(format!("unknown stage `{key}` in checkpoints.stage"))
            })?;
            stages.push(stage);
        }
        stages.sort();
        Ok(stages)
    }
}

/// Process-local checkpoint store, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    payloads: RefCell<BTreeMap<Stage, String>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn load_payload(&self, stage: Stage) -> RepoResult<Option<String>> {
        Ok(self.payloads.borrow().get(&stage).cloned())
    }

    fn save_payload(&self, stage: Stage, payload: &str) -> RepoResult<()> {
        self.payloads.borrow_mut().insert(stage, payload.to_string());
        Ok(())
    }

    fn clear_all(&self) -> RepoResult<usize> {
        let mut payloads = self.payloads.borrow_mut();
        let removed = payloads.len();
        payloads.clear();
        debug!("event=checkpoint_clear module=repo status=ok mode=memory removed={removed}");
        Ok(removed)
    }

    fn saved_stages(&self) -> RepoResult<Vec<Stage>> {
        Ok(self.payloads.borrow().keys().copied().collect())
    }
}
