//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas required by the checkpoint store.
//! - Trigger schema migrations before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have migrations fully applied.
//! - The checkpoint directory exists after a successful `open_db`.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// File name of the checkpoint database inside the checkpoint directory.
pub const CHECKPOINT_DB_FILE: &str = "checkpoints.db";

/// Opens `<checkpoint_dir>/checkpoints.db`, creating the directory if needed.
///
/// # Side effects
/// - Creates `checkpoint_dir` when missing.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(checkpoint_dir: impl AsRef<Path>) -> DbResult<Connection> {
    let started_at = Instant::now();
    let dir = checkpoint_dir.as_ref();
    info!(
        "event=db_open module=db status=start mode=file dir={}",
        dir.display()
    );

    std::fs::create_dir_all(dir).map_err(|source| DbError::Directory {
        path: dir.display().to_string(),
        source,
    })?;

    let mut conn = match Connection::open(dir.join(CHECKPOINT_DB_FILE)) {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=file duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    finish_open(&mut conn, "file", started_at)?;
    Ok(conn)
}

/// Opens an in-memory SQLite database and applies all pending migrations.
pub fn open_db_in_memory() -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode=memory");

    let mut conn = Connection::open_in_memory()?;
    finish_open(&mut conn, "memory", started_at)?;
    Ok(conn)
}

fn finish_open(conn: &mut Connection, mode: &str, started_at: Instant) -> DbResult<()> {
    match bootstrap_connection(conn) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(())
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection) -> DbResult<()> {
    conn.busy_timeout(Duration::from_secs(5))?;
    apply_migrations(conn)?;
    Ok(())
}
