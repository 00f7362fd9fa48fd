use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::core::error::StorageError;

const DB_MIGRATION: &str = "
CREATE TABLE IF NOT EXISTS messages (
    id UUID PRIMARY KEY,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    data BLOB,
    acked BOOLEAN NOT NULL CHECK (acked IN (0, 1)) DEFAULT 0
);
";

pub fn db_path(base_dir: &Path, queue: &str, name: &str) -> PathBuf {
    base_dir.join(queue).join(format!("{name}.db"))
}

/// Lists the file stems of every database file under `base_dir/queue/`,
/// creating the directory tree first if it is absent.
pub fn db_filenames(base_dir: &Path, queue: &str) -> Result<Vec<String>, StorageError> {
    let dir = base_dir.join(queue);
    fs::create_dir_all(&dir).map_err(StorageError::MakeDir)?;

    let entries = fs::read_dir(&dir).map_err(StorageError::ReadDir)?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(StorageError::ReadDir)?;
        let file_name = entry.file_name();
        if let Some(stem) = file_name.to_string_lossy().strip_suffix(".db") {
            names.push(stem.to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Opens `base_dir/queue/name.db` and runs the schema migration. When
/// `mkdir` is set the queue directory is created first.
pub fn open_db(base_dir: &Path, queue: &str, name: &str, mkdir: bool) -> Result<Connection, StorageError> {
    if mkdir {
        fs::create_dir_all(base_dir.join(queue)).map_err(StorageError::MakeDir)?;
    }

    let conn = Connection::open(db_path(base_dir, queue, name)).map_err(StorageError::Open)?;
    conn.execute_batch(DB_MIGRATION)
        .map_err(StorageError::Migrate)?;

    Ok(conn)
}

/// Copies the entire messages table of `primary` into the consumer database
/// at `base_dir/queue/name.db`, forcing every row unacked. `INSERT OR
/// IGNORE` makes a racing second copy converge on the same rows.
pub fn copy_messages(
    primary: &Connection,
    base_dir: &Path,
    queue: &str,
    name: &str,
) -> Result<(), StorageError> {
    let target = db_path(base_dir, queue, name);
    primary
        .execute(
            "ATTACH DATABASE ?1 AS consumer_db",
            [target.to_string_lossy().into_owned()],
        )
        .map_err(StorageError::Copy)?;

    let copied = primary.execute(
        "INSERT OR IGNORE INTO consumer_db.messages (id, created_at, data, acked)
         SELECT id, created_at, data, 0 FROM messages",
        [],
    );
    let detached = primary.execute_batch("DETACH DATABASE consumer_db");

    copied.map_err(StorageError::Copy)?;
    detached.map_err(StorageError::Copy)?;
    Ok(())
}
