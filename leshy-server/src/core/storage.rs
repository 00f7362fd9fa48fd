use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::{params, OptionalExtension};

use crate::core::error::StorageError;
use crate::core::pool::{Connection, ConnectionMap};
use crate::core::queue::{Consumer, Queue};
use crate::core::sqlite;

/// One stored message, as handed back to a subscriber session.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub data: Vec<u8>,
}

/// Per-consumer SQL storage: one primary database per queue holding the
/// authoritative publish log, plus one derived database per consumer
/// tracking that consumer's ack state. Handles are borrowed through the
/// shared [`ConnectionMap`].
pub struct DistributedSqlStorage {
    base_dir: PathBuf,
    pool: Arc<ConnectionMap>,
}

impl DistributedSqlStorage {
    pub fn new(base_dir: impl Into<PathBuf>, pool: Arc<ConnectionMap>) -> Self {
        DistributedSqlStorage {
            base_dir: base_dir.into(),
            pool,
        }
    }

    /// Saves the message into every database of the queue. There is no
    /// cross-file transaction: a failure part-way leaves the row in the
    /// files already written, so delivery is at-least-once per consumer.
    pub fn insert(&self, queue: &Queue, id: &str, data: &[u8]) -> Result<(), StorageError> {
        let conns = self.queue_conns(queue)?;

        for (_, conn) in &conns {
            let db = conn.db.lock().unwrap();
            db.execute(
                "INSERT INTO messages (id, data) VALUES (?1, ?2);",
                params![id, data],
            )
            .map_err(StorageError::Insert)?;
        }

        Ok(())
    }

    /// Returns every unacked message of the (queue, consumer) pair in
    /// publish order, materializing the consumer database on first contact.
    pub fn get_all(&self, queue: &Queue, consumer: &Consumer) -> Result<Vec<Message>, StorageError> {
        let conn = self.consumer_conn(queue, consumer)?;

        let db = conn.db.lock().unwrap();
        let mut stmt = db
            .prepare(
                "SELECT id, data FROM messages WHERE acked = 0
                 ORDER BY created_at ASC, rowid ASC;",
            )
            .map_err(StorageError::Query)?;

        let rows = stmt
            .query_map([], |row| {
                Ok(Message {
                    id: row.get(0)?,
                    data: row.get(1)?,
                })
            })
            .map_err(StorageError::Query)?;

        let mut msgs = Vec::new();
        for row in rows {
            msgs.push(row.map_err(StorageError::Query)?);
        }

        Ok(msgs)
    }

    /// Marks one message acked on the consumer's own database. An id that
    /// is not present updates nothing, which makes acks idempotent.
    pub fn ack(&self, queue: &Queue, consumer: &Consumer, id: &str) -> Result<(), StorageError> {
        let conn = self.consumer_conn(queue, consumer)?;

        let db = conn.db.lock().unwrap();
        db.execute("UPDATE messages SET acked = 1 WHERE id = ?1;", params![id])
            .map_err(StorageError::Ack)?;

        Ok(())
    }

    /// Opens (or reuses) one handle per existing database file of the
    /// queue. A brand-new queue has no files yet and gets its primary.
    fn queue_conns(&self, queue: &Queue) -> Result<Vec<(Consumer, Connection)>, StorageError> {
        let mut names = sqlite::db_filenames(&self.base_dir, queue.as_str())?;
        if names.is_empty() {
            names.push(queue.as_str().to_string());
        }

        let mut conns = Vec::with_capacity(names.len());
        for name in names {
            let consumer = Consumer::new(name)?;
            let conn = match self.pool.get(queue, &consumer) {
                Some(conn) => conn,
                None => {
                    let db = sqlite::open_db(&self.base_dir, queue.as_str(), consumer.as_str(), false)?;
                    Connection::new(db, self.pool.ttl())
                }
            };
            conns.push((consumer, conn));
        }

        self.pool.set_many(queue, conns.iter().cloned());

        Ok(conns)
    }

    /// Resolves the consumer's handle, running the materialization protocol
    /// for a consumer database seen for the first time: open and pool it,
    /// make sure the primary is pooled too, then bulk-copy the primary's
    /// rows unless the consumer file already has content.
    fn consumer_conn(&self, queue: &Queue, consumer: &Consumer) -> Result<Connection, StorageError> {
        let consumer = consumer.resolve(queue);

        if let Some(conn) = self.pool.get(queue, &consumer) {
            return Ok(conn);
        }

        let db = sqlite::open_db(&self.base_dir, queue.as_str(), consumer.as_str(), true)?;
        let conn = Connection::new(db, self.pool.ttl());
        self.pool.set(queue, &consumer, conn.clone());

        // The primary itself needs no copy step.
        if consumer.as_str() == queue.as_str() {
            return Ok(conn);
        }

        let primary_name = Consumer::primary(queue);
        let primary = match self.pool.get(queue, &primary_name) {
            Some(conn) => conn,
            None => {
                let db = sqlite::open_db(&self.base_dir, queue.as_str(), queue.as_str(), false)?;
                let primary = Connection::new(db, self.pool.ttl());
                self.pool.set(queue, &primary_name, primary.clone());
                primary
            }
        };

        // A consumer file with any row at all is already materialized.
        let populated = {
            let db = conn.db.lock().unwrap();
            db.query_row("SELECT 1 FROM messages LIMIT 1", [], |row| {
                row.get::<_, i64>(0)
            })
            .optional()
            .map_err(StorageError::Query)?
        };
        if populated.is_some() {
            return Ok(conn);
        }

        let primary_db = primary.db.lock().unwrap();
        sqlite::copy_messages(&primary_db, &self.base_dir, queue.as_str(), consumer.as_str())?;

        Ok(conn)
    }
}
