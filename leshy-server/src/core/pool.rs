use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use crate::core::queue::{Consumer, Queue};

/// Shared handle to one open database. SQL always goes through the inner
/// mutex; the pool lock is never held across a SQL call.
pub type SharedDb = Arc<Mutex<rusqlite::Connection>>;

/// A pooled database handle with a sliding expiry.
#[derive(Clone)]
pub struct Connection {
    pub db: SharedDb,
    expires_at: Arc<Mutex<Instant>>,
}

impl Connection {
    pub fn new(db: rusqlite::Connection, ttl: Duration) -> Self {
        Connection {
            db: Arc::new(Mutex::new(db)),
            expires_at: Arc::new(Mutex::new(Instant::now() + ttl)),
        }
    }

    fn touch(&self, ttl: Duration) {
        *self.expires_at.lock().unwrap() = Instant::now() + ttl;
    }

    fn is_expired(&self, now: Instant) -> bool {
        *self.expires_at.lock().unwrap() <= now
    }
}

/// Thread-safe map of open database handles keyed by (queue, consumer).
pub struct ConnectionMap {
    conns: RwLock<HashMap<Queue, HashMap<Consumer, Connection>>>,
    ttl: Duration,
}

impl ConnectionMap {
    pub fn new(ttl: Duration) -> Self {
        ConnectionMap {
            conns: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn set(&self, queue: &Queue, consumer: &Consumer, conn: Connection) {
        let mut conns = self.conns.write().unwrap();
        conns
            .entry(queue.clone())
            .or_default()
            .insert(consumer.clone(), conn);
    }

    pub fn set_many(&self, queue: &Queue, batch: impl IntoIterator<Item = (Consumer, Connection)>) {
        let mut conns = self.conns.write().unwrap();
        let queue_map = conns.entry(queue.clone()).or_default();
        for (consumer, conn) in batch {
            queue_map.insert(consumer, conn);
        }
    }

    /// Looks up a handle and slides its expiry forward. The refresh happens
    /// under the read lock; a concurrent `clean` may still evict the entry,
    /// in which case the next caller simply reopens the file.
    pub fn get(&self, queue: &Queue, consumer: &Consumer) -> Option<Connection> {
        let conns = self.conns.read().unwrap();
        let conn = conns.get(queue)?.get(consumer)?.clone();
        conn.touch(self.ttl);
        Some(conn)
    }

    /// Evicts every handle whose expiry has passed, dropping queue entries
    /// that end up empty. Returns the eviction count.
    pub fn clean(&self) -> usize {
        let mut conns = self.conns.write().unwrap();

        let now = Instant::now();
        let mut removed = 0;

        conns.retain(|_, queue_map| {
            queue_map.retain(|_, conn| {
                let keep = !conn.is_expired(now);
                if !keep {
                    removed += 1;
                }
                keep
            });
            !queue_map.is_empty()
        });

        removed
    }

    /// Number of handles currently resident.
    pub fn len(&self) -> usize {
        self.conns.read().unwrap().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
