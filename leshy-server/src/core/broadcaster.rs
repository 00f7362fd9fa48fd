use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;
use leshy_protocol::Delivery;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::core::error::StorageError;
use crate::core::queue::{Consumer, Queue};
use crate::core::storage::{DistributedSqlStorage, Message};

/// Per-listener delivery buffer. A subscriber replaying a long backlog can
/// lag this far behind live publishes before fan-out tasks start parking.
const DELIVERY_BUFFER: usize = 64;

/// In-memory registration of one live subscriber session. The session owns
/// the listener and the receiving half of its channel; the broadcaster only
/// keeps a sending handle for fan-out and removes it by id.
pub struct Listener {
    pub id: Uuid,
    pub queue: Queue,
    pub consumer: Consumer,
    tx: mpsc::Sender<Delivery>,
}

impl Listener {
    pub fn new(queue: Queue, consumer: Consumer) -> (Self, mpsc::Receiver<Delivery>) {
        let (tx, rx) = mpsc::channel(DELIVERY_BUFFER);
        let listener = Listener {
            id: Uuid::new_v4(),
            queue,
            consumer,
            tx,
        };
        (listener, rx)
    }
}

struct ListenerHandle {
    id: Uuid,
    tx: mpsc::Sender<Delivery>,
}

/// Couples message persistence with delivery to the currently-connected
/// listener sessions of each queue.
pub struct MessageBroadcaster {
    storage: DistributedSqlStorage,
    listeners: Mutex<HashMap<Queue, Vec<ListenerHandle>>>,
}

impl MessageBroadcaster {
    pub fn new(storage: DistributedSqlStorage) -> Self {
        MessageBroadcaster {
            storage,
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// Persists the message under a fresh id, then fans it out to every
    /// live listener of the queue. Each listener gets its own send task so
    /// a stalled subscriber never blocks the publisher or its peers; a
    /// parked send ends when session teardown drops the receiving half.
    pub fn publish_message(&self, queue: &Queue, data: Bytes) -> Result<String, StorageError> {
        let id = Uuid::new_v4().to_string();

        self.storage.insert(queue, &id, &data)?;

        let handles: Vec<mpsc::Sender<Delivery>> = {
            let listeners = self.listeners.lock().unwrap();
            listeners
                .get(queue)
                .map(|list| list.iter().map(|h| h.tx.clone()).collect())
                .unwrap_or_default()
        };

        if !handles.is_empty() {
            debug!(%id, listeners = handles.len(), "publishing message to listeners");
            for tx in handles {
                let delivery = Delivery {
                    id: id.clone(),
                    data: data.clone(),
                };
                tokio::spawn(async move {
                    let _ = tx.send(delivery).await;
                });
            }
        }

        Ok(id)
    }

    /// Registers the listener and snapshots its backlog. Registration comes
    /// first so any publish completing afterwards is seen live; a publish
    /// racing the transition may be seen twice, never missed.
    pub fn read_messages(&self, listener: &Listener) -> Result<Vec<Message>, StorageError> {
        debug!(id = %listener.id, queue = %listener.queue, "connecting new listener");

        {
            let mut listeners = self.listeners.lock().unwrap();
            listeners
                .entry(listener.queue.clone())
                .or_default()
                .push(ListenerHandle {
                    id: listener.id,
                    tx: listener.tx.clone(),
                });
        }

        match self.storage.get_all(&listener.queue, &listener.consumer) {
            Ok(msgs) => Ok(msgs),
            Err(err) => {
                self.remove_listener(listener);
                Err(err)
            }
        }
    }

    /// Updates the ack state on the listener's own consumer database.
    pub fn ack(&self, listener: &Listener, id: &str) -> Result<(), StorageError> {
        self.storage.ack(&listener.queue, &listener.consumer, id)
    }

    /// Drops the listener from its queue's fan-out list; the queue entry
    /// itself goes once the list is empty.
    pub fn remove_listener(&self, listener: &Listener) {
        let mut listeners = self.listeners.lock().unwrap();
        if let Some(list) = listeners.get_mut(&listener.queue) {
            list.retain(|h| h.id != listener.id);
            if list.is_empty() {
                listeners.remove(&listener.queue);
            }
        }
    }

    /// Live listener count for one queue.
    pub fn listener_count(&self, queue: &Queue) -> usize {
        self.listeners
            .lock()
            .unwrap()
            .get(queue)
            .map_or(0, Vec::len)
    }
}
