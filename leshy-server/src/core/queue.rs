use std::fmt;

use crate::core::error::StorageError;

fn is_path_segment(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// A named stream of messages. The name doubles as the storage directory
/// name, so it must be a valid filesystem path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Queue(String);

impl Queue {
    pub fn new(name: impl Into<String>) -> Result<Self, StorageError> {
        let name = name.into();
        if !is_path_segment(&name) {
            return Err(StorageError::InvalidQueueName(name));
        }
        Ok(Queue(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named cursor over a queue. The empty name aliases the queue's primary
/// cursor; `resolve` turns it into the concrete file stem.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Consumer(String);

impl Consumer {
    pub fn new(name: impl Into<String>) -> Result<Self, StorageError> {
        let name = name.into();
        if !name.is_empty() && !is_path_segment(&name) {
            return Err(StorageError::InvalidConsumerName(name));
        }
        Ok(Consumer(name))
    }

    /// The primary cursor of a queue, named after the queue itself.
    pub fn primary(queue: &Queue) -> Self {
        Consumer(queue.as_str().to_string())
    }

    /// Defaults an empty consumer to the queue's primary cursor.
    pub fn resolve(&self, queue: &Queue) -> Consumer {
        if self.0.is_empty() {
            Consumer::primary(queue)
        } else {
            self.clone()
        }
    }

    pub fn is_primary(&self, queue: &Queue) -> bool {
        self.0.is_empty() || self.0 == queue.as_str()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
