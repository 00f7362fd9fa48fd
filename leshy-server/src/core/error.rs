use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid queue name {0:?}")]
    InvalidQueueName(String),

    #[error("invalid consumer name {0:?}")]
    InvalidConsumerName(String),

    #[error("making queue directory: {0}")]
    MakeDir(#[source] io::Error),

    #[error("reading queue directory: {0}")]
    ReadDir(#[source] io::Error),

    #[error("opening database: {0}")]
    Open(#[source] rusqlite::Error),

    #[error("migrating database: {0}")]
    Migrate(#[source] rusqlite::Error),

    #[error("inserting message: {0}")]
    Insert(#[source] rusqlite::Error),

    #[error("querying messages: {0}")]
    Query(#[source] rusqlite::Error),

    #[error("updating message: {0}")]
    Ack(#[source] rusqlite::Error),

    #[error("copying primary into consumer: {0}")]
    Copy(#[source] rusqlite::Error),
}
