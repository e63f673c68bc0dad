use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure while handling a single event.
///
/// Every variant is recovered by the dispatch loop: the event is logged and
/// dropped, and the loop moves on.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no handler at {path:?}: {source}")]
    HandlerNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid handler name '{0}'")]
    InvalidHandlerName(String),
    #[error("payload is not a JSON object: {0}")]
    PayloadParse(String),
    #[error("payload field '{key}' is {found}, expected a string, number, boolean or null")]
    PayloadShape { key: String, found: &'static str },
    #[error("cannot acquire database connection: {0}")]
    ConnectionAcquire(String),
    #[error("statement failed: {0}")]
    Execution(#[from] shout_db::rusqlite::Error),
    #[error("cannot encode rows as JSON: {0}")]
    Encoding(String),
    #[error("cannot deliver response: {0}")]
    Response(String),
}

impl DispatchError {
    /// Short stable tag used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::HandlerNotFound { .. } | DispatchError::InvalidHandlerName(_) => {
                "handler_not_found"
            }
            DispatchError::PayloadParse(_) => "payload_parse",
            DispatchError::PayloadShape { .. } => "payload_shape",
            DispatchError::ConnectionAcquire(_) => "connection_acquire",
            DispatchError::Execution(_) => "execution",
            DispatchError::Encoding(_) => "encoding",
            DispatchError::Response(_) => "response",
        }
    }
}

/// Startup and lifecycle failures. These are fatal for the process.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("database error: {0}")]
    Database(#[from] shout_db::DbError),
    #[error("migration error: {0}")]
    Migrate(#[from] shout_db::MigrateError),
    #[error("failed to bind control listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("membership error: {0}")]
    Membership(String),
}
