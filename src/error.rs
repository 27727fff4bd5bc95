use std::io;

/// The closed error taxonomy surfaced by this crate.
///
/// Transport and protocol errors invalidate the connection that raised
/// them; the pool discards it. Per-query `FAILURE` only moves the
/// connection to `Failed` — the session resets it before release rather
/// than discarding it outright.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed PackStream value: {0}")]
    MalformedPackStream(String),

    #[error("truncated chunk: expected {expected} more bytes, stream ended")]
    TruncatedChunk { expected: usize },

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("invalid transition: {request} is not permitted in state {state}")]
    InvalidTransition { request: &'static str, state: &'static str },

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("TLS failure: {0}")]
    TlsFailure(String),

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailure(String),

    #[error("not authorized: {0}")]
    AuthorizationFailure(String),

    #[error("database error [{code}]: {message}")]
    DatabaseError {
        code: String,
        message: String,
        classification: Classification,
    },

    #[error("result already consumed")]
    ResultConsumed,

    #[error("session is closed")]
    SessionClosed,

    #[error("transaction is closed")]
    TransactionClosed,

    #[error("field not found: {0}")]
    FieldNotFound(String),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: &'static str, found: &'static str },

    #[error("unexpected null for field {0}")]
    UnexpectedNull(String),

    #[error("conversion failed: {0}")]
    ConversionFailure(String),

    #[error("invalid URI: {0}")]
    InvalidUri(String),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("pool exhausted: no connection available within {0:?}")]
    PoolExhausted(std::time::Duration),

    #[error("pool is closed")]
    PoolClosed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// How a server-supplied `DatabaseError` should be handled by managed
/// transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Syntax or argument errors. Never retried.
    Client,
    /// Deadlocks, leader switches, and similar — retried by
    /// `execute_read`/`execute_write` up to the configured budget.
    Transient,
    /// Anything else the server reports. Surfaced, not retried.
    Database,
}

impl Classification {
    /// Neo4j status codes follow `Neo.{Classification}.{Category}.{Title}`;
    /// classify on the second segment.
    pub fn from_code(code: &str) -> Classification {
        let mut parts = code.split('.');
        let _ = parts.next();
        match parts.next() {
            Some("ClientError") => Classification::Client,
            Some("TransientError") => Classification::Transient,
            _ => Classification::Database,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
