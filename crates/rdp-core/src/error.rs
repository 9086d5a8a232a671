//! Error types for the transfer core.
//!
//! Partitioned along the four kinds the design distinguishes: configuration
//! errors are surfaced to the caller immediately; transient transport errors
//! never become an `Err` at this boundary (they are retried under the state
//! machine's own rules and only ever show up as log events); protocol
//! violations abort the current transfer; fatal resource errors terminate
//! the server loop.

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum TransferError {
    #[error("source file not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("socket error: {0}")]
    Socket(#[source] std::io::Error),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("fatal resource error: {0}")]
    Fatal(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransferError>;
