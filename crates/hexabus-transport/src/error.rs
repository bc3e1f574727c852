//! Transport error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("invalid channel configuration: {0}")]
    Config(String),

    #[error("channel already open")]
    AlreadyOpen,

    #[error("channel not open")]
    NotOpen,

    #[error("no tokio runtime available to drive the channel")]
    NoRuntime,

    #[error("channel task failed: {0}")]
    Task(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] hexabus_core::Error),
}
