//! Client error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("no answer for endpoint {eid} within {timeout_ms} ms")]
    Timeout { eid: u8, timeout_ms: u64 },

    #[error("device event stream closed")]
    EventsClosed,

    #[error("protocol error: {0}")]
    Protocol(#[from] hexabus_core::Error),

    #[error("transport error: {0}")]
    Transport(#[from] hexabus_transport::TransportError),
}
