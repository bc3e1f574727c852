//! Error types for Hexabus core

use thiserror::Error;

/// Result type alias for Hexabus core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Hexabus core error types
///
/// Decoding never produces these: a frame that cannot be parsed is dropped,
/// not reported. They cover encoding and registry construction only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Text value contains characters outside 7-bit ASCII
    #[error("text is not representable as ASCII: {0:?}")]
    NonAsciiText(String),

    /// Text value does not fit the fixed text field
    #[error("text too long: {len} bytes (max {max})")]
    TextTooLong { len: usize, max: usize },

    /// Type registry built from an empty kind list
    #[error("type registry needs at least one kind")]
    EmptyRegistry,

    /// Two kinds share a wire code
    #[error("duplicate wire code 0x{0:02x} in type registry")]
    DuplicateCode(u8),
}
