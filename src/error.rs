//! Error types.
//!
//! Every fallible operation reports failure through its return value;
//! nothing in this crate panics on a bad source or a failed decode.
//! The texture fallback chain absorbs per-strategy failures internally
//! and only surfaces [`TextureUnavailable`](LazyImageError::TextureUnavailable)
//! when every strategy has been exhausted.

use thiserror::Error;

/// A decoder-side failure.
///
/// Deliberately opaque: decoders are consumed as trait objects, so
/// format-specific detail is carried as a message rather than a type.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("decode failed: {reason}")]
pub struct DecodeError {
    /// Human-readable cause reported by the decoder.
    pub reason: String,
}

impl DecodeError {
    /// Create a decode error with the given cause.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// The decoder does not implement the requested operation.
    pub fn unsupported(op: &str) -> Self {
        Self::new(format!("operation not supported by this decoder: {op}"))
    }
}

/// Failures surfaced by lazy-image operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LazyImageError {
    /// The decoder reported an empty or degenerate format descriptor;
    /// no image handle can be built over it.
    #[error("source descriptor is empty or degenerate")]
    InvalidSource,

    /// Pixel or plane production failed inside the decoder.
    #[error(transparent)]
    DecodeFailed(#[from] DecodeError),

    /// The raster cache could not reserve a buffer, or a private
    /// allocation was refused.
    #[error("raster buffer allocation failed")]
    AllocationFailed,

    /// The decoder could not report a planar layout.
    #[error("planar layout query failed")]
    PlaneQueryFailed,

    /// All four texture acquisition strategies failed.
    #[error("no texture acquisition strategy succeeded")]
    TextureUnavailable,
}
