//! Error types for fold validation and code generation.

use thiserror::Error;

/// A [`crate::FoldSpec`] that breaks `0 < chunk_width < history_len < 128`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("invalid fold: bits={chunk_width}, len={history_len}, bank={table_id}")]
pub struct FoldError {
    pub chunk_width: usize,
    pub history_len: usize,
    pub table_id: usize,
}

/// Failures while producing native fold functions.
///
/// None of these are retryable: a [`crate::FoldJit`] that hit one should be
/// dropped, and the caller falls back to the interpreted path.
#[derive(Debug, Error)]
pub enum JitError {
    /// Emitting another function would exceed the buffer capacity.
    #[error("code buffer exhausted: {needed} bytes needed, {capacity} bytes available")]
    BufferExhausted { needed: usize, capacity: usize },

    /// The assembler could not allocate or map its buffer.
    #[error("failed to allocate code buffer: {0}")]
    Alloc(#[from] std::io::Error),

    /// Committing or finalizing the assembled code failed.
    #[error("failed to finalize code buffer: {0}")]
    Finalize(String),

    /// Native code generation is not implemented for this target.
    #[error("native fold generation is not supported on {0}")]
    Unsupported(&'static str),
}
