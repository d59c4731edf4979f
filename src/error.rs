//! Typed error kinds for the HKN core (spec.md §7).
//!
//! Library code never panics on malformed input; every fallible entry point
//! returns [`Result<T>`]. The CLI binary converts these into `anyhow::Error`
//! at the boundary via `?`, the same way the teacher's `main.rs` wraps
//! `anyhow::Context` around library calls.

use std::fmt;

/// Sum type for everything that can go wrong reading or writing an HKN file.
#[derive(Debug, Clone)]
pub enum CodecError {
    /// Magic mismatch, bad version, zero dimension, or other header-level defect.
    InvalidHeader(String),
    /// A chunk's declared size runs past the end of the file.
    TruncatedChunk {
        chunk: String,
        declared: u64,
        available: u64,
    },
    /// A chunk required for this file's configuration (QMAT, TIL0, TIL1/TIL2) is absent.
    UnknownChunk(String),
    /// rANS/TileLZ underflow, an unexpected tag byte, or a size mismatch against `raw_count`.
    CorruptStream(String),
    /// An assertion on padding or alphabet size failed; should be unreachable.
    InternalInvariant(String),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::InvalidHeader(msg) => write!(f, "invalid header: {msg}"),
            CodecError::TruncatedChunk {
                chunk,
                declared,
                available,
            } => write!(
                f,
                "truncated chunk {chunk}: declared {declared} bytes, only {available} available"
            ),
            CodecError::UnknownChunk(tag) => write!(f, "missing required chunk: {tag}"),
            CodecError::CorruptStream(msg) => write!(f, "corrupt stream: {msg}"),
            CodecError::InternalInvariant(msg) => write!(f, "internal invariant violated: {msg}"),
        }
    }
}

impl std::error::Error for CodecError {}

pub type Result<T> = std::result::Result<T, CodecError>;
