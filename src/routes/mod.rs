//! Per-plane lossless routes competing for the smallest encoding
//! (spec.md §4): natural-row prediction and screen-indexed palettes. The
//! legacy tiled route lives in [`crate::legacy`].

pub mod natural;
pub mod screen;
