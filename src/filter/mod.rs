//! Row prediction filters (spec.md §4.5).

pub mod filter_hi;
pub mod filter_lo;
pub mod gated;
pub mod rows;
