//! Entropy core: 12-bit rANS, flat 8-way interleaved variant, and the
//! P-Index checkpoint scheme for parallel decode (spec.md §4.2).

pub mod parallel_decode;
pub mod pindex;
pub mod rans;
pub mod tables;

pub use pindex::PIndex;
pub use tables::CdfTable;
