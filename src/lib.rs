//! HKN still-image codec core: container format, entropy coding, and the
//! three-way lossless tile route competition (legacy block-mode, screen-
//! indexed palette, natural-row prediction) plus the peripheral lossy-path
//! color/DCT/quantization interfaces.

pub mod bytestream;
pub mod color;
pub mod config;
pub mod container;
pub mod dct;
pub mod entropy;
pub mod error;
pub mod filter;
pub mod legacy;
pub mod plane;
pub mod ppm;
pub mod quant;
pub mod routes;
pub mod stats;
pub mod threadpool;
pub mod tilelz;
pub mod wrapper;
pub mod zigzag;
