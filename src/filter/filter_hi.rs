//! `filter_hi` sub-stream: the high residual byte of each filter_lo pixel
//! is almost always zero, so this picks between a dense adaptive-rANS
//! stream and a sparse bitmask-plus-nonzero-values encoding (spec.md §4.5),
//! grounded on `original_source/src/codec/filter_hi_wrapper.h`. The sparse
//! form is only attempted once the zero ratio clears 0.75 over at least 32
//! bytes; the decoder tells the two apart by peeking the leading byte
//! against [`FILTER_HI_MAGIC`] (the dense form's own header always starts
//! with a zero byte, since its 1024-entry CDF size is written little-endian).

use crate::bytestream;
use crate::error::{CodecError, Result};

pub const FILTER_HI_MAGIC: u8 = 0xAB;

const SPARSE_MIN_LEN: usize = 32;
const SPARSE_MIN_ZERO_RATIO: f64 = 0.75;

pub fn encode(hi_bytes: &[u8]) -> Vec<u8> {
    let dense = bytestream::encode_adaptive(hi_bytes);

    if hi_bytes.len() < SPARSE_MIN_LEN {
        return dense;
    }
    let zero_count = hi_bytes.iter().filter(|&&b| b == 0).count();
    let zero_ratio = zero_count as f64 / hi_bytes.len() as f64;
    if zero_ratio < SPARSE_MIN_ZERO_RATIO {
        return dense;
    }

    let nonzero: Vec<u8> = hi_bytes.iter().copied().filter(|&b| b != 0).collect();
    let nz_count = nonzero.len() as u32;
    let mask_len = hi_bytes.len().div_ceil(8);
    let mut mask = vec![0u8; mask_len];
    for (i, &b) in hi_bytes.iter().enumerate() {
        if b != 0 {
            mask[i / 8] |= 1 << (i % 8);
        }
    }
    let nz_payload = bytestream::encode_adaptive(&nonzero);

    let mut sparse = Vec::with_capacity(4 + mask.len() + nz_payload.len());
    sparse.push(FILTER_HI_MAGIC);
    sparse.push((nz_count & 0xFF) as u8);
    sparse.push(((nz_count >> 8) & 0xFF) as u8);
    sparse.push(((nz_count >> 16) & 0xFF) as u8);
    sparse.extend_from_slice(&mask);
    sparse.extend_from_slice(&nz_payload);

    if sparse.len() < dense.len() {
        sparse
    } else {
        dense
    }
}

pub fn decode(data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    if expected_len == 0 {
        return Ok(Vec::new());
    }
    if data.first() == Some(&FILTER_HI_MAGIC) {
        if data.len() < 4 {
            return Err(CodecError::CorruptStream("filter_hi sparse header truncated".into()));
        }
        let nz_count = (data[1] as u32) | ((data[2] as u32) << 8) | ((data[3] as u32) << 16);
        let mask_len = expected_len.div_ceil(8);
        if 4 + mask_len > data.len() {
            return Err(CodecError::CorruptStream("filter_hi mask truncated".into()));
        }
        let mask = &data[4..4 + mask_len];
        let nonzero = bytestream::decode_adaptive(&data[4 + mask_len..])?;
        if nonzero.len() != nz_count as usize {
            return Err(CodecError::CorruptStream("filter_hi nz_count mismatch".into()));
        }
        let mut out = vec![0u8; expected_len];
        let mut ni = 0;
        for (i, slot) in out.iter_mut().enumerate() {
            if (mask[i / 8] >> (i % 8)) & 1 == 1 {
                *slot = *nonzero.get(ni).unwrap_or(&0);
                ni += 1;
            }
        }
        Ok(out)
    } else {
        bytestream::decode_adaptive(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_round_trips() {
        let enc = encode(&[]);
        let dec = decode(&enc, 0).unwrap();
        assert!(dec.is_empty());
    }

    #[test]
    fn mostly_zero_stream_uses_sparse_form() {
        let mut hi = vec![0u8; 200];
        hi[5] = 7;
        hi[100] = 200;
        let enc = encode(&hi);
        assert_eq!(enc[0], FILTER_HI_MAGIC);
        let dec = decode(&enc, hi.len()).unwrap();
        assert_eq!(dec, hi);
    }

    #[test]
    fn dense_random_stream_round_trips() {
        let mut state = 9u32;
        let hi: Vec<u8> = (0..200)
            .map(|_| {
                state = state.wrapping_mul(1664525).wrapping_add(1013904223);
                (state >> 16) as u8
            })
            .collect();
        let enc = encode(&hi);
        assert_ne!(enc[0], FILTER_HI_MAGIC);
        let dec = decode(&enc, hi.len()).unwrap();
        assert_eq!(dec, hi);
    }

    #[test]
    fn short_stream_skips_sparse_form() {
        let hi = vec![0u8; 10];
        let enc = encode(&hi);
        let dec = decode(&enc, hi.len()).unwrap();
        assert_eq!(dec, hi);
    }
}
