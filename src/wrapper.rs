//! Generic side-stream envelope: wraps a byte stream in whichever of
//! {raw, adaptive rANS, shared-CDF rANS, TileLZ} is smallest (spec.md §4.4,
//! §4.6), grounded on the repeated wrapper-selection pattern in
//! `original_source/src/codec/lossless_tile4_codec.h` and
//! `lossless_filter_lo_codec.h` (`mode=0` raw / `1` rANS / `2` LZ). Used for
//! filter-id streams, block-type runs, and legacy side-channel streams
//! (copy offsets, palettes, Tile4 indices) alike, rather than hand-rolling
//! the same competition once per stream type.

use crate::bytestream;
use crate::tilelz;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

const MODE_RAW: u8 = 0;
const MODE_RANS_ADAPTIVE: u8 = 1;
const MODE_RANS_SHARED: u8 = 2;
const MODE_LZ: u8 = 3;

/// `[mode u8][raw_count u32 LE][payload]`
pub fn wrap(raw: &[u8]) -> Vec<u8> {
    if raw.is_empty() {
        let mut out = Vec::with_capacity(5);
        out.push(MODE_RAW);
        out.write_u32::<LittleEndian>(0).unwrap();
        return out;
    }

    let mut best_mode = MODE_RAW;
    let mut best_payload: Vec<u8> = raw.to_vec();

    let adaptive = bytestream::encode_adaptive(raw);
    if adaptive.len() < best_payload.len() {
        best_mode = MODE_RANS_ADAPTIVE;
        best_payload = adaptive;
    }

    let shared = bytestream::encode_shared(raw);
    if shared.len() < best_payload.len() {
        best_mode = MODE_RANS_SHARED;
        best_payload = shared;
    }

    let lz = tilelz::compress(raw);
    if lz.len() < best_payload.len() {
        best_mode = MODE_LZ;
        best_payload = lz;
    }

    let mut out = Vec::with_capacity(5 + best_payload.len());
    out.push(best_mode);
    out.write_u32::<LittleEndian>(raw.len() as u32).unwrap();
    out.extend_from_slice(&best_payload);
    out
}

pub fn unwrap(data: &[u8]) -> crate::error::Result<Vec<u8>> {
    let mut cur = Cursor::new(data);
    let mode = cur
        .read_u8()
        .map_err(|_| crate::error::CodecError::CorruptStream("wrapper header truncated".into()))?;
    let raw_count = cur
        .read_u32::<LittleEndian>()
        .map_err(|_| crate::error::CodecError::CorruptStream("wrapper raw_count truncated".into()))?
        as usize;
    let payload = &data[cur.position() as usize..];

    if raw_count == 0 {
        return Ok(Vec::new());
    }

    match mode {
        MODE_RAW => Ok(payload.to_vec()),
        MODE_RANS_ADAPTIVE => bytestream::decode_adaptive(payload),
        MODE_RANS_SHARED => bytestream::decode_shared(payload),
        MODE_LZ => Ok(tilelz::decompress(payload, raw_count)),
        m => Err(crate::error::CodecError::UnknownChunk(format!("wrapper mode {m}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_round_trips() {
        let wrapped = wrap(&[]);
        assert_eq!(unwrap(&wrapped).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn raw_beats_wrapping_for_tiny_random_input() {
        let data = vec![3u8, 250, 17, 200, 1];
        let wrapped = wrap(&data);
        assert_eq!(unwrap(&wrapped).unwrap(), data);
    }

    #[test]
    fn repetitive_input_round_trips_and_compresses() {
        let data: Vec<u8> = (0..2000u32).map(|i| (i % 4) as u8).collect();
        let wrapped = wrap(&data);
        assert_eq!(unwrap(&wrapped).unwrap(), data);
        assert!(wrapped.len() < data.len());
    }

    #[test]
    fn random_input_still_round_trips() {
        let mut state = 77u32;
        let data: Vec<u8> = (0..1500)
            .map(|_| {
                state = state.wrapping_mul(1664525).wrapping_add(1013904223);
                (state >> 16) as u8
            })
            .collect();
        let wrapped = wrap(&data);
        assert_eq!(unwrap(&wrapped).unwrap(), data);
    }
}
