//! `filter_lo` sub-stream: a 5-mode competition over the low residual bytes
//! of the legacy route's row-filtered Dct pixels (spec.md §4.5), grounded on
//! `original_source/src/codec/lossless_filter_lo_decode.h`. The chosen mode
//! is framed as `[magic=0xA5][mode u8][raw_count u32 LE][payload]`; mode 0
//! is the unmodified byte stream, a fallback always available alongside the
//! four coded modes.
//!
//! Selection gates each coded candidate against two baselines: the raw byte
//! count and the plain TileLZ candidate (mode 2), both via
//! [`crate::config::RuntimeConfig::filter_lo_mode_gate`] — a candidate only
//! replaces a baseline when it beats it by more than the gate margin, which
//! avoids flip-flopping between near-identical encodings.

use crate::bytestream;
use crate::error::{CodecError, Result};
use crate::tilelz;

pub const FILTER_LO_MAGIC: u8 = 0xA5;

const MODE_RAW: u8 = 0;
const MODE_DELTA: u8 = 1;
const MODE_TILELZ: u8 = 2;
const MODE_ROW_PREDICTOR: u8 = 3;
const MODE_CONTEXT_SPLIT: u8 = 4;
const MODE_TILELZ_SHARED: u8 = 5;

pub fn encode(lo_bytes: &[u8], filter_ids: &[u8], row_lens: &[usize]) -> Vec<u8> {
    let mut out = Vec::with_capacity(6 + lo_bytes.len());
    out.push(FILTER_LO_MAGIC);

    if lo_bytes.is_empty() {
        out.push(MODE_RAW);
        out.extend_from_slice(&0u32.to_le_bytes());
        return out;
    }

    let gate = crate::config::config().filter_lo_mode_gate as f64;
    let raw_size = lo_bytes.len();

    let mode2_payload = tilelz::compress(lo_bytes);
    let lz_size = mode2_payload.len();

    let candidates: [(u8, Vec<u8>); 4] = [
        (MODE_DELTA, mode1_encode(lo_bytes)),
        (MODE_TILELZ, mode2_payload),
        (MODE_ROW_PREDICTOR, mode3_encode(lo_bytes, row_lens)),
        (MODE_CONTEXT_SPLIT, mode4_encode(lo_bytes, filter_ids, row_lens)),
    ];

    let mut best_mode = MODE_RAW;
    let mut best_payload: Vec<u8> = lo_bytes.to_vec();
    let mut best_size = raw_size;

    for (mode, payload) in candidates {
        let beats_raw = (payload.len() as f64) <= raw_size as f64 * gate;
        let beats_lz = mode == MODE_TILELZ || (payload.len() as f64) <= lz_size as f64 * gate;
        if beats_raw && beats_lz && payload.len() < best_size {
            best_size = payload.len();
            best_mode = mode;
            best_payload = payload;
        }
    }

    let tilelz_shared = mode5_encode(lo_bytes);
    let beats_raw = (tilelz_shared.len() as f64) <= raw_size as f64 * gate;
    let beats_lz = (tilelz_shared.len() as f64) <= lz_size as f64 * gate;
    if beats_raw && beats_lz && tilelz_shared.len() < best_size {
        best_mode = MODE_TILELZ_SHARED;
        best_payload = tilelz_shared;
    }

    out.push(best_mode);
    out.extend_from_slice(&(raw_size as u32).to_le_bytes());
    out.extend_from_slice(&best_payload);
    out
}

pub fn decode(data: &[u8], filter_ids: &[u8], row_lens: &[usize]) -> Result<Vec<u8>> {
    if data.len() < 6 || data[0] != FILTER_LO_MAGIC {
        return Err(CodecError::CorruptStream("filter_lo header truncated".into()));
    }
    let mode = data[1];
    let raw_count = u32::from_le_bytes([data[2], data[3], data[4], data[5]]) as usize;
    let payload = &data[6..];

    match mode {
        MODE_RAW => Ok(payload.to_vec()),
        MODE_DELTA => mode1_decode(payload),
        MODE_TILELZ => Ok(tilelz::decompress(payload, raw_count)),
        MODE_ROW_PREDICTOR => mode3_decode(payload, row_lens, raw_count),
        MODE_CONTEXT_SPLIT => mode4_decode(payload, filter_ids, row_lens, raw_count),
        MODE_TILELZ_SHARED => mode5_decode(payload, raw_count),
        m => Err(CodecError::UnknownChunk(format!("filter_lo mode {m}"))),
    }
}

fn mode1_encode(lo_bytes: &[u8]) -> Vec<u8> {
    let mut delta = vec![0u8; lo_bytes.len()];
    delta[0] = lo_bytes[0];
    for i in 1..lo_bytes.len() {
        delta[i] = lo_bytes[i].wrapping_sub(lo_bytes[i - 1]);
    }
    bytestream::encode_adaptive(&delta)
}

fn mode1_decode(payload: &[u8]) -> Result<Vec<u8>> {
    let delta = bytestream::decode_adaptive(payload)?;
    let mut out = vec![0u8; delta.len()];
    if !delta.is_empty() {
        out[0] = delta[0];
        for i in 1..delta.len() {
            out[i] = out[i - 1].wrapping_add(delta[i]);
        }
    }
    Ok(out)
}

fn mode5_encode(lo_bytes: &[u8]) -> Vec<u8> {
    let lz = tilelz::compress(lo_bytes);
    bytestream::encode_shared(&lz)
}

fn mode5_decode(payload: &[u8], raw_count: usize) -> Result<Vec<u8>> {
    let lz = bytestream::decode_shared(payload)?;
    Ok(tilelz::decompress(&lz, raw_count))
}

fn row_starts(row_lens: &[usize]) -> Vec<usize> {
    let mut starts = vec![0usize; row_lens.len()];
    let mut pos = 0;
    for (y, &len) in row_lens.iter().enumerate() {
        starts[y] = pos;
        pos += len;
    }
    starts
}

fn active_rows(row_lens: &[usize]) -> Vec<usize> {
    row_lens
        .iter()
        .enumerate()
        .filter(|&(_, &len)| len > 0)
        .map(|(y, _)| y)
        .collect()
}

fn row_pred_value(pred: u8, left: i32, up: i32) -> i32 {
    match pred {
        0 => 0,
        1 => left,
        2 => up,
        3 => (left + up) / 2,
        _ => 0,
    }
}

fn mode3_encode(lo_bytes: &[u8], row_lens: &[usize]) -> Vec<u8> {
    let starts = row_starts(row_lens);
    let active = active_rows(row_lens);

    let mut pred_ids = vec![0u8; active.len()];
    let mut residuals = vec![0u8; lo_bytes.len()];
    let mut prev_active: Option<usize> = None;

    for (ai, &y) in active.iter().enumerate() {
        let len = row_lens[y];
        let start = starts[y];
        let row = &lo_bytes[start..start + len];
        let prev_row: Option<&[u8]> = prev_active.map(|py| &lo_bytes[starts[py]..starts[py] + row_lens[py]]);

        let mut best_pred = 0u8;
        let mut best_sum = i64::MAX;
        let mut best_res = vec![0u8; len];
        for pred in 0..=3u8 {
            let mut res = vec![0u8; len];
            let mut sum = 0i64;
            for x in 0..len {
                let left = if x > 0 { row[x - 1] as i32 } else { 0 };
                let up = prev_row.and_then(|p| p.get(x)).map(|&v| v as i32).unwrap_or(0);
                let r = row[x].wrapping_sub(row_pred_value(pred, left, up) as u8);
                res[x] = r;
                sum += (r as i8).unsigned_abs() as i64;
            }
            if sum < best_sum {
                best_sum = sum;
                best_pred = pred;
                best_res = res;
            }
        }

        pred_ids[ai] = best_pred;
        residuals[start..start + len].copy_from_slice(&best_res);
        prev_active = Some(y);
    }

    let pred_stream = bytestream::encode_adaptive(&pred_ids);
    let resid_stream = bytestream::encode_adaptive(&residuals);
    let mut out = Vec::with_capacity(4 + pred_stream.len() + resid_stream.len());
    out.extend_from_slice(&(pred_stream.len() as u32).to_le_bytes());
    out.extend_from_slice(&pred_stream);
    out.extend_from_slice(&resid_stream);
    out
}

fn mode3_decode(payload: &[u8], row_lens: &[usize], raw_count: usize) -> Result<Vec<u8>> {
    if payload.len() < 4 {
        return Err(CodecError::CorruptStream("filter_lo mode 3 header truncated".into()));
    }
    let pred_sz = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
    if 4 + pred_sz > payload.len() {
        return Err(CodecError::CorruptStream("filter_lo mode 3 pred stream truncated".into()));
    }
    let pred_ids = bytestream::decode_adaptive(&payload[4..4 + pred_sz])?;
    let residuals = bytestream::decode_adaptive(&payload[4 + pred_sz..])?;
    if residuals.len() != raw_count {
        return Err(CodecError::CorruptStream("filter_lo mode 3 residual count mismatch".into()));
    }

    let starts = row_starts(row_lens);
    let active = active_rows(row_lens);
    let mut out = vec![0u8; raw_count];
    let mut prev_active: Option<usize> = None;

    for (ai, &y) in active.iter().enumerate() {
        let len = row_lens[y];
        let start = starts[y];
        let pred = *pred_ids.get(ai).unwrap_or(&0);
        for x in 0..len {
            let left = if x > 0 { out[start + x - 1] as i32 } else { 0 };
            let up = prev_active
                .filter(|&py| x < row_lens[py])
                .map(|py| out[starts[py] + x] as i32)
                .unwrap_or(0);
            out[start + x] = residuals[start + x].wrapping_add(row_pred_value(pred, left, up) as u8);
        }
        prev_active = Some(y);
    }

    Ok(out)
}

fn context_bucket(filter_ids: &[u8], y: usize) -> usize {
    (*filter_ids.get(y).unwrap_or(&0)).min(5) as usize
}

fn mode4_encode(lo_bytes: &[u8], filter_ids: &[u8], row_lens: &[usize]) -> Vec<u8> {
    let starts = row_starts(row_lens);
    let mut buckets: [Vec<u8>; 6] = Default::default();
    for (y, &len) in row_lens.iter().enumerate() {
        if len == 0 {
            continue;
        }
        let bucket = context_bucket(filter_ids, y);
        buckets[bucket].extend_from_slice(&lo_bytes[starts[y]..starts[y] + len]);
    }

    let payloads: Vec<Vec<u8>> = buckets
        .iter()
        .map(|b| if b.is_empty() { Vec::new() } else { bytestream::encode_adaptive(b) })
        .collect();

    let mut out = Vec::with_capacity(24 + payloads.iter().map(Vec::len).sum::<usize>());
    for p in &payloads {
        out.extend_from_slice(&(p.len() as u32).to_le_bytes());
    }
    for p in &payloads {
        out.extend_from_slice(p);
    }
    out
}

fn mode4_decode(payload: &[u8], filter_ids: &[u8], row_lens: &[usize], raw_count: usize) -> Result<Vec<u8>> {
    if payload.len() < 24 {
        return Err(CodecError::CorruptStream("filter_lo mode 4 header truncated".into()));
    }
    let mut sizes = [0usize; 6];
    for (i, s) in sizes.iter_mut().enumerate() {
        *s = u32::from_le_bytes(payload[i * 4..i * 4 + 4].try_into().unwrap()) as usize;
    }

    let mut pos = 24;
    let mut bucket_bytes: [Vec<u8>; 6] = Default::default();
    for i in 0..6 {
        if sizes[i] == 0 {
            continue;
        }
        if pos + sizes[i] > payload.len() {
            return Err(CodecError::CorruptStream("filter_lo mode 4 bucket truncated".into()));
        }
        bucket_bytes[i] = bytestream::decode_adaptive(&payload[pos..pos + sizes[i]])?;
        pos += sizes[i];
    }

    let starts = row_starts(row_lens);
    let mut bucket_pos = [0usize; 6];
    let mut out = vec![0u8; raw_count];
    for (y, &len) in row_lens.iter().enumerate() {
        if len == 0 {
            continue;
        }
        let bucket = context_bucket(filter_ids, y);
        let bp = bucket_pos[bucket];
        if bp + len > bucket_bytes[bucket].len() {
            return Err(CodecError::CorruptStream("filter_lo mode 4 bucket underrun".into()));
        }
        out[starts[y]..starts[y] + len].copy_from_slice(&bucket_bytes[bucket][bp..bp + len]);
        bucket_pos[bucket] += len;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_round_trips() {
        let enc = encode(&[], &[], &[]);
        let dec = decode(&enc, &[], &[]).unwrap();
        assert!(dec.is_empty());
    }

    #[test]
    fn single_row_round_trips() {
        let lo: Vec<u8> = (0..40u32).map(|i| (i % 7) as u8).collect();
        let filter_ids = vec![1u8];
        let row_lens = vec![40usize];
        let enc = encode(&lo, &filter_ids, &row_lens);
        let dec = decode(&enc, &filter_ids, &row_lens).unwrap();
        assert_eq!(dec, lo);
    }

    #[test]
    fn ragged_rows_with_gaps_round_trip() {
        let row_lens = vec![8usize, 0, 16, 8];
        let total: usize = row_lens.iter().sum();
        let lo: Vec<u8> = (0..total as u32).map(|i| ((i * 37) % 251) as u8).collect();
        let filter_ids = vec![0u8, 0, 3, 7];
        let enc = encode(&lo, &filter_ids, &row_lens);
        let dec = decode(&enc, &filter_ids, &row_lens).unwrap();
        assert_eq!(dec, lo);
    }

    #[test]
    fn repetitive_input_round_trips() {
        let row_lens = vec![64usize; 8];
        let total: usize = row_lens.iter().sum();
        let lo: Vec<u8> = (0..total).map(|i| (i % 3) as u8).collect();
        let filter_ids = vec![2u8; row_lens.len()];
        let enc = encode(&lo, &filter_ids, &row_lens);
        let dec = decode(&enc, &filter_ids, &row_lens).unwrap();
        assert_eq!(dec, lo);
    }

    #[test]
    fn varied_filter_ids_round_trip_via_context_split() {
        let row_lens = vec![32usize; 12];
        let total: usize = row_lens.iter().sum();
        let filter_ids: Vec<u8> = (0..12u8).map(|y| y % 8).collect();
        let mut state = 11u32;
        let lo: Vec<u8> = (0..total)
            .map(|_| {
                state = state.wrapping_mul(1103515245).wrapping_add(12345);
                (state >> 16) as u8
            })
            .collect();
        let enc = encode(&lo, &filter_ids, &row_lens);
        let dec = decode(&enc, &filter_ids, &row_lens).unwrap();
        assert_eq!(dec, lo);
    }
}
