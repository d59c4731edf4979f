//! Natural-row route (spec.md §4.8): four competing sub-modes for
//! photographic/gradient-heavy planes, grounded on
//! `original_source/src/codec/lossless_natural_route.h`.
//!
//! - mode 0: per-row choice among {Sub, Up, Average}, residuals wrapped.
//! - mode 1: per-row choice among the full 7-predictor set (adds Paeth, Med,
//!   WeightedA, WeightedB), residuals wrapped.
//! - mode 2: same predictor set as mode 1, but the residual stream is always
//!   routed through TileLZ before entropy coding rather than left to the
//!   wrapper's own competition — a win when residuals are locally repetitive
//!   (e.g. flat skies) in a way byte-histogram rANS alone under-exploits.
//! - mode 3: same predictor set as mode 1, but residuals are split into two
//!   causal contexts (flat / high-gradient) by a threshold on neighboring
//!   gradients, each compressed and wrapped independently.

use crate::bytestream;
use crate::filter::rows::{med_predictor, paeth_predictor};
use crate::tilelz;
use crate::wrapper;
use crate::zigzag;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

const MODE0_PREDICTORS: u8 = 3;
const MODE_FULL_PREDICTORS: u8 = 7;

fn predict(pid: u8, a: i32, b: i32, c: i32) -> i32 {
    match pid {
        0 => a,
        1 => b,
        2 => (a + b).div_euclid(2),
        3 => paeth_predictor(a, b, c),
        4 => med_predictor(a, b, c),
        5 => (a * 3 + b).div_euclid(4),
        6 => (a + b * 3).div_euclid(4),
        _ => 0,
    }
}

fn neighbors(recon: &[i32], width: usize, x: usize, y: usize) -> (i32, i32, i32) {
    let a = if x > 0 { recon[y * width + x - 1] } else { 0 };
    let b = if y > 0 { recon[(y - 1) * width + x] } else { 0 };
    let c = if x > 0 && y > 0 { recon[(y - 1) * width + x - 1] } else { 0 };
    (a, b, c)
}

struct Prepared {
    pred_ids: Vec<u8>,
    residual_bytes: Vec<u8>,
}

/// Choose, per row, the predictor among the first `num_predictors` that
/// minimizes sum-of-abs-residual, accumulating zigzag-coded residual bytes.
fn prepare(padded: &[i32], width: usize, height: usize, num_predictors: u8) -> Prepared {
    let mut pred_ids = vec![0u8; height];
    let mut residual_bytes = Vec::with_capacity(width * height * 2);

    for y in 0..height {
        let mut best_pid = 0u8;
        let mut best_cost = i64::MAX;
        for pid in 0..num_predictors {
            let mut cost = 0i64;
            for x in 0..width {
                let (a, b, c) = neighbors(padded, width, x, y);
                let pred = predict(pid, a, b, c);
                cost += (padded[y * width + x] - pred).unsigned_abs() as i64;
            }
            if cost < best_cost {
                best_cost = cost;
                best_pid = pid;
            }
        }
        pred_ids[y] = best_pid;
        for x in 0..width {
            let (a, b, c) = neighbors(padded, width, x, y);
            let pred = predict(best_pid, a, b, c);
            let resid = (padded[y * width + x] - pred) as i16;
            let zz = zigzag::encode(resid);
            residual_bytes.push((zz & 0xFF) as u8);
            residual_bytes.push((zz >> 8) as u8);
        }
    }

    Prepared { pred_ids, residual_bytes }
}

fn reconstruct<F>(pred_ids: &[u8], width: usize, height: usize, mut next_residual: F) -> Vec<i32>
where
    F: FnMut(i32, i32, i32) -> i16,
{
    let mut out = vec![0i32; width * height];
    for y in 0..height {
        let pid = pred_ids[y];
        for x in 0..width {
            let (a, b, c) = neighbors(&out, width, x, y);
            let pred = predict(pid, a, b, c);
            let resid = next_residual(a, b, c);
            out[y * width + x] = pred + resid as i32;
        }
    }
    out
}

fn write_u32_vec(out: &mut Vec<u8>, v: u32) {
    out.write_u32::<LittleEndian>(v).unwrap();
}

fn encode_mode0_or_1(padded: &[i32], width: usize, height: usize, mode: u8) -> Vec<u8> {
    let num_pred = if mode == 0 { MODE0_PREDICTORS } else { MODE_FULL_PREDICTORS };
    let prepared = prepare(padded, width, height, num_pred);
    let wrapped_pred = wrapper::wrap(&prepared.pred_ids);
    let wrapped_resid = wrapper::wrap(&prepared.residual_bytes);

    let mut out = Vec::with_capacity(9 + wrapped_pred.len() + wrapped_resid.len());
    out.push(mode);
    write_u32_vec(&mut out, wrapped_pred.len() as u32);
    write_u32_vec(&mut out, wrapped_resid.len() as u32);
    out.extend_from_slice(&wrapped_pred);
    out.extend_from_slice(&wrapped_resid);
    out
}

fn decode_mode0_or_1(data: &[u8], width: usize, height: usize) -> crate::error::Result<Vec<i32>> {
    let mut cur = Cursor::new(&data[1..]);
    let pred_len = cur.read_u32::<LittleEndian>().map_err(trunc)? as usize;
    let resid_len = cur.read_u32::<LittleEndian>().map_err(trunc)? as usize;
    let body = &data[1 + 8..];
    if pred_len + resid_len > body.len() {
        return Err(crate::error::CodecError::CorruptStream("natural mode0/1 body truncated".into()));
    }
    let pred_ids = wrapper::unwrap(&body[..pred_len])?;
    let residual_bytes = wrapper::unwrap(&body[pred_len..pred_len + resid_len])?;
    if pred_ids.len() != height {
        return Err(crate::error::CodecError::CorruptStream("natural pred_ids length mismatch".into()));
    }
    let mut pos = 0usize;
    let out = reconstruct(&pred_ids, width, height, |_, _, _| {
        let zz = u16::from_le_bytes([residual_bytes[pos], residual_bytes[pos + 1]]);
        pos += 2;
        zigzag::decode(zz)
    });
    Ok(out)
}

fn trunc<E>(_: E) -> crate::error::CodecError {
    crate::error::CodecError::CorruptStream("natural-route header truncated".into())
}

fn encode_mode2(padded: &[i32], width: usize, height: usize) -> Vec<u8> {
    let prepared = prepare(padded, width, height, MODE_FULL_PREDICTORS);
    let wrapped_pred = wrapper::wrap(&prepared.pred_ids);
    let lz = tilelz::compress(&prepared.residual_bytes);
    let rans = bytestream::encode_shared(&lz);

    let mut out = Vec::with_capacity(13 + wrapped_pred.len() + rans.len());
    out.push(2);
    write_u32_vec(&mut out, wrapped_pred.len() as u32);
    write_u32_vec(&mut out, prepared.residual_bytes.len() as u32);
    write_u32_vec(&mut out, rans.len() as u32);
    out.extend_from_slice(&wrapped_pred);
    out.extend_from_slice(&rans);
    out
}

fn decode_mode2(data: &[u8], width: usize, height: usize) -> crate::error::Result<Vec<i32>> {
    let mut cur = Cursor::new(&data[1..]);
    let pred_len = cur.read_u32::<LittleEndian>().map_err(trunc)? as usize;
    let resid_raw_count = cur.read_u32::<LittleEndian>().map_err(trunc)? as usize;
    let rans_len = cur.read_u32::<LittleEndian>().map_err(trunc)? as usize;
    let body = &data[1 + 12..];
    if pred_len + rans_len > body.len() {
        return Err(crate::error::CodecError::CorruptStream("natural mode2 body truncated".into()));
    }
    let pred_ids = wrapper::unwrap(&body[..pred_len])?;
    let lz = bytestream::decode_shared(&body[pred_len..pred_len + rans_len])?;
    let residual_bytes = tilelz::decompress(&lz, resid_raw_count);
    if pred_ids.len() != height {
        return Err(crate::error::CodecError::CorruptStream("natural pred_ids length mismatch".into()));
    }
    let mut pos = 0usize;
    let out = reconstruct(&pred_ids, width, height, |_, _, _| {
        let zz = u16::from_le_bytes([residual_bytes[pos], residual_bytes[pos + 1]]);
        pos += 2;
        zigzag::decode(zz)
    });
    Ok(out)
}

const GRADIENT_THRESHOLD: i32 = 16;

fn encode_mode3(padded: &[i32], width: usize, height: usize) -> Vec<u8> {
    let prepared_ids = prepare(padded, width, height, MODE_FULL_PREDICTORS).pred_ids;
    let mut flat_bytes = Vec::new();
    let mut edge_bytes = Vec::new();
    let mut recon = vec![0i32; width * height];

    for y in 0..height {
        let pid = prepared_ids[y];
        for x in 0..width {
            let (a, b, c) = neighbors(&recon, width, x, y);
            let pred = predict(pid, a, b, c);
            let orig = padded[y * width + x];
            let resid = (orig - pred) as i16;
            recon[y * width + x] = orig;
            let zz = zigzag::encode(resid);
            let grad = (a - c).abs().max((b - c).abs());
            let dst = if grad < GRADIENT_THRESHOLD { &mut flat_bytes } else { &mut edge_bytes };
            dst.push((zz & 0xFF) as u8);
            dst.push((zz >> 8) as u8);
        }
    }

    let wrapped_pred = wrapper::wrap(&prepared_ids);
    let wrapped_flat = wrapper::wrap(&flat_bytes);
    let wrapped_edge = wrapper::wrap(&edge_bytes);

    let mut out = Vec::with_capacity(13 + wrapped_pred.len() + wrapped_flat.len() + wrapped_edge.len());
    out.push(3);
    write_u32_vec(&mut out, wrapped_pred.len() as u32);
    write_u32_vec(&mut out, wrapped_flat.len() as u32);
    write_u32_vec(&mut out, wrapped_edge.len() as u32);
    out.extend_from_slice(&wrapped_pred);
    out.extend_from_slice(&wrapped_flat);
    out.extend_from_slice(&wrapped_edge);
    out
}

fn decode_mode3(data: &[u8], width: usize, height: usize) -> crate::error::Result<Vec<i32>> {
    let mut cur = Cursor::new(&data[1..]);
    let pred_len = cur.read_u32::<LittleEndian>().map_err(trunc)? as usize;
    let flat_len = cur.read_u32::<LittleEndian>().map_err(trunc)? as usize;
    let edge_len = cur.read_u32::<LittleEndian>().map_err(trunc)? as usize;
    let body = &data[1 + 12..];
    if pred_len + flat_len + edge_len > body.len() {
        return Err(crate::error::CodecError::CorruptStream("natural mode3 body truncated".into()));
    }
    let pred_ids = wrapper::unwrap(&body[..pred_len])?;
    let flat_bytes = wrapper::unwrap(&body[pred_len..pred_len + flat_len])?;
    let edge_bytes = wrapper::unwrap(&body[pred_len + flat_len..pred_len + flat_len + edge_len])?;
    if pred_ids.len() != height {
        return Err(crate::error::CodecError::CorruptStream("natural pred_ids length mismatch".into()));
    }

    let mut out = vec![0i32; width * height];
    let mut flat_pos = 0usize;
    let mut edge_pos = 0usize;
    for y in 0..height {
        let pid = pred_ids[y];
        for x in 0..width {
            let (a, b, c) = neighbors(&out, width, x, y);
            let pred = predict(pid, a, b, c);
            let grad = (a - c).abs().max((b - c).abs());
            let (buf, pos) = if grad < GRADIENT_THRESHOLD {
                (&flat_bytes, &mut flat_pos)
            } else {
                (&edge_bytes, &mut edge_pos)
            };
            let zz = u16::from_le_bytes([buf[*pos], buf[*pos + 1]]);
            *pos += 2;
            out[y * width + x] = pred + zigzag::decode(zz) as i32;
        }
    }
    Ok(out)
}

/// Container-level dispatch byte (spec.md §4.9/§6: `0xAD` tags a natural-row
/// tile payload ahead of its own mode byte).
pub const MAGIC: u8 = 0xAD;

/// Try all 4 sub-modes and keep the smallest encoding, prefixed with the
/// container dispatch byte.
pub fn encode(padded: &[i32], width: usize, height: usize) -> Vec<u8> {
    let candidates = [
        encode_mode0_or_1(padded, width, height, 0),
        encode_mode0_or_1(padded, width, height, 1),
        encode_mode2(padded, width, height),
        encode_mode3(padded, width, height),
    ];
    let best = candidates.into_iter().min_by_key(|c| c.len()).unwrap();
    let mut out = Vec::with_capacity(1 + best.len());
    out.push(MAGIC);
    out.extend_from_slice(&best);
    out
}

pub fn decode(data: &[u8], width: usize, height: usize) -> crate::error::Result<Vec<i32>> {
    if data.len() < 2 || data[0] != MAGIC {
        return Err(crate::error::CodecError::CorruptStream("natural-route magic mismatch".into()));
    }
    let body = &data[1..];
    match body[0] {
        0 | 1 => decode_mode0_or_1(body, width, height),
        2 => decode_mode2(body, width, height),
        3 => decode_mode3(body, width, height),
        m => Err(crate::error::CodecError::UnknownChunk(format!("natural-route mode {m}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: usize, height: usize) -> Vec<i32> {
        (0..width * height).map(|i| ((i % width) * 2 + i / width) as i32 - 128).collect()
    }

    #[test]
    fn each_mode_round_trips() {
        let width = 16;
        let height = 16;
        let data = gradient(width, height);
        for mode in 0..4u8 {
            let encoded = match mode {
                0 | 1 => encode_mode0_or_1(&data, width, height, mode),
                2 => encode_mode2(&data, width, height),
                _ => encode_mode3(&data, width, height),
            };
            let decoded = decode(&encoded, width, height).unwrap();
            assert_eq!(decoded, data, "mode {mode} round trip");
        }
    }

    #[test]
    fn auto_selection_round_trips() {
        let width = 24;
        let height = 20;
        let data: Vec<i32> = (0..width * height)
            .map(|i| if (i / width) % 3 == 0 { 5 } else { ((i * 7) % 251) as i32 - 120 })
            .collect();
        let encoded = encode(&data, width, height);
        let decoded = decode(&encoded, width, height).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn flat_plane_round_trips() {
        let width = 8;
        let height = 8;
        let data = vec![3i32; width * height];
        let encoded = encode(&data, width, height);
        let decoded = decode(&encoded, width, height).unwrap();
        assert_eq!(decoded, data);
    }
}
