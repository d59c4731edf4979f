//! Screen-indexed palette route: whole-plane palette extraction with a
//! preflight gate, bit-packed indices, and a raw/rANS/TileLZ wrapper
//! competition (spec.md §4.7), grounded on
//! `original_source/src/codec/lossless_screen_route.h` and
//! `lossless_screen_helpers.h`.

use crate::bytestream;
use crate::tilelz;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::HashMap;
use std::io::Cursor;

pub const MAGIC: u8 = 0xAC;
const MODE_RAW: u8 = 0;
const MODE_RANS: u8 = 1;
const MODE_LZ: u8 = 2;

const MAX_PALETTE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildFailReason {
    TooManyUnique,
    EmptyHist,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PreflightMetrics {
    pub unique_sample: u16,
    pub avg_run_x100: u16,
    pub mean_abs_diff_x100: u16,
    pub likely_screen: bool,
}

/// Sparse sampling over the plane (up to a 64x64 grid plus 32 sampled rows)
/// used to decide, cheaply, whether the full screen-indexed build is worth
/// attempting.
pub fn analyze_preflight(plane: &[i32], width: usize, height: usize) -> PreflightMetrics {
    let mut m = PreflightMetrics::default();
    if plane.is_empty() || width == 0 || height == 0 {
        return m;
    }

    let sx = (width / 64).max(1);
    let sy = (height / 64).max(1);
    let mut uniq = std::collections::HashSet::new();
    'outer: for y in (0..height).step_by(sy) {
        let row = &plane[y * width..y * width + width];
        for x in (0..width).step_by(sx) {
            uniq.insert(row[x]);
            if uniq.len() > 192 {
                break 'outer;
            }
        }
    }
    m.unique_sample = uniq.len().min(65535) as u16;

    let sampled_rows = height.min(32);
    let row_step = (height / sampled_rows.max(1)).max(1);
    let mut total_pixels: u64 = 0;
    let mut total_runs: u64 = 0;
    let mut total_abs_diff: u64 = 0;
    let mut total_diffs: u64 = 0;
    for y in (0..height).step_by(row_step) {
        let row = &plane[y * width..y * width + width];
        total_runs += 1;
        total_pixels += width as u64;
        let mut prev = row[0];
        for &v in &row[1..] {
            total_abs_diff += (v - prev).unsigned_abs() as u64;
            total_diffs += 1;
            if v != prev {
                total_runs += 1;
                prev = v;
            }
        }
    }
    let avg_run = if total_runs > 0 {
        total_pixels as f64 / total_runs as f64
    } else {
        0.0
    };
    m.avg_run_x100 = (avg_run * 100.0).round().clamp(0.0, 65535.0) as u16;
    let mean_abs_diff = if total_diffs > 0 {
        total_abs_diff as f64 / total_diffs as f64
    } else {
        0.0
    };
    m.mean_abs_diff_x100 = (mean_abs_diff * 100.0).round().clamp(0.0, 65535.0) as u16;

    if m.unique_sample <= 48 {
        m.likely_screen = true;
    } else if m.unique_sample <= 96 && m.avg_run_x100 >= 280 {
        m.likely_screen = true;
    } else {
        m.likely_screen = false;
    }
    if m.mean_abs_diff_x100 >= 2200 && m.unique_sample > 96 {
        m.likely_screen = false;
    }
    m
}

pub fn bits_for_symbol_count(count: usize) -> u32 {
    if count <= 1 {
        return 0;
    }
    let mut bits = 0u32;
    let mut v = 1usize;
    while v < count {
        v <<= 1;
        bits += 1;
    }
    bits
}

pub fn pack_index_bits(indices: &[u8], bits: u32) -> Vec<u8> {
    let mut out = Vec::new();
    if bits == 0 || indices.is_empty() {
        return out;
    }
    out.reserve((indices.len() * bits as usize + 7) / 8);
    let mut acc: u64 = 0;
    let mut acc_bits = 0u32;
    let mask: u32 = (1u32 << bits) - 1;
    for &idx in indices {
        acc |= ((idx as u32 & mask) as u64) << acc_bits;
        acc_bits += bits;
        while acc_bits >= 8 {
            out.push((acc & 0xFF) as u8);
            acc >>= 8;
            acc_bits -= 8;
        }
    }
    if acc_bits > 0 {
        out.push((acc & 0xFF) as u8);
    }
    out
}

pub fn unpack_index_bits(data: &[u8], bits: u32, count: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(count);
    if bits == 0 {
        return vec![0u8; count];
    }
    let mask: u32 = (1u32 << bits) - 1;
    let mut acc: u64 = 0;
    let mut acc_bits = 0u32;
    let mut pos = 0usize;
    while out.len() < count {
        while acc_bits < bits && pos < data.len() {
            acc |= (data[pos] as u64) << acc_bits;
            acc_bits += 8;
            pos += 1;
        }
        out.push((acc as u32 & mask) as u8);
        acc >>= bits;
        acc_bits -= bits;
    }
    out
}

/// Pads `plane` to multiples of 8 by edge-replicating the last row/column,
/// extracts a frequency-sorted palette (descending count, ties ascending
/// value), and bit-packs the per-pixel indices. Fails with
/// `TooManyUnique` when the padded plane carries more than 64 distinct
/// values.
pub fn encode(plane: &[i32], width: usize, height: usize) -> Result<Vec<u8>, BuildFailReason> {
    let pad_w = width.div_ceil(8) * 8;
    let pad_h = height.div_ceil(8) * 8;
    let mut padded = vec![0i32; pad_w * pad_h];
    for y in 0..pad_h {
        let sy = y.min(height.saturating_sub(1));
        for x in 0..pad_w {
            let sx = x.min(width.saturating_sub(1));
            padded[y * pad_w + x] = plane[sy * width + sx];
        }
    }

    let mut counts: HashMap<i32, u32> = HashMap::new();
    for &v in &padded {
        *counts.entry(v).or_insert(0) += 1;
    }
    if counts.is_empty() {
        return Err(BuildFailReason::EmptyHist);
    }
    if counts.len() > MAX_PALETTE {
        return Err(BuildFailReason::TooManyUnique);
    }

    let mut entries: Vec<(i32, u32)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let palette: Vec<i16> = entries.iter().map(|&(v, _)| v as i16).collect();
    let mut index_of: HashMap<i32, u8> = HashMap::new();
    for (i, &(v, _)) in entries.iter().enumerate() {
        index_of.insert(v, i as u8);
    }

    let indices: Vec<u8> = padded.iter().map(|v| index_of[v]).collect();
    let bits = bits_for_symbol_count(palette.len());
    let packed = pack_index_bits(&indices, bits);

    let mut best_mode = MODE_RAW;
    let mut best_payload = packed.clone();

    let (variant, rans_body) = bytestream::encode_auto(&packed);
    let mut rans = Vec::with_capacity(1 + rans_body.len());
    rans.push(variant);
    rans.extend_from_slice(&rans_body);
    if rans.len() < best_payload.len() {
        best_mode = MODE_RANS;
        best_payload = rans;
    }

    let lz = tilelz::compress(&packed);
    if lz.len() < best_payload.len() {
        best_mode = MODE_LZ;
        best_payload = lz;
    }

    let mut out = Vec::with_capacity(14 + palette.len() * 2 + best_payload.len());
    out.push(MAGIC);
    out.push(best_mode);
    out.push(bits as u8);
    out.push(0); // reserved
    out.write_u16::<LittleEndian>(palette.len() as u16).unwrap();
    out.write_u32::<LittleEndian>((pad_w * pad_h) as u32).unwrap();
    out.write_u32::<LittleEndian>(packed.len() as u32).unwrap();
    for &v in &palette {
        out.write_i16::<LittleEndian>(v).unwrap();
    }
    out.extend_from_slice(&best_payload);
    Ok(out)
}

pub fn decode(data: &[u8], width: usize, height: usize) -> crate::error::Result<Vec<i32>> {
    let mut cur = Cursor::new(data);
    let magic = cur.read_u8().map_err(eof)?;
    if magic != MAGIC {
        return Err(crate::error::CodecError::CorruptStream(
            "screen route magic mismatch".into(),
        ));
    }
    let mode = cur.read_u8().map_err(eof)?;
    let bits = cur.read_u8().map_err(eof)? as u32;
    let _reserved = cur.read_u8().map_err(eof)?;
    let palette_count = cur.read_u16::<LittleEndian>().map_err(eof)? as usize;
    let pixel_count = cur.read_u32::<LittleEndian>().map_err(eof)? as usize;
    let raw_packed_size = cur.read_u32::<LittleEndian>().map_err(eof)? as usize;

    let mut palette = Vec::with_capacity(palette_count);
    for _ in 0..palette_count {
        palette.push(cur.read_i16::<LittleEndian>().map_err(eof)?);
    }

    let payload = &data[cur.position() as usize..];
    let packed = match mode {
        MODE_RAW => payload.to_vec(),
        MODE_RANS => {
            let variant = *payload.first().ok_or_else(|| {
                crate::error::CodecError::CorruptStream("screen route rANS variant missing".into())
            })?;
            bytestream::decode_auto(variant, &payload[1..])?
        }
        MODE_LZ => tilelz::decompress(payload, raw_packed_size),
        m => {
            return Err(crate::error::CodecError::UnknownChunk(format!(
                "screen route mode {m}"
            )))
        }
    };

    let indices = unpack_index_bits(&packed, bits, pixel_count);
    let pad_w = width.div_ceil(8) * 8;
    let mut padded = vec![0i32; pixel_count];
    for (i, &idx) in indices.iter().enumerate() {
        padded[i] = *palette.get(idx as usize).ok_or_else(|| {
            crate::error::CodecError::CorruptStream("screen route index out of range".into())
        })? as i32;
    }

    let mut out = vec![0i32; width * height];
    for y in 0..height {
        for x in 0..width {
            out[y * width + x] = padded[y * pad_w + x];
        }
    }
    Ok(out)
}

fn eof(_: std::io::Error) -> crate::error::CodecError {
    crate::error::CodecError::CorruptStream("screen route header truncated".into())
}
