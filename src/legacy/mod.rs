//! Legacy tiled route: 8x8 block-mode competition over DCT/Copy/Palette/
//! TileMatch4 (spec.md §4.6, §4.9), grounded on
//! `original_source/src/codec/lossless_legacy_route.h`'s overall
//! block-by-block assembly. `Dct`-classified columns of each block-row are
//! packed into one ragged row per raster line and row-filtered as a whole
//! (spec.md §4.5); the filtered residuals are zigzag split into low/high
//! bytes, each carried by its own sub-stream (`filter_lo`, `filter_hi`).

pub mod block_types;
pub mod copy;
pub mod palette;
pub mod tile4;

use crate::error::{CodecError, Result};
use crate::filter::{filter_hi, filter_lo, gated, rows};
use crate::wrapper;
use crate::zigzag;
use block_types::BlockType;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use copy::CopyParams;
use palette::{Palette, PaletteExtractor};
use std::io::Cursor;
use tile4::{Tile4Result, TILE4_CANDIDATES};

const HEADER_LEN: usize = 32;

fn write_u32(out: &mut Vec<u8>, v: u32) {
    out.write_u32::<LittleEndian>(v).unwrap();
}

fn dct_row_lens(block_types: &[BlockType], nx: usize, ny: usize) -> Vec<usize> {
    let mut dct_per_blockrow = vec![0usize; ny];
    for (i, &t) in block_types.iter().enumerate() {
        if t == BlockType::Dct {
            dct_per_blockrow[i / nx] += 1;
        }
    }
    dct_per_blockrow.iter().flat_map(|&n| std::iter::repeat_n(8 * n, 8)).collect()
}

/// Encode a padded plane (`pad_w`/`pad_h` multiples of 8) via block-mode
/// competition plus row-filtering of the `Dct` residuals.
pub fn encode_tile(padded: &[i32], pad_w: usize, pad_h: usize, profile_id: u8) -> Vec<u8> {
    let classification = block_types::classify_blocks(padded, pad_w, pad_h, profile_id);
    let nx = pad_w / 8;
    let ny = pad_h / 8;

    let row_lens = dct_row_lens(&classification.block_types, nx, ny);
    let mut dct_rows: Vec<Vec<i32>> = row_lens.iter().map(|&l| Vec::with_capacity(l)).collect();
    for (i, &t) in classification.block_types.iter().enumerate() {
        if t != BlockType::Dct {
            continue;
        }
        let bx = i % nx;
        let by = i / nx;
        for ry in 0..8 {
            let y = by * 8 + ry;
            for rx in 0..8 {
                dct_rows[y].push(padded[y * pad_w + bx * 8 + rx]);
            }
        }
    }

    let max_fid = gated::max_filter_id(profile_id);
    let (filter_ids, flat_residuals) = rows::filter_rows(&dct_rows, max_fid);

    let mut lo_bytes = Vec::with_capacity(flat_residuals.len());
    let mut hi_bytes = Vec::with_capacity(flat_residuals.len());
    for &r in &flat_residuals {
        let zz = zigzag::encode(r as i16);
        lo_bytes.push((zz & 0xFF) as u8);
        hi_bytes.push((zz >> 8) as u8);
    }

    let filter_ids_wrapped = wrapper::wrap(&filter_ids);
    let filter_lo_payload = filter_lo::encode(&lo_bytes, &filter_ids, &row_lens);
    let filter_hi_payload = filter_hi::encode(&hi_bytes);

    let block_type_runs = block_types::encode_block_type_runs(&classification.block_types);
    let palette_stream = palette::encode_palette_stream(&classification.palettes, &classification.palette_indices);
    let copy_stream = copy::encode_copy_stream(&classification.copy_ops);
    let tile4_stream = tile4::serialize_tile4_raw(&classification.tile4_results);

    let block_types_wrapped = wrapper::wrap(&block_type_runs);
    let palette_wrapped = wrapper::wrap(&palette_stream);
    let copy_wrapped = wrapper::wrap(&copy_stream);
    let tile4_wrapped = wrapper::wrap(&tile4_stream);

    let mut out = Vec::with_capacity(
        HEADER_LEN
            + filter_ids_wrapped.len()
            + filter_lo_payload.len()
            + filter_hi_payload.len()
            + block_types_wrapped.len()
            + palette_wrapped.len()
            + copy_wrapped.len()
            + tile4_wrapped.len(),
    );
    write_u32(&mut out, filter_ids_wrapped.len() as u32);
    write_u32(&mut out, filter_lo_payload.len() as u32);
    write_u32(&mut out, filter_hi_payload.len() as u32);
    write_u32(&mut out, flat_residuals.len() as u32);
    write_u32(&mut out, block_types_wrapped.len() as u32);
    write_u32(&mut out, palette_wrapped.len() as u32);
    write_u32(&mut out, copy_wrapped.len() as u32);
    write_u32(&mut out, tile4_wrapped.len() as u32);

    out.extend_from_slice(&filter_ids_wrapped);
    out.extend_from_slice(&filter_lo_payload);
    out.extend_from_slice(&filter_hi_payload);
    out.extend_from_slice(&block_types_wrapped);
    out.extend_from_slice(&palette_wrapped);
    out.extend_from_slice(&copy_wrapped);
    out.extend_from_slice(&tile4_wrapped);
    out
}

fn trunc<E>(_: E) -> CodecError {
    CodecError::CorruptStream("legacy tile header truncated".into())
}

/// Decode a legacy tile payload back into a padded `pad_w x pad_h` plane.
/// The payload is exactly the spec's 32-byte tile header (spec.md §4.9)
/// followed by its seven sub-streams; there is no separate route magic
/// byte, since the plane decoder dispatches here whenever the leading byte
/// doesn't match the natural-row or screen-indexed routes.
pub fn decode_tile(data: &[u8], pad_w: usize, pad_h: usize) -> Result<Vec<i32>> {
    if data.len() < HEADER_LEN {
        return Err(CodecError::CorruptStream("legacy tile header truncated".into()));
    }
    let mut cur = Cursor::new(&data[..HEADER_LEN]);
    let filter_ids_sz = cur.read_u32::<LittleEndian>().map_err(trunc)? as usize;
    let filter_lo_sz = cur.read_u32::<LittleEndian>().map_err(trunc)? as usize;
    let filter_hi_sz = cur.read_u32::<LittleEndian>().map_err(trunc)? as usize;
    let filter_pixel_count = cur.read_u32::<LittleEndian>().map_err(trunc)? as usize;
    let block_types_sz = cur.read_u32::<LittleEndian>().map_err(trunc)? as usize;
    let palette_sz = cur.read_u32::<LittleEndian>().map_err(trunc)? as usize;
    let copy_sz = cur.read_u32::<LittleEndian>().map_err(trunc)? as usize;
    let tile4_sz = cur.read_u32::<LittleEndian>().map_err(trunc)? as usize;

    let mut pos = HEADER_LEN;
    let mut slices = Vec::with_capacity(7);
    for &sz in &[filter_ids_sz, filter_lo_sz, filter_hi_sz, block_types_sz, palette_sz, copy_sz, tile4_sz] {
        if pos + sz > data.len() {
            return Err(CodecError::CorruptStream("legacy tile stream truncated".into()));
        }
        slices.push(&data[pos..pos + sz]);
        pos += sz;
    }

    let filter_ids = wrapper::unwrap(slices[0])?;
    let filter_lo_data = slices[1];
    let filter_hi_data = slices[2];
    let block_type_runs = wrapper::unwrap(slices[3])?;
    let palette_data = wrapper::unwrap(slices[4])?;
    let copy_stream = wrapper::unwrap(slices[5])?;
    let tile4_stream = wrapper::unwrap(slices[6])?;

    let nx = pad_w / 8;
    let ny = pad_h / 8;
    let nb = nx * ny;

    let block_types_vec = block_types::decode_block_type_runs(&block_type_runs, nb)?;
    let palette_count = block_types_vec.iter().filter(|&&t| t == BlockType::Palette).count();
    let copy_count = block_types_vec.iter().filter(|&&t| t == BlockType::Copy).count();
    let tile4_count = block_types_vec.iter().filter(|&&t| t == BlockType::TileMatch4).count();

    let (palettes, palette_indices) = palette::decode_palette_stream(&palette_data, palette_count)?;
    let copy_ops = copy::decode_copy_stream(&copy_stream, copy_count)?;
    let tile4_results = tile4::deserialize_tile4_raw(&tile4_stream, tile4_count)?;

    let row_lens = dct_row_lens(&block_types_vec, nx, ny);
    let lo_bytes = filter_lo::decode(filter_lo_data, &filter_ids, &row_lens)?;
    let hi_bytes = filter_hi::decode(filter_hi_data, filter_pixel_count)?;
    if lo_bytes.len() != filter_pixel_count || hi_bytes.len() != filter_pixel_count {
        return Err(CodecError::CorruptStream("filter residual length mismatch".into()));
    }
    let flat_residuals: Vec<i32> = (0..filter_pixel_count)
        .map(|i| {
            let zz = (lo_bytes[i] as u16) | ((hi_bytes[i] as u16) << 8);
            zigzag::decode(zz) as i32
        })
        .collect();
    let dct_rows = rows::unfilter_rows(&filter_ids, &flat_residuals, &row_lens);

    let mut out = vec![0i32; pad_w * pad_h];
    let mut row_cursor = vec![0usize; pad_h];
    let (mut palette_i, mut copy_i, mut tile4_i) = (0usize, 0usize, 0usize);

    for i in 0..nb {
        let bx = i % nx;
        let by = i / nx;
        let cur_x = bx * 8;
        let cur_y = by * 8;
        match block_types_vec[i] {
            BlockType::Dct => {
                for ry in 0..8 {
                    let y = cur_y + ry;
                    let cursor = row_cursor[y];
                    let seg = &dct_rows[y][cursor..cursor + 8];
                    out[y * pad_w + cur_x..y * pad_w + cur_x + 8].copy_from_slice(seg);
                    row_cursor[y] += 8;
                }
            }
            BlockType::Copy => {
                let p = *copy_ops.get(copy_i).unwrap_or(&CopyParams { dx: 0, dy: 0 });
                copy_i += 1;
                copy::apply_copy(&mut out, pad_w, cur_x, cur_y, p);
            }
            BlockType::Palette => {
                let palette = palettes.get(palette_i).copied().unwrap_or(Palette { size: 1, colors: [128; 8] });
                let idx = palette_indices.get(palette_i).copied().unwrap_or([0u8; 64]);
                palette_i += 1;
                let block = PaletteExtractor::reconstruct(&idx, &palette);
                for ry in 0..8 {
                    for rx in 0..8 {
                        out[(cur_y + ry) * pad_w + cur_x + rx] = block[ry * 8 + rx];
                    }
                }
            }
            BlockType::TileMatch4 => {
                let r = tile4_results.get(tile4_i).copied().unwrap_or(Tile4Result { indices: [0; 4] });
                tile4_i += 1;
                tile4::apply_tile4(&mut out, pad_w, cur_x, cur_y, r, &TILE4_CANDIDATES);
            }
        }
    }
    Ok(out)
}
