//! Copy-block parameters and their serialized stream (spec.md §4.6),
//! grounded on `original_source/src/codec/copy.h`. Each `Copy`-classified
//! block stores one `(dx, dy)` offset as two little-endian `i16`s.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyParams {
    pub dx: i16,
    pub dy: i16,
}

pub fn encode_copy_stream(params: &[CopyParams]) -> Vec<u8> {
    let mut out = Vec::with_capacity(params.len() * 4);
    for p in params {
        out.extend_from_slice(&p.dx.to_le_bytes());
        out.extend_from_slice(&p.dy.to_le_bytes());
    }
    out
}

pub fn decode_copy_stream(data: &[u8], count: usize) -> crate::error::Result<Vec<CopyParams>> {
    if data.len() < count * 4 {
        return Err(crate::error::CodecError::TruncatedChunk {
            chunk: "copy-stream".into(),
            declared: count * 4,
            available: data.len(),
        });
    }
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let base = i * 4;
        let dx = i16::from_le_bytes([data[base], data[base + 1]]);
        let dy = i16::from_le_bytes([data[base + 2], data[base + 3]]);
        out.push(CopyParams { dx, dy });
    }
    Ok(out)
}

/// Copy an 8x8 block from `(cur_x + dx, cur_y + dy)` within the already
/// partially-reconstructed plane. Caller guarantees the source block lies
/// earlier in raster order (classification only selects such offsets).
pub fn apply_copy(out: &mut [i32], pad_w: usize, cur_x: usize, cur_y: usize, p: CopyParams) {
    let src_x = (cur_x as i32 + p.dx as i32) as usize;
    let src_y = (cur_y as i32 + p.dy as i32) as usize;
    for y in 0..8 {
        for x in 0..8 {
            out[(cur_y + y) * pad_w + cur_x + x] = out[(src_y + y) * pad_w + src_x + x];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_stream_round_trips() {
        let params = vec![
            CopyParams { dx: -8, dy: 0 },
            CopyParams { dx: 0, dy: -8 },
            CopyParams { dx: 8, dy: -8 },
        ];
        let enc = encode_copy_stream(&params);
        let dec = decode_copy_stream(&enc, params.len()).unwrap();
        assert_eq!(dec, params);
    }

    #[test]
    fn apply_copy_duplicates_block() {
        let pad_w = 16;
        let mut out = vec![0i32; pad_w * 8];
        for y in 0..8 {
            for x in 0..8 {
                out[y * pad_w + x] = (x + y * 3) as i32;
            }
        }
        apply_copy(&mut out, pad_w, 8, 0, CopyParams { dx: -8, dy: 0 });
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(out[y * pad_w + 8 + x], out[y * pad_w + x]);
            }
        }
    }
}
