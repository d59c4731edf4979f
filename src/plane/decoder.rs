//! Plane decoder: dispatch on the tile payload's leading byte, reconstruct
//! the padded int16 plane, crop to logical size (spec.md §4.10).

use super::{crop, padded_dims};
use crate::error::Result;
use crate::legacy;
use crate::routes::{natural, screen};

pub fn decode_plane(data: &[u8], width: usize, height: usize) -> Result<Vec<i32>> {
    let (pad_w, pad_h) = padded_dims(width, height);
    if data.is_empty() {
        return Err(crate::error::CodecError::CorruptStream("empty tile payload".into()));
    }
    let padded = match data[0] {
        natural::MAGIC => natural::decode(data, pad_w, pad_h)?,
        screen::MAGIC => screen::decode(data, pad_w, pad_h)?,
        _ => legacy::decode_tile(data, pad_w, pad_h)?,
    };
    Ok(crop(&padded, pad_w, width, height))
}

#[cfg(test)]
mod tests {
    use super::super::encoder::encode_plane;
    use super::*;

    #[test]
    fn gradient_plane_round_trips_through_full_dispatch() {
        let width = 37;
        let height = 21;
        let plane: Vec<i32> = (0..width * height)
            .map(|i| ((i % width) * 3 + i / width) as i32 % 256)
            .collect();
        let payload = encode_plane(&plane, width, height, None);
        let decoded = decode_plane(&payload, width, height).unwrap();
        assert_eq!(decoded, plane);
    }

    #[test]
    fn low_color_plane_round_trips_through_full_dispatch() {
        let width = 72;
        let height = 64;
        let plane: Vec<i32> = (0..width * height).map(|i| (i % 4) as i32 * 60).collect();
        let payload = encode_plane(&plane, width, height, None);
        let decoded = decode_plane(&payload, width, height).unwrap();
        assert_eq!(decoded, plane);
    }

    #[test]
    fn constant_plane_round_trips() {
        let width = 8;
        let height = 8;
        let plane = vec![0x80i32; width * height];
        let payload = encode_plane(&plane, width, height, None);
        let decoded = decode_plane(&payload, width, height).unwrap();
        assert_eq!(decoded, plane);
    }
}
