//! Byte-stream codecs over the entropy core (spec.md §4.4): a data-adaptive
//! variant that builds its CDF from the tile's own histogram, and a
//! shared-CDF variant using a fixed distribution biased toward small values
//! and LZ tag bytes, for small streams where shipping a histogram would cost
//! more than it saves.

use crate::entropy::rans::{flat_decode, flat_decode_lut, FlatInterleavedEncoder};
use crate::entropy::tables::CdfTable;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// `[u32 cdf_size=1024 LE][freq[256]: u32 LE each][u32 count][u32 rans_size][rans bytes]`
pub fn encode_adaptive(data: &[u8]) -> Vec<u8> {
    let mut counts = [0u64; 256];
    for &b in data {
        counts[b as usize] += 1;
    }
    let cdf = CdfTable::from_counts(&counts);
    let symbols: Vec<usize> = data.iter().map(|&b| b as usize).collect();
    let rans = FlatInterleavedEncoder::encode(&cdf, &symbols);

    let mut out = Vec::with_capacity(4 + 256 * 4 + 8 + rans.len());
    out.write_u32::<LittleEndian>(1024).unwrap();
    for &f in &cdf.freq {
        out.write_u32::<LittleEndian>(f).unwrap();
    }
    out.write_u32::<LittleEndian>(data.len() as u32).unwrap();
    out.write_u32::<LittleEndian>(rans.len() as u32).unwrap();
    out.extend_from_slice(&rans);
    out
}

pub fn decode_adaptive(data: &[u8]) -> crate::error::Result<Vec<u8>> {
    let mut cur = Cursor::new(data);
    let cdf_size = cur
        .read_u32::<LittleEndian>()
        .map_err(|_| crate::error::CodecError::CorruptStream("adaptive header truncated".into()))?;
    if cdf_size != 1024 {
        return Err(crate::error::CodecError::CorruptStream(format!(
            "unexpected cdf_size {cdf_size}"
        )));
    }
    let mut freq = [0u32; 256];
    for f in freq.iter_mut() {
        *f = cur
            .read_u32::<LittleEndian>()
            .map_err(|_| crate::error::CodecError::CorruptStream("freq table truncated".into()))?;
    }
    let count = cur
        .read_u32::<LittleEndian>()
        .map_err(|_| crate::error::CodecError::CorruptStream("count field truncated".into()))?
        as usize;
    let rans_size = cur
        .read_u32::<LittleEndian>()
        .map_err(|_| crate::error::CodecError::CorruptStream("rans_size field truncated".into()))?
        as usize;

    let pos = cur.position() as usize;
    if pos + rans_size > data.len() {
        return Err(crate::error::CodecError::TruncatedChunk {
            chunk: "bytestream-adaptive".into(),
            declared: rans_size,
            available: data.len().saturating_sub(pos),
        });
    }
    let rans_bytes = &data[pos..pos + rans_size];

    let freq64: Vec<u64> = freq.iter().map(|&f| f as u64).collect();
    let cdf = CdfTable::from_counts(&freq64);
    let lut = cdf.build_lut();
    let symbols = flat_decode_lut(&cdf, &lut, rans_bytes, count);
    Ok(symbols.into_iter().map(|s| s as u8).collect())
}

/// `[u32 count][u32 rans_size][rans bytes]`, no histogram shipped: the
/// decoder reconstructs the same fixed table via [`CdfTable::shared_lz`].
pub fn encode_shared(data: &[u8]) -> Vec<u8> {
    let cdf = CdfTable::shared_lz();
    let symbols: Vec<usize> = data.iter().map(|&b| b as usize).collect();
    let rans = FlatInterleavedEncoder::encode(&cdf, &symbols);

    let mut out = Vec::with_capacity(8 + rans.len());
    out.write_u32::<LittleEndian>(data.len() as u32).unwrap();
    out.write_u32::<LittleEndian>(rans.len() as u32).unwrap();
    out.extend_from_slice(&rans);
    out
}

pub fn decode_shared(data: &[u8]) -> crate::error::Result<Vec<u8>> {
    let mut cur = Cursor::new(data);
    let count = cur
        .read_u32::<LittleEndian>()
        .map_err(|_| crate::error::CodecError::CorruptStream("count field truncated".into()))?
        as usize;
    let rans_size = cur
        .read_u32::<LittleEndian>()
        .map_err(|_| crate::error::CodecError::CorruptStream("rans_size field truncated".into()))?
        as usize;

    let pos = cur.position() as usize;
    if pos + rans_size > data.len() {
        return Err(crate::error::CodecError::TruncatedChunk {
            chunk: "bytestream-shared".into(),
            declared: rans_size,
            available: data.len().saturating_sub(pos),
        });
    }
    let rans_bytes = &data[pos..pos + rans_size];

    let cdf = CdfTable::shared_lz();
    let symbols = flat_decode(&cdf, rans_bytes, count);
    Ok(symbols.into_iter().map(|s| s as u8).collect())
}

/// Selects the adaptive codec unless the input is too small to amortize a
/// 1024-byte histogram (spec.md §4.4: "below this size, shipping a
/// histogram costs more than it saves").
const ADAPTIVE_MIN_LEN: usize = 512;

pub fn encode_auto(data: &[u8]) -> (u8, Vec<u8>) {
    if data.len() >= ADAPTIVE_MIN_LEN {
        (0, encode_adaptive(data))
    } else {
        (1, encode_shared(data))
    }
}

pub fn decode_auto(variant: u8, data: &[u8]) -> crate::error::Result<Vec<u8>> {
    match variant {
        0 => decode_adaptive(data),
        1 => decode_shared(data),
        v => Err(crate::error::CodecError::UnknownChunk(format!(
            "bytestream variant {v}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adaptive_round_trips_skewed_data() {
        let mut data = Vec::new();
        for i in 0..3000u32 {
            data.push(if i % 10 == 0 { 200 } else { (i % 5) as u8 });
        }
        let enc = encode_adaptive(&data);
        let dec = decode_adaptive(&enc).unwrap();
        assert_eq!(dec, data);
    }

    #[test]
    fn shared_round_trips_small_data() {
        let data: Vec<u8> = (0..64u32).map(|i| (i % 17) as u8).collect();
        let enc = encode_shared(&data);
        let dec = decode_shared(&enc).unwrap();
        assert_eq!(dec, data);
    }

    #[test]
    fn auto_picks_shared_for_small_input() {
        let data = vec![1u8, 2, 3];
        let (variant, enc) = encode_auto(&data);
        assert_eq!(variant, 1);
        assert_eq!(decode_auto(variant, &enc).unwrap(), data);
    }

    #[test]
    fn auto_picks_adaptive_for_large_input() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 3) as u8).collect();
        let (variant, enc) = encode_auto(&data);
        assert_eq!(variant, 0);
        assert_eq!(decode_auto(variant, &enc).unwrap(), data);
    }

    #[test]
    fn empty_stream_round_trips() {
        let enc = encode_shared(&[]);
        let dec = decode_shared(&enc).unwrap();
        assert!(dec.is_empty());
    }

    #[test]
    fn truncated_stream_reports_error() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 3) as u8).collect();
        let mut enc = encode_adaptive(&data);
        enc.truncate(enc.len() - 10);
        assert!(decode_adaptive(&enc).is_err());
    }
}
