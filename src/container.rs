//! File container: 48-byte header, chunk directory, QMAT chunk, per-plane
//! tile chunks (spec.md §3, §4.1, §6), grounded on the header/index/section
//! read-write pattern in `examples/bezverec-cti/src/cti.rs`
//! (`CTIHeader`/`write_header`/`read_header`, `TileIndex`, `write_sections`)
//! generalized from a fixed tile grid to a directory of named chunks.

use crate::error::{CodecError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

pub const MAGIC: [u8; 4] = *b"HKN\0";
pub const HEADER_SIZE: usize = 48;
pub const BLOCK_SIZE: u8 = 8;

pub const FLAG_LOSSLESS: u16 = 1 << 0;
pub const FLAG_CFL: u16 = 1 << 1;

#[derive(Debug, Clone, Copy)]
pub struct FileHeader {
    pub version: u16,
    pub flags: u16,
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub num_channels: u8,
    pub colorspace: u8,
    pub subsampling: u8,
    pub tile_cols: u16,
    pub tile_rows: u16,
    pub transform_type: u8,
    pub pindex_density: u8,
    pub quality: u8,
}

impl FileHeader {
    pub fn is_lossless(&self) -> bool {
        self.flags & FLAG_LOSSLESS != 0
    }

    pub fn cfl_enabled(&self) -> bool {
        self.flags & FLAG_CFL != 0
    }
}

pub fn write_header<W: Write>(w: &mut W, h: &FileHeader) -> Result<()> {
    w.write_all(&MAGIC).map_err(io_err)?;
    w.write_u16::<LittleEndian>(h.version).map_err(io_err)?;
    w.write_u16::<LittleEndian>(h.flags).map_err(io_err)?;
    w.write_u32::<LittleEndian>(h.width).map_err(io_err)?;
    w.write_u32::<LittleEndian>(h.height).map_err(io_err)?;
    w.write_u8(h.bit_depth).map_err(io_err)?;
    w.write_u8(h.num_channels).map_err(io_err)?;
    w.write_u8(h.colorspace).map_err(io_err)?;
    w.write_u8(h.subsampling).map_err(io_err)?;
    w.write_u16::<LittleEndian>(h.tile_cols).map_err(io_err)?;
    w.write_u16::<LittleEndian>(h.tile_rows).map_err(io_err)?;
    w.write_u8(BLOCK_SIZE).map_err(io_err)?;
    w.write_u8(h.transform_type).map_err(io_err)?;
    w.write_u8(0).map_err(io_err)?; // entropy_type = NyANS_P
    w.write_u8(8).map_err(io_err)?; // interleave_n
    w.write_u8(h.pindex_density).map_err(io_err)?;
    w.write_u8(h.quality).map_err(io_err)?;
    w.write_u16::<LittleEndian>(0).map_err(io_err)?; // padding
    w.write_all(&[0u8; 16]).map_err(io_err)?;
    Ok(())
}

pub fn read_header<R: Read>(r: &mut R) -> Result<FileHeader> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic).map_err(io_err)?;
    if magic != MAGIC {
        return Err(CodecError::InvalidHeader("bad magic".into()));
    }
    let version = r.read_u16::<LittleEndian>().map_err(io_err)?;
    let flags = r.read_u16::<LittleEndian>().map_err(io_err)?;
    let width = r.read_u32::<LittleEndian>().map_err(io_err)?;
    let height = r.read_u32::<LittleEndian>().map_err(io_err)?;
    if width == 0 || height == 0 {
        return Err(CodecError::InvalidHeader("zero dimension".into()));
    }
    let bit_depth = r.read_u8().map_err(io_err)?;
    let num_channels = r.read_u8().map_err(io_err)?;
    let colorspace = r.read_u8().map_err(io_err)?;
    let subsampling = r.read_u8().map_err(io_err)?;
    let tile_cols = r.read_u16::<LittleEndian>().map_err(io_err)?;
    let tile_rows = r.read_u16::<LittleEndian>().map_err(io_err)?;
    let block_size = r.read_u8().map_err(io_err)?;
    if block_size != BLOCK_SIZE {
        return Err(CodecError::InvalidHeader(format!(
            "unexpected block_size {block_size}"
        )));
    }
    let transform_type = r.read_u8().map_err(io_err)?;
    let _entropy_type = r.read_u8().map_err(io_err)?;
    let _interleave_n = r.read_u8().map_err(io_err)?;
    let pindex_density = r.read_u8().map_err(io_err)?;
    let quality = r.read_u8().map_err(io_err)?;
    let _padding = r.read_u16::<LittleEndian>().map_err(io_err)?;
    let mut reserved = [0u8; 16];
    r.read_exact(&mut reserved).map_err(io_err)?;
    Ok(FileHeader {
        version,
        flags,
        width,
        height,
        bit_depth,
        num_channels,
        colorspace,
        subsampling,
        tile_cols,
        tile_rows,
        transform_type,
        pindex_density,
        quality,
    })
}

#[derive(Debug, Clone)]
pub struct ChunkEntry {
    pub kind: [u8; 4],
    pub offset: u64,
    pub size: u64,
}

pub fn chunk_name(base: &str, index: usize) -> [u8; 4] {
    let s = format!("{base}{index}");
    let mut out = [b' '; 4];
    for (i, b) in s.bytes().take(4).enumerate() {
        out[i] = b;
    }
    out
}

/// `QMATChunk`: one quantization table per channel group (spec.md §3).
#[derive(Debug, Clone)]
pub struct QmatChunk {
    pub quality: u8,
    pub tables: Vec<[u16; 64]>,
}

pub fn encode_qmat(q: &QmatChunk) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + q.tables.len() * 128);
    out.push(q.quality);
    out.push(q.tables.len() as u8);
    for table in &q.tables {
        for &v in table {
            out.write_u16::<LittleEndian>(v).unwrap();
        }
    }
    out
}

pub fn decode_qmat(data: &[u8]) -> Result<QmatChunk> {
    let mut cur = Cursor::new(data);
    let quality = cur.read_u8().map_err(io_err)?;
    let num_tables = cur.read_u8().map_err(io_err)? as usize;
    let mut tables = Vec::with_capacity(num_tables);
    for _ in 0..num_tables {
        let mut table = [0u16; 64];
        for slot in &mut table {
            *slot = cur.read_u16::<LittleEndian>().map_err(io_err)?;
        }
        tables.push(table);
    }
    Ok(QmatChunk { quality, tables })
}

/// Assembles the directory-bearing container file in memory: header,
/// directory, QMAT, then each plane's tile chunk in order. Offsets are
/// computed once payload sizes are known, matching `cti.rs`'s "index
/// předalokovat, data pak hned za ním" two-pass layout, generalized from a
/// fixed tile index array to a named chunk directory.
pub fn write_container(header: &FileHeader, qmat: &QmatChunk, tile_payloads: &[Vec<u8>]) -> Vec<u8> {
    let qmat_bytes = encode_qmat(qmat);
    let mut entries: Vec<ChunkEntry> = Vec::with_capacity(1 + tile_payloads.len());

    let dir_count = 1 + tile_payloads.len();
    let dir_size = 4 + dir_count * (4 + 8 + 8);
    let mut cursor = (HEADER_SIZE + dir_size) as u64;

    entries.push(ChunkEntry {
        kind: *b"QMAT",
        offset: cursor,
        size: qmat_bytes.len() as u64,
    });
    cursor += qmat_bytes.len() as u64;

    for (i, payload) in tile_payloads.iter().enumerate() {
        entries.push(ChunkEntry {
            kind: chunk_name("TIL", i),
            offset: cursor,
            size: payload.len() as u64,
        });
        cursor += payload.len() as u64;
    }

    let mut out = Vec::with_capacity(cursor as usize);
    write_header(&mut out, header).expect("writing into a Vec never fails");
    out.write_u32::<LittleEndian>(dir_count as u32).unwrap();
    for e in &entries {
        out.write_all(&e.kind).unwrap();
        out.write_u64::<LittleEndian>(e.offset).unwrap();
        out.write_u64::<LittleEndian>(e.size).unwrap();
    }
    out.extend_from_slice(&qmat_bytes);
    for payload in tile_payloads {
        out.extend_from_slice(payload);
    }
    out
}

pub struct ParsedContainer {
    pub header: FileHeader,
    pub qmat: QmatChunk,
    pub tile_payloads: Vec<Vec<u8>>,
}

pub fn read_container(data: &[u8]) -> Result<ParsedContainer> {
    let mut cur = Cursor::new(data);
    let header = read_header(&mut cur)?;

    let count = cur.read_u32::<LittleEndian>().map_err(io_err)? as usize;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let mut kind = [0u8; 4];
        cur.read_exact(&mut kind).map_err(io_err)?;
        let offset = cur.read_u64::<LittleEndian>().map_err(io_err)?;
        let size = cur.read_u64::<LittleEndian>().map_err(io_err)?;
        if offset + size > data.len() as u64 {
            return Err(CodecError::TruncatedChunk {
                chunk: String::from_utf8_lossy(&kind).trim().to_string(),
                declared: size,
                available: data.len() as u64 - offset.min(data.len() as u64),
            });
        }
        entries.push(ChunkEntry { kind, offset, size });
    }

    let qmat_entry = entries
        .iter()
        .find(|e| &e.kind == b"QMAT")
        .ok_or_else(|| CodecError::UnknownChunk("QMAT".into()))?;
    let qmat = decode_qmat(slice_chunk(data, qmat_entry))?;

    let til0 = entries
        .iter()
        .find(|e| &e.kind == b"TIL0")
        .ok_or_else(|| CodecError::UnknownChunk("TIL0".into()))?;
    let mut tile_payloads = vec![slice_chunk(data, til0).to_vec()];

    if header.num_channels >= 3 {
        for i in 1..3 {
            let name = chunk_name("TIL", i);
            let entry = entries
                .iter()
                .find(|e| e.kind == name)
                .ok_or_else(|| CodecError::UnknownChunk(format!("TIL{i}")))?;
            tile_payloads.push(slice_chunk(data, entry).to_vec());
        }
    }

    Ok(ParsedContainer {
        header,
        qmat,
        tile_payloads,
    })
}

fn slice_chunk<'a>(data: &'a [u8], e: &ChunkEntry) -> &'a [u8] {
    &data[e.offset as usize..(e.offset + e.size) as usize]
}

fn io_err(e: std::io::Error) -> CodecError {
    CodecError::InvalidHeader(format!("io error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header(num_channels: u8) -> FileHeader {
        FileHeader {
            version: 1,
            flags: FLAG_LOSSLESS,
            width: 64,
            height: 32,
            bit_depth: 8,
            num_channels,
            colorspace: 0,
            subsampling: 0,
            tile_cols: 1,
            tile_rows: 1,
            transform_type: 0,
            pindex_density: 1,
            quality: 100,
        }
    }

    #[test]
    fn header_round_trips() {
        let h = sample_header(3);
        let mut buf = Vec::new();
        write_header(&mut buf, &h).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);
        let back = read_header(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(back.width, 64);
        assert_eq!(back.height, 32);
        assert!(back.is_lossless());
        assert!(!back.cfl_enabled());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[0] = b'X';
        assert!(read_header(&mut Cursor::new(&buf)).is_err());
    }

    #[test]
    fn qmat_round_trips_single_and_triple_tables() {
        let q1 = QmatChunk {
            quality: 80,
            tables: vec![[10u16; 64]],
        };
        let back1 = decode_qmat(&encode_qmat(&q1)).unwrap();
        assert_eq!(back1.tables.len(), 1);
        assert_eq!(back1.tables[0][0], 10);

        let q3 = QmatChunk {
            quality: 90,
            tables: vec![[5u16; 64], [6u16; 64], [7u16; 64]],
        };
        let back3 = decode_qmat(&encode_qmat(&q3)).unwrap();
        assert_eq!(back3.tables.len(), 3);
        assert_eq!(back3.tables[2][0], 7);
    }

    #[test]
    fn container_round_trips_grayscale() {
        let header = sample_header(1);
        let qmat = QmatChunk {
            quality: 100,
            tables: vec![[1u16; 64]],
        };
        let tiles = vec![vec![0xAAu8, 0xBB, 0xCC]];
        let bytes = write_container(&header, &qmat, &tiles);
        let parsed = read_container(&bytes).unwrap();
        assert_eq!(parsed.header.width, 64);
        assert_eq!(parsed.tile_payloads.len(), 1);
        assert_eq!(parsed.tile_payloads[0], tiles[0]);
    }

    #[test]
    fn container_round_trips_three_channel() {
        let header = sample_header(3);
        let qmat = QmatChunk {
            quality: 90,
            tables: vec![[2u16; 64], [3u16; 64]],
        };
        let tiles = vec![vec![1u8, 2, 3], vec![4u8, 5], vec![6u8]];
        let bytes = write_container(&header, &qmat, &tiles);
        let parsed = read_container(&bytes).unwrap();
        assert_eq!(parsed.tile_payloads.len(), 3);
        assert_eq!(parsed.tile_payloads[1], tiles[1]);
        assert_eq!(parsed.tile_payloads[2], tiles[2]);
    }

    #[test]
    fn missing_til1_on_color_file_is_rejected() {
        let header = sample_header(3);
        let qmat = QmatChunk {
            quality: 90,
            tables: vec![[2u16; 64]],
        };
        let tiles = vec![vec![1u8, 2, 3]];
        let bytes = write_container(&header, &qmat, &tiles);
        assert!(read_container(&bytes).is_err());
    }

    #[test]
    fn truncated_chunk_is_rejected() {
        let header = sample_header(1);
        let qmat = QmatChunk {
            quality: 100,
            tables: vec![[1u16; 64]],
        };
        let tiles = vec![vec![0u8; 100]];
        let mut bytes = write_container(&header, &qmat, &tiles);
        bytes.truncate(bytes.len() - 50);
        assert!(read_container(&bytes).is_err());
    }
}
