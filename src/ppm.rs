//! Hand-rolled binary PPM (P6) reader/writer — the CLI's only image I/O
//! format (spec.md scopes PNG/PPM wrappers as external/unspecified; we still
//! need one to feed the encoder), grounded on the teacher's raw read/write
//! helpers in `examples/bezverec-cti/src/cti.rs` (`extract_tile`/`blit_tile`
//! row-copy loops) rather than pulling in the `image` crate.

use crate::error::{CodecError, Result};
use std::io::{BufRead, Write};

#[derive(Debug, Clone)]
pub struct Ppm {
    pub width: u32,
    pub height: u32,
    pub max_val: u16,
    /// Row-major RGB8, 3 bytes per pixel.
    pub data: Vec<u8>,
}

fn read_token<R: BufRead>(r: &mut R) -> Result<String> {
    let mut tok = String::new();
    loop {
        let mut byte = [0u8; 1];
        let n = r
            .read(&mut byte)
            .map_err(|e| CodecError::InvalidHeader(format!("ppm header io error: {e}")))?;
        if n == 0 {
            break;
        }
        let c = byte[0] as char;
        if c == '#' {
            let mut line = String::new();
            r.read_line(&mut line)
                .map_err(|e| CodecError::InvalidHeader(format!("ppm comment io error: {e}")))?;
            continue;
        }
        if c.is_whitespace() {
            if !tok.is_empty() {
                break;
            }
            continue;
        }
        tok.push(c);
    }
    if tok.is_empty() {
        return Err(CodecError::InvalidHeader("ppm header truncated".into()));
    }
    Ok(tok)
}

pub fn read_ppm<R: BufRead>(r: &mut R) -> Result<Ppm> {
    let magic = read_token(r)?;
    if magic != "P6" {
        return Err(CodecError::InvalidHeader(format!(
            "unsupported ppm magic {magic:?} (only P6 binary is supported)"
        )));
    }
    let width: u32 = read_token(r)?
        .parse()
        .map_err(|_| CodecError::InvalidHeader("bad ppm width".into()))?;
    let height: u32 = read_token(r)?
        .parse()
        .map_err(|_| CodecError::InvalidHeader("bad ppm height".into()))?;
    let max_val: u16 = read_token(r)?
        .parse()
        .map_err(|_| CodecError::InvalidHeader("bad ppm maxval".into()))?;
    if width == 0 || height == 0 {
        return Err(CodecError::InvalidHeader("zero ppm dimension".into()));
    }
    if max_val == 0 || max_val > 255 {
        return Err(CodecError::InvalidHeader(
            "only 8-bit ppm (maxval <= 255) is supported".into(),
        ));
    }

    let expected = (width as usize) * (height as usize) * 3;
    let mut data = vec![0u8; expected];
    r.read_exact(&mut data).map_err(|_| CodecError::TruncatedChunk {
        chunk: "PPM".into(),
        declared: expected as u64,
        available: 0,
    })?;
    Ok(Ppm {
        width,
        height,
        max_val,
        data,
    })
}

pub fn write_ppm<W: Write>(w: &mut W, img: &Ppm) -> std::io::Result<()> {
    write!(w, "P6\n{} {}\n{}\n", img.width, img.height, img.max_val.min(255))?;
    w.write_all(&img.data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_small_image() {
        let img = Ppm {
            width: 3,
            height: 2,
            max_val: 255,
            data: (0..18u8).collect(),
        };
        let mut buf = Vec::new();
        write_ppm(&mut buf, &img).unwrap();
        let back = read_ppm(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(back.width, 3);
        assert_eq!(back.height, 2);
        assert_eq!(back.data, img.data);
    }

    #[test]
    fn rejects_non_p6_magic() {
        let buf = b"P3\n1 1\n255\n".to_vec();
        assert!(read_ppm(&mut Cursor::new(&buf)).is_err());
    }

    #[test]
    fn skips_comment_lines() {
        let buf = b"P6\n# a comment\n2 1\n255\n\x01\x02\x03\x04\x05\x06".to_vec();
        let img = read_ppm(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(img.width, 2);
        assert_eq!(img.data, vec![1, 2, 3, 4, 5, 6]);
    }
}
