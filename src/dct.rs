//! 8x8 DCT-II peripheral (spec.md §4.11): fixed-point forward/inverse
//! transform and the zigzag scan order used to linearize quantized
//! coefficients before entropy coding. Interface-only, per spec.md §1's
//! framing of the lossy pipeline as a peripheral collaborator, grounded on
//! `original_source/src/codec/dct8x8.h`.

const FP_BITS: i64 = 12;
const FP_ONE: i64 = 1 << FP_BITS;

/// Scan order that visits 8x8 coefficients from DC outward along ascending
/// total frequency, standard JPEG zigzag.
pub const ZIGZAG_ORDER: [u8; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27, 20,
    13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58, 59,
    52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

fn basis(n: usize) -> [[i64; 8]; 8] {
    let mut table = [[0i64; 8]; 8];
    for (u, row) in table.iter_mut().enumerate() {
        let scale = if u == 0 { 1.0 / std::f64::consts::SQRT_2 } else { 1.0 };
        for (x, cell) in row.iter_mut().enumerate() {
            let angle = std::f64::consts::PI * (2 * x + 1) as f64 * u as f64 / (2 * n as f64);
            *cell = (scale * angle.cos() * FP_ONE as f64).round() as i64;
        }
    }
    table
}

/// Forward 8x8 DCT-II over a row-major block of pixel-domain samples
/// (already level-shifted by the caller), fixed-point with `FP_BITS` of
/// precision, `coeff[0]` scaled by `1/sqrt(2)` at both axes.
pub fn forward_dct_8x8(block: &[i32; 64]) -> [i32; 64] {
    let basis = basis(8);
    let mut tmp = [0i64; 64];
    for v in 0..8 {
        for x in 0..8 {
            let mut sum = 0i64;
            for y in 0..8 {
                sum += basis[v][y] * block[y * 8 + x] as i64;
            }
            tmp[v * 8 + x] = sum >> FP_BITS;
        }
    }
    let mut out = [0i32; 64];
    for u in 0..8 {
        for v in 0..8 {
            let mut sum = 0i64;
            for x in 0..8 {
                sum += basis[u][x] * tmp[v * 8 + x];
            }
            out[v * 8 + u] = ((sum >> FP_BITS) / 4) as i32;
        }
    }
    out
}

/// Inverse 8x8 DCT-II, the exact transpose-weighted reconstruction of
/// [`forward_dct_8x8`], two fixed-point passes (row then column).
pub fn inverse_dct_8x8(coeffs: &[i32; 64]) -> [i32; 64] {
    let basis = basis(8);
    let mut tmp = [0i64; 64];
    for y in 0..8 {
        for x in 0..8 {
            let mut sum = 0i64;
            for v in 0..8 {
                sum += basis[v][x] * coeffs[v * 8 + y] as i64;
            }
            tmp[y * 8 + x] = sum >> FP_BITS;
        }
    }
    let mut out = [0i32; 64];
    for y in 0..8 {
        for x in 0..8 {
            let mut sum = 0i64;
            for u in 0..8 {
                sum += basis[u][y] * tmp[u * 8 + x];
            }
            out[y * 8 + x] = ((sum >> FP_BITS) / 4) as i32;
        }
    }
    out
}

pub fn zigzag_scan(block: &[i32; 64]) -> [i32; 64] {
    let mut out = [0i32; 64];
    for (i, &pos) in ZIGZAG_ORDER.iter().enumerate() {
        out[i] = block[pos as usize];
    }
    out
}

pub fn zigzag_unscan(scanned: &[i32; 64]) -> [i32; 64] {
    let mut out = [0i32; 64];
    for (i, &pos) in ZIGZAG_ORDER.iter().enumerate() {
        out[pos as usize] = scanned[i];
    }
    out
}
