//! Color transforms (spec.md §4.11, peripheral): the reversible YCoCg-R used
//! by the lossless path, and the lossy integer YCbCr approximation, grounded
//! on `original_source/src/codec/color_transform.h`.

/// Exact, integer-reversible RGB -> YCoCg-R.
pub fn rgb_to_ycocg_r(r: i32, g: i32, b: i32) -> (i32, i32, i32) {
    let co = r - b;
    let t = b + (co >> 1);
    let cg = g - t;
    let y = t + (cg >> 1);
    (y, co, cg)
}

/// Exact inverse of [`rgb_to_ycocg_r`]; output clamped to `0..=255` only here,
/// at the RGB boundary.
pub fn ycocg_r_to_rgb(y: i32, co: i32, cg: i32) -> (u8, u8, u8) {
    let t = y - (cg >> 1);
    let g = cg + t;
    let b = t - (co >> 1);
    let r = b + co;
    (
        r.clamp(0, 255) as u8,
        g.clamp(0, 255) as u8,
        b.clamp(0, 255) as u8,
    )
}

/// Lossy integer YCbCr approximation with standard JPEG coefficients
/// (fixed-point, 8-bit shift).
pub fn rgb_to_ycbcr(r: i32, g: i32, b: i32) -> (i32, i32, i32) {
    let y = (77 * r + 150 * g + 29 * b) >> 8;
    let cb = ((-43 * r - 85 * g + 128 * b) >> 8) + 128;
    let cr = ((128 * r - 107 * g - 21 * b) >> 8) + 128;
    (y, cb, cr)
}

pub fn ycbcr_to_rgb(y: i32, cb: i32, cr: i32) -> (u8, u8, u8) {
    let cb = cb - 128;
    let cr = cr - 128;
    let r = y + ((91881 * cr) >> 16);
    let g = y - ((22554 * cb + 46802 * cr) >> 16);
    let b = y + ((116130 * cb) >> 16);
    (
        r.clamp(0, 255) as u8,
        g.clamp(0, 255) as u8,
        b.clamp(0, 255) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ycocg_r_round_trips_full_color_range() {
        for r in (0..=255).step_by(17) {
            for g in (0..=255).step_by(23) {
                for b in (0..=255).step_by(31) {
                    let (y, co, cg) = rgb_to_ycocg_r(r, g, b);
                    let (rr, gg, bb) = ycocg_r_to_rgb(y, co, cg);
                    assert_eq!((rr, gg, bb), (r as u8, g as u8, b as u8));
                }
            }
        }
    }

    #[test]
    fn ycbcr_round_trips_approximately() {
        for &(r, g, b) in &[(0, 0, 0), (255, 255, 255), (128, 64, 200), (10, 240, 30)] {
            let (y, cb, cr) = rgb_to_ycbcr(r, g, b);
            let (rr, gg, bb) = ycbcr_to_rgb(y, cb, cr);
            assert!((rr as i32 - r).abs() <= 2, "r drift: {r} -> {rr}");
            assert!((gg as i32 - g).abs() <= 2, "g drift: {g} -> {gg}");
            assert!((bb as i32 - b).abs() <= 2, "b drift: {b} -> {bb}");
        }
    }
}
