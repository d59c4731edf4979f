//! Quantization peripherals for the lossy pipeline (spec.md §4.11):
//! JPEG Annex-K base luma table scaled by quality, adaptive per-block scale,
//! and CfL parameter solving. These are interfaces only, per spec.md §1's
//! framing of the lossy pipeline as a peripheral collaborator of the
//! lossless core — grounded on `original_source/src/codec/quant_tables.h`
//! and `cfl.h`.

pub const BASE_LUMA_QUANT: [u16; 64] = [
    16, 11, 10, 16, 24, 40, 51, 61, 12, 12, 14, 19, 26, 58, 60, 55, 14, 13, 16, 24, 40, 57, 69, 56,
    14, 17, 22, 29, 51, 87, 80, 62, 18, 22, 37, 56, 68, 109, 103, 77, 24, 35, 55, 64, 81, 104, 113,
    92, 49, 64, 78, 87, 103, 121, 120, 101, 72, 92, 95, 98, 112, 100, 103, 99,
];

/// Scale the base table by `quality` (1..=100) using the JPEG Annex-K rule.
pub fn quant_table_for_quality(quality: u8) -> [u16; 64] {
    let q = quality.clamp(1, 100) as u32;
    let scale = if q < 50 { 5000 / q } else { 200 - 2 * q };
    let mut out = [0u16; 64];
    for (i, &base) in BASE_LUMA_QUANT.iter().enumerate() {
        let v = (base as u32 * scale + 50) / 100;
        out[i] = v.clamp(1, 255) as u16;
    }
    out
}

/// Adaptive per-block quantization scale: blocks with AC activity well above
/// the plane average get a gentler (smaller) multiplier so detail survives;
/// flat blocks get coarser quantization.
pub fn adaptive_quant_scale(block_activity: f32, plane_avg_activity: f32, mask_strength: f32) -> f32 {
    if plane_avg_activity <= 0.0 {
        return 1.0;
    }
    (block_activity / plane_avg_activity).powf(-mask_strength).clamp(0.5, 2.0)
}

/// Chroma-from-luma linear model: solves `chroma ≈ alpha * luma_ac + beta`
/// in Q6 fixed point, enabled only when it measurably improves reconstruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CflParams {
    pub alpha_q6: i32,
    pub beta: i32,
    pub enabled: bool,
}

impl CflParams {
    /// Least-squares fit of `chroma` against `luma_ac` over a block, enabled
    /// only if it drops the reconstruction MSE by at least `threshold`.
    pub fn solve(luma_ac: &[i32], chroma: &[i32], mse_without: f64, threshold: f64) -> CflParams {
        assert_eq!(luma_ac.len(), chroma.len());
        let n = luma_ac.len() as f64;
        if n == 0.0 {
            return CflParams { alpha_q6: 0, beta: 0, enabled: false };
        }
        let mean_l: f64 = luma_ac.iter().map(|&v| v as f64).sum::<f64>() / n;
        let mean_c: f64 = chroma.iter().map(|&v| v as f64).sum::<f64>() / n;
        let mut cov = 0.0;
        let mut var = 0.0;
        for (&l, &c) in luma_ac.iter().zip(chroma) {
            let dl = l as f64 - mean_l;
            cov += dl * (c as f64 - mean_c);
            var += dl * dl;
        }
        let alpha = if var > 0.0 { cov / var } else { 0.0 };
        let beta = mean_c - alpha * mean_l;

        let mse_with: f64 = luma_ac
            .iter()
            .zip(chroma)
            .map(|(&l, &c)| {
                let pred = alpha * l as f64 + beta;
                (c as f64 - pred).powi(2)
            })
            .sum::<f64>()
            / n;

        let enabled = mse_without - mse_with >= threshold;
        CflParams {
            alpha_q6: (alpha * 64.0).round() as i32,
            beta: beta.round() as i32,
            enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quant_table_scales_down_as_quality_rises() {
        let low = quant_table_for_quality(10);
        let high = quant_table_for_quality(90);
        assert!(low[0] > high[0]);
    }

    #[test]
    fn adaptive_scale_is_identity_at_average_activity() {
        let s = adaptive_quant_scale(10.0, 10.0, 0.5);
        assert!((s - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cfl_disabled_when_no_correlation() {
        let luma = vec![1, 1, 1, 1];
        let chroma = vec![5, -3, 8, -9];
        let params = CflParams::solve(&luma, &chroma, 10.0, 1.0);
        assert!(!params.enabled || params.alpha_q6 == 0);
    }

    #[test]
    fn cfl_enabled_for_perfect_linear_relationship() {
        let luma = vec![0, 2, 4, 6, 8];
        let chroma = vec![1, 5, 9, 13, 17]; // chroma = 2*luma + 1
        let params = CflParams::solve(&luma, &chroma, 100.0, 1.0);
        assert!(params.enabled);
        assert_eq!(params.alpha_q6, 128); // alpha=2.0 -> Q6 128
    }
}
