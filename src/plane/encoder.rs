//! Plane encoder: profile classification then three-way route competition
//! (spec.md §4.9), grounded on `original_source/src/codec/lossless_plane.h`'s
//! `encode_plane_lossless`.

use super::{classify_profile, pad_edge_replicate, padded_dims, screen_gate_permille};
use crate::legacy;
use crate::routes::{natural, screen};
use crate::stats::{self, Route, Stats};

/// Encode one logical `width x height` int16-valued plane (already
/// color-transformed where applicable) into its smallest competing tile
/// payload.
pub fn encode_plane(plane: &[i32], width: usize, height: usize, stats: Option<&mut Stats>) -> Vec<u8> {
    let (pad_w, pad_h) = padded_dims(width, height);
    let padded = pad_edge_replicate(plane, width, height, pad_w, pad_h);
    let profile_id = classify_profile(&padded, pad_w, pad_h);

    let legacy_payload = legacy::encode_tile(&padded, pad_w, pad_h, profile_id);
    let mut best = legacy_payload;
    let mut route = Route::Legacy;

    if padded.len() >= 4096 {
        if let Ok(screen_payload) = screen::encode(&padded, pad_w, pad_h) {
            let gate = screen_gate_permille(profile_id);
            if (screen_payload.len() as f64) <= (best.len() as f64) * gate
                && screen_payload.len() < best.len()
            {
                best = screen_payload;
                route = Route::Screen;
            }
        }

        let natural_payload = natural::encode(&padded, pad_w, pad_h);
        if natural_payload.len() < best.len() {
            best = natural_payload;
            route = Route::Natural;
        }
    }

    stats::maybe(stats, |s| s.record_route(route));
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_constant_plane_uses_legacy_only() {
        let width = 8;
        let height = 8;
        let plane = vec![0x80i32; width * height];
        let payload = encode_plane(&plane, width, height, None);
        assert!(payload[0] != screen::MAGIC && payload[0] != natural::MAGIC);
    }

    #[test]
    fn low_color_large_plane_prefers_screen_or_natural() {
        let width = 80;
        let height = 80;
        let plane: Vec<i32> = (0..width * height).map(|i| (i % 3) as i32 * 40).collect();
        let mut stats = Stats::new();
        let _payload = encode_plane(&plane, width, height, Some(&mut stats));
        assert_eq!(
            stats.routes_chosen.legacy + stats.routes_chosen.screen + stats.routes_chosen.natural,
            1
        );
    }
}
