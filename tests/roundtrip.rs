//! End-to-end scenarios from spec.md §8 ("Concrete scenarios (seed inputs
//! for tests)"), driving the library directly (container + plane + color)
//! rather than through the CLI.

use hakonyans::color::{rgb_to_ycocg_r, ycocg_r_to_rgb};
use hakonyans::container::{self, FileHeader, QmatChunk, FLAG_LOSSLESS};
use hakonyans::plane::decoder::decode_plane;
use hakonyans::plane::encoder::encode_plane;

struct Image {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

fn encode_lossless(img: &Image) -> Vec<u8> {
    let w = img.width as usize;
    let h = img.height as usize;
    let mut y = vec![0i32; w * h];
    let mut co = vec![0i32; w * h];
    let mut cg = vec![0i32; w * h];
    for i in 0..w * h {
        let r = img.rgb[i * 3] as i32;
        let g = img.rgb[i * 3 + 1] as i32;
        let b = img.rgb[i * 3 + 2] as i32;
        let (yy, c1, c2) = rgb_to_ycocg_r(r, g, b);
        y[i] = yy;
        co[i] = c1;
        cg[i] = c2;
    }
    let y_payload = encode_plane(&y, w, h, None);
    let co_payload = encode_plane(&co, w, h, None);
    let cg_payload = encode_plane(&cg, w, h, None);

    let header = FileHeader {
        version: 1,
        flags: FLAG_LOSSLESS,
        width: img.width,
        height: img.height,
        bit_depth: 8,
        num_channels: 3,
        colorspace: 0,
        subsampling: 0,
        tile_cols: 1,
        tile_rows: 1,
        transform_type: 0,
        pindex_density: 1,
        quality: 100,
    };
    let qmat = QmatChunk {
        quality: 100,
        tables: vec![[1u16; 64]],
    };
    container::write_container(&header, &qmat, &[y_payload, co_payload, cg_payload])
}

fn decode_lossless(bytes: &[u8]) -> Image {
    let parsed = container::read_container(bytes).unwrap();
    let w = parsed.header.width as usize;
    let h = parsed.header.height as usize;
    let y = decode_plane(&parsed.tile_payloads[0], w, h).unwrap();
    let co = decode_plane(&parsed.tile_payloads[1], w, h).unwrap();
    let cg = decode_plane(&parsed.tile_payloads[2], w, h).unwrap();
    let mut rgb = vec![0u8; w * h * 3];
    for i in 0..w * h {
        let (r, g, b) = ycocg_r_to_rgb(y[i], co[i], cg[i]);
        rgb[i * 3] = r;
        rgb[i * 3 + 1] = g;
        rgb[i * 3 + 2] = b;
    }
    Image {
        width: parsed.header.width,
        height: parsed.header.height,
        rgb,
    }
}

fn assert_round_trips(img: &Image) {
    let bytes = encode_lossless(img);
    let back = decode_lossless(&bytes);
    assert_eq!(back.width, img.width);
    assert_eq!(back.height, img.height);
    assert_eq!(back.rgb, img.rgb);
}

/// Scenario A: 8x8 constant plane 0x80.
#[test]
fn scenario_a_constant_plane() {
    let img = Image {
        width: 8,
        height: 8,
        rgb: vec![0x80u8; 8 * 8 * 3],
    };
    assert_round_trips(&img);
}

/// Scenario B: 16x16 horizontal gradient img[y,x,c] = x*16.
#[test]
fn scenario_b_horizontal_gradient() {
    let width = 16u32;
    let height = 16u32;
    let mut rgb = vec![0u8; (width * height * 3) as usize];
    for y in 0..height {
        for x in 0..width {
            let v = ((x * 16) % 256) as u8;
            let i = (y * width + x) as usize;
            rgb[i * 3] = v;
            rgb[i * 3 + 1] = v;
            rgb[i * 3 + 2] = v;
        }
    }
    let img = Image { width, height, rgb };
    assert_round_trips(&img);
}

/// Scenario C: 64x64 checkerboard of two colors — expect screen-indexed
/// route (palette size 2, 1 bit/index) to win the legacy baseline.
#[test]
fn scenario_c_checkerboard_prefers_screen_route() {
    let width = 64u32;
    let height = 64u32;
    let mut rgb = vec![0u8; (width * height * 3) as usize];
    for y in 0..height {
        for x in 0..width {
            let dark = ((x / 8) + (y / 8)) % 2 == 0;
            let v = if dark { 50u8 } else { 200u8 };
            let i = (y * width + x) as usize;
            rgb[i * 3] = v;
            rgb[i * 3 + 1] = v;
            rgb[i * 3 + 2] = v;
        }
    }
    let img = Image { width, height, rgb };
    let bytes = encode_lossless(&img);
    let parsed = container::read_container(&bytes).unwrap();
    assert_eq!(
        parsed.tile_payloads[0][0],
        hakonyans::routes::screen::MAGIC,
        "flat two-color checkerboard should pick the screen-indexed route"
    );
    assert_round_trips(&img);
}

/// Scenario D: 128x128 "random" bytes (deterministic xorshift-style seed
/// so the test has no external RNG dependency) — exercises the general
/// row-filter + rANS path end to end.
#[test]
fn scenario_d_pseudo_random_plane_round_trips() {
    let width = 128u32;
    let height = 128u32;
    let mut state: u32 = 42;
    let mut next = || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        state
    };
    let mut rgb = vec![0u8; (width * height * 3) as usize];
    for px in rgb.chunks_mut(3) {
        px[0] = (next() & 0xFF) as u8;
        px[1] = (next() & 0xFF) as u8;
        px[2] = (next() & 0xFF) as u8;
    }
    let img = Image { width, height, rgb };
    assert_round_trips(&img);
}

/// Scenario E: 32x32 tile of 4x4 quadrants repeating a causal source —
/// exercises TILE_MATCH4 classification in the legacy route.
#[test]
fn scenario_e_repeating_quadrants_round_trips() {
    let width = 32u32;
    let height = 32u32;
    let w = width as usize;
    let h = height as usize;
    let mut plane = vec![0i32; w * h];
    for by in 0..h / 4 {
        for bx in 0..w / 4 {
            let src_bx = bx % 2;
            let src_by = by % 2;
            for y in 0..4 {
                for x in 0..4 {
                    let v = ((src_bx * 4 + x) + (src_by * 4 + y) * 8) as i32 % 251;
                    plane[(by * 4 + y) * w + (bx * 4 + x)] = v;
                }
            }
        }
    }
    let mut rgb = vec![0u8; w * h * 3];
    for i in 0..w * h {
        let v = (plane[i] & 0xFF) as u8;
        rgb[i * 3] = v;
        rgb[i * 3 + 1] = v;
        rgb[i * 3 + 2] = v;
    }
    let img = Image { width, height, rgb };
    assert_round_trips(&img);
}

/// Scenario F: the same image re-encoded under different worker-pool sizes
/// produces byte-identical output (spec.md Testable Property 10). We can't
/// change `RuntimeConfig::threads` (read once from env), but we can drive
/// the plane encoder directly under `rayon::ThreadPoolBuilder` pools of
/// different sizes and confirm the payload bytes match.
#[test]
fn scenario_f_output_independent_of_worker_count() {
    let width = 48usize;
    let height = 48usize;
    let plane: Vec<i32> = (0..width * height)
        .map(|i| (((i % width) * 3 + (i / width) * 7) % 256) as i32)
        .collect();

    let baseline = encode_plane(&plane, width, height, None);

    for threads in [1usize, 2, 4] {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .unwrap();
        let payload = pool.install(|| encode_plane(&plane, width, height, None));
        assert_eq!(payload, baseline, "thread count {threads} changed encoded bytes");
    }
}
