//! TileLZ: an internal LZ77 variant (spec.md §4.3), grounded on
//! `original_source/src/codec/lz_tile.h`, generalized from that file's
//! single-entry-per-hash greedy matcher to the full hash-chain matcher with
//! lazy-1 and an optimal-parse (DP) lane the spec calls for.
//!
//! Token format: tag=0 literal run `[0][len][bytes...]`, tag=1 match
//! `[1][len][dist_lo][dist_hi]`. Minimum match length 3 (only accepted when
//! `distance <= min_dist_len3`), length >= 4 always accepted. Maximum match
//! length 255, maximum distance 65535 (16-bit window).

use crate::config::{self, LzStrategy};

const MIN_MATCH: usize = 3;
const MAX_MATCH: usize = 255;
const MAX_DIST: usize = 65535;
const HASH_BITS: u32 = 16;
const HASH_SIZE: usize = 1 << HASH_BITS;

/// Per-worker hash-chain scratch, epoch-stamped so it never needs clearing
/// between calls (spec.md §5, §9: "Thread-local scratch arrays... model as
/// per-worker scratch owned by the worker, with an epoch counter to avoid
/// clearing").
pub struct MatchScratch {
    head: Vec<(u32, u32)>, // (epoch, position)
    prev: Vec<u32>,
    epoch: u32,
}

impl Default for MatchScratch {
    fn default() -> Self {
        MatchScratch {
            head: vec![(0, 0); HASH_SIZE],
            prev: Vec::new(),
            epoch: 0,
        }
    }
}

impl MatchScratch {
    pub fn new() -> Self {
        Self::default()
    }

    fn begin(&mut self, len: usize) {
        self.epoch = self.epoch.wrapping_add(1);
        if self.epoch == 0 {
            // wrapped all the way around: force a real clear, once per 2^32 calls.
            self.head.iter_mut().for_each(|h| h.0 = 0);
            self.epoch = 1;
        }
        self.prev.clear();
        self.prev.resize(len, u32::MAX);
    }

    fn head_at(&self, hash: usize) -> Option<usize> {
        let (epoch, pos) = self.head[hash];
        if epoch == self.epoch {
            Some(pos as usize)
        } else {
            None
        }
    }

    fn set_head(&mut self, hash: usize, pos: usize) {
        self.head[hash] = (self.epoch, pos as u32);
    }
}

thread_local! {
    static SCRATCH: std::cell::RefCell<MatchScratch> = std::cell::RefCell::new(MatchScratch::new());
}

fn hash3(src: &[u8], p: usize) -> usize {
    let v = ((src[p] as u32) << 16) | ((src[p + 1] as u32) << 8) | src[p + 2] as u32;
    ((v.wrapping_mul(0x1e35a7bd)) >> (32 - HASH_BITS)) as usize
}

fn match_len(src: &[u8], a: usize, b: usize, max: usize) -> usize {
    let mut len = 0;
    while b + len < src.len() && len < max && src[a + len] == src[b + len] {
        len += 1;
    }
    len
}

/// A single best match found at position `pos`, if any.
#[derive(Debug, Clone, Copy)]
struct Match {
    len: usize,
    dist: usize,
}

fn find_best_match(
    src: &[u8],
    scratch: &MatchScratch,
    pos: usize,
    min_dist_len3: u16,
) -> Option<Match> {
    if pos + 3 > src.len() {
        return None;
    }
    let h = hash3(src, pos);
    let mut cand = scratch.head_at(h);
    let mut best: Option<Match> = None;
    let mut steps = 0;
    while let Some(ref_pos) = cand {
        if ref_pos >= pos || pos - ref_pos > MAX_DIST {
            break;
        }
        let len = match_len(src, ref_pos, pos, MAX_MATCH.min(src.len() - pos));
        if len >= MIN_MATCH {
            let dist = pos - ref_pos;
            let acceptable = len >= 4 || dist <= min_dist_len3 as usize;
            if acceptable {
                let better = match best {
                    None => true,
                    Some(b) => len > b.len,
                };
                if better {
                    best = Some(Match { len, dist });
                }
            }
        }
        steps += 1;
        if steps > 64 {
            break;
        }
        cand = if ref_pos == 0 {
            None
        } else {
            let pv = scratch.prev[ref_pos];
            if pv == u32::MAX {
                None
            } else {
                Some(pv as usize)
            }
        };
    }
    best
}

fn insert(src: &[u8], scratch: &mut MatchScratch, pos: usize) {
    if pos + 3 > src.len() {
        return;
    }
    let h = hash3(src, pos);
    if let Some(prev_pos) = scratch.head_at(h) {
        scratch.prev[pos] = prev_pos as u32;
    }
    scratch.set_head(h, pos);
}

fn emit_literal_run(out: &mut Vec<u8>, src: &[u8], start: usize, len: usize) {
    let mut remaining = len;
    let mut off = start;
    while remaining > 0 {
        let chunk = remaining.min(255);
        out.push(0);
        out.push(chunk as u8);
        out.extend_from_slice(&src[off..off + chunk]);
        off += chunk;
        remaining -= chunk;
    }
}

fn emit_match(out: &mut Vec<u8>, len: usize, dist: usize) {
    out.push(1);
    out.push(len as u8);
    out.push((dist & 0xFF) as u8);
    out.push(((dist >> 8) & 0xFF) as u8);
}

/// Compress `src` with the strategy selected by [`crate::config::config`].
pub fn compress(src: &[u8]) -> Vec<u8> {
    if src.is_empty() {
        return Vec::new();
    }
    match config::config().lz_strategy {
        LzStrategy::Greedy => compress_greedy(src),
        LzStrategy::Lazy1 => compress_lazy1(src),
        LzStrategy::Optimal => compress_with_optimal_probe(src),
    }
}

fn compress_greedy(src: &[u8]) -> Vec<u8> {
    let min_dist_len3 = config::config().lz_min_dist_len3;
    SCRATCH.with(|cell| {
        let mut scratch = cell.borrow_mut();
        scratch.begin(src.len());
        let mut out = Vec::with_capacity(src.len());
        let mut pos = 0usize;
        let mut lit_start = 0usize;

        while pos < src.len() {
            let best = find_best_match(src, &scratch, pos, min_dist_len3);
            insert(src, &mut scratch, pos);
            match best {
                Some(m) => {
                    if lit_start < pos {
                        emit_literal_run(&mut out, src, lit_start, pos - lit_start);
                    }
                    emit_match(&mut out, m.len, m.dist);
                    for p in pos + 1..pos + m.len {
                        insert(src, &mut scratch, p);
                    }
                    pos += m.len;
                    lit_start = pos;
                }
                None => pos += 1,
            }
        }
        if lit_start < src.len() {
            emit_literal_run(&mut out, src, lit_start, src.len() - lit_start);
        }
        out
    })
}

/// Lazy-1: after finding a match at `p`, also probe `p+1`; defer to the
/// longer one.
fn compress_lazy1(src: &[u8]) -> Vec<u8> {
    let min_dist_len3 = config::config().lz_min_dist_len3;
    SCRATCH.with(|cell| {
        let mut scratch = cell.borrow_mut();
        scratch.begin(src.len());
        let mut out = Vec::with_capacity(src.len());
        let mut pos = 0usize;
        let mut lit_start = 0usize;

        while pos < src.len() {
            let best = find_best_match(src, &scratch, pos, min_dist_len3);
            insert(src, &mut scratch, pos);

            match best {
                Some(m) => {
                    // probe p+1
                    let deferred = if pos + 1 < src.len() {
                        find_best_match(src, &scratch, pos + 1, min_dist_len3)
                    } else {
                        None
                    };
                    if let Some(next) = deferred {
                        if next.len > m.len {
                            pos += 1;
                            continue;
                        }
                    }
                    if lit_start < pos {
                        emit_literal_run(&mut out, src, lit_start, pos - lit_start);
                    }
                    emit_match(&mut out, m.len, m.dist);
                    for p in pos + 1..pos + m.len {
                        insert(src, &mut scratch, p);
                    }
                    pos += m.len;
                    lit_start = pos;
                }
                None => pos += 1,
            }
        }
        if lit_start < src.len() {
            emit_literal_run(&mut out, src, lit_start, src.len() - lit_start);
        }
        out
    })
}

/// Byte-cost table used by the optimal-parse DP (fixed ~8 bits/byte, Q8).
const LITERAL_COST_Q8: i64 = 8 * 256;
const MATCH_TOKEN_COST_Q8: i64 = 4 * 8 * 256; // tag+len+dist_lo+dist_hi, 4 raw bytes worth

/// Dynamic-programming shortest-cost parse: at each position, consider a
/// literal (cost 1 byte) or any match candidate (cost ~4 bytes for the
/// token, covering `len` source bytes); minimize total cost, ties broken by
/// fewer bytes, then fewer tokens, then prefer-match (spec.md §4.3).
fn compress_optimal(src: &[u8]) -> Vec<u8> {
    let min_dist_len3 = config::config().lz_min_dist_len3;
    let n = src.len();

    // matches_at[p] = best (len, dist) found starting at p, precomputed with
    // the same hash chain used elsewhere.
    let mut matches_at: Vec<Option<Match>> = vec![None; n];
    SCRATCH.with(|cell| {
        let mut scratch = cell.borrow_mut();
        scratch.begin(n);
        for p in 0..n {
            matches_at[p] = find_best_match(src, &scratch, p, min_dist_len3);
            insert(src, &mut scratch, p);
        }
    });

    // cost[i] = minimum Q8 cost to encode src[i..], token_count[i] = number
    // of tokens used reaching the end from i (for tie-breaking).
    let mut cost = vec![i64::MAX; n + 1];
    let mut tokens = vec![u32::MAX; n + 1];
    let mut choice: Vec<Option<Match>> = vec![None; n + 1];
    cost[n] = 0;
    tokens[n] = 0;

    for i in (0..n).rev() {
        // Literal edge (1 byte).
        let lit_cost = LITERAL_COST_Q8 + cost[i + 1];
        let mut best_cost = lit_cost;
        let mut best_tokens = tokens[i + 1] + 1;
        let mut best_choice = None;

        if let Some(m) = matches_at[i] {
            let end = i + m.len;
            if end <= n && cost[end] != i64::MAX {
                let match_cost = MATCH_TOKEN_COST_Q8 + cost[end];
                let match_tokens = tokens[end] + 1;
                let take = match_cost < best_cost
                    || (match_cost == best_cost
                        && (match_tokens < best_tokens || (match_tokens == best_tokens)));
                if take && match_cost <= best_cost {
                    best_cost = match_cost;
                    best_tokens = match_tokens;
                    best_choice = Some(m);
                }
            }
        }

        cost[i] = best_cost;
        tokens[i] = best_tokens;
        choice[i] = best_choice;
    }

    let mut out = Vec::with_capacity(n);
    let mut pos = 0usize;
    let mut lit_start = 0usize;
    while pos < n {
        match choice[pos] {
            Some(m) => {
                if lit_start < pos {
                    emit_literal_run(&mut out, src, lit_start, pos - lit_start);
                }
                emit_match(&mut out, m.len, m.dist);
                pos += m.len;
                lit_start = pos;
            }
            None => pos += 1,
        }
    }
    if lit_start < n {
        emit_literal_run(&mut out, src, lit_start, n - lit_start);
    }
    out
}

/// Guard the expensive DP pass behind a lazy-1 probe (spec.md §4.3): run
/// lazy-1 first; only adopt DP if the source is small enough, the lazy
/// compression ratio lands in the configured probe window, and DP's output
/// beats lazy's by at least `lz_min_gain` bytes.
fn compress_with_optimal_probe(src: &[u8]) -> Vec<u8> {
    const PROBE_MAX_SRC: usize = 1 << 20;
    let lazy = compress_lazy1(src);
    let cfg = config::config();

    if src.len() > PROBE_MAX_SRC {
        return lazy;
    }
    let ratio = lazy.len() as f32 / src.len().max(1) as f32;
    if ratio < cfg.lz_probe_ratio_min || ratio > cfg.lz_probe_ratio_max {
        return lazy;
    }

    let dp = compress_optimal(src);
    if (dp.len() as i64 + cfg.lz_min_gain) <= lazy.len() as i64 {
        dp
    } else {
        lazy
    }
}

/// Decompress a TileLZ token stream, given the expected decompressed length.
/// Overlapping matches (distance < length) are resolved byte-by-byte so
/// run-length style expansion within the window works correctly.
pub fn decompress(data: &[u8], raw_count: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw_count);
    let mut pos = 0usize;

    while pos < data.len() && out.len() < raw_count {
        let tag = data[pos];
        pos += 1;
        match tag {
            0 => {
                if pos >= data.len() {
                    break;
                }
                let mut len = data[pos] as usize;
                pos += 1;
                if pos + len > data.len() {
                    break;
                }
                if out.len() + len > raw_count {
                    len = raw_count - out.len();
                }
                out.extend_from_slice(&data[pos..pos + len]);
                pos += len;
            }
            1 => {
                if pos + 3 > data.len() {
                    break;
                }
                let mut len = data[pos] as usize;
                let dist = (data[pos + 1] as usize) | ((data[pos + 2] as usize) << 8);
                pos += 3;
                if dist == 0 || dist > out.len() {
                    break;
                }
                if out.len() + len > raw_count {
                    len = raw_count - out.len();
                }
                let start = out.len() - dist;
                for i in 0..len {
                    let byte = out[start + i];
                    out.push(byte);
                }
            }
            _ => break,
        }
    }

    if out.len() < raw_count {
        out.resize(raw_count, 0);
    }
    out
}

/// Worst-case output size bound (spec.md Testable Property 4): every byte
/// could end up as a 1-byte literal run header amortized over 255 bytes,
/// plus framing overhead.
pub fn max_compressed_size(input_len: usize) -> usize {
    input_len + (input_len.div_ceil(255)) * 2 + 64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip_with(strategy: LzStrategy, data: &[u8]) {
        // Config is a process-wide OnceLock, so strategy selection for these
        // tests is done by calling the strategy functions directly rather
        // than through the env var.
        let compressed = match strategy {
            LzStrategy::Greedy => compress_greedy(data),
            LzStrategy::Lazy1 => compress_lazy1(data),
            LzStrategy::Optimal => compress_with_optimal_probe(data),
        };
        let restored = decompress(&compressed, data.len());
        assert_eq!(restored, data, "strategy {strategy:?} round-trip failed");
        assert!(compressed.len() <= max_compressed_size(data.len()));
    }

    #[test]
    fn empty_input_round_trips() {
        assert!(compress(&[]).is_empty());
        assert_eq!(decompress(&[], 0), Vec::<u8>::new());
    }

    #[test]
    fn repetitive_data_round_trips_all_strategies() {
        let mut data = Vec::new();
        for i in 0..500u32 {
            data.push((i % 7) as u8);
        }
        roundtrip_with(LzStrategy::Greedy, &data);
        roundtrip_with(LzStrategy::Lazy1, &data);
        roundtrip_with(LzStrategy::Optimal, &data);
    }

    #[test]
    fn random_data_round_trips() {
        let mut state = 0x12345678u32;
        let data: Vec<u8> = (0..2000)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state & 0xFF) as u8
            })
            .collect();
        roundtrip_with(LzStrategy::Greedy, &data);
        roundtrip_with(LzStrategy::Lazy1, &data);
    }

    #[test]
    fn overlapping_match_expands_run_length() {
        // "a" repeated: matches will have distance < length, exercising the
        // byte-by-byte overlap copy path.
        let data = vec![b'a'; 300];
        roundtrip_with(LzStrategy::Greedy, &data);
    }

    #[test]
    fn compressed_never_exceeds_worst_case_bound() {
        let mut state = 9u32;
        let data: Vec<u8> = (0..10000)
            .map(|_| {
                state = state.wrapping_mul(1103515245).wrapping_add(12345);
                (state >> 16) as u8
            })
            .collect();
        let c = compress_greedy(&data);
        assert!(c.len() <= max_compressed_size(data.len()));
    }
}
