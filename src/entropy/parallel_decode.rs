//! Parallel decode over a P-Index (spec.md §4.2, §5), grounded on
//! `original_source/src/entropy/nyans_p/parallel_decode.h`. Checkpoints are
//! split evenly across rayon worker threads; each worker decodes its token
//! range independently, writing into disjoint slices of a pre-sized output
//! — data-race-free without locking (spec.md §5).

use super::rans::{FlatInterleavedDecoder, LANES};
use super::tables::CdfTable;
use super::pindex::PIndex;

fn decode_segment(
    encoded: &[u8],
    checkpoint: &super::pindex::Checkpoint,
    num_tokens: u32,
    cdf: &CdfTable,
    out: &mut [usize],
) {
    let mut dec = FlatInterleavedDecoder::from_checkpoint(
        encoded,
        checkpoint.states,
        checkpoint.byte_offset,
        (checkpoint.token_index % LANES as u32) as usize,
    );
    for slot in out.iter_mut().take(num_tokens as usize) {
        *slot = dec.decode_symbol(cdf);
    }
}

/// Decode the full symbol sequence using up to `num_threads` workers, one
/// per contiguous run of checkpoints. Output order is always raster/logical
/// order regardless of how many threads were used (spec.md §5, Testable
/// Property 10).
pub fn decode_parallel(encoded: &[u8], pindex: &PIndex, cdf: &CdfTable, num_threads: usize) -> Vec<usize> {
    let mut output = vec![0usize; pindex.total_tokens as usize];
    let num_checkpoints = pindex.checkpoints.len();

    if num_checkpoints <= 1 || num_threads <= 1 {
        if let Some(first) = pindex.checkpoints.first() {
            decode_segment(encoded, first, pindex.total_tokens, cdf, &mut output);
        }
        return output;
    }

    let segments = num_threads.min(num_checkpoints);
    let cp_per_thread = num_checkpoints / segments;

    // Build (start_token, end_token, checkpoint) ranges up front so we can
    // hand out disjoint `&mut [usize]` slices to rayon without a lock.
    let mut ranges: Vec<(usize, usize, usize)> = Vec::with_capacity(segments);
    for t in 0..segments {
        let cp_start = t * cp_per_thread;
        let cp_end = if t == segments - 1 {
            num_checkpoints
        } else {
            (t + 1) * cp_per_thread
        };
        let token_start = pindex.checkpoints[cp_start].token_index as usize;
        let token_end = if cp_end < num_checkpoints {
            pindex.checkpoints[cp_end].token_index as usize
        } else {
            pindex.total_tokens as usize
        };
        ranges.push((cp_start, token_start, token_end));
    }

    crate::threadpool::run_parallel_region(|| {
        crate::threadpool::pool().install(|| {
            use rayon::prelude::*;

            // Ranges are contiguous and in increasing token order (each
            // segment's end is the next segment's start), so a left-to-right
            // split_at_mut chain yields disjoint slices covering `output`.
            let mut remaining = &mut output[..];
            let mut slices: Vec<(&super::pindex::Checkpoint, usize, &mut [usize])> =
                Vec::with_capacity(ranges.len());
            for &(cp_idx, token_start, token_end) in &ranges {
                let len = token_end - token_start;
                let (head, tail) = remaining.split_at_mut(len);
                remaining = tail;
                slices.push((&pindex.checkpoints[cp_idx], len, head));
                let _ = token_start;
            }

            slices.into_par_iter().for_each(|(cp, len, out_slice)| {
                decode_segment(encoded, cp, len as u32, cdf, out_slice);
            });
        });
    });

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::rans::FlatInterleavedEncoder;

    #[test]
    fn parallel_decode_matches_serial_for_various_thread_counts() {
        let cdf = CdfTable::from_counts(&[40, 900, 3, 57, 1]);
        let symbols: Vec<usize> = (0..20000).map(|i| (i * 17 + 3) % 5).collect();
        let enc = FlatInterleavedEncoder::encode(&cdf, &symbols);
        let pindex = PIndex::build(&enc, &cdf, symbols.len() as u32, 512);

        let serial = decode_parallel(&enc, &pindex, &cdf, 1);
        assert_eq!(serial, symbols);

        for k in [1, 2, 4, 8, 16] {
            let got = decode_parallel(&enc, &pindex, &cdf, k);
            assert_eq!(got, symbols, "mismatch at k={k}");
        }
    }
}
