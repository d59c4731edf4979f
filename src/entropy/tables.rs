//! CDF construction (spec.md §4.2), grounded on
//! `original_source/src/entropy/nyans_p/rans_tables.h`'s `CDFBuilder`.

pub const LOG2_TOTAL: u32 = 12;
pub const TOTAL: u32 = 1 << LOG2_TOTAL;
pub const LOWER_BOUND: u32 = 1 << 16;

/// A rescaled frequency table: `freq[i]` sums to [`TOTAL`], `cdf[i]` is the
/// running sum `freq[0..i]`, with `cdf[alphabet_size] == TOTAL`.
#[derive(Debug, Clone)]
pub struct CdfTable {
    pub freq: Vec<u32>,
    pub cdf: Vec<u32>,
}

impl CdfTable {
    pub fn alphabet_size(&self) -> usize {
        self.freq.len()
    }

    /// Build a [`CdfTable`] from raw symbol counts via Laplace smoothing
    /// (every symbol gets frequency >= 1) then rescale so the total is
    /// exactly [`TOTAL`]: decrement frequencies > 1 from the top while over
    /// budget, bump the single largest frequency while under budget.
    pub fn from_counts(counts: &[u64]) -> CdfTable {
        assert!(!counts.is_empty(), "alphabet must be non-empty");
        let raw_total: u64 = counts.iter().map(|&c| c.max(1)).sum();
        let mut freq: Vec<u32> = counts
            .iter()
            .map(|&c| {
                let c = c.max(1);
                let scaled = (c as u128 * TOTAL as u128 + raw_total as u128 / 2) / raw_total as u128;
                scaled.max(1) as u32
            })
            .collect();

        let mut scaled_total: i64 = freq.iter().map(|&f| f as i64).sum();
        let target = TOTAL as i64;

        while scaled_total > target {
            let mut progressed = false;
            for f in freq.iter_mut() {
                if scaled_total <= target {
                    break;
                }
                if *f > 1 {
                    *f -= 1;
                    scaled_total -= 1;
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
        while scaled_total < target {
            let (max_idx, _) = freq
                .iter()
                .enumerate()
                .max_by_key(|&(_, &f)| f)
                .expect("non-empty alphabet");
            let deficit = (target - scaled_total) as u32;
            freq[max_idx] += deficit;
            scaled_total = target;
        }

        let mut cdf = Vec::with_capacity(freq.len() + 1);
        let mut acc = 0u32;
        cdf.push(0);
        for &f in &freq {
            acc += f;
            cdf.push(acc);
        }
        debug_assert_eq!(*cdf.last().unwrap(), TOTAL);

        CdfTable { freq, cdf }
    }

    /// Build the 256-symbol byte histogram table used by `encode_byte_stream`.
    pub fn from_bytes(data: &[u8]) -> CdfTable {
        let mut counts = vec![0u64; 256];
        for &b in data {
            counts[b as usize] += 1;
        }
        CdfTable::from_counts(&counts)
    }

    /// A uniform distribution over `alphabet_size` symbols.
    pub fn uniform(alphabet_size: usize) -> CdfTable {
        CdfTable::from_counts(&vec![1u64; alphabet_size])
    }

    /// Fixed distribution for the shared-CDF LZ payload path (spec.md §4.4,
    /// #2): biased toward small byte values and the TileLZ tag bytes 0/1,
    /// so a TileLZ token stream doesn't need its own per-tile histogram.
    pub fn shared_lz() -> CdfTable {
        let mut counts = vec![4u64; 256];
        counts[0] = 4096;
        counts[1] = 2048;
        for (i, c) in counts.iter_mut().enumerate().skip(2).take(62) {
            *c = 256 / (i as u64);
        }
        CdfTable::from_counts(&counts)
    }

    /// O(1) slot→symbol lookup table for scalar/SIMD-style decode.
    pub fn build_lut(&self) -> Vec<u16> {
        let mut lut = vec![0u16; TOTAL as usize];
        for sym in 0..self.alphabet_size() {
            let lo = self.cdf[sym] as usize;
            let hi = self.cdf[sym + 1] as usize;
            for slot in lo..hi {
                lut[slot] = sym as u16;
            }
        }
        lut
    }

    pub fn symbol_for_slot_linear(&self, slot: u32) -> usize {
        for i in 0..self.alphabet_size() {
            if slot < self.cdf[i + 1] {
                return i;
            }
        }
        self.alphabet_size() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescaled_total_is_exact() {
        let counts = vec![5u64, 1, 300, 0, 17];
        let t = CdfTable::from_counts(&counts);
        assert_eq!(t.cdf.last().copied().unwrap(), TOTAL);
        assert_eq!(t.freq.iter().sum::<u32>(), TOTAL);
        for &f in &t.freq {
            assert!(f >= 1);
        }
    }

    #[test]
    fn lut_matches_linear_scan() {
        let counts: Vec<u64> = (1..=17u64).collect();
        let t = CdfTable::from_counts(&counts);
        let lut = t.build_lut();
        for slot in 0..TOTAL {
            assert_eq!(
                lut[slot as usize] as usize,
                t.symbol_for_slot_linear(slot),
                "slot {slot}"
            );
        }
    }

    #[test]
    fn uniform_distributes_evenly() {
        let t = CdfTable::uniform(4);
        assert_eq!(t.freq, vec![1024, 1024, 1024, 1024]);
    }

    #[test]
    fn byte_histogram_round_trips_alphabet_size() {
        let data = b"aaaabbbccccccccd";
        let t = CdfTable::from_bytes(data);
        assert_eq!(t.alphabet_size(), 256);
        assert_eq!(t.cdf.last().copied().unwrap(), TOTAL);
    }
}
