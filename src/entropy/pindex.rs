//! P-Index: checkpoint list over a flat-interleaved rANS stream enabling
//! parallel decode (spec.md §4.2, §5), grounded on
//! `original_source/src/entropy/nyans_p/pindex.h`.

use super::rans::{FlatInterleavedDecoder, LANES};
use super::tables::CdfTable;

#[derive(Debug, Clone, Copy)]
pub struct Checkpoint {
    pub byte_offset: u32,
    pub token_index: u32,
    pub states: [u32; LANES],
}

#[derive(Debug, Clone)]
pub struct PIndex {
    pub checkpoints: Vec<Checkpoint>,
    pub total_tokens: u32,
    pub total_bytes: u32,
}

impl PIndex {
    /// Replay the decode once, recording a checkpoint every `interval`
    /// tokens (rounded up to a multiple of 8, clamped to [64, 4096] per
    /// spec.md's data model). The first checkpoint is always `{0, 0,
    /// initial lane states}`.
    pub fn build(encoded: &[u8], cdf: &CdfTable, total_tokens: u32, interval: u32) -> PIndex {
        let interval = (((interval.max(1) + 7) / 8) * 8).clamp(64, 4096);

        let mut dec = FlatInterleavedDecoder::new(encoded);
        let mut checkpoints = vec![Checkpoint {
            byte_offset: 0,
            token_index: 0,
            states: dec.states(),
        }];

        let mut token_pos = 0u32;
        while token_pos < total_tokens {
            let batch_end = (token_pos + interval).min(total_tokens);
            while token_pos < batch_end {
                dec.decode_symbol(cdf);
                token_pos += 1;
            }
            if token_pos < total_tokens {
                checkpoints.push(Checkpoint {
                    byte_offset: dec.byte_pos() as u32,
                    token_index: token_pos,
                    states: dec.states(),
                });
            }
        }

        PIndex {
            checkpoints,
            total_tokens,
            total_bytes: encoded.len() as u32,
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(12 + self.checkpoints.len() * 40);
        out.extend_from_slice(&self.total_tokens.to_le_bytes());
        out.extend_from_slice(&self.total_bytes.to_le_bytes());
        out.extend_from_slice(&(self.checkpoints.len() as u32).to_le_bytes());
        for cp in &self.checkpoints {
            out.extend_from_slice(&cp.byte_offset.to_le_bytes());
            out.extend_from_slice(&cp.token_index.to_le_bytes());
            for s in cp.states {
                out.extend_from_slice(&s.to_le_bytes());
            }
        }
        out
    }

    pub fn deserialize(data: &[u8]) -> Option<PIndex> {
        if data.len() < 12 {
            return None;
        }
        let total_tokens = u32::from_le_bytes(data[0..4].try_into().ok()?);
        let total_bytes = u32::from_le_bytes(data[4..8].try_into().ok()?);
        let num_cp = u32::from_le_bytes(data[8..12].try_into().ok()?) as usize;

        let mut pos = 12usize;
        let mut checkpoints = Vec::with_capacity(num_cp);
        for _ in 0..num_cp {
            if pos + 8 + 32 > data.len() {
                return None;
            }
            let byte_offset = u32::from_le_bytes(data[pos..pos + 4].try_into().ok()?);
            let token_index = u32::from_le_bytes(data[pos + 4..pos + 8].try_into().ok()?);
            pos += 8;
            let mut states = [0u32; LANES];
            for s in states.iter_mut() {
                *s = u32::from_le_bytes(data[pos..pos + 4].try_into().ok()?);
                pos += 4;
            }
            checkpoints.push(Checkpoint {
                byte_offset,
                token_index,
                states,
            });
        }

        Some(PIndex {
            checkpoints,
            total_tokens,
            total_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::rans::FlatInterleavedEncoder;

    #[test]
    fn checkpoints_advance_by_declared_interval() {
        let cdf = CdfTable::from_counts(&[50, 30, 900, 4, 16]);
        let symbols: Vec<usize> = (0..5000).map(|i| (i * 3 + 1) % 5).collect();
        let enc = FlatInterleavedEncoder::encode(&cdf, &symbols);
        let pindex = PIndex::build(&enc, &cdf, symbols.len() as u32, 256);

        assert_eq!(pindex.checkpoints[0].byte_offset, 0);
        assert_eq!(pindex.checkpoints[0].token_index, 0);
        for w in pindex.checkpoints.windows(2) {
            let delta = w[1].token_index - w[0].token_index;
            assert_eq!(delta, 256);
        }
        if let Some(last) = pindex.checkpoints.last() {
            assert!(symbols.len() as u32 - last.token_index <= 256);
        }
    }

    #[test]
    fn serialize_round_trips() {
        let cdf = CdfTable::from_counts(&[1, 1, 1, 1]);
        let symbols: Vec<usize> = (0..300).map(|i| i % 4).collect();
        let enc = FlatInterleavedEncoder::encode(&cdf, &symbols);
        let pindex = PIndex::build(&enc, &cdf, symbols.len() as u32, 64);
        let bytes = pindex.serialize();
        let back = PIndex::deserialize(&bytes).expect("deserialize");
        assert_eq!(back.total_tokens, pindex.total_tokens);
        assert_eq!(back.checkpoints.len(), pindex.checkpoints.len());
        for (a, b) in pindex.checkpoints.iter().zip(back.checkpoints.iter()) {
            assert_eq!(a.byte_offset, b.byte_offset);
            assert_eq!(a.token_index, b.token_index);
            assert_eq!(a.states, b.states);
        }
    }
}
