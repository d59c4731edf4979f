//! PNG-style + extended row filters over `i16` plane values (spec.md §4.5),
//! grounded on `original_source/src/codec/lossless_filter.h`'s
//! `LosslessFilter`. Each row picks the predictor minimizing the sum of
//! absolute residuals; the choice is stored as a leading per-row byte.
//!
//! Rows are addressed by index rather than by geometric column: `left`/
//! `up`/`up-left` look at `row[x-1]`/`prev_row[x]`/`prev_row[x-1]`, falling
//! back to 0 off either edge. This lets the legacy tiled route filter only
//! the Dct-classified columns of a block-row as one ragged packed row per
//! raster line, sharing the same predictor competition a full rectangular
//! plane uses.

pub const FILTER_NONE: u8 = 0;
pub const FILTER_SUB: u8 = 1;
pub const FILTER_UP: u8 = 2;
pub const FILTER_AVERAGE: u8 = 3;
pub const FILTER_PAETH: u8 = 4;
pub const FILTER_MED: u8 = 5;
pub const FILTER_WEIGHTED_A: u8 = 6;
pub const FILTER_WEIGHTED_B: u8 = 7;
pub const FILTER_COUNT: usize = 8;

pub(crate) fn paeth_predictor(a: i32, b: i32, c: i32) -> i32 {
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

pub(crate) fn med_predictor(a: i32, b: i32, c: i32) -> i32 {
    if c >= a.max(b) {
        a.min(b)
    } else if c <= a.min(b) {
        a.max(b)
    } else {
        a + b - c
    }
}

pub(crate) fn predict(ftype: u8, a: i32, b: i32, c: i32) -> i32 {
    match ftype {
        FILTER_NONE => 0,
        FILTER_SUB => a,
        FILTER_UP => b,
        FILTER_AVERAGE => (a + b).div_euclid(2),
        FILTER_PAETH => paeth_predictor(a, b, c),
        FILTER_MED => med_predictor(a, b, c),
        FILTER_WEIGHTED_A => (a * 3 + b).div_euclid(4),
        FILTER_WEIGHTED_B => (a + b * 3).div_euclid(4),
        _ => 0,
    }
}

/// Filter each row of `rows` independently, choosing per row whichever
/// predictor id in `0..=max_filter_id` minimizes the sum of absolute
/// residuals. `rows[y].len()` may vary from row to row (a zero-length row
/// contributes no residuals and acts as an all-zero neighbor for row
/// `y + 1`). Returns one filter id per row plus the flattened residual
/// stream in the same row-major, left-to-right order as the input.
pub fn filter_rows(rows: &[Vec<i32>], max_filter_id: u8) -> (Vec<u8>, Vec<i32>) {
    let mut filter_ids = vec![0u8; rows.len()];
    let mut residuals = Vec::new();

    for (y, row) in rows.iter().enumerate() {
        if row.is_empty() {
            continue;
        }
        let prev_row = if y > 0 { Some(&rows[y - 1]) } else { None };

        let mut best_fid = 0u8;
        let mut best_sum = i64::MAX;
        let mut best_res = vec![0i32; row.len()];
        for f in 0..=max_filter_id {
            let mut res = vec![0i32; row.len()];
            let mut sum = 0i64;
            for x in 0..row.len() {
                let a = if x > 0 { row[x - 1] } else { 0 };
                let b = prev_row.and_then(|p| p.get(x)).copied().unwrap_or(0);
                let c = if x > 0 {
                    prev_row.and_then(|p| p.get(x - 1)).copied().unwrap_or(0)
                } else {
                    0
                };
                let v = row[x] - predict(f, a, b, c);
                res[x] = v;
                sum += v.unsigned_abs() as i64;
            }
            if sum < best_sum {
                best_sum = sum;
                best_fid = f;
                best_res = res;
            }
        }

        filter_ids[y] = best_fid;
        residuals.extend_from_slice(&best_res);
    }

    (filter_ids, residuals)
}

/// Reconstruct ragged rows (lengths `row_lens`) from `filter_ids` and the
/// flattened residual stream produced by [`filter_rows`].
pub fn unfilter_rows(filter_ids: &[u8], flat_residuals: &[i32], row_lens: &[usize]) -> Vec<Vec<i32>> {
    let mut rows: Vec<Vec<i32>> = Vec::with_capacity(row_lens.len());
    let mut pos = 0;

    for (y, &len) in row_lens.iter().enumerate() {
        if len == 0 {
            rows.push(Vec::new());
            continue;
        }
        let fid = *filter_ids.get(y).unwrap_or(&0);
        let res = &flat_residuals[pos..pos + len];
        pos += len;

        let mut row = vec![0i32; len];
        for x in 0..len {
            let a = if x > 0 { row[x - 1] } else { 0 };
            let b = if y > 0 { rows[y - 1].get(x).copied().unwrap_or(0) } else { 0 };
            let c = if x > 0 && y > 0 {
                rows[y - 1].get(x - 1).copied().unwrap_or(0)
            } else {
                0
            };
            row[x] = res[x] + predict(fid, a, b, c);
        }
        rows.push(row);
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows_from_flat(data: &[i32], width: usize, height: usize) -> Vec<Vec<i32>> {
        (0..height).map(|y| data[y * width..(y + 1) * width].to_vec()).collect()
    }

    fn flatten(rows: &[Vec<i32>]) -> Vec<i32> {
        rows.iter().flatten().copied().collect()
    }

    #[test]
    fn gradient_round_trips() {
        let width = 16;
        let height = 12;
        let data: Vec<i32> = (0..width * height).map(|i| ((i % width) + (i / width)) as i32).collect();
        let rows = rows_from_flat(&data, width, height);
        let (filter_ids, residuals) = filter_rows(&rows, FILTER_WEIGHTED_B);
        let back = unfilter_rows(&filter_ids, &residuals, &vec![width; height]);
        assert_eq!(flatten(&back), data);
    }

    #[test]
    fn constant_plane_prefers_low_residual_sum() {
        let width = 8;
        let height = 8;
        let data = vec![42i32; width * height];
        let rows = rows_from_flat(&data, width, height);
        let (filter_ids, residuals) = filter_rows(&rows, FILTER_WEIGHTED_B);
        let back = unfilter_rows(&filter_ids, &residuals, &vec![width; height]);
        assert_eq!(flatten(&back), data);
        let total_abs: i64 = residuals.iter().map(|&v| v.unsigned_abs() as i64).sum();
        assert!(total_abs < (42 * width * height) as i64);
    }

    #[test]
    fn single_row_round_trips() {
        let data: Vec<i32> = (0..20).collect();
        let rows = rows_from_flat(&data, 20, 1);
        let (filter_ids, residuals) = filter_rows(&rows, FILTER_WEIGHTED_B);
        let back = unfilter_rows(&filter_ids, &residuals, &[20]);
        assert_eq!(flatten(&back), data);
    }

    #[test]
    fn checkerboard_round_trips() {
        let data: Vec<i32> = (0..32 * 32)
            .map(|i| if (i % 32 + i / 32) % 2 == 0 { 0 } else { 255 })
            .collect();
        let rows = rows_from_flat(&data, 32, 32);
        let (filter_ids, residuals) = filter_rows(&rows, FILTER_WEIGHTED_B);
        let back = unfilter_rows(&filter_ids, &residuals, &vec![32; 32]);
        assert_eq!(flatten(&back), data);
    }

    #[test]
    fn negative_values_round_trip() {
        let data: Vec<i32> = (0..64).map(|i| (i % 9) - 4).collect();
        let rows = rows_from_flat(&data, 8, 8);
        let (filter_ids, residuals) = filter_rows(&rows, FILTER_WEIGHTED_B);
        let back = unfilter_rows(&filter_ids, &residuals, &vec![8; 8]);
        assert_eq!(flatten(&back), data);
    }

    #[test]
    fn ragged_rows_with_gaps_round_trip() {
        let rows = vec![vec![10, 20, 30], Vec::new(), vec![1, 2, 3, 4, 5]];
        let row_lens = vec![3, 0, 5];
        let (filter_ids, residuals) = filter_rows(&rows, FILTER_WEIGHTED_B);
        let back = unfilter_rows(&filter_ids, &residuals, &row_lens);
        assert_eq!(back, rows);
    }

    #[test]
    fn max_filter_id_gating_excludes_higher_predictors() {
        let data: Vec<i32> = (0..64).map(|i| (i % 13) as i32).collect();
        let rows = rows_from_flat(&data, 8, 8);
        let (filter_ids, _residuals) = filter_rows(&rows, 4);
        assert!(filter_ids.iter().all(|&f| f <= 4));
    }
}
