//! Tie groups and the Mann–Kendall variance correction.
use crate::series::Series;

/// Run lengths of equal values after sorting the observed samples ascending.
/// Sizes are reported in value order and always sum to the observed count.
pub fn tie_group_sizes(series: &Series) -> Vec<usize> {
    let mut sorted = Vec::with_capacity(series.len());
    let mut sizes = Vec::new();
    tie_group_sizes_into(series, &mut sorted, &mut sizes);
    sizes
}

/// Buffer-reusing form of [`tie_group_sizes`]; both buffers are cleared first.
pub fn tie_group_sizes_into(series: &Series, sorted: &mut Vec<f64>, sizes: &mut Vec<usize>) {
    sorted.clear();
    sizes.clear();
    sorted.extend(series.observed().map(|(_, v)| v));
    sorted.sort_unstable_by(f64::total_cmp);

    let mut run = 0usize;
    for (i, &v) in sorted.iter().enumerate() {
        if i > 0 && v != sorted[i - 1] {
            sizes.push(run);
            run = 0;
        }
        run += 1;
    }
    if run > 0 {
        sizes.push(run);
    }
}

/// g(g−1)(2g+5). Also the uncorrected variance numerator for n samples.
#[inline]
pub fn group_factor(g: usize) -> u64 {
    let g = g as u64;
    g * g.saturating_sub(1) * (2 * g + 5)
}

/// Sum of group factors; singleton groups contribute zero.
pub fn tie_correction(sizes: &[usize]) -> u64 {
    sizes.iter().map(|&g| group_factor(g)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f64]) -> Series {
        let pts: Vec<(i64, f64)> = values.iter().enumerate().map(|(i, &v)| (i as i64, v)).collect();
        Series::from_points(&pts).unwrap()
    }

    #[test]
    fn single_duplicate_pair_contributes_eighteen() {
        let sizes = tie_group_sizes(&series(&[1.0, 2.0, 2.0, 3.0]));
        assert_eq!(sizes, vec![1, 2, 1]);
        assert_eq!(sizes.iter().filter(|&&g| g >= 2).count(), 1);
        assert_eq!(tie_correction(&sizes), 18);
    }

    #[test]
    fn no_repeats_yields_zero_correction() {
        let sizes = tie_group_sizes(&series(&[5.0, 1.0, 3.0, 2.0]));
        assert_eq!(sizes, vec![1; 4]);
        assert_eq!(tie_correction(&sizes), 0);
    }

    #[test]
    fn constant_series_is_one_group() {
        let sizes = tie_group_sizes(&series(&[0.0; 5]));
        assert_eq!(sizes, vec![5]);
        assert_eq!(tie_correction(&sizes), 300);
    }

    #[test]
    fn sizes_partition_observed_count() {
        let s = series(&[2.0, 7.0, 2.0, 7.0, 7.0, 1.0, f64::NAN, 2.0]);
        let sizes = tie_group_sizes(&s);
        assert_eq!(sizes.iter().sum::<usize>(), s.effective_len());
        assert_eq!(sizes, vec![1, 3, 3]);
    }

    #[test]
    fn correction_ignores_group_order() {
        let a = tie_correction(&[3, 1, 2, 4]);
        let b = tie_correction(&[4, 2, 1, 3]);
        assert_eq!(a, b);
        assert_eq!(a, group_factor(2) + group_factor(3) + group_factor(4));
    }

    #[test]
    fn into_variant_clears_buffers() {
        let mut sorted = vec![9.0; 3];
        let mut sizes = vec![42];
        tie_group_sizes_into(&series(&[1.0, 1.0]), &mut sorted, &mut sizes);
        assert_eq!(sorted, vec![1.0, 1.0]);
        assert_eq!(sizes, vec![2]);
    }
}
