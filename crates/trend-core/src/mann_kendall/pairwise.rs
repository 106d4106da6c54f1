//! Pairwise sign comparisons between earlier and later samples.
use crate::series::Series;

/// Direction of change from an earlier sample to a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sign {
    Decrease,
    Tie,
    Increase,
}

impl Sign {
    /// Sign of `later − earlier`. Only exact equality counts as a tie.
    #[inline]
    pub fn between(earlier: f64, later: f64) -> Self {
        if later > earlier {
            Sign::Increase
        } else if later < earlier {
            Sign::Decrease
        } else {
            Sign::Tie
        }
    }

    #[inline]
    pub fn as_i64(self) -> i64 {
        match self {
            Sign::Decrease => -1,
            Sign::Tie => 0,
            Sign::Increase => 1,
        }
    }
}

/// Outcome of comparing sample `earlier` with sample `later` (indices into the series).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComparisonResult {
    pub earlier: usize,
    pub later: usize,
    pub sign: Sign,
}

/// Every time-ordered pair of observed samples, in (earlier, later) order.
/// Missing samples take part in no pair, so the result has n(n−1)/2 entries
/// for n observed samples.
pub fn compare_pairs(series: &Series) -> Vec<ComparisonResult> {
    let samples = series.samples();
    let n = series.effective_len();
    let mut out = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for (i, a) in samples.iter().enumerate() {
        let Some(vi) = a.value else { continue };
        for (j, b) in samples.iter().enumerate().skip(i + 1) {
            let Some(vj) = b.value else { continue };
            out.push(ComparisonResult { earlier: i, later: j, sign: Sign::between(vi, vj) });
        }
    }
    out
}

/// Mann–Kendall S: sum of pairwise signs. Allocation-free.
pub fn kendall_s(series: &Series) -> i64 {
    let samples = series.samples();
    let mut s = 0i64;
    for (i, a) in samples.iter().enumerate() {
        let Some(vi) = a.value else { continue };
        for b in &samples[i + 1..] {
            if let Some(vj) = b.value {
                s += Sign::between(vi, vj).as_i64();
            }
        }
    }
    s
}
