//! Mann–Kendall monotonic trend test.
//!
//! S = Σ_{i<j} sign(x_j − x_i) over all time-ordered pairs of observed
//! samples, with the null variance corrected for tied values:
//!
//!   Var(S) = [n(n−1)(2n+5) − Σ_g g(g−1)(2g+5)] / 18
//!
//! The continuity-corrected statistic Z is converted to an upper-tail
//! normal probability p = 1 − Φ(|Z|) and compared with the threshold.
pub mod pairwise;
pub mod significance;
pub mod ties;

pub use pairwise::{compare_pairs, kendall_s, ComparisonResult, Sign};
pub use significance::{
    standardize, upper_tail_probability, SignificanceTester, TestStatus, TrendTest, DEFAULT_SIGNIFICANCE,
};
pub use ties::{group_factor, tie_correction, tie_group_sizes, tie_group_sizes_into};
