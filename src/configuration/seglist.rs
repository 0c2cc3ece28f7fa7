//! Operations on the sorted segment list of a single color.
//!
//! A list is sorted by decreasing `tau_c` and its segments do not overlap. Only
//! the last segment may wrap around `beta`.

use super::segment::Segment;
use crate::model::imtime_function::ImTimeFunction;
use crate::time::tau::{Tau, TICKS_PER_PERIOD};

/// Index of the segment following `index`, wrapping to the first one.
pub fn next_index(index: usize, len: usize) -> usize {
    debug_assert!(index < len, "Index {} out of list of length {}", index, len);
    if index + 1 == len {
        0
    } else {
        index + 1
    }
}

/// Index of the segment preceding `index`, wrapping to the last one.
pub fn previous_index(index: usize, len: usize) -> usize {
    debug_assert!(index < len, "Index {} out of list of length {}", index, len);
    if index == 0 {
        len - 1
    } else {
        index - 1
    }
}

/// Position at which `segment` is inserted to keep the list sorted (upper bound).
pub fn insertion_position(seglist: &[Segment], segment: &Segment) -> usize {
    seglist.partition_point(|s| s <= segment)
}

/// First index `i` in `0..len` such that `time(i) < value`, for a sequence of
/// times sorted in decreasing order.
///
/// Inserting `value` at the returned index keeps the sequence decreasing.
pub fn lower_bound<F>(time: F, len: usize, value: Tau) -> usize
where
    F: Fn(usize) -> Tau,
{
    let (mut lo, mut hi) = (0, len);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if time(mid) > value {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Splits a segment into at most two non-wrapping tick intervals `[lo, hi)`.
fn tick_intervals(segment: &Segment) -> ([(u64, u64); 2], usize) {
    let c = segment.tau_c.ticks();
    let cdag = segment.tau_cdag.ticks();
    if segment.is_full_line() {
        ([(0, TICKS_PER_PERIOD), (0, 0)], 1)
    } else if segment.is_cyclic() {
        ([(cdag, TICKS_PER_PERIOD), (0, c)], 2)
    } else {
        ([(cdag, c), (0, 0)], 1)
    }
}

fn ticks_to_f64(ticks: u64, beta: f64) -> f64 {
    ticks as f64 / TICKS_PER_PERIOD as f64 * beta
}

/// Total length of the intersection of `segment` with the segments of `seglist`.
///
/// The computation is exact on the tick grid and handles segments wrapping
/// around `beta` on either side.
pub fn overlap(seglist: &[Segment], segment: &Segment) -> f64 {
    let beta = segment.tau_c.period();
    let (new_intervals, n_new) = tick_intervals(segment);
    let mut total: u64 = 0;
    for other in seglist {
        let (old_intervals, n_old) = tick_intervals(other);
        for &(a_lo, a_hi) in &new_intervals[..n_new] {
            for &(b_lo, b_hi) in &old_intervals[..n_old] {
                let lo = a_lo.max(b_lo);
                let hi = a_hi.min(b_hi);
                if hi > lo {
                    total += hi - lo;
                }
            }
        }
    }
    ticks_to_f64(total, beta)
}

/// Total occupied length of the list.
pub fn occupied_length(seglist: &[Segment]) -> f64 {
    seglist.iter().map(|s| f64::from(s.length())).sum()
}

/// Occupation (0 or 1) of the list just below time `tau`.
///
/// At an operator time this is the density on the side of smaller times: 1 at
/// an annihilation time, 0 at a creation time.
pub fn n_tau(tau: Tau, seglist: &[Segment]) -> f64 {
    if seglist.iter().any(|s| s.is_occupied_below(tau)) {
        1.0
    } else {
        0.0
    }
}

/// Retarded-interaction coupling of a single operator at `tau` with all the
/// operators of `segments`.
///
/// Creation operators carry a `+` charge and annihilation operators a `-`
/// charge; each pair contributes `q_new * q_old * K(tau - tau_old)[c1, c2]`.
/// `is_c` selects the charge of the new operator. The full line carries no
/// operators and does not contribute.
pub fn k_overlap_single<'a, I>(
    segments: I,
    tau: Tau,
    is_c: bool,
    kernel: &ImTimeFunction,
    c1: usize,
    c2: usize,
) -> f64
where
    I: IntoIterator<Item = &'a Segment>,
{
    let charge = if is_c { -1.0 } else { 1.0 };
    let mut result = 0.0;
    for seg in segments.into_iter().filter(|s| !s.is_full_line()) {
        result += kernel.value(f64::from(tau - seg.tau_cdag), c1, c2)
            - kernel.value(f64::from(tau - seg.tau_c), c1, c2);
    }
    charge * result
}

/// Retarded-interaction coupling of a new pair of operators (`tau_c`, `tau_cdag`)
/// with all the operators of `segments`.
///
/// The contribution of `tau_c` enters with the opposite sign of that of
/// `tau_cdag`.
pub fn k_overlap<'a, I>(
    segments: I,
    tau_c: Tau,
    tau_cdag: Tau,
    kernel: &ImTimeFunction,
    c1: usize,
    c2: usize,
) -> f64
where
    I: IntoIterator<Item = &'a Segment> + Clone,
{
    k_overlap_single(segments.clone(), tau_cdag, false, kernel, c1, c2)
        + k_overlap_single(segments, tau_c, true, kernel, c1, c2)
}
