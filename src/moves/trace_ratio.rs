//! Ratio of the local (trace) weight between two configurations differing by
//! one pair of operators.
//!
//! Adding a segment `s` to color `c0` multiplies the trace by `exp(ln_r)` with
//!
//! ```text
//! ln_r = mu[c0] l(s) - sum_{c != c0} U[c0, c] overlap(c, s)
//!      + sum_c k_overlap(c, s, K, c0, c) - K(l(s))[c0, c0]
//! ```
//!
//! where the last two terms are present only with a retarded interaction.
//! Cutting a hole out of an occupied interval flips the sign of the density
//! terms; the retarded terms only depend on the operators.

use crate::configuration::configuration::Configuration;
use crate::configuration::seglist::{k_overlap, next_index, overlap};
use crate::configuration::segment::Segment;
use crate::model::work_data::WorkData;
use crate::time::tau::Tau;
use log::trace;

/// Chemical potential and instantaneous interaction for occupying `interval`
/// on `color`.
fn ln_density(config: &Configuration, wdata: &WorkData, color: usize, interval: &Segment) -> f64 {
    let mut ln_ratio = wdata.mu[color] * f64::from(interval.length());
    for (c, sl) in config.seglists().iter().enumerate() {
        if c != color {
            ln_ratio -= wdata.u[[color, c]] * overlap(sl, interval);
        }
    }
    ln_ratio
}

/// Retarded interaction of a new pair of operators of `color` with the
/// operators already present, segment `skip` of that color excluded, and with
/// itself.
fn ln_retarded(
    config: &Configuration,
    wdata: &WorkData,
    color: usize,
    tau_c: Tau,
    tau_cdag: Tau,
    skip: Option<usize>,
) -> f64 {
    if !wdata.has_dt {
        return 0.0;
    }
    let kernel = wdata.k();
    let mut ln_ratio = 0.0;
    for (c, sl) in config.seglists().iter().enumerate() {
        let others = sl
            .iter()
            .enumerate()
            .filter(move |&(k, _)| c != color || Some(k) != skip)
            .map(|(_, s)| s);
        ln_ratio += k_overlap(others, tau_c, tau_cdag, kernel, color, c);
    }
    ln_ratio - kernel.value(f64::from(tau_c - tau_cdag), color, color)
}

/// Log of the trace ratio for adding `segment` to `color`, with segment `skip`
/// of that color (if any) treated as absent.
fn ln_insert_ratio(
    config: &Configuration,
    wdata: &WorkData,
    color: usize,
    segment: &Segment,
    skip: Option<usize>,
) -> f64 {
    let ln_ratio = ln_density(config, wdata, color, segment)
        + ln_retarded(config, wdata, color, segment.tau_c, segment.tau_cdag, skip);
    trace!(
        "ln trace ratio for {} on color {}: {}",
        segment,
        color,
        ln_ratio
    );
    ln_ratio
}

/// Log of the trace ratio for emptying `color` from `hole_c` to `hole_cdag`.
fn ln_split_ratio(
    config: &Configuration,
    wdata: &WorkData,
    color: usize,
    hole_c: Tau,
    hole_cdag: Tau,
) -> f64 {
    let hole = Segment::new(hole_cdag, hole_c);
    let ln_ratio = -ln_density(config, wdata, color, &hole)
        + ln_retarded(config, wdata, color, hole_c, hole_cdag, None);
    trace!(
        "ln trace ratio for hole {} on color {}: {}",
        hole,
        color,
        ln_ratio
    );
    ln_ratio
}

/// Trace ratio for adding `segment` to `color`.
pub fn insert_trace_ratio(
    config: &Configuration,
    wdata: &WorkData,
    color: usize,
    segment: &Segment,
) -> f64 {
    ln_insert_ratio(config, wdata, color, segment, None).exp()
}

/// Trace ratio for removing segment `index` of `color`.
pub fn remove_trace_ratio(
    config: &Configuration,
    wdata: &WorkData,
    color: usize,
    index: usize,
) -> f64 {
    let segment = config.seglist(color)[index];
    (-ln_insert_ratio(config, wdata, color, &segment, Some(index))).exp()
}

/// Trace ratio for cutting a hole, from the annihilation at `hole_c` to the
/// creation at `hole_cdag`, inside an occupied interval of `color`.
pub fn split_trace_ratio(
    config: &Configuration,
    wdata: &WorkData,
    color: usize,
    hole_c: Tau,
    hole_cdag: Tau,
) -> f64 {
    ln_split_ratio(config, wdata, color, hole_c, hole_cdag).exp()
}

/// Trace ratio for closing the hole between segment `index` of `color` and the
/// segment before it in time, which merges the two (or fills the line if
/// `index` is the only segment).
pub fn regroup_trace_ratio(
    config: &Configuration,
    wdata: &WorkData,
    color: usize,
    index: usize,
) -> f64 {
    let sl = config.seglist(color);
    let next = next_index(index, sl.len());
    let (hole_c, hole_cdag) = (sl[next].tau_c, sl[index].tau_cdag);
    let mut merged = config.clone();
    merged.regroup_segments(color, index);
    (-ln_split_ratio(&merged, wdata, color, hole_c, hole_cdag)).exp()
}
