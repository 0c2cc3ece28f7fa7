use super::trace_ratio::regroup_trace_ratio;
use super::traits::MonteCarloMove;
use crate::configuration::seglist::next_index;
use crate::model::work_data::WorkData;
use crate::state::McState;
use log::{debug, trace, warn};

#[derive(Clone, Copy, Debug)]
struct RegroupProposal {
    color: usize,
    index: usize,
    det_sign: f64,
}

/// Closes the hole before a randomly chosen segment, merging it with the
/// segment before it in time. Closing the only hole of a color fills the line.
/// Reverse of [`SplitSegment`](super::split_segment::SplitSegment).
#[derive(Debug, Default)]
pub struct RegroupSegment {
    proposal: Option<RegroupProposal>,
    pub accept_count: usize,
    pub reject_count: usize,
}

impl RegroupSegment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prices closing the hole between segment `index` of `color` and the next
    /// segment of the list, and opens the determinant trial.
    pub fn propose(
        &mut self,
        state: &mut McState,
        wdata: &WorkData,
        color: usize,
        index: usize,
    ) -> f64 {
        self.proposal = None;
        let sl = state.config.seglist(color);
        let n = sl.len();
        let next = next_index(index, n);
        let (hole_c, hole_cdag) = (sl[next].tau_c, sl[index].tau_cdag);
        // Length of the merged segment; the whole cycle when the line fills up
        let merged_length = if n == 1 {
            state.config.beta()
        } else {
            f64::from(sl[index].tau_c - sl[next].tau_cdag)
        };
        trace!(
            "Closing the hole from {} to {} on color {}",
            hole_c,
            hole_cdag,
            color
        );

        let trace_ratio = regroup_trace_ratio(&state.config, wdata, color, index);

        let det = &mut state.dets[color];
        let det_index_c = next;
        let det_index_cdag = match (0..det.size()).find(|&i| det.get_x(i).0 == hole_cdag) {
            Some(i) => i,
            None => panic!(
                "Creation time {} of color {} is missing from the determinant",
                hole_cdag, color
            ),
        };
        let det_ratio = det.try_remove(det_index_cdag, det_index_c);

        let prop_ratio = if n == 1 {
            1.0 / (merged_length * merged_length)
        } else {
            2.0 * n as f64 / ((n - 1) as f64 * merged_length * merged_length)
        };

        trace!(
            "trace_ratio = {}, prop_ratio = {}, det_ratio = {}",
            trace_ratio,
            prop_ratio,
            det_ratio
        );

        let det_sign = if det_ratio > 0.0 { 1.0 } else { -1.0 };
        self.proposal = Some(RegroupProposal {
            color,
            index,
            det_sign,
        });

        let weight = trace_ratio * det_ratio * prop_ratio;
        if weight.is_finite() {
            weight
        } else {
            warn!(
                "Non-finite regroup weight (trace {}, det {}, prop {}), using the det sign",
                trace_ratio, det_ratio, prop_ratio
            );
            det_sign
        }
    }
}

impl<R> MonteCarloMove<R> for RegroupSegment
where
    R: rand::Rng,
{
    fn name(&self) -> &'static str {
        "regroup_segment"
    }

    fn attempt(&mut self, state: &mut McState, wdata: &WorkData, rng: &mut R) -> f64 {
        self.proposal = None;
        let color = rng.gen_range(0..state.n_color());
        trace!("Regroup segment: color {}", color);

        let n = state.config.seglist(color).len();
        if n == 0 {
            trace!("Empty line, nothing to regroup");
            return 0.0;
        }
        if state.config.is_full_line(color) {
            trace!("Full line, nothing to regroup");
            return 0.0;
        }
        let index = rng.gen_range(0..n);
        self.propose(state, wdata, color, index)
    }

    fn accept(&mut self, state: &mut McState, _wdata: &WorkData) -> f64 {
        let proposal = match self.proposal.take() {
            Some(p) => p,
            None => panic!("regroup_segment: accept called without a proposal"),
        };
        let initial_sign = state.config.trace_sign();

        state.dets[proposal.color].complete_operation();
        let merged = state
            .config
            .regroup_segments(proposal.color, proposal.index);

        let sign_ratio = state.config.trace_sign() / initial_sign;
        assert!(
            sign_ratio == proposal.det_sign,
            "Move has produced a negative sign: det sign is {} and trace sign ratio is {}. Configuration:{}",
            proposal.det_sign,
            sign_ratio,
            state.config
        );

        self.accept_count += 1;
        debug!(
            "Regroup segment accepted: {} on color {}",
            merged, proposal.color
        );
        sign_ratio
    }

    fn reject(&mut self, state: &mut McState) {
        if let Some(proposal) = self.proposal.take() {
            state.dets[proposal.color].reject_last_try();
        }
        self.reject_count += 1;
        debug!("Regroup segment rejected");
    }

    fn accept_count(&self) -> usize {
        self.accept_count
    }

    fn reject_count(&self) -> usize {
        self.reject_count
    }
}
