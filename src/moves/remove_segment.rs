use super::trace_ratio::remove_trace_ratio;
use super::traits::MonteCarloMove;
use crate::configuration::seglist::{next_index, previous_index};
use crate::configuration::segment::Segment;
use crate::model::work_data::WorkData;
use crate::state::McState;
use crate::time::tau::Tau;
use log::{debug, trace, warn};

#[derive(Clone, Copy, Debug)]
struct RemoveProposal {
    color: usize,
    index: usize,
    det_sign: f64,
}

/// Removes a randomly chosen segment. Reverse of
/// [`InsertSegment`](super::insert_segment::InsertSegment).
#[derive(Debug, Default)]
pub struct RemoveSegment {
    proposal: Option<RemoveProposal>,
    pub accept_count: usize,
    pub reject_count: usize,
}

impl RemoveSegment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Length of the gap left by removing segment `index` of `color`: from the
    /// creation time of the previous segment back to the annihilation time of
    /// the next one, or the whole cycle if the segment is alone.
    pub fn window_length(state: &McState, color: usize, index: usize) -> Tau {
        let sl = state.config.seglist(color);
        if sl.len() == 1 {
            return Tau::beta(state.config.beta());
        }
        let previous = sl[previous_index(index, sl.len())];
        let next = sl[next_index(index, sl.len())];
        previous.tau_cdag - next.tau_c
    }

    /// Prices the removal of segment `index` of `color` and opens the
    /// determinant trial.
    pub fn propose(
        &mut self,
        state: &mut McState,
        wdata: &WorkData,
        color: usize,
        index: usize,
    ) -> f64 {
        self.proposal = None;
        let n = state.config.seglist(color).len();
        let segment: Segment = state.config.seglist(color)[index];
        trace!("Removing segment {} of color {}", segment, color);

        let trace_ratio = remove_trace_ratio(&state.config, wdata, color, index);

        let det = &mut state.dets[color];
        // Annihilation times are stored in the order of the list
        let det_index_c = index;
        let det_index_cdag = match (0..det.size()).find(|&i| det.get_x(i).0 == segment.tau_cdag) {
            Some(i) => i,
            None => panic!(
                "Creation time {} of color {} is missing from the determinant",
                segment.tau_cdag, color
            ),
        };
        let det_ratio = det.try_remove(det_index_cdag, det_index_c);

        let window_length = f64::from(Self::window_length(state, color, index));
        let future_intervals = (n - 1).max(1) as f64;
        let orderings = if n == 1 { 1.0 } else { 2.0 };
        let prop_ratio =
            n as f64 / (future_intervals * window_length * window_length / orderings);

        trace!(
            "trace_ratio = {}, prop_ratio = {}, det_ratio = {}",
            trace_ratio,
            prop_ratio,
            det_ratio
        );

        let det_sign = if det_ratio > 0.0 { 1.0 } else { -1.0 };
        self.proposal = Some(RemoveProposal {
            color,
            index,
            det_sign,
        });

        let weight = trace_ratio * det_ratio * prop_ratio;
        if weight.is_finite() {
            weight
        } else {
            warn!(
                "Non-finite removal weight (trace {}, det {}, prop {}), using the det sign",
                trace_ratio, det_ratio, prop_ratio
            );
            det_sign
        }
    }
}

impl<R> MonteCarloMove<R> for RemoveSegment
where
    R: rand::Rng,
{
    fn name(&self) -> &'static str {
        "remove_segment"
    }

    fn attempt(&mut self, state: &mut McState, wdata: &WorkData, rng: &mut R) -> f64 {
        self.proposal = None;
        let color = rng.gen_range(0..state.n_color());
        trace!("Remove segment: color {}", color);

        let n = state.config.seglist(color).len();
        if n == 0 {
            trace!("Empty line, cannot remove");
            return 0.0;
        }
        if state.config.is_full_line(color) {
            trace!("Full line, cannot remove");
            return 0.0;
        }
        let index = rng.gen_range(0..n);
        self.propose(state, wdata, color, index)
    }

    fn accept(&mut self, state: &mut McState, _wdata: &WorkData) -> f64 {
        let proposal = match self.proposal.take() {
            Some(p) => p,
            None => panic!("remove_segment: accept called without a proposal"),
        };
        let initial_sign = state.config.trace_sign();

        state.dets[proposal.color].complete_operation();
        let removed = state
            .config
            .remove_segment(proposal.color, proposal.index);

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
            "Remove segment accepted: {} on color {}",
            removed, proposal.color
        );
        sign_ratio
    }

    fn reject(&mut self, state: &mut McState) {
        if let Some(proposal) = self.proposal.take() {
            state.dets[proposal.color].reject_last_try();
        }
        self.reject_count += 1;
        debug!("Remove segment rejected");
    }

    fn accept_count(&self) -> usize {
        self.accept_count
    }

    fn reject_count(&self) -> usize {
        self.reject_count
    }
}
