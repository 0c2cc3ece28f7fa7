use super::trace_ratio::insert_trace_ratio;
use super::traits::MonteCarloMove;
use crate::configuration::seglist::{lower_bound, next_index};
use crate::configuration::segment::Segment;
use crate::model::work_data::WorkData;
use crate::state::McState;
use crate::time::tau::Tau;
use log::{debug, trace, warn};

/// Interval of the cycle in which a new segment is drawn: it extends backwards
/// from `left` over a duration `length`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InsertionWindow {
    pub left: Tau,
    pub length: Tau,
}

#[derive(Clone, Copy, Debug)]
struct InsertProposal {
    color: usize,
    segment: Segment,
    det_sign: f64,
}

/// Inserts a segment into the line of a randomly chosen color.
///
/// On an empty line the new segment is drawn anywhere on the cycle. Otherwise
/// an existing segment is chosen uniformly and the new one is drawn in the
/// empty interval between its creation time and the annihilation time of the
/// next segment. The two endpoints are drawn independently and uniformly in
/// the window; on a non-empty line they are ordered so that the new segment
/// fits in the gap, while on an empty line both orders give a valid segment.
///
/// # Fields
/// - `accept_count`: Tracks the number of insertions that have been accepted.
/// - `reject_count`: Tracks the number of insertions that have been rejected.
#[derive(Debug, Default)]
pub struct InsertSegment {
    proposal: Option<InsertProposal>,
    pub accept_count: usize,
    pub reject_count: usize,
}

impl InsertSegment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Window for an insertion next to segment `index` of `color`, or the whole
    /// cycle if the line is empty.
    pub fn window(state: &McState, color: usize, index: Option<usize>) -> InsertionWindow {
        let sl = state.config.seglist(color);
        let beta = state.config.beta();
        match index {
            None => InsertionWindow {
                left: Tau::beta(beta),
                length: Tau::beta(beta),
            },
            Some(idx) => {
                let left = sl[idx].tau_cdag;
                let right = sl[next_index(idx, sl.len())].tau_c;
                InsertionWindow {
                    left,
                    length: left - right,
                }
            }
        }
    }

    /// Prices the insertion into `color` of the segment whose endpoints lie
    /// `dt1` and `dt2` before the left edge of `window`.
    ///
    /// Opens a determinant trial unless the proposal is degenerate. Returns the
    /// Metropolis weight `trace_ratio * det_ratio * prop_ratio`.
    pub fn propose(
        &mut self,
        state: &mut McState,
        wdata: &WorkData,
        color: usize,
        window: InsertionWindow,
        dt1: Tau,
        dt2: Tau,
    ) -> f64 {
        self.proposal = None;
        if dt1 == dt2 {
            trace!("Generated equal times");
            return 0.0;
        }
        let n = state.config.seglist(color).len();
        let (dt1, dt2) = if n > 0 && dt1 > dt2 {
            (dt2, dt1)
        } else {
            (dt1, dt2)
        };
        let segment = Segment::new(
            (window.left - dt1).canonical(),
            (window.left - dt2).canonical(),
        );
        trace!("Inserting segment {} on color {}", segment, color);

        let trace_ratio = insert_trace_ratio(&state.config, wdata, color, &segment);

        let det = &mut state.dets[color];
        let det_index_cdag = lower_bound(|i| det.get_x(i).0, det.size(), segment.tau_cdag);
        let det_index_c = lower_bound(|j| det.get_y(j).0, det.size(), segment.tau_c);
        let det_ratio = det.try_insert(
            det_index_cdag,
            det_index_c,
            (segment.tau_cdag, 0),
            (segment.tau_c, 0),
        );

        let window_length = f64::from(window.length);
        let current_intervals = n.max(1) as f64;
        let orderings = if n == 0 { 1.0 } else { 2.0 };
        let prop_ratio =
            current_intervals * window_length * window_length / orderings / (n as f64 + 1.0);

        trace!(
            "trace_ratio = {}, prop_ratio = {}, det_ratio = {}",
            trace_ratio,
            prop_ratio,
            det_ratio
        );

        let det_sign = if det_ratio > 0.0 { 1.0 } else { -1.0 };
        self.proposal = Some(InsertProposal {
            color,
            segment,
            det_sign,
        });

        let weight = trace_ratio * det_ratio * prop_ratio;
        if weight.is_finite() {
            weight
        } else {
            warn!(
                "Non-finite insertion weight (trace {}, det {}, prop {}), using the det sign",
                trace_ratio, det_ratio, prop_ratio
            );
            det_sign
        }
    }
}

impl<R> MonteCarloMove<R> for InsertSegment
where
    R: rand::Rng,
{
    fn name(&self) -> &'static str {
        "insert_segment"
    }

    fn attempt(&mut self, state: &mut McState, wdata: &WorkData, rng: &mut R) -> f64 {
        self.proposal = None;
        let color = rng.gen_range(0..state.n_color());
        trace!("Insert segment: color {}", color);

        if state.config.is_full_line(color) {
            trace!("Full line, cannot insert");
            return 0.0;
        }
        let n = state.config.seglist(color).len();
        let index = if n == 0 {
            None
        } else {
            Some(rng.gen_range(0..n))
        };
        let window = Self::window(state, color, index);
        trace!(
            "Insertion window starts at {} with length {}",
            window.left,
            window.length
        );
        if window.length.is_zero() {
            trace!("Empty insertion window");
            return 0.0;
        }

        let dt1 = Tau::random(rng, window.length);
        let dt2 = Tau::random(rng, window.length);
        self.propose(state, wdata, color, window, dt1, dt2)
    }

    fn accept(&mut self, state: &mut McState, _wdata: &WorkData) -> f64 {
        let proposal = match self.proposal.take() {
            Some(p) => p,
            None => panic!("insert_segment: accept called without a proposal"),
        };
        let initial_sign = state.config.trace_sign();

        state.dets[proposal.color].complete_operation();
        state
            .config
            .insert_segment(proposal.color, proposal.segment);

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
            "Insert segment accepted: {} on color {}",
            proposal.segment, proposal.color
        );
        sign_ratio
    }

    fn reject(&mut self, state: &mut McState) {
        if let Some(proposal) = self.proposal.take() {
            state.dets[proposal.color].reject_last_try();
        }
        self.reject_count += 1;
        debug!("Insert segment rejected");
    }

    fn accept_count(&self) -> usize {
        self.accept_count
    }

    fn reject_count(&self) -> usize {
        self.reject_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::det::hybridization::{BathLevel, Hybridization};
    use crate::model::params::Params;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn bath(beta: f64) -> Hybridization {
        Hybridization::Bath {
            beta,
            levels: vec![
                BathLevel {
                    energy: -0.3,
                    couplings: vec![0.6],
                },
                BathLevel {
                    energy: 0.5,
                    couplings: vec![0.8],
                },
            ],
        }
    }

    fn one_color(mu: f64) -> Params {
        Params::new(1.0, vec![mu], vec![vec![0.0]], vec![bath(1.0)])
    }

    fn t(x: f64) -> Tau {
        Tau::from_f64(x, 1.0)
    }

    fn assert_close(tau: Tau, expected: f64) {
        assert!(
            (f64::from(tau) - expected).abs() < 1e-12,
            "{} differs from {}",
            tau,
            expected
        );
    }

    #[test]
    fn test_empty_line_scenario() {
        let params = one_color(0.5);
        let wdata = WorkData::new(&params);
        let mut state = McState::new(&params);
        let mut mv = InsertSegment::new();

        let window = InsertSegment::window(&state, 0, None);
        assert_eq!(window.length, Tau::beta(1.0));
        let weight = mv.propose(&mut state, &wdata, 0, window, t(0.3), t(0.7));

        // Segment from cdag at 0.3 to c at 0.7, no reordering on an empty line
        let trace_ratio = (0.5f64 * 0.4).exp();
        let det_ratio = -bath(1.0).value(0.6, 0, 0);
        let expected = trace_ratio * det_ratio * 1.0;
        assert!(
            (weight - expected).abs() < 1e-12,
            "weight {} expected {}",
            weight,
            expected
        );
        assert!(!state.dets[0].is_idle());

        let sign = MonteCarloMove::<StdRng>::accept(&mut mv, &mut state, &wdata);
        assert_eq!(sign, 1.0);
        let sl = state.config.seglist(0);
        assert_eq!(sl.len(), 1);
        assert_close(sl[0].tau_c, 0.7);
        assert_close(sl[0].tau_cdag, 0.3);
        state.check_invariants();
    }

    #[test]
    fn test_empty_line_reversed_draws_wrap() {
        let params = one_color(0.5);
        let wdata = WorkData::new(&params);
        let mut state = McState::new(&params);
        let mut mv = InsertSegment::new();

        let window = InsertSegment::window(&state, 0, None);
        let weight = mv.propose(&mut state, &wdata, 0, window, t(0.7), t(0.3));
        // c at 0.3, cdag at 0.7: wraps around beta, length 0.6
        let expected = (0.5f64 * 0.6).exp() * bath(1.0).value(0.4, 0, 0);
        assert!((weight - expected).abs() < 1e-12);
        assert!(weight < 0.0);

        let sign = MonteCarloMove::<StdRng>::accept(&mut mv, &mut state, &wdata);
        assert_eq!(sign, -1.0);
        assert!(state.config.seglist(0)[0].is_cyclic());
        state.check_invariants();
        assert_eq!(state.sign_from_scratch(), 1.0);
    }

    #[test]
    fn test_overflowing_weight_falls_back_to_det_sign() {
        // exp(mu * length) overflows for both orders of the draws
        let params = one_color(5000.0);
        let wdata = WorkData::new(&params);

        let mut state = McState::new(&params);
        let mut mv = InsertSegment::new();
        let window = InsertSegment::window(&state, 0, None);
        let weight = mv.propose(&mut state, &wdata, 0, window, t(0.3), t(0.7));
        assert_eq!(weight, 1.0);
        let sign = MonteCarloMove::<StdRng>::accept(&mut mv, &mut state, &wdata);
        assert_eq!(sign, 1.0);
        state.check_invariants();

        let mut state = McState::new(&params);
        let weight = mv.propose(&mut state, &wdata, 0, window, t(0.7), t(0.3));
        assert_eq!(weight, -1.0);
        let sign = MonteCarloMove::<StdRng>::accept(&mut mv, &mut state, &wdata);
        assert_eq!(sign, -1.0);
        state.check_invariants();
        assert_eq!(state.sign_from_scratch(), 1.0);
    }

    #[test]
    fn test_equal_draws_return_zero() {
        let params = one_color(0.5);
        let wdata = WorkData::new(&params);
        let mut state = McState::new(&params);
        let mut mv = InsertSegment::new();
        let window = InsertSegment::window(&state, 0, None);
        let weight = mv.propose(&mut state, &wdata, 0, window, t(0.4), t(0.4));
        assert_eq!(weight, 0.0);
        assert!(state.dets[0].is_idle());
        MonteCarloMove::<StdRng>::reject(&mut mv, &mut state);
        assert_eq!(state.config.n_segments(), 0);
    }

    #[test]
    fn test_full_line_returns_zero() {
        let params = Params::new(
            1.0,
            vec![0.5, 0.5],
            vec![vec![0.0, 1.0], vec![1.0, 0.0]],
            vec![bath(1.0), bath(1.0)],
        );
        let wdata = WorkData::new(&params);
        let mut state = McState::new(&params);
        state.config.set_full_line(0);
        state.config.set_full_line(1);
        let before = state.clone();

        let mut mv = InsertSegment::new();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..20 {
            let weight = mv.attempt(&mut state, &wdata, &mut rng);
            assert_eq!(weight, 0.0);
            assert!(state.dets.iter().all(|d| d.is_idle() && d.size() == 0));
            MonteCarloMove::<StdRng>::reject(&mut mv, &mut state);
        }
        assert_eq!(state.config, before.config);
        assert_eq!(mv.reject_count, 20);
    }

    #[test]
    fn test_window_next_to_segment() {
        let params = one_color(0.0);
        let wdata = WorkData::new(&params);
        let mut state = McState::new(&params);
        let mut mv = InsertSegment::new();

        let window = InsertSegment::window(&state, 0, None);
        mv.propose(&mut state, &wdata, 0, window, t(0.4), t(0.8));
        MonteCarloMove::<StdRng>::accept(&mut mv, &mut state, &wdata);
        // Segment [0.2, 0.6): the only window is the gap from 0.2 back to 0.6
        let window = InsertSegment::window(&state, 0, Some(0));
        assert_close(window.left, 0.2);
        assert_close(window.length, 0.6);

        // Draws are reordered on a non-empty line
        let weight = mv.propose(&mut state, &wdata, 0, window, t(0.5), t(0.1));
        assert!(weight > 0.0);
        MonteCarloMove::<StdRng>::accept(&mut mv, &mut state, &wdata);
        let sl = state.config.seglist(0);
        assert_eq!(sl.len(), 2);
        assert_close(sl[0].tau_c, 0.6);
        assert_close(sl[0].tau_cdag, 0.2);
        assert_close(sl[1].tau_c, 0.1);
        assert_close(sl[1].tau_cdag, 0.7);
        state.check_invariants();
    }

    #[test]
    fn test_rejected_insertion_leaves_state_identical() {
        let params = one_color(0.2);
        let wdata = WorkData::new(&params);
        let mut state = McState::new(&params);
        let mut mv = InsertSegment::new();
        let mut rng = StdRng::seed_from_u64(5);

        // Build a few segments
        let mut accepted = 0;
        for _ in 0..10_000 {
            if accepted == 4 {
                break;
            }
            // Negative weights are legitimate: the det sign flips with the trace sign
            let w = mv.attempt(&mut state, &wdata, &mut rng);
            if w != 0.0 {
                MonteCarloMove::<StdRng>::accept(&mut mv, &mut state, &wdata);
                accepted += 1;
            } else {
                MonteCarloMove::<StdRng>::reject(&mut mv, &mut state);
            }
        }
        assert_eq!(accepted, 4, "Could not build the starting configuration");
        state.check_invariants();

        for _ in 0..50 {
            let before = state.clone();
            mv.attempt(&mut state, &wdata, &mut rng);
            MonteCarloMove::<StdRng>::reject(&mut mv, &mut state);
            assert_eq!(state.config, before.config);
            let det = &state.dets[0];
            let det_before = &before.dets[0];
            assert!(det.is_idle());
            assert_eq!(det.size(), det_before.size());
            for i in 0..det.size() {
                assert_eq!(det.get_x(i).0, det_before.get_x(i).0);
                assert_eq!(det.get_y(i).0, det_before.get_y(i).0);
                for j in 0..det.size() {
                    assert_eq!(
                        det.inverse_matrix(j, i).to_bits(),
                        det_before.inverse_matrix(j, i).to_bits()
                    );
                }
            }
            assert_eq!(
                det.determinant().to_bits(),
                det_before.determinant().to_bits()
            );
        }
    }

    #[test]
    #[should_panic(expected = "accept called without a proposal")]
    fn test_accept_without_proposal_panics() {
        let params = one_color(0.0);
        let wdata = WorkData::new(&params);
        let mut state = McState::new(&params);
        let mut mv = InsertSegment::new();
        MonteCarloMove::<StdRng>::accept(&mut mv, &mut state, &wdata);
    }
}
