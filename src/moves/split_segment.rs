use super::insert_segment::InsertionWindow;
use super::trace_ratio::split_trace_ratio;
use super::traits::MonteCarloMove;
use crate::configuration::seglist::lower_bound;
use crate::model::work_data::WorkData;
use crate::state::McState;
use crate::time::tau::Tau;
use log::{debug, trace, warn};

#[derive(Clone, Copy, Debug)]
struct SplitProposal {
    color: usize,
    index: usize,
    hole_c: Tau,
    hole_cdag: Tau,
    det_sign: f64,
}

/// Cuts a hole inside a randomly chosen segment, splitting it in two.
///
/// The hole is an annihilation followed by a creation. Splitting the full line
/// leaves a single segment; both orders of the drawn times are then valid, as
/// for an insertion on an empty line. Reverse of
/// [`RegroupSegment`](super::regroup_segment::RegroupSegment).
#[derive(Debug, Default)]
pub struct SplitSegment {
    proposal: Option<SplitProposal>,
    pub accept_count: usize,
    pub reject_count: usize,
}

impl SplitSegment {
    pub fn new() -> Self {
        Self::default()
    }

    /// The occupied interval of segment `index` of `color`, read backwards from
    /// its annihilation time.
    pub fn window(state: &McState, color: usize, index: usize) -> InsertionWindow {
        let segment = state.config.seglist(color)[index];
        InsertionWindow {
            left: segment.tau_c,
            length: segment.length(),
        }
    }

    /// Prices the hole whose creation and annihilation times lie `dt1` and `dt2`
    /// before the end of segment `index` of `color`.
    ///
    /// Opens a determinant trial unless the proposal is degenerate.
    pub fn propose(
        &mut self,
        state: &mut McState,
        wdata: &WorkData,
        color: usize,
        index: usize,
        dt1: Tau,
        dt2: Tau,
    ) -> f64 {
        self.proposal = None;
        if dt1 == dt2 {
            trace!("Generated equal times");
            return 0.0;
        }
        let full_line = state.config.is_full_line(color);
        let n = state.config.seglist(color).len();
        let (dt1, dt2) = if !full_line && dt1 > dt2 {
            (dt2, dt1)
        } else {
            (dt1, dt2)
        };
        if !full_line && dt1.is_zero() {
            trace!("Hole touches the end of the segment");
            return 0.0;
        }
        let window = Self::window(state, color, index);
        let hole_cdag = (window.left - dt1).canonical();
        let hole_c = (window.left - dt2).canonical();
        trace!(
            "Splitting segment {} of color {} with a hole from {} to {}",
            index,
            color,
            hole_c,
            hole_cdag
        );

        let trace_ratio = split_trace_ratio(&state.config, wdata, color, hole_c, hole_cdag);

        let det = &mut state.dets[color];
        let det_index_cdag = lower_bound(|i| det.get_x(i).0, det.size(), hole_cdag);
        let det_index_c = lower_bound(|j| det.get_y(j).0, det.size(), hole_c);
        let det_ratio = det.try_insert(det_index_cdag, det_index_c, (hole_cdag, 0), (hole_c, 0));

        let window_length = f64::from(window.length);
        let prop_ratio = if full_line {
            window_length * window_length
        } else {
            n as f64 * window_length * window_length / 2.0 / (n as f64 + 1.0)
        };

        trace!(
            "trace_ratio = {}, prop_ratio = {}, det_ratio = {}",
            trace_ratio,
            prop_ratio,
            det_ratio
        );

        let det_sign = if det_ratio > 0.0 { 1.0 } else { -1.0 };
        self.proposal = Some(SplitProposal {
            color,
            index,
            hole_c,
            hole_cdag,
            det_sign,
        });

        let weight = trace_ratio * det_ratio * prop_ratio;
        if weight.is_finite() {
            weight
        } else {
            warn!(
                "Non-finite split weight (trace {}, det {}, prop {}), using the det sign",
                trace_ratio, det_ratio, prop_ratio
            );
            det_sign
        }
    }
}

impl<R> MonteCarloMove<R> for SplitSegment
where
    R: rand::Rng,
{
    fn name(&self) -> &'static str {
        "split_segment"
    }

    fn attempt(&mut self, state: &mut McState, wdata: &WorkData, rng: &mut R) -> f64 {
        self.proposal = None;
        let color = rng.gen_range(0..state.n_color());
        trace!("Split segment: color {}", color);

        let n = state.config.seglist(color).len();
        if n == 0 {
            trace!("Empty line, cannot split");
            return 0.0;
        }
        let index = rng.gen_range(0..n);
        let window = Self::window(state, color, index);
        let dt1 = Tau::random(rng, window.length);
        let dt2 = Tau::random(rng, window.length);
        self.propose(state, wdata, color, index, dt1, dt2)
    }

    fn accept(&mut self, state: &mut McState, _wdata: &WorkData) -> f64 {
        let proposal = match self.proposal.take() {
            Some(p) => p,
            None => panic!("split_segment: accept called without a proposal"),
        };
        let initial_sign = state.config.trace_sign();

        state.dets[proposal.color].complete_operation();
        state.config.split_segment(
            proposal.color,
            proposal.index,
            proposal.hole_c,
            proposal.hole_cdag,
        );

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
            "Split segment accepted: hole from {} to {} on color {}",
            proposal.hole_c, proposal.hole_cdag, proposal.color
        );
        sign_ratio
    }

    fn reject(&mut self, state: &mut McState) {
        if let Some(proposal) = self.proposal.take() {
            state.dets[proposal.color].reject_last_try();
        }
        self.reject_count += 1;
        debug!("Split segment rejected");
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
    use crate::moves::insert_segment::InsertSegment;
    use crate::moves::regroup_segment::RegroupSegment;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn bath(beta: f64) -> Hybridization {
        Hybridization::Bath {
            beta,
            levels: vec![
                BathLevel {
                    energy: -0.4,
                    couplings: vec![0.7],
                },
                BathLevel {
                    energy: 0.6,
                    couplings: vec![0.5],
                },
            ],
        }
    }

    fn two_colors() -> Params {
        Params::new(
            2.0,
            vec![0.3, -0.1],
            vec![vec![0.0, 1.5], vec![1.5, 0.0]],
            vec![bath(2.0), bath(2.0)],
        )
    }

    fn populated(wdata: &WorkData, seed: u64) -> McState {
        let mut state = McState::new(&two_colors());
        let mut mv = InsertSegment::new();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut accepted = 0;
        for _ in 0..10_000 {
            if accepted == 6 {
                break;
            }
            // Negative weights are legitimate: the det sign flips with the trace sign
            let w = mv.attempt(&mut state, wdata, &mut rng);
            if w != 0.0 {
                MonteCarloMove::<StdRng>::accept(&mut mv, &mut state, wdata);
                accepted += 1;
            } else {
                MonteCarloMove::<StdRng>::reject(&mut mv, &mut state);
            }
        }
        assert_eq!(accepted, 6, "Could not build the starting configuration");
        state
    }

    #[test]
    fn test_split_full_line_scenario() {
        let params = Params::new(1.0, vec![0.5], vec![vec![0.0]], vec![bath(1.0)]);
        let wdata = WorkData::new(&params);
        let mut state = McState::new(&params);
        state.config.set_full_line(0);
        let mut mv = SplitSegment::new();

        let weight = mv.propose(
            &mut state,
            &wdata,
            0,
            0,
            Tau::from_f64(0.3, 1.0),
            Tau::from_f64(0.7, 1.0),
        );
        // Hole from 0.3 to 0.7: the remaining segment wraps around beta
        let expected = (-0.5f64 * 0.4).exp() * bath(1.0).value(0.4, 0, 0);
        assert!(
            (weight - expected).abs() < 1e-12,
            "weight {} expected {}",
            weight,
            expected
        );

        let sign = MonteCarloMove::<StdRng>::accept(&mut mv, &mut state, &wdata);
        assert_eq!(sign, -1.0);
        let sl = state.config.seglist(0);
        assert_eq!(sl.len(), 1);
        assert!(sl[0].is_cyclic());
        assert!((f64::from(sl[0].tau_c) - 0.3).abs() < 1e-12);
        assert!((f64::from(sl[0].tau_cdag) - 0.7).abs() < 1e-12);
        state.check_invariants();
        assert_eq!(state.sign_from_scratch(), 1.0);
    }

    #[test]
    fn test_split_overflowing_weight_falls_back_to_det_sign() {
        // A hole costs exp(-mu * length), which overflows for mu << 0
        let params = Params::new(1.0, vec![-5000.0], vec![vec![0.0]], vec![bath(1.0)]);
        let wdata = WorkData::new(&params);
        let mut state = McState::new(&params);
        state.config.set_full_line(0);
        let mut mv = SplitSegment::new();
        let weight = mv.propose(
            &mut state,
            &wdata,
            0,
            0,
            Tau::from_f64(0.3, 1.0),
            Tau::from_f64(0.7, 1.0),
        );
        assert_eq!(weight, -1.0);
        let sign = MonteCarloMove::<StdRng>::accept(&mut mv, &mut state, &wdata);
        assert_eq!(sign, -1.0);
        state.check_invariants();
        assert_eq!(state.sign_from_scratch(), 1.0);
    }

    #[test]
    fn test_split_then_regroup_weights_are_inverse() {
        let wdata = WorkData::new(&two_colors());
        let mut rng = StdRng::seed_from_u64(17);
        for seed in 0..5 {
            let mut state = populated(&wdata, seed);
            if seed % 2 == 0 && state.config.seglist(1).is_empty() {
                state.config.set_full_line(1);
            }
            for color in 0..2 {
                let n = state.config.seglist(color).len();
                if n == 0 {
                    continue;
                }
                let index = rng.gen_range(0..n);
                let window = SplitSegment::window(&state, color, index);
                let dt1 = Tau::random(&mut rng, window.length);
                let dt2 = Tau::random(&mut rng, window.length);

                let mut split = SplitSegment::new();
                let w_split = split.propose(&mut state, &wdata, color, index, dt1, dt2);
                assert!(w_split != 0.0);
                let hole_cdag = match split.proposal {
                    Some(p) => p.hole_cdag,
                    None => panic!("No pending split"),
                };
                MonteCarloMove::<StdRng>::accept(&mut split, &mut state, &wdata);
                state.check_invariants();

                // The hole lies just before the piece starting at hole_cdag
                let piece = state
                    .config
                    .seglist(color)
                    .iter()
                    .position(|s| s.tau_cdag == hole_cdag)
                    .unwrap();
                let mut regroup = RegroupSegment::new();
                let w_regroup = regroup.propose(&mut state, &wdata, color, piece);
                assert!(
                    (w_split * w_regroup - 1.0).abs() < 1e-8,
                    "split {} x regroup {} = {}",
                    w_split,
                    w_regroup,
                    w_split * w_regroup
                );
                MonteCarloMove::<StdRng>::accept(&mut regroup, &mut state, &wdata);
                state.check_invariants();
                assert_eq!(state.config.seglist(color).len(), n);
            }
        }
    }

    #[test]
    fn test_split_on_empty_line_returns_zero() {
        let params = two_colors();
        let wdata = WorkData::new(&params);
        let mut state = McState::new(&params);
        let mut mv = SplitSegment::new();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..10 {
            assert_eq!(mv.attempt(&mut state, &wdata, &mut rng), 0.0);
            assert!(state.dets.iter().all(|d| d.is_idle()));
            MonteCarloMove::<StdRng>::reject(&mut mv, &mut state);
        }
        assert_eq!(mv.reject_count, 10);
    }

    #[test]
    fn test_rejected_split_leaves_state_identical() {
        let wdata = WorkData::new(&two_colors());
        let mut state = populated(&wdata, 3);
        let mut mv = SplitSegment::new();
        let mut rng = StdRng::seed_from_u64(8);
        for _ in 0..20 {
            let before = state.clone();
            mv.attempt(&mut state, &wdata, &mut rng);
            MonteCarloMove::<StdRng>::reject(&mut mv, &mut state);
            assert_eq!(state.config, before.config);
            for (det, det_before) in state.dets.iter().zip(&before.dets) {
                assert!(det.is_idle());
                assert_eq!(det.size(), det_before.size());
                assert_eq!(
                    det.determinant().to_bits(),
                    det_before.determinant().to_bits()
                );
            }
        }
    }
}
