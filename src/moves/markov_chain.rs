use super::traits::MonteCarloMove;
use crate::measures::Measure;
use crate::model::work_data::WorkData;
use crate::state::McState;
use log::{debug, info, trace};
use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;

/// Sequential Metropolis driver.
///
/// Owns the Monte Carlo state, the moves with their proposal weights, the
/// random source and the running sign of the configuration. One move is
/// attempted and resolved at a time.
pub struct MarkovChain<R>
where
    R: rand::Rng,
{
    pub state: McState,
    moves: Vec<Box<dyn MonteCarloMove<R>>>,
    weights: Vec<f64>,
    rng: R,
    weighted_index: WeightedIndex<f64>,
    sign: f64,
    check_invariants: bool,
    n_measures: u64,
    z: f64,
}

impl<R> MarkovChain<R>
where
    R: rand::Rng,
{
    pub fn new(
        state: McState,
        moves: Vec<Box<dyn MonteCarloMove<R>>>,
        weights: Vec<f64>,
        rng: R,
    ) -> Self {
        assert_eq!(
            moves.len(),
            weights.len(),
            "Moves and weights must have the same length"
        );
        assert!(
            weights.iter().all(|&w| w >= 0.0),
            "Weights must be non-negative"
        );
        let weighted_index = Self::build_index(&weights);
        let sign = state.sign();
        Self {
            state,
            moves,
            weights,
            rng,
            weighted_index,
            sign,
            check_invariants: false,
            n_measures: 0,
            z: 0.0,
        }
    }

    fn build_index(weights: &[f64]) -> WeightedIndex<f64> {
        if weights.is_empty() {
            // Never sampled: `step` returns early without moves
            WeightedIndex::new([1.0]).unwrap_or_else(|_| panic!("Invalid weights"))
        } else {
            WeightedIndex::new(weights).unwrap_or_else(|_| panic!("Invalid weights"))
        }
    }

    pub fn push_move<M>(&mut self, mv: M, weight: f64)
    where
        M: MonteCarloMove<R> + 'static,
    {
        assert!(weight >= 0.0, "Weight must be non-negative");
        self.moves.push(Box::new(mv));
        self.weights.push(weight);
        self.weighted_index = Self::build_index(&self.weights);
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Recompute the sign from scratch and check the configuration after every
    /// accepted move.
    pub fn set_check_invariants(&mut self, check: bool) {
        self.check_invariants = check;
    }

    /// Running sign of the current configuration.
    pub fn sign(&self) -> f64 {
        self.sign
    }

    pub fn n_measures(&self) -> u64 {
        self.n_measures
    }

    /// Sum of the signs over all measurements.
    pub fn z(&self) -> f64 {
        self.z
    }

    /// Attempts one move. Returns true if it was accepted.
    pub fn step(&mut self, wdata: &WorkData) -> bool {
        if self.moves.is_empty() {
            return false;
        }
        let idx = self.weighted_index.sample(&mut self.rng);
        let mv = &mut self.moves[idx];
        let weight = mv.attempt(&mut self.state, wdata, &mut self.rng);

        // Metropolis: accept with probability min(1, |weight|)
        let proba = self.rng.gen::<f64>();
        trace!(
            "Move {}: weight {}, drawn probability {}",
            mv.name(),
            weight,
            proba
        );
        if proba < weight.abs() {
            let sign_ratio = mv.accept(&mut self.state, wdata);
            self.sign *= sign_ratio * weight.signum();
            if self.check_invariants {
                self.verify();
            }
            true
        } else {
            mv.reject(&mut self.state);
            false
        }
    }

    fn verify(&self) {
        self.state.check_invariants();
        let expected = self.state.sign_from_scratch();
        assert!(
            self.sign == expected,
            "Running sign {} differs from the sign {} recomputed from scratch. Configuration:{}",
            self.sign,
            expected,
            self.state.config
        );
    }

    /// Runs `n_cycles` cycles of `length_cycle` moves without measuring.
    pub fn warmup(&mut self, wdata: &WorkData, n_cycles: u64, length_cycle: u64) {
        info!("Warming up: {} cycles of {} moves", n_cycles, length_cycle);
        for _ in 0..n_cycles {
            for _ in 0..length_cycle {
                self.step(wdata);
            }
        }
        debug!("Warm-up done, sign {}", self.sign);
    }

    /// Runs `n_cycles` cycles of `length_cycle` moves and calls every measure
    /// at the end of each cycle.
    pub fn run(
        &mut self,
        wdata: &WorkData,
        n_cycles: u64,
        length_cycle: u64,
        measures: &mut [Box<dyn Measure>],
    ) {
        info!("Accumulating: {} cycles of {} moves", n_cycles, length_cycle);
        let report = (n_cycles / 10).max(1);
        for cycle in 0..n_cycles {
            for _ in 0..length_cycle {
                self.step(wdata);
            }
            self.n_measures += 1;
            self.z += self.sign;
            for measure in measures.iter_mut() {
                measure.accumulate(&self.state, wdata, self.sign);
            }
            if (cycle + 1) % report == 0 {
                info!(
                    "Cycle {}/{}: {} segments, sign {}",
                    cycle + 1,
                    n_cycles,
                    self.state.config.n_segments(),
                    self.sign
                );
            }
        }
    }

    /// Acceptance rate of each move, in the order the moves were added.
    pub fn acceptance_rates(&self) -> Vec<(&'static str, f64)> {
        self.moves
            .iter()
            .map(|mv| {
                let accepted = mv.accept_count();
                let total = accepted + mv.reject_count();
                let rate = if total == 0 {
                    0.0
                } else {
                    accepted as f64 / total as f64
                };
                (mv.name(), rate)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::det::hybridization::{BathLevel, Hybridization};
    use crate::model::imtime_function::ImTimeFunction;
    use crate::model::params::{Params, RetardedInteraction};
    use crate::moves::insert_segment::InsertSegment;
    use crate::moves::regroup_segment::RegroupSegment;
    use crate::moves::remove_segment::RemoveSegment;
    use crate::moves::split_segment::SplitSegment;
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn bath(beta: f64) -> Hybridization {
        Hybridization::Bath {
            beta,
            levels: vec![
                BathLevel {
                    energy: -0.8,
                    couplings: vec![0.7],
                },
                BathLevel {
                    energy: 0.0,
                    couplings: vec![0.5],
                },
                BathLevel {
                    energy: 1.1,
                    couplings: vec![0.6],
                },
            ],
        }
    }

    fn chain(params: &Params, seed: u64) -> MarkovChain<StdRng> {
        let moves: Vec<Box<dyn MonteCarloMove<StdRng>>> = vec![
            Box::new(InsertSegment::new()),
            Box::new(RemoveSegment::new()),
            Box::new(SplitSegment::new()),
            Box::new(RegroupSegment::new()),
        ];
        MarkovChain::new(
            McState::new(params),
            moves,
            vec![1.0, 1.0, 1.0, 1.0],
            StdRng::seed_from_u64(seed),
        )
    }

    #[test]
    fn test_long_run_keeps_invariants() {
        let beta = 5.0;
        let params = Params::new(
            beta,
            vec![1.0, 0.5],
            vec![vec![0.0, 1.5], vec![1.5, 0.0]],
            vec![bath(beta), bath(beta)],
        );
        let wdata = WorkData::new(&params);
        let mut chain = chain(&params, 1234);
        chain.set_check_invariants(true);

        let mut accepted = 0;
        for _ in 0..5000 {
            if chain.step(&wdata) {
                accepted += 1;
            }
            assert_eq!(chain.sign(), chain.state.sign());
        }
        assert!(accepted > 100, "Only {} moves accepted", accepted);
        assert_eq!(chain.sign(), chain.state.sign_from_scratch());
        assert_eq!(chain.sign(), 1.0);

        let rates = chain.acceptance_rates();
        assert_eq!(rates[0].0, "insert_segment");
        assert!(rates.iter().all(|&(_, r)| r > 0.0 && r < 1.0));
    }

    /// Retarded interaction mediated by a single boson of frequency `omega`,
    /// coupled with strength `g` to every color.
    fn holstein(beta: f64, n_color: usize, g: f64, omega: f64) -> RetardedInteraction {
        let scale = g * g / (omega * omega);
        let half = 0.5 * omega * beta;
        let k = ImTimeFunction::from_fn(beta, 201, n_color, |tau| {
            let value = -scale * ((omega * tau - half).cosh() - half.cosh()) / half.sinh();
            Array2::from_elem((n_color, n_color), value)
        });
        let kprime = ImTimeFunction::from_fn(beta, 201, n_color, |tau| {
            let value = -scale * omega * (omega * tau - half).sinh() / half.sinh();
            Array2::from_elem((n_color, n_color), value)
        });
        RetardedInteraction { k, kprime }
    }

    #[test]
    fn test_retarded_interaction_keeps_invariants() {
        let beta = 4.0;
        let u = vec![
            vec![0.0, 0.5, 0.5],
            vec![0.5, 0.0, 0.5],
            vec![0.5, 0.5, 0.0],
        ];
        let mut params = Params::new(
            beta,
            vec![0.8, 0.6, 0.4],
            u,
            vec![bath(beta), bath(beta), bath(beta)],
        );
        params.retarded = Some(holstein(beta, 3, 0.6, 1.5));
        let wdata = WorkData::new(&params);
        assert!(wdata.has_dt);
        let mut chain = chain(&params, 2024);
        chain.set_check_invariants(true);

        let mut accepted = 0;
        for _ in 0..5000 {
            if chain.step(&wdata) {
                accepted += 1;
            }
        }
        assert!(accepted > 100, "Only {} moves accepted", accepted);
        assert_eq!(chain.sign(), 1.0);
        assert_eq!(chain.sign(), chain.state.sign_from_scratch());
    }

    #[test]
    fn test_measures_called_once_per_cycle() {
        let params = Params::new(2.0, vec![0.3], vec![vec![0.0]], vec![bath(2.0)]);
        let wdata = WorkData::new(&params);
        let mut chain = chain(&params, 7);
        let mut measures: Vec<Box<dyn Measure>> = vec![Box::new(
            crate::measures::average_sign::AverageSign::new(),
        )];
        chain.warmup(&wdata, 10, 5);
        assert_eq!(chain.n_measures(), 0);
        chain.run(&wdata, 25, 5, &mut measures);
        assert_eq!(chain.n_measures(), 25);
        assert!((chain.z() - 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_without_moves_nothing_happens() {
        let params = Params::new(2.0, vec![0.3], vec![vec![0.0]], vec![bath(2.0)]);
        let wdata = WorkData::new(&params);
        let mut chain: MarkovChain<StdRng> = MarkovChain::new(
            McState::new(&params),
            Vec::new(),
            Vec::new(),
            StdRng::seed_from_u64(0),
        );
        assert!(!chain.step(&wdata));
        chain.push_move(InsertSegment::new(), 1.0);
        assert_eq!(chain.weights(), &[1.0]);
    }

    #[test]
    #[should_panic(expected = "Weights must be non-negative")]
    fn test_negative_weight_panics() {
        let params = Params::new(2.0, vec![0.3], vec![vec![0.0]], vec![bath(2.0)]);
        let moves: Vec<Box<dyn MonteCarloMove<StdRng>>> = vec![Box::new(InsertSegment::new())];
        MarkovChain::new(
            McState::new(&params),
            moves,
            vec![-1.0],
            StdRng::seed_from_u64(0),
        );
    }
}
