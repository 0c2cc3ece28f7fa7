use crate::measures::average_sign::AverageSign;
use crate::measures::densities::Densities;
use crate::measures::g_f_tau::GFTau;
use crate::measures::perturbation_order::PerturbationOrder;
use crate::measures::Measure;
use crate::model::params::Params;
use crate::model::work_data::WorkData;
use crate::moves::insert_segment::InsertSegment;
use crate::moves::markov_chain::MarkovChain;
use crate::moves::regroup_segment::RegroupSegment;
use crate::moves::remove_segment::RemoveSegment;
use crate::moves::split_segment::SplitSegment;
use crate::moves::traits::MonteCarloMove;
use crate::results::Results;
use crate::state::McState;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// One independent Monte Carlo replica: weight data, Markov chain and measures
/// built from a parameter set.
///
/// Replicas with different seeds can run in parallel; their [`Results`] are
/// combined with [`Results::merge`].
pub struct Solver {
    params: Params,
    wdata: WorkData,
    chain: MarkovChain<StdRng>,
    measures: Vec<Box<dyn Measure>>,
}

impl Solver {
    /// # Panics
    /// Panics if the parameters are invalid; use [`Params::validate`] or
    /// [`Params::load_from_file`] to get an error instead.
    pub fn new(params: Params) -> Self {
        let wdata = WorkData::new(&params);

        let mut moves: Vec<Box<dyn MonteCarloMove<StdRng>>> = Vec::new();
        let mut weights = Vec::new();
        if params.move_insert_segment {
            moves.push(Box::new(InsertSegment::new()));
            weights.push(1.0);
        }
        if params.move_remove_segment {
            moves.push(Box::new(RemoveSegment::new()));
            weights.push(1.0);
        }
        if params.move_split_segment {
            moves.push(Box::new(SplitSegment::new()));
            weights.push(1.0);
        }
        if params.move_regroup_segment {
            moves.push(Box::new(RegroupSegment::new()));
            weights.push(1.0);
        }
        let mut chain = MarkovChain::new(
            McState::new(&params),
            moves,
            weights,
            StdRng::seed_from_u64(params.seed),
        );
        chain.set_check_invariants(params.check_invariants);

        let n_color = params.n_color();
        let mut measures: Vec<Box<dyn Measure>> = Vec::new();
        if params.measure_g_tau {
            measures.push(Box::new(GFTau::new(
                n_color,
                params.beta,
                params.n_tau,
                params.measure_f_tau,
            )));
        }
        if params.measure_densities {
            measures.push(Box::new(Densities::new(n_color)));
        }
        if params.measure_perturbation_order {
            measures.push(Box::new(PerturbationOrder::new(n_color)));
        }
        if params.measure_average_sign {
            measures.push(Box::new(AverageSign::new()));
        }

        Self {
            params,
            wdata,
            chain,
            measures,
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn state(&self) -> &McState {
        &self.chain.state
    }

    /// Warms up, accumulates the measures and returns their results.
    pub fn run(&mut self) -> Results {
        let p = &self.params;
        info!(
            "Running {} colors at beta = {}, seed {}",
            p.n_color(),
            p.beta,
            p.seed
        );
        self.chain
            .warmup(&self.wdata, p.n_warmup_cycles, p.length_cycle);
        self.chain
            .run(&self.wdata, p.n_cycles, p.length_cycle, &mut self.measures);

        for (name, rate) in self.chain.acceptance_rates() {
            info!("Acceptance rate of {}: {:.4}", name, rate);
        }

        let mut results = Results::new(p.beta);
        results.n_measures = self.chain.n_measures();
        results.z = self.chain.z();
        for measure in &self.measures {
            info!("Collecting {}", measure.name());
            measure.collect_results(&mut results);
        }
        results
    }
}
