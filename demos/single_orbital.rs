use ctseg::det::hybridization::{BathLevel, Hybridization};
use ctseg::model::params::Params;
use ctseg::solver::Solver;
use env_logger::Builder;
use log::{error, info};
use std::env;

const BETA: f64 = 10.0;
const U: f64 = 2.0;

/// Half-filled Anderson impurity with a symmetric two-level bath per spin.
fn default_params() -> Params {
    let bath = Hybridization::Bath {
        beta: BETA,
        levels: vec![
            BathLevel {
                energy: -1.0,
                couplings: vec![0.5],
            },
            BathLevel {
                energy: 1.0,
                couplings: vec![0.5],
            },
        ],
    };
    let mut params = Params::new(
        BETA,
        vec![0.5 * U, 0.5 * U],
        vec![vec![0.0, U], vec![U, 0.0]],
        vec![bath.clone(), bath],
    );
    params.n_tau = 201;
    params.n_cycles = 50_000;
    params.length_cycle = 20;
    params.n_warmup_cycles = 2_000;
    params
}

fn main() {
    Builder::new().filter_level(log::LevelFilter::Info).init();

    // Usage: single_orbital [params.json [results.json]]
    let args: Vec<String> = env::args().collect();
    let params = match args.get(1) {
        Some(path) => match Params::load_from_file(path) {
            Ok(p) => p,
            Err(e) => {
                error!("Cannot load parameters from {}: {}", path, e);
                return;
            }
        },
        None => default_params(),
    };
    info!("beta = {}", params.beta);
    info!("mu = {:?}", params.mu);
    info!("U = {:?}", params.u);

    let mut solver = Solver::new(params);
    let results = solver.run();

    if let Some(densities) = &results.densities {
        info!("Densities: {:?}", densities);
    }
    if let Some(sign) = results.average_sign {
        info!("Average sign: {}", sign);
    }
    if let Some(hist) = &results.perturbation_order_total {
        let mean: f64 = hist.iter().enumerate().map(|(k, p)| k as f64 * p).sum();
        info!("Mean perturbation order: {:.3}", mean);
    }
    if let Some(g_tau) = &results.g_tau {
        let last = g_tau.ncols() - 1;
        info!(
            "G(0+) = {:?}, G(beta-) = {:?}",
            g_tau.column(0).to_vec(),
            g_tau.column(last).to_vec()
        );
    }

    if let Some(path) = args.get(2) {
        match results.save_to_file(path) {
            Ok(()) => info!("Results written to {}", path),
            Err(e) => error!("Cannot write results to {}: {}", path, e),
        }
    }
}
