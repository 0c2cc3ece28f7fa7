//! Measurement accumulators. Each one reads the committed state once per
//! cycle, weighted by the running sign, and writes its normalized result into
//! [`Results`].

pub mod average_sign;
pub mod densities;
pub mod g_f_tau;
pub mod perturbation_order;

use crate::model::work_data::WorkData;
use crate::results::Results;
use crate::state::McState;

pub trait Measure {
    fn name(&self) -> &'static str;

    /// Adds the contribution of the current configuration with sign `sign`.
    fn accumulate(&mut self, state: &McState, wdata: &WorkData, sign: f64);

    /// Normalizes the accumulated data and stores it into `results`.
    fn collect_results(&self, results: &mut Results);
}
