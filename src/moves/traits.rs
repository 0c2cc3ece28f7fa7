use crate::model::work_data::WorkData;
use crate::state::McState;

/// A Monte Carlo move on the segment configuration.
///
/// The driving chain calls `attempt`, draws a uniform number, and then calls
/// exactly one of `accept` or `reject`. A move keeps only its own proposal
/// between these calls; the state and the weight data are passed in.
pub trait MonteCarloMove<R>
where
    R: rand::Rng,
{
    /// Name used in logs and acceptance statistics.
    fn name(&self) -> &'static str;

    /// Proposes a change and returns its Metropolis weight. Zero means the
    /// proposal must be rejected.
    ///
    /// The configuration is not modified; a determinant trial may be left
    /// pending.
    fn attempt(&mut self, state: &mut McState, wdata: &WorkData, rng: &mut R) -> f64;

    /// Commits the last proposal and returns the ratio of the configuration
    /// signs.
    fn accept(&mut self, state: &mut McState, wdata: &WorkData) -> f64;

    /// Discards the last proposal. The state is left as before `attempt`.
    fn reject(&mut self, state: &mut McState);

    fn accept_count(&self) -> usize;

    fn reject_count(&self) -> usize;
}
