use super::Measure;
use crate::model::work_data::WorkData;
use crate::results::Results;
use crate::state::McState;

/// Mean of the configuration sign over the measurements.
#[derive(Clone, Debug, Default)]
pub struct AverageSign {
    sum: f64,
    n_measures: u64,
}

impl AverageSign {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Measure for AverageSign {
    fn name(&self) -> &'static str {
        "average_sign"
    }

    fn accumulate(&mut self, _state: &McState, _wdata: &WorkData, sign: f64) {
        self.sum += sign;
        self.n_measures += 1;
    }

    fn collect_results(&self, results: &mut Results) {
        results.average_sign = Some(self.sum / self.n_measures as f64);
    }
}
