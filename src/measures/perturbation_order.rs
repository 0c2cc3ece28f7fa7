use super::Measure;
use crate::model::work_data::WorkData;
use crate::results::Results;
use crate::state::McState;

/// Histograms of the number of segments, in total and per color.
///
/// A full line counts as zero segments: it carries no operators.
#[derive(Clone, Debug)]
pub struct PerturbationOrder {
    total: Vec<u64>,
    per_color: Vec<Vec<u64>>,
    n_measures: u64,
}

fn record(histogram: &mut Vec<u64>, order: usize) {
    if histogram.len() <= order {
        histogram.resize(order + 1, 0);
    }
    histogram[order] += 1;
}

fn normalize(histogram: &[u64], n_measures: u64) -> Vec<f64> {
    histogram
        .iter()
        .map(|&count| count as f64 / n_measures as f64)
        .collect()
}

impl PerturbationOrder {
    pub fn new(n_color: usize) -> Self {
        Self {
            total: Vec::new(),
            per_color: vec![Vec::new(); n_color],
            n_measures: 0,
        }
    }
}

impl Measure for PerturbationOrder {
    fn name(&self) -> &'static str {
        "perturbation_order"
    }

    fn accumulate(&mut self, state: &McState, _wdata: &WorkData, _sign: f64) {
        self.n_measures += 1;
        let mut total = 0;
        for (histogram, det) in self.per_color.iter_mut().zip(&state.dets) {
            record(histogram, det.size());
            total += det.size();
        }
        record(&mut self.total, total);
    }

    fn collect_results(&self, results: &mut Results) {
        results.perturbation_order_total = Some(normalize(&self.total, self.n_measures));
        results.perturbation_order = Some(
            self.per_color
                .iter()
                .map(|h| normalize(h, self.n_measures))
                .collect(),
        );
    }
}
