use super::Measure;
use crate::configuration::seglist::occupied_length;
use crate::model::work_data::WorkData;
use crate::results::Results;
use crate::state::McState;
use ndarray::Array1;

/// Average occupation of each color: the occupied fraction of the cycle.
#[derive(Clone, Debug)]
pub struct Densities {
    densities: Array1<f64>,
    z: f64,
}

impl Densities {
    pub fn new(n_color: usize) -> Self {
        Self {
            densities: Array1::zeros(n_color),
            z: 0.0,
        }
    }
}

impl Measure for Densities {
    fn name(&self) -> &'static str {
        "densities"
    }

    fn accumulate(&mut self, state: &McState, wdata: &WorkData, sign: f64) {
        self.z += sign;
        for (c, sl) in state.config.seglists().iter().enumerate() {
            self.densities[c] += sign * occupied_length(sl) / wdata.beta;
        }
    }

    fn collect_results(&self, results: &mut Results) {
        results.densities = Some((&self.densities / self.z).to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::segment::Segment;
    use crate::det::hybridization::Hybridization;
    use crate::model::params::Params;
    use crate::time::tau::Tau;

    #[test]
    fn test_occupied_fraction() {
        let empty = Hybridization::Bath {
            beta: 2.0,
            levels: vec![],
        };
        let p = Params::new(
            2.0,
            vec![0.0, 0.0],
            vec![vec![0.0, 0.0], vec![0.0, 0.0]],
            vec![empty.clone(), empty],
        );
        let wdata = WorkData::new(&p);
        let mut state = McState::new(&p);
        state.config.insert_segment(
            0,
            Segment::new(Tau::from_f64(0.2, 2.0), Tau::from_f64(1.7, 2.0)),
        );
        state.config.set_full_line(1);

        let mut measure = Densities::new(2);
        measure.accumulate(&state, &wdata, 1.0);
        measure.accumulate(&McState::new(&p), &wdata, 1.0);
        let mut results = Results::new(2.0);
        measure.collect_results(&mut results);
        let n = results.densities.unwrap();
        assert!((n[0] - 0.125).abs() < 1e-12, "got {}", n[0]);
        assert!((n[1] - 0.5).abs() < 1e-12);
    }
}
