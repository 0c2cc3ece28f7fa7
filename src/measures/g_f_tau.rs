use super::Measure;
use crate::configuration::seglist::{k_overlap_single, n_tau};
use crate::model::work_data::WorkData;
use crate::results::Results;
use crate::state::McState;
use crate::time::tau::Tau;
use ndarray::Array2;

/// Imaginary-time Green's function `G_c(tau)` and, optionally, the improved
/// estimator `F_c(tau)`, accumulated from the inverse hybridization matrices.
///
/// Each pair of an annihilation key `y` and a creation key `x` of a color
/// contributes `M[y, x]` to the mesh point closest to `y - x`, with a sign flip
/// when `y` lies before `x` (antiperiodicity).
#[derive(Clone, Debug)]
pub struct GFTau {
    beta: f64,
    delta_tau: f64,
    g_tau: Array2<f64>,
    f_tau: Option<Array2<f64>>,
    z: f64,
}

impl GFTau {
    /// # Panics
    /// Panics if `n_tau < 2`.
    pub fn new(n_color: usize, beta: f64, n_tau: usize, measure_f_tau: bool) -> Self {
        assert!(n_tau >= 2, "The tau mesh needs at least 2 points");
        Self {
            beta,
            delta_tau: beta / (n_tau - 1) as f64,
            g_tau: Array2::zeros((n_color, n_tau)),
            f_tau: measure_f_tau.then(|| Array2::zeros((n_color, n_tau))),
            z: 0.0,
        }
    }

    fn closest_mesh_point(&self, dtau: f64) -> usize {
        let last = self.g_tau.ncols() - 1;
        ((dtau / self.delta_tau).round() as usize).min(last)
    }

    /// Interaction felt by an annihilation operator of `color` at `tau`.
    fn f_prefactor(state: &McState, wdata: &WorkData, color: usize, tau: Tau) -> f64 {
        let mut i_tau = 0.0;
        for (c, sl) in state.config.seglists().iter().enumerate() {
            let ntau = n_tau(tau, sl);
            if c != color {
                i_tau += wdata.u[[c, color]] * ntau;
            }
            if wdata.has_dt {
                let kprime = wdata.kprime();
                i_tau -= k_overlap_single(sl, tau, false, kprime, c, color);
                if c == color {
                    i_tau -= 2.0 * kprime.value(0.0, c, c);
                }
            }
            if wdata.has_jperp {
                let kprime_spin = wdata.kprime_spin();
                i_tau -= 4.0 * kprime_spin.value(0.0, c, color) * ntau;
                i_tau -= 2.0 * k_overlap_single(sl, tau, false, kprime_spin, c, color);
            }
        }
        i_tau
    }

    fn normalized(&self, data: &Array2<f64>) -> Array2<f64> {
        let mut out = data / (-self.beta * self.z * self.delta_tau);
        let last = out.ncols() - 1;
        // The end points only collect half a bin
        for mut row in out.rows_mut() {
            row[0] *= 2.0;
            row[last] *= 2.0;
        }
        out
    }
}

impl Measure for GFTau {
    fn name(&self) -> &'static str {
        "g_f_tau"
    }

    fn accumulate(&mut self, state: &McState, wdata: &WorkData, sign: f64) {
        self.z += sign;
        for (color, det) in state.dets.iter().enumerate() {
            let n = det.size();
            for j in 0..n {
                let y = det.get_y(j);
                let f_fact = if self.f_tau.is_some() {
                    Self::f_prefactor(state, wdata, color, y.0)
                } else {
                    0.0
                };
                for i in 0..n {
                    let x = det.get_x(i);
                    let val = (if y.0 >= x.0 { sign } else { -sign }) * det.inverse_matrix(j, i);
                    let bin = self.closest_mesh_point(f64::from(y.0 - x.0));
                    self.g_tau[[color, bin]] += val;
                    if let Some(f_tau) = self.f_tau.as_mut() {
                        f_tau[[color, bin]] += val * f_fact;
                    }
                }
            }
        }
    }

    fn collect_results(&self, results: &mut Results) {
        results.g_tau = Some(self.normalized(&self.g_tau));
        results.f_tau = self.f_tau.as_ref().map(|f| self.normalized(f));
    }
}
