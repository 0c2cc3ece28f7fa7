use super::imtime_function::ImTimeFunction;
use super::params::Params;
use ndarray::{Array1, Array2};

/// Model constants read by the moves and measures.
///
/// Built once from validated [`Params`] and never mutated during the run.
#[derive(Clone, Debug)]
pub struct WorkData {
    pub beta: f64,
    pub mu: Array1<f64>,
    pub u: Array2<f64>,
    /// Retarded density-density interaction is active.
    pub has_dt: bool,
    /// Retarded spin-spin interaction is active.
    pub has_jperp: bool,
    k: Option<ImTimeFunction>,
    kprime: Option<ImTimeFunction>,
    kprime_spin: Option<ImTimeFunction>,
}

impl WorkData {
    /// # Panics
    /// Panics if the parameters are inconsistent; call [`Params::validate`]
    /// first to get an error instead.
    pub fn new(params: &Params) -> Self {
        if let Err(e) = params.validate() {
            panic!("Invalid parameters: {}", e);
        }
        let n = params.n_color();
        let u = Array2::from_shape_fn((n, n), |(c1, c2)| params.u[c1][c2]);
        let (k, kprime) = match &params.retarded {
            Some(r) => (Some(r.k.clone()), Some(r.kprime.clone())),
            None => (None, None),
        };
        Self {
            beta: params.beta,
            mu: Array1::from(params.mu.clone()),
            u,
            has_dt: params.retarded.is_some(),
            has_jperp: params.kprime_spin.is_some(),
            k,
            kprime,
            kprime_spin: params.kprime_spin.clone(),
        }
    }

    pub fn n_color(&self) -> usize {
        self.mu.len()
    }

    /// Retarded kernel `K(tau)`.
    ///
    /// # Panics
    /// Panics if no retarded interaction is active.
    pub fn k(&self) -> &ImTimeFunction {
        match &self.k {
            Some(k) => k,
            None => panic!("K(tau) requested but no retarded interaction is active"),
        }
    }

    /// Derivative `K'(tau)` of the retarded kernel.
    ///
    /// # Panics
    /// Panics if no retarded interaction is active.
    pub fn kprime(&self) -> &ImTimeFunction {
        match &self.kprime {
            Some(k) => k,
            None => panic!("K'(tau) requested but no retarded interaction is active"),
        }
    }

    /// Derivative of the spin-spin kernel.
    ///
    /// # Panics
    /// Panics if no spin-spin interaction is active.
    pub fn kprime_spin(&self) -> &ImTimeFunction {
        match &self.kprime_spin {
            Some(k) => k,
            None => panic!("K'_perp(tau) requested but no spin-spin interaction is active"),
        }
    }
}
