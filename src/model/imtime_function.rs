use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

/// A matrix-valued function of imaginary time tabulated on a uniform mesh.
///
/// The mesh has `n_tau` points `tau_k = k * beta / (n_tau - 1)` covering the
/// closed interval `[0, beta]`. Values in between are linearly interpolated.
/// Retarded interaction kernels and tabulated hybridization functions are stored
/// in this form, with indices `[tau, a, b]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImTimeFunction {
    beta: f64,
    values: Array3<f64>,
}

impl ImTimeFunction {
    /// Creates a tabulated function.
    ///
    /// # Panics
    /// Panics if `beta` is not positive or the mesh has less than 2 points.
    pub fn new(beta: f64, values: Array3<f64>) -> Self {
        assert!(beta > 0.0, "beta must be positive");
        assert!(
            values.shape()[0] >= 2,
            "The imaginary-time mesh needs at least 2 points, got {}",
            values.shape()[0]
        );
        Self { beta, values }
    }

    /// Tabulates `f` on a mesh of `n_tau` points.
    pub fn from_fn<F>(beta: f64, n_tau: usize, dim: usize, f: F) -> Self
    where
        F: Fn(f64) -> Array2<f64>,
    {
        assert!(n_tau >= 2, "The imaginary-time mesh needs at least 2 points");
        let mut values = Array3::zeros((n_tau, dim, dim));
        let delta = beta / (n_tau - 1) as f64;
        for k in 0..n_tau {
            let m = f(k as f64 * delta);
            assert_eq!(m.shape(), &[dim, dim], "Tabulated matrix has wrong shape");
            values.slice_mut(ndarray::s![k, .., ..]).assign(&m);
        }
        Self { beta, values }
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn n_tau(&self) -> usize {
        self.values.shape()[0]
    }

    /// Size of the (square) matrix at each mesh point.
    pub fn dim(&self) -> usize {
        self.values.shape()[1]
    }

    pub fn values(&self) -> &Array3<f64> {
        &self.values
    }

    /// Linearly interpolated element `[a, b]` at time `tau` in `[0, beta]`.
    pub fn value(&self, tau: f64, a: usize, b: usize) -> f64 {
        debug_assert!(
            (-1e-12..=self.beta * (1.0 + 1e-12)).contains(&tau),
            "tau = {} outside of [0, beta]",
            tau
        );
        let n = self.n_tau();
        let x = (tau / self.beta * (n - 1) as f64).clamp(0.0, (n - 1) as f64);
        let k = (x.floor() as usize).min(n - 2);
        let w = x - k as f64;
        (1.0 - w) * self.values[[k, a, b]] + w * self.values[[k + 1, a, b]]
    }

    /// Interpolated matrix at time `tau`.
    pub fn matrix(&self, tau: f64) -> Array2<f64> {
        let dim = self.dim();
        Array2::from_shape_fn((dim, dim), |(a, b)| self.value(tau, a, b))
    }
}
