use super::det_manager::MatrixBuilder;
use crate::model::imtime_function::ImTimeFunction;
use crate::time::tau::Tau;
use serde::{Deserialize, Serialize};

/// Key of a row or column of the hybridization matrix: a time and an orbital
/// index inside the color's block.
pub type DetKey = (Tau, usize);

/// A single level of a non-interacting bath coupled to the impurity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BathLevel {
    pub energy: f64,
    /// Hopping amplitude to each orbital of the block.
    pub couplings: Vec<f64>,
}

/// Hybridization function `Delta(tau)` of one color, for `tau` in `[0, beta]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Hybridization {
    /// Discrete bath, evaluated analytically:
    /// `Delta_ab(tau) = -sum_l V_la V_lb exp(-e_l tau) / (1 + exp(-beta e_l))`.
    Bath { beta: f64, levels: Vec<BathLevel> },
    /// Values given on a uniform imaginary-time mesh.
    Tabulated(ImTimeFunction),
}

impl Hybridization {
    pub fn beta(&self) -> f64 {
        match self {
            Hybridization::Bath { beta, .. } => *beta,
            Hybridization::Tabulated(f) => f.beta(),
        }
    }

    /// Number of orbitals in the block.
    pub fn dim(&self) -> usize {
        match self {
            Hybridization::Bath { levels, .. } => {
                levels.first().map(|l| l.couplings.len()).unwrap_or(1)
            }
            Hybridization::Tabulated(f) => f.dim(),
        }
    }

    /// `Delta_ab(tau)` for `tau` in `[0, beta]`.
    pub fn value(&self, tau: f64, a: usize, b: usize) -> f64 {
        match self {
            Hybridization::Bath { beta, levels } => levels
                .iter()
                .map(|level| {
                    let e = level.energy;
                    // Fermi factor written to avoid overflow for either sign of e
                    let weight = if e >= 0.0 {
                        (-e * tau).exp() / (1.0 + (-beta * e).exp())
                    } else {
                        (e * (beta - tau)).exp() / ((beta * e).exp() + 1.0)
                    };
                    -level.couplings[a] * level.couplings[b] * weight
                })
                .sum(),
            Hybridization::Tabulated(f) => f.value(tau, a, b),
        }
    }
}

/// Builds hybridization matrix elements from creation keys (rows) and
/// annihilation keys (columns).
///
/// The element for a creation operator at `x` and an annihilation operator at
/// `y` is `Delta(x - y)` extended antiperiodically: the cyclic distance `x - y`
/// is always in `[0, beta]`, and the value changes sign when `x < y`.
#[derive(Clone, Debug)]
pub struct HybridizationAdaptor {
    delta: Hybridization,
}

impl HybridizationAdaptor {
    pub fn new(delta: Hybridization) -> Self {
        Self { delta }
    }

    pub fn hybridization(&self) -> &Hybridization {
        &self.delta
    }
}

impl MatrixBuilder for HybridizationAdaptor {
    type X = DetKey;
    type Y = DetKey;

    fn element(&self, x: &DetKey, y: &DetKey) -> f64 {
        let value = self.delta.value(f64::from(x.0 - y.0), x.1, y.1);
        if x.0 >= y.0 {
            value
        } else {
            -value
        }
    }
}
