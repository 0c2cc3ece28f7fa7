use super::imtime_function::ImTimeFunction;
use crate::det::hybridization::Hybridization;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, BufWriter};

/// Retarded density-density interaction: the kernel `K(tau)` and its
/// derivative `K'(tau)`, both matrix-valued over colors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetardedInteraction {
    pub k: ImTimeFunction,
    pub kprime: ImTimeFunction,
}

fn default_n_tau() -> usize {
    10_001
}

fn default_n_cycles() -> u64 {
    10_000
}

fn default_length_cycle() -> u64 {
    50
}

fn default_n_warmup_cycles() -> u64 {
    1_000
}

fn default_seed() -> u64 {
    34_788
}

fn default_true() -> bool {
    true
}

/// Parameters of a run, read from a JSON file.
///
/// The number of colors is the length of `mu`. Only the model (`beta`, `mu`,
/// `u`, `hybridization`) is mandatory; run controls have defaults.
///
/// # Examples
/// ```
/// use ctseg::model::params::Params;
///
/// let json = r#"{
///     "beta": 10.0,
///     "mu": [0.5, 0.5],
///     "u": [[0.0, 1.0], [1.0, 0.0]],
///     "hybridization": [
///         {"kind": "bath", "beta": 10.0, "levels": [{"energy": 0.0, "couplings": [0.5]}]},
///         {"kind": "bath", "beta": 10.0, "levels": [{"energy": 0.0, "couplings": [0.5]}]}
///     ]
/// }"#;
/// let params: Params = serde_json::from_str(json).unwrap();
/// assert_eq!(params.n_color(), 2);
/// assert!(params.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// Inverse temperature, the period of the imaginary-time axis.
    pub beta: f64,
    /// Chemical potential of each color.
    pub mu: Vec<f64>,
    /// Instantaneous density-density interaction between colors.
    pub u: Vec<Vec<f64>>,
    /// Hybridization function of each color.
    pub hybridization: Vec<Hybridization>,
    /// Retarded density-density interaction, if any.
    #[serde(default)]
    pub retarded: Option<RetardedInteraction>,
    /// Derivative of the retarded spin-spin kernel, if a spin-spin term is present.
    #[serde(default)]
    pub kprime_spin: Option<ImTimeFunction>,

    /// Number of points of the G(tau) mesh.
    #[serde(default = "default_n_tau")]
    pub n_tau: usize,
    #[serde(default = "default_n_cycles")]
    pub n_cycles: u64,
    /// Number of moves between two measurements.
    #[serde(default = "default_length_cycle")]
    pub length_cycle: u64,
    #[serde(default = "default_n_warmup_cycles")]
    pub n_warmup_cycles: u64,
    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default = "default_true")]
    pub move_insert_segment: bool,
    #[serde(default = "default_true")]
    pub move_remove_segment: bool,
    /// Cutting holes into segments and closing them; needed to reach the full line.
    #[serde(default = "default_true")]
    pub move_split_segment: bool,
    #[serde(default = "default_true")]
    pub move_regroup_segment: bool,

    #[serde(default = "default_true")]
    pub measure_g_tau: bool,
    /// Improved estimator F(tau); requires `measure_g_tau`.
    #[serde(default)]
    pub measure_f_tau: bool,
    #[serde(default = "default_true")]
    pub measure_densities: bool,
    #[serde(default = "default_true")]
    pub measure_perturbation_order: bool,
    #[serde(default = "default_true")]
    pub measure_average_sign: bool,

    /// Recompute the configuration sign from scratch after every accepted move.
    #[serde(default)]
    pub check_invariants: bool,
}

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

fn check_kernel(name: &str, kernel: &ImTimeFunction, beta: f64, n_color: usize) -> io::Result<()> {
    if (kernel.beta() - beta).abs() > 1e-12 * beta {
        return Err(invalid(format!(
            "{} is tabulated for beta = {}, expected {}",
            name,
            kernel.beta(),
            beta
        )));
    }
    if kernel.dim() != n_color {
        return Err(invalid(format!(
            "{} must be a {}x{} matrix, got dimension {}",
            name,
            n_color,
            n_color,
            kernel.dim()
        )));
    }
    Ok(())
}

impl Params {
    /// Parameters with default run controls for the given model.
    pub fn new(beta: f64, mu: Vec<f64>, u: Vec<Vec<f64>>, hybridization: Vec<Hybridization>) -> Self {
        Self {
            beta,
            mu,
            u,
            hybridization,
            retarded: None,
            kprime_spin: None,
            n_tau: default_n_tau(),
            n_cycles: default_n_cycles(),
            length_cycle: default_length_cycle(),
            n_warmup_cycles: default_n_warmup_cycles(),
            seed: default_seed(),
            move_insert_segment: true,
            move_remove_segment: true,
            move_split_segment: true,
            move_regroup_segment: true,
            measure_g_tau: true,
            measure_f_tau: false,
            measure_densities: true,
            measure_perturbation_order: true,
            measure_average_sign: true,
            check_invariants: false,
        }
    }

    pub fn n_color(&self) -> usize {
        self.mu.len()
    }

    /// Checks the consistency of the model and run controls.
    ///
    /// # Errors
    /// Returns an `InvalidData` error describing the first problem found.
    pub fn validate(&self) -> io::Result<()> {
        let n = self.n_color();
        if !(self.beta > 0.0 && self.beta.is_finite()) {
            return Err(invalid(format!("beta must be positive, got {}", self.beta)));
        }
        if n == 0 {
            return Err(invalid("At least one color is required".to_string()));
        }
        if self.u.len() != n || self.u.iter().any(|row| row.len() != n) {
            return Err(invalid(format!("u must be a {}x{} matrix", n, n)));
        }
        for c1 in 0..n {
            if self.u[c1][c1] != 0.0 {
                return Err(invalid(format!(
                    "u must have a zero diagonal, u[{}][{}] = {}",
                    c1, c1, self.u[c1][c1]
                )));
            }
            for c2 in 0..c1 {
                if self.u[c1][c2] != self.u[c2][c1] {
                    return Err(invalid(format!(
                        "u must be symmetric, u[{}][{}] = {} but u[{}][{}] = {}",
                        c1, c2, self.u[c1][c2], c2, c1, self.u[c2][c1]
                    )));
                }
            }
        }
        if self.hybridization.len() != n {
            return Err(invalid(format!(
                "Expected {} hybridization functions, got {}",
                n,
                self.hybridization.len()
            )));
        }
        for (c, delta) in self.hybridization.iter().enumerate() {
            if (delta.beta() - self.beta).abs() > 1e-12 * self.beta {
                return Err(invalid(format!(
                    "Hybridization of color {} has beta = {}, expected {}",
                    c,
                    delta.beta(),
                    self.beta
                )));
            }
            if delta.dim() != 1 {
                return Err(invalid(format!(
                    "Hybridization of color {} must be a 1x1 block, got dimension {}",
                    c,
                    delta.dim()
                )));
            }
            if let Hybridization::Bath { levels, .. } = delta {
                if let Some(l) = levels.iter().position(|level| level.couplings.len() != 1) {
                    return Err(invalid(format!(
                        "Bath level {} of color {} has {} couplings, expected 1",
                        l,
                        c,
                        levels[l].couplings.len()
                    )));
                }
            }
        }
        if let Some(retarded) = &self.retarded {
            check_kernel("K", &retarded.k, self.beta, n)?;
            check_kernel("K'", &retarded.kprime, self.beta, n)?;
        }
        if let Some(kernel) = &self.kprime_spin {
            check_kernel("K'_perp", kernel, self.beta, n)?;
        }
        if self.n_tau < 2 {
            return Err(invalid(format!("n_tau must be at least 2, got {}", self.n_tau)));
        }
        if self.n_cycles == 0 {
            return Err(invalid("n_cycles must be positive".to_string()));
        }
        if self.length_cycle == 0 {
            return Err(invalid("length_cycle must be positive".to_string()));
        }
        if !(self.move_insert_segment
            || self.move_remove_segment
            || self.move_split_segment
            || self.move_regroup_segment)
        {
            return Err(invalid("At least one move must be enabled".to_string()));
        }
        Ok(())
    }

    /// Saves the parameters to a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written to.
    pub fn save_to_file(&self, filename: &str) -> io::Result<()> {
        let file = File::create(filename)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &self)?;
        Ok(())
    }

    /// Loads and validates parameters from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid JSON for
    /// `Params`, or fails [`Params::validate`].
    pub fn load_from_file(filename: &str) -> io::Result<Self> {
        let file = File::open(filename)?;
        let reader = BufReader::new(file);
        let params: Params = serde_json::from_reader(reader)?;
        params.validate()?;
        Ok(params)
    }
}
