use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, BufWriter};

/// Accumulated observables of one run.
///
/// Quantities normalized by the sign sum `z` (Green's functions, densities) and
/// quantities normalized by the number of measurements (sign, histograms) are
/// stored already normalized; [`Results::merge`] re-weights them accordingly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Results {
    pub beta: f64,
    /// Number of measurements.
    pub n_measures: u64,
    /// Sum of the configuration signs over all measurements.
    pub z: f64,
    pub average_sign: Option<f64>,
    pub densities: Option<Vec<f64>>,
    /// `G_c(tau)` on a uniform mesh of `[0, beta]`, indexed `[color, tau]`.
    pub g_tau: Option<Array2<f64>>,
    /// Improved estimator `F_c(tau)`, same layout as `g_tau`.
    pub f_tau: Option<Array2<f64>>,
    /// Probability of each total number of segments.
    pub perturbation_order_total: Option<Vec<f64>>,
    /// Probability of each number of segments, per color.
    pub perturbation_order: Option<Vec<Vec<f64>>>,
}

/// Combines two optional observables, which must be both present or both absent.
fn weighted<T>(
    a: Option<T>,
    wa: f64,
    b: &Option<T>,
    wb: f64,
    combine: impl Fn(T, &T, f64, f64) -> T,
) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(combine(a, b, wa, wb)),
        (None, None) => None,
        _ => panic!("Cannot merge results measuring different observables"),
    }
}

fn merge_histograms(a: Vec<f64>, b: &[f64], wa: f64, wb: f64) -> Vec<f64> {
    let len = a.len().max(b.len());
    (0..len)
        .map(|k| {
            let pa = a.get(k).copied().unwrap_or(0.0);
            let pb = b.get(k).copied().unwrap_or(0.0);
            (wa * pa + wb * pb) / (wa + wb)
        })
        .collect()
}

impl Results {
    /// Empty results, before any measurement.
    pub fn new(beta: f64) -> Self {
        Self {
            beta,
            n_measures: 0,
            z: 0.0,
            average_sign: None,
            densities: None,
            g_tau: None,
            f_tau: None,
            perturbation_order_total: None,
            perturbation_order: None,
        }
    }

    /// Combines the results of an independent replica into `self`.
    ///
    /// Sign-normalized observables are averaged with weights `z`, the others
    /// with weights `n_measures`. The reduction is symmetric in its two
    /// arguments.
    ///
    /// # Panics
    /// Panics if the two results do not describe the same observables.
    pub fn merge(&mut self, other: &Results) {
        assert!(
            (self.beta - other.beta).abs() <= 1e-12 * self.beta,
            "Cannot merge results at beta = {} and beta = {}",
            self.beta,
            other.beta
        );
        let (za, zb) = (self.z, other.z);
        let (na, nb) = (self.n_measures as f64, other.n_measures as f64);

        self.average_sign = weighted(
            self.average_sign,
            na,
            &other.average_sign,
            nb,
            |a, b, wa, wb| (wa * a + wb * b) / (wa + wb),
        );
        self.densities = weighted(
            self.densities.take(),
            za,
            &other.densities,
            zb,
            |a, b, wa, wb| {
                assert_eq!(a.len(), b.len(), "Densities of different sizes");
                a.iter()
                    .zip(b)
                    .map(|(x, y)| (wa * x + wb * y) / (wa + wb))
                    .collect()
            },
        );
        let merge_arrays = |a: Array2<f64>, b: &Array2<f64>, wa: f64, wb: f64| {
            assert_eq!(a.dim(), b.dim(), "Green's functions of different shapes");
            (a * wa + b * wb) / (wa + wb)
        };
        self.g_tau = weighted(self.g_tau.take(), za, &other.g_tau, zb, merge_arrays);
        self.f_tau = weighted(self.f_tau.take(), za, &other.f_tau, zb, merge_arrays);
        self.perturbation_order_total = weighted(
            self.perturbation_order_total.take(),
            na,
            &other.perturbation_order_total,
            nb,
            |a, b, wa, wb| merge_histograms(a, b, wa, wb),
        );
        self.perturbation_order = weighted(
            self.perturbation_order.take(),
            na,
            &other.perturbation_order,
            nb,
            |a, b, wa, wb| {
                assert_eq!(a.len(), b.len(), "Histograms for different numbers of colors");
                a.into_iter()
                    .zip(b)
                    .map(|(ha, hb)| merge_histograms(ha, hb, wa, wb))
                    .collect()
            },
        );

        self.z += other.z;
        self.n_measures += other.n_measures;
    }

    /// Saves the results to a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written to.
    pub fn save_to_file(&self, filename: &str) -> io::Result<()> {
        let file = File::create(filename)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer(writer, &self)?;
        Ok(())
    }

    /// Loads results from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is invalid.
    pub fn load_from_file(filename: &str) -> io::Result<Self> {
        let file = File::open(filename)?;
        let reader = BufReader::new(file);
        let results = serde_json::from_reader(reader)?;
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn replica(z: f64, n: u64, density: f64, g: f64, hist: Vec<f64>) -> Results {
        let mut r = Results::new(2.0);
        r.z = z;
        r.n_measures = n;
        r.average_sign = Some(z / n as f64);
        r.densities = Some(vec![density, 1.0 - density]);
        r.g_tau = Some(array![[g, -g], [2.0 * g, 0.5]]);
        r.perturbation_order_total = Some(hist.clone());
        r.perturbation_order = Some(vec![hist.clone(), hist]);
        r
    }

    #[test]
    fn test_merge_weights() {
        let mut a = replica(100.0, 100, 0.4, -0.2, vec![0.5, 0.5]);
        let b = replica(300.0, 300, 0.8, -0.6, vec![0.0, 0.0, 1.0]);
        a.merge(&b);
        assert_eq!(a.n_measures, 400);
        assert!((a.z - 400.0).abs() < 1e-12);
        let densities = a.densities.as_ref().unwrap();
        assert!((densities[0] - 0.7).abs() < 1e-12);
        assert!((a.g_tau.as_ref().unwrap()[[0, 0]] + 0.5).abs() < 1e-12);
        let hist = a.perturbation_order_total.as_ref().unwrap();
        assert_eq!(hist.len(), 3);
        assert!((hist[0] - 0.125).abs() < 1e-12);
        assert!((hist[2] - 0.75).abs() < 1e-12);
        assert!((a.average_sign.unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let a = replica(50.0, 60, 0.3, -0.1, vec![0.2, 0.8]);
        let b = replica(80.0, 90, 0.6, -0.4, vec![0.1, 0.3, 0.6]);
        let mut ab = a.clone();
        ab.merge(&b);
        let mut ba = b.clone();
        ba.merge(&a);
        assert_eq!(ab.n_measures, ba.n_measures);
        let (gab, gba) = (ab.g_tau.unwrap(), ba.g_tau.unwrap());
        for (x, y) in gab.iter().zip(gba.iter()) {
            assert!((x - y).abs() < 1e-12);
        }
        for (x, y) in ab.densities.unwrap().iter().zip(ba.densities.unwrap().iter()) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    #[should_panic(expected = "different observables")]
    fn test_merge_mismatched_observables_panics() {
        let mut a = replica(50.0, 60, 0.3, -0.1, vec![1.0]);
        let mut b = a.clone();
        b.g_tau = None;
        a.merge(&b);
    }

    #[test]
    fn test_save_and_load_json_temp() -> io::Result<()> {
        let results = replica(10.0, 12, 0.25, -0.3, vec![0.1, 0.9]);

        use tempfile::NamedTempFile;
        let temp_file = NamedTempFile::new()?;
        results.save_to_file(temp_file.path().to_str().unwrap())?;
        let loaded = Results::load_from_file(temp_file.path().to_str().unwrap())?;
        assert_eq!(loaded, results);
        Ok(())
    }
}
