use crate::configuration::configuration::Configuration;
use crate::configuration::seglist::overlap;
use crate::configuration::segment::Segment;
use crate::det::hybridization::HybridizationAdaptor;
use crate::det::linalg::determinant;
use crate::det::Det;
use crate::model::params::Params;
use crate::time::tau::Tau;

/// The committed Monte Carlo state: the configuration and one determinant
/// structure per color.
///
/// Owned by the Markov chain. Moves receive it mutably, measures read it.
#[derive(Clone, Debug)]
pub struct McState {
    pub config: Configuration,
    pub dets: Vec<Det>,
}

impl McState {
    /// Empty configuration with one empty determinant per color.
    pub fn new(params: &Params) -> Self {
        let dets = params
            .hybridization
            .iter()
            .map(|delta| Det::new(HybridizationAdaptor::new(delta.clone())))
            .collect();
        Self {
            config: Configuration::new(params.n_color(), params.beta),
            dets,
        }
    }

    pub fn n_color(&self) -> usize {
        self.config.n_color()
    }

    /// Sign of the configuration from the tracked determinants.
    pub fn sign(&self) -> f64 {
        self.dets
            .iter()
            .fold(self.config.trace_sign(), |s, det| s * det.sign())
    }

    /// Sign of the configuration with every determinant recomputed from its
    /// keys.
    pub fn sign_from_scratch(&self) -> f64 {
        let mut sign = self.config.trace_sign();
        for det in &self.dets {
            if determinant(&det.matrix()) < 0.0 {
                sign = -sign;
            }
        }
        sign
    }

    /// Verifies the structural invariants of the configuration and its
    /// agreement with the determinants.
    ///
    /// # Panics
    /// Panics with the offending configuration in the message if a list is not
    /// sorted, two segments of a color overlap, a trial is left pending, or a
    /// determinant does not hold exactly the operators of its color.
    pub fn check_invariants(&self) {
        assert_eq!(
            self.dets.len(),
            self.n_color(),
            "One determinant per color is required"
        );
        for (color, det) in self.dets.iter().enumerate() {
            let sl = self.config.seglist(color);
            self.check_seglist(color, sl);

            assert!(
                det.is_idle(),
                "Trial left pending on color {}. Configuration:{}",
                color,
                self.config
            );

            let operators: Vec<&Segment> = sl.iter().filter(|s| !s.is_full_line()).collect();
            assert_eq!(
                det.size(),
                operators.len(),
                "Determinant of color {} has size {} for {} segments. Configuration:{}",
                color,
                det.size(),
                operators.len(),
                self.config
            );

            let y: Vec<Tau> = (0..det.size()).map(|j| det.get_y(j).0).collect();
            let c_times: Vec<Tau> = operators.iter().map(|s| s.tau_c).collect();
            assert_eq!(
                y, c_times,
                "Annihilation times of color {} differ from the determinant. Configuration:{}",
                color, self.config
            );

            let x: Vec<Tau> = (0..det.size()).map(|i| det.get_x(i).0).collect();
            let mut cdag_times: Vec<Tau> = operators.iter().map(|s| s.tau_cdag).collect();
            cdag_times.sort_by(|a, b| b.cmp(a));
            assert_eq!(
                x, cdag_times,
                "Creation times of color {} differ from the determinant. Configuration:{}",
                color, self.config
            );
        }
    }

    fn check_seglist(&self, color: usize, sl: &[Segment]) {
        if sl.iter().any(|s| s.is_full_line()) {
            assert_eq!(
                sl.len(),
                1,
                "Full line of color {} shares the line with other segments. Configuration:{}",
                color,
                self.config
            );
            return;
        }
        for (k, seg) in sl.iter().enumerate() {
            assert!(
                seg.tau_c != seg.tau_cdag,
                "Segment {} of color {} has zero length. Configuration:{}",
                k,
                color,
                self.config
            );
            assert!(
                !seg.is_cyclic() || k + 1 == sl.len(),
                "Only the last segment of color {} may wrap around beta. Configuration:{}",
                color,
                self.config
            );
        }
        for (k, pair) in sl.windows(2).enumerate() {
            assert!(
                pair[0].tau_c > pair[1].tau_c,
                "Segments {} and {} of color {} are not sorted. Configuration:{}",
                k,
                k + 1,
                color,
                self.config
            );
        }
        for (k, seg) in sl.iter().enumerate() {
            let ov = overlap(&sl[k + 1..], seg);
            assert!(
                ov == 0.0,
                "Segment {} of color {} overlaps the following segments by {}. Configuration:{}",
                k,
                color,
                ov,
                self.config
            );
        }
    }
}
