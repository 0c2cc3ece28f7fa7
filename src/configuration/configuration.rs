use super::seglist::{insertion_position, next_index};
use super::segment::Segment;
use crate::time::tau::Tau;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};

/// The Monte Carlo configuration: one sorted list of non-overlapping segments
/// per color.
///
/// Lists are sorted by decreasing `tau_c` (see [`Segment`]'s ordering). Only
/// moves mutate a configuration, and only when they are accepted.
///
/// # Example
/// ```
/// use ctseg::configuration::configuration::Configuration;
/// use ctseg::configuration::segment::Segment;
/// use ctseg::time::tau::Tau;
///
/// let mut config = Configuration::new(2, 1.0);
/// let seg = Segment::new(Tau::from_f64(0.6, 1.0), Tau::from_f64(0.2, 1.0));
/// config.insert_segment(0, seg);
/// assert_eq!(config.seglist(0), &[seg]);
/// assert_eq!(config.n_segments(), 1);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    beta: f64,
    seglists: Vec<Vec<Segment>>,
}

impl Configuration {
    /// Creates an empty configuration.
    pub fn new(n_color: usize, beta: f64) -> Self {
        assert!(n_color > 0, "At least one color is required");
        assert!(beta > 0.0, "beta must be positive");
        Self {
            beta,
            seglists: vec![Vec::new(); n_color],
        }
    }

    pub fn n_color(&self) -> usize {
        self.seglists.len()
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn seglist(&self, color: usize) -> &[Segment] {
        &self.seglists[color]
    }

    pub fn seglists(&self) -> &[Vec<Segment>] {
        &self.seglists
    }

    /// Total number of segments over all colors.
    pub fn n_segments(&self) -> usize {
        self.seglists.iter().map(|sl| sl.len()).sum()
    }

    /// True if `color` is occupied on the whole cycle.
    pub fn is_full_line(&self, color: usize) -> bool {
        self.seglists[color]
            .last()
            .is_some_and(|s| s.is_full_line())
    }

    /// Inserts a segment at its sorted position and returns that position.
    pub fn insert_segment(&mut self, color: usize, segment: Segment) -> usize {
        let sl = &mut self.seglists[color];
        let position = insertion_position(sl, &segment);
        sl.insert(position, segment);
        position
    }

    /// Removes and returns the segment at `index`.
    pub fn remove_segment(&mut self, color: usize, index: usize) -> Segment {
        self.seglists[color].remove(index)
    }

    /// Cuts the hole from `hole_c` to `hole_cdag` out of segment `index`, which
    /// is replaced by the two remaining pieces (or, for the full line, by one
    /// segment).
    pub fn split_segment(&mut self, color: usize, index: usize, hole_c: Tau, hole_cdag: Tau) {
        let segment = self.seglists[color].remove(index);
        if segment.is_full_line() {
            self.insert_segment(color, Segment::new(hole_c, hole_cdag));
        } else {
            self.insert_segment(color, Segment::new(segment.tau_c, hole_cdag));
            self.insert_segment(color, Segment::new(hole_c, segment.tau_cdag));
        }
    }

    /// Closes the hole between segment `index` and the segment before it in
    /// time, and returns the merged segment. Closing the only hole of a color
    /// fills the line.
    ///
    /// # Panics
    /// Panics if the color has no segment.
    pub fn regroup_segments(&mut self, color: usize, index: usize) -> Segment {
        let len = self.seglists[color].len();
        assert!(len > 0, "Color {} has no hole to close", color);
        let next = next_index(index, len);
        if next == index {
            self.seglists[color].clear();
            self.set_full_line(color);
            return Segment::full_line(self.beta);
        }
        let sl = &mut self.seglists[color];
        let merged = Segment::new(sl[index].tau_c, sl[next].tau_cdag);
        sl.remove(index.max(next));
        sl.remove(index.min(next));
        self.insert_segment(color, merged);
        merged
    }

    /// Occupies `color` on the whole cycle.
    ///
    /// # Panics
    /// Panics if the line is not empty.
    pub fn set_full_line(&mut self, color: usize) {
        assert!(
            self.seglists[color].is_empty(),
            "Cannot fill color {} which already holds segments",
            color
        );
        self.seglists[color].push(Segment::full_line(self.beta));
    }

    /// Sign coming from the ordering of the operators.
    ///
    /// The trace is taken with the operators of each color grouped together, and
    /// within a color in the order `c(y_0) cdag(x_0) c(y_1) cdag(x_1) ...`, where
    /// `x` and `y` are the creation and annihilation times sorted by decreasing
    /// value (the order used by the determinants). When the last segment of a
    /// color wraps around `beta`, time ordering that string costs one
    /// transposition per segment.
    pub fn trace_sign(&self) -> f64 {
        let mut sign = 1.0;
        for sl in &self.seglists {
            if let Some(last) = sl.last() {
                if last.is_cyclic() && sl.len() % 2 == 1 {
                    sign = -sign;
                }
            }
        }
        sign
    }

    /// Saves the configuration to a file in JSON format.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written to.
    pub fn save_to_file(&self, filename: &str) -> io::Result<()> {
        let file = File::create(filename)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer(writer, &self)?;
        Ok(())
    }

    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is invalid.
    pub fn load_from_file(filename: &str) -> io::Result<Self> {
        let file = File::open(filename)?;
        let reader = BufReader::new(file);
        let config = serde_json::from_reader(reader)?;
        Ok(config)
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (color, sl) in self.seglists.iter().enumerate() {
            write!(f, "\ncolor {}:", color)?;
            for seg in sl {
                write!(f, " {}", seg)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(c: f64, cdag: f64) -> Segment {
        Segment::new(Tau::from_f64(c, 1.0), Tau::from_f64(cdag, 1.0))
    }

    #[test]
    fn test_insert_keeps_order() {
        let mut config = Configuration::new(1, 1.0);
        assert_eq!(config.insert_segment(0, seg(0.3, 0.2)), 0);
        assert_eq!(config.insert_segment(0, seg(0.8, 0.7)), 0);
        assert_eq!(config.insert_segment(0, seg(0.1, 0.9)), 2);
        assert_eq!(config.insert_segment(0, seg(0.5, 0.4)), 1);
        assert_eq!(
            config.seglist(0),
            &[seg(0.8, 0.7), seg(0.5, 0.4), seg(0.3, 0.2), seg(0.1, 0.9)]
        );
        assert_eq!(config.remove_segment(0, 1), seg(0.5, 0.4));
        assert_eq!(config.n_segments(), 3);
    }

    #[test]
    fn test_trace_sign() {
        let mut config = Configuration::new(2, 1.0);
        assert_eq!(config.trace_sign(), 1.0);
        config.insert_segment(0, seg(0.1, 0.9));
        assert_eq!(config.trace_sign(), -1.0);
        config.insert_segment(0, seg(0.5, 0.4));
        assert_eq!(config.trace_sign(), 1.0);
        config.insert_segment(1, seg(0.6, 0.3));
        assert_eq!(config.trace_sign(), 1.0);
        config.insert_segment(1, seg(0.2, 0.8));
        assert_eq!(config.trace_sign(), 1.0);
        config.insert_segment(0, seg(0.7, 0.6));
        assert_eq!(config.trace_sign(), -1.0);
    }

    #[test]
    fn test_split_and_regroup() {
        let mut config = Configuration::new(1, 1.0);
        config.insert_segment(0, seg(0.8, 0.5));
        config.insert_segment(0, seg(0.3, 0.1));
        config.split_segment(0, 0, Tau::from_f64(0.6, 1.0), Tau::from_f64(0.7, 1.0));
        assert_eq!(
            config.seglist(0),
            &[seg(0.8, 0.7), seg(0.6, 0.5), seg(0.3, 0.1)]
        );
        // Hole between [0.5, 0.6) and [0.7, 0.8)
        assert_eq!(config.regroup_segments(0, 0), seg(0.8, 0.5));
        // Hole across beta, between [0.1, 0.3) and [0.5, 0.8)
        assert_eq!(config.regroup_segments(0, 1), seg(0.3, 0.5));
        assert!(config.seglist(0)[0].is_cyclic());
        assert_eq!(config.regroup_segments(0, 0), Segment::full_line(1.0));
        assert!(config.is_full_line(0));

        config.split_segment(0, 0, Tau::from_f64(0.9, 1.0), Tau::from_f64(0.2, 1.0));
        assert_eq!(config.seglist(0), &[seg(0.9, 0.2)]);
    }

    #[test]
    fn test_full_line() {
        let mut config = Configuration::new(2, 1.0);
        config.set_full_line(1);
        assert!(config.is_full_line(1));
        assert!(!config.is_full_line(0));
        assert_eq!(config.trace_sign(), 1.0);
    }

    #[test]
    #[should_panic(expected = "already holds segments")]
    fn test_full_line_on_occupied_color_panics() {
        let mut config = Configuration::new(1, 1.0);
        config.insert_segment(0, seg(0.3, 0.2));
        config.set_full_line(0);
    }

    #[test]
    fn test_save_and_load_json_temp() -> io::Result<()> {
        let mut config = Configuration::new(2, 1.0);
        config.insert_segment(0, seg(0.3, 0.2));
        config.insert_segment(1, seg(0.1, 0.7));

        use tempfile::NamedTempFile;
        let temp_file = NamedTempFile::new()?;
        config.save_to_file(temp_file.path().to_str().unwrap())?;
        let loaded = Configuration::load_from_file(temp_file.path().to_str().unwrap())?;
        assert_eq!(loaded, config);
        Ok(())
    }
}
