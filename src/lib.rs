//! Segment-picture continuous-time Monte Carlo for quantum impurity problems.
//!
//! A configuration is a set of occupied imaginary-time segments per color,
//! weighted by a local trace and one hybridization determinant per color.
//! [`solver::Solver`] runs one Markov chain and returns [`results::Results`].

pub mod configuration;
pub mod det;
pub mod measures;
pub mod model;
pub mod moves;
pub mod results;
pub mod solver;
pub mod state;
pub mod time;
