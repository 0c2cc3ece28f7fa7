#[allow(clippy::module_inception)]
pub mod configuration;
pub mod seglist;
pub mod segment;
