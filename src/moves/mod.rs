pub mod insert_segment;
pub mod markov_chain;
pub mod regroup_segment;
pub mod remove_segment;
pub mod split_segment;
pub mod trace_ratio;
pub mod traits;
