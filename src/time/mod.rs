pub mod tau;
