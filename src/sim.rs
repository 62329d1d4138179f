//! Simulation of netlist graphs

mod evaluator;

pub use evaluator::{simulate, simulate_with, SimReport};
