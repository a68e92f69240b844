//! Analyses used by the optimization passes.
mod dependence;

pub use dependence::{check_independent, is_dependent, region_reads};
