//! Shared utilities for the genfsm compiler.
mod errors;
mod id;
mod lines;
mod namegenerator;
mod out_file;

pub mod math;
pub mod structure;

pub use errors::{Error, ErrorKind, FsmResult};
pub use id::{GSym, GetName, Id};
pub use lines::Lines;
pub use math::{bits_needed_for, wrap_signed};
pub use namegenerator::NameGenerator;
pub use out_file::OutputFile;
