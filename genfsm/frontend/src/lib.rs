//! Frontend of the generator compiler.
//!
//! Defines the syntax tree of the supported host-language subset, its parser
//! and the lowering of a function into the graph representation defined in
//! `genfsm-ir`. The reference interpreter executes the syntax tree directly.

pub mod ast;
pub mod parser;

mod interp;
mod lower;

pub use ast::FunctionDef;
pub use interp::Interpreter;
pub use lower::{collect_assigned, lower};
