//! # The genfsm intermediate representation
//!
//! A generator function is lowered into a [Graph] whose nodes perform one
//! computation step each and whose edges say whether following them costs a
//! clock cycle. The [Context] classifies the variables of the generator.
//! The backend lowers the graph into the statement-level representation in
//! [stmt] before rendering it.
mod config;
mod context;
mod expr;
mod graph;
mod printer;

pub mod names;
pub mod simulate;
pub mod stmt;

pub use config::Config;
pub use context::{Context, Scope};
pub use expr::{BinOp, Expr, UnaryOp};
pub use graph::{Edge, EdgeKind, Graph, IdCounter, Node, NodeId, NodeKind};
pub use printer::Printer;
pub use simulate::{Simulator, Trace};
pub use stmt::{
    Case, CaseItem, DeclKind, Declaration, IfElse, Statement, Subsitution,
    SubsitutionKind,
};
