//! Backends for the genfsm compiler.
pub mod ast;
mod codegen;
mod dot;
mod fsm;
pub mod iverilog;
mod testbench;
mod traits;
mod verilog;

pub use codegen::generate;
pub use dot::{DotBackend, JsonBackend, to_dot, to_json};
pub use fsm::FsmBuilder;
pub use iverilog::{Icarus, SimulationReport};
pub use testbench::{generate as generate_testbench, parse_row, testbench_name};
pub use traits::{Backend, Design, write_text};
pub use verilog::{VerilogBackend, module_lines};
