//! Optimizations over the generator graph. Every pass takes the graph by
//! value, draws the ids of new nodes from the session [IdCounter] and
//! returns a well-formed graph with the same output sequence.
pub mod analysis;
pub mod default_passes;
pub mod pass_manager;
pub mod passes;
pub mod traversal;

use genfsm_ir::{Graph, IdCounter};
use genfsm_utils::FsmResult;
use pass_manager::PassManager;

/// Run the default pipeline for `level` over `graph`.
pub fn optimize(
    graph: Graph,
    level: u32,
    ids: &mut IdCounter,
) -> FsmResult<Graph> {
    let pm = PassManager::default_passes()?;
    pm.execute_plan(graph, ids, level, &PassManager::plan(level), &[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use genfsm_frontend::{FunctionDef, Interpreter, lower};
    use genfsm_ir::Simulator;

    const FIB: &str = "\
def fib(n):
    a, b = 0, 1
    for _ in range(n):
        yield a
        a, b = b, a + b
";

    #[test]
    fn levels_preserve_outputs() {
        let func = FunctionDef::construct_from_str(FIB).unwrap();
        let expected = Interpreter::new(&func).run(&[7]).unwrap();
        for level in 0..=3 {
            let mut ids = IdCounter::default();
            let (ctx, g) = lower(&func, &mut ids).unwrap();
            let g = optimize(g, level, &mut ids).unwrap();
            let trace = Simulator::new(&ctx, &g).run(&[7]).unwrap();
            assert_eq!(trace.outputs, expected, "level {level}");
        }
    }

    #[test]
    fn unknown_pass() {
        let pm = PassManager::default_passes().unwrap();
        let func = FunctionDef::construct_from_str(FIB).unwrap();
        let mut ids = IdCounter::default();
        let (_, g) = lower(&func, &mut ids).unwrap();
        assert!(
            pm.execute_plan(g, &mut ids, 0, &["nope".to_string()], &[])
                .is_err()
        );
    }
}
