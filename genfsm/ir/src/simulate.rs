//! Cycle-accurate execution of a graph. Within a cycle every read observes
//! the register values from the start of the cycle and writes commit at the
//! clock edge in program order, matching the generated hardware.
use crate::{Context, Graph, NodeId, NodeKind};
use genfsm_utils::{Error, FsmResult, Id, structure};
use std::collections::HashMap;

/// Observable behavior of one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Trace {
    /// Valid-gated outputs in the order they were produced.
    pub outputs: Vec<Vec<i64>>,
    /// State executed in each cycle, ending with the done state.
    pub states: Vec<NodeId>,
    /// Number of clock cycles before reaching the done state.
    pub cycles: usize,
}

/// Effects of the region executed in a single cycle.
struct Step {
    next: NodeId,
    writes: Vec<(Id, i64)>,
    output: Option<Vec<i64>>,
}

pub struct Simulator<'a> {
    ctx: &'a Context,
    graph: &'a Graph,
    max_cycles: usize,
}

impl<'a> Simulator<'a> {
    pub fn new(ctx: &'a Context, graph: &'a Graph) -> Self {
        Simulator {
            ctx,
            graph,
            max_cycles: 100_000,
        }
    }

    pub fn with_max_cycles(mut self, max_cycles: usize) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    /// Run the machine from its root with the given input values until it
    /// reaches a done state.
    pub fn run(&self, inputs: &[i64]) -> FsmResult<Trace> {
        structure::check_arity(
            "inputs",
            self.ctx.inputs().count(),
            inputs.len(),
        )?;
        let mut regs: HashMap<Id, i64> =
            self.ctx.registers().map(|v| (v, 0)).collect();
        regs.extend(self.ctx.inputs().zip(inputs.iter().copied()));

        let mut trace = Trace::default();
        let mut state = self.graph.root();
        loop {
            trace.states.push(state);
            if self.graph.get(state)?.is_done() {
                return Ok(trace);
            }
            if trace.cycles >= self.max_cycles {
                return Err(Error::misc(format!(
                    "`{}` did not finish within {} cycles",
                    self.ctx.name, self.max_cycles
                )));
            }
            let step = self.step(state, &regs)?;
            regs.extend(step.writes);
            trace.outputs.extend(step.output);
            trace.cycles += 1;
            state = step.next;
        }
    }

    /// Execute the region of `state`.
    fn step(&self, state: NodeId, regs: &HashMap<Id, i64>) -> FsmResult<Step> {
        let lookup = |v: Id| regs.get(&v).copied();
        let mut writes = Vec::new();
        let mut output = None;
        let mut cur = state;
        // A region visits every node at most once.
        for _ in 0..=self.graph.len() {
            let node = self.graph.get(cur)?;
            let edge = match &node.kind {
                NodeKind::Assign { lvalue, rvalue, edge } => {
                    writes.push((*lvalue, rvalue.eval(&lookup)?));
                    edge
                }
                NodeKind::IfElse {
                    condition,
                    true_edge,
                    false_edge,
                } => {
                    if condition.eval(&lookup)? != 0 {
                        true_edge
                    } else {
                        false_edge
                    }
                }
                NodeKind::Yield { outputs, edge } => {
                    if output.is_some() {
                        return Err(Error::malformed_graph(format!(
                            "`{}` yields twice in one cycle",
                            state.state_name()
                        )));
                    }
                    output = Some(
                        outputs
                            .iter()
                            .map(|e| e.eval(&lookup))
                            .collect::<FsmResult<Vec<_>>>()?,
                    );
                    edge
                }
                NodeKind::Done => {
                    return Err(Error::malformed_graph(format!(
                        "`{}` reached without a clock edge",
                        node.name()
                    )));
                }
            };
            let target = edge.resolved()?;
            if edge.is_clocked() {
                return Ok(Step {
                    next: target,
                    writes,
                    output,
                });
            }
            cur = target;
        }
        Err(Error::malformed_graph(format!(
            "`{}` never reaches a clock edge",
            state.state_name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BinOp, Edge, Expr, Node, Scope};

    fn swap_graph() -> (Context, Graph) {
        // 0: a, b = b, a  (one cycle)   2: yield (a, b)   3: done
        let mut ctx = Context::new("swap");
        ctx.declare("a".into(), Scope::Input).unwrap();
        ctx.declare("b".into(), Scope::Input).unwrap();
        ctx.declare_outputs(2).unwrap();
        let g = Graph::new(
            vec![
                Node::new(
                    NodeId::new(0),
                    NodeKind::Assign {
                        lvalue: "a".into(),
                        rvalue: Expr::var("b"),
                        edge: Edge::non_clocked(NodeId::new(1)),
                    },
                ),
                Node::new(
                    NodeId::new(1),
                    NodeKind::Assign {
                        lvalue: "b".into(),
                        rvalue: Expr::var("a"),
                        edge: Edge::clocked(NodeId::new(2)),
                    },
                ),
                Node::new(
                    NodeId::new(2),
                    NodeKind::Yield {
                        outputs: vec![
                            Expr::var("a"),
                            Expr::binop(
                                BinOp::Sub,
                                Expr::var("b"),
                                Expr::int(1),
                            ),
                        ],
                        edge: Edge::clocked(NodeId::new(3)),
                    },
                ),
                Node::new(NodeId::new(3), NodeKind::Done),
            ],
            NodeId::new(0),
        );
        (ctx, g)
    }

    #[test]
    fn reads_see_start_of_cycle_values() {
        let (ctx, g) = swap_graph();
        let trace = Simulator::new(&ctx, &g).run(&[1, 2]).unwrap();
        assert_eq!(trace.outputs, vec![vec![2, 0]]);
        assert_eq!(trace.cycles, 2);
        assert_eq!(
            trace.states,
            vec![NodeId::new(0), NodeId::new(2), NodeId::new(3)]
        );
    }

    #[test]
    fn wrong_number_of_inputs() {
        let (ctx, g) = swap_graph();
        assert!(Simulator::new(&ctx, &g).run(&[1]).is_err());
    }

    #[test]
    fn cycle_limit() {
        let mut ctx = Context::new("spin");
        ctx.declare("x".into(), Scope::State).unwrap();
        let g = Graph::new(
            vec![
                Node::new(
                    NodeId::new(0),
                    NodeKind::IfElse {
                        condition: Expr::binop(
                            BinOp::Equal,
                            Expr::var("x"),
                            Expr::int(0),
                        ),
                        true_edge: Edge::clocked(NodeId::new(0)),
                        false_edge: Edge::clocked(NodeId::new(1)),
                    },
                ),
                Node::new(NodeId::new(1), NodeKind::Done),
            ],
            NodeId::new(0),
        );
        assert!(Simulator::new(&ctx, &g).with_max_cycles(10).run(&[]).is_err());
    }
}
