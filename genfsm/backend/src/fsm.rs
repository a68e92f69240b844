//! Lowering of a graph into the `case` statement of the state machine.
//! Every state becomes one case item holding the statements of its region.
use genfsm_ir::stmt::{append_end_statements, ensure_terminated};
use genfsm_ir::{
    Case, CaseItem, Context, Edge, Expr, Graph, IfElse, NodeId, NodeKind,
    Statement, Subsitution,
};
use genfsm_utils::{Error, FsmResult, structure};

pub struct FsmBuilder<'a> {
    graph: &'a Graph,
    outputs: usize,
}

impl<'a> FsmBuilder<'a> {
    pub fn new(ctx: &'a Context, graph: &'a Graph) -> Self {
        FsmBuilder {
            graph,
            outputs: ctx.outputs().count(),
        }
    }

    /// The `case (_state)` statement with one item per state.
    pub fn build(&self) -> FsmResult<Case> {
        let items = self
            .graph
            .states()
            .into_iter()
            .map(|state| self.case_item(state))
            .collect::<FsmResult<Vec<_>>>()?;
        Case::new(Expr::var("state"), items)
    }

    fn case_item(&self, state: NodeId) -> FsmResult<CaseItem> {
        let statements = if self.graph.get(state)?.is_done() {
            vec![
                Subsitution::non_blocking(Expr::var("done"), Expr::int(1))
                    .into(),
                Subsitution::state(state).into(),
            ]
        } else {
            self.region(state, 0)?
        };
        ensure_terminated(&state.state_name(), &statements)?;
        Ok(CaseItem {
            label: Expr::State(state),
            statements,
        })
    }

    /// Statements of the combinational region starting at `id`.
    fn region(&self, id: NodeId, depth: usize) -> FsmResult<Vec<Statement>> {
        // Regions are acyclic so no path is longer than the graph.
        if depth > self.graph.len() {
            return Err(Error::malformed_graph(format!(
                "`{}` is part of a cycle without a clock edge",
                id.state_name()
            )));
        }
        let node = self.graph.get(id)?;
        let (mut stmts, edge): (Vec<Statement>, &Edge) = match &node.kind {
            NodeKind::Assign {
                lvalue,
                rvalue,
                edge,
            } => (
                vec![
                    Subsitution::non_blocking(
                        Expr::Var(*lvalue),
                        rvalue.clone(),
                    )
                    .into(),
                ],
                edge,
            ),
            NodeKind::Yield { outputs, edge } => {
                structure::check_arity(
                    &format!("outputs of `{}`", node.name()),
                    self.outputs,
                    outputs.len(),
                )?;
                let mut stmts: Vec<Statement> = outputs
                    .iter()
                    .enumerate()
                    .map(|(i, e)| {
                        Subsitution::non_blocking(
                            Expr::Var(Context::output_name(i)),
                            e.clone(),
                        )
                        .into()
                    })
                    .collect();
                stmts.push(Subsitution::valid().into());
                (stmts, edge)
            }
            NodeKind::IfElse {
                condition,
                true_edge,
                false_edge,
            } => {
                return Ok(vec![
                    IfElse {
                        condition: condition.clone(),
                        then_body: self.follow(true_edge, depth)?,
                        else_body: self.follow(false_edge, depth)?,
                    }
                    .into(),
                ]);
            }
            NodeKind::Done => {
                return Err(Error::malformed_graph(format!(
                    "`{}` is entered without a clock edge",
                    node.name()
                )));
            }
        };
        append_end_statements(&mut stmts, &self.follow(edge, depth)?)?;
        Ok(stmts)
    }

    /// Statements that continue along `edge`: a next-state write for a
    /// clocked edge, the target's region otherwise.
    fn follow(&self, edge: &Edge, depth: usize) -> FsmResult<Vec<Statement>> {
        let target = edge.resolved()?;
        if edge.is_clocked() {
            Ok(vec![Subsitution::state(target).into()])
        } else {
            self.region(target, depth + 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genfsm_ir::{BinOp, Node, Scope, SubsitutionKind};

    fn ctx(outputs: usize) -> Context {
        let mut ctx = Context::new("f");
        ctx.declare("i".into(), Scope::State).unwrap();
        ctx.declare_outputs(outputs).unwrap();
        ctx
    }

    /// 0: i = 0 -> 1: if i < 3 { 2: yield i => 0 } else { => 3 }; 3: done
    fn graph() -> Graph {
        Graph::new(
            vec![
                Node::new(
                    NodeId::new(0),
                    NodeKind::Assign {
                        lvalue: "i".into(),
                        rvalue: Expr::int(0),
                        edge: Edge::non_clocked(NodeId::new(1)),
                    },
                ),
                Node::new(
                    NodeId::new(1),
                    NodeKind::IfElse {
                        condition: Expr::binop(
                            BinOp::LessThan,
                            Expr::var("i"),
                            Expr::int(3),
                        ),
                        true_edge: Edge::non_clocked(NodeId::new(2)),
                        false_edge: Edge::clocked(NodeId::new(3)),
                    },
                ),
                Node::new(
                    NodeId::new(2),
                    NodeKind::Yield {
                        outputs: vec![Expr::var("i")],
                        edge: Edge::clocked(NodeId::new(0)),
                    },
                ),
                Node::new(NodeId::new(3), NodeKind::Done),
            ],
            NodeId::new(0),
        )
    }

    #[test]
    fn one_item_per_state() {
        let (ctx, g) = (ctx(1), graph());
        let case = FsmBuilder::new(&ctx, &g).build().unwrap();
        let labels: Vec<_> =
            case.items.iter().map(|i| i.label.clone()).collect();
        assert_eq!(
            labels,
            vec![Expr::State(NodeId::new(0)), Expr::State(NodeId::new(3))]
        );

        let root = &case.items[0].statements;
        assert_eq!(root.len(), 2);
        let Statement::IfElse(branch) = &root[1] else {
            panic!("expected a branch, got {:?}", root[1]);
        };
        assert_eq!(
            branch.then_body,
            vec![
                Subsitution::non_blocking(Expr::var("out0"), Expr::var("i"))
                    .into(),
                Subsitution::valid().into(),
                Subsitution::state(NodeId::new(0)).into(),
            ]
        );
        assert_eq!(
            branch.else_body,
            vec![Subsitution::state(NodeId::new(3)).into()]
        );

        let done = &case.items[1].statements;
        assert!(matches!(
            &done[1],
            Statement::Subsitution(s) if s.kind == SubsitutionKind::State
                && s.rvalue == Expr::State(NodeId::new(3))
        ));
    }

    #[test]
    fn yield_arity_mismatch() {
        let (ctx, g) = (ctx(2), graph());
        assert!(matches!(
            FsmBuilder::new(&ctx, &g).build().map_err(|e| e.kind().clone()),
            Err(genfsm_utils::ErrorKind::StructuralType(_))
        ));
    }
}
