//! Lowering of a [FunctionDef] into a [Context] and a [Graph].
//!
//! Lowering is a structural recursion over the statements of the function.
//! A [Cursor] tracks the edges that are still dangling after the statements
//! lowered so far; the next node created is attached to every one of them.
use crate::ast::{self, FunctionDef, Stmt, UnaryOperator};
use genfsm_ir::{
    BinOp, Context, Edge, EdgeKind, Expr, Graph, IdCounter, Node, NodeId,
    NodeKind, Scope, UnaryOp,
};
use genfsm_utils::{Error, FsmResult, Id, NameGenerator};
use itertools::Itertools;
use std::collections::{BTreeMap, HashSet};

/// The outgoing edge of a node that is still waiting for its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Next,
    True,
    False,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Exit {
    node: NodeId,
    slot: Slot,
}

impl Exit {
    fn new(node: NodeId, slot: Slot) -> Self {
        Exit { node, slot }
    }
}

/// Position of the lowering within a statement list.
#[derive(Debug, Default)]
struct Cursor {
    /// First node created through this cursor.
    entry: Option<NodeId>,
    /// Dangling edges the next node is attached to.
    exits: Vec<Exit>,
}

impl Cursor {
    fn after(exit: Exit) -> Self {
        Cursor {
            entry: None,
            exits: vec![exit],
        }
    }
}

/// Lower `func` into its variable context and graph. Node ids are drawn from
/// `ids`.
pub fn lower(
    func: &FunctionDef,
    ids: &mut IdCounter,
) -> FsmResult<(Context, Graph)> {
    let time = std::time::Instant::now();
    let mut builder = Builder::new(func, ids)?;
    let mut cur = Cursor::default();
    builder.block(&func.body, &mut cur)?;
    let done = builder.push(&mut cur, NodeKind::Done)?;
    let root = cur.entry.unwrap_or(done);

    let Builder {
        mut ctx,
        nodes,
        arity,
        ..
    } = builder;
    ctx.declare_outputs(arity.unwrap_or(0))?;
    let graph = Graph::new(nodes.into_values(), root);
    graph.validate()?;
    log::info!(
        "Lowered `{}` into {} nodes in {:?}",
        func.name,
        graph.len(),
        time.elapsed()
    );
    Ok((ctx, graph))
}

struct Builder<'a> {
    ctx: Context,
    ids: &'a mut IdCounter,
    nodes: BTreeMap<NodeId, Node>,
    names: NameGenerator,
    /// Number of values produced by each yield.
    arity: Option<usize>,
}

impl<'a> Builder<'a> {
    /// Declare the parameters and every assigned name of `func`.
    fn new(func: &FunctionDef, ids: &'a mut IdCounter) -> FsmResult<Self> {
        let mut ctx = Context::new(func.name);
        if let Some(dup) = func.params.iter().duplicates().next() {
            return Err(Error::unsupported_construct(format!(
                "duplicate parameter `{dup}`"
            )));
        }
        for param in &func.params {
            ctx.declare(*param, Scope::Input)?;
        }
        let mut assigned = Vec::new();
        collect_assigned(&func.body, &mut assigned);
        // Parameters may be reassigned and keep their scope.
        for name in assigned.into_iter().unique() {
            if !ctx.is_declared(name) {
                ctx.declare(name, Scope::State)?;
            }
        }
        ctx.check_names()?;
        let names = NameGenerator::with_prev_defined_names(
            ctx.registers().collect(),
        );
        Ok(Builder {
            ctx,
            ids,
            nodes: BTreeMap::new(),
            names,
            arity: None,
        })
    }

    /// Resolve the dangling edge `exit` to `target`.
    fn connect(&mut self, exit: Exit, target: NodeId) -> FsmResult<()> {
        let node = self.nodes.get_mut(&exit.node).ok_or_else(|| {
            Error::malformed_graph(format!("no node with id {}", exit.node))
        })?;
        let edge = match (&mut node.kind, exit.slot) {
            (NodeKind::Assign { edge, .. }, Slot::Next)
            | (NodeKind::Yield { edge, .. }, Slot::Next) => edge,
            (NodeKind::IfElse { true_edge, .. }, Slot::True) => true_edge,
            (NodeKind::IfElse { false_edge, .. }, Slot::False) => false_edge,
            (_, slot) => {
                return Err(Error::malformed_graph(format!(
                    "`{}` has no {slot:?} edge",
                    exit.node.state_name()
                )));
            }
        };
        if let Some(prev) = edge.target {
            return Err(Error::malformed_graph(format!(
                "edge of `{}` already targets `{}`",
                exit.node.state_name(),
                prev.state_name()
            )));
        }
        edge.target = Some(target);
        Ok(())
    }

    /// Create a node, attach every pending exit of `cur` to it and return
    /// its id. The exits of the new node are left to the caller.
    fn push(&mut self, cur: &mut Cursor, kind: NodeKind) -> FsmResult<NodeId> {
        let id = self.ids.fresh();
        self.nodes.insert(id, Node::new(id, kind));
        for exit in std::mem::take(&mut cur.exits) {
            self.connect(exit, id)?;
        }
        cur.entry.get_or_insert(id);
        Ok(id)
    }

    /// Emit assignments that happen in the same cycle. Every right-hand side
    /// observes the values from before the assignments.
    fn parallel(
        &mut self,
        cur: &mut Cursor,
        assigns: Vec<(Id, Expr)>,
    ) -> FsmResult<()> {
        let count = assigns.len();
        for (idx, (lvalue, rvalue)) in assigns.into_iter().enumerate() {
            let kind = if idx + 1 == count {
                EdgeKind::Clocked
            } else {
                EdgeKind::NonClocked
            };
            let id = self.push(
                cur,
                NodeKind::Assign {
                    lvalue,
                    rvalue,
                    edge: Edge::dangling(kind),
                },
            )?;
            cur.exits = vec![Exit::new(id, Slot::Next)];
        }
        Ok(())
    }

    fn branch(
        &mut self,
        cur: &mut Cursor,
        condition: Expr,
    ) -> FsmResult<NodeId> {
        self.push(
            cur,
            NodeKind::IfElse {
                condition,
                true_edge: Edge::dangling(EdgeKind::Clocked),
                false_edge: Edge::dangling(EdgeKind::Clocked),
            },
        )
    }

    fn block(&mut self, stmts: &[Stmt], cur: &mut Cursor) -> FsmResult<()> {
        stmts.iter().try_for_each(|stmt| self.stmt(stmt, cur))
    }

    fn stmt(&mut self, stmt: &Stmt, cur: &mut Cursor) -> FsmResult<()> {
        match stmt {
            Stmt::Pass | Stmt::Expr(ast::Expr::Str(_)) => Ok(()),
            Stmt::Expr(ast::Expr::Yield(Some(value))) => {
                self.yield_(value, cur)
            }
            Stmt::Expr(ast::Expr::Yield(None)) => Err(
                Error::unsupported_construct("yield without a value"),
            ),
            Stmt::Expr(e) => Err(Error::unsupported_construct(format!(
                "expression statement ({})",
                e.construct()
            ))),
            Stmt::Assign { targets, value } => match targets.as_slice() {
                [target] => self.assign(target, value, cur),
                _ => Err(Error::unsupported_construct(
                    "multi-target assignment",
                )),
            },
            Stmt::AugAssign { target, op, value } => {
                let name = self.target_name(target)?;
                let op = op.to_binop().ok_or_else(|| {
                    Error::unsupported_construct(format!(
                        "{} `{}=`",
                        op.describe(),
                        op.symbol()
                    ))
                })?;
                let rvalue =
                    Expr::binop(op, Expr::Var(name), self.expr(value)?);
                self.parallel(cur, vec![(name, rvalue)])
            }
            Stmt::If { test, body, orelse } => {
                let condition = self.expr(test)?;
                let head = self.branch(cur, condition)?;
                let mut then_cur = Cursor::after(Exit::new(head, Slot::True));
                self.block(body, &mut then_cur)?;
                let mut else_cur = Cursor::after(Exit::new(head, Slot::False));
                self.block(orelse, &mut else_cur)?;
                cur.exits = then_cur.exits;
                cur.exits.extend(else_cur.exits);
                Ok(())
            }
            Stmt::While { test, body, orelse } => {
                if !orelse.is_empty() {
                    return Err(Error::unsupported_construct(
                        "`else` clause of a while loop",
                    ));
                }
                let condition = self.expr(test)?;
                check_bounded(&condition, body)?;
                self.loop_(cur, condition, vec![], body)
            }
            Stmt::For {
                target,
                iter,
                body,
                orelse,
            } => {
                if !orelse.is_empty() {
                    return Err(Error::unsupported_construct(
                        "`else` clause of a for loop",
                    ));
                }
                self.for_range(target, iter, body, cur)
            }
            Stmt::Break
            | Stmt::Continue
            | Stmt::Return(_)
            | Stmt::FunctionDef(_)
            | Stmt::Try(_) => {
                Err(Error::unsupported_construct(stmt.construct()))
            }
        }
    }

    fn target_name(&self, target: &ast::Expr) -> FsmResult<Id> {
        match target {
            ast::Expr::Name(name) => Ok(*name),
            e => Err(Error::unsupported_construct(format!(
                "assignment to a {}",
                e.construct()
            ))),
        }
    }

    fn assign(
        &mut self,
        target: &ast::Expr,
        value: &ast::Expr,
        cur: &mut Cursor,
    ) -> FsmResult<()> {
        let assigns = match (target, value) {
            (ast::Expr::Tuple(targets), ast::Expr::Tuple(values)) => {
                if targets.len() != values.len() {
                    return Err(Error::unsupported_construct(format!(
                        "unpacking {} values into {} targets",
                        values.len(),
                        targets.len()
                    )));
                }
                targets
                    .iter()
                    .zip(values)
                    .map(|(t, v)| Ok((self.target_name(t)?, self.expr(v)?)))
                    .collect::<FsmResult<Vec<_>>>()?
            }
            (ast::Expr::Tuple(_), _) => {
                return Err(Error::unsupported_construct(format!(
                    "unpacking a {}",
                    value.construct()
                )));
            }
            (target, value) => {
                vec![(self.target_name(target)?, self.expr(value)?)]
            }
        };
        if assigns.is_empty() {
            return Err(Error::unsupported_construct("empty tuple assignment"));
        }
        self.parallel(cur, assigns)
    }

    fn yield_(&mut self, value: &ast::Expr, cur: &mut Cursor) -> FsmResult<()> {
        let outputs = match value {
            ast::Expr::Tuple(values) => values
                .iter()
                .map(|v| self.expr(v))
                .collect::<FsmResult<Vec<_>>>()?,
            value => vec![self.expr(value)?],
        };
        if outputs.is_empty() {
            return Err(Error::unsupported_construct("yield of an empty tuple"));
        }
        match self.arity {
            Some(arity) if arity != outputs.len() => {
                return Err(Error::unsupported_construct(format!(
                    "inconsistent yield arity: {arity} and {}",
                    outputs.len()
                )));
            }
            _ => self.arity = Some(outputs.len()),
        }
        let id = self.push(
            cur,
            NodeKind::Yield {
                outputs,
                edge: Edge::dangling(EdgeKind::Clocked),
            },
        )?;
        cur.exits = vec![Exit::new(id, Slot::Next)];
        Ok(())
    }

    /// A loop with `condition` tested at its head. `prologue` runs at the
    /// start of every iteration.
    fn loop_(
        &mut self,
        cur: &mut Cursor,
        condition: Expr,
        prologue: Vec<(Id, Expr)>,
        body: &[Stmt],
    ) -> FsmResult<()> {
        let head = self.branch(cur, condition)?;
        let mut body_cur = Cursor::after(Exit::new(head, Slot::True));
        if !prologue.is_empty() {
            self.parallel(&mut body_cur, prologue)?;
        }
        self.block(body, &mut body_cur)?;
        for exit in body_cur.exits {
            self.connect(exit, head)?;
        }
        cur.exits = vec![Exit::new(head, Slot::False)];
        Ok(())
    }

    /// `for i in range(start, stop, step)` becomes
    /// ```text
    /// it, end = start, stop
    /// while it < end:     # `>` for a negative step
    ///     i, it = it, it + step
    ///     ...
    /// ```
    fn for_range(
        &mut self,
        target: &ast::Expr,
        iter: &ast::Expr,
        body: &[Stmt],
        cur: &mut Cursor,
    ) -> FsmResult<()> {
        let var = self.target_name(target)?;
        let args = match iter {
            ast::Expr::Call(func, args) if *func == "range" => args,
            e => {
                return Err(Error::unsupported_construct(format!(
                    "iteration over a {}",
                    e.construct()
                )));
            }
        };
        let (start, stop, step) = match args.as_slice() {
            [stop] => (Expr::int(0), self.expr(stop)?, 1),
            [start, stop] => (self.expr(start)?, self.expr(stop)?, 1),
            [start, stop, step] => {
                let step = self.expr(step)?.as_const().ok_or_else(|| {
                    Error::unsupported_construct("non-constant range step")
                })?;
                if step == 0 {
                    return Err(Error::unsupported_construct("zero range step"));
                }
                (self.expr(start)?, self.expr(stop)?, step)
            }
            _ => {
                return Err(Error::unsupported_construct(format!(
                    "range with {} arguments",
                    args.len()
                )));
            }
        };
        let it = self.names.gen_name("it");
        let end = self.names.gen_name("end");
        self.ctx.declare(it, Scope::Global)?;
        self.ctx.declare(end, Scope::Global)?;

        self.parallel(cur, vec![(it, start), (end, stop)])?;
        let cmp = if step > 0 {
            BinOp::LessThan
        } else {
            BinOp::GreaterThan
        };
        let condition = Expr::binop(cmp, Expr::Var(it), Expr::Var(end));
        let prologue = vec![
            (var, Expr::Var(it)),
            (
                it,
                Expr::binop(BinOp::Add, Expr::Var(it), Expr::int(step)),
            ),
        ];
        self.loop_(cur, condition, prologue, body)
    }

    fn expr(&self, e: &ast::Expr) -> FsmResult<Expr> {
        Ok(match e {
            ast::Expr::Int(v) => Expr::int(*v),
            ast::Expr::Bool(b) => Expr::int(i64::from(*b)),
            ast::Expr::Name(name) => {
                if !self.ctx.is_declared(*name) {
                    return Err(Error::unsupported_construct(format!(
                        "undeclared variable `{name}`"
                    )));
                }
                Expr::Var(*name)
            }
            ast::Expr::BinOp(op, l, r) => {
                let bop = op.to_binop().ok_or_else(|| {
                    Error::unsupported_construct(format!(
                        "{} `{}`",
                        op.describe(),
                        op.symbol()
                    ))
                })?;
                Expr::binop(bop, self.expr(l)?, self.expr(r)?)
            }
            ast::Expr::UnaryOp(op, e) => {
                let e = self.expr(e)?;
                match op {
                    UnaryOperator::USub => Expr::unary(UnaryOp::Neg, e),
                    UnaryOperator::UAdd => e,
                    UnaryOperator::Not => Expr::unary(UnaryOp::Not, e),
                    UnaryOperator::Invert => {
                        return Err(Error::unsupported_construct(
                            "bitwise operator `~`",
                        ));
                    }
                }
            }
            ast::Expr::BoolOp(op, values) => {
                let bop = op.to_binop();
                let mut values = values.iter();
                let first = values.next().ok_or_else(|| {
                    Error::unsupported_construct("empty boolean operation")
                })?;
                values.try_fold(self.expr(first)?, |acc, v| {
                    Ok::<_, Error>(Expr::binop(bop, acc, self.expr(v)?))
                })?
            }
            ast::Expr::Compare(l, rest) => match rest.as_slice() {
                [(op, r)] => {
                    Expr::binop(op.to_binop(), self.expr(l)?, self.expr(r)?)
                }
                _ => {
                    return Err(Error::unsupported_construct(
                        "chained comparison",
                    ));
                }
            },
            ast::Expr::Call(func, _) => {
                return Err(Error::unsupported_construct(format!(
                    "call to `{func}`"
                )));
            }
            ast::Expr::Tuple(_) => {
                return Err(Error::unsupported_construct(
                    "tuple outside of a yield or an assignment",
                ));
            }
            ast::Expr::Str(_) | ast::Expr::Yield(_) => {
                return Err(Error::unsupported_construct(e.construct()));
            }
        })
    }
}

/// Append every name assigned by `stmts` to `out` in program order,
/// including loop variables.
pub fn collect_assigned(stmts: &[Stmt], out: &mut Vec<Id>) {
    fn targets(e: &ast::Expr, out: &mut Vec<Id>) {
        match e {
            ast::Expr::Name(name) => out.push(*name),
            ast::Expr::Tuple(es) => es.iter().for_each(|e| targets(e, out)),
            _ => (),
        }
    }
    for stmt in stmts {
        match stmt {
            Stmt::Assign { targets: ts, .. } => {
                ts.iter().for_each(|t| targets(t, out))
            }
            Stmt::AugAssign { target, .. } => targets(target, out),
            Stmt::If { body, orelse, .. }
            | Stmt::While { body, orelse, .. } => {
                collect_assigned(body, out);
                collect_assigned(orelse, out);
            }
            Stmt::For {
                target,
                body,
                orelse,
                ..
            } => {
                targets(target, out);
                collect_assigned(body, out);
                collect_assigned(orelse, out);
            }
            Stmt::Try(body) => collect_assigned(body, out),
            Stmt::Expr(_)
            | Stmt::Pass
            | Stmt::Break
            | Stmt::Continue
            | Stmt::Return(_)
            | Stmt::FunctionDef(_) => (),
        }
    }
}

/// Reject loops that provably never terminate.
fn check_bounded(condition: &Expr, body: &[Stmt]) -> FsmResult<()> {
    match condition.as_const() {
        Some(0) => return Ok(()),
        Some(v) => {
            return Err(Error::unsupported_construct(format!(
                "unbounded loop: condition is always {v}"
            )));
        }
        None => (),
    }
    let mut assigned = Vec::new();
    collect_assigned(body, &mut assigned);
    let assigned: HashSet<Id> = assigned.into_iter().collect();
    if condition.vars().is_disjoint(&assigned) {
        return Err(Error::unsupported_construct(format!(
            "unbounded loop: no variable of `{condition}` is assigned in \
             its body"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use genfsm_utils::ErrorKind;

    fn lower_str(src: &str) -> FsmResult<(Context, Graph)> {
        let func = FunctionDef::construct_from_str(src)?;
        lower(&func, &mut IdCounter::default())
    }

    fn unsupported(src: &str) -> String {
        match lower_str(src).map_err(|e| e.kind().clone()) {
            Err(ErrorKind::UnsupportedConstruct(msg)) => msg,
            other => panic!("expected an unsupported construct, got {other:?}"),
        }
    }

    #[test]
    fn empty_function_is_done() {
        let (ctx, g) =
            lower_str("def f():\n    \"\"\"nothing\"\"\"\n").unwrap();
        assert_eq!(g.len(), 1);
        assert!(g.get(g.root()).unwrap().is_done());
        assert_eq!(ctx.outputs().count(), 0);
    }

    #[test]
    fn scopes() {
        let src = "\
def f(n):
    a, b = 0, 1
    for i in range(n):
        yield a, b
        n -= 1
";
        let (ctx, _) = lower_str(src).unwrap();
        assert_eq!(ctx.inputs().collect_vec(), vec![Id::new("n")]);
        assert_eq!(
            ctx.states().collect_vec(),
            vec![Id::new("a"), Id::new("b"), Id::new("i")]
        );
        assert_eq!(
            ctx.globals().collect_vec(),
            vec![Id::new("it0"), Id::new("end0")]
        );
        assert_eq!(
            ctx.outputs().collect_vec(),
            vec![Id::new("out0"), Id::new("out1")]
        );
    }

    #[test]
    fn tuple_assignment_is_one_cycle() {
        let (_, g) =
            lower_str("def f():\n    a, b = 1, 2\n    yield a\n").unwrap();
        let root = g.get(g.root()).unwrap();
        let NodeKind::Assign { edge, .. } = &root.kind else {
            panic!("expected an assignment, got {root:?}")
        };
        assert_eq!(edge.kind, EdgeKind::NonClocked);
        // assign, assign, yield, done
        assert_eq!(g.len(), 4);
        assert_eq!(g.states().len(), 3);
    }

    #[test]
    fn if_branches_rejoin() {
        let src = "\
def f(n):
    if n:
        x = 1
    else:
        x = 2
    yield x
";
        let (_, g) = lower_str(src).unwrap();
        let yields = g
            .nodes()
            .filter(|n| matches!(n.kind, NodeKind::Yield { .. }))
            .map(|n| n.id)
            .collect_vec();
        assert_eq!(yields.len(), 1);
        let preds = g
            .nodes()
            .filter(|n| n.successors().any(|s| s == yields[0]))
            .count();
        assert_eq!(preds, 2);
    }

    #[test]
    fn rejected_constructs() {
        let cases = [
            ("def f():\n    while True:\n        yield 1\n", "unbounded"),
            ("def f(n):\n    while n > 0:\n        yield n\n", "unbounded"),
            ("def f(n):\n    yield n / 2\n", "true division"),
            ("def f(n):\n    yield n ** 2\n", "exponentiation"),
            ("def f(n):\n    yield n & 1\n", "bitwise"),
            ("def f(n):\n    yield 0 < n < 3\n", "chained"),
            ("def f(n):\n    yield g(n)\n", "call"),
            ("def f(n):\n    yield n\n    yield n, n\n", "arity"),
            ("def f(n):\n    yield m\n", "undeclared"),
            ("def f(n):\n    a = b = n\n", "multi-target"),
            ("def f(n):\n    for i in n:\n        yield i\n", "iteration"),
            (
                "def f(n):\n    for i in range(0, n, n):\n        yield i\n",
                "step",
            ),
            (
                "def f(n):\n    for i in range(0, n, 0):\n        yield i\n",
                "zero",
            ),
            ("def f(n):\n    return\n", "return"),
            ("def f(n):\n    def g():\n        pass\n", "nested"),
            ("def f(state):\n    yield state\n", "collides"),
            ("def f(wire):\n    yield wire\n", "port"),
        ];
        for (src, needle) in cases {
            let msg = unsupported(src);
            assert!(msg.contains(needle), "{src:?}: {msg}");
        }
    }

    #[test]
    fn constant_false_loop_is_accepted() {
        let (_, g) =
            lower_str("def f():\n    i = 0\n    while 0:\n        yield i\n")
                .unwrap();
        assert_eq!(g.len(), 4);
    }

    #[test]
    fn negative_step_counts_down() {
        let (_, g) = lower_str(
            "def f():\n    for i in range(3, 0, -1):\n        yield i\n",
        )
        .unwrap();
        assert!(g.nodes().any(|n| matches!(
            &n.kind,
            NodeKind::IfElse {
                condition: Expr::BinOp(BinOp::GreaterThan, ..),
                ..
            }
        )));
    }
}
