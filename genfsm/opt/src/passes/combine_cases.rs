use crate::analysis;
use crate::traversal::{ConstructPass, Named, Pass};
use genfsm_ir::{Edge, EdgeKind, Graph, IdCounter, Node, NodeId, NodeKind};
use genfsm_utils::{FsmResult, Id};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// Merges consecutive states into a single clock cycle.
///
/// The pass rebuilds the graph starting from the root. Every state of the
/// new graph is a copy of an original state whose combinational region is
/// extended by following clocked edges as if they were combinational. A
/// clocked edge to `t` is merged into the cycle when:
/// 1. fewer than `level` edges were already merged along the path,
/// 2. `t` is not a done state,
/// 3. the region of `t` does not contain a node already on the path,
/// 4. the path and the region of `t` do not both yield,
/// 5. the region of `t` reads nothing written along the path.
///
/// Otherwise the edge stays clocked and targets the copy of state `t`.
pub struct CombineCases {
    level: u32,
}

impl Named for CombineCases {
    fn name() -> &'static str {
        "combine-cases"
    }

    fn description() -> &'static str {
        "merges consecutive states into one clock cycle when independent"
    }
}

impl ConstructPass for CombineCases {
    fn from(level: u32) -> FsmResult<Self> {
        Ok(CombineCases { level })
    }
}

/// What happened earlier in the cycle that is being built.
#[derive(Clone, Debug, Default)]
struct Path {
    /// Original nodes copied into this cycle.
    visited: HashSet<NodeId>,
    /// Variables written in this cycle.
    writes: HashSet<Id>,
    /// Whether this cycle already yields.
    yields: bool,
    /// Number of clocked edges merged into this cycle.
    folds: u32,
}

/// Construction state of one run of the pass.
struct Builder<'a> {
    orig: &'a Graph,
    ids: &'a mut IdCounter,
    level: u32,
    nodes: BTreeMap<NodeId, Node>,
    /// Copies of original states.
    memo: HashMap<NodeId, NodeId>,
    worklist: VecDeque<(NodeId, NodeId)>,
    merged: usize,
}

impl Builder<'_> {
    /// The copy of the original state `orig`, scheduling it if needed.
    fn state_for(&mut self, orig: NodeId) -> NodeId {
        if let Some(id) = self.memo.get(&orig) {
            return *id;
        }
        let id = self.ids.fresh();
        self.memo.insert(orig, id);
        self.worklist.push_back((orig, id));
        id
    }

    /// Copy the original node `orig` into the node `id` of the new graph.
    fn copy(
        &mut self,
        orig: NodeId,
        id: NodeId,
        mut path: Path,
    ) -> FsmResult<()> {
        let node = self.orig.get(orig)?;
        path.visited.insert(orig);
        let kind = match &node.kind {
            NodeKind::Assign {
                lvalue,
                rvalue,
                edge,
            } => {
                path.writes.insert(*lvalue);
                NodeKind::Assign {
                    lvalue: *lvalue,
                    rvalue: rvalue.clone(),
                    edge: self.follow(edge, path)?,
                }
            }
            NodeKind::Yield { outputs, edge } => {
                path.yields = true;
                NodeKind::Yield {
                    outputs: outputs.clone(),
                    edge: self.follow(edge, path)?,
                }
            }
            NodeKind::IfElse {
                condition,
                true_edge,
                false_edge,
            } => NodeKind::IfElse {
                condition: condition.clone(),
                true_edge: self.follow(true_edge, path.clone())?,
                false_edge: self.follow(false_edge, path)?,
            },
            NodeKind::Done => NodeKind::Done,
        };
        self.nodes.insert(id, Node::new(id, kind));
        Ok(())
    }

    /// Copy the continuation of `edge`, merging it into the current cycle
    /// when possible.
    fn follow(&mut self, edge: &Edge, mut path: Path) -> FsmResult<Edge> {
        let target = edge.resolved()?;
        let merge = match edge.kind {
            EdgeKind::NonClocked => true,
            EdgeKind::Clocked => {
                let merge = self.can_merge(target, &path)?;
                if merge {
                    path.folds += 1;
                    self.merged += 1;
                }
                merge
            }
        };
        if merge {
            let id = self.ids.fresh();
            self.copy(target, id, path)?;
            Ok(Edge::non_clocked(id))
        } else {
            Ok(Edge::clocked(self.state_for(target)))
        }
    }

    fn can_merge(&self, target: NodeId, path: &Path) -> FsmResult<bool> {
        if path.folds >= self.level || self.orig.get(target)?.is_done() {
            return Ok(false);
        }
        let region = self.orig.region(target);
        if region.iter().any(|id| path.visited.contains(id)) {
            return Ok(false);
        }
        if path.yields {
            for id in &region {
                if matches!(self.orig.get(*id)?.kind, NodeKind::Yield { .. }) {
                    return Ok(false);
                }
            }
        }
        match analysis::check_independent(self.orig, target, &path.writes) {
            Ok(()) => Ok(true),
            Err(err) if err.is_local() => {
                log::debug!(
                    "{}: not merging `{}`: {err}",
                    CombineCases::name(),
                    target.state_name()
                );
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }
}

impl Pass for CombineCases {
    fn transform(
        &mut self,
        graph: Graph,
        ids: &mut IdCounter,
    ) -> FsmResult<Graph> {
        let before = graph.states().len();
        let mut builder = Builder {
            orig: &graph,
            ids,
            level: self.level,
            nodes: BTreeMap::new(),
            memo: HashMap::new(),
            worklist: VecDeque::new(),
            merged: 0,
        };
        let root = builder.state_for(graph.root());
        while let Some((orig, id)) = builder.worklist.pop_front() {
            builder.copy(orig, id, Path::default())?;
        }
        let merged = builder.merged;
        let out = Graph::new(builder.nodes.into_values(), root);
        log::info!(
            "{}: merged {merged} transition(s), {before} -> {} states",
            Self::name(),
            out.states().len()
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genfsm_frontend::{FunctionDef, Interpreter, lower};
    use genfsm_ir::{Context, Simulator};

    fn lowered(src: &str) -> (FunctionDef, Context, Graph, IdCounter) {
        let func = FunctionDef::construct_from_str(src).unwrap();
        let mut ids = IdCounter::default();
        let (ctx, g) = lower(&func, &mut ids).unwrap();
        (func, ctx, g, ids)
    }

    const PARITY: &str = "\
def parity(n):
    i = 0
    while i < n:
        if i % 2 == 0:
            x = 10
        else:
            x = 20
        yield x
        i = i + 1
";

    #[test]
    fn merges_independent_states() {
        let (func, ctx, g, mut ids) = lowered(PARITY);
        let before = g.states().len();
        let out = CombineCases::do_pass(g, &mut ids, 1).unwrap();
        assert!(out.states().len() < before);
        let expected = Interpreter::new(&func).run(&[4]).unwrap();
        let trace = Simulator::new(&ctx, &out).run(&[4]).unwrap();
        assert_eq!(trace.outputs, expected);
    }

    #[test]
    fn uses_fresh_ids() {
        let (_, _, g, mut ids) = lowered(PARITY);
        let old: HashSet<NodeId> = g.ids().collect();
        let out = CombineCases::do_pass(g, &mut ids, 2).unwrap();
        assert!(out.ids().all(|id| !old.contains(&id)));
    }

    #[test]
    fn respects_dependencies() {
        // `y` reads `x` which is written one cycle earlier.
        let (func, ctx, g, mut ids) =
            lowered("def f(n):\n    x = n + 1\n    y = x * 2\n    yield y\n");
        let out = CombineCases::do_pass(g, &mut ids, 3).unwrap();
        // x = n + 1 | y = x * 2 | yield y | done
        assert_eq!(out.states().len(), 4);
        let expected = Interpreter::new(&func).run(&[3]).unwrap();
        let trace = Simulator::new(&ctx, &out).run(&[3]).unwrap();
        assert_eq!(trace.outputs, expected);
    }

    #[test]
    fn at_most_one_yield_per_cycle() {
        let (_, ctx, g, mut ids) =
            lowered("def f():\n    yield 1\n    yield 2\n    yield 3\n");
        let out = CombineCases::do_pass(g, &mut ids, 3).unwrap();
        let trace = Simulator::new(&ctx, &out).run(&[]).unwrap();
        assert_eq!(trace.outputs, vec![vec![1], vec![2], vec![3]]);
        assert_eq!(trace.cycles, 3);
    }
}
