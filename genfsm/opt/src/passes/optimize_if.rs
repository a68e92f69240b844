use super::remove_unreferenced;
use crate::traversal::{Named, Pass};
use genfsm_ir::{Graph, IdCounter, NodeId, NodeKind};
use genfsm_utils::FsmResult;

/// Removes branches whose condition is a constant.
///
/// Every edge into such a branch is redirected to the target of the branch
/// that is always taken. The redirected edge is clocked if either of the two
/// edges it replaces was. A constant branch that always loops back onto
/// itself is left alone. Nodes that were only reachable through the branch
/// that is never taken are removed with it.
#[derive(Default)]
pub struct OptimizeIf;

impl Named for OptimizeIf {
    fn name() -> &'static str {
        "optimize-if"
    }

    fn description() -> &'static str {
        "removes if-else nodes with constant conditions"
    }
}

impl Pass for OptimizeIf {
    fn transform(
        &mut self,
        mut graph: Graph,
        _ids: &mut IdCounter,
    ) -> FsmResult<Graph> {
        let constant: Vec<NodeId> = graph
            .nodes()
            .filter(|n| match &n.kind {
                NodeKind::IfElse { condition, .. } => {
                    condition.as_const().is_some()
                }
                _ => false,
            })
            .map(|n| n.id)
            .collect();

        let mut removed = 0;
        for id in constant {
            // An earlier removal may have redirected this node's edges.
            let Ok(node) = graph.get(id) else { continue };
            let NodeKind::IfElse {
                condition,
                true_edge,
                false_edge,
            } = &node.kind
            else {
                continue;
            };
            let Some(value) = condition.as_const() else {
                continue;
            };
            let taken = if value != 0 { *true_edge } else { *false_edge };
            let target = taken.resolved()?;
            if target == id {
                log::debug!(
                    "{}: `{}` always loops onto itself",
                    Self::name(),
                    id.state_name()
                );
                continue;
            }

            for node in graph.nodes_mut().filter(|n| n.id != id) {
                for edge in node.edges_mut() {
                    if edge.target == Some(id) {
                        edge.target = Some(target);
                        edge.kind = edge.kind.then(taken.kind);
                    }
                }
            }
            if graph.root() == id {
                graph.set_root(target);
            }
            graph.remove(id);
            removed += 1;
            log::debug!(
                "{}: `{}` always continues at `{}`",
                Self::name(),
                id.state_name(),
                target.state_name()
            );
        }
        let orphans = remove_unreferenced(&mut graph);
        log::info!(
            "{}: removed {removed} branch(es) and {orphans} unreachable \
             node(s)",
            Self::name()
        );
        Ok(graph)
    }
}
