use crate::traversal::{Named, Pass};
use genfsm_ir::{Graph, IdCounter};
use genfsm_utils::FsmResult;

/// Removes every node that cannot be reached from the root.
#[derive(Default)]
pub struct RemoveUnreferencedStates;

impl Named for RemoveUnreferencedStates {
    fn name() -> &'static str {
        "remove-unreferenced-states"
    }

    fn description() -> &'static str {
        "removes nodes that are unreachable from the root"
    }
}

/// Remove the nodes of `graph` that are unreachable from its root and return
/// how many were removed.
pub fn remove_unreferenced(graph: &mut Graph) -> usize {
    let reachable = graph.reachable_from(graph.root());
    let dead: Vec<_> =
        graph.ids().filter(|id| !reachable.contains(id)).collect();
    for id in &dead {
        log::debug!(
            "{}: removing `{}`",
            RemoveUnreferencedStates::name(),
            id.state_name()
        );
        graph.remove(*id);
    }
    dead.len()
}

impl Pass for RemoveUnreferencedStates {
    fn transform(
        &mut self,
        mut graph: Graph,
        _ids: &mut IdCounter,
    ) -> FsmResult<Graph> {
        let removed = remove_unreferenced(&mut graph);
        log::info!("{}: removed {removed} node(s)", Self::name());
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genfsm_ir::{Edge, Node, NodeId, NodeKind};

    #[test]
    fn removes_orphans_once() {
        let mut g = Graph::new(
            vec![
                Node::new(
                    NodeId::new(0),
                    NodeKind::Yield {
                        outputs: vec![],
                        edge: Edge::clocked(NodeId::new(2)),
                    },
                ),
                Node::new(
                    NodeId::new(1),
                    NodeKind::Yield {
                        outputs: vec![],
                        edge: Edge::clocked(NodeId::new(2)),
                    },
                ),
                Node::new(NodeId::new(2), NodeKind::Done),
            ],
            NodeId::new(0),
        );
        assert_eq!(remove_unreferenced(&mut g), 1);
        assert!(!g.contains(NodeId::new(1)));
        assert_eq!(remove_unreferenced(&mut g), 0);
        g.validate().unwrap();
    }
}
