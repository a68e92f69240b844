//! The graph representation of a lowered generator. Nodes live in an arena
//! keyed by [NodeId] and edges refer to their targets by id.
use crate::Expr;
use genfsm_utils::{Error, FsmResult, Id};
use itertools::Itertools;
use petgraph::graphmap::DiGraphMap;
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

/// Unique identifier of a graph node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct NodeId(u32);

impl NodeId {
    pub fn new(id: u32) -> Self {
        NodeId(id)
    }

    pub fn index(&self) -> u32 {
        self.0
    }

    /// Name of the FSM state that starts at this node.
    pub fn state_name(&self) -> String {
        format!("_state_{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic source of node ids. One counter is owned by each compilation
/// session and threaded through every stage that creates nodes.
#[derive(Debug, Default)]
pub struct IdCounter {
    next: u32,
}

impl IdCounter {
    pub fn fresh(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u32 {
        self.next
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum EdgeKind {
    /// Transition that takes one clock cycle.
    Clocked,
    /// Combinational continuation within the same cycle.
    NonClocked,
}

impl EdgeKind {
    /// Kind of the edge obtained by following `self` and then `other`.
    pub fn then(self, other: EdgeKind) -> EdgeKind {
        if self == EdgeKind::Clocked || other == EdgeKind::Clocked {
            EdgeKind::Clocked
        } else {
            EdgeKind::NonClocked
        }
    }
}

/// An outgoing edge. The target is `None` while the graph is being built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Edge {
    pub kind: EdgeKind,
    pub target: Option<NodeId>,
}

impl Edge {
    pub fn clocked(target: NodeId) -> Self {
        Edge {
            kind: EdgeKind::Clocked,
            target: Some(target),
        }
    }

    pub fn non_clocked(target: NodeId) -> Self {
        Edge {
            kind: EdgeKind::NonClocked,
            target: Some(target),
        }
    }

    pub fn dangling(kind: EdgeKind) -> Self {
        Edge { kind, target: None }
    }

    pub fn is_clocked(&self) -> bool {
        self.kind == EdgeKind::Clocked
    }

    /// The target of a fully constructed edge.
    pub fn resolved(&self) -> FsmResult<NodeId> {
        self.target
            .ok_or_else(|| Error::malformed_graph("dangling edge"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum NodeKind {
    Assign {
        lvalue: Id,
        rvalue: Expr,
        edge: Edge,
    },
    IfElse {
        condition: Expr,
        true_edge: Edge,
        false_edge: Edge,
    },
    /// Produce the next element of the output sequence.
    Yield { outputs: Vec<Expr>, edge: Edge },
    Done,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Node { id, kind }
    }

    pub fn name(&self) -> String {
        self.id.state_name()
    }

    pub fn is_done(&self) -> bool {
        matches!(self.kind, NodeKind::Done)
    }

    pub fn edges(&self) -> SmallVec<[&Edge; 2]> {
        match &self.kind {
            NodeKind::Assign { edge, .. } | NodeKind::Yield { edge, .. } => {
                smallvec::smallvec![edge]
            }
            NodeKind::IfElse {
                true_edge,
                false_edge,
                ..
            } => smallvec::smallvec![true_edge, false_edge],
            NodeKind::Done => SmallVec::new(),
        }
    }

    pub fn edges_mut(&mut self) -> SmallVec<[&mut Edge; 2]> {
        match &mut self.kind {
            NodeKind::Assign { edge, .. } | NodeKind::Yield { edge, .. } => {
                smallvec::smallvec![edge]
            }
            NodeKind::IfElse {
                true_edge,
                false_edge,
                ..
            } => smallvec::smallvec![true_edge, false_edge],
            NodeKind::Done => SmallVec::new(),
        }
    }

    /// Resolved targets of the outgoing edges.
    pub fn successors(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.edges().into_iter().filter_map(|e| e.target)
    }

    /// Variables written by this node.
    pub fn writes(&self) -> Option<Id> {
        match &self.kind {
            NodeKind::Assign { lvalue, .. } => Some(*lvalue),
            _ => None,
        }
    }

    /// Variables read by this node.
    pub fn reads(&self) -> HashSet<Id> {
        let mut out = HashSet::new();
        match &self.kind {
            NodeKind::Assign { rvalue, .. } => rvalue.collect_vars(&mut out),
            NodeKind::IfElse { condition, .. } => {
                condition.collect_vars(&mut out)
            }
            NodeKind::Yield { outputs, .. } => {
                outputs.iter().for_each(|e| e.collect_vars(&mut out))
            }
            NodeKind::Done => (),
        }
        out
    }
}

/// A generator lowered to a graph. The root is the first state of the FSM.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Graph {
    nodes: BTreeMap<NodeId, Node>,
    root: NodeId,
}

impl Graph {
    pub fn new(nodes: impl IntoIterator<Item = Node>, root: NodeId) -> Self {
        Graph {
            nodes: nodes.into_iter().map(|n| (n.id, n)).collect(),
            root,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = root;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> FsmResult<&Node> {
        self.nodes.get(&id).ok_or_else(|| {
            Error::malformed_graph(format!("no node with id {id}"))
        })
    }

    pub fn get_mut(&mut self, id: NodeId) -> FsmResult<&mut Node> {
        self.nodes.get_mut(&id).ok_or_else(|| {
            Error::malformed_graph(format!("no node with id {id}"))
        })
    }

    pub fn insert(&mut self, node: Node) {
        self.nodes.insert(node.id, node);
    }

    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        self.nodes.remove(&id)
    }

    /// Nodes in increasing id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Nodes that start a clock cycle: the root and every target of a
    /// clocked edge.
    pub fn states(&self) -> BTreeSet<NodeId> {
        let mut states: BTreeSet<NodeId> = self
            .nodes()
            .flat_map(|n| n.edges())
            .filter(|e| e.is_clocked())
            .filter_map(|e| e.target)
            .collect();
        states.insert(self.root);
        states
    }

    /// Nodes reachable from `from` along any edge, `from` included.
    pub fn reachable_from(&self, from: NodeId) -> BTreeSet<NodeId> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.successors());
            }
        }
        seen
    }

    /// Nodes reachable from `from` along non-clocked edges only, `from`
    /// included. This is everything executed in the same cycle as `from`.
    pub fn region(&self, from: NodeId) -> BTreeSet<NodeId> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(
                    node.edges()
                        .into_iter()
                        .filter(|e| !e.is_clocked())
                        .filter_map(|e| e.target),
                );
            }
        }
        seen
    }

    /// The edges of this graph as a petgraph structure. Parallel edges
    /// between the same pair of nodes are collapsed.
    pub fn as_graphmap(&self) -> DiGraphMap<NodeId, EdgeKind> {
        let mut g = DiGraphMap::new();
        for node in self.nodes() {
            g.add_node(node.id);
            for edge in node.edges() {
                if let Some(target) = edge.target {
                    // A clocked edge wins over a non-clocked one.
                    let kind = g
                        .edge_weight(node.id, target)
                        .map_or(edge.kind, |k: &EdgeKind| k.then(edge.kind));
                    g.add_edge(node.id, target, kind);
                }
            }
        }
        g
    }

    /// Check the structural invariants of the graph:
    /// 1. every edge is resolved and points to a node of the graph,
    /// 2. every node is reachable from the root,
    /// 3. a `Done` node is reachable from every node,
    /// 4. every cycle contains a clocked edge and `Done` is only entered
    ///    through clocked edges.
    pub fn validate(&self) -> FsmResult<()> {
        self.get(self.root)?;
        for node in self.nodes() {
            for edge in node.edges() {
                let target = edge.resolved().map_err(|_| {
                    Error::malformed_graph(format!(
                        "`{}` has a dangling edge",
                        node.name()
                    ))
                })?;
                let target = self.get(target)?;
                if target.is_done() && !edge.is_clocked() {
                    return Err(Error::malformed_graph(format!(
                        "`{}` enters `{}` without a clock edge",
                        node.name(),
                        target.name()
                    )));
                }
            }
        }

        let reachable = self.reachable_from(self.root);
        if let Some(unreachable) = self.ids().find(|id| !reachable.contains(id))
        {
            return Err(Error::malformed_graph(format!(
                "`{}` is unreachable from the root `{}`",
                unreachable.state_name(),
                self.root.state_name()
            )));
        }

        let graph = self.as_graphmap();
        let done: Vec<_> =
            self.nodes().filter(|n| n.is_done()).map(|n| n.id).collect();
        let mut finishing = HashSet::new();
        let mut stack = done;
        while let Some(id) = stack.pop() {
            if finishing.insert(id) {
                stack.extend(graph.neighbors_directed(
                    id,
                    petgraph::Direction::Incoming,
                ));
            }
        }
        let stuck = self
            .ids()
            .filter(|id| !finishing.contains(id))
            .map(|id| format!("`{}`", id.state_name()))
            .collect_vec();
        if !stuck.is_empty() {
            return Err(Error::malformed_graph(format!(
                "no path to a done state from {}",
                stuck.join(", ")
            )));
        }

        let mut combinational: DiGraphMap<NodeId, ()> = DiGraphMap::new();
        for node in self.nodes() {
            for edge in node.edges().into_iter().filter(|e| !e.is_clocked()) {
                combinational.add_edge(node.id, edge.resolved()?, ());
            }
        }
        if petgraph::algo::is_cyclic_directed(&combinational) {
            return Err(Error::malformed_graph(
                "cycle without a clock edge",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BinOp;
    use genfsm_utils::ErrorKind;

    fn assign(id: u32, var: &str, val: i64, edge: Edge) -> Node {
        Node::new(
            NodeId(id),
            NodeKind::Assign {
                lvalue: var.into(),
                rvalue: Expr::int(val),
                edge,
            },
        )
    }

    fn done(id: u32) -> Node {
        Node::new(NodeId(id), NodeKind::Done)
    }

    fn is_malformed(g: &Graph) -> bool {
        matches!(
            g.validate().map_err(|e| e.kind().clone()),
            Err(ErrorKind::MalformedGraph(_))
        )
    }

    /// 0: i = 0; 1: while i < 3 { 2: i = i + 1 }; 3: done
    fn counter() -> Graph {
        Graph::new(
            vec![
                assign(0, "i", 0, Edge::clocked(NodeId(1))),
                Node::new(
                    NodeId(1),
                    NodeKind::IfElse {
                        condition: Expr::binop(
                            BinOp::LessThan,
                            Expr::var("i"),
                            Expr::int(3),
                        ),
                        true_edge: Edge::clocked(NodeId(2)),
                        false_edge: Edge::clocked(NodeId(3)),
                    },
                ),
                Node::new(
                    NodeId(2),
                    NodeKind::Assign {
                        lvalue: "i".into(),
                        rvalue: Expr::binop(
                            BinOp::Add,
                            Expr::var("i"),
                            Expr::int(1),
                        ),
                        edge: Edge::clocked(NodeId(1)),
                    },
                ),
                done(3),
            ],
            NodeId(0),
        )
    }

    #[test]
    fn well_formed_loop() {
        let g = counter();
        g.validate().unwrap();
        assert_eq!(g.states().len(), 4);
        assert_eq!(g.reachable_from(NodeId(2)).len(), 3);
    }

    #[test]
    fn dangling_edge() {
        let g = Graph::new(
            vec![
                assign(0, "a", 1, Edge::dangling(EdgeKind::Clocked)),
                done(1),
            ],
            NodeId(0),
        );
        assert!(is_malformed(&g));
    }

    #[test]
    fn unreachable_node() {
        let mut g = counter();
        g.insert(assign(7, "b", 1, Edge::clocked(NodeId(3))));
        assert!(is_malformed(&g));
    }

    #[test]
    fn no_path_to_done() {
        let g = Graph::new(
            vec![
                assign(0, "a", 1, Edge::clocked(NodeId(1))),
                assign(1, "a", 2, Edge::clocked(NodeId(0))),
            ],
            NodeId(0),
        );
        assert!(is_malformed(&g));
    }

    #[test]
    fn combinational_cycle() {
        let mut g = counter();
        if let NodeKind::Assign { edge, .. } =
            &mut g.get_mut(NodeId(2)).unwrap().kind
        {
            edge.kind = EdgeKind::NonClocked;
        }
        if let NodeKind::IfElse { true_edge, .. } =
            &mut g.get_mut(NodeId(1)).unwrap().kind
        {
            true_edge.kind = EdgeKind::NonClocked;
        }
        assert!(is_malformed(&g));
    }

    #[test]
    fn done_entered_combinationally() {
        let g = Graph::new(
            vec![assign(0, "a", 1, Edge::non_clocked(NodeId(1))), done(1)],
            NodeId(0),
        );
        assert!(is_malformed(&g));
    }

    #[test]
    fn region_follows_non_clocked_edges() {
        let g = Graph::new(
            vec![
                assign(0, "a", 1, Edge::non_clocked(NodeId(1))),
                assign(1, "b", 2, Edge::clocked(NodeId(2))),
                done(2),
            ],
            NodeId(0),
        );
        g.validate().unwrap();
        assert_eq!(
            g.region(NodeId(0)).into_iter().collect_vec(),
            vec![NodeId(0), NodeId(1)]
        );
        assert_eq!(
            g.states().into_iter().collect_vec(),
            vec![NodeId(0), NodeId(2)]
        );
    }
}
