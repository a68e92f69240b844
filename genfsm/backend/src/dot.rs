//! Visualization of the generator graph as Graphviz DOT and as a
//! cytoscape-style JSON element list.
use crate::traits::{Backend, Design};
use genfsm_ir::{EdgeKind, Graph, NodeId, NodeKind, Printer};
use genfsm_utils::{Error, FsmResult};
use petgraph::dot::{Config, Dot};
use petgraph::graphmap::DiGraphMap;
use serde::Serialize;

/// Graphviz DOT. Clocked edges are solid, combinational ones dashed and
/// state heads are drawn as boxes.
#[derive(Default)]
pub struct DotBackend;

impl Backend for DotBackend {
    fn name(&self) -> &'static str {
        "dot"
    }

    fn validate(design: &Design) -> FsmResult<()> {
        design.graph.validate()
    }

    fn render(design: &Design) -> FsmResult<String> {
        Ok(to_dot(&design.graph))
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

pub fn to_dot(graph: &Graph) -> String {
    let map = graph.as_graphmap();
    let states = graph.states();
    let node_attrs = |_: &DiGraphMap<NodeId, EdgeKind>,
                      (id, _): (NodeId, &NodeId)| {
        let label = graph
            .get(id)
            .map(|node| {
                let text = escape(&Printer::label_str(node));
                format!("{}\\n{text}", node.name())
            })
            .unwrap_or_else(|_| id.state_name());
        let shape = if states.contains(&id) { "box" } else { "ellipse" };
        format!("label = \"{label}\" shape = {shape} ")
    };
    let edge_attrs = |_: &DiGraphMap<NodeId, EdgeKind>,
                      (_, _, kind): (NodeId, NodeId, &EdgeKind)| match kind {
        EdgeKind::Clocked => "style = solid ".to_string(),
        EdgeKind::NonClocked => "style = dashed ".to_string(),
    };
    let dot = Dot::with_attr_getters(
        &map,
        &[Config::NodeNoLabel, Config::EdgeNoLabel],
        &edge_attrs,
        &node_attrs,
    );
    format!("{dot:?}")
}

#[derive(Serialize)]
struct Elements {
    nodes: Vec<Element<NodeData>>,
    edges: Vec<Element<EdgeData>>,
}

#[derive(Serialize)]
struct Element<T> {
    data: T,
}

#[derive(Serialize)]
struct NodeData {
    id: String,
    label: String,
    kind: &'static str,
    state: bool,
    root: bool,
}

#[derive(Serialize)]
struct EdgeData {
    id: String,
    source: String,
    target: String,
    clocked: bool,
    /// `true`/`false` for the edges of a branch.
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<bool>,
}

/// Cytoscape element list: `{"nodes": [..], "edges": [..]}`.
#[derive(Default)]
pub struct JsonBackend;

impl Backend for JsonBackend {
    fn name(&self) -> &'static str {
        "json"
    }

    fn validate(design: &Design) -> FsmResult<()> {
        design.graph.validate()
    }

    fn render(design: &Design) -> FsmResult<String> {
        to_json(&design.graph)
    }
}

pub fn to_json(graph: &Graph) -> FsmResult<String> {
    let states = graph.states();
    let mut elements = Elements {
        nodes: vec![],
        edges: vec![],
    };
    for node in graph.nodes() {
        let kind = match node.kind {
            NodeKind::Assign { .. } => "assign",
            NodeKind::IfElse { .. } => "if",
            NodeKind::Yield { .. } => "yield",
            NodeKind::Done => "done",
        };
        elements.nodes.push(Element {
            data: NodeData {
                id: node.name(),
                label: Printer::label_str(node),
                kind,
                state: states.contains(&node.id),
                root: node.id == graph.root(),
            },
        });
        let is_branch = matches!(node.kind, NodeKind::IfElse { .. });
        for (i, edge) in node.edges().into_iter().enumerate() {
            let target = edge.resolved()?;
            elements.edges.push(Element {
                data: EdgeData {
                    id: format!("{}_{i}", node.name()),
                    source: node.name(),
                    target: target.state_name(),
                    clocked: edge.is_clocked(),
                    branch: is_branch.then_some(i == 0),
                },
            });
        }
    }
    serde_json::to_string_pretty(&elements)
        .map(|s| s + "\n")
        .map_err(|err| Error::misc(format!("failed to serialize graph: {err}")))
}
