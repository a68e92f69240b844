//! Implements a formatter for the graph representation.
use crate::{Context, Edge, EdgeKind, Graph, Node, NodeKind};
use itertools::Itertools;
use std::io;

/// Printer for the IR.
pub struct Printer;

impl Printer {
    /// Format an edge. Clock edges are written `=>` and combinational
    /// continuations `->`.
    pub fn edge_str(edge: &Edge) -> String {
        let arrow = match edge.kind {
            EdgeKind::Clocked => "=>",
            EdgeKind::NonClocked => "->",
        };
        match edge.target {
            Some(t) => format!("{arrow} {}", t.state_name()),
            None => format!("{arrow} ?"),
        }
    }

    /// The operation performed by a node, without its edges.
    pub fn label_str(node: &Node) -> String {
        match &node.kind {
            NodeKind::Assign { lvalue, rvalue, .. } => {
                format!("{lvalue} = {rvalue}")
            }
            NodeKind::IfElse { condition, .. } => format!("if {condition}"),
            NodeKind::Yield { outputs, .. } => {
                format!("yield ({})", outputs.iter().join(", "))
            }
            NodeKind::Done => "done".to_string(),
        }
    }

    pub fn node_str(node: &Node) -> String {
        let label = Self::label_str(node);
        match &node.kind {
            NodeKind::Assign { edge, .. } | NodeKind::Yield { edge, .. } => {
                format!("{}: {label} {}", node.name(), Self::edge_str(edge))
            }
            NodeKind::IfElse {
                true_edge,
                false_edge,
                ..
            } => format!(
                "{}: {label} {} else {}",
                node.name(),
                Self::edge_str(true_edge),
                Self::edge_str(false_edge)
            ),
            NodeKind::Done => format!("{}: {label}", node.name()),
        }
    }

    /// Write a textual dump of `ctx` and `graph`.
    pub fn write_graph<F: io::Write>(
        ctx: &Context,
        graph: &Graph,
        f: &mut F,
    ) -> io::Result<()> {
        writeln!(f, "generator {}({}) {{", ctx.name, ctx.inputs().join(", "))?;
        for (label, vars) in [
            ("outputs", ctx.outputs().join(", ")),
            ("state", ctx.states().join(", ")),
            ("globals", ctx.globals().join(", ")),
        ] {
            if vars.is_empty() {
                writeln!(f, "  {label}:")?;
            } else {
                writeln!(f, "  {label}: {vars}")?;
            }
        }
        writeln!(f, "  root: {}", graph.root().state_name())?;
        for node in graph.nodes() {
            writeln!(f, "  {}", Self::node_str(node))?;
        }
        writeln!(f, "}}")
    }
}
