//! A small hardware description AST. Generated designs and testbenches are
//! assembled from these items and rendered by [crate::verilog].
use genfsm_ir::{Declaration, Expr, Statement, Subsitution};
use genfsm_utils::Id;

/// A Verilog module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Module {
    pub name: String,
    /// Port declarations in order. Only `Input` and `Output` kinds.
    pub ports: Vec<Declaration>,
    pub items: Vec<Item>,
}

impl Module {
    pub fn new<S: ToString>(name: S) -> Self {
        Module {
            name: name.to_string(),
            ports: vec![],
            items: vec![],
        }
    }

    pub fn add_port(&mut self, port: Declaration) {
        self.ports.push(port);
    }

    pub fn add_item<I: Into<Item>>(&mut self, item: I) {
        self.items.push(item.into());
    }

    /// Declarations in the body of the module.
    pub fn declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.items.iter().filter_map(|item| match item {
            Item::Declaration(d) => Some(d),
            _ => None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Item {
    Declaration(Declaration),
    /// `always @(posedge <clock>) begin .. end`
    Always {
        clock: String,
        body: Vec<Statement>,
    },
    /// `always #<half_period> <signal> = !<signal>;`
    Clock {
        signal: String,
        half_period: u32,
    },
    Instantiation(Instantiation),
    /// `initial begin .. end`
    Initial(Vec<Procedural>),
}

impl From<Declaration> for Item {
    fn from(d: Declaration) -> Self {
        Item::Declaration(d)
    }
}

impl From<Instantiation> for Item {
    fn from(i: Instantiation) -> Self {
        Item::Instantiation(i)
    }
}

/// An instance of another module with named port connections.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instantiation {
    pub module: String,
    pub name: String,
    /// Pairs of (port, connected signal).
    pub connections: Vec<(String, String)>,
}

/// Statements of an `initial` block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Procedural {
    /// A blocking [Subsitution].
    Assign(Subsitution),
    /// `@(negedge <signal>);`
    NegEdge(String),
    While {
        condition: String,
        body: Vec<Procedural>,
    },
    If {
        condition: String,
        body: Vec<Procedural>,
    },
    /// `$display("<format>", <args>);`
    Display { format: String, args: Vec<String> },
    Finish,
}

impl Procedural {
    /// `<signal> = <value>;` on a testbench signal.
    pub fn assign<S: Into<Id>>(signal: S, value: Expr) -> Self {
        Procedural::Assign(Subsitution::blocking(Expr::port(signal), value))
    }
}
