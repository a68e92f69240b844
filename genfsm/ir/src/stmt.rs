//! Statement-level representation of the generated state machine. The
//! backend lowers every FSM state into a list of these statements.
use crate::{Expr, NodeId};
use genfsm_utils::{Error, FsmResult, structure};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclKind {
    Input,
    Output,
    Reg,
    Wire,
    /// A named constant with the given value.
    LocalParam(u64),
}

/// Declaration of a port, a register, a wire or a constant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    pub kind: DeclKind,
    pub name: String,
    pub width: u64,
    pub signed: bool,
}

impl Declaration {
    pub fn new<S: ToString>(
        kind: DeclKind,
        name: S,
        width: u64,
        signed: bool,
    ) -> Self {
        Declaration {
            kind,
            name: name.to_string(),
            width,
            signed,
        }
    }

    pub fn localparam<S: ToString>(name: S, value: u64) -> Self {
        Self::new(DeclKind::LocalParam(value), name, 0, false)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubsitutionKind {
    /// Combinational assignment (`=`).
    Blocking,
    /// Registered assignment (`<=`).
    NonBlocking,
    /// Registered write of the next state.
    State,
    /// Registered one-cycle pulse of the valid signal.
    Valid,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subsitution {
    pub kind: SubsitutionKind,
    pub lvalue: Expr,
    pub rvalue: Expr,
}

impl Subsitution {
    pub fn blocking(lvalue: Expr, rvalue: Expr) -> Self {
        Subsitution {
            kind: SubsitutionKind::Blocking,
            lvalue,
            rvalue,
        }
    }

    pub fn non_blocking(lvalue: Expr, rvalue: Expr) -> Self {
        Subsitution {
            kind: SubsitutionKind::NonBlocking,
            lvalue,
            rvalue,
        }
    }

    /// Move to `state` on the next clock edge.
    pub fn state(state: NodeId) -> Self {
        Subsitution {
            kind: SubsitutionKind::State,
            lvalue: Expr::var("state"),
            rvalue: Expr::State(state),
        }
    }

    /// Mark the outputs written in this cycle as valid.
    pub fn valid() -> Self {
        Subsitution {
            kind: SubsitutionKind::Valid,
            lvalue: Expr::var("valid"),
            rvalue: Expr::int(1),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IfElse {
    pub condition: Expr,
    pub then_body: Vec<Statement>,
    pub else_body: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaseItem {
    pub label: Expr,
    pub statements: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Case {
    pub expr: Expr,
    pub items: Vec<CaseItem>,
}

impl Case {
    /// Build a case statement. Labels must be distinct.
    pub fn new(expr: Expr, items: Vec<CaseItem>) -> FsmResult<Self> {
        structure::check_distinct(
            "case labels",
            items.iter().map(|i| &i.label),
        )?;
        Ok(Case { expr, items })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Statement {
    Subsitution(Subsitution),
    IfElse(IfElse),
    Case(Case),
}

impl From<Subsitution> for Statement {
    fn from(s: Subsitution) -> Self {
        Statement::Subsitution(s)
    }
}

impl From<IfElse> for Statement {
    fn from(s: IfElse) -> Self {
        Statement::IfElse(s)
    }
}

impl From<Case> for Statement {
    fn from(s: Case) -> Self {
        Statement::Case(s)
    }
}

/// Does `stmts` write the next state at its own level?
fn writes_state(stmts: &[Statement]) -> bool {
    stmts.iter().any(|s| {
        matches!(
            s,
            Statement::Subsitution(Subsitution {
                kind: SubsitutionKind::State,
                ..
            })
        )
    })
}

/// Collect the leaves of a branch subtree. A list that ends in an `IfElse`
/// continues into both of its branches; any other list is a leaf.
fn collect_leaves<'a>(
    stmts: &'a mut Vec<Statement>,
    out: &mut Vec<&'a mut Vec<Statement>>,
) {
    if matches!(stmts.last(), Some(Statement::IfElse(_))) {
        if let Some(Statement::IfElse(branch)) = stmts.last_mut() {
            collect_leaves(&mut branch.then_body, out);
            collect_leaves(&mut branch.else_body, out);
        }
    } else {
        out.push(stmts);
    }
}

/// Append `end` to every leaf of `stmts`. Fails without modifying anything
/// if some leaf already writes the next state.
pub fn append_end_statements(
    stmts: &mut Vec<Statement>,
    end: &[Statement],
) -> FsmResult<()> {
    let mut leaves = Vec::new();
    collect_leaves(stmts, &mut leaves);
    if leaves.iter().any(|leaf| writes_state(leaf)) {
        return Err(Error::malformed_graph(
            "cannot append statements to a branch that already moved to \
             another state",
        ));
    }
    for leaf in leaves {
        leaf.extend(end.iter().cloned());
    }
    Ok(())
}

/// Does every path through `stmts` end in a next-state write?
pub fn is_terminated(stmts: &[Statement]) -> bool {
    writes_state(stmts)
        || matches!(
            stmts.last(),
            Some(Statement::IfElse(IfElse { then_body, else_body, .. }))
                if is_terminated(then_body) && is_terminated(else_body)
        )
}

/// Fail if some path through `stmts` has no explicit next state.
pub fn ensure_terminated(label: &str, stmts: &[Statement]) -> FsmResult<()> {
    if is_terminated(stmts) {
        Ok(())
    } else {
        Err(Error::malformed_graph(format!(
            "`{label}` has a path without an explicit next state"
        )))
    }
}
