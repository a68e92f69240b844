//! Expressions evaluated by graph nodes.
use crate::NodeId;
use genfsm_utils::{Error, FsmResult, Id};
use std::collections::HashSet;
use std::fmt;

/// Binary operators. Division and modulo follow floor semantics and `And`/`Or`
/// return one of their operands rather than a boolean.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    LessThan,
    LessEq,
    GreaterThan,
    GreaterEq,
    Equal,
    NotEqual,
    And,
    Or,
}

impl BinOp {
    /// Symbol used by the source language.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "//",
            BinOp::Mod => "%",
            BinOp::LessThan => "<",
            BinOp::LessEq => "<=",
            BinOp::GreaterThan => ">",
            BinOp::GreaterEq => ">=",
            BinOp::Equal => "==",
            BinOp::NotEqual => "!=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::LessThan
                | BinOp::LessEq
                | BinOp::GreaterThan
                | BinOp::GreaterEq
                | BinOp::Equal
                | BinOp::NotEqual
        )
    }

    /// Apply the operator to two evaluated operands.
    pub fn apply(&self, l: i64, r: i64) -> FsmResult<i64> {
        let b = |c: bool| if c { 1 } else { 0 };
        Ok(match self {
            BinOp::Add => l.wrapping_add(r),
            BinOp::Sub => l.wrapping_sub(r),
            BinOp::Mul => l.wrapping_mul(r),
            BinOp::Div => {
                Self::check_divisor(r)?;
                let q = l.wrapping_div(r);
                if l.wrapping_rem(r) != 0 && ((l < 0) != (r < 0)) {
                    q - 1
                } else {
                    q
                }
            }
            BinOp::Mod => {
                Self::check_divisor(r)?;
                l.wrapping_rem(r).wrapping_add(r).wrapping_rem(r)
            }
            BinOp::LessThan => b(l < r),
            BinOp::LessEq => b(l <= r),
            BinOp::GreaterThan => b(l > r),
            BinOp::GreaterEq => b(l >= r),
            BinOp::Equal => b(l == r),
            BinOp::NotEqual => b(l != r),
            BinOp::And => {
                if l == 0 {
                    l
                } else {
                    r
                }
            }
            BinOp::Or => {
                if l != 0 {
                    l
                } else {
                    r
                }
            }
        })
    }

    fn check_divisor(r: i64) -> FsmResult<()> {
        if r == 0 {
            return Err(Error::misc("division by zero"));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn apply(&self, v: i64) -> i64 {
        match self {
            UnaryOp::Neg => v.wrapping_neg(),
            UnaryOp::Not => {
                if v == 0 {
                    1
                } else {
                    0
                }
            }
        }
    }
}

/// An immutable expression tree.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Expr {
    Int(i64),
    /// A variable of the generator. Rendered as the register `_<name>`.
    Var(Id),
    /// The label of an FSM state.
    State(NodeId),
    /// A raw port of a generated module. Never produced by the frontend.
    Port(Id),
    BinOp(BinOp, Box<Expr>, Box<Expr>),
    UnaryOp(UnaryOp, Box<Expr>),
}

impl Expr {
    pub fn int(v: i64) -> Self {
        Expr::Int(v)
    }

    pub fn var<S: Into<Id>>(name: S) -> Self {
        Expr::Var(name.into())
    }

    pub fn port<S: Into<Id>>(name: S) -> Self {
        Expr::Port(name.into())
    }

    pub fn binop(op: BinOp, l: Expr, r: Expr) -> Self {
        Expr::BinOp(op, Box::new(l), Box::new(r))
    }

    pub fn unary(op: UnaryOp, e: Expr) -> Self {
        Expr::UnaryOp(op, Box::new(e))
    }

    /// Add every variable read by this expression to `out`.
    pub fn collect_vars(&self, out: &mut HashSet<Id>) {
        match self {
            Expr::Var(v) => {
                out.insert(*v);
            }
            Expr::BinOp(_, l, r) => {
                l.collect_vars(out);
                r.collect_vars(out);
            }
            Expr::UnaryOp(_, e) => e.collect_vars(out),
            Expr::Int(_) | Expr::State(_) | Expr::Port(_) => (),
        }
    }

    pub fn vars(&self) -> HashSet<Id> {
        let mut out = HashSet::new();
        self.collect_vars(&mut out);
        out
    }

    /// Evaluate the expression, reading variables through `lookup`.
    /// `and`/`or` do not evaluate their right operand when the left one
    /// decides the result.
    pub fn eval<F>(&self, lookup: &F) -> FsmResult<i64>
    where
        F: Fn(Id) -> Option<i64>,
    {
        match self {
            Expr::Int(v) => Ok(*v),
            Expr::Var(name) => lookup(*name).ok_or_else(|| {
                Error::misc(format!("Read of undefined variable `{name}`"))
            }),
            Expr::State(_) | Expr::Port(_) => Err(Error::misc(format!(
                "`{self}` cannot be evaluated"
            ))),
            Expr::BinOp(op @ (BinOp::And | BinOp::Or), l, r) => {
                let l = l.eval(lookup)?;
                if (*op == BinOp::And) == (l == 0) {
                    Ok(l)
                } else {
                    r.eval(lookup)
                }
            }
            Expr::BinOp(op, l, r) => op.apply(l.eval(lookup)?, r.eval(lookup)?),
            Expr::UnaryOp(op, e) => Ok(op.apply(e.eval(lookup)?)),
        }
    }

    /// The value of this expression if it reads no variables.
    pub fn as_const(&self) -> Option<i64> {
        self.eval(&|_| None).ok()
    }

    /// Verilog rendering in a value context. Results of comparisons are
    /// turned back into signed integers so that they can take part in signed
    /// arithmetic.
    pub fn verilog(&self) -> String {
        match self {
            Expr::Int(v) if *v < 0 => format!("({v})"),
            Expr::Int(v) => v.to_string(),
            Expr::Var(name) => format!("_{name}"),
            Expr::State(id) => id.state_name(),
            Expr::Port(name) => name.to_string(),
            Expr::BinOp(op, l, r) => {
                let (a, b) = (l.verilog(), r.verilog());
                match op {
                    BinOp::Add | BinOp::Sub | BinOp::Mul => {
                        format!("({a} {} {b})", op.symbol())
                    }
                    BinOp::Div => format!(
                        "((({a} % {b}) == 0) ? ({a} / {b}) : \
                         (({a} / {b}) - ((({a} < 0) ^ ({b} < 0)) ? 1 : 0)))"
                    ),
                    BinOp::Mod => format!("((({a} % {b}) + {b}) % {b})"),
                    BinOp::And => format!("(({a} == 0) ? {a} : {b})"),
                    BinOp::Or => format!("(({a} != 0) ? {a} : {b})"),
                    _ => format!("(({a} {} {b}) ? 1 : 0)", op.symbol()),
                }
            }
            Expr::UnaryOp(UnaryOp::Neg, e) => format!("(-{})", e.verilog()),
            Expr::UnaryOp(UnaryOp::Not, e) => {
                format!("(({} == 0) ? 1 : 0)", e.verilog())
            }
        }
    }

    /// Verilog rendering of the expression used as a branch condition.
    pub fn verilog_cond(&self) -> String {
        match self {
            Expr::BinOp(op, l, r) if op.is_comparison() => {
                format!("({} {} {})", l.verilog(), op.symbol(), r.verilog())
            }
            Expr::BinOp(BinOp::And, l, r) => {
                format!("({} && {})", l.verilog_cond(), r.verilog_cond())
            }
            Expr::BinOp(BinOp::Or, l, r) => {
                format!("({} || {})", l.verilog_cond(), r.verilog_cond())
            }
            Expr::UnaryOp(UnaryOp::Not, e) => format!("({} == 0)", e.verilog()),
            _ => self.verilog(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Int(v) => write!(f, "{v}"),
            Expr::Var(name) | Expr::Port(name) => write!(f, "{name}"),
            Expr::State(id) => write!(f, "{}", id.state_name()),
            Expr::BinOp(op, l, r) => write!(f, "({l} {} {r})", op.symbol()),
            Expr::UnaryOp(UnaryOp::Neg, e) => write!(f, "(-{e})"),
            Expr::UnaryOp(UnaryOp::Not, e) => write!(f, "(not {e})"),
        }
    }
}
