//! Syntax tree of the generator subset of the host language.
use super::parser;
use atty::Stream;
use genfsm_ir::BinOp;
use genfsm_utils::{Error, FsmResult, Id};
use std::path::PathBuf;

/// A generator function definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionDef {
    pub name: Id,
    pub params: Vec<Id>,
    pub body: Vec<Stmt>,
}

impl FunctionDef {
    pub fn new<S: Into<Id>>(name: S, params: Vec<Id>, body: Vec<Stmt>) -> Self {
        FunctionDef {
            name: name.into(),
            params,
            body,
        }
    }

    /// Parse a function from a file or, when no file is given, from standard
    /// input.
    pub fn construct(file: &Option<PathBuf>) -> FsmResult<Self> {
        match file {
            Some(file) => parser::GeneratorParser::parse_file(file),
            None => {
                if atty::isnt(Stream::Stdin) {
                    parser::GeneratorParser::parse(std::io::stdin())
                } else {
                    Err(Error::invalid_file(
                        "No file provided and terminal not a TTY".to_string(),
                    ))
                }
            }
        }
    }

    pub fn construct_from_str(inp: &str) -> FsmResult<Self> {
        parser::GeneratorParser::parse(inp.as_bytes())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stmt {
    /// `t1 = t2 = value`. Every target may be a tuple.
    Assign { targets: Vec<Expr>, value: Expr },
    AugAssign {
        target: Expr,
        op: Operator,
        value: Expr,
    },
    /// An expression evaluated for its effect, e.g. `yield x`.
    Expr(Expr),
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    Pass,
    Break,
    Continue,
    Return(Option<Expr>),
    FunctionDef(Box<FunctionDef>),
    Try(Vec<Stmt>),
}

impl Stmt {
    /// Human readable name of the construct.
    pub fn construct(&self) -> &'static str {
        match self {
            Stmt::Assign { .. } => "assignment",
            Stmt::AugAssign { .. } => "augmented assignment",
            Stmt::Expr(_) => "expression statement",
            Stmt::If { .. } => "if statement",
            Stmt::While { .. } => "while loop",
            Stmt::For { .. } => "for loop",
            Stmt::Pass => "pass",
            Stmt::Break => "break",
            Stmt::Continue => "continue",
            Stmt::Return(_) => "return",
            Stmt::FunctionDef(_) => "nested function definition",
            Stmt::Try(_) => "exception handling",
        }
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Stmt::Assign {
            targets: vec![target],
            value,
        }
    }

    pub fn yield_(value: Expr) -> Self {
        Stmt::Expr(Expr::Yield(Some(Box::new(value))))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    Int(i64),
    Bool(bool),
    Str(String),
    Name(Id),
    Tuple(Vec<Expr>),
    BinOp(Operator, Box<Expr>, Box<Expr>),
    UnaryOp(UnaryOperator, Box<Expr>),
    /// `a or b or c` is a single node with three values.
    BoolOp(BoolOperator, Vec<Expr>),
    /// `a < b <= c` is `Compare(a, [(<, b), (<=, c)])`.
    Compare(Box<Expr>, Vec<(CmpOp, Expr)>),
    Call(Id, Vec<Expr>),
    Yield(Option<Box<Expr>>),
}

impl Expr {
    pub fn name<S: Into<Id>>(name: S) -> Self {
        Expr::Name(name.into())
    }

    pub fn binop(op: Operator, l: Expr, r: Expr) -> Self {
        Expr::BinOp(op, Box::new(l), Box::new(r))
    }

    pub fn construct(&self) -> &'static str {
        match self {
            Expr::Int(_) => "integer literal",
            Expr::Bool(_) => "boolean literal",
            Expr::Str(_) => "string literal",
            Expr::Name(_) => "name",
            Expr::Tuple(_) => "tuple",
            Expr::BinOp(..) => "binary operation",
            Expr::UnaryOp(..) => "unary operation",
            Expr::BoolOp(..) => "boolean operation",
            Expr::Compare(..) => "comparison",
            Expr::Call(..) => "function call",
            Expr::Yield(_) => "yield expression",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mult,
    FloorDiv,
    Mod,
    Div,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    LShift,
    RShift,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mult => "*",
            Operator::FloorDiv => "//",
            Operator::Mod => "%",
            Operator::Div => "/",
            Operator::Pow => "**",
            Operator::BitAnd => "&",
            Operator::BitOr => "|",
            Operator::BitXor => "^",
            Operator::LShift => "<<",
            Operator::RShift => ">>",
        }
    }

    /// The IR operator, if the operator can be compiled.
    pub fn to_binop(&self) -> Option<BinOp> {
        match self {
            Operator::Add => Some(BinOp::Add),
            Operator::Sub => Some(BinOp::Sub),
            Operator::Mult => Some(BinOp::Mul),
            Operator::FloorDiv => Some(BinOp::Div),
            Operator::Mod => Some(BinOp::Mod),
            _ => None,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Operator::Div => "true division",
            Operator::Pow => "exponentiation",
            Operator::BitAnd
            | Operator::BitOr
            | Operator::BitXor
            | Operator::LShift
            | Operator::RShift => "bitwise operator",
            _ => "arithmetic operator",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOperator {
    USub,
    UAdd,
    Not,
    Invert,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoolOperator {
    And,
    Or,
}

impl BoolOperator {
    pub fn to_binop(&self) -> BinOp {
        match self {
            BoolOperator::And => BinOp::And,
            BoolOperator::Or => BinOp::Or,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    LtE,
    Gt,
    GtE,
    Eq,
    NotEq,
}

impl CmpOp {
    pub fn to_binop(&self) -> BinOp {
        match self {
            CmpOp::Lt => BinOp::LessThan,
            CmpOp::LtE => BinOp::LessEq,
            CmpOp::Gt => BinOp::GreaterThan,
            CmpOp::GtE => BinOp::GreaterEq,
            CmpOp::Eq => BinOp::Equal,
            CmpOp::NotEq => BinOp::NotEqual,
        }
    }
}
