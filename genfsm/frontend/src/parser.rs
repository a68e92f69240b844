#![allow(clippy::upper_case_acronyms)]

//! Parser for the generator subset of the host language.
use super::ast::{
    BoolOperator, CmpOp, Expr, FunctionDef, Operator, Stmt, UnaryOperator,
};
use genfsm_utils::{self, FsmResult, Id};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest_consume::{Error, Parser, match_nodes};
use std::fs;
use std::io::Read;
use std::path::Path;

type ParseResult<T> = Result<T, Error<Rule>>;

type Node<'i> = pest_consume::Node<'i, Rule, ()>;

// include the grammar file so that Cargo knows to rebuild this file on
// grammar changes
const _GRAMMAR: &str = include_str!("syntax.pest");

// Precedence of arithmetic and boolean operators, loosest binding first.
lazy_static::lazy_static! {
    static ref ARITH: PrattParser<Rule> =
    PrattParser::new()
        .op(Op::infix(Rule::bitor, Assoc::Left))
        .op(Op::infix(Rule::bitxor, Assoc::Left))
        .op(Op::infix(Rule::bitand, Assoc::Left))
        .op(Op::infix(Rule::lshift, Assoc::Left) | Op::infix(Rule::rshift, Assoc::Left))
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
        .op(Op::infix(Rule::mul, Assoc::Left)
            | Op::infix(Rule::div, Assoc::Left)
            | Op::infix(Rule::floordiv, Assoc::Left)
            | Op::infix(Rule::modulo, Assoc::Left))
        .op(Op::prefix(Rule::neg) | Op::prefix(Rule::pos) | Op::prefix(Rule::invert))
        .op(Op::infix(Rule::pow, Assoc::Right));

    static ref BOOL: PrattParser<Rule> =
    PrattParser::new()
        .op(Op::infix(Rule::or_kw, Assoc::Left))
        .op(Op::infix(Rule::and_kw, Assoc::Left));
}

#[derive(Parser)]
#[grammar = "syntax.pest"]
pub struct GeneratorParser;

impl GeneratorParser {
    /// Parse the generator function defined in a file.
    pub fn parse_file(path: &Path) -> FsmResult<FunctionDef> {
        let time = std::time::Instant::now();
        let content = &fs::read(path).map_err(|err| {
            genfsm_utils::Error::invalid_file(format!(
                "Failed to read {}: {err}",
                path.to_string_lossy(),
            ))
        })?;
        let content = std::str::from_utf8(content)?;
        let out = Self::parse_str(content)
            .map_err(|e| e.with_path(&path.to_string_lossy()))
            .map_err(|e| {
                genfsm_utils::Error::misc(format!(
                    "Failed to parse `{}`: {e}",
                    path.to_string_lossy(),
                ))
            })?;
        log::info!(
            "Parsed `{}` in {}ms",
            path.to_string_lossy(),
            time.elapsed().as_millis()
        );
        Ok(out)
    }

    pub fn parse<R: Read>(mut r: R) -> FsmResult<FunctionDef> {
        let mut buf = String::new();
        r.read_to_string(&mut buf).map_err(|err| {
            genfsm_utils::Error::invalid_file(format!(
                "Failed to parse buffer: {err}",
            ))
        })?;
        Self::parse_str(&buf).map_err(|e| {
            genfsm_utils::Error::misc(format!("Failed to parse buffer: {e}"))
        })
    }

    #[allow(clippy::result_large_err)]
    fn parse_str(content: &str) -> ParseResult<FunctionDef> {
        let inputs = <GeneratorParser as Parser>::parse(Rule::file, content)?;
        let input = inputs.single()?;
        GeneratorParser::file(input)
    }

    #[allow(clippy::result_large_err)]
    fn arith_helper(pairs: pest::iterators::Pairs<Rule>) -> ParseResult<Expr> {
        ARITH
            .map_primary(|primary| {
                let node = Node::new_with_user_data(primary, ());
                match node.as_rule() {
                    Rule::int_lit => Self::int_lit(node),
                    Rule::true_kw => Ok(Expr::Bool(true)),
                    Rule::false_kw => Ok(Expr::Bool(false)),
                    Rule::string => Self::string(node).map(Expr::Str),
                    Rule::call => Self::call(node),
                    Rule::name => Self::name(node),
                    Rule::paren => Self::paren(node),
                    x => unreachable!("Unexpected rule {:?} for arith", x),
                }
            })
            .map_prefix(|op, rhs| {
                let op = match op.as_rule() {
                    Rule::neg => UnaryOperator::USub,
                    Rule::pos => UnaryOperator::UAdd,
                    Rule::invert => UnaryOperator::Invert,
                    _ => unreachable!(),
                };
                Ok(Expr::UnaryOp(op, Box::new(rhs?)))
            })
            .map_infix(|lhs, op, rhs| {
                let op = match op.as_rule() {
                    Rule::pow => Operator::Pow,
                    Rule::mul => Operator::Mult,
                    Rule::floordiv => Operator::FloorDiv,
                    Rule::div => Operator::Div,
                    Rule::modulo => Operator::Mod,
                    Rule::add => Operator::Add,
                    Rule::sub => Operator::Sub,
                    Rule::lshift => Operator::LShift,
                    Rule::rshift => Operator::RShift,
                    Rule::bitand => Operator::BitAnd,
                    Rule::bitor => Operator::BitOr,
                    Rule::bitxor => Operator::BitXor,
                    _ => unreachable!(),
                };
                Ok(Expr::binop(op, lhs?, rhs?))
            })
            .parse(pairs)
    }

    #[allow(clippy::result_large_err)]
    fn bool_helper(pairs: pest::iterators::Pairs<Rule>) -> ParseResult<Expr> {
        BOOL.map_primary(|primary| {
            Self::not_test(Node::new_with_user_data(primary, ()))
        })
        .map_infix(|lhs, op, rhs| {
            let op = match op.as_rule() {
                Rule::and_kw => BoolOperator::And,
                Rule::or_kw => BoolOperator::Or,
                _ => unreachable!(),
            };
            Ok(match lhs? {
                // `a or b or c` is a single operation
                Expr::BoolOp(lop, mut values) if lop == op => {
                    values.push(rhs?);
                    Expr::BoolOp(op, values)
                }
                lhs => Expr::BoolOp(op, vec![lhs, rhs?]),
            })
        })
        .parse(pairs)
    }
}

#[pest_consume::parser]
impl GeneratorParser {
    fn EOI(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    // ================ Keywords =====================
    fn if_kw(_input: Node) -> ParseResult<()> {
        Ok(())
    }
    fn while_kw(_input: Node) -> ParseResult<()> {
        Ok(())
    }
    fn for_kw(_input: Node) -> ParseResult<()> {
        Ok(())
    }
    fn in_kw(_input: Node) -> ParseResult<()> {
        Ok(())
    }
    fn def_kw(_input: Node) -> ParseResult<()> {
        Ok(())
    }
    fn try_kw(_input: Node) -> ParseResult<()> {
        Ok(())
    }
    fn not_kw(_input: Node) -> ParseResult<()> {
        Ok(())
    }
    fn yield_kw(_input: Node) -> ParseResult<()> {
        Ok(())
    }
    fn return_kw(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    // ================ Literals =====================
    fn ident(input: Node) -> ParseResult<Id> {
        Ok(Id::new(input.as_str()))
    }

    fn int_lit(input: Node) -> ParseResult<Expr> {
        let text = input.as_str();
        let parsed = if let Some(hex) =
            text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))
        {
            i64::from_str_radix(hex, 16)
        } else if let Some(bin) =
            text.strip_prefix("0b").or_else(|| text.strip_prefix("0B"))
        {
            i64::from_str_radix(bin, 2)
        } else {
            text.parse::<i64>()
        };
        parsed
            .map(Expr::Int)
            .map_err(|_| input.error("Integer literal does not fit in 64 bits"))
    }

    fn string(input: Node) -> ParseResult<String> {
        let text = input.as_str();
        let quote = if text.starts_with("\"\"\"") || text.starts_with("'''") {
            3
        } else {
            1
        };
        Ok(text[quote..text.len() - quote].to_string())
    }

    // ================ Expressions =====================
    fn name(input: Node) -> ParseResult<Expr> {
        Ok(match_nodes!(
            input.into_children();
            [ident(id)] => Expr::Name(id),
        ))
    }

    fn call_args(input: Node) -> ParseResult<Vec<Expr>> {
        Ok(match_nodes!(
            input.into_children();
            [expr(args)..] => args.collect(),
        ))
    }

    fn call(input: Node) -> ParseResult<Expr> {
        Ok(match_nodes!(
            input.into_children();
            [ident(func)] => Expr::Call(func, vec![]),
            [ident(func), call_args(args)] => Expr::Call(func, args),
        ))
    }

    fn paren(input: Node) -> ParseResult<Expr> {
        Ok(match_nodes!(
            input.into_children();
            [] => Expr::Tuple(vec![]),
            [testlist(e)] => e,
        ))
    }

    fn arith(input: Node) -> ParseResult<Expr> {
        Self::arith_helper(input.into_pair().into_inner())
    }

    fn comp_op(input: Node) -> ParseResult<CmpOp> {
        Ok(match input.as_str() {
            "<" => CmpOp::Lt,
            "<=" => CmpOp::LtE,
            ">" => CmpOp::Gt,
            ">=" => CmpOp::GtE,
            "==" => CmpOp::Eq,
            "!=" => CmpOp::NotEq,
            op => return Err(input.error(format!("Unknown comparison `{op}`"))),
        })
    }

    fn comparand(input: Node) -> ParseResult<(CmpOp, Expr)> {
        Ok(match_nodes!(
            input.into_children();
            [comp_op(op), arith(e)] => (op, e),
        ))
    }

    fn comparison(input: Node) -> ParseResult<Expr> {
        Ok(match_nodes!(
            input.into_children();
            [arith(e)] => e,
            [arith(l), comparand(rest)..] => {
                Expr::Compare(Box::new(l), rest.collect())
            }
        ))
    }

    fn not_test(input: Node) -> ParseResult<Expr> {
        Ok(match_nodes!(
            input.into_children();
            [not_kw(_), not_test(e)] => Expr::UnaryOp(UnaryOperator::Not, Box::new(e)),
            [comparison(e)] => e,
        ))
    }

    fn expr(input: Node) -> ParseResult<Expr> {
        Self::bool_helper(input.into_pair().into_inner())
    }

    fn tuple_items(input: Node) -> ParseResult<Expr> {
        Ok(match_nodes!(
            input.into_children();
            [expr(es)..] => Expr::Tuple(es.collect()),
        ))
    }

    fn testlist(input: Node) -> ParseResult<Expr> {
        Ok(match_nodes!(
            input.into_children();
            [tuple_items(t)] => t,
            [expr(e)] => e,
        ))
    }

    fn yield_expr(input: Node) -> ParseResult<Expr> {
        Ok(match_nodes!(
            input.into_children();
            [yield_kw(_)] => Expr::Yield(None),
            [yield_kw(_), testlist(e)] => Expr::Yield(Some(Box::new(e))),
        ))
    }

    // ================ Statements =====================
    fn pass_stmt(_input: Node) -> ParseResult<Stmt> {
        Ok(Stmt::Pass)
    }

    fn break_stmt(_input: Node) -> ParseResult<Stmt> {
        Ok(Stmt::Break)
    }

    fn continue_stmt(_input: Node) -> ParseResult<Stmt> {
        Ok(Stmt::Continue)
    }

    fn return_stmt(input: Node) -> ParseResult<Stmt> {
        Ok(match_nodes!(
            input.into_children();
            [return_kw(_)] => Stmt::Return(None),
            [return_kw(_), testlist(e)] => Stmt::Return(Some(e)),
        ))
    }

    fn aug_op(input: Node) -> ParseResult<Operator> {
        let op = input.as_str().trim_end_matches('=');
        Ok(match op {
            "+" => Operator::Add,
            "-" => Operator::Sub,
            "*" => Operator::Mult,
            "//" => Operator::FloorDiv,
            "/" => Operator::Div,
            "%" => Operator::Mod,
            "**" => Operator::Pow,
            "&" => Operator::BitAnd,
            "|" => Operator::BitOr,
            "^" => Operator::BitXor,
            "<<" => Operator::LShift,
            ">>" => Operator::RShift,
            _ => return Err(input.error(format!("Unknown operator `{op}=`"))),
        })
    }

    fn aug_assign(input: Node) -> ParseResult<Stmt> {
        Ok(match_nodes!(
            input.into_children();
            [testlist(target), aug_op(op), testlist(value)] => Stmt::AugAssign { target, op, value },
            [testlist(target), aug_op(op), yield_expr(value)] => Stmt::AugAssign { target, op, value },
        ))
    }

    fn assign_targets(input: Node) -> ParseResult<Vec<Expr>> {
        Ok(match_nodes!(
            input.into_children();
            [testlist(targets)..] => targets.collect(),
        ))
    }

    fn assign_value(input: Node) -> ParseResult<Expr> {
        Ok(match_nodes!(
            input.into_children();
            [testlist(e)] => e,
            [yield_expr(e)] => e,
        ))
    }

    fn assign(input: Node) -> ParseResult<Stmt> {
        Ok(match_nodes!(
            input.into_children();
            [assign_targets(targets), assign_value(value)] => Stmt::Assign { targets, value },
        ))
    }

    fn expr_stmt(input: Node) -> ParseResult<Stmt> {
        Ok(match_nodes!(
            input.into_children();
            [yield_expr(e)] => Stmt::Expr(e),
            [testlist(e)] => Stmt::Expr(e),
        ))
    }

    fn else_head(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn else_clause(input: Node) -> ParseResult<Vec<Stmt>> {
        Ok(match_nodes!(
            input.into_children();
            [else_head(_), block(body)] => body,
        ))
    }

    fn elif_head(input: Node) -> ParseResult<Expr> {
        Ok(match_nodes!(
            input.into_children();
            [elif_kw(_), expr(test)] => test,
        ))
    }

    fn elif_kw(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    /// An `elif` is an `if` nested in the `else` branch.
    fn elif_clause(input: Node) -> ParseResult<Vec<Stmt>> {
        let stmt = match_nodes!(
            input.into_children();
            [elif_head(test), block(body)] => Stmt::If { test, body, orelse: vec![] },
            [elif_head(test), block(body), elif_clause(orelse)] => Stmt::If { test, body, orelse },
            [elif_head(test), block(body), else_clause(orelse)] => Stmt::If { test, body, orelse },
        );
        Ok(vec![stmt])
    }

    fn if_stmt(input: Node) -> ParseResult<Stmt> {
        Ok(match_nodes!(
            input.into_children();
            [if_kw(_), expr(test), block(body)] => Stmt::If { test, body, orelse: vec![] },
            [if_kw(_), expr(test), block(body), elif_clause(orelse)] => Stmt::If { test, body, orelse },
            [if_kw(_), expr(test), block(body), else_clause(orelse)] => Stmt::If { test, body, orelse },
        ))
    }

    fn while_stmt(input: Node) -> ParseResult<Stmt> {
        Ok(match_nodes!(
            input.into_children();
            [while_kw(_), expr(test), block(body)] => Stmt::While { test, body, orelse: vec![] },
            [while_kw(_), expr(test), block(body), else_clause(orelse)] => Stmt::While { test, body, orelse },
        ))
    }

    fn for_stmt(input: Node) -> ParseResult<Stmt> {
        Ok(match_nodes!(
            input.into_children();
            [for_kw(_), testlist(target), in_kw(_), testlist(iter), block(body)] => {
                Stmt::For { target, iter, body, orelse: vec![] }
            },
            [for_kw(_), testlist(target), in_kw(_), testlist(iter), block(body), else_clause(orelse)] => {
                Stmt::For { target, iter, body, orelse }
            },
        ))
    }

    fn handler_clause(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn try_stmt(input: Node) -> ParseResult<Stmt> {
        Ok(match_nodes!(
            input.into_children();
            [try_kw(_), block(body), handler_clause(_handlers)..] => Stmt::Try(body),
        ))
    }

    fn annotation(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn ret_annotation(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn param(input: Node) -> ParseResult<Id> {
        Ok(match_nodes!(
            input.into_children();
            [ident(name)] => name,
            [ident(name), annotation(_)] => name,
        ))
    }

    fn params(input: Node) -> ParseResult<Vec<Id>> {
        Ok(match_nodes!(
            input.into_children();
            [param(params)..] => params.collect(),
        ))
    }

    fn def_stmt(input: Node) -> ParseResult<FunctionDef> {
        Ok(match_nodes!(
            input.into_children();
            [def_kw(_), ident(name), block(body)] => FunctionDef::new(name, vec![], body),
            [def_kw(_), ident(name), ret_annotation(_), block(body)] => FunctionDef::new(name, vec![], body),
            [def_kw(_), ident(name), params(params), block(body)] => FunctionDef::new(name, params, body),
            [def_kw(_), ident(name), params(params), ret_annotation(_), block(body)] => FunctionDef::new(name, params, body),
        ))
    }

    fn statement(input: Node) -> ParseResult<Stmt> {
        Ok(match_nodes!(
            input.into_children();
            [if_stmt(s)] => s,
            [while_stmt(s)] => s,
            [for_stmt(s)] => s,
            [def_stmt(f)] => Stmt::FunctionDef(Box::new(f)),
            [try_stmt(s)] => s,
            [pass_stmt(s)] => s,
            [break_stmt(s)] => s,
            [continue_stmt(s)] => s,
            [return_stmt(s)] => s,
            [aug_assign(s)] => s,
            [assign(s)] => s,
            [expr_stmt(s)] => s,
        ))
    }

    fn block(input: Node) -> ParseResult<Vec<Stmt>> {
        Ok(match_nodes!(
            input.into_children();
            [statement(stmts)..] => stmts.collect(),
        ))
    }

    // ================ Files =====================
    fn preamble(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn file(input: Node) -> ParseResult<FunctionDef> {
        Ok(match_nodes!(
            input.into_children();
            [preamble(_), def_stmt(f), EOI(_)] => f,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> FunctionDef {
        FunctionDef::construct_from_str(src).unwrap()
    }

    #[test]
    fn function_header() {
        let f = parse(
            "from typing import Iterator\n\n\
             def count(n: int, step: int) -> Iterator[int]:\n    yield n\n",
        );
        assert_eq!(f.name, "count");
        assert_eq!(f.params, vec![Id::new("n"), Id::new("step")]);
        assert_eq!(f.body, vec![Stmt::yield_(Expr::name("n"))]);
    }

    #[test]
    fn operator_precedence() {
        let f = parse("def f(a, b):\n    x = -a + b * 2 // 3 ** 2\n");
        let expected = Expr::binop(
            Operator::Add,
            Expr::UnaryOp(UnaryOperator::USub, Box::new(Expr::name("a"))),
            Expr::binop(
                Operator::FloorDiv,
                Expr::binop(Operator::Mult, Expr::name("b"), Expr::Int(2)),
                Expr::binop(Operator::Pow, Expr::Int(3), Expr::Int(2)),
            ),
        );
        assert_eq!(f.body, vec![Stmt::assign(Expr::name("x"), expected)]);
    }

    #[test]
    fn boolean_chains_are_flattened() {
        let f = parse("def f(a, b, c):\n    yield a or b or not c and a\n");
        let Stmt::Expr(Expr::Yield(Some(e))) = &f.body[0] else {
            panic!("expected a yield, got {:?}", f.body[0])
        };
        let Expr::BoolOp(BoolOperator::Or, values) = e.as_ref() else {
            panic!("expected `or`, got {e:?}")
        };
        assert_eq!(values.len(), 3);
        assert!(matches!(values[2], Expr::BoolOp(BoolOperator::And, _)));
    }

    #[test]
    fn tuples_and_comparisons() {
        let f = parse(
            "def f(n):\n    a, b = 0, 1\n    yield (a,)\n    x = a < b <= n\n",
        );
        assert_eq!(
            f.body[0],
            Stmt::assign(
                Expr::Tuple(vec![Expr::name("a"), Expr::name("b")]),
                Expr::Tuple(vec![Expr::Int(0), Expr::Int(1)]),
            )
        );
        assert_eq!(f.body[1], Stmt::yield_(Expr::Tuple(vec![Expr::name("a")])));
        let Stmt::Assign { value: Expr::Compare(_, rest), .. } = &f.body[2]
        else {
            panic!("expected a comparison, got {:?}", f.body[2])
        };
        assert_eq!(rest.len(), 2);
    }

    #[test]
    fn nested_blocks_and_elif() {
        let src = "\
def f(n):
    \"\"\"Docstring
    spanning lines.\"\"\"
    i = 0  # counter
    while i < n:

        if i % 3 == 0:
            yield 0
        elif i % 3 == 1:
            yield 1
        else:
            # comment only
            yield 2
        i += 1
    for j in range(0, 4, 2):
        pass
";
        let f = parse(src);
        assert_eq!(f.body.len(), 4);
        assert!(matches!(f.body[0], Stmt::Expr(Expr::Str(_))));
        let Stmt::While { body, .. } = &f.body[2] else {
            panic!("expected a loop, got {:?}", f.body[2])
        };
        assert_eq!(body.len(), 2);
        let Stmt::If { orelse, .. } = &body[0] else {
            panic!("expected an if, got {:?}", body[0])
        };
        assert!(matches!(
            orelse.as_slice(),
            [Stmt::If { orelse, .. }] if orelse.len() == 1
        ));
        assert!(matches!(
            body[1],
            Stmt::AugAssign { op: Operator::Add, .. }
        ));
        assert!(matches!(f.body[3], Stmt::For { .. }));
    }

    #[test]
    fn unsupported_statements_still_parse() {
        let src = "\
def f(n):
    try:
        x = n / 2
    except ValueError as e:
        return
    while n:
        break
    else:
        continue
";
        let f = parse(src);
        assert!(matches!(f.body[0], Stmt::Try(_)));
        assert!(matches!(
            f.body[1],
            Stmt::While { ref orelse, .. } if orelse == &vec![Stmt::Continue]
        ));
    }

    #[test]
    fn missing_final_newline() {
        let f = parse("def f():\n    yield 1");
        assert_eq!(f.body.len(), 1);
    }

    #[test]
    fn bad_indentation() {
        for src in ["def f():\n    x = 1\n      y = 2\n", "def f():\nx = 1\n"] {
            assert!(FunctionDef::construct_from_str(src).is_err());
        }
    }
}
