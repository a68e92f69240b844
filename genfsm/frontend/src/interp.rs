//! Reference interpreter for generator functions. It runs the syntax tree
//! directly and produces the sequence of yielded values, which is what the
//! generated hardware has to reproduce.
use crate::ast::{self, BoolOperator, FunctionDef, Stmt, UnaryOperator};
use genfsm_ir::UnaryOp;
use genfsm_utils::{Error, FsmResult, Id, structure};
use std::collections::HashMap;

pub struct Interpreter<'a> {
    func: &'a FunctionDef,
    max_steps: usize,
}

/// Mutable state of one run.
struct Frame {
    env: HashMap<Id, i64>,
    outputs: Vec<Vec<i64>>,
    steps: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(func: &'a FunctionDef) -> Self {
        Interpreter {
            func,
            max_steps: 1_000_000,
        }
    }

    /// Bound the number of executed statements.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Run the generator to completion and collect everything it yields.
    pub fn run(&self, args: &[i64]) -> FsmResult<Vec<Vec<i64>>> {
        structure::check_arity(
            "arguments",
            self.func.params.len(),
            args.len(),
        )?;
        let mut frame = Frame {
            env: self
                .func
                .params
                .iter()
                .copied()
                .zip(args.iter().copied())
                .collect(),
            outputs: vec![],
            steps: 0,
        };
        self.block(&self.func.body, &mut frame)?;
        log::debug!(
            "Interpreted `{}` in {} steps",
            self.func.name,
            frame.steps
        );
        Ok(frame.outputs)
    }

    fn block(&self, stmts: &[Stmt], frame: &mut Frame) -> FsmResult<()> {
        stmts.iter().try_for_each(|s| self.stmt(s, frame))
    }

    fn tick(&self, frame: &mut Frame) -> FsmResult<()> {
        frame.steps += 1;
        if frame.steps > self.max_steps {
            return Err(Error::misc(format!(
                "`{}` did not finish within {} steps",
                self.func.name, self.max_steps
            )));
        }
        Ok(())
    }

    fn stmt(&self, stmt: &Stmt, frame: &mut Frame) -> FsmResult<()> {
        self.tick(frame)?;
        match stmt {
            Stmt::Pass | Stmt::Expr(ast::Expr::Str(_)) => Ok(()),
            Stmt::Expr(ast::Expr::Yield(Some(value))) => {
                let values = match value.as_ref() {
                    ast::Expr::Tuple(es) => es
                        .iter()
                        .map(|e| self.expr(e, frame))
                        .collect::<FsmResult<Vec<_>>>()?,
                    e => vec![self.expr(e, frame)?],
                };
                frame.outputs.push(values);
                Ok(())
            }
            Stmt::Assign { targets, value } => {
                let values = match value {
                    ast::Expr::Tuple(es) => es
                        .iter()
                        .map(|e| self.expr(e, frame))
                        .collect::<FsmResult<Vec<_>>>()?,
                    e => vec![self.expr(e, frame)?],
                };
                for target in targets {
                    self.bind(target, &values, frame)?;
                }
                Ok(())
            }
            Stmt::AugAssign { target, op, value } => {
                let ast::Expr::Name(name) = target else {
                    return Err(unsupported(target.construct()));
                };
                let op =
                    op.to_binop().ok_or_else(|| unsupported(op.describe()))?;
                let l = self.read(*name, frame)?;
                let r = self.expr(value, frame)?;
                frame.env.insert(*name, op.apply(l, r)?);
                Ok(())
            }
            Stmt::If { test, body, orelse } => {
                if self.expr(test, frame)? != 0 {
                    self.block(body, frame)
                } else {
                    self.block(orelse, frame)
                }
            }
            Stmt::While { test, body, orelse } => {
                if !orelse.is_empty() {
                    return Err(unsupported("`else` clause of a while loop"));
                }
                while self.expr(test, frame)? != 0 {
                    self.tick(frame)?;
                    self.block(body, frame)?;
                }
                Ok(())
            }
            Stmt::For {
                target,
                iter,
                body,
                orelse,
            } => {
                if !orelse.is_empty() {
                    return Err(unsupported("`else` clause of a for loop"));
                }
                let (start, stop, step) = self.range(iter, frame)?;
                let mut i = start;
                while (step > 0 && i < stop) || (step < 0 && i > stop) {
                    self.tick(frame)?;
                    self.bind(target, &[i], frame)?;
                    self.block(body, frame)?;
                    i = i.wrapping_add(step);
                }
                Ok(())
            }
            _ => Err(unsupported(stmt.construct())),
        }
    }

    /// Bounds of a `range(..)` call.
    fn range(
        &self,
        iter: &ast::Expr,
        frame: &Frame,
    ) -> FsmResult<(i64, i64, i64)> {
        let ast::Expr::Call(func, args) = iter else {
            return Err(unsupported(iter.construct()));
        };
        if *func != "range" {
            return Err(unsupported(format!("call to `{func}`")));
        }
        let args = args
            .iter()
            .map(|a| self.expr(a, frame))
            .collect::<FsmResult<Vec<_>>>()?;
        match args.as_slice() {
            [stop] => Ok((0, *stop, 1)),
            [start, stop] => Ok((*start, *stop, 1)),
            [_, _, 0] => Err(Error::misc("range step must not be zero")),
            [start, stop, step] => Ok((*start, *stop, *step)),
            _ => Err(unsupported(format!(
                "range with {} arguments",
                args.len()
            ))),
        }
    }

    fn bind(
        &self,
        target: &ast::Expr,
        values: &[i64],
        frame: &mut Frame,
    ) -> FsmResult<()> {
        match (target, values) {
            (ast::Expr::Name(name), [v]) => {
                frame.env.insert(*name, *v);
                Ok(())
            }
            (ast::Expr::Tuple(names), values)
                if names.len() == values.len() =>
            {
                for (name, v) in names.iter().zip(values) {
                    self.bind(name, &[*v], frame)?;
                }
                Ok(())
            }
            (target, values) => Err(Error::misc(format!(
                "cannot assign {} value(s) to a {}",
                values.len(),
                target.construct()
            ))),
        }
    }

    fn read(&self, name: Id, frame: &Frame) -> FsmResult<i64> {
        frame.env.get(&name).copied().ok_or_else(|| {
            Error::misc(format!("`{name}` is read before it is assigned"))
        })
    }

    fn expr(&self, e: &ast::Expr, frame: &Frame) -> FsmResult<i64> {
        match e {
            ast::Expr::Int(v) => Ok(*v),
            ast::Expr::Bool(b) => Ok(i64::from(*b)),
            ast::Expr::Name(name) => self.read(*name, frame),
            ast::Expr::BinOp(op, l, r) => {
                let op =
                    op.to_binop().ok_or_else(|| unsupported(op.describe()))?;
                op.apply(self.expr(l, frame)?, self.expr(r, frame)?)
            }
            ast::Expr::UnaryOp(op, e) => {
                let v = self.expr(e, frame)?;
                match op {
                    UnaryOperator::USub => Ok(UnaryOp::Neg.apply(v)),
                    UnaryOperator::UAdd => Ok(v),
                    UnaryOperator::Not => Ok(UnaryOp::Not.apply(v)),
                    UnaryOperator::Invert => {
                        Err(unsupported("bitwise operator `~`"))
                    }
                }
            }
            ast::Expr::BoolOp(op, values) => {
                let mut last = 0;
                for value in values {
                    last = self.expr(value, frame)?;
                    let decided = match op {
                        BoolOperator::And => last == 0,
                        BoolOperator::Or => last != 0,
                    };
                    if decided {
                        break;
                    }
                }
                Ok(last)
            }
            ast::Expr::Compare(first, rest) => {
                let mut l = self.expr(first, frame)?;
                for (op, r) in rest {
                    let r = self.expr(r, frame)?;
                    if op.to_binop().apply(l, r)? == 0 {
                        return Ok(0);
                    }
                    l = r;
                }
                Ok(1)
            }
            e => Err(unsupported(e.construct())),
        }
    }
}

fn unsupported<S: ToString>(what: S) -> Error {
    Error::unsupported_construct(what)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str, args: &[i64]) -> FsmResult<Vec<Vec<i64>>> {
        let func = FunctionDef::construct_from_str(src)?;
        Interpreter::new(&func).run(args)
    }

    #[test]
    fn fib() {
        let src = "\
def fib(n):
    a, b = 0, 1
    for _ in range(n):
        yield a
        a, b = b, a + b
";
        let out = run(src, &[6]).unwrap();
        assert_eq!(out, [0, 1, 1, 2, 3, 5].map(|v| vec![v]));
    }

    #[test]
    fn python_semantics() {
        let src = "\
def f(n):
    yield n // -2, n % -3, -n // 2, 2 and n, 0 or 0, 1 < n <= 5, not n
";
        assert_eq!(run(src, &[5]).unwrap(), vec![vec![-3, -1, -3, 5, 0, 1, 0]]);
    }

    #[test]
    fn runaway_loops_are_cut() {
        let func = FunctionDef::construct_from_str(
            "def f(n):\n    while n > 0:\n        n = n + 1\n",
        )
        .unwrap();
        assert!(Interpreter::new(&func).with_max_steps(100).run(&[1]).is_err());
    }

    #[test]
    fn countdown() {
        let src = "\
def f():
    for i in range(6, 0, -2):
        yield i
    yield i
";
        assert_eq!(run(src, &[]).unwrap(), [6, 4, 2, 2].map(|v| vec![v]));
    }
}
