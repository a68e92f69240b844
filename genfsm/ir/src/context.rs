//! Variable classification of a lowered generator.
use crate::names;
use genfsm_utils::{Error, FsmResult, Id};
use linked_hash_map::LinkedHashMap;
use std::fmt;

/// The four disjoint scopes a variable can belong to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Scope {
    /// Compiler-generated temporaries.
    Global,
    /// Parameters of the generator.
    Input,
    /// Elements of the yielded tuple.
    Output,
    /// Locals assigned by the generator. They live in registers across
    /// clock cycles.
    State,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scope::Global => "global",
            Scope::Input => "input",
            Scope::Output => "output",
            Scope::State => "state",
        };
        f.write_str(s)
    }
}

/// The variables of one compiled generator, in declaration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Context {
    /// Name of the generator function.
    pub name: Id,
    vars: LinkedHashMap<Id, Scope>,
}

impl Context {
    pub fn new<S: Into<Id>>(name: S) -> Self {
        Context {
            name: name.into(),
            vars: LinkedHashMap::new(),
        }
    }

    /// Declare `name` in `scope`. Declaring a name twice in the same scope is
    /// allowed; moving it to another scope is not.
    pub fn declare(&mut self, name: Id, scope: Scope) -> FsmResult<()> {
        match self.vars.get(&name) {
            Some(prev) if *prev != scope => Err(Error::structural_type(
                format!(
                    "`{name}` is declared as {prev} and cannot become {scope}"
                ),
            )),
            Some(_) => Ok(()),
            None => {
                self.vars.insert(name, scope);
                Ok(())
            }
        }
    }

    /// Declare the outputs `out0..out<arity>`.
    pub fn declare_outputs(&mut self, arity: usize) -> FsmResult<()> {
        (0..arity).try_for_each(|i| {
            self.declare(Self::output_name(i), Scope::Output)
        })
    }

    /// Name of the `i`th output.
    pub fn output_name(i: usize) -> Id {
        Id::from(format!("out{i}"))
    }

    pub fn scope_of(&self, name: Id) -> Option<Scope> {
        self.vars.get(&name).copied()
    }

    pub fn is_declared(&self, name: Id) -> bool {
        self.vars.contains_key(&name)
    }

    /// Variables of `scope` in declaration order.
    pub fn vars_in(&self, scope: Scope) -> impl Iterator<Item = Id> + '_ {
        self.vars
            .iter()
            .filter(move |(_, s)| **s == scope)
            .map(|(name, _)| *name)
    }

    pub fn inputs(&self) -> impl Iterator<Item = Id> + '_ {
        self.vars_in(Scope::Input)
    }

    pub fn outputs(&self) -> impl Iterator<Item = Id> + '_ {
        self.vars_in(Scope::Output)
    }

    pub fn states(&self) -> impl Iterator<Item = Id> + '_ {
        self.vars_in(Scope::State)
    }

    pub fn globals(&self) -> impl Iterator<Item = Id> + '_ {
        self.vars_in(Scope::Global)
    }

    /// Every variable that is backed by a register: inputs (captured on
    /// start), state variables and temporaries.
    pub fn registers(&self) -> impl Iterator<Item = Id> + '_ {
        self.inputs().chain(self.states()).chain(self.globals())
    }

    /// Check that no variable collides with a generated signal and that
    /// inputs are usable as port names.
    pub fn check_names(&self) -> FsmResult<()> {
        for (name, scope) in &self.vars {
            if *scope != Scope::Output
                && names::collides_with_signal(name.as_str())
            {
                return Err(Error::unsupported_construct(format!(
                    "identifier `{name}` collides with a generated signal"
                )));
            }
            if *scope == Scope::Input
                && !names::is_valid_identifier(name.as_str())
            {
                return Err(Error::unsupported_construct(format!(
                    "parameter `{name}` is not a valid port name"
                )));
            }
            // Ports keep the parameter name, registers get an underscore.
            if *scope == Scope::Input
                && name.as_str().strip_prefix('_').is_some_and(|rest| {
                    names::collides_with_signal(rest)
                        || self.vars.contains_key(&Id::from(rest))
                })
            {
                return Err(Error::unsupported_construct(format!(
                    "parameter `{name}` collides with a generated register"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genfsm_utils::ErrorKind;
    use itertools::Itertools;

    #[test]
    fn scopes_are_disjoint() {
        let mut ctx = Context::new("f");
        ctx.declare("n".into(), Scope::Input).unwrap();
        ctx.declare("n".into(), Scope::Input).unwrap();
        let err = ctx.declare("n".into(), Scope::State).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::StructuralType(_)));
        assert_eq!(ctx.scope_of("n".into()), Some(Scope::Input));
    }

    #[test]
    fn registers_in_declaration_order() {
        let mut ctx = Context::new("f");
        ctx.declare("it0".into(), Scope::Global).unwrap();
        ctx.declare("b".into(), Scope::State).unwrap();
        ctx.declare("n".into(), Scope::Input).unwrap();
        ctx.declare("a".into(), Scope::State).unwrap();
        ctx.declare_outputs(2).unwrap();
        assert_eq!(
            ctx.registers().map(|v| v.to_string()).collect_vec(),
            vec!["n", "b", "a", "it0"]
        );
        assert_eq!(
            ctx.outputs().map(|v| v.to_string()).collect_vec(),
            vec!["out0", "out1"]
        );
    }

    #[test]
    fn generated_signal_names_are_rejected() {
        let mut ctx = Context::new("f");
        ctx.declare("done".into(), Scope::State).unwrap();
        assert!(ctx.check_names().is_err());

        let mut ctx = Context::new("f");
        ctx.declare("wire".into(), Scope::Input).unwrap();
        assert!(ctx.check_names().is_err());

        let mut ctx = Context::new("f");
        ctx.declare_outputs(1).unwrap();
        ctx.declare("wire".into(), Scope::State).unwrap();
        assert!(ctx.check_names().is_ok());

        // The port `_x` would clash with the register of `x`.
        let mut ctx = Context::new("f");
        ctx.declare("_x".into(), Scope::Input).unwrap();
        ctx.declare("x".into(), Scope::State).unwrap();
        assert!(ctx.check_names().is_err());

        let mut ctx = Context::new("f");
        ctx.declare("_valid".into(), Scope::Input).unwrap();
        assert!(ctx.check_names().is_err());
    }
}
