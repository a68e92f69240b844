//! Assertions about the shape of containers handed between stages. A failed
//! check is a [StructuralType](crate::ErrorKind::StructuralType) error and
//! points at a bug in the caller.
use crate::{Error, FsmResult};
use itertools::Itertools;
use std::collections::HashSet;
use std::fmt::Display;
use std::hash::Hash;

/// Check that `what` has exactly `expected` elements.
pub fn check_arity(what: &str, expected: usize, found: usize) -> FsmResult<()> {
    if expected != found {
        return Err(Error::structural_type(format!(
            "{what}: expected {expected} element(s), found {found}"
        )));
    }
    Ok(())
}

/// Check that every element of `items` has the same length and return it.
/// Returns `None` for an empty iterator.
pub fn uniform_arity<I>(what: &str, lens: I) -> FsmResult<Option<usize>>
where
    I: IntoIterator<Item = usize>,
{
    let lens = lens.into_iter().unique().collect_vec();
    match lens.as_slice() {
        [] => Ok(None),
        [len] => Ok(Some(*len)),
        _ => Err(Error::structural_type(format!(
            "{what}: mixed arities {}",
            lens.iter().sorted().join(", ")
        ))),
    }
}

/// Check that no element of `items` occurs twice.
pub fn check_distinct<I, T>(what: &str, items: I) -> FsmResult<()>
where
    I: IntoIterator<Item = T>,
    T: Eq + Hash + Display,
{
    let mut seen = HashSet::new();
    for item in items {
        if seen.contains(&item) {
            return Err(Error::structural_type(format!(
                "{what}: `{item}` occurs more than once"
            )));
        }
        seen.insert(item);
    }
    Ok(())
}
