//! Traits implemented by every optimization pass.
use genfsm_ir::{Graph, IdCounter};
use genfsm_utils::FsmResult;

/// Trait that describes named things. Calling [`do_pass`](Pass::do_pass)
/// requires this to be implemented.
pub trait Named {
    /// The name of a pass. Is used for identifying passes.
    fn name() -> &'static str;
    /// A short description of the pass.
    fn description() -> &'static str;
}

/// Trait defining method that can be used to construct a pass from the
/// optimization level.
///
/// For passes that do not depend on the level, this trait is derived from
/// [Default].
pub trait ConstructPass {
    fn from(level: u32) -> FsmResult<Self>
    where
        Self: Sized;
}

impl<T: Default + Sized + Pass> ConstructPass for T {
    fn from(_level: u32) -> FsmResult<Self> {
        Ok(T::default())
    }
}

/// A graph-to-graph rewrite. Passes own the graph they transform and draw
/// the ids of any node they create from the session counter.
pub trait Pass {
    fn transform(
        &mut self,
        graph: Graph,
        ids: &mut IdCounter,
    ) -> FsmResult<Graph>;

    /// Construct the pass, run it and check that the result is well formed.
    fn do_pass(
        graph: Graph,
        ids: &mut IdCounter,
        level: u32,
    ) -> FsmResult<Graph>
    where
        Self: ConstructPass + Named + Sized,
    {
        let mut pass = Self::from(level)?;
        let graph = pass.transform(graph, ids)?;
        graph.validate().map_err(|err| {
            err.with_post_msg(Some(format!(
                "Graph is malformed after `{}`",
                Self::name()
            )))
        })?;
        Ok(graph)
    }
}
