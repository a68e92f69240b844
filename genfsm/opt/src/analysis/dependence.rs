//! Read-after-write hazards between a path through a cycle and the region
//! that would be merged into the same cycle.
use genfsm_ir::{Graph, NodeId};
use genfsm_utils::{Error, FsmResult, Id};
use itertools::Itertools;
use std::collections::HashSet;

/// Every variable read anywhere in the combinational region of `target`:
/// right-hand sides, branch conditions and yielded values.
pub fn region_reads(graph: &Graph, target: NodeId) -> FsmResult<HashSet<Id>> {
    let mut reads = HashSet::new();
    for id in graph.region(target) {
        reads.extend(graph.get(id)?.reads());
    }
    Ok(reads)
}

/// Would merging the region of `target` after a path that wrote `written`
/// make it observe stale values? Writes only become visible at the next
/// clock edge, so any read of a written variable is a hazard. The check
/// ignores which branch of the region would actually execute.
pub fn is_dependent(
    graph: &Graph,
    target: NodeId,
    written: &HashSet<Id>,
) -> FsmResult<bool> {
    Ok(!region_reads(graph, target)?.is_disjoint(written))
}

/// Like [is_dependent] but reports the conflicting variables as a
/// [DependencyConflict](genfsm_utils::ErrorKind::DependencyConflict).
pub fn check_independent(
    graph: &Graph,
    target: NodeId,
    written: &HashSet<Id>,
) -> FsmResult<()> {
    let reads = region_reads(graph, target)?;
    let conflicts = reads.intersection(written).sorted().collect_vec();
    if conflicts.is_empty() {
        Ok(())
    } else {
        Err(Error::dependency_conflict(conflicts))
    }
}
