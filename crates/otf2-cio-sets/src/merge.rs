use std::collections::{BTreeMap, BTreeSet};

use otf2_cio_types::{
    CioError, CioResult, CioSet, Graph, ProcessGroup, ProcessId, SyncScope, VertexId,
};

/// A view: for each process still in play, the index of its current
/// fragment. A process drops out of the map once its fragment list is
/// exhausted.
type View = BTreeMap<ProcessId, usize>;

/// The Set Merge Engine (§4.3): walks every branch of the per-process
/// fragment map, at each step unioning the current fragment per process
/// into a candidate and picking which synchronization(s) close it.
pub fn merge_fragments(
    graph: &Graph,
    fragments: &BTreeMap<ProcessId, Vec<CioSet>>,
) -> CioResult<Vec<CioSet>> {
    let initial: View = fragments
        .iter()
        .filter(|(_, frags)| !frags.is_empty())
        .map(|(&p, _)| (p, 0))
        .collect();

    let mut stack = vec![initial];
    let mut emitted = Vec::new();

    while let Some(view) = stack.pop() {
        if view.is_empty() {
            continue;
        }

        let component_ends: BTreeMap<ProcessId, VertexId> = view
            .iter()
            .filter_map(|(&p, &idx)| fragments[&p][idx].end_event.map(|end| (p, end)))
            .collect();
        if component_ends.len() != view.len() {
            return Err(CioError::NoValidEndEvent {
                reason: "merge reached a fragment with no end_event",
            });
        }

        let component_fragments: Vec<&CioSet> =
            view.iter().map(|(&p, &idx)| &fragments[&p][idx]).collect();

        for end in select_end_events(graph, &component_ends)? {
            let mut candidate = CioSet::from_fragments(component_fragments.iter().copied());
            candidate.close(end, end);
            emitted.push(candidate);

            let group = ProcessGroup::of(graph, end);
            let mut next = view.clone();
            for p in group.iter() {
                if let Some(idx) = next.get_mut(&p) {
                    *idx += 1;
                    if *idx >= fragments[&p].len() {
                        next.remove(&p);
                    }
                }
            }
            if !next.is_empty() {
                stack.push(next);
            }
        }
    }

    emitted.sort();
    emitted.dedup();
    emitted.retain(|set| !set.is_empty());
    Ok(emitted)
}

/// §4.3.1: given the current per-process end events, picks which one(s)
/// conclude this concurrency region.
fn select_end_events(
    graph: &Graph,
    per_process_ends: &BTreeMap<ProcessId, VertexId>,
) -> CioResult<Vec<VertexId>> {
    let mut distinct: Vec<VertexId> = per_process_ends.values().copied().collect();
    distinct.sort();
    distinct.dedup();

    if distinct.is_empty() {
        return Err(CioError::NoValidEndEvent {
            reason: "no component end events to select from",
        });
    }
    if distinct.len() == 1 {
        return Ok(vec![distinct[0]]);
    }

    let locals: Vec<VertexId> = distinct
        .into_iter()
        .filter(|&v| graph.sync_scope(v) == SyncScope::Local)
        .collect();
    if locals.len() == 1 {
        return Ok(vec![locals[0]]);
    }

    let mut dependent: BTreeSet<VertexId> = BTreeSet::new();
    let mut independent: BTreeSet<VertexId> = BTreeSet::new();
    for i in 0..locals.len() {
        for j in (i + 1)..locals.len() {
            let a = locals[i];
            let b = locals[j];
            let group_a = ProcessGroup::of(graph, a);
            let group_b = ProcessGroup::of(graph, b);
            if group_a.intersection(&group_b).is_empty() {
                independent.insert(a);
                independent.insert(b);
            } else {
                dependent.insert(a);
                dependent.insert(b);
            }
        }
    }

    let satisfies_update_predicate = |v: VertexId| {
        ProcessGroup::of(graph, v)
            .iter()
            .all(|p| per_process_ends.get(&p) == Some(&v))
    };

    if !dependent.is_empty() {
        return dependent
            .into_iter()
            .find(|&v| satisfies_update_predicate(v))
            .map(|v| vec![v])
            .ok_or(CioError::NoValidEndEvent {
                reason: "no dependent end-event satisfies the update predicate",
            });
    }
    if !independent.is_empty() {
        let chosen: Vec<VertexId> = independent
            .into_iter()
            .filter(|&v| satisfies_update_predicate(v))
            .collect();
        if chosen.is_empty() {
            return Err(CioError::NoValidEndEvent {
                reason: "no independent end-event satisfies the update predicate",
            });
        }
        return Ok(chosen);
    }
    Err(CioError::NoValidEndEvent {
        reason: "no end-event candidates remain after removing global-scope syncs",
    })
}
