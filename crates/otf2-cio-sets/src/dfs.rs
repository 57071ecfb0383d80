use std::collections::BTreeMap;

use otf2_cio_types::{CioError, CioResult, Graph, SyncOpData, VertexId};

/// Explicit-DFS colour, replacing the Boost visitor's internal colour map
/// (design notes: "Visitor pattern → explicit DFS").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Colour {
    White,
    Gray,
    Black,
}

/// The two hooks an explicit DFS exposes to its caller, standing in for
/// Boost's `discover_vertex`/`examine_edge` visitor methods. Both take the
/// graph by shared reference; callers mutate their own state through
/// `&mut self`.
pub trait DfsHandler {
    fn on_discover(&mut self, graph: &Graph, v: VertexId) -> CioResult<()>;
    fn on_examine(&mut self, graph: &Graph, u: VertexId, v: VertexId) -> CioResult<()>;
    /// Called once a vertex's entire adjacency has been examined (i.e. on
    /// backtracking past it).
    fn on_finish(&mut self, graph: &Graph, v: VertexId) -> CioResult<()>;
}

/// Depth-first traversal of `graph` starting at `start`, driving `handler`.
/// Iterative (an explicit stack of `(vertex, next out-edge index)` frames)
/// rather than recursive, so traversal depth isn't bounded by the call
/// stack.
pub fn dfs(graph: &Graph, start: VertexId, handler: &mut dyn DfsHandler) -> CioResult<()> {
    let mut colour: BTreeMap<VertexId, Colour> = BTreeMap::new();
    let mut stack: Vec<(VertexId, usize)> = Vec::new();

    colour.insert(start, Colour::Gray);
    handler.on_discover(graph, start)?;
    stack.push((start, 0));

    while let Some(&(u, idx)) = stack.last() {
        let out_edges = graph.out_edges(u);
        if idx < out_edges.len() {
            let v = out_edges[idx];
            stack.last_mut().unwrap().1 += 1;
            handler.on_examine(graph, u, v)?;
            let entry = colour.entry(v).or_insert(Colour::White);
            if *entry == Colour::White {
                *entry = Colour::Gray;
                handler.on_discover(graph, v)?;
                stack.push((v, 0));
            }
        } else {
            colour.insert(u, Colour::Black);
            handler.on_finish(graph, u)?;
            stack.pop();
        }
    }
    Ok(())
}

/// The causal origin of `v`'s synchronization class (glossary:
/// "Root-of-sync"). See §4.2 of the design for the derivation rules.
pub fn root_of_sync(graph: &Graph, v: VertexId) -> CioResult<VertexId> {
    if graph.in_degree(v) == 1 {
        return Ok(v);
    }
    let sync = graph
        .vertex(v)
        .payload
        .as_sync_event()
        .ok_or(CioError::RootOfSyncNotFound { vertex: v })?;
    match &sync.op_data {
        SyncOpData::P2p { remote, .. } => graph
            .in_edges(v)
            .iter()
            .copied()
            .find(|&u| {
                graph
                    .vertex(u)
                    .payload
                    .as_sync_event()
                    .is_some_and(|s| s.process == *remote)
            })
            .ok_or(CioError::RootOfSyncNotFound { vertex: v }),
        SyncOpData::Collective { root_rank, members } => {
            if *root_rank == Some(sync.process) {
                return Ok(v);
            }
            let threshold = members.len().saturating_sub(1);
            graph
                .in_edges(v)
                .iter()
                .copied()
                .find(|&u| graph.out_degree(u) >= threshold && graph.in_degree(u) == 1)
                .ok_or(CioError::RootOfSyncNotFound { vertex: v })
        }
    }
}
