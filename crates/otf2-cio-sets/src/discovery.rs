use std::collections::BTreeMap;

use otf2_cio_types::{CioError, CioResult, CioSet, Graph, ProcessId, VertexId};

use crate::dfs::{dfs, root_of_sync, DfsHandler};

/// Per-Process Set Discovery (§4.2): a depth-first visitor over the graph
/// that, per process, produces a chronological sequence of CIO-Set
/// fragments delimited by synchronization events.
pub fn discover_fragments(graph: &Graph) -> CioResult<BTreeMap<ProcessId, Vec<CioSet>>> {
    let mut visitor = SetDiscovery::default();
    dfs(graph, graph.root(), &mut visitor)?;
    visitor.sort_fragments(graph);
    Ok(visitor.fragments)
}

#[derive(Default)]
struct SetDiscovery {
    fragments: BTreeMap<ProcessId, Vec<CioSet>>,
}

impl SetDiscovery {
    fn open_new(&mut self, process: ProcessId, start: VertexId) {
        self.fragments
            .entry(process)
            .or_default()
            .push(CioSet::open(start));
    }

    fn has_open(&self, process: ProcessId) -> bool {
        self.fragments
            .get(&process)
            .and_then(|sets| sets.last())
            .is_some_and(CioSet::is_open)
    }

    fn close_last(&mut self, process: ProcessId, end: VertexId, origin: VertexId) {
        if let Some(set) = self
            .fragments
            .get_mut(&process)
            .and_then(|sets| sets.last_mut())
        {
            if set.is_open() {
                set.close(end, origin);
            }
        }
    }

    fn insert_member(&mut self, process: ProcessId, member: VertexId) -> CioResult<()> {
        match self
            .fragments
            .get_mut(&process)
            .and_then(|sets| sets.last_mut())
        {
            Some(set) if set.is_open() => {
                set.insert_member(member);
                Ok(())
            }
            _ => Err(CioError::IoEventWithoutOpenSet {
                process,
                vertex: member,
            }),
        }
    }

    /// §4.2 "Post-discovery sort": chronological order of each fragment's
    /// `origin` (falling back to `start_event` for the first fragment on a
    /// process, which has no origin). `sort_by_key` is stable, so ties
    /// keep their insertion order, matching the tie-break rule.
    fn sort_fragments(&mut self, graph: &Graph) {
        for sets in self.fragments.values_mut() {
            sets.sort_by_key(|set| {
                let pivot = set.origin.unwrap_or(set.start_event);
                graph.vertex(pivot).timestamp()
            });
        }
    }
}

impl DfsHandler for SetDiscovery {
    fn on_discover(&mut self, graph: &Graph, v: VertexId) -> CioResult<()> {
        let payload = &graph.vertex(v).payload;
        if payload.is_root() || payload.is_terminal() {
            return Ok(());
        }
        if let Some(io) = payload.as_io_event() {
            return self.insert_member(io.process, v);
        }
        if let Some(sync) = payload.as_sync_event() {
            let process = sync.process;
            if self.has_open(process) {
                let root = root_of_sync(graph, v)?;
                self.close_last(process, root, v);
            } else {
                let root = root_of_sync(graph, v)?;
                self.open_new(process, root);
            }
        }
        Ok(())
    }

    fn on_examine(&mut self, graph: &Graph, u: VertexId, v: VertexId) -> CioResult<()> {
        let u_payload = &graph.vertex(u).payload;
        let v_payload = &graph.vertex(v).payload;

        if v_payload.is_terminal() {
            if let Some(process) = u_payload.process() {
                self.close_last(process, v, v);
            }
            return Ok(());
        }

        if u_payload.is_root() {
            if let Some(process) = v_payload.process() {
                self.open_new(process, graph.root());
                if v_payload.is_sync_event() {
                    let root = root_of_sync(graph, v)?;
                    self.close_last(process, root, v);
                }
            }
            return Ok(());
        }

        if let (Some(up), Some(vp)) = (u_payload.process(), v_payload.process()) {
            if up == vp && v_payload.is_sync_event() && self.has_open(up) {
                let root = root_of_sync(graph, v)?;
                self.close_last(up, root, v);
            }
        }
        Ok(())
    }

    fn on_finish(&mut self, _graph: &Graph, _v: VertexId) -> CioResult<()> {
        Ok(())
    }
}
