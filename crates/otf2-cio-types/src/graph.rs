use std::collections::BTreeMap;
use std::collections::BTreeSet;

use compact_str::CompactString;
use facet::Facet;

use crate::{
    ProcessId, SyncCommKind, SyncEventData, SyncOpData, SyntheticData, SyntheticKind, Timestamp,
    Vertex, VertexId, VertexPayload,
};

/// Clock properties lifted from the trace's `clock_properties` definition.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClockProperties {
    pub ticks_per_second: u64,
    pub start: Timestamp,
    pub length: u64,
}

/// Graph-wide aggregates, populated by the builder's post-pass.
#[derive(Facet, Debug, Clone, PartialEq, Eq, Default)]
pub struct GraphProperties {
    pub total_wall_time: u64,
    pub total_file_io_time: u64,
    pub total_file_io_metadata_time: u64,
    pub first_event_timestamp: Option<Timestamp>,
    pub last_event_timestamp: Option<Timestamp>,
    pub clock: ClockProperties,
    pub file_to_filesystem: BTreeMap<CompactString, CompactString>,
    pub num_locations: usize,
}

/// An identifier for an installed edge, in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeId(u32);

/// The directed I/O graph: vertices with typed payloads, program-order and
/// synchronization edges between them, and graph-wide properties.
///
/// Vertex identity is the insertion-order index, so indexing is O(1) and
/// deterministic without needing a hash map.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    vertices: Vec<Vertex>,
    edge_list: Vec<(VertexId, VertexId)>,
    out_adj: BTreeMap<VertexId, Vec<VertexId>>,
    in_adj: BTreeMap<VertexId, Vec<VertexId>>,
    root: Option<VertexId>,
    terminal: Option<VertexId>,
    processes: BTreeSet<ProcessId>,
    properties: GraphProperties,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a vertex and returns its (monotonically increasing) id.
    pub fn add_vertex(&mut self, payload: VertexPayload) -> VertexId {
        let id = VertexId::from_index(self.vertices.len() as u32);
        let is_root = payload.is_root();
        let is_terminal = payload.is_terminal();
        self.vertices.push(Vertex {
            id,
            payload,
            duration: Default::default(),
        });
        if is_root {
            debug_assert!(self.root.is_none(), "graph may have only one Root vertex");
            self.root = Some(id);
        }
        if is_terminal {
            debug_assert!(
                self.terminal.is_none(),
                "graph may have only one End vertex"
            );
            self.terminal = Some(id);
        }
        id
    }

    /// Convenience constructor for the Root sentinel.
    pub fn add_root(&mut self, timestamp: Timestamp) -> VertexId {
        self.add_vertex(VertexPayload::Synthetic(SyntheticData {
            kind: SyntheticKind::Root,
            timestamp,
        }))
    }

    /// Convenience constructor for the End (terminal) sentinel.
    pub fn add_terminal(&mut self, timestamp: Timestamp) -> VertexId {
        self.add_vertex(VertexPayload::Synthetic(SyntheticData {
            kind: SyntheticKind::End,
            timestamp,
        }))
    }

    /// Adds a directed edge `u -> v`. Idempotent per `(u, v)`: re-adding an
    /// existing edge returns its original id with `added = false`.
    pub fn add_edge(&mut self, u: VertexId, v: VertexId) -> (EdgeId, bool) {
        if let Some(existing) = self
            .edge_list
            .iter()
            .position(|&(eu, ev)| eu == u && ev == v)
        {
            return (EdgeId(existing as u32), false);
        }
        let id = EdgeId(self.edge_list.len() as u32);
        self.edge_list.push((u, v));
        self.out_adj.entry(u).or_default().push(v);
        self.in_adj.entry(v).or_default().push(u);
        (id, true)
    }

    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id.index() as usize]
    }

    pub fn vertex_mut(&mut self, id: VertexId) -> &mut Vertex {
        &mut self.vertices[id.index() as usize]
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.iter()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edges(&self) -> impl Iterator<Item = (VertexId, VertexId)> + '_ {
        self.edge_list.iter().copied()
    }

    pub fn out_edges(&self, v: VertexId) -> &[VertexId] {
        self.out_adj.get(&v).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn in_edges(&self, v: VertexId) -> &[VertexId] {
        self.in_adj.get(&v).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn out_degree(&self, v: VertexId) -> usize {
        self.out_edges(v).len()
    }

    pub fn in_degree(&self, v: VertexId) -> usize {
        self.in_edges(v).len()
    }

    pub fn root(&self) -> VertexId {
        self.root.expect("graph has no Root vertex yet")
    }

    pub fn terminal(&self) -> VertexId {
        self.terminal.expect("graph has no End vertex yet")
    }

    pub fn set_processes(&mut self, processes: BTreeSet<ProcessId>) {
        self.processes = processes;
    }

    pub fn processes(&self) -> &BTreeSet<ProcessId> {
        &self.processes
    }

    pub fn properties(&self) -> &GraphProperties {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut GraphProperties {
        &mut self.properties
    }
}

/// The set of processes participating in a synchronization vertex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessGroup(BTreeSet<ProcessId>);

impl ProcessGroup {
    pub fn new(members: BTreeSet<ProcessId>) -> Self {
        Self(members)
    }

    /// Derives the process group of a vertex per the rule in the data
    /// model: a collective's members, a p2p pair, or (for the synthetic
    /// sentinels) every process in the graph.
    pub fn of(graph: &Graph, id: VertexId) -> Self {
        let vertex = graph.vertex(id);
        match &vertex.payload {
            VertexPayload::SyncEvent(SyncEventData { process, op_data, .. }) => match op_data {
                SyncOpData::Collective { members, .. } => Self(members.clone()),
                SyncOpData::P2p { remote, .. } => {
                    Self(BTreeSet::from([*process, *remote]))
                }
            },
            VertexPayload::Synthetic(_) => Self(graph.processes().clone()),
            VertexPayload::IoEvent(e) => Self(BTreeSet::from([e.process])),
        }
    }

    pub fn contains(&self, p: ProcessId) -> bool {
        self.0.contains(&p)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.0.iter().copied()
    }

    pub fn intersection(&self, other: &ProcessGroup) -> ProcessGroup {
        Self(self.0.intersection(&other.0).copied().collect())
    }

    pub fn as_set(&self) -> &BTreeSet<ProcessId> {
        &self.0
    }
}

/// Whether a synchronization's process group spans every process in the
/// trace (`Global`) or only a subset (`Local`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncScope {
    Global,
    Local,
}

impl Graph {
    /// `scope(v)`: Global if `v`'s process group covers every process in
    /// the trace, Local otherwise. The synthetic sentinels are always
    /// Global.
    pub fn sync_scope(&self, id: VertexId) -> SyncScope {
        let vertex = self.vertex(id);
        if vertex.payload.is_root() || vertex.payload.is_terminal() {
            return SyncScope::Global;
        }
        let group = ProcessGroup::of(self, id);
        if group.len() >= self.processes.len() && !self.processes.is_empty() {
            SyncScope::Global
        } else {
            SyncScope::Local
        }
    }

    /// The comm-kind of a sync vertex, or `None` for non-sync vertices.
    pub fn comm_kind(&self, id: VertexId) -> Option<SyncCommKind> {
        self.vertex(id)
            .payload
            .as_sync_event()
            .map(|s| s.op_data.comm_kind())
    }
}
