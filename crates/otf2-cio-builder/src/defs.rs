//! Definition-record identifiers and the small lookup tables the builder
//! needs to resolve events that reference them by id.
//!
//! These are builder-internal: once a vertex has been constructed its
//! filename/region-name/paradigm are baked in as owned strings, so nothing
//! downstream needs to know about `RegionId` et al.

use std::collections::BTreeMap;

use compact_str::CompactString;
use facet::Facet;
use otf2_cio_types::{Timestamp, VertexId};

#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionId(pub u32);

#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IoParadigmId(pub u32);

#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IoFileId(pub u32);

#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IoHandleId(pub u32);

#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommId(pub u32);

/// Whether a region's enter/leave span counts toward file-I/O time,
/// file-I/O metadata time, or neither, when accumulating graph totals.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum RegionRole {
    FileIo,
    FileIoMetadata,
    Other,
}

#[derive(Debug, Clone)]
pub struct RegionDef {
    pub name: CompactString,
    pub role: RegionRole,
}

#[derive(Debug, Clone)]
pub struct IoFileDef {
    pub name: CompactString,
}

#[derive(Debug, Clone)]
pub struct IoHandleDef {
    pub file: IoFileId,
    pub paradigm: IoParadigmId,
    pub parent: Option<IoHandleId>,
}

/// All definition records accumulated before event processing begins,
/// plus the ones that flow during the pass (handles can, in principle, be
/// defined ahead of time; this table is what per-event rules consult).
#[derive(Debug, Clone, Default)]
pub struct DefinitionTable {
    pub regions: BTreeMap<RegionId, RegionDef>,
    pub io_paradigms: BTreeMap<IoParadigmId, CompactString>,
    pub io_files: BTreeMap<IoFileId, IoFileDef>,
    pub io_handles: BTreeMap<IoHandleId, IoHandleDef>,
    /// io_file_property records named "File system", keyed by file.
    pub file_systems: BTreeMap<IoFileId, CompactString>,
}

impl DefinitionTable {
    pub fn region_name(&self, region: RegionId) -> CompactString {
        self.regions
            .get(&region)
            .map(|r| r.name.clone())
            .unwrap_or_else(|| CompactString::from("<unknown-region>"))
    }

    pub fn region_role(&self, region: RegionId) -> RegionRole {
        self.regions
            .get(&region)
            .map(|r| r.role)
            .unwrap_or(RegionRole::Other)
    }

    pub fn paradigm_name(&self, paradigm: IoParadigmId) -> CompactString {
        self.io_paradigms
            .get(&paradigm)
            .cloned()
            .unwrap_or_else(|| CompactString::from("<unknown-paradigm>"))
    }

    pub fn file_name(&self, file: IoFileId) -> CompactString {
        self.io_files
            .get(&file)
            .map(|f| f.name.clone())
            .unwrap_or_else(|| CompactString::from("<unknown-file>"))
    }
}

/// An `io_operation_begin` parked until its matching `io_operation_complete`.
#[derive(Debug, Clone)]
pub struct PendingIo {
    pub handle: IoHandleId,
    pub mode: otf2_cio_types::IoOperationMode,
    pub request_size: u64,
    pub flags: u32,
    pub timestamp: Timestamp,
}

/// A `mpi_collective_begin` parked until its matching `_end`.
#[derive(Debug, Clone, Copy)]
pub struct PendingCollective {
    pub timestamp: Timestamp,
}

/// The region a call-frame entered; decorated with the vertex produced
/// during its span, if any, once the matching `leave` arrives.
#[derive(Debug, Clone, Copy)]
pub struct CallFrame {
    pub region: RegionId,
    pub enter: Timestamp,
    pub vertex: Option<VertexId>,
}

/// Per-location bookkeeping the builder threads through the event pass.
#[derive(Debug, Clone, Default)]
pub struct LocationState {
    pub edge_point: Option<VertexId>,
    pub region_stack: Vec<RegionId>,
    pub call_stack: Vec<CallFrame>,
    pub pending_io: std::collections::VecDeque<PendingIo>,
    pub pending_collective: std::collections::VecDeque<PendingCollective>,
    /// Sync vertices in order of occurrence on this location, consumed by
    /// the post-pass when installing cross-process synchronization edges.
    pub sync_queue: Vec<VertexId>,
    pub first_seen_timestamp: Option<Timestamp>,
}

impl LocationState {
    pub fn note_timestamp(&mut self, t: Timestamp) {
        if self.first_seen_timestamp.is_none() {
            self.first_seen_timestamp = Some(t);
        }
    }

    /// Attaches `vertex` to the innermost call frame that hasn't yet
    /// claimed one, so its duration gets decorated on that region's leave.
    pub fn attach_to_innermost_frame(&mut self, vertex: VertexId) {
        if let Some(frame) = self.call_stack.last_mut() {
            if frame.vertex.is_none() {
                frame.vertex = Some(vertex);
            }
        }
    }
}
