use std::collections::BTreeSet;

use compact_str::CompactString;
use facet::Facet;

use crate::{ProcessId, Timestamp, VertexId};

/// What an I/O event actually did to the file/handle.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum IoKind {
    Create,
    Dup,
    Seek,
    Read,
    Write,
    Flush,
    DeleteOrClose,
    None,
}

/// Which way an `io_seek` moved the offset from.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum SeekWhence {
    Set,
    Cur,
    End,
    Data,
    Hole,
}

/// `io_operation_begin`'s mode (what kind of operation this is).
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum IoOperationMode {
    Read,
    Write,
    Flush,
}

/// The event-kind-specific option payload carried by an I/O event.
///
/// A tagged union standing in for the three option kinds the source
/// distinguishes dynamically (`OperationOption`, `CreationOption`,
/// `SeekOption`).
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum IoOption {
    Operation { mode: IoOperationMode, flags: u32 },
    Creation { status_flags: u32, creation_flags: u32 },
    Seek { whence: SeekWhence },
    None,
}

/// An I/O operation vertex: a create, dup, seek, read, write, flush, or
/// delete/close observed on one process.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct IoEventData {
    pub process: ProcessId,
    pub filename: CompactString,
    pub region_name: CompactString,
    pub paradigm: CompactString,
    pub request_size: u64,
    pub response_size: u64,
    pub offset: u64,
    pub option: IoOption,
    pub kind: IoKind,
    pub timestamp: Timestamp,
}

/// Whether a synchronization is collective (all-to-all within a group) or
/// point-to-point (exactly two processes).
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum SyncCommKind {
    Collective,
    P2p,
}

/// The communication-specific payload of a synchronization vertex.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum SyncOpData {
    Collective {
        /// `None` when the trace left the collective's root rank undefined.
        /// See the builder's root-rank fallback for how this is resolved.
        root_rank: Option<ProcessId>,
        members: BTreeSet<ProcessId>,
    },
    P2p {
        remote: ProcessId,
        msg_tag: u32,
        msg_length: u64,
        request_id: Option<u64>,
    },
}

impl SyncOpData {
    pub fn comm_kind(&self) -> SyncCommKind {
        match self {
            SyncOpData::Collective { .. } => SyncCommKind::Collective,
            SyncOpData::P2p { .. } => SyncCommKind::P2p,
        }
    }
}

/// A synchronization vertex: a collective or point-to-point event that
/// establishes a happens-before relationship between processes.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct SyncEventData {
    pub process: ProcessId,
    pub region_name: CompactString,
    pub op_data: SyncOpData,
    pub timestamp: Timestamp,
    /// Back-reference to the vertex that is this sync's causal root, once
    /// the builder's post-pass has installed cross-process edges. A plain
    /// id, not an owning reference, so the graph stays acyclic in ownership
    /// even though the sync graph itself has cycles.
    pub root_event: Option<VertexId>,
}

/// Which sentinel a synthetic vertex represents.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum SyntheticKind {
    Root,
    End,
}

impl SyntheticKind {
    pub fn name(self) -> &'static str {
        match self {
            SyntheticKind::Root => "Root",
            SyntheticKind::End => "End",
        }
    }
}

#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct SyntheticData {
    pub kind: SyntheticKind,
    pub timestamp: Timestamp,
}

/// The three vertex payload shapes a CIO graph can hold.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum VertexPayload {
    IoEvent(IoEventData),
    SyncEvent(SyncEventData),
    Synthetic(SyntheticData),
}

impl VertexPayload {
    pub fn process(&self) -> Option<ProcessId> {
        match self {
            VertexPayload::IoEvent(e) => Some(e.process),
            VertexPayload::SyncEvent(e) => Some(e.process),
            VertexPayload::Synthetic(_) => None,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            VertexPayload::IoEvent(e) => e.timestamp,
            VertexPayload::SyncEvent(e) => e.timestamp,
            VertexPayload::Synthetic(e) => e.timestamp,
        }
    }

    pub fn as_io_event(&self) -> Option<&IoEventData> {
        match self {
            VertexPayload::IoEvent(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_sync_event(&self) -> Option<&SyncEventData> {
        match self {
            VertexPayload::SyncEvent(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_sync_event_mut(&mut self) -> Option<&mut SyncEventData> {
        match self {
            VertexPayload::SyncEvent(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_synthetic(&self) -> Option<&SyntheticData> {
        match self {
            VertexPayload::Synthetic(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_io_event(&self) -> bool {
        matches!(self, VertexPayload::IoEvent(_))
    }

    pub fn is_sync_event(&self) -> bool {
        matches!(self, VertexPayload::SyncEvent(_))
    }

    pub fn is_root(&self) -> bool {
        matches!(
            self,
            VertexPayload::Synthetic(SyntheticData {
                kind: SyntheticKind::Root,
                ..
            })
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VertexPayload::Synthetic(SyntheticData {
                kind: SyntheticKind::End,
                ..
            })
        )
    }
}

/// Enter/leave span for the region that produced a vertex, populated once
/// the enclosing region leaves.
#[derive(Facet, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DurationSpan {
    pub enter: Option<Timestamp>,
    pub leave: Option<Timestamp>,
}

impl DurationSpan {
    pub fn close(&mut self, leave: Timestamp) {
        self.leave = Some(leave);
    }

    /// The derived duration, if both endpoints are known.
    pub fn duration(&self) -> Option<u64> {
        match (self.enter, self.leave) {
            (Some(enter), Some(leave)) => Some(leave.saturating_sub(enter)),
            _ => None,
        }
    }
}

/// A graph node: a stable id, its typed payload, and the duration span of
/// the region that produced it.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct Vertex {
    pub id: VertexId,
    pub payload: VertexPayload,
    pub duration: DurationSpan,
}

impl Vertex {
    pub fn process(&self) -> Option<ProcessId> {
        self.payload.process()
    }

    pub fn timestamp(&self) -> Timestamp {
        self.payload.timestamp()
    }
}
