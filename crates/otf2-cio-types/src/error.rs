use std::fmt;

use compact_str::CompactString;

use crate::{ProcessId, Timestamp, VertexId};

/// Fatal conditions raised by the graph builder or the set engines.
///
/// The core never attempts recovery (spec: "Propagation policy: the core
/// propagates fatal conditions to the top of the trace pass"); every
/// variant carries enough context (process, vertex, timestamp) for a
/// caller to print a diagnostic naming them, in the style of
/// `moire_trace_types::InvariantError`/`moire_trace_capture::CaptureError` —
/// a hand-rolled enum with a manual `Display`, no `thiserror`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CioError {
    /// An `io_operation_begin` never saw a matching `io_operation_complete`.
    UnmatchedIoOperationBegin {
        process: ProcessId,
        timestamp: Timestamp,
    },
    /// A collective's root process found no matching pending collective on
    /// one of its members.
    UnmatchedCollectivePartner {
        process: ProcessId,
        member: ProcessId,
        vertex: VertexId,
    },
    /// A p2p sync found no matching pending p2p sync on its remote.
    UnmatchedP2pPartner {
        process: ProcessId,
        remote: ProcessId,
        vertex: VertexId,
    },
    /// An I/O event was discovered on a process with no open set — the
    /// process must always have a set open by the time any I/O can occur.
    IoEventWithoutOpenSet {
        process: ProcessId,
        vertex: VertexId,
    },
    /// The merge engine's end-event selection produced no valid pivot.
    NoValidEndEvent { reason: &'static str },
    /// `root_of_sync` could not resolve a root for a sync vertex.
    RootOfSyncNotFound { vertex: VertexId },
    /// An unsupported event kind was observed with
    /// `tolerate_unsupported_events` disabled.
    UnsupportedEventKind { kind: CompactString },
    /// The trace reader could not decode a record (truncated file, bad
    /// encoding, schema mismatch).
    MalformedTraceInput { detail: CompactString },
}

impl fmt::Display for CioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CioError::UnmatchedIoOperationBegin { process, timestamp } => write!(
                f,
                "process {process}: io_operation_begin at {timestamp} has no matching io_operation_complete"
            ),
            CioError::UnmatchedCollectivePartner {
                process,
                member,
                vertex,
            } => write!(
                f,
                "process {process}: collective at {vertex} has no matching pending collective on member {member}"
            ),
            CioError::UnmatchedP2pPartner {
                process,
                remote,
                vertex,
            } => write!(
                f,
                "process {process}: p2p sync at {vertex} has no matching pending sync on remote {remote}"
            ),
            CioError::IoEventWithoutOpenSet { process, vertex } => write!(
                f,
                "process {process}: I/O event {vertex} observed with no open CIO-Set (invariant violation)"
            ),
            CioError::NoValidEndEvent { reason } => {
                write!(f, "set merge found no valid end-event: {reason}")
            }
            CioError::RootOfSyncNotFound { vertex } => {
                write!(f, "could not resolve root-of-sync for vertex {vertex}")
            }
            CioError::UnsupportedEventKind { kind } => {
                write!(f, "unsupported event kind: {kind}")
            }
            CioError::MalformedTraceInput { detail } => {
                write!(f, "malformed trace input: {detail}")
            }
        }
    }
}

impl std::error::Error for CioError {}

pub type CioResult<T> = Result<T, CioError>;
