//! Core data model for Concurrent I/O Set extraction: vertex and edge
//! types, the graph store, the `CioSet` entity, and the shared error type.
//!
//! This crate is pure data — no trace reading, no graph construction, no
//! set discovery. Those live in `otf2-cio-builder` and `otf2-cio-sets`.

mod error;
mod graph;
mod ids;
mod set;
mod vertex;

pub use error::{CioError, CioResult};
pub use graph::{ClockProperties, EdgeId, Graph, GraphProperties, ProcessGroup, SyncScope};
pub use ids::{ProcessId, Timestamp, VertexId};
pub use set::{CioSet, SetState};
pub use vertex::{
    DurationSpan, IoEventData, IoKind, IoOperationMode, IoOption, SeekWhence, SyncCommKind,
    SyncEventData, SyncOpData, SyntheticData, SyntheticKind, Vertex, VertexPayload,
};
