use std::collections::BTreeSet;

use compact_str::CompactString;
use facet::Facet;
use otf2_cio_types::{IoOperationMode, ProcessId, SeekWhence, Timestamp};

use crate::defs::{CommId, IoFileId, IoHandleId, IoParadigmId, RegionId, RegionRole};

/// One callback from the trace reader: a definition record or an event,
/// in the shape an OTF2 reader would deliver them (spec §6). Definitions
/// always precede the events that reference them. Derives `Facet` so a
/// line-delimited JSON trace reader can decode it directly.
#[derive(Facet, Debug, Clone)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum TraceEvent {
    DefLocation {
        process: ProcessId,
    },
    DefRegion {
        region: RegionId,
        name: CompactString,
        role: RegionRole,
    },
    DefIoParadigm {
        paradigm: IoParadigmId,
        name: CompactString,
    },
    DefIoFile {
        file: IoFileId,
        name: CompactString,
    },
    DefIoHandle {
        handle: IoHandleId,
        file: IoFileId,
        paradigm: IoParadigmId,
        parent: Option<IoHandleId>,
    },
    DefIoFileProperty {
        file: IoFileId,
        name: CompactString,
        value: CompactString,
    },
    DefClockProperties {
        ticks_per_second: u64,
        start: u64,
        length: u64,
    },

    Enter {
        process: ProcessId,
        region: RegionId,
        timestamp: Timestamp,
    },
    Leave {
        process: ProcessId,
        region: RegionId,
        timestamp: Timestamp,
    },

    IoOperationBegin {
        process: ProcessId,
        handle: IoHandleId,
        mode: IoOperationMode,
        request_size: u64,
        flags: u32,
        timestamp: Timestamp,
    },
    IoOperationComplete {
        process: ProcessId,
        handle: IoHandleId,
        response_size: u64,
        timestamp: Timestamp,
    },
    IoCreateHandle {
        process: ProcessId,
        handle: IoHandleId,
        status_flags: u32,
        creation_flags: u32,
        timestamp: Timestamp,
    },
    IoDestroyHandle {
        process: ProcessId,
        handle: IoHandleId,
        timestamp: Timestamp,
    },
    IoDeleteFile {
        process: ProcessId,
        file: IoFileId,
        timestamp: Timestamp,
    },
    IoDuplicateHandle {
        process: ProcessId,
        old_handle: IoHandleId,
        new_handle: IoHandleId,
        timestamp: Timestamp,
    },
    IoSeek {
        process: ProcessId,
        handle: IoHandleId,
        offset_request: i64,
        whence: SeekWhence,
        offset_result: u64,
        timestamp: Timestamp,
    },

    MpiCollectiveBegin {
        process: ProcessId,
        timestamp: Timestamp,
    },
    MpiCollectiveEnd {
        process: ProcessId,
        comm: CommId,
        root_rank: Option<ProcessId>,
        self_group: BTreeSet<ProcessId>,
        comm_group: BTreeSet<ProcessId>,
        timestamp: Timestamp,
    },
    MpiSend {
        process: ProcessId,
        remote: ProcessId,
        tag: u32,
        length: u64,
        timestamp: Timestamp,
    },
    MpiIsend {
        process: ProcessId,
        remote: ProcessId,
        tag: u32,
        length: u64,
        request_id: u64,
        timestamp: Timestamp,
    },
    MpiReceive {
        process: ProcessId,
        remote: ProcessId,
        tag: u32,
        length: u64,
        timestamp: Timestamp,
    },
    MpiIreceive {
        process: ProcessId,
        remote: ProcessId,
        tag: u32,
        length: u64,
        request_id: u64,
        timestamp: Timestamp,
    },

    /// `io_test`/`io_try_lock`/`io_acquire_lock`/`io_release_lock` and
    /// similar events the data model does not track (spec §4.1: "other
    /// io_* test/lock/issued/cancelled | no vertex").
    Unsupported {
        kind: CompactString,
    },
}

/// The trace-reading collaborator. `otf2-cio-cli` supplies a concrete
/// implementation; the builder only ever sees this trait.
pub trait EventSource {
    /// Returns the next callback, or `Ok(None)` once the trace is
    /// exhausted (the builder then runs its post-pass).
    fn next_event(&mut self) -> Result<Option<TraceEvent>, otf2_cio_types::CioError>;
}
