use std::collections::{BTreeMap, BTreeSet};

use compact_str::CompactString;
use otf2_cio_types::{
    CioError, CioResult, ClockProperties, DurationSpan, Graph, IoEventData, IoKind, IoOption,
    ProcessId, SyncEventData, SyncOpData, Timestamp, VertexId, VertexPayload,
};

use crate::config::BuilderConfig;
use crate::defs::{CallFrame, DefinitionTable, LocationState, PendingCollective, PendingIo, RegionRole};
use crate::event::{EventSource, TraceEvent};
use crate::log::TraceLog;

/// Drives an [`EventSource`] to completion and returns the resulting
/// [`Graph`] (spec §4.1: the Graph Builder).
pub fn build(
    source: &mut dyn EventSource,
    config: BuilderConfig,
    log: &dyn TraceLog,
) -> CioResult<Graph> {
    let mut builder = Builder::new(config);
    while let Some(event) = source.next_event()? {
        builder.handle(event, log)?;
    }
    builder.finish()
}

struct Builder {
    graph: Graph,
    defs: DefinitionTable,
    locations: BTreeMap<ProcessId, LocationState>,
    config: BuilderConfig,
    clock: Option<ClockProperties>,
    first_event_timestamp: Option<Timestamp>,
    last_event_timestamp: Option<Timestamp>,
    total_file_io_time: u64,
    total_file_io_metadata_time: u64,
}

impl Builder {
    fn new(config: BuilderConfig) -> Self {
        let mut graph = Graph::new();
        graph.add_root(Timestamp::ZERO);
        Self {
            graph,
            defs: DefinitionTable::default(),
            locations: BTreeMap::new(),
            config,
            clock: None,
            first_event_timestamp: None,
            last_event_timestamp: None,
            total_file_io_time: 0,
            total_file_io_metadata_time: 0,
        }
    }

    /// Records a global timestamp sighting (for `first/last_event_timestamp`)
    /// and, when a process is known, that process's first-seen timestamp
    /// (used by the collective root-rank fallback, §4.3 of SPEC_FULL.md).
    fn note_global_timestamp(&mut self, t: Timestamp) {
        self.first_event_timestamp = Some(match self.first_event_timestamp {
            Some(existing) => existing.min(t),
            None => t,
        });
        self.last_event_timestamp = Some(match self.last_event_timestamp {
            Some(existing) => existing.max(t),
            None => t,
        });
    }

    fn touch(&mut self, process: ProcessId, t: Timestamp) {
        self.note_global_timestamp(t);
        self.locations.entry(process).or_default().note_timestamp(t);
    }

    fn current_region_name(&self, process: ProcessId) -> CompactString {
        self.locations
            .get(&process)
            .and_then(|loc| loc.region_stack.last())
            .map(|region| self.defs.region_name(*region))
            .unwrap_or_else(|| CompactString::from(""))
    }

    /// Appends a new vertex at the end of `process`'s program order,
    /// wiring it from the location's edge-point (or Root, if this is the
    /// first event on that location) and decorating the innermost open
    /// call frame (spec §4.1: "Appending a vertex").
    fn append_vertex(&mut self, process: ProcessId, payload: VertexPayload) -> VertexId {
        let vertex_id = self.graph.add_vertex(payload);
        let root = self.graph.root();
        let from = self
            .locations
            .entry(process)
            .or_default()
            .edge_point
            .unwrap_or(root);
        self.graph.add_edge(from, vertex_id);
        let loc = self.locations.entry(process).or_default();
        loc.edge_point = Some(vertex_id);
        loc.attach_to_innermost_frame(vertex_id);
        vertex_id
    }

    fn handle(&mut self, event: TraceEvent, log: &dyn TraceLog) -> CioResult<()> {
        match event {
            TraceEvent::DefLocation { process } => {
                self.locations.entry(process).or_default();
            }
            TraceEvent::DefRegion { region, name, role } => {
                self.defs
                    .regions
                    .insert(region, crate::defs::RegionDef { name, role });
            }
            TraceEvent::DefIoParadigm { paradigm, name } => {
                self.defs.io_paradigms.insert(paradigm, name);
            }
            TraceEvent::DefIoFile { file, name } => {
                self.defs
                    .io_files
                    .insert(file, crate::defs::IoFileDef { name });
            }
            TraceEvent::DefIoHandle {
                handle,
                file,
                paradigm,
                parent,
            } => {
                self.defs.io_handles.insert(
                    handle,
                    crate::defs::IoHandleDef {
                        file,
                        paradigm,
                        parent,
                    },
                );
            }
            TraceEvent::DefIoFileProperty { file, name, value } => {
                if name == "File system" && value != "proc" && value != "sysfs" {
                    self.defs.file_systems.insert(file, value);
                }
            }
            TraceEvent::DefClockProperties {
                ticks_per_second,
                start,
                length,
            } => {
                self.clock = Some(ClockProperties {
                    ticks_per_second,
                    start: Timestamp::new(start),
                    length,
                });
            }

            TraceEvent::Enter {
                process,
                region,
                timestamp,
            } => {
                self.touch(process, timestamp);
                let loc = self.locations.entry(process).or_default();
                loc.region_stack.push(region);
                loc.call_stack.push(CallFrame {
                    region,
                    enter: timestamp,
                    vertex: None,
                });
            }
            TraceEvent::Leave {
                process, timestamp, ..
            } => {
                self.touch(process, timestamp);
                let loc = self.locations.entry(process).or_default();
                loc.region_stack.pop();
                if let Some(frame) = loc.call_stack.pop() {
                    let role = self.defs.region_role(frame.region);
                    let duration = timestamp.saturating_sub(frame.enter);
                    match role {
                        RegionRole::FileIo => self.total_file_io_time += duration,
                        RegionRole::FileIoMetadata => self.total_file_io_metadata_time += duration,
                        RegionRole::Other => {}
                    }
                    if let Some(vertex_id) = frame.vertex {
                        self.graph.vertex_mut(vertex_id).duration = DurationSpan {
                            enter: Some(frame.enter),
                            leave: Some(timestamp),
                        };
                    }
                }
            }

            TraceEvent::IoOperationBegin {
                process,
                handle,
                mode,
                request_size,
                flags,
                timestamp,
            } => {
                self.touch(process, timestamp);
                self.locations
                    .entry(process)
                    .or_default()
                    .pending_io
                    .push_back(PendingIo {
                        handle,
                        mode,
                        request_size,
                        flags,
                        timestamp,
                    });
            }
            TraceEvent::IoOperationComplete {
                process,
                response_size,
                timestamp,
                ..
            } => {
                self.touch(process, timestamp);
                let pending = self
                    .locations
                    .entry(process)
                    .or_default()
                    .pending_io
                    .pop_front()
                    .ok_or(CioError::UnmatchedIoOperationBegin { process, timestamp })?;
                let kind = match pending.mode {
                    otf2_cio_types::IoOperationMode::Read => IoKind::Read,
                    otf2_cio_types::IoOperationMode::Write => IoKind::Write,
                    otf2_cio_types::IoOperationMode::Flush => IoKind::Flush,
                };
                let (filename, paradigm) = self.handle_names(pending.handle);
                let region_name = self.current_region_name(process);
                let vertex = VertexPayload::IoEvent(IoEventData {
                    process,
                    filename,
                    region_name,
                    paradigm,
                    request_size: pending.request_size,
                    response_size,
                    offset: 0,
                    option: IoOption::Operation {
                        mode: pending.mode,
                        flags: pending.flags,
                    },
                    kind,
                    timestamp,
                });
                self.append_vertex(process, vertex);
            }
            TraceEvent::IoCreateHandle {
                process,
                handle,
                status_flags,
                creation_flags,
                timestamp,
            } => {
                self.touch(process, timestamp);
                // A handle with a parent is derived from it; the parent
                // already produced a vertex, so skip the duplicate.
                if !self.handle_has_parent(handle) {
                    let (filename, paradigm) = self.handle_names(handle);
                    let region_name = self.current_region_name(process);
                    let vertex = VertexPayload::IoEvent(IoEventData {
                        process,
                        filename,
                        region_name,
                        paradigm,
                        request_size: 0,
                        response_size: 0,
                        offset: 0,
                        option: IoOption::Creation {
                            status_flags,
                            creation_flags,
                        },
                        kind: IoKind::Create,
                        timestamp,
                    });
                    self.append_vertex(process, vertex);
                }
            }
            TraceEvent::IoDestroyHandle {
                process,
                handle,
                timestamp,
            } => {
                self.touch(process, timestamp);
                if !self.handle_has_parent(handle) {
                    let (filename, paradigm) = self.handle_names(handle);
                    let region_name = self.current_region_name(process);
                    let vertex = VertexPayload::IoEvent(IoEventData {
                        process,
                        filename,
                        region_name,
                        paradigm,
                        request_size: 0,
                        response_size: 0,
                        offset: 0,
                        option: IoOption::None,
                        kind: IoKind::DeleteOrClose,
                        timestamp,
                    });
                    self.append_vertex(process, vertex);
                }
            }
            TraceEvent::IoDeleteFile {
                process,
                file,
                timestamp,
            } => {
                self.touch(process, timestamp);
                let region_name = self.current_region_name(process);
                let vertex = VertexPayload::IoEvent(IoEventData {
                    process,
                    filename: self.defs.file_name(file),
                    region_name,
                    paradigm: CompactString::from(""),
                    request_size: 0,
                    response_size: 0,
                    offset: 0,
                    option: IoOption::None,
                    kind: IoKind::DeleteOrClose,
                    timestamp,
                });
                self.append_vertex(process, vertex);
            }
            TraceEvent::IoDuplicateHandle {
                process,
                old_handle,
                timestamp,
                ..
            } => {
                self.touch(process, timestamp);
                let (filename, paradigm) = self.handle_names(old_handle);
                let region_name = self.current_region_name(process);
                let vertex = VertexPayload::IoEvent(IoEventData {
                    process,
                    filename,
                    region_name,
                    paradigm,
                    request_size: 0,
                    response_size: 0,
                    offset: 0,
                    option: IoOption::None,
                    kind: IoKind::Dup,
                    timestamp,
                });
                self.append_vertex(process, vertex);
            }
            TraceEvent::IoSeek {
                process,
                handle,
                offset_request,
                whence,
                offset_result,
                timestamp,
            } => {
                self.touch(process, timestamp);
                let (filename, paradigm) = self.handle_names(handle);
                let region_name = self.current_region_name(process);
                let vertex = VertexPayload::IoEvent(IoEventData {
                    process,
                    filename,
                    region_name,
                    paradigm,
                    request_size: offset_request as u64,
                    response_size: offset_result,
                    offset: offset_result,
                    option: IoOption::Seek { whence },
                    kind: IoKind::Seek,
                    timestamp,
                });
                self.append_vertex(process, vertex);
            }

            TraceEvent::MpiCollectiveBegin { process, timestamp } => {
                self.touch(process, timestamp);
                self.locations
                    .entry(process)
                    .or_default()
                    .pending_collective
                    .push_back(PendingCollective { timestamp });
            }
            TraceEvent::MpiCollectiveEnd {
                process,
                root_rank,
                self_group,
                comm_group,
                timestamp,
                ..
            } => {
                self.touch(process, timestamp);
                self.locations
                    .entry(process)
                    .or_default()
                    .pending_collective
                    .pop_front();
                if self_group.is_empty() {
                    return Ok(());
                }
                let members = if !self_group.is_empty() {
                    self_group
                } else {
                    comm_group
                };
                let region_name = self.current_region_name(process);
                let vertex = VertexPayload::SyncEvent(SyncEventData {
                    process,
                    region_name,
                    op_data: SyncOpData::Collective { root_rank, members },
                    timestamp,
                    root_event: None,
                });
                let vertex_id = self.append_vertex(process, vertex);
                self.locations
                    .entry(process)
                    .or_default()
                    .sync_queue
                    .push(vertex_id);
            }
            TraceEvent::MpiSend {
                process,
                remote,
                tag,
                length,
                timestamp,
            } => self.push_p2p(process, remote, tag, length, None, timestamp),
            TraceEvent::MpiIsend {
                process,
                remote,
                tag,
                length,
                request_id,
                timestamp,
            } => self.push_p2p(process, remote, tag, length, Some(request_id), timestamp),
            TraceEvent::MpiReceive {
                process,
                remote,
                tag,
                length,
                timestamp,
            } => self.push_p2p(process, remote, tag, length, None, timestamp),
            TraceEvent::MpiIreceive {
                process,
                remote,
                tag,
                length,
                request_id,
                timestamp,
            } => self.push_p2p(process, remote, tag, length, Some(request_id), timestamp),

            TraceEvent::Unsupported { kind } => {
                if self.config.tolerate_unsupported_events {
                    log.warn(&format!("skipping unsupported event kind: {kind}"));
                } else {
                    return Err(CioError::UnsupportedEventKind { kind });
                }
            }
        }
        Ok(())
    }

    fn push_p2p(
        &mut self,
        process: ProcessId,
        remote: ProcessId,
        tag: u32,
        length: u64,
        request_id: Option<u64>,
        timestamp: Timestamp,
    ) {
        self.touch(process, timestamp);
        let region_name = self.current_region_name(process);
        let vertex = VertexPayload::SyncEvent(SyncEventData {
            process,
            region_name,
            op_data: SyncOpData::P2p {
                remote,
                msg_tag: tag,
                msg_length: length,
                request_id,
            },
            timestamp,
            root_event: None,
        });
        let vertex_id = self.append_vertex(process, vertex);
        self.locations
            .entry(process)
            .or_default()
            .sync_queue
            .push(vertex_id);
    }

    fn handle_has_parent(&self, handle: crate::defs::IoHandleId) -> bool {
        self.defs
            .io_handles
            .get(&handle)
            .is_some_and(|def| def.parent.is_some())
    }

    fn handle_names(&self, handle: crate::defs::IoHandleId) -> (CompactString, CompactString) {
        match self.defs.io_handles.get(&handle) {
            Some(def) => (
                self.defs.file_name(def.file),
                self.defs.paradigm_name(def.paradigm),
            ),
            None => (
                CompactString::from("<unknown-file>"),
                CompactString::from("<unknown-paradigm>"),
            ),
        }
    }

    fn resolve_collective_root(
        &self,
        root_rank: Option<ProcessId>,
        members: &BTreeSet<ProcessId>,
    ) -> ProcessId {
        if let Some(root) = root_rank {
            return root;
        }
        members
            .iter()
            .copied()
            .min_by_key(|m| {
                self.locations
                    .get(m)
                    .and_then(|loc| loc.first_seen_timestamp)
                    .unwrap_or(Timestamp::ZERO)
            })
            .expect("collective vertices are only constructed with non-empty members")
    }

    /// Post-pass: append the Terminal sentinel, install cross-process
    /// synchronization edges by draining each location's sync queue, and
    /// populate graph-wide properties (spec §4.1 "Post-pass (events_done)").
    fn finish(mut self) -> CioResult<Graph> {
        let terminal_timestamp = self.last_event_timestamp.unwrap_or(Timestamp::ZERO);
        let terminal = self.graph.add_terminal(terminal_timestamp);
        let location_ids: Vec<ProcessId> = self.locations.keys().copied().collect();
        for p in &location_ids {
            if let Some(edge_point) = self.locations.get(p).and_then(|loc| loc.edge_point) {
                self.graph.add_edge(edge_point, terminal);
            }
        }

        for p in &location_ids {
            let queue_snapshot = self
                .locations
                .get(p)
                .map(|loc| loc.sync_queue.clone())
                .unwrap_or_default();
            for v in queue_snapshot {
                let sync = match self.graph.vertex(v).payload.as_sync_event() {
                    Some(sync) => sync.clone(),
                    None => continue,
                };
                match &sync.op_data {
                    SyncOpData::Collective { root_rank, members } => {
                        let root = self.resolve_collective_root(*root_rank, members);
                        if sync.process != root {
                            continue;
                        }
                        for m in members.iter().copied().filter(|m| *m != *p) {
                            let target = take_first_pending_collective(&mut self.locations, &self.graph, m)
                                .ok_or(CioError::UnmatchedCollectivePartner {
                                    process: *p,
                                    member: m,
                                    vertex: v,
                                })?;
                            self.graph.add_edge(v, target);
                            if let Some(target_sync) =
                                self.graph.vertex_mut(target).payload.as_sync_event_mut()
                            {
                                target_sync.root_event = Some(v);
                            }
                        }
                    }
                    SyncOpData::P2p { remote, .. } => {
                        let target = take_first_pending_p2p(&mut self.locations, &self.graph, *remote, *p)
                            .ok_or(CioError::UnmatchedP2pPartner {
                                process: *p,
                                remote: *remote,
                                vertex: v,
                            })?;
                        self.graph.add_edge(v, target);
                        if let Some(target_sync) =
                            self.graph.vertex_mut(target).payload.as_sync_event_mut()
                        {
                            target_sync.root_event = Some(v);
                        }
                    }
                }
            }
        }

        self.graph
            .set_processes(location_ids.iter().copied().collect());
        let file_to_filesystem = self
            .defs
            .file_systems
            .iter()
            .map(|(file, fs)| (self.defs.file_name(*file), fs.clone()))
            .collect();
        let first = self.first_event_timestamp;
        let last = self.last_event_timestamp;
        let clock = self.clock.unwrap_or_default();
        let total_file_io_time = self.total_file_io_time;
        let total_file_io_metadata_time = self.total_file_io_metadata_time;
        let num_locations = location_ids.len();
        let properties = self.graph.properties_mut();
        properties.total_wall_time = match (first, last) {
            (Some(first), Some(last)) => last.saturating_sub(first),
            _ => 0,
        };
        properties.total_file_io_time = total_file_io_time;
        properties.total_file_io_metadata_time = total_file_io_metadata_time;
        properties.first_event_timestamp = first;
        properties.last_event_timestamp = last;
        properties.clock = clock;
        properties.file_to_filesystem = file_to_filesystem;
        properties.num_locations = num_locations;

        Ok(self.graph)
    }
}

fn take_first_pending_collective(
    locations: &mut BTreeMap<ProcessId, LocationState>,
    graph: &Graph,
    member: ProcessId,
) -> Option<VertexId> {
    let queue = &mut locations.get_mut(&member)?.sync_queue;
    let idx = queue.iter().position(|&vid| {
        matches!(
            graph.vertex(vid).payload.as_sync_event().map(|s| &s.op_data),
            Some(SyncOpData::Collective { .. })
        )
    })?;
    Some(queue.remove(idx))
}

fn take_first_pending_p2p(
    locations: &mut BTreeMap<ProcessId, LocationState>,
    graph: &Graph,
    remote_location: ProcessId,
    expected_remote: ProcessId,
) -> Option<VertexId> {
    let queue = &mut locations.get_mut(&remote_location)?.sync_queue;
    let idx = queue.iter().position(|&vid| {
        matches!(
            graph.vertex(vid).payload.as_sync_event().map(|s| &s.op_data),
            Some(SyncOpData::P2p { remote, .. }) if *remote == expected_remote
        )
    })?;
    Some(queue.remove(idx))
}
