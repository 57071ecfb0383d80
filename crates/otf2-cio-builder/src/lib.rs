//! Trace-to-graph transformation: turns a callback stream from an
//! [`EventSource`] into an `otf2_cio_types::Graph` (§4.1 of the design).

mod builder;
mod config;
mod defs;
mod event;
mod log;

pub use builder::build;
pub use config::BuilderConfig;
pub use defs::{CommId, IoFileId, IoHandleId, IoParadigmId, RegionId, RegionRole};
pub use event::{EventSource, TraceEvent};
pub use log::{NullLog, TraceLog};

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, VecDeque};

    use compact_str::CompactString;
    use otf2_cio_types::{CioError, IoKind, IoOperationMode, ProcessId, Timestamp, VertexPayload};

    use super::*;

    /// A trace reader over a fixed, pre-built list of events — the
    /// simplest possible [`EventSource`], used throughout these tests the
    /// way `peeps_waitgraph`'s tests build fixture graphs directly.
    struct FixedTrace {
        events: VecDeque<TraceEvent>,
    }

    impl FixedTrace {
        fn new(events: Vec<TraceEvent>) -> Self {
            Self {
                events: events.into(),
            }
        }
    }

    impl EventSource for FixedTrace {
        fn next_event(&mut self) -> Result<Option<TraceEvent>, CioError> {
            Ok(self.events.pop_front())
        }
    }

    fn pid(n: u32) -> ProcessId {
        ProcessId::new(n)
    }

    fn ts(n: u64) -> Timestamp {
        Timestamp::new(n)
    }

    fn region_defs() -> Vec<TraceEvent> {
        vec![TraceEvent::DefRegion {
            region: RegionId(0),
            name: CompactString::from("main"),
            role: RegionRole::Other,
        }]
    }

    fn file_and_handle_defs(file: IoFileId, handle: IoHandleId) -> Vec<TraceEvent> {
        vec![
            TraceEvent::DefIoParadigm {
                paradigm: IoParadigmId(0),
                name: CompactString::from("posix"),
            },
            TraceEvent::DefIoFile {
                file,
                name: CompactString::from("/data/out.bin"),
            },
            TraceEvent::DefIoHandle {
                handle,
                file,
                paradigm: IoParadigmId(0),
                parent: None,
            },
        ]
    }

    #[test]
    fn single_write_produces_one_io_vertex_linked_from_root() {
        let mut events = region_defs();
        events.extend(file_and_handle_defs(IoFileId(0), IoHandleId(0)));
        events.push(TraceEvent::DefLocation { process: pid(0) });
        events.push(TraceEvent::IoOperationBegin {
            process: pid(0),
            handle: IoHandleId(0),
            mode: IoOperationMode::Write,
            request_size: 64,
            flags: 0,
            timestamp: ts(10),
        });
        events.push(TraceEvent::IoOperationComplete {
            process: pid(0),
            handle: IoHandleId(0),
            response_size: 64,
            timestamp: ts(11),
        });

        let mut source = FixedTrace::new(events);
        let graph = build(&mut source, BuilderConfig::default(), &NullLog).unwrap();

        assert_eq!(graph.vertex_count(), 3); // Root, IoEvent, Terminal
        let io_vertex = graph.vertex(otf2_cio_types::VertexId::from_index(1));
        let io = io_vertex.payload.as_io_event().unwrap();
        assert_eq!(io.kind, IoKind::Write);
        assert_eq!(io.request_size, 64);
        assert_eq!(io.response_size, 64);
        assert_eq!(io.filename, "/data/out.bin");

        assert_eq!(graph.in_edges(io_vertex.id).to_vec(), vec![graph.root()]);
    }

    #[test]
    fn unmatched_io_complete_is_fatal() {
        let mut events = region_defs();
        events.extend(file_and_handle_defs(IoFileId(0), IoHandleId(0)));
        events.push(TraceEvent::IoOperationComplete {
            process: pid(0),
            handle: IoHandleId(0),
            response_size: 8,
            timestamp: ts(5),
        });

        let mut source = FixedTrace::new(events);
        let err = build(&mut source, BuilderConfig::default(), &NullLog).unwrap_err();
        assert!(matches!(err, CioError::UnmatchedIoOperationBegin { .. }));
    }

    #[test]
    fn collective_draws_edge_from_root_rank_to_each_member() {
        let mut events = region_defs();
        events.push(TraceEvent::DefLocation { process: pid(0) });
        events.push(TraceEvent::DefLocation { process: pid(1) });
        events.push(TraceEvent::DefLocation { process: pid(2) });

        let members: BTreeSet<ProcessId> = [pid(0), pid(1), pid(2)].into_iter().collect();
        for p in [pid(1), pid(2), pid(0)] {
            // members see the begin/end in any order; root (0) processed last here
            events.push(TraceEvent::MpiCollectiveBegin {
                process: p,
                timestamp: ts(1),
            });
            events.push(TraceEvent::MpiCollectiveEnd {
                process: p,
                comm: CommId(0),
                root_rank: Some(pid(0)),
                self_group: members.clone(),
                comm_group: members.clone(),
                timestamp: ts(2),
            });
        }

        let mut source = FixedTrace::new(events);
        let graph = build(&mut source, BuilderConfig::default(), &NullLog).unwrap();

        // three SyncEvent vertices, one per process, plus Root + Terminal
        assert_eq!(graph.vertex_count(), 5);
        let root_sync = graph
            .vertices()
            .find(|v| v.payload.as_sync_event().is_some_and(|s| s.process == pid(0)))
            .unwrap();
        assert_eq!(graph.out_degree(root_sync.id), 2);
        for target in graph.out_edges(root_sync.id) {
            let target_sync = graph.vertex(*target).payload.as_sync_event().unwrap();
            assert_eq!(target_sync.root_event, Some(root_sync.id));
        }
    }

    #[test]
    fn collective_with_undefined_root_falls_back_to_earliest_timestamp() {
        let mut events = region_defs();
        events.push(TraceEvent::DefLocation { process: pid(0) });
        events.push(TraceEvent::DefLocation { process: pid(1) });

        // process 1 is seen first (at t=1), so it becomes the fallback root
        events.push(TraceEvent::Enter {
            process: pid(1),
            region: RegionId(0),
            timestamp: ts(1),
        });
        events.push(TraceEvent::Leave {
            process: pid(1),
            region: RegionId(0),
            timestamp: ts(1),
        });

        let members: BTreeSet<ProcessId> = [pid(0), pid(1)].into_iter().collect();
        for p in [pid(0), pid(1)] {
            events.push(TraceEvent::MpiCollectiveBegin {
                process: p,
                timestamp: ts(5),
            });
            events.push(TraceEvent::MpiCollectiveEnd {
                process: p,
                comm: CommId(0),
                root_rank: None,
                self_group: members.clone(),
                comm_group: members.clone(),
                timestamp: ts(6),
            });
        }

        let mut source = FixedTrace::new(events);
        let graph = build(&mut source, BuilderConfig::default(), &NullLog).unwrap();

        let sync_for = |p: ProcessId| {
            graph
                .vertices()
                .find(|v| {
                    v.payload
                        .as_sync_event()
                        .is_some_and(|s| s.process == p)
                })
                .unwrap()
        };
        let root_sync = sync_for(pid(1));
        let member_sync = sync_for(pid(0));
        assert_eq!(graph.out_degree(root_sync.id), 1);
        assert_eq!(
            graph.vertex(*graph.out_edges(root_sync.id).first().unwrap()).id,
            member_sync.id
        );
    }

    #[test]
    fn p2p_send_receive_draws_single_edge() {
        let mut events = region_defs();
        events.push(TraceEvent::DefLocation { process: pid(0) });
        events.push(TraceEvent::DefLocation { process: pid(1) });
        events.push(TraceEvent::MpiSend {
            process: pid(0),
            remote: pid(1),
            tag: 7,
            length: 128,
            timestamp: ts(1),
        });
        events.push(TraceEvent::MpiReceive {
            process: pid(1),
            remote: pid(0),
            tag: 7,
            length: 128,
            timestamp: ts(2),
        });

        let mut source = FixedTrace::new(events);
        let graph = build(&mut source, BuilderConfig::default(), &NullLog).unwrap();

        let send = graph
            .vertices()
            .find(|v| v.payload.as_sync_event().is_some_and(|s| s.process == pid(0)))
            .unwrap();
        let recv = graph
            .vertices()
            .find(|v| v.payload.as_sync_event().is_some_and(|s| s.process == pid(1)))
            .unwrap();
        assert_eq!(graph.out_edges(send.id).to_vec(), vec![recv.id]);
        assert_eq!(
            graph.vertex(recv.id).payload.as_sync_event().unwrap().root_event,
            Some(send.id)
        );
    }

    #[test]
    fn unsupported_event_is_skipped_when_tolerated() {
        let events = vec![TraceEvent::Unsupported {
            kind: CompactString::from("io_try_lock"),
        }];
        let mut source = FixedTrace::new(events);
        let graph = build(&mut source, BuilderConfig::default(), &NullLog).unwrap();
        assert_eq!(graph.vertex_count(), 2); // Root + Terminal, no I/O vertex

        let mut source = FixedTrace::new(vec![TraceEvent::Unsupported {
            kind: CompactString::from("io_try_lock"),
        }]);
        let config = BuilderConfig {
            tolerate_unsupported_events: false,
        };
        let err = build(&mut source, config, &NullLog).unwrap_err();
        assert!(matches!(err, CioError::UnsupportedEventKind { .. }));
    }

    #[test]
    fn leave_decorates_vertex_duration() {
        let mut events = region_defs();
        events.extend(file_and_handle_defs(IoFileId(0), IoHandleId(0)));
        events.push(TraceEvent::DefLocation { process: pid(0) });
        events.push(TraceEvent::Enter {
            process: pid(0),
            region: RegionId(0),
            timestamp: ts(100),
        });
        events.push(TraceEvent::IoOperationBegin {
            process: pid(0),
            handle: IoHandleId(0),
            mode: IoOperationMode::Read,
            request_size: 16,
            flags: 0,
            timestamp: ts(101),
        });
        events.push(TraceEvent::IoOperationComplete {
            process: pid(0),
            handle: IoHandleId(0),
            response_size: 16,
            timestamp: ts(102),
        });
        events.push(TraceEvent::Leave {
            process: pid(0),
            region: RegionId(0),
            timestamp: ts(150),
        });

        let mut source = FixedTrace::new(events);
        let graph = build(&mut source, BuilderConfig::default(), &NullLog).unwrap();
        let io_vertex = graph
            .vertices()
            .find(|v| matches!(v.payload, VertexPayload::IoEvent(_)))
            .unwrap();
        assert_eq!(io_vertex.duration.enter, Some(ts(100)));
        assert_eq!(io_vertex.duration.leave, Some(ts(150)));
    }
}
