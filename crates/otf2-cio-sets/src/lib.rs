//! Per-Process Set Discovery and the Set Merge Engine: turns a built
//! `otf2_cio_types::Graph` into the final list of Concurrent I/O Sets
//! (§4.2/§4.3 of the design).

mod discovery;
mod dfs;
mod merge;

pub use dfs::{dfs, root_of_sync, DfsHandler};
pub use discovery::discover_fragments;
pub use merge::merge_fragments;

use otf2_cio_types::{CioResult, CioSet, Graph};

/// Runs discovery followed by merge: the single entry point a caller
/// needs to go from a graph to its Concurrent I/O Sets.
pub fn find_cio_sets(graph: &Graph) -> CioResult<Vec<CioSet>> {
    let fragments = discover_fragments(graph)?;
    merge_fragments(graph, &fragments)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use compact_str::CompactString;
    use otf2_cio_builder::{
        build, BuilderConfig, EventSource, IoFileId, IoHandleId, IoParadigmId, NullLog, RegionId,
        RegionRole, TraceEvent,
    };
    use otf2_cio_types::{CioError, IoOperationMode, ProcessId, Timestamp};

    use super::*;

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

    fn region_and_file_defs() -> Vec<TraceEvent> {
        vec![
            TraceEvent::DefRegion {
                region: RegionId(0),
                name: CompactString::from("main"),
                role: RegionRole::Other,
            },
            TraceEvent::DefIoParadigm {
                paradigm: IoParadigmId(0),
                name: CompactString::from("posix"),
            },
            TraceEvent::DefIoFile {
                file: IoFileId(0),
                name: CompactString::from("/data/out.bin"),
            },
            TraceEvent::DefIoHandle {
                handle: IoHandleId(0),
                file: IoFileId(0),
                paradigm: IoParadigmId(0),
                parent: None,
            },
        ]
    }

    fn write_at(process: ProcessId, timestamp: u64) -> Vec<TraceEvent> {
        vec![
            TraceEvent::IoOperationBegin {
                process,
                handle: IoHandleId(0),
                mode: IoOperationMode::Write,
                request_size: 16,
                flags: 0,
                timestamp: ts(timestamp),
            },
            TraceEvent::IoOperationComplete {
                process,
                handle: IoHandleId(0),
                response_size: 16,
                timestamp: ts(timestamp + 1),
            },
        ]
    }

    #[test]
    fn single_process_no_syncs_yields_one_set_spanning_root_and_terminal() {
        let mut events = region_and_file_defs();
        events.push(TraceEvent::DefLocation { process: pid(0) });
        events.extend(write_at(pid(0), 10));
        events.extend(write_at(pid(0), 20));

        let mut source = FixedTrace::new(events);
        let graph = build(&mut source, BuilderConfig::default(), &NullLog).unwrap();

        let sets = find_cio_sets(&graph).unwrap();
        assert_eq!(sets.len(), 1);
        let set = &sets[0];
        assert_eq!(set.start_event, graph.root());
        assert_eq!(set.end_event, Some(graph.terminal()));
        assert_eq!(set.members.len(), 2);
        assert!(set
            .members
            .iter()
            .all(|&v| graph.vertex(v).payload.is_io_event()));
    }

    #[test]
    fn no_io_events_yields_empty_set_list() {
        let mut events = region_and_file_defs();
        events.push(TraceEvent::DefLocation { process: pid(0) });
        events.push(TraceEvent::Enter {
            process: pid(0),
            region: RegionId(0),
            timestamp: ts(1),
        });
        events.push(TraceEvent::Leave {
            process: pid(0),
            region: RegionId(0),
            timestamp: ts(2),
        });

        let mut source = FixedTrace::new(events);
        let graph = build(&mut source, BuilderConfig::default(), &NullLog).unwrap();

        let sets = find_cio_sets(&graph).unwrap();
        assert!(sets.is_empty());
    }

    #[test]
    fn p2p_sync_splits_writes_into_two_disjoint_sets() {
        let mut events = region_and_file_defs();
        events.push(TraceEvent::DefLocation { process: pid(0) });
        events.push(TraceEvent::DefLocation { process: pid(1) });

        events.extend(write_at(pid(0), 1));
        events.extend(write_at(pid(1), 1));
        events.push(TraceEvent::MpiSend {
            process: pid(0),
            remote: pid(1),
            tag: 7,
            length: 4,
            timestamp: ts(5),
        });
        events.push(TraceEvent::MpiReceive {
            process: pid(1),
            remote: pid(0),
            tag: 7,
            length: 4,
            timestamp: ts(6),
        });
        events.extend(write_at(pid(0), 10));
        events.extend(write_at(pid(1), 10));

        let mut source = FixedTrace::new(events);
        let graph = build(&mut source, BuilderConfig::default(), &NullLog).unwrap();

        let sets = find_cio_sets(&graph).unwrap();
        assert_eq!(sets.len(), 2);

        let total_members: usize = sets.iter().map(|s| s.members.len()).sum();
        assert_eq!(total_members, 4);

        for set in &sets {
            let processes: std::collections::BTreeSet<_> = set
                .members
                .iter()
                .map(|&v| graph.vertex(v).payload.process().unwrap())
                .collect();
            assert_eq!(processes.len(), 2, "each side of the sync involves both processes");
        }
    }

    #[test]
    fn two_sequential_p2p_syncs_on_one_process_do_not_error() {
        let mut events = region_and_file_defs();
        events.push(TraceEvent::DefLocation { process: pid(0) });
        events.push(TraceEvent::DefLocation { process: pid(1) });

        events.extend(write_at(pid(0), 1));
        events.extend(write_at(pid(1), 1));
        events.push(TraceEvent::MpiSend {
            process: pid(0),
            remote: pid(1),
            tag: 7,
            length: 4,
            timestamp: ts(5),
        });
        events.push(TraceEvent::MpiReceive {
            process: pid(1),
            remote: pid(0),
            tag: 7,
            length: 4,
            timestamp: ts(6),
        });

        events.extend(write_at(pid(0), 10));
        events.extend(write_at(pid(1), 10));
        events.push(TraceEvent::MpiSend {
            process: pid(0),
            remote: pid(1),
            tag: 8,
            length: 4,
            timestamp: ts(15),
        });
        events.push(TraceEvent::MpiReceive {
            process: pid(1),
            remote: pid(0),
            tag: 8,
            length: 4,
            timestamp: ts(16),
        });

        events.extend(write_at(pid(0), 20));
        events.extend(write_at(pid(1), 20));

        let mut source = FixedTrace::new(events);
        let graph = build(&mut source, BuilderConfig::default(), &NullLog).unwrap();

        let fragments = discover_fragments(&graph).unwrap();
        assert_eq!(fragments[&pid(0)].len(), 3);
        assert_eq!(fragments[&pid(1)].len(), 3);
        assert!(
            fragments.values().flatten().all(CioSet::is_closed),
            "discovery must not leave a fragment dangling open"
        );

        let sets = find_cio_sets(&graph).unwrap();
        assert_eq!(sets.len(), 3);

        let total_members: usize = sets.iter().map(|s| s.members.len()).sum();
        assert_eq!(total_members, 6);
    }

    #[test]
    fn discovery_partitions_every_io_event_into_exactly_one_fragment() {
        let mut events = region_and_file_defs();
        events.push(TraceEvent::DefLocation { process: pid(0) });
        events.extend(write_at(pid(0), 1));
        events.extend(write_at(pid(0), 5));
        events.extend(write_at(pid(0), 9));

        let mut source = FixedTrace::new(events);
        let graph = build(&mut source, BuilderConfig::default(), &NullLog).unwrap();

        let fragments = discover_fragments(&graph).unwrap();
        let all_members: Vec<_> = fragments
            .values()
            .flatten()
            .flat_map(|set| set.members.iter().copied())
            .collect();
        let mut seen = std::collections::BTreeSet::new();
        for member in &all_members {
            assert!(seen.insert(*member), "{member:?} appeared in two fragments");
        }
        let io_vertex_count = graph
            .vertices()
            .filter(|v| v.payload.is_io_event())
            .count();
        assert_eq!(all_members.len(), io_vertex_count);
    }
}
