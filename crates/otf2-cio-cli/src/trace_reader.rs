use std::fs;
use std::path::Path;

use compact_str::CompactString;
use otf2_cio_builder::{EventSource, TraceEvent};
use otf2_cio_types::CioError;

/// Reads a trace recorded as newline-delimited JSON, one [`TraceEvent`]
/// per line. Stands in for a real OTF2 reader, which is an external
/// collaborator this crate does not implement.
pub struct JsonLineTrace {
    lines: std::vec::IntoIter<String>,
}

impl JsonLineTrace {
    pub fn open(path: &Path) -> Result<Self, String> {
        let contents =
            fs::read_to_string(path).map_err(|e| format!("read trace {}: {e}", path.display()))?;
        let lines: Vec<String> = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect();
        Ok(Self {
            lines: lines.into_iter(),
        })
    }
}

impl EventSource for JsonLineTrace {
    fn next_event(&mut self) -> Result<Option<TraceEvent>, CioError> {
        let Some(line) = self.lines.next() else {
            return Ok(None);
        };
        let event: TraceEvent = facet_json::from_str(&line).map_err(|e| {
            CioError::MalformedTraceInput {
                detail: CompactString::from(format!("{e}")),
            }
        })?;
        Ok(Some(event))
    }
}
