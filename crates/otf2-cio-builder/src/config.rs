/// Small builder knobs, following the shape of
/// `peeps_waitgraph::detect::SeverityConfig` — an explicit struct with a
/// `Default` impl, no configuration-file framework.
#[derive(Debug, Clone, Copy)]
pub struct BuilderConfig {
    /// If true, an unsupported event kind is logged and skipped (spec
    /// §7's "unknown/unsupported event kind: log warn; skip"). If false,
    /// it is treated as a fatal condition instead.
    pub tolerate_unsupported_events: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            tolerate_unsupported_events: true,
        }
    }
}
