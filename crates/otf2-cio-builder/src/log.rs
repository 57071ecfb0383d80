/// An injected logging sink (spec §5/§9: "the logging sink is an injected
/// sink passed to the builder", no global logger). `otf2-cio-cli` wires a
/// `tracing`-backed implementation; this crate stays logging-framework
/// agnostic so it can be embedded without pulling in `tracing-subscriber`.
pub trait TraceLog {
    fn warn(&self, message: &str);
}

/// Discards every message; useful for tests and library embedders that
/// don't care about builder diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLog;

impl TraceLog for NullLog {
    fn warn(&self, _message: &str) {}
}
