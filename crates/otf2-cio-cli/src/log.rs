use otf2_cio_builder::TraceLog;

/// Installs a `tracing-subscriber` formatter honoring `RUST_LOG`,
/// defaulting to `info`.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// The concrete [`TraceLog`] the core calls into: unknown/unsupported
/// event kinds (spec §7: "log warn; skip") surface through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl TraceLog for TracingLog {
    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }
}
