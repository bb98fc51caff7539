//! Tracing initialisation.

/// Install a `RUST_LOG`-driven fmt subscriber unless one is already set.
/// Embedders that configure their own subscriber can skip this.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}
