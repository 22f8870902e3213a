use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber.
///
/// `binary` is the calling binary's crate name; info-level output is enabled
/// for it and for this library on top of whatever `RUST_LOG` selects.
pub fn init_tracing(binary: &str) {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    for target in ["energy_collector", binary] {
        match format!("{target}=info").parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("ignoring log directive for {target}: {e}"),
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
