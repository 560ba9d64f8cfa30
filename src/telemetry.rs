use std::env;

use once_cell::sync::OnceCell;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

static INIT: OnceCell<()> = OnceCell::new();

/// Pick the filter directive: IECS_LOG, then RUST_LOG, then the default.
fn filter_directive(verbose: bool) -> String {
    for key in ["IECS_LOG", "RUST_LOG"] {
        if let Ok(v) = env::var(key) {
            if !v.trim().is_empty() {
                return v;
            }
        }
    }
    if verbose {
        "warn,iecs=debug".to_string()
    } else {
        "warn".to_string()
    }
}

/// Install the global fmt subscriber writing to stderr. Idempotent.
pub fn telemetry_init(verbose: bool, use_color: bool) {
    if INIT.get().is_some() {
        return;
    }
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(use_color)
        .with_target(verbose);
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::new(filter_directive(verbose)))
        .with(fmt_layer);
    if registry.try_init().is_err() {
        eprintln!("iecs: logging init skipped (global subscriber already set)");
    }
    let _ = INIT.set(());
}
