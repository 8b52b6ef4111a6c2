//! Shared setup for the `kbase-build` and `kbase-search` binaries.

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use kbase_core::config::{expand_path, Config, Settings};

/// Log to stderr; `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Layered configuration with command-line path overrides applied last.
pub fn load_settings(source: Option<PathBuf>, index: Option<PathBuf>) -> anyhow::Result<Settings> {
    let mut settings = Config::load()?.settings()?;
    apply_overrides(&mut settings, source, index);
    Ok(settings)
}

/// Overrides get the same `~` and `$VAR` expansion as configured paths.
fn apply_overrides(settings: &mut Settings, source: Option<PathBuf>, index: Option<PathBuf>) {
    if let Some(source) = source {
        settings.data.source_dir = expand_path(source.to_string_lossy());
    }
    if let Some(index) = index {
        settings.data.index_dir = expand_path(index.to_string_lossy());
    }
}
