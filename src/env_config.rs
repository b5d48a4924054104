//! Shared environment configuration for all binaries.
//!
//! Consolidates `ATTENUATION_BASE_PATH` and `ATTENUATION_LOG` reads.

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

/// Read `ATTENUATION_BASE_PATH` (default `"."`) and chdir into it.
pub fn init_base_path() -> std::io::Result<PathBuf> {
    let base_path = std::env::var("ATTENUATION_BASE_PATH").unwrap_or_else(|_| ".".to_string());
    let path = PathBuf::from(&base_path);
    std::env::set_current_dir(&path)?;
    let cwd = std::env::current_dir()?;
    tracing::info!(base_path = %base_path, cwd = %cwd.display(), "working directory set");
    Ok(path)
}

/// Install the global subscriber. Filter comes from `ATTENUATION_LOG`
/// (default `info`). Safe to call twice; the second call is a no-op.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("ATTENUATION_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
