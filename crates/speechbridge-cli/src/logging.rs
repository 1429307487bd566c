//! Tracing subscriber setup from `LoggingConfig`.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use speechbridge_core::config::LoggingConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Filter directives: the base level followed by per-crate overrides.
pub fn filter_directives(config: &LoggingConfig, verbose: bool) -> String {
    let level = if verbose {
        "debug".to_string()
    } else {
        config.level.clone().unwrap_or_else(|| "info".to_string())
    };
    std::iter::once(level)
        .chain(config.filters.iter().cloned())
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber. `RUST_LOG` wins over the config.
///
/// With `log_file` set, output is appended there without ANSI colors; the
/// detached live worker has no terminal.
pub fn init(config: &LoggingConfig, verbose: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter_directives(config, verbose))?,
    };

    let (writer, ansi) = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None if config.output == "stdout" => (BoxMakeWriter::new(std::io::stdout), true),
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer);
    let result = if config.format == "json" {
        builder.json().try_init()
    } else {
        builder.with_ansi(ansi).try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))
}
