//! Logging setup
//!
//! Only active when QUILL_LOG is set. Logs go to `config.log_file` when
//! configured, otherwise to stderr.

use std::fs::OpenOptions;

use quill_core::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Install the tracing subscriber for this process
pub fn init(config: &Config) {
    let Ok(log_level) = std::env::var("QUILL_LOG") else {
        return;
    };

    let env_filter = EnvFilter::new(filter_directives(&log_level));

    match &config.log_file {
        Some(log_path) => {
            let log_file = match OpenOptions::new().create(true).append(true).open(log_path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
                    return;
                }
            };

            // Ignore error if already initialized
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_ansi(false)
                .with_writer(log_file)
                .try_init();

            info!("Logging to {:?}", log_path);
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}

fn filter_directives(level: &str) -> String {
    format!("quill_core={},quill_cli={}", level, level)
}
