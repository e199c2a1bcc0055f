//! Logging configuration.
//!
//! Sets up tracing-based logging in one of three shapes: human-readable text
//! on stderr, JSON lines on stdout for log collectors that parse structured
//! entries, or systemd's journal on Linux. Any of them can additionally write
//! a daily rolling log file.

use anyhow::Result;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize the logging system.
///
/// Log level can be controlled via the `FACE_HARVESTER_LOG` environment variable:
/// - `FACE_HARVESTER_LOG=debug` for verbose output
/// - `FACE_HARVESTER_LOG=info` for standard output (default)
/// - `FACE_HARVESTER_LOG=warn` for warnings and errors only
pub fn init(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_env("FACE_HARVESTER_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));

    #[cfg(target_os = "linux")]
    let journald_layer = match config.format {
        LogFormat::Journald => tracing_journald::layer().ok(),
        _ => None,
    };
    #[cfg(not(target_os = "linux"))]
    let journald_layer: Option<tracing_subscriber::layer::Identity> = None;

    // Journald that cannot be reached degrades to text on stderr
    let use_text = match config.format {
        LogFormat::Text => true,
        LogFormat::Journald => journald_layer.is_none(),
        LogFormat::Json => false,
    };

    let text_layer = use_text.then(|| fmt::layer().with_writer(std::io::stderr));
    let json_layer = (config.format == LogFormat::Json).then(|| {
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stdout)
    });

    let file_layer = match &config.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = tracing_appender::rolling::daily(dir, "face-harvester.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let _ = FILE_GUARD.set(guard);
            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(journald_layer)
        .with(text_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init()?;

    tracing::debug!(format = ?config.format, file = ?config.dir, "Logging initialized");
    Ok(())
}
