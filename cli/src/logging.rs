use std::{fs, path::Path};

use anyhow::Context;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// File logging to `<log_dir>/fanout.log`, plus stderr when `verbose`.
/// `RUST_LOG` overrides the default `info` filter.
pub fn init(log_dir: &Path, verbose: bool) -> anyhow::Result<()> {
    fs::create_dir_all(log_dir).with_context(|| format!("creating log directory {}", log_dir.display()))?;
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix("fanout.log")
        .build(log_dir)
        .context("opening log file")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = verbose.then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(file_appender).with_ansi(false))
        .with(stderr)
        .try_init()?;

    Ok(())
}
