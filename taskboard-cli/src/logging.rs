use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub enum LogTarget {
    /// One-shot commands: warnings to stderr.
    Stderr,
    /// Interactive board: the terminal is taken, so append to a file.
    File(PathBuf),
}

/// `RUST_LOG` wins over the per-target default.
pub fn init(target: LogTarget) -> Result<()> {
    match target {
        LogTarget::Stderr => {
            let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "taskboard=warn".into());
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init()
                .context("install logger")?;
        }
        LogTarget::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("open {}", path.display()))?;
            let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "taskboard=info".into());
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .try_init()
                .context("install logger")?;
        }
    }
    Ok(())
}
