use anyhow::Result;
use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_FILE: &str = "posadmin.log";

/// Initialize logging for the CLI
///
/// `RUST_LOG` wins over `log_level` when set. With a `log_dir` the same
/// events are also appended to `<log_dir>/posadmin.log`.
pub fn init_logging(log_level: Level, log_dir: Option<PathBuf>) -> Result<()> {
    let env_filter = env_filter(log_level);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            let log_file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(LOG_FILE))?;

            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(log_file)
                        .with_ansi(false),
                )
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}

fn env_filter(level: Level) -> EnvFilter {
    let level_str = level.as_str().to_lowercase();
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("posadmin={level_str},posadmin_core={level_str},posadmin_http={level_str}").into()
    })
}
