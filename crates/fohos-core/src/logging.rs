//! File logging for `fohos` commands
//!
//! Every command appends to a daily file under
//! `<data_local_dir>/flutter-ohos/logs/`. The terminal only carries command
//! output, so this file is where transport and build traces end up.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::Result;

/// Environment variable overriding the log filter
pub const LOG_ENV_VAR: &str = "FOHOS_LOG";

/// Prefix of the daily log files (`fohos.log.YYYY-MM-DD`)
pub const LOG_FILE_PREFIX: &str = "fohos.log";

/// Info from every fohos crate, warnings from dependencies
pub const DEFAULT_FILTER: &str =
    "fohos=info,flutter_ohos=info,fohos_core=info,fohos_daemon=info,fohos_app=info,warn";

/// Start logging for one `fohos` invocation and return today's log file.
///
/// ```bash
/// # trace every hdc invocation of a launch
/// FOHOS_LOG=fohos_daemon=trace fohos run -d 127.0.0.1:5555
/// # follow the build pipeline
/// FOHOS_LOG=fohos_app=debug fohos build hap --mode release
/// ```
pub fn init(command: &str) -> Result<PathBuf> {
    let log_dir = log_directory();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_PREFIX);
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .init();

    tracing::info!(
        "fohos {} {} (pid {})",
        env!("CARGO_PKG_VERSION"),
        command,
        std::process::id()
    );

    Ok(current_log_file())
}

fn log_directory() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("flutter-ohos").join("logs")
}

/// Today's log file. The appender rotates on UTC dates.
pub fn current_log_file() -> PathBuf {
    log_file_for(&log_directory(), Utc::now().date_naive())
}

fn log_file_for(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("{}.{}", LOG_FILE_PREFIX, date.format("%Y-%m-%d")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_matches_daily_appender_name() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(
            log_file_for(Path::new("/logs"), date),
            PathBuf::from("/logs/fohos.log.2026-03-09")
        );
    }

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }
}
