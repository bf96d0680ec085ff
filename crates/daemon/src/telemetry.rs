//! Logging setup
//!
//! Console output (pretty or JSON) plus an optional daily-rolling JSON file.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "ofd_jobs=info";
const LOG_FILE_PREFIX: &str = "ofd-jobs.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Logging settings, read before anything else so config warnings are visible
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub format: LogFormat,
    pub dir: Option<PathBuf>,
}

impl LogSettings {
    /// # Environment Variables
    ///
    /// - `OFD_JOBS_LOG_FORMAT`: `pretty` (default) or `json`
    /// - `OFD_JOBS_LOG_DIR`: directory for rolling log files (unset = console only)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let format = match lookup("OFD_JOBS_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        let dir = lookup("OFD_JOBS_LOG_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(|dir| PathBuf::from(shellexpand::tilde(&dir).into_owned()));

        Self { format, dir }
    }
}

/// Install the global subscriber
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// life of the process.
pub fn init_logging(settings: &LogSettings) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .context("Failed to create env filter")?;

    let (file_layer, guard) = match &settings.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    match settings.format {
        // Production: JSON structured logging
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        // Development: Pretty formatting with colors
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
    }
    .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> LogSettings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LogSettings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_to_pretty_console() {
        assert_eq!(
            settings(&[]),
            LogSettings {
                format: LogFormat::Pretty,
                dir: None
            }
        );
    }

    #[test]
    fn test_json_with_file_dir() {
        let s = settings(&[("OFD_JOBS_LOG_FORMAT", "json"), ("OFD_JOBS_LOG_DIR", "/var/log/ofd")]);
        assert_eq!(s.format, LogFormat::Json);
        assert_eq!(s.dir, Some(PathBuf::from("/var/log/ofd")));
    }

    #[test]
    fn test_unknown_format_falls_back() {
        assert_eq!(settings(&[("OFD_JOBS_LOG_FORMAT", "xml")]).format, LogFormat::Pretty);
    }
}
