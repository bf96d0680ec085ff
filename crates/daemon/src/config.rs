//! Daemon configuration from environment variables

use ofd_jobs_api_rpc::RpcServerConfig;
use ofd_jobs_core::application::constants::{DEFAULT_PROGRAM, DEFAULT_PROGRAM_ARGS};
use ofd_jobs_core::application::{SweepConfig, ToolCommand};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

const DEFAULT_PROJECT_ROOT: &str = ".";

/// Everything the daemon needs, read once at startup
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub rpc: RpcServerConfig,
    pub project_root: PathBuf,
    pub program: String,
    pub program_args: Vec<String>,
    pub sweep: SweepConfig,
}

impl DaemonConfig {
    /// # Environment Variables
    ///
    /// - `OFD_JOBS_RPC_HOST` / `OFD_JOBS_RPC_PORT`: bind address (127.0.0.1:9630)
    /// - `OFD_JOBS_PROJECT_ROOT`: working directory of the tool (`.`)
    /// - `OFD_JOBS_PROGRAM` / `OFD_JOBS_PROGRAM_ARGS`: tool invocation (`python3 -m ofd`)
    /// - `OFD_JOBS_SWEEP_INTERVAL_SECS` / `OFD_JOBS_RETENTION_SECS` / `OFD_JOBS_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = RpcServerConfig::default();
        let sweep_defaults = SweepConfig::default();

        let rpc = RpcServerConfig {
            host: lookup("OFD_JOBS_RPC_HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "OFD_JOBS_RPC_PORT", defaults.port),
        };

        let project_root = lookup("OFD_JOBS_PROJECT_ROOT")
            .map(|root| shellexpand::tilde(&root).into_owned())
            .unwrap_or_else(|| DEFAULT_PROJECT_ROOT.to_string())
            .into();

        let program = lookup("OFD_JOBS_PROGRAM")
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PROGRAM.to_string());
        let program_args = match lookup("OFD_JOBS_PROGRAM_ARGS") {
            Some(args) => args.split_whitespace().map(str::to_string).collect(),
            None => DEFAULT_PROGRAM_ARGS.iter().map(|s| s.to_string()).collect(),
        };

        let sweep = SweepConfig {
            interval: Duration::from_secs(positive_or(
                &lookup,
                "OFD_JOBS_SWEEP_INTERVAL_SECS",
                sweep_defaults.interval.as_secs(),
            )),
            retention_ms: secs_to_ms(positive_or(
                &lookup,
                "OFD_JOBS_RETENTION_SECS",
                (sweep_defaults.retention_ms / 1000) as u64,
            )),
            timeout_ms: secs_to_ms(positive_or(
                &lookup,
                "OFD_JOBS_TIMEOUT_SECS",
                (sweep_defaults.timeout_ms / 1000) as u64,
            )),
        };

        Self {
            rpc,
            project_root,
            program,
            program_args,
            sweep,
        }
    }

    /// Invocation prefix for the subordinate tool
    pub fn tool_command(&self) -> ToolCommand {
        ToolCommand::new(
            self.program.clone(),
            self.program_args.clone(),
            Some(self.project_root.clone()),
        )
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key = key, value = %raw, default = %default, "Invalid value, using default");
            default
        }),
        None => default,
    }
}

/// Like `parse_or` but 0 is rejected too
fn positive_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> u64 {
    match parse_or(lookup, key, default) {
        0 => {
            warn!(key = key, default = default, "Zero is not allowed, using default");
            default
        }
        value => value,
    }
}

fn secs_to_ms(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX).saturating_mul(1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> DaemonConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DaemonConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);

        assert_eq!(config.rpc.host, "127.0.0.1");
        assert_eq!(config.rpc.port, 9630);
        assert_eq!(config.project_root, PathBuf::from("."));
        assert_eq!(config.program, "python3");
        assert_eq!(config.program_args, vec!["-m", "ofd"]);
        assert_eq!(config.sweep, SweepConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("OFD_JOBS_RPC_PORT", "19630"),
            ("OFD_JOBS_PROJECT_ROOT", "/srv/ofd"),
            ("OFD_JOBS_PROGRAM", "/opt/venv/bin/python"),
            ("OFD_JOBS_PROGRAM_ARGS", "-X utf8  -m ofd"),
            ("OFD_JOBS_TIMEOUT_SECS", "60"),
        ]);

        assert_eq!(config.rpc.port, 19630);
        assert_eq!(config.program_args, vec!["-X", "utf8", "-m", "ofd"]);
        assert_eq!(config.sweep.timeout_ms, 60_000);

        let spec = config.tool_command().validation(&Default::default());
        assert_eq!(spec.program, "/opt/venv/bin/python");
        assert_eq!(spec.working_dir, Some(PathBuf::from("/srv/ofd")));
        assert_eq!(&spec.args[..5], ["-X", "utf8", "-m", "ofd", "validate"]);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config(&[
            ("OFD_JOBS_RPC_PORT", "not-a-port"),
            ("OFD_JOBS_SWEEP_INTERVAL_SECS", "0"),
            ("OFD_JOBS_RETENTION_SECS", "-5"),
        ]);

        assert_eq!(config.rpc.port, 9630);
        assert_eq!(config.sweep.interval, Duration::from_secs(60));
        assert_eq!(config.sweep.retention_ms, 300_000);
    }
}
