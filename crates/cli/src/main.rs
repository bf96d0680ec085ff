//! OFD Jobs CLI - Command-line interface for the ofd job daemon

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use ofd_jobs_sdk::{
    JobEvent, JobStartedResponse, OfdJobsClient, SdkError, SortRequest, ValidationType,
};
use serde::Serialize;
use serde_json::Value;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9630";

#[derive(Parser)]
#[command(name = "ofd-jobs-cli")]
#[command(about = "Run and follow ofd validation/sort jobs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "OFD_JOBS_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a validation run
    Validate {
        /// Which checks to run
        #[arg(short = 't', long = "type", value_enum, default_value = "all")]
        validation_type: Scope,

        /// Follow progress until the run finishes
        #[arg(short, long)]
        watch: bool,
    },

    /// Start a sort run
    Sort {
        /// Report changes without writing files
        #[arg(long)]
        dry_run: bool,

        /// Validate after sorting
        #[arg(long)]
        validate: bool,

        /// Only fix indentation, skip key sorting
        #[arg(long)]
        fix_indent_only: bool,

        /// Follow progress until the run finishes
        #[arg(short, long)]
        watch: bool,
    },

    /// Follow a job's progress (replays history first)
    Watch {
        /// Job ID
        job_id: String,
    },

    /// Show a job record
    Job {
        /// Job ID
        job_id: String,
    },

    /// Show the running validation and daemon statistics
    Status,

    /// Run a registry sweep now
    Sweep,
}

/// Validation scope
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Scope {
    All,
    JsonFiles,
    Logos,
    FolderNames,
    StoreIds,
    Gtin,
}

impl From<Scope> for ValidationType {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::All => ValidationType::All,
            Scope::JsonFiles => ValidationType::JsonFiles,
            Scope::Logos => ValidationType::Logos,
            Scope::FolderNames => ValidationType::FolderNames,
            Scope::StoreIds => ValidationType::StoreIds,
            Scope::Gtin => ValidationType::Gtin,
        }
    }
}

#[derive(Tabled)]
struct StartedRow {
    job_id: String,
    kind: String,
    status: String,
}

#[derive(Tabled)]
struct JobRow {
    id: String,
    kind: String,
    status: String,
    duration: String,
    events: usize,
}

#[derive(Tabled)]
struct StatRow {
    metric: &'static str,
    value: String,
}

/// Wire name of a serde enum (`JobKind::Sort` -> "sort")
fn wire_name<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(Value::String(name)) => name,
        _ => "?".to_string(),
    }
}

/// Launch outcome for a validation that may already be running
enum Launch {
    Started(JobStartedResponse),
    AlreadyRunning(String),
}

/// Turn a conflict into the id of the run to attach to
fn attach_on_conflict(outcome: Result<JobStartedResponse, SdkError>) -> Result<Launch> {
    match outcome {
        Ok(started) => Ok(Launch::Started(started)),
        Err(e) => match e.running_job_id() {
            Some(job_id) => Ok(Launch::AlreadyRunning(job_id.to_string())),
            None => Err(e).context("Failed to start validation"),
        },
    }
}

/// Print a launch result, then optionally follow it
async fn report_started(
    client: &OfdJobsClient,
    started: JobStartedResponse,
    watch: bool,
) -> Result<()> {
    let job_id = started.job_id.clone();
    let row = StartedRow {
        job_id: started.job_id,
        kind: wire_name(&started.kind),
        status: wire_name(&started.status),
    };

    println!("{}", "✓ Job started".green().bold());
    println!();
    println!("{}", Table::new(vec![row]));

    if watch {
        println!();
        watch_job(client, &job_id).await?;
    }
    Ok(())
}

async fn watch_job(client: &OfdJobsClient, job_id: &str) -> Result<()> {
    let mut progress = client
        .subscribe_progress(job_id)
        .await
        .with_context(|| format!("Failed to subscribe to job {}", job_id))?;

    println!("{}", format!("Watching job {}", job_id).cyan().bold());

    while let Some(event) = progress.next().await {
        match event? {
            JobEvent::Progress(p) => {
                let message = if p.message.is_empty() {
                    String::new()
                } else {
                    format!("  {}", p.message.dimmed())
                };
                println!("  [{:>5.1}%] {}{}", p.percent, p.stage.bold(), message);
            }
            JobEvent::Complete { result } => {
                println!();
                for line in summarize_result(&result) {
                    println!("{}", line);
                }
            }
            JobEvent::Error {
                message,
                diagnostic,
            } => {
                println!();
                println!("{} {}", "✗ Job failed:".red().bold(), message);
                if let Some(diagnostic) = diagnostic {
                    println!("{}", diagnostic.dimmed());
                }
                anyhow::bail!("Job {} failed", job_id);
            }
        }
    }

    Ok(())
}

/// Human summary of a validation or sort result
fn summarize_result(result: &Value) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(is_valid) = result.get("is_valid").and_then(Value::as_bool) {
        let errors = result["error_count"].as_u64().unwrap_or(0);
        let warnings = result["warning_count"].as_u64().unwrap_or(0);
        if is_valid {
            lines.push(format!("{} ({} warnings)", "✓ Valid".green().bold(), warnings));
        } else {
            lines.push(format!(
                "{} {} errors, {} warnings",
                "✗ Invalid:".red().bold(),
                errors,
                warnings
            ));
        }
    }

    if let Some(stats) = result.get("stats") {
        let dry_run = result["dry_run"].as_bool().unwrap_or(false);
        let header = if dry_run { "Sort (dry run)" } else { "Sort" };
        lines.push(format!("{}", header.cyan().bold()));
        if let Some(message) = result["message"].as_str() {
            lines.push(format!("  {}", message));
        }
        for key in [
            "files_processed",
            "files_modified",
            "files_skipped",
            "extra_keys_found",
        ] {
            lines.push(format!("  {}: {}", key.bold(), stats[key]));
        }
        if let Some(validation) = result.get("validation") {
            lines.extend(summarize_result(validation));
        }
    }

    if lines.is_empty() {
        let success = result["success"].as_bool().unwrap_or(true);
        lines.push(if success {
            format!("{}", "✓ Completed".green().bold())
        } else {
            format!("{} (exit code {})", "✗ Completed with findings".yellow().bold(), result["exit_code"])
        });
    }

    lines
}

fn format_duration(start: i64, end: Option<i64>) -> String {
    match end {
        Some(end) => format!("{:.1}s", (end - start) as f64 / 1000.0),
        None => "running".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = OfdJobsClient::connect(&cli.rpc_url)
        .await
        .context("Failed to connect to daemon")?;

    match cli.command {
        Commands::Validate {
            validation_type,
            watch,
        } => {
            let outcome = client.start_validation(validation_type.into()).await;
            match attach_on_conflict(outcome)? {
                Launch::Started(started) => report_started(&client, started, watch).await?,
                Launch::AlreadyRunning(job_id) => {
                    println!(
                        "{} {}",
                        "○ Validation already running:".yellow().bold(),
                        job_id
                    );
                    if watch {
                        watch_job(&client, &job_id).await?;
                    }
                }
            }
        }

        Commands::Sort {
            dry_run,
            validate,
            fix_indent_only,
            watch,
        } => {
            let started = client
                .start_sort(SortRequest {
                    dry_run,
                    validate,
                    fix_indent_only,
                })
                .await
                .context("Failed to start sort")?;
            report_started(&client, started, watch).await?;
        }

        Commands::Watch { job_id } => {
            watch_job(&client, &job_id).await?;
        }

        Commands::Job { job_id } => {
            let job = client.get_job(&job_id).await?;

            let row = JobRow {
                id: job.id,
                kind: wire_name(&job.kind),
                status: wire_name(&job.status),
                duration: format_duration(job.start_time, job.end_time),
                events: job.events.len(),
            };
            println!("{}", Table::new(vec![row]));

            if let Some(result) = job.result.filter(|r| !r.is_null()) {
                println!();
                for line in summarize_result(&result) {
                    println!("{}", line);
                }
            }
        }

        Commands::Status => {
            println!("{}", "System Status".cyan().bold());
            println!();

            match client.stats().await {
                Ok(stats) => {
                    println!("  {} {}", "RPC URL:".bold(), cli.rpc_url);
                    println!("  {} {}", "Status:".bold(), "ONLINE".green());
                    println!();

                    let status = client.validation_status().await?;
                    if status.running {
                        println!(
                            "  {} {}",
                            "Validation:".bold(),
                            format!("RUNNING ({})", status.job_id.as_deref().unwrap_or("?"))
                                .yellow()
                        );
                    } else {
                        println!("  {} {}", "Validation:".bold(), "idle".dimmed());
                    }
                    println!();

                    let rows = vec![
                        StatRow {
                            metric: "Total Jobs",
                            value: stats.total_jobs.to_string(),
                        },
                        StatRow {
                            metric: "Running",
                            value: stats.running_jobs.to_string(),
                        },
                        StatRow {
                            metric: "Complete",
                            value: stats.complete_jobs.to_string(),
                        },
                        StatRow {
                            metric: "Error",
                            value: stats.error_jobs.to_string(),
                        },
                        StatRow {
                            metric: "Uptime (s)",
                            value: stats.uptime_seconds.to_string(),
                        },
                    ];
                    println!("{}", Table::new(rows));
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }

        Commands::Sweep => {
            let result = client.sweep().await?;
            println!("{}", "✓ Sweep completed".green().bold());
            println!("  {} {} jobs evicted", "•".bold(), result.evicted);
            println!("  {} {} jobs timed out", "•".bold(), result.timed_out);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ofd_jobs_sdk::{JobKind, JobStatus, CONFLICT_CODE};
    use serde_json::json;

    #[test]
    fn test_conflict_attaches_to_running_validation() {
        let conflict = Err(SdkError::Rpc {
            code: CONFLICT_CODE,
            message: "Validation already running".to_string(),
            data: Some(json!({"job_id": "validation-current"})),
        });
        assert!(matches!(
            attach_on_conflict(conflict),
            Ok(Launch::AlreadyRunning(id)) if id == "validation-current"
        ));

        let started = Ok(JobStartedResponse {
            job_id: "validation-current".to_string(),
            kind: JobKind::Validation,
            status: JobStatus::Running,
        });
        assert!(matches!(attach_on_conflict(started), Ok(Launch::Started(_))));

        // Other rpc failures are not swallowed
        let missing = Err(SdkError::Rpc {
            code: 4001,
            message: "Job x not found".to_string(),
            data: None,
        });
        assert!(attach_on_conflict(missing).is_err());
    }

    #[test]
    fn test_scope_maps_to_sdk_type() {
        assert_eq!(
            ValidationType::from(Scope::FolderNames),
            ValidationType::FolderNames
        );
        assert_eq!(ValidationType::from(Scope::All), ValidationType::All);
        assert_eq!(wire_name(&ValidationType::from(Scope::StoreIds)), "store_ids");
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(wire_name(&JobKind::Sort), "sort");
        assert_eq!(wire_name(&JobStatus::Complete), "complete");
    }

    #[test]
    fn test_summaries() {
        colored::control::set_override(false);

        let lines = summarize_result(&json!({
            "errors": [], "error_count": 0, "warning_count": 2, "is_valid": true
        }));
        assert_eq!(lines, vec!["✓ Valid (2 warnings)"]);

        let lines = summarize_result(&json!({
            "success": true, "message": "Done", "dry_run": true,
            "stats": {"files_processed": 3, "files_modified": 1, "files_skipped": 0, "extra_keys_found": 0}
        }));
        assert_eq!(lines[0], "Sort (dry run)");
        assert!(lines.contains(&"  files_modified: 1".to_string()));

        let lines = summarize_result(&json!({"success": false, "exit_code": 1}));
        assert_eq!(lines, vec!["✗ Completed with findings (exit code 1)"]);
    }

    #[test]
    fn test_duration_format() {
        assert_eq!(format_duration(1000, Some(3500)), "2.5s");
        assert_eq!(format_duration(1000, None), "running");
    }
}
