//! `phase-bench` CLI: drives a single-agent session against a task directory
//! (`run`), enumerates a task corpus (`list`), or structurally checks one
//! task directory (`validate`) — see SPEC_FULL.md §6.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use phase_bench::log_info;
use phase_bench::metrics::MetricsCollector;
use phase_bench::rule::registry::build_registry;
use phase_bench::session::{Session, SessionStatus};
use phase_bench::task::loader::{collect_warnings, load_task, LoadedTask};
use phase_bench::workspace::Workspace;
use phase_bench::{config, lock, log, signal};

#[derive(Parser)]
#[command(name = "phase-bench", version, about = "A phased benchmark harness for scored coding tasks")]
struct Cli {
    /// Project root, used to resolve the default `phase-bench.toml`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Explicit config file path. Must exist if given.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive an agent through one task, either once (`--single`) or by
    /// polling `solution.phase` for changes until the session terminates.
    Run {
        #[arg(long)]
        task: PathBuf,
        #[arg(long)]
        workspace: PathBuf,
        #[arg(long, default_value = "agent")]
        agent_id: String,
        #[arg(long)]
        poll_interval: Option<f64>,
        #[arg(long)]
        single: bool,
    },
    /// Enumerate task directories under `--tasks-dir`.
    List {
        #[arg(long)]
        tasks_dir: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Load a task directory and report structural warnings.
    Validate {
        #[arg(long)]
        task: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = match log::parse_log_level(&cli.log_level) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    log::set_log_level(level);

    let result = match cli.command {
        Commands::Run {
            task,
            workspace,
            agent_id,
            poll_interval,
            single,
        } => handle_run(&cli.root, cli.config.as_deref(), &task, &workspace, &agent_id, poll_interval, single).await,
        Commands::List { tasks_dir, json } => handle_list(&tasks_dir, json),
        Commands::Validate { task } => handle_validate(&task),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_run(
    root: &Path,
    config_path: Option<&Path>,
    task_dir: &Path,
    workspace_dir: &Path,
    agent_id: &str,
    poll_interval_override: Option<f64>,
    single: bool,
) -> Result<(), String> {
    signal::install_signal_handlers()?;

    // Shutdown monitor: bridges the signal-hook flag (set from a signal
    // handler, not async-aware) into a CancellationToken the poll loop can
    // race a sleep against, so a SIGTERM/SIGINT is noticed mid-sleep instead
    // of only at the next poll boundary.
    let cancel = CancellationToken::new();
    let cancel_monitor = cancel.clone();
    tokio::spawn(async move {
        loop {
            if signal::is_shutdown_requested() {
                cancel_monitor.cancel();
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    });

    let bench_config = config::load_config_from(config_path, root)?;

    let task = load_task(task_dir).map_err(|e| e.to_string())?;
    for warning in collect_warnings(&task) {
        log_info!("[{}] warning: {}", task.config.id, warning);
    }

    let runtime_dir = workspace_dir.join(".phase-bench");
    let _lock = lock::try_acquire(&runtime_dir)?;

    let ws = Workspace::new(workspace_dir.to_path_buf(), bench_config.reporting.pretty_json);
    ws.setup(&task.config, &task.problem).map_err(|e| e.to_string())?;

    let all_rules: Vec<_> = task.config.phases.iter().flat_map(|p| p.rules.clone()).collect();
    let registry = build_registry(&all_rules);

    let timeout_ceiling = bench_config.execution.timeout_seconds_ceiling;
    let mut timeout_seconds = task.config.execution.timeout_seconds;
    if timeout_seconds > timeout_ceiling {
        log_info!(
            "[{}] task declares execution.timeout_seconds={} above configured ceiling {}; clamping",
            task.config.id,
            timeout_seconds,
            timeout_ceiling
        );
        timeout_seconds = timeout_ceiling;
    }
    let timeout = Duration::from_secs(timeout_seconds);
    let poll_interval = Duration::from_secs_f64(
        poll_interval_override.unwrap_or(bench_config.execution.default_poll_interval_seconds),
    );

    let mut limits = task.config.limits;
    let ceiling = bench_config.execution.max_total_attempts_ceiling;
    if limits.max_total_attempts > ceiling {
        log_info!(
            "[{}] task declares max_total_attempts={} above configured ceiling {}; clamping",
            task.config.id,
            limits.max_total_attempts,
            ceiling
        );
        limits.max_total_attempts = ceiling;
    }

    let mut session = Session::new(task.config.phases.clone(), limits);
    let mut metrics = MetricsCollector::new(task.config.id.clone(), agent_id.to_string(), task.config.phases.len() as u32);

    log_info!(
        "[{}] agent '{}' starting in {} (single={})",
        task.config.id,
        agent_id,
        workspace_dir.display(),
        single
    );

    let mut last_seen = ws.solution_mtime().map_err(|e| e.to_string())?;

    loop {
        if signal::is_shutdown_requested() {
            log_info!("[{}] shutdown requested, stopping", task.config.id);
            break;
        }

        // Re-check the attempt caps at the top of every iteration,
        // independent of whether the solution file changed. Without this, a
        // session whose final permitted attempt exhausts the budget hangs
        // forever if the agent never rewrites the file again: `submit_attempt`
        // only detects exhaustion at the *start* of the next call, and the
        // polling loop below only calls it when the file's mtime changes.
        if let Some(reason) = session.check_limits_before_attempt() {
            let outcome = session.terminal_outcome(reason);
            log_info!(
                "[{}] attempt budget exhausted ({}), ending session",
                task.config.id,
                reason
            );
            ws.write_feedback(&outcome.feedback).map_err(|e| e.to_string())?;
            metrics.fail_phase(outcome.feedback.phase_id);
            break;
        }

        if !single {
            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => {}
                _ = cancel.cancelled() => {
                    log_info!("[{}] shutdown requested, stopping", task.config.id);
                    break;
                }
            }
            let current = ws.solution_mtime().map_err(|e| e.to_string())?;
            if current == last_seen {
                continue;
            }
            last_seen = current;
        }

        let source = ws.read_solution().map_err(|e| e.to_string())?;
        if source.trim().is_empty() {
            if single {
                break;
            }
            continue;
        }

        let phase_before = session.current_phase_id();
        let outcome = session
            .submit_attempt(
                &source,
                &task.config.interface.function_name,
                &task.config.interface.allowed_imports,
                &registry,
                &task.tests,
                timeout,
            )
            .map_err(|e| e.to_string())?;

        log_info!(
            "[{}] attempt {} (phase {}): {:?}, coverage {:.2}",
            task.config.id,
            outcome.feedback.attempt_id,
            outcome.feedback.phase_id,
            outcome.feedback.status,
            outcome.feedback.summary.coverage
        );
        // A `failure_reason` means this outcome came from the attempt-cap
        // check rather than a real evaluation (no sandbox invocation ran);
        // it must not inflate the phase's recorded attempt count.
        if outcome.failure_reason.is_none() {
            metrics.record_attempt(outcome.feedback.phase_id, outcome.feedback.summary.coverage);
        }
        ws.write_feedback(&outcome.feedback).map_err(|e| e.to_string())?;

        for implicit in &outcome.implicit_feedback {
            metrics.record_attempt(implicit.phase_id, implicit.summary.coverage);
        }

        let phase_after = session.current_phase_id();
        if phase_after != phase_before {
            metrics.complete_phase(phase_before);
            for implicit in &outcome.implicit_feedback[..outcome.implicit_feedback.len().saturating_sub(1)] {
                metrics.complete_phase(implicit.phase_id);
            }
            let last_implicit = outcome.implicit_feedback.last().cloned();
            ws.write_phase_info(
                &task.config.id,
                phase_after,
                &session.current_phase().rules,
                true,
                Some(outcome.feedback.clone()),
                last_implicit,
            )
            .map_err(|e| e.to_string())?;
        }

        match outcome.status {
            SessionStatus::InProgress => {}
            SessionStatus::Completed => {
                metrics.complete_phase(phase_after);
                break;
            }
            SessionStatus::Failed => {
                metrics.fail_phase(phase_after);
                break;
            }
        }

        if single {
            break;
        }
    }

    let report = metrics.generate_report();
    ws.write_report(&report).map_err(|e| e.to_string())?;
    log_info!("[{}] session ended: {:?}", task.config.id, report.overall.status);

    Ok(())
}

fn handle_list(tasks_dir: &Path, json: bool) -> Result<(), String> {
    let mut entries: Vec<LoadedTask> = Vec::new();
    let read_dir = std::fs::read_dir(tasks_dir).map_err(|e| format!("cannot read {}: {}", tasks_dir.display(), e))?;

    for entry in read_dir {
        let entry = entry.map_err(|e| e.to_string())?;
        if !entry.path().is_dir() {
            continue;
        }
        match load_task(&entry.path()) {
            Ok(task) => entries.push(task),
            Err(e) => log_info!("skipping {}: {}", entry.path().display(), e),
        }
    }

    entries.sort_by(|a, b| a.config.id.cmp(&b.config.id));

    if json {
        let summaries: Vec<_> = entries
            .iter()
            .map(|t| {
                serde_json::json!({
                    "id": t.config.id,
                    "name": t.config.name,
                    "difficulty": t.config.difficulty.to_string(),
                    "phases": t.config.phases.len(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&summaries).map_err(|e| e.to_string())?);
    } else {
        for task in &entries {
            println!(
                "{:<20} {:<30} {:<8} {} phase(s)",
                task.config.id,
                task.config.name,
                task.config.difficulty,
                task.config.phases.len()
            );
        }
    }

    Ok(())
}

fn handle_validate(task_dir: &Path) -> Result<(), String> {
    let task = load_task(task_dir).map_err(|e| e.to_string())?;
    let warnings = collect_warnings(&task);

    println!(
        "task '{}' loaded: {} phase(s), {} test case(s)",
        task.config.id,
        task.config.phases.len(),
        task.tests.len()
    );
    if warnings.is_empty() {
        println!("no warnings");
    } else {
        for warning in &warnings {
            println!("warning: {}", warning);
        }
    }

    Ok(())
}
