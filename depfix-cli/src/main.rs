mod config;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use config::{ConfigMerger, RunFlags};
use depfix_core::adapters::ShellVcsPort;
use depfix_core::ports::VcsPort;
use depfix_core::settings::ReasoningBackend;
use depfix_core::{Checkpoint, RunOutcome, Workflow, WorkflowSettings};
use depfix_render::{render_changelog_md, render_summary_text};
use depfix_types::result::PipelineResult;
use depfix_types::stage::StageRecord;
use fs_err as fs;
use serde::Serialize;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Directory (under the repository root) for run artifacts.
const DEFAULT_OUT_DIR: &str = ".depfix";

#[derive(Debug, Parser)]
#[command(
    name = "depfix",
    version,
    about = "Detect, fix, apply and test upgrades for Python codebases."
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). Overrides RUST_LOG.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the full pipeline on a repository.
    Run(RunArgs),
    /// Continue an interrupted run from its saved checkpoint.
    Resume(ResumeArgs),
}

#[derive(Debug, Parser)]
struct RunArgs {
    /// Repository root (default: current directory).
    #[arg(long, default_value = ".")]
    repo_root: Utf8PathBuf,

    /// Output directory for depfix artifacts (default: <repo_root>/.depfix).
    #[arg(long)]
    out_dir: Option<Utf8PathBuf>,

    /// Config file (default: <repo_root>/depfix.toml when present).
    #[arg(long)]
    config: Option<Utf8PathBuf>,

    /// Compute fixes and diffs but write no derived files.
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Skip the Test stage.
    #[arg(long, default_value_t = false)]
    no_tests: bool,

    /// Commit and push the derived files after a successful run.
    #[arg(long, default_value_t = false)]
    create_pr: bool,

    /// Do not pull from the remote before analyzing.
    #[arg(long, default_value_t = false)]
    no_pull: bool,

    /// Reasoning backend.
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    /// Maximum concurrent reasoning calls.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Per-call timeout in seconds for every collaborator.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Parser)]
struct ResumeArgs {
    /// Checkpoint written by an earlier run (usually <out_dir>/state.json).
    #[arg(long)]
    checkpoint: Utf8PathBuf,

    /// Repository root (default: the one recorded in the checkpoint).
    #[arg(long)]
    repo_root: Option<Utf8PathBuf>,

    /// Output directory for depfix artifacts (default: <repo_root>/.depfix).
    #[arg(long)]
    out_dir: Option<Utf8PathBuf>,

    /// Config file (default: <repo_root>/depfix.toml when present).
    #[arg(long)]
    config: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum BackendArg {
    Rules,
    Http,
}

impl From<BackendArg> for ReasoningBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Rules => ReasoningBackend::Rules,
            BackendArg::Http => ReasoningBackend::Http,
        }
    }
}

/// `result.json`: the pipeline result plus run metadata.
#[derive(Debug, Serialize)]
struct RunReport<'a> {
    schema: &'static str,
    tool: ToolInfo,
    run_id: Uuid,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    reached: String,
    result: &'a PipelineResult,
    stages: &'a [StageRecord],
}

#[derive(Debug, Serialize)]
struct ToolInfo {
    name: &'static str,
    version: &'static str,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match real_main(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:?}", e);
            ExitCode::from(1)
        }
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::from_default_env(),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn real_main(cli: Cli) -> anyhow::Result<ExitCode> {
    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    match cli.cmd {
        Command::Run(args) => cmd_run(args, cancel).await,
        Command::Resume(args) => cmd_resume(args, cancel).await,
    }
}

/// First Ctrl-C cancels the run at the next safe point; artifacts are still written.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after in-flight work");
            cancel.cancel();
        }
    });
}

async fn cmd_run(args: RunArgs, cancel: CancellationToken) -> anyhow::Result<ExitCode> {
    let repo_root = args.repo_root;
    let file_config = config::load_or_default(&repo_root, args.config.as_deref())
        .context("load depfix.toml config")?;
    let flags = RunFlags {
        dry_run: args.dry_run,
        no_tests: args.no_tests,
        create_pr: args.create_pr,
        no_pull: args.no_pull,
        backend: args.backend.map(Into::into),
        concurrency: args.concurrency,
        call_timeout_secs: args.timeout_secs,
    };
    let settings = ConfigMerger::new(file_config).merge_run_args(&repo_root, &flags);
    debug!(
        "merged config: options={:?}, backend={:?}, concurrency={}, timeout={:?}",
        settings.options, settings.reasoning.backend, settings.concurrency, settings.call_timeout
    );

    let out_dir = args
        .out_dir
        .unwrap_or_else(|| repo_root.join(DEFAULT_OUT_DIR));
    let workflow = Workflow::from_settings(settings).context("set up workflow")?;

    let started_at = Utc::now();
    let outcome = workflow.run(cancel).await;
    finish(workflow.settings(), &out_dir, started_at, outcome).await
}

async fn cmd_resume(args: ResumeArgs, cancel: CancellationToken) -> anyhow::Result<ExitCode> {
    let raw = fs::read_to_string(&args.checkpoint)
        .with_context(|| format!("read {}", args.checkpoint))?;
    let checkpoint: Checkpoint = serde_json::from_str(&raw)
        .with_context(|| format!("parse checkpoint {}", args.checkpoint))?;

    let repo_root = args
        .repo_root
        .unwrap_or_else(|| checkpoint.state.repository_path.clone());
    let file_config = config::load_or_default(&repo_root, args.config.as_deref())
        .context("load depfix.toml config")?;
    let mut settings = ConfigMerger::new(file_config).merge_run_args(&repo_root, &RunFlags::default());
    // The interrupted run's options stay in force.
    settings.options = checkpoint.options;

    let out_dir = args
        .out_dir
        .unwrap_or_else(|| repo_root.join(DEFAULT_OUT_DIR));
    let workflow = Workflow::from_settings(settings).context("set up workflow")?;

    let started_at = Utc::now();
    let outcome = workflow
        .resume(checkpoint, cancel)
        .await
        .context("resume run")?;
    finish(workflow.settings(), &out_dir, started_at, outcome).await
}

/// Write artifacts, run the publish step, print the summary and pick the exit code.
async fn finish(
    settings: &WorkflowSettings,
    out_dir: &Utf8Path,
    started_at: DateTime<Utc>,
    outcome: RunOutcome,
) -> anyhow::Result<ExitCode> {
    write_artifacts(out_dir, started_at, &outcome)?;

    let options = settings.options;
    if options.create_pr {
        if options.dry_run {
            info!("dry run: skipping publish");
        } else if !outcome.result.success {
            warn!("run did not succeed: skipping publish");
        } else {
            publish(settings).await?;
        }
    }

    print!("{}", render_summary_text(&outcome.result));
    if !outcome.completed() {
        println!(
            "\nStopped at {}. Continue with: depfix resume --checkpoint {}",
            outcome.reached,
            out_dir.join("state.json")
        );
    }

    Ok(if outcome.result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

fn write_artifacts(
    out_dir: &Utf8Path,
    started_at: DateTime<Utc>,
    outcome: &RunOutcome,
) -> anyhow::Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("create {}", out_dir))?;
    // Keep artifacts out of `git add --all` during publish.
    fs::write(out_dir.join(".gitignore"), "*\n")
        .with_context(|| format!("write {}", out_dir.join(".gitignore")))?;

    let report = RunReport {
        schema: depfix_types::schema::DEPFIX_RESULT_V1,
        tool: ToolInfo {
            name: "depfix",
            version: env!("CARGO_PKG_VERSION"),
        },
        run_id: outcome.run_id,
        started_at,
        ended_at: Utc::now(),
        reached: outcome.reached.to_string(),
        result: &outcome.result,
        stages: &outcome.records,
    };
    write_json(&out_dir.join("result.json"), &report)?;
    write_json(&out_dir.join("state.json"), &outcome.checkpoint())?;

    let changelog = render_changelog_md(&outcome.state, &outcome.result, &outcome.records);
    fs::write(out_dir.join("changelog.md"), changelog)
        .with_context(|| format!("write {}", out_dir.join("changelog.md")))?;

    info!("wrote run artifacts to {}", out_dir);
    Ok(())
}

async fn publish(settings: &WorkflowSettings) -> anyhow::Result<()> {
    let vcs = ShellVcsPort::new(&settings.vcs);
    let repo = settings.repository_path.as_path();

    let commit = vcs
        .commit_local_changes(repo)
        .await
        .context("commit derived files")?;
    if !commit.success {
        anyhow::bail!("commit failed: {}", commit.message);
    }
    info!("commit: {}", commit.message);

    let push = vcs.push(repo).await.context("push")?;
    if !push.success {
        anyhow::bail!("push failed: {}", push.message);
    }
    info!(remote = %settings.vcs.remote, branch = %settings.vcs.branch, "pushed");
    Ok(())
}

fn write_json<T: Serialize>(path: &Utf8Path, v: &T) -> anyhow::Result<()> {
    let s = serde_json::to_string_pretty(v).context("serialize json")?;
    fs::write(path, s).with_context(|| format!("write {}", path))?;
    Ok(())
}
