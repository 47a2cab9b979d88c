pub mod analyze;
pub mod cancel_preview;
pub mod check;
pub mod delete;
pub mod display;
pub mod preview;
pub mod result;
pub mod status;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Subcommand;

use sheetlink_core::api::{ApiClient, JobsApi};
use sheetlink_core::config::SheetlinkConfig;
use sheetlink_core::error::ValidationError;
use sheetlink_core::monitor::JobMonitor;
use sheetlink_core::progress::{IndicatifReporter, ProgressReporter};
use sheetlink_core::session::AnalysisSession;
use sheetlink_core::types::JobStatus;
use sheetlink_core::validate::{FileCandidate, validate_upload};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload files, follow the analysis, and print the relationship graph
    Analyze(analyze::AnalyzeArgs),
    /// Upload files for a duplicate-column preview, optionally confirm it
    Preview(preview::PreviewArgs),
    /// Discard a pending preview on the server
    CancelPreview(cancel_preview::CancelPreviewArgs),
    /// Show the current status of a job
    Status(status::StatusArgs),
    /// Follow a running job until it finishes
    Watch(watch::WatchArgs),
    /// Delete a job on the server
    Delete(delete::DeleteArgs),
    /// Show, filter, or export a completed result
    Result(result::ResultArgs),
    /// Check a result document offline and summarize its graph
    Check(check::CheckArgs),
}

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOpts {
    pub quiet: bool,
    pub config: Option<PathBuf>,
    pub api_url: Option<String>,
    pub ws_url: Option<String>,
}

pub async fn run(cmd: Command, globals: GlobalOpts) -> anyhow::Result<()> {
    match cmd {
        Command::Analyze(args) => analyze::run(args, &globals).await,
        Command::Preview(args) => preview::run(args, &globals).await,
        Command::CancelPreview(args) => cancel_preview::run(args, &globals).await,
        Command::Status(args) => status::run(args, &globals).await,
        Command::Watch(args) => watch::run(args, &globals).await,
        Command::Delete(args) => delete::run(args, &globals).await,
        Command::Result(args) => result::run(args, &globals).await,
        Command::Check(args) => check::run(&args),
    }
}

/// Defaults, then the config file, then `SHEETLINK_*` variables, then flags.
pub fn load_config(globals: &GlobalOpts) -> anyhow::Result<SheetlinkConfig> {
    let mut config = SheetlinkConfig::load(globals.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok())?;
    if let Some(url) = &globals.api_url {
        config.server.api_base_url.clone_from(url);
    }
    if let Some(url) = &globals.ws_url {
        config.server.ws_base_url.clone_from(url);
    }
    config.validate()?;
    Ok(config)
}

pub fn connect(config: &SheetlinkConfig) -> anyhow::Result<ApiClient> {
    Ok(ApiClient::new(config)?)
}

pub fn reporter(globals: &GlobalOpts) -> Arc<dyn ProgressReporter> {
    if globals.quiet {
        Arc::new(IndicatifReporter::hidden())
    } else {
        Arc::new(IndicatifReporter::new())
    }
}

/// Stat every path and run the upload checks. Unreadable paths are
/// reported with the other validation failures.
pub fn collect_files(
    config: &SheetlinkConfig,
    paths: &[PathBuf],
) -> anyhow::Result<Vec<FileCandidate>> {
    let mut files = Vec::with_capacity(paths.len());
    let mut unreadable = Vec::new();
    for path in paths {
        match FileCandidate::from_path(path) {
            Ok(file) => files.push(file),
            Err(e) => unreadable.push(format!("File '{}' cannot be read: {e}", path.display())),
        }
    }
    if !unreadable.is_empty() {
        return Err(ValidationError::Rejected(unreadable).into());
    }
    Ok(validate_upload(&config.upload, &files)?)
}

/// Monitor `job_id` to completion, then fetch and load its result.
///
/// A failed job is an error.
pub async fn follow_job(
    api: &ApiClient,
    config: &SheetlinkConfig,
    session: &mut AnalysisSession,
    job_id: &str,
    reporter: &dyn ProgressReporter,
) -> anyhow::Result<()> {
    let stats = JobMonitor::new(api, config, job_id)
        .run(job_id, &mut session.job, reporter)
        .await;
    tracing::debug!(?stats, "Monitoring finished");

    let job = session
        .job
        .current()
        .context("Job state missing after monitoring")?;
    if job.status == JobStatus::Failed {
        anyhow::bail!(
            "Analysis job failed: {job_id}: {}",
            job.error.as_deref().unwrap_or("no error reported")
        );
    }

    let document = api
        .job_result(job_id)
        .await
        .with_context(|| format!("Cannot fetch result for job {job_id}"))?;
    session.load_result(&document)?;
    Ok(())
}

pub fn export_report(
    session: &AnalysisSession,
    dir: &Path,
    filtered: bool,
) -> anyhow::Result<()> {
    let path = session
        .export(dir, filtered, chrono::Utc::now())
        .with_context(|| format!("Cannot export report to {}", dir.display()))?;
    println!("Report written to {}", path.display());
    Ok(())
}
