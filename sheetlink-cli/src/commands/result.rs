use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use sheetlink_core::api::JobsApi;
use sheetlink_core::session::AnalysisSession;
use sheetlink_graph::ConfidenceLevel;

use super::{GlobalOpts, connect, display, export_report, load_config};

#[derive(Args, Debug)]
pub struct ResultArgs {
    /// Job whose result to fetch from the backend
    #[arg(required_unless_present = "input", conflicts_with = "input")]
    pub job_id: Option<String>,

    /// Read the result document from a JSON file instead
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Hide relationships of this confidence level (repeatable)
    #[arg(long = "hide", value_name = "LEVEL")]
    pub hide: Vec<ConfidenceLevel>,

    /// Graph output format
    #[arg(long, value_enum, default_value_t = display::OutputFormat::Text)]
    pub format: display::OutputFormat,

    /// Write a JSON report into this directory
    #[arg(long, value_name = "DIR")]
    pub export: Option<PathBuf>,

    /// Export every relationship, not only the visible ones
    #[arg(long, requires = "export")]
    pub full: bool,
}

pub async fn run(args: ResultArgs, globals: &GlobalOpts) -> anyhow::Result<()> {
    let document = match (&args.input, &args.job_id) {
        (Some(path), _) => read_document(path)?,
        (None, Some(job_id)) => {
            let config = load_config(globals)?;
            let api = connect(&config)?;
            api.job_result(job_id)
                .await
                .with_context(|| format!("Cannot fetch result for job {job_id}"))?
        }
        (None, None) => anyhow::bail!("Either a job id or --input is required"),
    };

    let mut session = AnalysisSession::new();
    let report = session.load_result(&document)?;
    if !report.is_valid() && !globals.quiet {
        eprintln!(
            "Warning: result has {} shape warning(s); run `sheetlink check` for details",
            report.summary.warning_count
        );
    }
    hide_levels(&mut session, &args.hide);

    print!("{}", display::render(&session.graph, args.format)?);
    if let Some(dir) = &args.export {
        export_report(&session, dir, !args.full)?;
    }
    Ok(())
}

pub(super) fn read_document(path: &std::path::Path) -> anyhow::Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn hide_levels(session: &mut AnalysisSession, levels: &[ConfidenceLevel]) {
    for &level in levels {
        session.graph.set_level_visible(level, false);
    }
}
