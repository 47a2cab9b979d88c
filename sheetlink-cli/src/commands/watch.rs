use std::path::PathBuf;

use clap::Args;

use sheetlink_core::session::AnalysisSession;
use sheetlink_core::types::JobProgress;

use super::{GlobalOpts, connect, display, export_report, follow_job, load_config, reporter};

#[derive(Args, Debug)]
pub struct WatchArgs {
    pub job_id: String,

    /// Write the full JSON report into this directory
    #[arg(long, value_name = "DIR")]
    pub export: Option<PathBuf>,

    /// Graph output format
    #[arg(long, value_enum, default_value_t = display::OutputFormat::Text)]
    pub format: display::OutputFormat,
}

pub async fn run(args: WatchArgs, globals: &GlobalOpts) -> anyhow::Result<()> {
    let config = load_config(globals)?;
    let api = connect(&config)?;
    let progress = reporter(globals);

    let mut session = AnalysisSession::new();
    session.job.set_current_job(JobProgress {
        job_id: Some(args.job_id.clone()),
        ..JobProgress::default()
    });
    follow_job(&api, &config, &mut session, &args.job_id, progress.as_ref()).await?;
    print!("{}", display::render(&session.graph, args.format)?);

    if let Some(dir) = &args.export {
        export_report(&session, dir, false)?;
    }
    Ok(())
}
