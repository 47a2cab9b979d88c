use std::path::PathBuf;

use clap::Args;

use sheetlink_core::api::JobsApi;
use sheetlink_core::session::AnalysisSession;

use super::{
    GlobalOpts, collect_files, connect, display, export_report, follow_job, load_config, reporter,
};

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Spreadsheet files to analyze (.xlsx, .xls, .csv)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Print the job id and return without waiting for the result
    #[arg(long)]
    pub no_watch: bool,

    /// Write the full JSON report into this directory
    #[arg(long, value_name = "DIR")]
    pub export: Option<PathBuf>,

    /// Graph output format
    #[arg(long, value_enum, default_value_t = display::OutputFormat::Text)]
    pub format: display::OutputFormat,
}

pub async fn run(args: AnalyzeArgs, globals: &GlobalOpts) -> anyhow::Result<()> {
    let config = load_config(globals)?;
    let files = collect_files(&config, &args.files)?;
    let api = connect(&config)?;
    let progress = reporter(globals);

    let mut session = AnalysisSession::new();
    session.begin_upload(&files);
    let created = api.create_job(&files, progress.clone()).await?;
    let job_id = created.job_id.clone();
    session.begin_job(created);

    if !globals.quiet {
        eprintln!("Job {job_id} created for {} file(s)", files.len());
    }
    if args.no_watch {
        println!("{job_id}");
        if !globals.quiet {
            eprintln!("Follow it with: sheetlink watch {job_id}");
        }
        return Ok(());
    }

    follow_job(&api, &config, &mut session, &job_id, progress.as_ref()).await?;
    print!("{}", display::render(&session.graph, args.format)?);

    if let Some(dir) = &args.export {
        export_report(&session, dir, false)?;
    }
    Ok(())
}
