use clap::Args;

use sheetlink_core::api::JobsApi;
use sheetlink_core::format::format_percentage;
use sheetlink_core::types::{JobProgress, JobStage, JobStatus};

use super::{GlobalOpts, connect, load_config};

#[derive(Args, Debug)]
pub struct StatusArgs {
    pub job_id: String,

    /// Print the raw status document as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: StatusArgs, globals: &GlobalOpts) -> anyhow::Result<()> {
    let config = load_config(globals)?;
    let api = connect(&config)?;
    let status = api.job_status(&args.job_id).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print!("{}", render_status(&args.job_id, &status));
    }
    Ok(())
}

fn render_status(job_id: &str, status: &JobProgress) -> String {
    let mut out = format!(
        "Job {job_id}: {}\n",
        status.status.as_ref().map_or("unknown", JobStatus::as_str)
    );
    out.push_str(&format!(
        "  Progress: {}\n",
        format_percentage(status.progress_percent, 0)
    ));
    if let Some(stage) = &status.current_stage {
        out.push_str(&format!("  Stage:    {}\n", stage_line(stage)));
    }
    if let Some(message) = &status.message {
        out.push_str(&format!("  Message:  {message}\n"));
    }
    if let Some(count) = status.relationships_found {
        out.push_str(&format!("  Found:    {count} relationship(s)\n"));
    }
    if let Some(error) = &status.error {
        out.push_str(&format!("  Error:    {error}\n"));
    }
    out
}

fn stage_line(stage: &JobStage) -> String {
    match stage.ordinal() {
        Some(n) => format!("{n}/{} {}", JobStage::COUNT, stage.message()),
        None => stage.message().to_string(),
    }
}
