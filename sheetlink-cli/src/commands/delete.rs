use clap::Args;

use sheetlink_core::api::JobsApi;

use super::{GlobalOpts, connect, load_config};

#[derive(Args, Debug)]
pub struct DeleteArgs {
    pub job_id: String,
}

pub async fn run(args: DeleteArgs, globals: &GlobalOpts) -> anyhow::Result<()> {
    let config = load_config(globals)?;
    let api = connect(&config)?;
    let response = api.delete_job(&args.job_id).await?;
    tracing::debug!(%response, "Delete acknowledged");
    if !globals.quiet {
        println!("Job {} deleted", args.job_id);
    }
    Ok(())
}
