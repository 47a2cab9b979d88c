use clap::Args;

use sheetlink_core::api::JobsApi;

use super::{GlobalOpts, connect, load_config};

#[derive(Args, Debug)]
pub struct CancelPreviewArgs {
    /// Preview id returned by `sheetlink preview`
    pub preview_id: String,
}

pub async fn run(args: CancelPreviewArgs, globals: &GlobalOpts) -> anyhow::Result<()> {
    let config = load_config(globals)?;
    let api = connect(&config)?;
    api.cancel_preview(&args.preview_id).await?;
    if !globals.quiet {
        println!("Preview {} cancelled", args.preview_id);
    }
    Ok(())
}
