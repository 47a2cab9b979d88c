use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use sheetlink_core::api::JobsApi;
use sheetlink_core::session::AnalysisSession;
use sheetlink_core::store::PreviewStore;

use super::{
    GlobalOpts, collect_files, connect, display, export_report, follow_job, load_config, reporter,
};

#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// Spreadsheet files to check for duplicate columns
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Flip the deletion mark of a column, as FILE_ID:COLUMN (repeatable)
    #[arg(long = "toggle", value_name = "FILE_ID:COLUMN")]
    pub toggles: Vec<String>,

    /// Keep every column, ignoring the recommended deletions
    #[arg(long)]
    pub keep_all: bool,

    /// Confirm the selections and start the analysis job
    #[arg(long)]
    pub confirm: bool,

    /// With --confirm, print the job id and return without waiting
    #[arg(long)]
    pub no_watch: bool,

    /// With --confirm, write the full JSON report into this directory
    #[arg(long, value_name = "DIR")]
    pub export: Option<PathBuf>,
}

/// Split `FILE_ID:COLUMN` at the first colon.
fn parse_toggle(raw: &str) -> anyhow::Result<(&str, &str)> {
    match raw.split_once(':') {
        Some((file_id, column)) if !file_id.is_empty() && !column.is_empty() => {
            Ok((file_id, column))
        }
        _ => anyhow::bail!("Invalid --toggle '{raw}': expected FILE_ID:COLUMN"),
    }
}

fn apply_toggles(
    store: &mut PreviewStore,
    keep_all: bool,
    toggles: &[String],
) -> anyhow::Result<()> {
    if keep_all {
        store.clear_selections();
    }
    for raw in toggles {
        let (file_id, column) = parse_toggle(raw)?;
        if !store.files().iter().any(|f| f.file_id == file_id) {
            anyhow::bail!("Invalid --toggle '{raw}': no previewed file with id '{file_id}'");
        }
        store.toggle_column_deletion(file_id, column);
    }
    Ok(())
}

pub async fn run(args: PreviewArgs, globals: &GlobalOpts) -> anyhow::Result<()> {
    let config = load_config(globals)?;
    let files = collect_files(&config, &args.files)?;
    let api = connect(&config)?;
    let progress = reporter(globals);

    let mut session = AnalysisSession::new();
    session.preview.set_loading(true);
    let preview = match api.create_preview(&files, progress.clone()).await {
        Ok(preview) => preview,
        Err(e) => {
            session.preview.set_error(e.to_string());
            return Err(e).context("Preview upload failed");
        }
    };
    session.preview.set_loading(false);
    session.preview.load(preview);
    apply_toggles(&mut session.preview, args.keep_all, &args.toggles)?;
    print!("{}", display::render_preview(&session.preview)?);

    let preview_id = session
        .preview
        .preview_id()
        .context("Preview response carried no id")?
        .to_string();
    if !args.confirm {
        if !globals.quiet {
            eprintln!("Preview {preview_id} is pending. Re-run with --confirm to analyze,");
            eprintln!("or discard it with: sheetlink cancel-preview {preview_id}");
        }
        return Ok(());
    }

    let confirmed = api
        .confirm_preview(&preview_id, &session.preview.confirm_payload())
        .await?;
    tracing::info!(
        job_id = %confirmed.job_id,
        removed = ?confirmed.columns_removed,
        "Preview confirmed"
    );
    let job_id = confirmed.job_id.clone();
    session.begin_upload(&files);
    session.begin_job(sheetlink_core::types::CreateJobResponse {
        job_id: confirmed.job_id,
        status: confirmed.status,
        ..Default::default()
    });
    session.preview.reset();

    if !globals.quiet {
        eprintln!("Job {job_id} started");
    }
    if args.no_watch {
        println!("{job_id}");
        return Ok(());
    }

    follow_job(&api, &config, &mut session, &job_id, progress.as_ref()).await?;
    print!("{}", display::render_text(&session.graph)?);
    if let Some(dir) = &args.export {
        export_report(&session, dir, false)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetlink_core::types::PreviewResponse;

    fn store() -> PreviewStore {
        let preview: PreviewResponse = serde_json::from_value(serde_json::json!({
            "preview_id": "pv_1",
            "files": [{
                "file_id": "f1",
                "duplicate_groups": [{
                    "columns": ["a", "a_1"],
                    "metadata": {"content_identical": [true, true]}
                }]
            }]
        }))
        .unwrap();
        let mut store = PreviewStore::new();
        store.load(preview);
        store
    }

    #[test]
    fn toggle_splits_at_first_colon() {
        assert_eq!(parse_toggle("f1:time:utc").unwrap(), ("f1", "time:utc"));
        assert!(parse_toggle("f1").is_err());
        assert!(parse_toggle(":col").is_err());
        assert!(parse_toggle("f1:").is_err());
    }

    #[test]
    fn toggles_flip_recommended_marks() {
        let mut store = store();
        assert!(store.is_marked("f1", "a_1"));
        apply_toggles(&mut store, false, &["f1:a_1".into(), "f1:a".into()]).unwrap();
        assert!(!store.is_marked("f1", "a_1"));
        assert!(store.is_marked("f1", "a"));
    }

    #[test]
    fn keep_all_clears_before_toggles() {
        let mut store = store();
        apply_toggles(&mut store, true, &[]).unwrap();
        assert_eq!(store.total_columns_to_delete(), 0);
    }

    #[test]
    fn unknown_file_is_rejected() {
        let mut store = store();
        let err = apply_toggles(&mut store, false, &["f9:a".into()]).unwrap_err();
        assert!(err.to_string().contains("no previewed file"));
    }
}
