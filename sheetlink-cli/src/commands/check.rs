use std::path::PathBuf;

use clap::Args;

use sheetlink_core::response_check::check_response;
use sheetlink_core::session::AnalysisSession;

use super::display;
use super::result::read_document;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Result document to check (envelope or bare result)
    pub input: PathBuf,
}

/// Shape warnings never fail the command; only unreadable or undecodable
/// documents do.
pub fn run(args: &CheckArgs) -> anyhow::Result<()> {
    let document = read_document(&args.input)?;
    let report = check_response(&document);
    print!("{}", display::render_check_report(&report)?);

    let mut session = AnalysisSession::new();
    session.load_result(&document)?;
    let model = session.graph.model();
    println!(
        "Graph: {} nodes, {} edges, {} not placed",
        model.nodes.len(),
        model.edges.len(),
        model.dropped.len()
    );
    for dropped in &model.dropped {
        println!(
            "  #{} {}: {}",
            dropped.index,
            dropped.relationship_id.as_deref().unwrap_or("-"),
            dropped.reason
        );
    }
    Ok(())
}
