use std::path::PathBuf;

use clap::Parser;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "sheetlink",
    version,
    about = "Discover relationships between columns across spreadsheet files"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file (default: ./sheetlink.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend REST base URL, overrides config and environment
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Backend WebSocket base URL, overrides config and environment
    #[arg(long, global = true)]
    ws_url: Option<String>,
}

/// Classify an error into a process exit code.
///
/// Exit codes:
///   0  success
///   1  general/unknown error
///   2  configuration error
///   3  file validation failed
///   5  backend API or WebSocket error
///   6  analysis job failed
fn classify_exit_code(err: &anyhow::Error) -> i32 {
    let msg = format!("{err:#}");
    let lower = msg.to_lowercase();

    if lower.contains("file validation failed") {
        3 // rejected before upload
    } else if lower.contains("analysis job failed") {
        6 // job failed
    } else if lower.contains("api error")
        || lower.contains("backend api")
        || lower.contains("websocket")
        || lower.contains("network error")
        || lower.contains("timed out")
    {
        5 // backend unreachable or refused
    } else if lower.contains("config") {
        2 // config error
    } else {
        1 // general error
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (_, 0) => "warn",
        (_, 1) => "info",
        (_, 2) => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let globals = commands::GlobalOpts {
        quiet: cli.quiet,
        config: cli.config,
        api_url: cli.api_url,
        ws_url: cli.ws_url,
    };

    // Run the selected command
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: Failed to create runtime: {e}");
            std::process::exit(1);
        }
    };

    match runtime.block_on(commands::run(cli.command, globals)) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(classify_exit_code(&e));
        }
    }
}
