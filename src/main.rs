use anyhow::Result;
use casebatch::{
    config::Layout,
    context::RunContext,
    interrupt::{watch_interrupts, FORCED_EXIT_CODE},
    ops::Operation,
};
use clap::Parser;
use std::{path::PathBuf, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Bulk request runner for the case API")]
struct Args {
    /// Directory holding config/, data/, answers/, templates/ and logs/
    #[arg(long, global = true, default_value = ".")]
    base_path: PathBuf,
    /// Environment name from config/env.yaml
    #[arg(long, global = true, default_value = "staging")]
    env: String,
    /// Per-request timeout
    #[arg(long, global = true, default_value_t = 60)]
    timeout_secs: u64,
    /// Debug-level logging for this crate
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    operation: Operation,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // ─── 1) init logging ─────────────────────────────────────────────
    let default = if args.verbose {
        "info,casebatch=debug"
    } else {
        "info"
    };
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt::Subscriber::builder().with_env_filter(env).init();
    info!(operation = args.operation.name(), base = %args.base_path.display(), "startup");

    // ─── 2) ctrl-c cancels the run, a second one quits ──────────────
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, trigger).await {
            std::process::exit(FORCED_EXIT_CODE);
        }
    });

    // ─── 3) authenticate once ────────────────────────────────────────
    let layout = Layout::new(&args.base_path);
    let ctx = RunContext::connect(
        layout,
        &args.env,
        Duration::from_secs(args.timeout_secs),
        cancel,
    )
    .await
    .inspect_err(|e| error!(error = %e, "setup failed"))?;

    // ─── 4) dispatch ─────────────────────────────────────────────────
    let state = args.operation.run(&ctx).await?;
    info!(
        total = state.total(),
        skipped = state.skipped.len(),
        "done"
    );
    Ok(())
}
