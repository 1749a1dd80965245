// src/main.rs

use clap::CommandFactory;
use inotify_watcher::{cli, logging, run};

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() {
    let args = cli::parse();

    if let Err(err) = cli::ensure_config_readable(&args.config) {
        eprintln!("cannot read config {}: {err}", args.config.display());
        let _ = cli::CliArgs::command().print_help();
        std::process::exit(1);
    }

    if let Err(err) = run_main(args).await {
        eprintln!("inotify-watcher error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main(args: cli::CliArgs) -> anyhow::Result<()> {
    let log = logging::init_logging(args.log_level)?;
    run(args, log).await
}
