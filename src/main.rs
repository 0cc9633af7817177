use clap::Parser;

use labelwatch::Settings;
use labelwatch::cli::commands::{init, maintenance, status, watch};
use labelwatch::cli::{Cli, Commands};
use labelwatch::pipeline::RequeueOptions;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Init writes the file; everything else needs it loaded
    if let Commands::Init { force } = cli.command {
        if let Err(e) = init::run_init(force) {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
        return;
    }

    let loaded = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let config = loaded.unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        std::process::exit(2);
    });

    labelwatch::logging::init_with_config(&config.logging, cli.verbose);

    let result = match cli.command {
        Commands::Init { .. } => unreachable!("handled above"),

        Commands::Config => init::run_config(&config),

        Commands::Watch { root, no_scan } => {
            watch::run(watch::WatchArgs { root, no_scan }, config)
                .await
                .map(|summary| {
                    eprintln!(
                        "Stopped: {} processed, {} scheduled for retry, {} stuck, {} failed",
                        summary.count("processed"),
                        summary.count("retry_scheduled"),
                        summary.count("stuck"),
                        summary.count("failed")
                    );
                })
        }

        Commands::Status { json } => status::run(&config, json),

        Commands::Requeue {
            include_stuck,
            dry_run,
        } => maintenance::run_requeue(
            &config,
            RequeueOptions {
                include_stuck,
                dry_run,
            },
        ),

        Commands::Unlock { all } => maintenance::run_unlock(&config, all),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
