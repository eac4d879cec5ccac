use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::{info, warn};
use warc_publisher::{publish_archive, setup_logging, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    setup_logging(args.verbose).map_err(|e| anyhow!("failed to initialise logging: {e}"))?;

    info!("Starting warc-publisher v{}", env!("CARGO_PKG_VERSION"));

    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            e.log("Invalid configuration");
            std::process::exit(1);
        }
    };

    let stats = match publish_archive(config).await {
        Ok(stats) => stats,
        Err(e) => {
            e.log("Publishing failed");
            std::process::exit(1);
        }
    };

    if !stats.stream_end.as_ref().is_some_and(|end| end.is_clean()) {
        warn!("Archive was not read to the end; later records were not published");
    }
    info!("Finished publishing. {}", stats);

    Ok(())
}
