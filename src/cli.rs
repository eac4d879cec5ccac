use crate::{Config, PublishError};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "warc-publisher")]
#[command(about = "Publish a WARC capture as a static website on S3")]
#[command(version)]
pub struct Cli {
    #[arg(long, help = "The input WARC to use")]
    pub input: Option<PathBuf>,

    #[arg(long, help = "The S3 bucket to upload to")]
    pub bucket: Option<String>,

    #[arg(long, help = "The number of concurrent uploads to S3 [default: 16]")]
    pub concurrency: Option<usize>,

    #[arg(long, help = "Add a warning banner to the top of every HTML page")]
    pub add_banner: bool,

    #[arg(long, help = "Transactions buffered between reader and uploaders [default: 100]")]
    pub queue_capacity: Option<usize>,

    #[arg(long, help = "Configuration file path (JSON)")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Enable verbose logging")]
    pub verbose: bool,
}

impl Cli {
    /// Build the run configuration: file (if any), then flags on top.
    pub fn load_config(&self) -> Result<Config, PublishError> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(input) = &self.input {
            config.input = Some(input.clone());
        }

        if let Some(bucket) = &self.bucket {
            config.bucket = Some(bucket.clone());
        }

        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }

        if let Some(queue_capacity) = self.queue_capacity {
            config.queue_capacity = queue_capacity;
        }

        if self.add_banner {
            config.add_banner = true;
        }

        config.validate()?;
        Ok(config)
    }
}

pub fn setup_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
}
