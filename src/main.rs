use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sdg_utils::args::Args;
use sdg_utils::build::{BuildConfig, VideoBuilder};
use sdg_utils::dispatch::Dispatcher;
use sdg_utils::encoder::EncoderSettings;
use sdg_utils::upload::S3Uploader;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .init();
}

fn run() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::from_env();
    init_logging();

    let opts = args.options();

    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let mut config = BuildConfig::in_dir(&cwd);
    config.encoder = EncoderSettings::with_program(&args.encoder);

    // The storage client is only built once the build step is done
    let dispatcher = Dispatcher::new(VideoBuilder::new(config));
    let report = dispatcher.run(&opts, S3Uploader::from_env)?;

    info!("Run complete: {}", report.summary());

    if let Some(path) = &args.report {
        report.write_json(path)?;
        info!("Report written to {}", path.display());
    }

    Ok(())
}
