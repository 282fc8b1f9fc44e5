use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use granary::archive::ArchiveOptions;
use granary::config::Config;
use granary::pipeline::Pipeline;
use granary::source::KafkaSource;
use granary::store::S3Store;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("load configuration from {}", args.config.display()))?;

    info!(
        "starting granary: {} topic(s), bucket {}",
        config.broker.topics.len(),
        config.store.bucket
    );

    let store = Arc::new(S3Store::connect(&config.store).context("connect object store")?);
    let mut source = KafkaSource::connect(&config.broker).context("connect broker")?;

    let options = ArchiveOptions {
        prefix: config.store.prefix.clone(),
        retain_raw: config.spool.retain_raw,
    };
    let pipeline = Pipeline::build(
        &config.stream_specs(),
        &config.spool.dir,
        options,
        store,
        config.poll_timeout(),
    )
    .context("build pipeline")?;

    // Runs until the process is stopped; rotated-but-unfinalized segments
    // left on disk are an operator recovery concern.
    pipeline.run(&mut source);
    pipeline.shutdown().context("shutdown pipeline")?;
    Ok(())
}
