#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Block entry point: fetch the scene named by the task parameters from S3.

use std::path::PathBuf;

use aspectum_block::{BlockMode, BlockPaths, paths::DEFAULT_DATA_ROOT};
use aspectum_s3::{ObjectStore, S3Store};
use clap::Parser;

#[derive(Parser)]
#[command(name = "aspectum_fetch", about = "Scene retrieval block")]
struct Cli {
    /// Directory holding the `input/`, `output/` and `quicklooks/` folders
    #[arg(long, default_value = DEFAULT_DATA_ROOT)]
    data_root: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    aspectum_block::init_logger();
    let cli = Cli::parse();

    let paths = BlockPaths::new(cli.data_root);
    let mode = aspectum_block::block_mode();
    log::info!("Running in {mode} mode");

    let store = match mode {
        BlockMode::DryRun => None,
        BlockMode::Default => Some(S3Store::from_env()?),
    };

    let result = aspectum_fetch::run(&paths, store.as_ref().map(|s| s as &dyn ObjectStore)).await?;
    log::info!("Fetched {} scenes", result.features.len());

    Ok(())
}
