#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Runtime plumbing shared by data blocks.
//!
//! Reads the task parameters and job mode from the environment, manages the
//! `input/`, `output/` and `quicklooks/` data directories, and loads/saves the
//! `GeoJSON` result manifest (`data.json`).
//!
//! # Environment Variables
//!
//! | Variable | Required | Description |
//! |---|---|---|
//! | `UP42_TASK_PARAMETERS` | No | JSON object with the task query (default `{}`) |
//! | `UP42_JOB_MODE` | No | `DEFAULT` or `DRY_RUN` (default `DEFAULT`) |
//! | `RUST_LOG` | No | Log filter (default `debug`) |

pub mod metadata;
pub mod params;
pub mod paths;

pub use metadata::{load_metadata, save_metadata};
pub use params::{BlockMode, block_mode, load_params, load_query};
pub use paths::BlockPaths;

use aspectum_stac::QueryError;

/// Errors that can occur in the block runtime.
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
    /// The task parameters are not a JSON object.
    #[error("Invalid task parameters: {0}")]
    Params(#[source] serde_json::Error),

    /// The task parameters do not form a valid query.
    #[error("Invalid query: {0}")]
    Query(#[from] QueryError),

    /// The result manifest could not be read or written as `GeoJSON`.
    #[error("Invalid metadata at {path}: {source}")]
    Metadata {
        /// Manifest path.
        path: String,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// I/O error on the data directories.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Initializes the global `pretty_env_logger` logger.
///
/// Logs at `debug` unless `RUST_LOG` says otherwise. Does nothing if a logger
/// is already installed (e.g., in tests).
pub fn init_logger() {
    pretty_env_logger::formatted_timed_builder()
        .filter_level(log::LevelFilter::Debug)
        .parse_env("RUST_LOG")
        .try_init()
        .ok();
}
