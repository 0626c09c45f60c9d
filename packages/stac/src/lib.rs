#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatiotemporal query descriptor for data blocks.
//!
//! A [`StacQuery`] is built once from the untyped task parameters of a block
//! (a JSON object) and validated up front: at most one spatial filter
//! (`bbox`, `intersects` or `contains`), RFC 3339 `time` and `time_series`
//! values, and a non-negative `limit`. Parameters the descriptor does not know
//! about are kept verbatim as extension attributes so block-specific options
//! (`file_name`, `zoom_level`, ...) travel with the query.
//!
//! ```
//! use aspectum_stac::StacQuery;
//!
//! let query: StacQuery = r#"{"bbox": [10.0, 45.0, 10.5, 45.5], "file_name": "scene.tif"}"#
//!     .parse()
//!     .unwrap();
//!
//! assert_eq!(query.limit(), 1);
//! assert_eq!(query.bounds().unwrap().to_array(), [10.0, 45.0, 10.5, 45.5]);
//! assert_eq!(query.extension("file_name").and_then(|v| v.as_str()), Some("scene.tif"));
//! ```

pub mod query;
pub mod spatial;
pub mod temporal;

pub use query::{AcceptAll, QueryValidator, StacQuery};
pub use spatial::{BoundingBox, SpatialFilter};
pub use temporal::{TimeRange, is_valid_temporal, parse_temporal};

/// Errors that can occur while building a [`StacQuery`].
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The caller-supplied validator rejected the raw query.
    #[error(
        "Input query did not pass validation. Please refer to the block \
         documentation for the accepted parameters"
    )]
    Validation,

    /// A structural rule of the query was violated.
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    /// The raw text was not a JSON object.
    #[error("Query is not a valid JSON object: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A structural rule of the query was violated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstructionError {
    /// More than one of `bbox`, `intersects` and `contains` was supplied.
    #[error(
        "Only one of the query parameters bbox, intersects, contains is allowed \
         at a time (got: {})",
        .present.join(", ")
    )]
    ConflictingSpatialFilters {
        /// Names of the spatial parameters that were present.
        present: Vec<&'static str>,
    },

    /// `time` is neither an RFC 3339 timestamp nor a `start/end` range.
    #[error("Invalid time {value:?}: expected an RFC 3339 timestamp or a start/end range")]
    InvalidTime {
        /// The rejected value.
        value: String,
    },

    /// An entry of `time_series` is neither an RFC 3339 timestamp nor a
    /// `start/end` range.
    #[error(
        "Invalid time_series entry {index} ({value:?}): expected an RFC 3339 \
         timestamp or a start/end range"
    )]
    InvalidTimeSeries {
        /// Position of the rejected entry.
        index: usize,
        /// The rejected value.
        value: String,
    },

    /// A parameter had the wrong shape (e.g. a `bbox` with three numbers).
    #[error("Invalid {name} parameter: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

/// `bounds()` or `geometry()` was called on a query without a spatial
/// filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Query does not contain any of the parameters bbox, intersects, contains")]
pub struct MissingSpatialFilterError;
