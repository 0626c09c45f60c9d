#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Object storage access for scene files.
//!
//! [`ObjectStore`] is the seam the retrieval task talks to: it reports
//! whether an object exists and downloads it to a local file, signalling
//! "not found" with `None` instead of an error. [`S3Store`] implements it on
//! top of the AWS SDK.
//!
//! # Environment Variables
//!
//! | Variable | Required | Description |
//! |---|---|---|
//! | `AWS_ACCESS_KEY` | Yes | S3 access key ID |
//! | `AWS_SECRET_ACCESS_KEY` | Yes | S3 secret access key |
//! | `AWS_REGION` | Yes | Bucket region |
//! | `AWS_BUCKET_NAME` | Yes | Bucket holding the scene files |

use std::path::Path;

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;

/// Variables [`S3Store::from_env`] reads, in order: access key, secret key,
/// region, bucket.
const STORE_ENV: [&str; 4] = [
    "AWS_ACCESS_KEY",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_REGION",
    "AWS_BUCKET_NAME",
];

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Missing or empty required environment variable.
    #[error("Missing environment variable: {name}")]
    MissingEnv {
        /// Name of the missing environment variable.
        name: String,
    },

    /// Reading an object failed for a reason other than a missing object.
    #[error("Failed to download {url}: {source}")]
    Download {
        /// `s3://bucket/key` of the object.
        url: String,
        /// Underlying SDK error.
        source: BoxError,
    },

    /// Querying object metadata failed for a reason other than a missing
    /// object.
    #[error("Failed to head {url}: {source}")]
    Head {
        /// `s3://bucket/key` of the object.
        url: String,
        /// Underlying SDK error.
        source: BoxError,
    },

    /// I/O error writing the local file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Remote object metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Content length in bytes.
    pub size: u64,
}

/// Read access to an object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetches object metadata. Returns `None` if the object doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Head`] if the store cannot be queried.
    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StorageError>;

    /// Downloads an object to `local_path`, returning the number of bytes
    /// written. Returns `None` (and writes nothing) if the object doesn't
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Download`] on store failures,
    /// [`StorageError::Io`] on local filesystem errors.
    async fn download(&self, key: &str, local_path: &Path) -> Result<Option<u64>, StorageError>;
}

/// S3 bucket client.
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Store {
    /// Creates a client for `bucket` from an existing SDK client.
    #[must_use]
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Creates a client from the variables listed in the crate docs.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::MissingEnv`] naming the first variable that is
    /// unset or empty.
    pub fn from_env() -> Result<Self, StorageError> {
        let [access_key, secret_key, region, bucket] = STORE_ENV.map(env_var);
        let credentials = Credentials::new(access_key?, secret_key?, None, None, "block-env");

        let config = aws_sdk_s3::Config::builder()
            .region(Region::new(region?))
            .credentials_provider(credentials)
            .build();

        Ok(Self::new(aws_sdk_s3::Client::from_conf(config), bucket?))
    }

    fn url(&self, key: &str) -> String {
        format!("s3://{}/{key}", self.bucket)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StorageError> {
        let response = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        let output = match response {
            Ok(output) => output,
            Err(err) if is_missing(&err, HeadObjectError::is_not_found) => {
                log::debug!("{} not found", self.url(key));
                return Ok(None);
            }
            Err(err) => {
                return Err(StorageError::Head {
                    url: self.url(key),
                    source: Box::new(err),
                });
            }
        };

        let size = output
            .content_length()
            .and_then(|len| u64::try_from(len).ok())
            .unwrap_or_default();
        Ok(Some(ObjectMeta { size }))
    }

    async fn download(&self, key: &str, local_path: &Path) -> Result<Option<u64>, StorageError> {
        let url = self.url(key);
        log::info!("Pulling {url} -> {}", local_path.display());

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        let output = match response {
            Ok(output) => output,
            Err(err) if is_missing(&err, GetObjectError::is_no_such_key) => {
                log::warn!("  {url} not found");
                return Ok(None);
            }
            Err(err) => {
                return Err(StorageError::Download {
                    url,
                    source: Box::new(err),
                });
            }
        };

        let body = match output.body.collect().await {
            Ok(data) => data.into_bytes(),
            Err(err) => {
                return Err(StorageError::Download {
                    url,
                    source: Box::new(err),
                });
            }
        };

        tokio::fs::write(local_path, &body).await?;
        let size = body.len() as u64;
        log::info!(
            "  downloaded {} ({})",
            local_path.display(),
            format_size(size)
        );

        Ok(Some(size))
    }
}

/// Whether `err` is the service reporting that the object does not exist.
/// Transport failures and other service errors are never "missing".
fn is_missing<E, R>(err: &SdkError<E, R>, missing: impl FnOnce(&E) -> bool) -> bool {
    err.as_service_error().is_some_and(missing)
}

/// Size units in steps of 1024.
const SIZE_UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Formats a byte count with binary units, e.g. `1536` → `"1.50 KB"`.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0B".to_string();
    }

    #[allow(clippy::cast_precision_loss)] // display-only value
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{value:.2} {}", SIZE_UNITS[unit])
}

/// Reads a required environment variable. Empty values count as missing.
fn env_var(name: &str) -> Result<String, StorageError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(StorageError::MissingEnv {
            name: name.to_string(),
        }),
    }
}
