#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Scene retrieval block.
//!
//! Reads the task query, downloads the scene named by its `file_name`
//! parameter from the scene bucket into `output/`, and writes a `GeoJSON`
//! result manifest with one feature per downloaded scene. The feature
//! carries the query's bounding box and geometry.
//!
//! In dry-run mode the storage is never touched and the manifest describes
//! the scene that would have been fetched.

use aspectum_block::{BlockError, BlockPaths, metadata::empty_collection};
use aspectum_s3::{ObjectStore, StorageError, format_size};
use aspectum_stac::{AcceptAll, MissingSpatialFilterError, StacQuery};
use geojson::{Feature, FeatureCollection, JsonObject, feature::Id};
use serde_json::Value;

/// Zoom level injected when the query does not specify one.
pub const DEFAULT_ZOOM_LEVEL: u32 = 9;

/// Key prefix of scene files in the bucket.
pub const OBJECT_PREFIX: &str = "up42_storage";

/// Feature property naming the output file of a scene.
pub const AOI_CLIPPED_PROPERTY: &str = "up42.data.aoiclipped";

/// Errors that can occur while fetching a scene.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Loading the query or writing results failed.
    #[error(transparent)]
    Block(#[from] BlockError),

    /// The scene bucket could not be read.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A parameter the block needs is missing from the query.
    #[error("Missing query parameter: {name}")]
    MissingParameter {
        /// Parameter name.
        name: &'static str,
    },

    /// The query has no area of interest for the result feature.
    #[error(transparent)]
    MissingSpatialFilter(#[from] MissingSpatialFilterError),
}

/// Loads the task query from the environment and fetches its scene.
///
/// Pass `None` as `store` to run in dry-run mode.
///
/// # Errors
///
/// Returns [`FetchError`] if the query is invalid, the storage fails, or the
/// result manifest cannot be written.
pub async fn run(
    paths: &BlockPaths,
    store: Option<&dyn ObjectStore>,
) -> Result<FeatureCollection, FetchError> {
    let query = aspectum_block::load_query(&AcceptAll)?;
    fetch(query, paths, store).await
}

/// Fetches the scene named by `query` and writes the result manifest.
///
/// A scene missing from the bucket is not an error: it is logged and the
/// manifest is written without features.
///
/// # Errors
///
/// * [`FetchError::MissingParameter`] if the query has no `file_name`
/// * [`FetchError::MissingSpatialFilter`] if the query has no spatial filter
/// * [`FetchError::Storage`] if the bucket cannot be read
/// * [`FetchError::Block`] if the data directories or manifest cannot be
///   written
pub async fn fetch(
    mut query: StacQuery,
    paths: &BlockPaths,
    store: Option<&dyn ObjectStore>,
) -> Result<FeatureCollection, FetchError> {
    paths.ensure_dirs().map_err(BlockError::from)?;
    apply_defaults(&mut query);

    let key = object_key(&query)?;
    let feature_id = uuid::Uuid::new_v4().to_string();
    let out_path = paths.output_file(&format!("{feature_id}.tif"));
    log::debug!("File output will be {}", out_path.display());

    let feature = scene_feature(&feature_id, &query)?;
    let mut result = empty_collection();

    match store {
        None => {
            log::info!("Dry run: skipping download of {key}");
            result.features.push(feature);
        }
        Some(store) => match store.head(&key).await? {
            None => log::error!("The object {key} does not exist"),
            Some(meta) => {
                log::debug!("[FILE SIZE ON S3] - {}", format_size(meta.size));
                match store.download(&key, &out_path).await? {
                    Some(size) => {
                        log::debug!("[FILE SIZE AFTER DOWNLOAD] - {}", format_size(size));
                        result.features.push(feature);
                    }
                    None => log::error!("The object {key} disappeared before download"),
                }
            }
        },
    }

    log::debug!("Saving {} result features", result.features.len());
    aspectum_block::save_metadata(paths, &result)?;
    Ok(result)
}

/// Injects block defaults without overriding query values.
fn apply_defaults(query: &mut StacQuery) {
    if query.set_if_absent("zoom_level", DEFAULT_ZOOM_LEVEL) {
        log::debug!("Using default zoom_level {DEFAULT_ZOOM_LEVEL}");
    }
}

/// Bucket key of the scene named by the query's `file_name`.
fn object_key(query: &StacQuery) -> Result<String, FetchError> {
    let file_name = query
        .extension("file_name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .ok_or(FetchError::MissingParameter { name: "file_name" })?;

    Ok(format!("{OBJECT_PREFIX}/{file_name}"))
}

/// Result feature for a scene saved as `{id}.tif`.
fn scene_feature(id: &str, query: &StacQuery) -> Result<Feature, FetchError> {
    let bounds = query.bounds()?;
    let geometry = query.geometry()?;

    let mut properties = JsonObject::new();
    properties.insert(
        AOI_CLIPPED_PROPERTY.to_string(),
        Value::from(format!("{id}.tif")),
    );

    Ok(Feature {
        bbox: Some(bounds.to_array().to_vec()),
        geometry: Some(geometry),
        id: Some(Id::String(id.to_string())),
        properties: Some(properties),
        foreign_members: None,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use aspectum_s3::ObjectMeta;
    use serde_json::{Map, json};

    use super::*;

    /// In-memory bucket that counts requests.
    struct MemoryStore {
        objects: BTreeMap<String, Vec<u8>>,
        heads: AtomicUsize,
        downloads: AtomicUsize,
    }

    impl MemoryStore {
        fn with(key: &str, data: &[u8]) -> Self {
            Self {
                objects: BTreeMap::from([(key.to_string(), data.to_vec())]),
                heads: AtomicUsize::new(0),
                downloads: AtomicUsize::new(0),
            }
        }

        fn requests(&self) -> (usize, usize) {
            (
                self.heads.load(Ordering::SeqCst),
                self.downloads.load(Ordering::SeqCst),
            )
        }
    }

    #[async_trait::async_trait]
    impl ObjectStore for MemoryStore {
        async fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StorageError> {
            self.heads.fetch_add(1, Ordering::SeqCst);
            Ok(self.objects.get(key).map(|data| ObjectMeta {
                size: data.len() as u64,
            }))
        }

        async fn download(
            &self,
            key: &str,
            local_path: &Path,
        ) -> Result<Option<u64>, StorageError> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            let Some(data) = self.objects.get(key) else {
                return Ok(None);
            };
            tokio::fs::write(local_path, data).await?;
            Ok(Some(data.len() as u64))
        }
    }

    fn query(value: Value) -> StacQuery {
        let Value::Object(raw) = value else {
            panic!("expected an object");
        };
        StacQuery::from_map(&raw).unwrap()
    }

    fn test_paths(name: &str) -> BlockPaths {
        let tmp = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&tmp);
        BlockPaths::new(tmp)
    }

    fn feature_file(paths: &BlockPaths, feature: &Feature) -> std::path::PathBuf {
        let file = feature
            .properties
            .as_ref()
            .and_then(|p| p.get(AOI_CLIPPED_PROPERTY))
            .and_then(Value::as_str)
            .unwrap();
        paths.output_file(file)
    }

    #[tokio::test]
    async fn downloads_existing_scene() {
        let paths = test_paths("aspectum_fetch_existing");
        let store = MemoryStore::with("up42_storage/scene_001.tif", b"GeoTIFF bytes");

        let result = fetch(
            query(json!({"bbox": [10.0, 45.0, 10.5, 45.5], "file_name": "scene_001.tif"})),
            &paths,
            Some(&store),
        )
        .await
        .unwrap();

        assert_eq!(result.features.len(), 1);
        let feature = &result.features[0];
        assert_eq!(feature.bbox, Some(vec![10.0, 45.0, 10.5, 45.5]));
        assert!(matches!(
            feature.geometry.as_ref().map(|g| &g.value),
            Some(geojson::Value::Polygon(_))
        ));

        let Some(Id::String(id)) = &feature.id else {
            panic!("expected a string id");
        };
        let file = feature_file(&paths, feature);
        assert_eq!(file, paths.output_file(&format!("{id}.tif")));
        assert_eq!(std::fs::read(&file).unwrap(), b"GeoTIFF bytes");

        let saved = std::fs::read_to_string(paths.metadata_output_path()).unwrap();
        let saved: FeatureCollection = serde_json::from_str(&saved).unwrap();
        assert_eq!(saved, result);

        let _ = std::fs::remove_dir_all(paths.root());
    }

    #[tokio::test]
    async fn fetch_heads_once_then_downloads_once() {
        let paths = test_paths("aspectum_fetch_request_count");
        let store = MemoryStore::with("up42_storage/scene_002.tif", b"bytes");

        fetch(
            query(json!({"bbox": [0, 0, 1, 1], "file_name": "scene_002.tif"})),
            &paths,
            Some(&store),
        )
        .await
        .unwrap();

        assert_eq!(store.requests(), (1, 1));

        let _ = std::fs::remove_dir_all(paths.root());
    }

    #[tokio::test]
    async fn missing_scene_yields_empty_manifest() {
        let paths = test_paths("aspectum_fetch_missing");
        let store = MemoryStore::with("up42_storage/other.tif", b"x");

        let result = fetch(
            query(json!({"bbox": [0, 0, 1, 1], "file_name": "scene_404.tif"})),
            &paths,
            Some(&store),
        )
        .await
        .unwrap();

        assert!(result.features.is_empty());
        assert!(paths.metadata_output_path().exists());
        assert_eq!(store.requests(), (1, 0));

        let _ = std::fs::remove_dir_all(paths.root());
    }

    #[tokio::test]
    async fn dry_run_skips_storage() {
        let paths = test_paths("aspectum_fetch_dry_run");

        let result = fetch(
            query(json!({
                "intersects": {"type": "Point", "coordinates": [10.2, 45.1]},
                "file_name": "scene_001.tif"
            })),
            &paths,
            None,
        )
        .await
        .unwrap();

        assert_eq!(result.features.len(), 1);
        let feature = &result.features[0];
        assert_eq!(feature.bbox, Some(vec![10.2, 45.1, 10.2, 45.1]));
        assert!(!feature_file(&paths, feature).exists());

        let _ = std::fs::remove_dir_all(paths.root());
    }

    #[tokio::test]
    async fn requires_file_name() {
        let paths = test_paths("aspectum_fetch_no_file_name");

        let err = fetch(query(json!({"bbox": [0, 0, 1, 1]})), &paths, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::MissingParameter { name: "file_name" }
        ));

        let _ = std::fs::remove_dir_all(paths.root());
    }

    #[tokio::test]
    async fn requires_spatial_filter() {
        let paths = test_paths("aspectum_fetch_no_aoi");

        let err = fetch(query(json!({"file_name": "a.tif"})), &paths, None)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::MissingSpatialFilter(_)));

        let _ = std::fs::remove_dir_all(paths.root());
    }

    #[test]
    fn default_zoom_level_does_not_override_query() {
        let mut defaulted = StacQuery::from_map(&Map::new()).unwrap();
        apply_defaults(&mut defaulted);
        assert_eq!(defaulted.get("zoom_level"), Some(json!(9)));

        let mut explicit = query(json!({"zoom_level": 14}));
        apply_defaults(&mut explicit);
        assert_eq!(explicit.get("zoom_level"), Some(json!(14)));
    }

    #[test]
    fn object_key_uses_storage_prefix() {
        let key = object_key(&query(json!({"file_name": "scene_001.tif"}))).unwrap();
        assert_eq!(key, "up42_storage/scene_001.tif");

        assert!(object_key(&query(json!({"file_name": 42}))).is_err());
    }
}
