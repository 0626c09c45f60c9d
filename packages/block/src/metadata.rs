//! `GeoJSON` result manifest (`data.json`) exchanged between blocks.

use geojson::FeatureCollection;

use crate::{BlockError, BlockPaths};

/// Loads the upstream result manifest from `input/data.json`.
///
/// Returns an empty collection when there is no upstream manifest.
///
/// # Errors
///
/// * [`BlockError::Io`] if the data directories or the file cannot be
///   accessed
/// * [`BlockError::Metadata`] if the file is not a `FeatureCollection`
pub fn load_metadata(paths: &BlockPaths) -> Result<FeatureCollection, BlockError> {
    paths.ensure_dirs()?;

    let path = paths.metadata_input_path();
    if !path.exists() {
        log::debug!("No input metadata at {}", path.display());
        return Ok(empty_collection());
    }

    let text = std::fs::read_to_string(&path)?;
    serde_json::from_str(&text).map_err(|source| BlockError::Metadata {
        path: path.display().to_string(),
        source,
    })
}

/// Writes the result manifest to `output/data.json`.
///
/// # Errors
///
/// * [`BlockError::Io`] if the file cannot be written
/// * [`BlockError::Metadata`] if the collection cannot be serialized
pub fn save_metadata(paths: &BlockPaths, result: &FeatureCollection) -> Result<(), BlockError> {
    paths.ensure_dirs()?;

    let path = paths.metadata_output_path();
    let text = serde_json::to_string(result).map_err(|source| BlockError::Metadata {
        path: path.display().to_string(),
        source,
    })?;

    std::fs::write(&path, text)?;
    log::debug!(
        "Saved {} result features to {}",
        result.features.len(),
        path.display()
    );
    Ok(())
}

/// A `FeatureCollection` without features.
#[must_use]
pub const fn empty_collection() -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: Vec::new(),
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use geojson::{Feature, Geometry, feature::Id};

    use super::*;

    fn test_paths(name: &str) -> BlockPaths {
        let tmp = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&tmp);
        BlockPaths::new(tmp)
    }

    #[test]
    fn missing_input_is_empty_collection() {
        let paths = test_paths("aspectum_block_metadata_missing");

        let collection = load_metadata(&paths).unwrap();
        assert!(collection.features.is_empty());
        assert!(paths.output_dir().is_dir());

        let _ = std::fs::remove_dir_all(paths.root());
    }

    #[test]
    fn saved_manifest_loads_as_input() {
        let paths = test_paths("aspectum_block_metadata_saved");

        let feature = Feature {
            bbox: Some(vec![0.0, 0.0, 1.0, 1.0]),
            geometry: Some(Geometry::new(geojson::Value::Point(vec![0.5, 0.5]))),
            id: Some(Id::String("scene".to_string())),
            properties: None,
            foreign_members: None,
        };
        let collection = FeatureCollection {
            features: vec![feature],
            ..empty_collection()
        };
        save_metadata(&paths, &collection).unwrap();

        std::fs::copy(paths.metadata_output_path(), paths.metadata_input_path()).unwrap();
        let loaded = load_metadata(&paths).unwrap();
        assert_eq!(loaded, collection);

        let _ = std::fs::remove_dir_all(paths.root());
    }

    #[test]
    fn rejects_malformed_input() {
        let paths = test_paths("aspectum_block_metadata_malformed");
        paths.ensure_dirs().unwrap();
        std::fs::write(paths.metadata_input_path(), r#"{"type": "Feature"}"#).unwrap();

        assert!(matches!(
            load_metadata(&paths),
            Err(BlockError::Metadata { .. })
        ));

        let _ = std::fs::remove_dir_all(paths.root());
    }
}
