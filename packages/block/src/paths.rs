#![allow(clippy::module_name_repetitions)]
//! Canonical block data directories.
//!
//! All paths are relative to a data root, `/tmp` when running as a block.

use std::path::{Path, PathBuf};

/// Data root used by the block runner.
pub const DEFAULT_DATA_ROOT: &str = "/tmp";

/// Layout of the block's data directories under a root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPaths {
    root: PathBuf,
}

impl Default for BlockPaths {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_ROOT)
    }
}

impl BlockPaths {
    /// Creates the layout under `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the data root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the `input/` directory with upstream results.
    #[must_use]
    pub fn input_dir(&self) -> PathBuf {
        self.root.join("input")
    }

    /// Returns the `output/` directory for this block's results.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    /// Returns the `quicklooks/` directory for preview images.
    #[must_use]
    pub fn quicklooks_dir(&self) -> PathBuf {
        self.root.join("quicklooks")
    }

    /// Returns the path of the upstream result manifest.
    #[must_use]
    pub fn metadata_input_path(&self) -> PathBuf {
        self.input_dir().join("data.json")
    }

    /// Returns the path of this block's result manifest.
    #[must_use]
    pub fn metadata_output_path(&self) -> PathBuf {
        self.output_dir().join("data.json")
    }

    /// Returns the path for an output file named `file_name`.
    #[must_use]
    pub fn output_file(&self, file_name: &str) -> PathBuf {
        self.output_dir().join(file_name)
    }

    /// Ensures the input, output and quicklook directories exist.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a directory cannot be created.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [self.input_dir(), self.output_dir(), self.quicklooks_dir()] {
            ensure_dir(&dir)?;
        }
        Ok(())
    }
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_lives_under_tmp() {
        let paths = BlockPaths::default();
        assert_eq!(paths.input_dir(), Path::new("/tmp/input"));
        assert_eq!(paths.output_dir(), Path::new("/tmp/output"));
        assert_eq!(paths.quicklooks_dir(), Path::new("/tmp/quicklooks"));
        assert_eq!(
            paths.metadata_output_path(),
            Path::new("/tmp/output/data.json")
        );
    }

    #[test]
    fn ensure_dirs_creates_all_directories() {
        let tmp = std::env::temp_dir().join("aspectum_block_paths_test");
        let _ = std::fs::remove_dir_all(&tmp);

        let paths = BlockPaths::new(&tmp);
        paths.ensure_dirs().unwrap();
        // Second call is a no-op.
        paths.ensure_dirs().unwrap();

        assert!(paths.input_dir().is_dir());
        assert!(paths.output_dir().is_dir());
        assert!(paths.quicklooks_dir().is_dir());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
