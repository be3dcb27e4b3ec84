use crate::error::PipelineResult;
use std::path::{Path, PathBuf};
use tabpipe_platform::ObjectLocation;

/// Remote layout for prepared data: everything lives under `<bucket>/<folder>/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    bucket: String,
    folder: String,
}

impl StorageLayout {
    #[must_use]
    pub fn new(bucket: impl Into<String>, folder: impl AsRef<str>) -> Self {
        Self { bucket: bucket.into(), folder: folder.as_ref().trim_matches('/').to_string() }
    }

    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    #[must_use]
    pub fn folder(&self) -> &str {
        &self.folder
    }

    fn location(&self, suffix: &str) -> ObjectLocation {
        let key = if self.folder.is_empty() {
            suffix.to_string()
        } else {
            format!("{}/{}", self.folder, suffix)
        };
        ObjectLocation { bucket: self.bucket.clone(), key }
    }

    #[must_use]
    pub fn train_location(&self) -> ObjectLocation {
        self.location("train/data.csv")
    }

    #[must_use]
    pub fn validation_location(&self) -> ObjectLocation {
        self.location("validation/data.csv")
    }

    #[must_use]
    pub fn categorical_index_location(&self) -> ObjectLocation {
        self.location("cat_index.json")
    }

    /// `<bucket>/<folder>/`, used as the training input channel and output path.
    #[must_use]
    pub fn training_prefix(&self) -> String {
        if self.folder.is_empty() {
            format!("{}/", self.bucket)
        } else {
            format!("{}/{}/", self.bucket, self.folder)
        }
    }
}

/// Local directory holding the held-out test partition.
#[derive(Debug, Clone)]
pub struct LocalLayout {
    root: PathBuf,
}

impl LocalLayout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn features_path(&self) -> PathBuf {
        self.root.join("X_test.csv")
    }

    #[must_use]
    pub fn labels_path(&self) -> PathBuf {
        self.root.join("y_test.csv")
    }

    pub fn ensure_dirs(&self) -> PipelineResult<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_storage_layout_keys() {
        let layout = StorageLayout::new("my-bucket", "tab-transformer/");

        assert_eq!(layout.train_location().to_string(), "my-bucket/tab-transformer/train/data.csv");
        assert_eq!(
            layout.validation_location().to_string(),
            "my-bucket/tab-transformer/validation/data.csv"
        );
        assert_eq!(layout.categorical_index_location().key, "tab-transformer/cat_index.json");
        assert_eq!(layout.training_prefix(), "my-bucket/tab-transformer/");
    }

    #[test]
    fn test_storage_layout_without_folder() {
        let layout = StorageLayout::new("b", "");
        assert_eq!(layout.train_location().key, "train/data.csv");
        assert_eq!(layout.training_prefix(), "b/");
    }

    #[test]
    fn test_local_layout_paths() {
        let temp = TempDir::new().unwrap();
        let layout = LocalLayout::new(temp.path().join("data"));
        layout.ensure_dirs().unwrap();

        assert!(layout.root().is_dir());
        assert!(layout.features_path().ends_with("data/X_test.csv"));
        assert!(layout.labels_path().ends_with("data/y_test.csv"));
    }
}
