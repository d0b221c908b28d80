//! Directory layout for a HappyML repo (spec §6): `datasets/<name>/` and
//! `models/<name>/` live under one root, the way `bit_llama::cli` resolves
//! `--checkpoint-dir`/`--data-dir` relative to a single working root.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct HappyMlRepo {
    root: PathBuf,
}

impl HappyMlRepo {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn datasets_dir(&self) -> PathBuf {
        self.root.join("datasets")
    }

    pub fn models_dir(&self) -> PathBuf {
        self.root.join("models")
    }

    pub fn dataset_dir(&self, name: &str) -> PathBuf {
        self.datasets_dir().join(name)
    }

    pub fn dataset_bin_path(&self, name: &str) -> PathBuf {
        self.dataset_dir(name).join("dataset.bin")
    }

    pub fn dataset_config_path(&self, name: &str) -> PathBuf {
        self.dataset_dir(name).join("dataset.config")
    }

    pub fn model_dir(&self, name: &str) -> PathBuf {
        self.models_dir().join(name)
    }

    pub fn model_config_path(&self, name: &str) -> PathBuf {
        self.model_dir(name).join("configuration.happyml")
    }

    pub fn dataset_exists(&self, name: &str) -> bool {
        self.dataset_bin_path(name).is_file()
    }

    pub fn model_exists(&self, name: &str) -> bool {
        self.model_config_path(name).is_file()
    }

    pub fn ensure_dataset_dir(&self, name: &str) -> std::io::Result<PathBuf> {
        let dir = self.dataset_dir(name);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn ensure_model_dir(&self, name: &str) -> std::io::Result<PathBuf> {
        let dir = self.model_dir(name);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_nest_under_datasets_and_models() {
        let repo = HappyMlRepo::new("/tmp/happyml-repo");
        assert_eq!(repo.dataset_bin_path("iris"), Path::new("/tmp/happyml-repo/datasets/iris/dataset.bin"));
        assert_eq!(repo.model_config_path("iris_model"), Path::new("/tmp/happyml-repo/models/iris_model/configuration.happyml"));
    }

    #[test]
    fn dataset_exists_reflects_the_filesystem() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = HappyMlRepo::new(tmp.path());
        assert!(!repo.dataset_exists("missing"));
        repo.ensure_dataset_dir("present").unwrap();
        std::fs::write(repo.dataset_bin_path("present"), b"").unwrap();
        assert!(repo.dataset_exists("present"));
    }
}
