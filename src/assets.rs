//! Model asset lookup by label.
//!
//! Labels come straight from the classifier, so they are trimmed and checked
//! before being used as file names. A label that does not name an asset is
//! not an error; `resolve` just returns `None`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Serialize;

pub const DEFAULT_ASSET_EXTENSION: &str = "usdz";

/// A named model resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModelAsset {
    pub name: String,
    pub path: Option<PathBuf>,
    pub size_bytes: u64,
}

/// Maps a label to an optional model asset.
pub trait AssetStore: Send {
    fn resolve(&self, label: &str) -> Option<ModelAsset>;
}

/// Assets stored as `<root>/<label>.<extension>`.
#[derive(Clone, Debug)]
pub struct DirAssetStore {
    root: PathBuf,
    extension: String,
}

impl DirAssetStore {
    pub fn new<P: AsRef<Path>>(root: P, extension: &str) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(anyhow!("asset directory {} does not exist", root.display()));
        }
        let extension = extension.trim_start_matches('.').to_string();
        if extension.is_empty() {
            return Err(anyhow!("asset extension must not be empty"));
        }
        Ok(Self { root, extension })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Asset names available in the directory, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.root)
            .with_context(|| format!("failed to read asset directory {}", self.root.display()))?;
        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(self.extension.as_str()) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

impl AssetStore for DirAssetStore {
    fn resolve(&self, label: &str) -> Option<ModelAsset> {
        let name = asset_name(label)?;
        let path = self.root.join(format!("{}.{}", name, self.extension));
        let metadata = std::fs::metadata(&path).ok()?;
        if !metadata.is_file() {
            return None;
        }
        Some(ModelAsset {
            name: name.to_string(),
            path: Some(path),
            size_bytes: metadata.len(),
        })
    }
}

/// Fixed set of asset names, for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryAssetStore {
    names: HashSet<String>,
}

impl MemoryAssetStore {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl AssetStore for MemoryAssetStore {
    fn resolve(&self, label: &str) -> Option<ModelAsset> {
        let name = asset_name(label)?;
        self.names.get(name).map(|name| ModelAsset {
            name: name.clone(),
            path: None,
            size_bytes: 0,
        })
    }
}

/// Trimmed label, or `None` when it cannot safely name a file.
fn asset_name(label: &str) -> Option<&str> {
    let name = label.trim();
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
        return None;
    }
    Some(name)
}
