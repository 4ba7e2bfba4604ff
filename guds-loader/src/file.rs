//! Directory-backed package loader.
//!
//! Packages live flat in one directory as `<load_id>.json`. Bank packages
//! hold a serialized [`BankData`]; localized resource packages only need to
//! exist. Reads run on a tokio runtime and report back through the
//! [`CompletionQueue`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use guds_core::bank::BankData;
use guds_core::catalog::LOCALIZED_SUFFIX;
use guds_core::loading::{CompletionQueue, LoadCompletion, LoadFailure, LoadService, LoadedPackage};
use guds_core::types::LoadId;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::error::LoadError;

const PACKAGE_EXTENSION: &str = "json";

/// Loads packages from a directory on a tokio runtime.
pub struct FileLoadService {
    root: PathBuf,
    index: HashSet<LoadId>,
    runtime: Handle,
    queue: CompletionQueue,
}

impl FileLoadService {
    /// Index `root` and build a service that completes into `queue`.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` cannot be listed.
    pub fn open(
        root: impl Into<PathBuf>,
        runtime: Handle,
        queue: CompletionQueue,
    ) -> Result<Self, LoadError> {
        let root = root.into();
        let index = scan(&root)?;
        debug!(root = %root.display(), packages = index.len(), "package directory indexed");
        Ok(Self {
            root,
            index,
            runtime,
            queue,
        })
    }

    /// Re-list the directory, picking up packages added since `open`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn refresh(&mut self) -> Result<usize, LoadError> {
        self.index = scan(&self.root)?;
        Ok(self.index.len())
    }

    /// Number of indexed packages.
    #[must_use]
    pub fn package_count(&self) -> usize {
        self.index.len()
    }

    fn path_for(&self, load_id: &LoadId) -> PathBuf {
        package_path(&self.root, load_id)
    }
}

fn package_path(root: &Path, load_id: &LoadId) -> PathBuf {
    root.join(format!("{}.{PACKAGE_EXTENSION}", load_id.as_str()))
}

fn scan(root: &Path) -> Result<HashSet<LoadId>, LoadError> {
    let mut index = HashSet::new();
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(PACKAGE_EXTENSION) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            index.insert(LoadId(stem.to_string()));
        }
    }
    Ok(index)
}

async fn read_package(path: PathBuf, load_id: &LoadId) -> Result<LoadedPackage, LoadError> {
    if load_id.as_str().ends_with(LOCALIZED_SUFFIX) {
        return match tokio::fs::metadata(&path).await {
            Ok(_) => Ok(LoadedPackage::Resources),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(LoadError::NotFound(load_id.clone()))
            }
            Err(e) => Err(e.into()),
        };
    }
    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(LoadError::NotFound(load_id.clone()));
        }
        Err(e) => return Err(e.into()),
    };
    let data: BankData = serde_json::from_str(&raw).map_err(|e| LoadError::Parse {
        load_id: load_id.clone(),
        reason: e.to_string(),
    })?;
    Ok(LoadedPackage::Bank(data))
}

impl LoadService for FileLoadService {
    fn package_exists(&self, load_id: &LoadId) -> bool {
        self.index.contains(load_id)
    }

    fn load_async(&mut self, load_id: &LoadId) {
        let path = self.path_for(load_id);
        let load_id = load_id.clone();
        let queue = self.queue.clone();
        self.runtime.spawn(async move {
            let outcome = read_package(path, &load_id).await.map_err(|e| {
                warn!(load_id = %load_id, error = %e, "package load failed");
                LoadFailure::from(e)
            });
            queue.push(LoadCompletion { load_id, outcome });
        });
    }
}

impl std::fmt::Debug for FileLoadService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLoadService")
            .field("root", &self.root)
            .field("packages", &self.index.len())
            .finish_non_exhaustive()
    }
}
