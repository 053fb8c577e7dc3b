pub mod baseline;
pub mod context;
pub mod key;

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::trace;
use thiserror::Error;

use crate::git::{tree_path, GitError, ObjectStore};

pub use baseline::BaselineHandle;
pub use context::RatchetContext;
pub use key::CacheKey;

#[derive(Error, Debug)]
pub enum RatchetError {
    #[error(transparent)]
    Git(#[from] GitError),
    #[error("Could not read {path}: {source}")]
    FileAccess {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Path {path} is outside of project {project}")]
    OutsideProject { path: PathBuf, project: PathBuf },
}

/// Decides whether a file may skip formatting.
///
/// A file is clean when its bytes on disk equal the blob recorded at the
/// baseline, or when it no longer exists. New files are always dirty. The git
/// index plays no part in the verdict.
pub struct Ratchet {
    store: Arc<ObjectStore>,
    baseline: BaselineHandle,
    project_dir: PathBuf,
}

impl Ratchet {
    pub fn new(store: Arc<ObjectStore>, baseline: BaselineHandle, project_dir: PathBuf) -> Self {
        Self {
            store,
            baseline,
            project_dir,
        }
    }

    pub fn baseline(&self) -> &BaselineHandle {
        &self.baseline
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::from(&self.baseline)
    }

    /// `path` is either relative to the project directory or an absolute path
    /// below it.
    pub fn is_clean(&self, path: &Path) -> Result<bool, RatchetError> {
        let relative = self.relative(path)?;
        let working = match std::fs::read(self.project_dir.join(&relative)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                trace!("{} is absent, clean", relative.display());
                return Ok(true);
            }
            Err(source) => {
                return Err(RatchetError::FileAccess {
                    path: self.project_dir.join(&relative),
                    source,
                })
            }
        };

        let Some(subtree) = self.baseline.subtree else {
            trace!(
                "{} is in a project absent from the baseline, dirty",
                relative.display()
            );
            return Ok(false);
        };

        let clean = match self.store.blob_at(subtree, &tree_path(&relative)?)? {
            Some(baseline) => baseline == working,
            None => false,
        };
        trace!(
            "{} is {}",
            relative.display(),
            if clean { "clean" } else { "dirty" }
        );
        Ok(clean)
    }

    fn relative(&self, path: &Path) -> Result<PathBuf, RatchetError> {
        let relative = if path.is_absolute() {
            path.strip_prefix(&self.project_dir).map(Path::to_path_buf)
        } else {
            Ok(path.to_path_buf())
        };
        match relative {
            Ok(relative) if tree_path(&relative).is_ok() => Ok(relative),
            _ => Err(RatchetError::OutsideProject {
                path: path.to_path_buf(),
                project: self.project_dir.clone(),
            }),
        }
    }
}
