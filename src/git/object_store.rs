use std::{
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

use dashmap::DashMap;
use git2::{ErrorCode, ObjectType, Oid, Repository};
use log::{debug, trace};

use super::GitError;

/// Read-only view of a repository's commit, tree and blob graph.
///
/// `git2::Repository` cannot be shared between threads, so every lookup goes
/// through a mutex. Tree walks are memoised: objects are content-addressed, so
/// a `(tree, path)` pair always resolves to the same child.
pub struct ObjectStore {
    path: PathBuf,
    repo: Mutex<Repository>,
    subtrees: DashMap<(Oid, String), Option<Oid>>,
}

impl ObjectStore {
    /// Opens the repository containing `path`.
    pub fn open(path: &Path) -> Result<ObjectStore, GitError> {
        let repo = Repository::discover(path).map_err(|source| GitError::Repository {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Opened repository at {}", repo.path().display());
        Ok(ObjectStore {
            path: path.to_path_buf(),
            repo: Mutex::new(repo),
            subtrees: DashMap::new(),
        })
    }

    /// Root of the repository's working tree.
    pub fn workdir(&self) -> Result<PathBuf, GitError> {
        self.repo()
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| GitError::Bare {
                path: self.path.clone(),
            })
    }

    pub fn resolve_ref(&self, reference: &str) -> Result<Oid, GitError> {
        let repo = self.repo();
        let commit = repo
            .revparse_single(reference)
            .and_then(|object| object.peel_to_commit())
            .map_err(|source| match source.code() {
                ErrorCode::NotFound
                | ErrorCode::InvalidSpec
                | ErrorCode::Ambiguous
                | ErrorCode::UnbornBranch
                | ErrorCode::Peel => GitError::RefNotFound {
                    reference: reference.to_owned(),
                    source,
                },
                _ => GitError::Repository {
                    path: self.path.clone(),
                    source,
                },
            })?;
        debug!("Resolved {} to commit {}", reference, commit.id());
        Ok(commit.id())
    }

    pub fn root_tree(&self, commit: Oid) -> Result<Oid, GitError> {
        Ok(self.repo().find_commit(commit)?.tree_id())
    }

    /// Walks `path` (`/`-separated, empty for the tree itself) down from `tree`.
    /// Returns `None` when nothing is there or when the entry is not a tree.
    pub fn subtree(&self, tree: Oid, path: &str) -> Result<Option<Oid>, GitError> {
        if path.is_empty() {
            return Ok(Some(tree));
        }
        let key = (tree, path.to_owned());
        if let Some(found) = self.subtrees.get(&key) {
            return Ok(*found);
        }

        let found = {
            let repo = self.repo();
            let root = repo.find_tree(tree)?;
            match root.get_path(Path::new(path)) {
                Ok(entry) if entry.kind() == Some(ObjectType::Tree) => Some(entry.id()),
                Ok(_) => None,
                Err(e) if e.code() == ErrorCode::NotFound => None,
                Err(e) => return Err(e.into()),
            }
        };
        trace!("Subtree {} of {}: {:?}", path, tree, found);
        self.subtrees.insert(key, found);
        Ok(found)
    }

    /// Content of the blob at `path` below `tree`, if there is one.
    pub fn blob_at(&self, tree: Oid, path: &str) -> Result<Option<Vec<u8>>, GitError> {
        let (parent, name) = match path.rsplit_once('/') {
            Some((parent, name)) => (parent, name),
            None => ("", path),
        };
        if name.is_empty() {
            return Ok(None);
        }
        let Some(parent) = self.subtree(tree, parent)? else {
            return Ok(None);
        };

        let repo = self.repo();
        let parent = repo.find_tree(parent)?;
        let blob_id = match parent.get_name(name) {
            Some(entry) if entry.kind() == Some(ObjectType::Blob) => entry.id(),
            _ => return Ok(None),
        };
        let blob = repo.find_blob(blob_id)?;
        Ok(Some(blob.content().to_vec()))
    }

    fn repo(&self) -> MutexGuard<'_, Repository> {
        // Nothing is ever written through the handle, so a panic elsewhere
        // cannot leave it inconsistent.
        self.repo.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
