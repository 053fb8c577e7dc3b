use std::path::{Path, PathBuf};

use git2::Oid;
use log::{debug, info};

use crate::git::{tree_path, GitError, ObjectStore};

/// The commit a ref resolved to, narrowed to one project's subtree.
///
/// Computed once per invocation and never persisted: the ref may have moved
/// by the next run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineHandle {
    pub reference: String,
    pub commit: Oid,
    /// Project directory relative to the repository root.
    pub project: PathBuf,
    /// `None` when the project did not exist at the baseline commit; every
    /// file below it is then dirty.
    pub subtree: Option<Oid>,
}

impl BaselineHandle {
    pub fn resolve(
        store: &ObjectStore,
        reference: &str,
        project: &Path,
    ) -> Result<BaselineHandle, GitError> {
        let commit = store.resolve_ref(reference)?;
        BaselineHandle::at_commit(store, reference, commit, project)
    }

    /// Narrows an already resolved `commit` to `project` without looking at
    /// `reference` again.
    pub fn at_commit(
        store: &ObjectStore,
        reference: &str,
        commit: Oid,
        project: &Path,
    ) -> Result<BaselineHandle, GitError> {
        let root = store.root_tree(commit)?;
        let subtree = store.subtree(root, &tree_path(project)?)?;

        match subtree {
            Some(id) => debug!(
                "Baseline {} ({}) for project {}: tree {}",
                reference,
                commit,
                project.display(),
                id
            ),
            None => info!(
                "Project {} does not exist at baseline {} ({}), all of its files will be checked",
                project.display(),
                reference,
                commit
            ),
        }

        Ok(BaselineHandle {
            reference: reference.to_owned(),
            commit,
            project: project.to_path_buf(),
            subtree,
        })
    }
}
