pub mod object_store;

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

pub use object_store::ObjectStore;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("Baseline ref {reference} does not resolve to a commit: {source}")]
    RefNotFound {
        reference: String,
        source: git2::Error,
    },
    #[error("Could not read a git repository at {path}: {source}")]
    Repository { path: PathBuf, source: git2::Error },
    #[error("Repository at {path} has no working directory")]
    Bare { path: PathBuf },
    #[error("Path {path} is not a repository-relative path")]
    BadPath { path: PathBuf },
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
}

/// Converts a relative filesystem path into the `/`-separated form used for
/// tree lookups. `.` and the empty path both name the root tree.
pub fn tree_path(path: &Path) -> Result<String, GitError> {
    let mut segments = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(segment) => match segment.to_str() {
                Some(segment) => segments.push(segment),
                None => {
                    return Err(GitError::BadPath {
                        path: path.to_path_buf(),
                    })
                }
            },
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(GitError::BadPath {
                    path: path.to_path_buf(),
                })
            }
        }
    }
    Ok(segments.join("/"))
}

#[cfg(test)]
pub(crate) mod test_repo {
    use std::path::Path;

    use git2::{Commit, IndexAddOption, Repository, Signature, Time};

    /// Writes `content` to `relative` under the work tree, creating parents.
    pub fn write(repo: &Repository, relative: &str, content: &str) {
        let path = repo.workdir().unwrap().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    pub fn stage(repo: &Repository, relative: &str) {
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(relative)).unwrap();
        index.write().unwrap();
    }

    /// Stages everything in the work tree and commits it on top of HEAD.
    pub fn commit_all<'a>(repo: &'a Repository, message: &str) -> Commit<'a> {
        let mut index = repo.index().unwrap();
        index.add_all(["*"], IndexAddOption::DEFAULT, None).unwrap();
        index.update_all(["*"], None).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let person = Signature::new("jane doe", "jane@doe.com", &Time::new(0, 0)).unwrap();
        let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<&Commit> = parent.iter().collect();
        let id = repo
            .commit(Some("HEAD"), &person, &person, message, &tree, &parents)
            .unwrap();
        repo.find_commit(id).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn tree_path_normalizes_components() {
        assert_eq!(tree_path(Path::new(".")).unwrap(), "");
        assert_eq!(tree_path(Path::new("")).unwrap(), "");
        assert_eq!(tree_path(Path::new("./clean")).unwrap(), "clean");
        assert_eq!(
            tree_path(Path::new("src/markdown/test.md")).unwrap(),
            "src/markdown/test.md"
        );
    }

    #[test]
    fn tree_path_rejects_escapes() {
        assert!(tree_path(Path::new("../sibling")).is_err());
        assert!(tree_path(Path::new("/etc/passwd")).is_err());
    }
}
