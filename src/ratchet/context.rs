use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use dashmap::DashMap;
use git2::Oid;
use log::debug;

use crate::git::{tree_path, ObjectStore};

use super::{BaselineHandle, CacheKey, Ratchet, RatchetError};

/// Entry point for format tasks: owns the repository handle for one
/// invocation and hands out one [`Ratchet`] per project.
///
/// The ref is resolved once, when the context is opened; every project is
/// judged against that commit even if the ref moves afterwards. Dropping the
/// context releases the repository.
pub struct RatchetContext {
    store: Arc<ObjectStore>,
    reference: String,
    commit: Oid,
    workdir: PathBuf,
    ratchets: DashMap<String, Arc<Ratchet>>,
}

impl RatchetContext {
    /// Opens the repository containing `root` and fails early if `reference`
    /// does not resolve.
    pub fn open(root: &Path, reference: &str) -> Result<RatchetContext, RatchetError> {
        let store = ObjectStore::open(root)?;
        let commit = store.resolve_ref(reference)?;
        let workdir = store.workdir()?;
        Ok(RatchetContext {
            store: Arc::new(store),
            reference: reference.to_owned(),
            commit,
            workdir,
            ratchets: DashMap::new(),
        })
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// The commit the ref resolved to when the context was opened.
    pub fn commit(&self) -> Oid {
        self.commit
    }

    /// Root of the repository's working tree; projects are relative to it.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// The ratchet for `project` (relative to the repository root), built on
    /// first use.
    pub fn ratchet_for(&self, project: &Path) -> Result<Arc<Ratchet>, RatchetError> {
        let key = tree_path(project)?;
        if let Some(ratchet) = self.ratchets.get(&key) {
            return Ok(Arc::clone(&ratchet));
        }

        let project_dir = if key.is_empty() {
            self.workdir.clone()
        } else {
            self.workdir.join(&key)
        };
        // the shard stays locked while building, so each project is built once
        let ratchet = self.ratchets.entry(key).or_try_insert_with(|| {
            let baseline =
                BaselineHandle::at_commit(&self.store, &self.reference, self.commit, project)?;
            debug!(
                "Ratchet for project {} rooted at {}",
                project.display(),
                project_dir.display()
            );
            Ok::<_, RatchetError>(Arc::new(Ratchet::new(
                Arc::clone(&self.store),
                baseline,
                project_dir,
            )))
        })?;
        Ok(Arc::clone(ratchet.value()))
    }

    pub fn is_clean(&self, project: &Path, path: &Path) -> Result<bool, RatchetError> {
        self.ratchet_for(project)?.is_clean(path)
    }

    pub fn cache_key_for(&self, project: &Path) -> Result<CacheKey, RatchetError> {
        Ok(self.ratchet_for(project)?.cache_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::test_repo::{commit_all, write};

    use git2::Repository;
    use pretty_assertions::assert_eq;

    #[test]
    fn builds_each_project_once() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        write(&repo, "clean/test.md", "HELLO");
        commit_all(&repo, "baseline");

        let context = RatchetContext::open(dir.path(), "HEAD").unwrap();
        let first = context.ratchet_for(Path::new("clean")).unwrap();
        let second = context.ratchet_for(Path::new("./clean")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(context
            .is_clean(Path::new("clean"), Path::new("test.md"))
            .unwrap());
    }

    #[test]
    fn keys_are_scoped_per_project() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        write(&repo, "clean/test.md", "HELLO");
        write(&repo, "dirty/test.md", "HELLO");
        commit_all(&repo, "first");
        let before = RatchetContext::open(dir.path(), "HEAD").unwrap();

        write(&repo, "dirty/test.md", "hello world");
        commit_all(&repo, "second");
        let after = RatchetContext::open(dir.path(), "HEAD").unwrap();

        let clean = Path::new("clean");
        let dirty = Path::new("dirty");
        assert_eq!(
            before.cache_key_for(clean).unwrap(),
            after.cache_key_for(clean).unwrap()
        );
        assert_ne!(
            before.cache_key_for(dirty).unwrap(),
            after.cache_key_for(dirty).unwrap()
        );
        assert_ne!(
            before.cache_key_for(Path::new(".")).unwrap(),
            after.cache_key_for(Path::new(".")).unwrap()
        );
        assert_eq!(
            after.cache_key_for(Path::new("added")).unwrap(),
            CacheKey::Empty
        );
    }

    #[test]
    fn baseline_is_pinned_when_opened() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        write(&repo, "a/test.md", "HELLO");
        write(&repo, "b/test.md", "HELLO");
        let first = commit_all(&repo, "first").id();

        let context = RatchetContext::open(dir.path(), "HEAD").unwrap();
        let a = context.ratchet_for(Path::new("a")).unwrap();

        write(&repo, "b/test.md", "hello");
        commit_all(&repo, "second");
        let b = context.ratchet_for(Path::new("b")).unwrap();

        assert_eq!(context.commit(), first);
        assert_eq!(a.baseline().commit, first);
        assert_eq!(b.baseline().commit, first);
        // judged against the first commit, not the one HEAD moved to
        assert!(!b.is_clean(Path::new("test.md")).unwrap());
    }

    #[test]
    fn concurrent_lookups_agree_with_sequential_ones() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        for project in ["clean", "dirty", "nested/deep"] {
            write(&repo, &format!("{project}/a.md"), "HELLO");
            write(&repo, &format!("{project}/b.md"), "HELLO");
        }
        commit_all(&repo, "baseline");
        write(&repo, "dirty/a.md", "HELLO WORLD");
        write(&repo, "added/a.md", "HELLO");

        let projects = ["clean", "dirty", "nested/deep", "added", "."];
        let files = ["a.md", "b.md", "missing.md"];
        let verdicts = |context: &RatchetContext| {
            projects
                .iter()
                .map(|project| {
                    let project = Path::new(project);
                    let clean = files
                        .iter()
                        .map(|file| context.is_clean(project, Path::new(file)).unwrap())
                        .collect::<Vec<_>>();
                    (clean, context.cache_key_for(project).unwrap())
                })
                .collect::<Vec<_>>()
        };

        let expected = verdicts(&RatchetContext::open(dir.path(), "HEAD").unwrap());

        let context = RatchetContext::open(dir.path(), "HEAD").unwrap();
        let results = std::thread::scope(|scope| {
            let workers = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        let ratchets = projects
                            .iter()
                            .map(|project| context.ratchet_for(Path::new(project)).unwrap())
                            .collect::<Vec<_>>();
                        (verdicts(&context), ratchets)
                    })
                })
                .collect::<Vec<_>>();
            workers
                .into_iter()
                .map(|worker| worker.join().unwrap())
                .collect::<Vec<_>>()
        });

        assert_eq!(context.ratchets.len(), projects.len());
        for (verdict, ratchets) in results {
            assert_eq!(verdict, expected);
            for (project, ratchet) in projects.iter().zip(ratchets) {
                let built = context.ratchet_for(Path::new(project)).unwrap();
                assert!(Arc::ptr_eq(&built, &ratchet));
            }
        }
    }

    #[test]
    fn unknown_ref_fails_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        write(&repo, "test.md", "HELLO");
        commit_all(&repo, "baseline");

        let error = RatchetContext::open(dir.path(), "baseline")
            .err()
            .expect("baseline tag does not exist");
        assert!(error.to_string().contains("baseline"));
    }
}
