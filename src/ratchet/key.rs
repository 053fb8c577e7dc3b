use std::fmt::{Display, Formatter};

use git2::Oid;

use super::baseline::BaselineHandle;

/// Up-to-date key for one project's baseline.
///
/// Subtree ids are content-addressed, so two keys are equal exactly when the
/// project's recursive content is identical at both baselines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Subtree(Oid),
    Empty,
}

impl From<&BaselineHandle> for CacheKey {
    fn from(baseline: &BaselineHandle) -> Self {
        match baseline.subtree {
            Some(id) => CacheKey::Subtree(id),
            None => CacheKey::Empty,
        }
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Subtree(id) => write!(f, "{id}"),
            CacheKey::Empty => f.write_str("empty"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    use pretty_assertions::assert_eq;

    fn baseline(commit: &str, subtree: Option<&str>) -> BaselineHandle {
        BaselineHandle {
            reference: "master".to_owned(),
            commit: Oid::from_str(commit).unwrap(),
            project: PathBuf::from("clean"),
            subtree: subtree.map(|s| Oid::from_str(s).unwrap()),
        }
    }

    #[test]
    fn key_ignores_the_commit() {
        let tree = "65fdd75c1ae00c0646f6487d68c44ddca51f0841";
        let before = baseline("ebb03d6940ee0254010e71917735efa203c27e16", Some(tree));
        let after = baseline("4cfc3358ccbf186738b82a60276b1e5306bc3870", Some(tree));
        assert_eq!(CacheKey::from(&before), CacheKey::from(&after));
        assert_eq!(CacheKey::from(&before).to_string(), tree);
    }

    #[test]
    fn missing_project_has_empty_key() {
        let key = CacheKey::from(&baseline("ebb03d6940ee0254010e71917735efa203c27e16", None));
        assert_eq!(key, CacheKey::Empty);
        assert_eq!(key.to_string(), "empty");
    }
}
