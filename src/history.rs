use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use git2::{ObjectType, Oid};
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    flock::FileLock,
    format::{unix_path, FormatError, Step},
    ratchet::CacheKey,
};

const HISTORY_FILE: &str = "history.toml";
const LOCK_FILE: &str = ".lock";
/// Recorded in place of a blob id for targets that cannot be read because
/// they do not exist, such as dangling symlinks.
const ABSENT: &str = "absent";

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Cache location {location} is not a directory")]
    BadLocation { location: PathBuf },
    #[error("Cache lock cannot be acquired")]
    Lock(#[from] crate::flock::Error),
    #[error("Could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Could not serialize task history: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
}

/// Everything a task's result depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub ratchet_key: String,
    pub steps: Vec<String>,
    /// Project-relative path to the blob id of its current content.
    pub files: BTreeMap<String, String>,
}

impl Fingerprint {
    pub fn compute(
        ratchet_key: CacheKey,
        steps: &[Step],
        project_dir: &Path,
        files: &[PathBuf],
    ) -> Result<Fingerprint, FormatError> {
        let mut hashes = BTreeMap::new();
        for file in files {
            let path = project_dir.join(file);
            let id = match std::fs::read(&path) {
                Ok(bytes) => Oid::hash_object(ObjectType::Blob, &bytes)
                    .map_err(|e| FormatError::IO {
                        path: path.clone(),
                        source: std::io::Error::other(e),
                    })?
                    .to_string(),
                Err(e) if e.kind() == ErrorKind::NotFound => ABSENT.to_owned(),
                Err(source) => {
                    return Err(FormatError::IO {
                        path: path.clone(),
                        source,
                    })
                }
            };
            let key = unix_path(file).ok_or(FormatError::NotUtf8 { path })?;
            hashes.insert(key, id);
        }
        Ok(Fingerprint {
            ratchet_key: ratchet_key.to_string(),
            steps: steps.iter().map(ToString::to_string).collect(),
            files: hashes,
        })
    }
}

/// Persisted fingerprints of the last successful run of each task.
///
/// The cache directory stays locked for as long as the history is open.
pub struct TaskHistory {
    path: PathBuf,
    tasks: BTreeMap<String, Fingerprint>,
    _lock: FileLock,
}

#[derive(Default, Serialize, Deserialize)]
struct HistoryFile {
    #[serde(default)]
    tasks: BTreeMap<String, Fingerprint>,
}

impl TaskHistory {
    pub fn open(location: &Path) -> Result<TaskHistory, HistoryError> {
        if location.exists() {
            if !location.is_dir() {
                return Err(HistoryError::BadLocation {
                    location: location.to_path_buf(),
                });
            }
        } else {
            std::fs::create_dir_all(location)?;
        }

        let lock = FileLock::new(&location.join(LOCK_FILE))?;
        debug!("Acquired a lock on the cache location {}", location.display());

        let path = location.join(HISTORY_FILE);
        let tasks = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            toml::from_str::<HistoryFile>(&contents)
                .map_err(|source| HistoryError::Parse {
                    path: path.clone(),
                    source,
                })?
                .tasks
        } else {
            BTreeMap::new()
        };

        Ok(TaskHistory {
            path,
            tasks,
            _lock: lock,
        })
    }

    pub fn is_up_to_date(&self, task: &str, fingerprint: &Fingerprint) -> bool {
        let up_to_date = self.tasks.get(task) == Some(fingerprint);
        trace!("Task {} up to date: {}", task, up_to_date);
        up_to_date
    }

    pub fn record(&mut self, task: &str, fingerprint: Fingerprint) {
        self.tasks.insert(task.to_owned(), fingerprint);
    }

    pub fn forget(&mut self, task: &str) {
        self.tasks.remove(task);
    }

    pub fn save(&self) -> Result<(), HistoryError> {
        let file = HistoryFile {
            tasks: self.tasks.clone(),
        };
        std::fs::write(&self.path, toml::to_string_pretty(&file)?)?;
        info!("Wrote task history to {}", self.path.display());
        Ok(())
    }

    /// Forgets every task and removes the history file.
    pub fn clear(&mut self) -> Result<(), HistoryError> {
        self.tasks.clear();
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
