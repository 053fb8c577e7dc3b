use std::{fs::File, path::Path};

use fs4::fs_std::FileExt;
use log::debug;
use thiserror::Error;

/// Exclusive advisory lock, held until dropped.
pub struct FileLock {
    _file: File,
}

#[derive(Error, Debug)]
#[error(transparent)]
pub struct Error(#[from] std::io::Error);

impl FileLock {
    /// Blocks until no other process holds the lock.
    pub fn new(path: &Path) -> Result<Self, Error> {
        let file = File::create(path)?;
        debug!("Waiting for a lock on {}", path.display());
        FileExt::lock_exclusive(&file)?;
        Ok(Self { _file: file })
    }
}
