use std::path::{Path, PathBuf};

use crate::{
    cli::command_handlers::{do_clear_cache, do_keys, do_run, do_status},
    model::Descriptor,
    ratchet::CacheKey,
};

mod builder;

pub use builder::FmtRatchetBuilder;

pub struct FmtRatchet {
    root: PathBuf,
    descriptor: Descriptor,
    ratchet_from: String,
    cache_directory: PathBuf,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Mode {
    /// Fail on dirty files that are not formatted. Clean files always pass.
    Check,
    /// Format dirty files in place. Clean files are never written.
    Apply,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TaskOutcome {
    /// Nothing the task depends on changed since its last successful run.
    UpToDate,
    Executed,
    /// The task could not finish, see [`TaskReport::error`]. Other tasks
    /// still ran.
    Failed,
}

/// Result of one format task in one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub project: PathBuf,
    pub format: String,
    pub outcome: TaskOutcome,
    pub checked: usize,
    pub skipped: usize,
    pub violations: Vec<PathBuf>,
    pub formatted: Vec<PathBuf>,
    pub error: Option<String>,
}

impl TaskReport {
    pub fn passed(&self) -> bool {
        self.violations.is_empty() && self.error.is_none()
    }
}

impl FmtRatchet {
    pub fn builder() -> FmtRatchetBuilder {
        FmtRatchetBuilder::default()
    }

    pub fn ratchet_from(&self) -> &str {
        &self.ratchet_from
    }

    /// Checks every dirty file of every project against its format tasks
    pub async fn check(&self) -> anyhow::Result<Vec<TaskReport>> {
        self.run(Mode::Check).await
    }

    /// Formats every dirty file of every project in place
    pub async fn apply(&self) -> anyhow::Result<Vec<TaskReport>> {
        self.run(Mode::Apply).await
    }

    pub async fn run(&self, mode: Mode) -> anyhow::Result<Vec<TaskReport>> {
        do_run(
            mode,
            &self.root,
            &self.descriptor,
            &self.ratchet_from,
            &self.cache_directory,
        )
        .await
    }

    /// Up-to-date key of each configured project at the current baseline
    pub fn cache_keys(&self) -> anyhow::Result<Vec<(PathBuf, CacheKey)>> {
        do_keys(&self.root, &self.descriptor.projects, &self.ratchet_from)
    }

    /// Clean/dirty verdict for each path, relative to `project`
    pub fn status(
        &self,
        project: impl AsRef<Path>,
        paths: &[PathBuf],
    ) -> anyhow::Result<Vec<(PathBuf, bool)>> {
        do_status(&self.root, project.as_ref(), paths, &self.ratchet_from)
    }

    pub fn clear_cache(&self) -> anyhow::Result<()> {
        do_clear_cache(&self.cache_directory)
    }
}
