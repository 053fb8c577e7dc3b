mod steps;

use std::path::{Path, PathBuf};

use log::{debug, info, trace};
use regex_lite::Regex;
use thiserror::Error;

use crate::ratchet::{Ratchet, RatchetError};

pub use steps::Step;

#[derive(Error, Debug)]
pub enum FormatError {
    #[error(transparent)]
    Ratchet(#[from] RatchetError),
    #[error("Invalid target pattern `{pattern}`: {source}")]
    BadTarget {
        pattern: String,
        source: regex_lite::Error,
    },
    #[error("{path} is not valid UTF-8")]
    NotUtf8 { path: PathBuf },
    #[error("IO error on {path}: {source}")]
    IO {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A named set of steps applied to every file of a project matching `target`.
#[derive(Debug, Clone)]
pub struct FormatTask {
    name: String,
    target: Regex,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub checked: usize,
    /// Files exempt from formatting because they are unchanged since the baseline.
    pub skipped: usize,
    pub violations: Vec<PathBuf>,
}

impl CheckReport {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub checked: usize,
    pub skipped: usize,
    pub formatted: Vec<PathBuf>,
}

impl FormatTask {
    pub fn new(
        name: impl Into<String>,
        target: &str,
        steps: Vec<Step>,
    ) -> Result<FormatTask, FormatError> {
        let target = Regex::new(target).map_err(|source| FormatError::BadTarget {
            pattern: target.to_owned(),
            source,
        })?;
        Ok(FormatTask {
            name: name.into(),
            target,
            steps,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Project-relative paths of every file below `project_dir` whose
    /// `/`-separated path matches the target pattern, sorted.
    ///
    /// `excluded` paths, such as the task history, are never walked. Symlinks
    /// to directories are not followed.
    pub fn target_files(
        &self,
        project_dir: &Path,
        excluded: &[PathBuf],
    ) -> Result<Vec<PathBuf>, FormatError> {
        fn walk(
            dir: &Path,
            relative: &Path,
            target: &Regex,
            excluded: &[PathBuf],
            out: &mut Vec<PathBuf>,
        ) -> Result<(), FormatError> {
            let entries = std::fs::read_dir(dir).map_err(|source| FormatError::IO {
                path: dir.to_path_buf(),
                source,
            })?;
            for entry in entries {
                let entry = entry.map_err(|source| FormatError::IO {
                    path: dir.to_path_buf(),
                    source,
                })?;
                let name = entry.file_name();
                let path = entry.path();
                if name == ".git" || excluded.contains(&path) {
                    trace!("Not walking {}", path.display());
                    continue;
                }
                let file_type = entry.file_type().map_err(|source| FormatError::IO {
                    path: path.clone(),
                    source,
                })?;
                let relative = relative.join(&name);
                if file_type.is_dir() {
                    walk(&path, &relative, target, excluded, out)?;
                } else if file_type.is_symlink() && path.is_dir() {
                    debug!("Not following symlinked directory {}", path.display());
                } else if let Some(unix) = unix_path(&relative) {
                    if target.is_match(&unix) {
                        out.push(relative);
                    }
                }
            }
            Ok(())
        }

        let canonical = |path: &Path| {
            path.canonicalize().map_err(|source| FormatError::IO {
                path: path.to_path_buf(),
                source,
            })
        };
        let root = canonical(project_dir)?;
        // paths that do not exist yet cannot be walked into either
        let excluded: Vec<PathBuf> = excluded
            .iter()
            .filter_map(|path| canonical(path).ok())
            .collect();

        let mut files = Vec::new();
        walk(&root, Path::new(""), &self.target, &excluded, &mut files)?;
        files.sort();
        debug!(
            "Task {} targets {} files in {}",
            self.name,
            files.len(),
            project_dir.display()
        );
        Ok(files)
    }

    /// Clean files pass without being looked at; dirty files must already be
    /// formatted.
    pub fn check(&self, ratchet: &Ratchet, files: &[PathBuf]) -> Result<CheckReport, FormatError> {
        let mut report = CheckReport::default();
        for file in files {
            if ratchet.is_clean(file)? {
                report.skipped += 1;
                continue;
            }
            report.checked += 1;
            let (raw, formatted) = self.format_file(ratchet.project_dir(), file)?;
            if raw != formatted {
                info!("{} is not formatted ({})", file.display(), self.name);
                report.violations.push(file.clone());
            }
        }
        Ok(report)
    }

    /// Rewrites dirty files that the steps would change. Clean files are
    /// never touched.
    pub fn apply(&self, ratchet: &Ratchet, files: &[PathBuf]) -> Result<ApplyReport, FormatError> {
        let mut report = ApplyReport::default();
        for file in files {
            if ratchet.is_clean(file)? {
                report.skipped += 1;
                continue;
            }
            report.checked += 1;
            let (raw, formatted) = self.format_file(ratchet.project_dir(), file)?;
            if raw != formatted {
                let path = ratchet.project_dir().join(file);
                std::fs::write(&path, formatted)
                    .map_err(|source| FormatError::IO { path, source })?;
                info!("Formatted {} ({})", file.display(), self.name);
                report.formatted.push(file.clone());
            }
        }
        Ok(report)
    }

    fn format_file(&self, project_dir: &Path, file: &Path) -> Result<(String, String), FormatError> {
        let path = project_dir.join(file);
        let bytes = std::fs::read(&path).map_err(|source| FormatError::IO {
            path: path.clone(),
            source,
        })?;
        let raw = String::from_utf8(bytes).map_err(|_| FormatError::NotUtf8 { path })?;
        let formatted = self
            .steps
            .iter()
            .fold(raw.clone(), |content, step| step.apply(&content));
        trace!("Formatted {} in memory", file.display());
        Ok((raw, formatted))
    }
}

/// `/`-joined form of a relative path, as matched by target patterns.
pub(crate) fn unix_path(path: &Path) -> Option<String> {
    let segments: Option<Vec<&str>> = path.iter().map(|s| s.to_str()).collect();
    segments.map(|s| s.join("/"))
}
