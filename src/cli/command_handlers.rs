use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use anyhow::{anyhow, Context};
use log::{debug, error, info, warn};
use tokio::task::JoinSet;

use crate::{
    api::{Mode, TaskOutcome, TaskReport},
    format::{FormatError, FormatTask},
    git::tree_path,
    history::{Fingerprint, TaskHistory},
    model::{Descriptor, FormatDescriptor},
    ratchet::{CacheKey, Ratchet, RatchetContext},
};

/// Handler to check and apply commands, running every format task of every
/// project with one blocking worker per project.
///
/// A task that fails is reported as [`TaskOutcome::Failed`] and forgotten by
/// the history; the other tasks still run and are recorded.
pub async fn do_run(
    mode: Mode,
    root: &Path,
    descriptor: &Descriptor,
    ratchet_from: &str,
    cache_directory: &Path,
) -> anyhow::Result<Vec<TaskReport>> {
    let context = Arc::new(RatchetContext::open(root, ratchet_from)?);
    let tasks = Arc::new(
        descriptor
            .formats
            .iter()
            .map(|f| FormatTask::new(&f.name, &f.target, f.steps.clone()))
            .collect::<Result<Vec<_>, _>>()?,
    );
    let history = Arc::new(Mutex::new(TaskHistory::open(cache_directory)?));
    let excluded = Arc::new(vec![cache_directory.to_path_buf()]);

    let mut workers = JoinSet::new();
    for project in &descriptor.projects {
        let repo_project = repo_relative(root, context.workdir(), project)?;
        let project = project.clone();
        let context = Arc::clone(&context);
        let tasks = Arc::clone(&tasks);
        let history = Arc::clone(&history);
        let excluded = Arc::clone(&excluded);
        workers.spawn_blocking(move || {
            let project = Project {
                path: &project,
                repo_path: &repo_project,
                excluded: &excluded,
            };
            run_project(mode, &context, &tasks, &history, project)
        });
    }

    let mut reports = tokio::select! {
        reports = collect_reports(&mut workers) => reports,
        _ = tokio::signal::ctrl_c() => Err(anyhow!("Interrupted, abandoning the formatting run")),
    }?;
    reports.sort_by(|a, b| (&a.project, &a.format).cmp(&(&b.project, &b.format)));

    lock(&history).save()?;
    let failed = reports
        .iter()
        .filter(|r| r.outcome == TaskOutcome::Failed)
        .count();
    if failed > 0 {
        warn!("{} format task(s) failed", failed);
    }
    Ok(reports)
}

/// Handler to keys command
pub fn do_keys(
    root: &Path,
    projects: &[PathBuf],
    ratchet_from: &str,
) -> anyhow::Result<Vec<(PathBuf, CacheKey)>> {
    let context = RatchetContext::open(root, ratchet_from)?;
    projects
        .iter()
        .map(|project| {
            let repo_project = repo_relative(root, context.workdir(), project)?;
            Ok((project.clone(), context.cache_key_for(&repo_project)?))
        })
        .collect()
}

/// Handler to status command
/// Paths are relative to the project directory.
pub fn do_status(
    root: &Path,
    project: &Path,
    paths: &[PathBuf],
    ratchet_from: &str,
) -> anyhow::Result<Vec<(PathBuf, bool)>> {
    let context = RatchetContext::open(root, ratchet_from)?;
    let repo_project = repo_relative(root, context.workdir(), project)?;
    paths
        .iter()
        .map(|path| Ok((path.clone(), context.is_clean(&repo_project, path)?)))
        .collect()
}

/// Handler to init command
pub fn do_init(
    root: &Path,
    module_file_name: &Path,
    ratchet_from: Option<String>,
) -> anyhow::Result<()> {
    let module_file_path = root.join(module_file_name);
    if module_file_path.exists() {
        return Err(anyhow!(
            "File already exists: {}",
            module_file_path.display()
        ));
    }
    let descriptor = Descriptor {
        ratchet_from: Some(ratchet_from.unwrap_or_else(|| "origin/main".to_owned())),
        projects: vec![PathBuf::from(".")],
        formats: vec![FormatDescriptor {
            name: "misc".to_owned(),
            target: r"\.md$".to_owned(),
            steps: vec![
                crate::format::Step::TrimTrailingWhitespace,
                crate::format::Step::EndWithNewline,
            ],
        }],
    };
    std::fs::write(&module_file_path, toml::to_string_pretty(&descriptor)?)?;
    info!("Wrote {}", module_file_path.display());
    Ok(())
}

pub fn do_clear_cache(cache_directory: &Path) -> anyhow::Result<()> {
    if cache_directory.exists() {
        info!("Clearing task history in {}.", cache_directory.display());
        TaskHistory::open(cache_directory)?.clear()?;
    }
    Ok(())
}

struct Project<'a> {
    /// As configured, relative to the root.
    path: &'a Path,
    /// Relative to the git work tree.
    repo_path: &'a Path,
    excluded: &'a [PathBuf],
}

fn run_project(
    mode: Mode,
    context: &RatchetContext,
    tasks: &[FormatTask],
    history: &Mutex<TaskHistory>,
    project: Project<'_>,
) -> anyhow::Result<Vec<TaskReport>> {
    let ratchet = context.ratchet_for(project.repo_path)?;
    let project_dir = ratchet.project_dir();
    if !project_dir.is_dir() {
        warn!(
            "Project directory {} does not exist, skipping",
            project_dir.display()
        );
        return Ok(Vec::new());
    }

    let mut reports = Vec::new();
    for task in tasks {
        let name = task_name(project.repo_path, task.name())?;
        let mut report = TaskReport {
            project: project.path.to_path_buf(),
            format: task.name().to_owned(),
            outcome: TaskOutcome::UpToDate,
            checked: 0,
            skipped: 0,
            violations: Vec::new(),
            formatted: Vec::new(),
            error: None,
        };
        if let Err(e) = run_task(
            mode,
            &ratchet,
            task,
            history,
            &name,
            project.excluded,
            &mut report,
        ) {
            error!("{} failed: {}", name, e);
            lock(history).forget(&name);
            report.outcome = TaskOutcome::Failed;
            report.error = Some(e.to_string());
        }
        reports.push(report);
    }
    Ok(reports)
}

fn run_task(
    mode: Mode,
    ratchet: &Ratchet,
    task: &FormatTask,
    history: &Mutex<TaskHistory>,
    name: &str,
    excluded: &[PathBuf],
    report: &mut TaskReport,
) -> Result<(), FormatError> {
    let project_dir = ratchet.project_dir();
    let files = task.target_files(project_dir, excluded)?;
    let fingerprint = Fingerprint::compute(ratchet.cache_key(), task.steps(), project_dir, &files)?;

    if lock(history).is_up_to_date(name, &fingerprint) {
        info!("{} is up to date", name);
        return Ok(());
    }
    report.outcome = TaskOutcome::Executed;

    match mode {
        Mode::Check => {
            let check = task.check(ratchet, &files)?;
            let mut history = lock(history);
            if check.passed() {
                history.record(name, fingerprint);
            } else {
                history.forget(name);
            }
            report.checked = check.checked;
            report.skipped = check.skipped;
            report.violations = check.violations;
        }
        Mode::Apply => {
            let apply = task.apply(ratchet, &files)?;
            let fingerprint = if apply.formatted.is_empty() {
                fingerprint
            } else {
                Fingerprint::compute(ratchet.cache_key(), task.steps(), project_dir, &files)?
            };
            lock(history).record(name, fingerprint);
            report.checked = apply.checked;
            report.skipped = apply.skipped;
            report.formatted = apply.formatted;
        }
    }
    debug!(
        "{}: {} checked, {} exempt by ratchet",
        name, report.checked, report.skipped
    );
    Ok(())
}

async fn collect_reports(
    workers: &mut JoinSet<anyhow::Result<Vec<TaskReport>>>,
) -> anyhow::Result<Vec<TaskReport>> {
    let mut reports = Vec::new();
    while let Some(joined) = workers.join_next().await {
        reports.extend(joined??);
    }
    Ok(reports)
}

/// `project` is relative to `root`; the ratchet wants it relative to the work tree.
fn repo_relative(root: &Path, workdir: &Path, project: &Path) -> anyhow::Result<PathBuf> {
    let canonical_root = root
        .canonicalize()
        .with_context(|| format!("Error while canonicalizing path {}", root.display()))?;
    let canonical_workdir = workdir
        .canonicalize()
        .with_context(|| format!("Error while canonicalizing path {}", workdir.display()))?;
    let relative = canonical_root
        .strip_prefix(&canonical_workdir)
        .with_context(|| {
            format!(
                "{} is not inside the git work tree {}",
                root.display(),
                workdir.display()
            )
        })?;
    Ok(relative.join(project))
}

fn task_name(repo_project: &Path, format: &str) -> anyhow::Result<String> {
    let project = tree_path(repo_project)?;
    if project.is_empty() {
        Ok(format!(".:{format}"))
    } else {
        Ok(format!("{project}:{format}"))
    }
}

fn lock(history: &Mutex<TaskHistory>) -> MutexGuard<'_, TaskHistory> {
    history.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn task_names() {
        assert_eq!(task_name(Path::new("."), "misc").unwrap(), ".:misc");
        assert_eq!(task_name(Path::new(""), "misc").unwrap(), ".:misc");
        assert_eq!(task_name(Path::new("clean"), "misc").unwrap(), "clean:misc");
        assert_eq!(
            task_name(Path::new("./libs/core"), "java").unwrap(),
            "libs/core:java"
        );
    }

    #[test]
    fn projects_are_made_repository_relative() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir_all(&sub).unwrap();
        assert_eq!(
            repo_relative(&sub, dir.path(), Path::new("clean")).unwrap(),
            PathBuf::from("sub/clean")
        );
        assert_eq!(
            tree_path(&repo_relative(dir.path(), dir.path(), Path::new(".")).unwrap()).unwrap(),
            ""
        );
        assert!(repo_relative(dir.path(), &sub, Path::new(".")).is_err());
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        do_init(dir.path(), Path::new("fmt-ratchet.toml"), Some("master".to_owned())).unwrap();
        let descriptor = Descriptor::from_file(&dir.path().join("fmt-ratchet.toml")).unwrap();
        assert_eq!(descriptor.ratchet_from.as_deref(), Some("master"));
        assert!(do_init(dir.path(), Path::new("fmt-ratchet.toml"), None).is_err());
    }
}
