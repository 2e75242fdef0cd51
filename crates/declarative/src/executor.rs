//! Execution engine - converges a destination one entry at a time

use crate::context::{ApplyContext, NoProgress, NoTemplates};
use crate::diff::{Desired, compute_diff};
use crate::entry::{EntryKind, TargetEntry};
use crate::error::{Error, Result};
use crate::planner::ApplyPlan;
use crate::scripts::{record_run, should_run};
use crate::types::{Action, ApplyOptions, ApplyResult, ApplySummary, EntryFailure};
use std::path::{Path, PathBuf};
use system::{FileKind, System};

/// Converge every entry of `plan` through `system`
///
/// Entries are applied in plan order. A failing entry is recorded in the
/// summary and the pass moves on, unless `opts.keep_going` is false. Errors
/// reaching the destination root abort the pass and are returned directly.
pub fn apply<S: System + ?Sized>(
    plan: &ApplyPlan,
    system: &mut S,
    opts: &ApplyOptions,
    ctx: &mut ApplyContext<'_>,
) -> Result<ApplySummary> {
    check_root(system, &opts.dest_dir)?;

    let mut summary = ApplySummary::default();
    for entry in &plan.entries {
        ctx.progress.on_entry_start(&entry.path);
        match apply_entry(entry, system, opts, ctx) {
            Ok(result) => {
                ctx.progress.on_entry_complete(&entry.path, &result);
                summary.add_result(&result);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                log::warn!("{}: {e}", entry.path);
                ctx.progress.on_entry_complete(
                    &entry.path,
                    &ApplyResult::Failed {
                        error: e.to_string(),
                    },
                );
                summary.failures.push(EntryFailure {
                    path: entry.path.clone(),
                    error: e,
                });
                if !opts.keep_going {
                    break;
                }
            }
        }
    }

    log::info!(
        "applied {} entries: {} changed, {} failed",
        summary.total(),
        summary.total_changes(),
        summary.failures.len()
    );
    Ok(summary)
}

/// Apply without templates, encryption or progress reporting
pub fn apply_simple<S: System + ?Sized>(
    plan: &ApplyPlan,
    system: &mut S,
    opts: &ApplyOptions,
) -> Result<ApplySummary> {
    let mut templates = NoTemplates;
    let mut progress = NoProgress;
    let mut ctx = ApplyContext::new(&mut templates, &mut progress);
    apply(plan, system, opts, &mut ctx)
}

/// An empty root means entry paths are used unprefixed
fn check_root<S: System + ?Sized>(system: &S, dest_dir: &Path) -> Result<()> {
    if dest_dir.as_os_str().is_empty() {
        return Ok(());
    }
    let info = system.stat(dest_dir).map_err(|source| Error::DestinationRoot {
        path: dest_dir.to_path_buf(),
        source,
    })?;
    if info.kind != FileKind::Dir {
        return Err(Error::DestinationNotDir {
            path: dest_dir.to_path_buf(),
            kind: info.kind,
        });
    }
    Ok(())
}

fn target_path(dest_dir: &Path, relative: &str) -> PathBuf {
    if dest_dir.as_os_str().is_empty() {
        PathBuf::from(relative)
    } else {
        dest_dir.join(relative)
    }
}

fn apply_entry<S: System + ?Sized>(
    entry: &TargetEntry,
    system: &mut S,
    opts: &ApplyOptions,
    ctx: &mut ApplyContext<'_>,
) -> Result<ApplyResult> {
    let path = target_path(&opts.dest_dir, &entry.path);

    let desired = match &entry.kind {
        EntryKind::Script {
            contents,
            condition,
        } => {
            let contents = contents.resolve(&entry.path, ctx)?;
            if contents.iter().all(u8::is_ascii_whitespace) {
                return Ok(ApplyResult::Skipped {
                    reason: "empty script".into(),
                });
            }
            if !should_run(&*system, &entry.path, &contents, *condition)? {
                return Ok(ApplyResult::NoChange);
            }
            let action = Action::RunScript {
                contents: contents.clone(),
            };
            ctx.progress.on_action(&entry.path, &action);
            if opts.dry_run {
                return Ok(dry_run_result());
            }
            perform(system, &path, &action)?;
            record_run(system, &entry.path, &contents, *condition)?;
            return Ok(ApplyResult::Ran);
        }
        EntryKind::File { contents, mode } => Desired::File {
            contents: contents.resolve(&entry.path, ctx)?,
            mode: *mode,
        },
        EntryKind::Dir { mode } => Desired::Dir { mode: *mode },
        EntryKind::Symlink { target } => Desired::Symlink {
            target: target.clone(),
        },
        EntryKind::Remove => Desired::Absent,
    };

    let diff = compute_diff(&*system, &path, &desired)?;
    if diff.is_empty() {
        return Ok(ApplyResult::NoChange);
    }
    for action in &diff.actions {
        ctx.progress.on_action(&entry.path, action);
    }
    if opts.dry_run {
        return Ok(dry_run_result());
    }
    for action in &diff.actions {
        perform(system, &path, action)?;
    }
    Ok(diff.outcome)
}

fn dry_run_result() -> ApplyResult {
    ApplyResult::Skipped {
        reason: "dry run".into(),
    }
}

fn perform<S: System + ?Sized>(system: &mut S, path: &Path, action: &Action) -> Result<()> {
    log::debug!("{}: {action}", path.display());
    match action {
        Action::Mkdir { mode } => system.mkdir(path, *mode)?,
        Action::WriteFile { contents, mode } => system.write_file(path, contents, *mode)?,
        Action::WriteSymlink { target } => system.write_symlink(target, path)?,
        Action::Chmod { mode } => system.chmod(path, *mode)?,
        Action::RemoveAll => system.remove_all(path)?,
        Action::RunScript { contents } => system.run_script(path, contents)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TemplateEngine;
    use crate::entry::Contents;
    use crate::types::RunCondition;
    use std::process::Command;
    use system::{
        FileInfo, MemoryPersistentState, Mode, NullSystem, PersistentState, RealSystem,
    };
    use tempfile::TempDir;

    /// Real filesystem that counts mutations and records scripts instead of
    /// executing them
    struct Recorder {
        inner: RealSystem<MemoryPersistentState>,
        mutations: usize,
        scripts: Vec<(PathBuf, Vec<u8>)>,
        fail_scripts: bool,
    }

    impl Default for Recorder {
        fn default() -> Self {
            Self {
                inner: RealSystem::new(MemoryPersistentState::new()),
                mutations: 0,
                scripts: Vec::new(),
                fail_scripts: false,
            }
        }
    }

    impl PersistentState for Recorder {
        fn get(&self, bucket: &str, key: &[u8]) -> system::Result<Option<Vec<u8>>> {
            self.inner.get(bucket, key)
        }

        fn set(&mut self, bucket: &str, key: &[u8], value: &[u8]) -> system::Result<()> {
            self.inner.set(bucket, key, value)
        }

        fn delete(&mut self, bucket: &str, key: &[u8]) -> system::Result<()> {
            self.inner.delete(bucket, key)
        }
    }

    impl System for Recorder {
        fn chmod(&mut self, path: &Path, mode: Mode) -> system::Result<()> {
            self.mutations += 1;
            self.inner.chmod(path, mode)
        }

        fn glob(&self, pattern: &str) -> system::Result<Vec<PathBuf>> {
            self.inner.glob(pattern)
        }

        fn idempotent_cmd_output(&self, cmd: &mut Command) -> system::Result<Vec<u8>> {
            self.inner.idempotent_cmd_output(cmd)
        }

        fn lstat(&self, path: &Path) -> system::Result<FileInfo> {
            self.inner.lstat(path)
        }

        fn mkdir(&mut self, path: &Path, mode: Mode) -> system::Result<()> {
            self.mutations += 1;
            self.inner.mkdir(path, mode)
        }

        fn read_dir(&self, path: &Path) -> system::Result<Vec<FileInfo>> {
            self.inner.read_dir(path)
        }

        fn read_file(&self, path: &Path) -> system::Result<Vec<u8>> {
            self.inner.read_file(path)
        }

        fn readlink(&self, path: &Path) -> system::Result<PathBuf> {
            self.inner.readlink(path)
        }

        fn remove_all(&mut self, path: &Path) -> system::Result<()> {
            self.mutations += 1;
            self.inner.remove_all(path)
        }

        fn rename(&mut self, old: &Path, new: &Path) -> system::Result<()> {
            self.mutations += 1;
            self.inner.rename(old, new)
        }

        fn run_script(&mut self, name: &Path, contents: &[u8]) -> system::Result<()> {
            if self.fail_scripts {
                return Err(system::Error::CommandFailed {
                    command: name.display().to_string(),
                    message: "exit status: 1".into(),
                });
            }
            self.mutations += 1;
            self.scripts.push((name.to_path_buf(), contents.to_vec()));
            Ok(())
        }

        fn stat(&self, path: &Path) -> system::Result<FileInfo> {
            self.inner.stat(path)
        }

        fn write_file(&mut self, path: &Path, data: &[u8], mode: Mode) -> system::Result<()> {
            self.mutations += 1;
            self.inner.write_file(path, data, mode)
        }

        fn write_symlink(&mut self, target: &Path, link: &Path) -> system::Result<()> {
            self.mutations += 1;
            self.inner.write_symlink(target, link)
        }
    }

    fn tree() -> ApplyPlan {
        let mut entries = vec![
            TargetEntry::dir(".config", Mode::new(0o755)),
            TargetEntry::file(".config/app.toml", "key = 1\n", Mode::new(0o644)),
            TargetEntry::file(".bashrc", "set -o vi\n", Mode::new(0o600)),
            TargetEntry::remove(".old"),
        ];
        if cfg!(unix) {
            entries.push(TargetEntry::symlink(".vimrc", ".config/app.toml"));
        }
        ApplyPlan::new(entries)
    }

    #[test]
    fn test_apply_creates_tree() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".old"), "stale").unwrap();
        let mut system = Recorder::default();

        let summary = apply_simple(&tree(), &mut system, &ApplyOptions::new(temp.path())).unwrap();

        assert!(summary.is_success());
        assert_eq!(summary.removed, 1);
        assert_eq!(
            std::fs::read_to_string(temp.path().join(".config/app.toml")).unwrap(),
            "key = 1\n"
        );
        assert!(!temp.path().join(".old").exists());
    }

    #[test]
    fn test_second_pass_makes_no_mutations() {
        let temp = TempDir::new().unwrap();
        let opts = ApplyOptions::new(temp.path());
        let mut system = Recorder::default();

        let first = apply_simple(&tree(), &mut system, &opts).unwrap();
        assert!(first.total_changes() > 0);
        let after_first = system.mutations;

        let second = apply_simple(&tree(), &mut system, &opts).unwrap();
        assert_eq!(system.mutations, after_first);
        assert_eq!(second.total_changes(), 0);
        assert_eq!(second.no_change, tree().len());
    }

    #[test]
    fn test_once_script_runs_once() {
        let temp = TempDir::new().unwrap();
        let opts = ApplyOptions::new(temp.path());
        let plan = ApplyPlan::new(vec![TargetEntry::script(
            "install.sh",
            "echo hi",
            RunCondition::Once,
        )]);
        let mut system = Recorder::default();

        for _ in 0..3 {
            apply_simple(&plan, &mut system, &opts).unwrap();
        }
        assert_eq!(system.scripts.len(), 1);
        assert_eq!(system.scripts[0].0, temp.path().join("install.sh"));
    }

    #[test]
    fn test_onchange_script_runs_once_per_hash() {
        let temp = TempDir::new().unwrap();
        let opts = ApplyOptions::new(temp.path());
        let plan = |body: &str| {
            ApplyPlan::new(vec![TargetEntry::script(
                "sync.sh",
                body,
                RunCondition::OnChange,
            )])
        };
        let mut system = Recorder::default();

        for body in ["v1", "v1", "v2", "v2", "v2", "v1"] {
            apply_simple(&plan(body), &mut system, &opts).unwrap();
        }
        let bodies: Vec<&[u8]> = system.scripts.iter().map(|(_, c)| c.as_slice()).collect();
        assert_eq!(bodies, vec![b"v1".as_slice(), b"v2", b"v1"]);
    }

    #[test]
    fn test_always_script_runs_every_pass() {
        let temp = TempDir::new().unwrap();
        let opts = ApplyOptions::new(temp.path());
        let plan = ApplyPlan::new(vec![TargetEntry::script(
            "run.sh",
            "true",
            RunCondition::Always,
        )]);
        let mut system = Recorder::default();
        apply_simple(&plan, &mut system, &opts).unwrap();
        apply_simple(&plan, &mut system, &opts).unwrap();
        assert_eq!(system.scripts.len(), 2);
    }

    #[test]
    fn test_failed_script_is_not_recorded() {
        let temp = TempDir::new().unwrap();
        let opts = ApplyOptions::new(temp.path());
        let plan = ApplyPlan::new(vec![TargetEntry::script(
            "install.sh",
            "exit 1",
            RunCondition::Once,
        )]);
        let mut system = Recorder {
            fail_scripts: true,
            ..Recorder::default()
        };

        let summary = apply_simple(&plan, &mut system, &opts).unwrap();
        assert_eq!(summary.failures.len(), 1);

        system.fail_scripts = false;
        apply_simple(&plan, &mut system, &opts).unwrap();
        assert_eq!(system.scripts.len(), 1);
    }

    #[test]
    fn test_empty_script_skipped() {
        let temp = TempDir::new().unwrap();
        let plan = ApplyPlan::new(vec![TargetEntry::script(
            "empty.sh",
            "  \n",
            RunCondition::Always,
        )]);
        let mut system = Recorder::default();
        let summary = apply_simple(&plan, &mut system, &ApplyOptions::new(temp.path())).unwrap();
        assert_eq!(summary.skipped, 1);
        assert!(system.scripts.is_empty());
    }

    #[test]
    fn test_partial_failure_continues() {
        let temp = TempDir::new().unwrap();
        let plan = ApplyPlan::new(vec![
            TargetEntry::file("a", "file", Mode::new(0o644)),
            TargetEntry::file("a/b", "nested under a file", Mode::new(0o644)),
            TargetEntry::file("c", "ok", Mode::new(0o644)),
        ]);
        let mut system = Recorder::default();

        let summary = apply_simple(&plan, &mut system, &ApplyOptions::new(temp.path())).unwrap();

        assert!(!summary.is_success());
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].path, "a/b");
        assert_eq!(summary.created, 2);
        assert!(temp.path().join("c").exists());
    }

    #[test]
    fn test_stop_on_first_failure() {
        let temp = TempDir::new().unwrap();
        let plan = ApplyPlan::new(vec![
            TargetEntry::file("a", "file", Mode::new(0o644)),
            TargetEntry::file("a/b", "nested under a file", Mode::new(0o644)),
            TargetEntry::file("c", "ok", Mode::new(0o644)),
        ]);
        let opts = ApplyOptions {
            keep_going: false,
            ..ApplyOptions::new(temp.path())
        };
        let mut system = Recorder::default();

        let summary = apply_simple(&plan, &mut system, &opts).unwrap();
        assert_eq!(summary.failures.len(), 1);
        assert!(!temp.path().join("c").exists());
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let temp = TempDir::new().unwrap();
        let opts = ApplyOptions::new(temp.path().join("missing"));
        let mut system = Recorder::default();
        let err = apply_simple(&tree(), &mut system, &opts).unwrap_err();
        assert!(matches!(err, Error::DestinationRoot { .. }));
        assert_eq!(system.mutations, 0);
    }

    #[test]
    fn test_file_root_is_fatal() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("file");
        std::fs::write(&root, "").unwrap();
        let mut system = Recorder::default();
        let err = apply_simple(&tree(), &mut system, &ApplyOptions::new(&root)).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, Error::DestinationNotDir { .. }));
    }

    #[test]
    fn test_dry_run_reports_without_mutating() {
        struct Collect(Vec<String>);

        impl crate::context::ProgressCallback for Collect {
            fn on_entry_start(&mut self, _path: &str) {}
            fn on_action(&mut self, path: &str, action: &Action) {
                self.0.push(format!("{path}: {action}"));
            }
            fn on_entry_complete(&mut self, _path: &str, _result: &ApplyResult) {}
        }

        let temp = TempDir::new().unwrap();
        let plan = ApplyPlan::new(vec![
            TargetEntry::dir("d", Mode::new(0o755)),
            TargetEntry::script("s.sh", "echo", RunCondition::Once),
        ]);
        let opts = ApplyOptions {
            dry_run: true,
            ..ApplyOptions::new(temp.path())
        };
        let mut system = Recorder::default();
        let mut templates = NoTemplates;
        let mut progress = Collect(Vec::new());
        let mut ctx = ApplyContext::new(&mut templates, &mut progress);

        let summary = apply(&plan, &mut system, &opts, &mut ctx).unwrap();

        assert_eq!(summary.skipped, 2);
        assert_eq!(system.mutations, 0);
        assert!(system.inner.state().buckets().is_empty());
        assert_eq!(progress.0, vec!["d: mkdir (755)", "s.sh: run script"]);
    }

    #[test]
    fn test_templates_rendered() {
        struct Greeting;

        impl TemplateEngine for Greeting {
            fn execute_template_data(&mut self, _name: &str, data: &[u8]) -> Result<Vec<u8>> {
                Ok(String::from_utf8_lossy(data)
                    .replace("{{ .name }}", "world")
                    .into_bytes())
            }
        }

        let temp = TempDir::new().unwrap();
        let plan = ApplyPlan::new(vec![TargetEntry::new(
            "hello",
            EntryKind::File {
                contents: Contents::template("hello {{ .name }}"),
                mode: Mode::new(0o644),
            },
        )]);
        let mut system = Recorder::default();
        let mut templates = Greeting;
        let mut progress = NoProgress;
        let mut ctx = ApplyContext::new(&mut templates, &mut progress);
        apply(&plan, &mut system, &ApplyOptions::new(temp.path()), &mut ctx).unwrap();

        assert_eq!(
            std::fs::read_to_string(temp.path().join("hello")).unwrap(),
            "hello world"
        );
    }

    #[test]
    fn test_template_without_engine_fails_entry() {
        let temp = TempDir::new().unwrap();
        let plan = ApplyPlan::new(vec![TargetEntry::new(
            "t",
            EntryKind::File {
                contents: Contents::template("{{ .x }}"),
                mode: Mode::new(0o644),
            },
        )]);
        let mut system = Recorder::default();
        let summary = apply_simple(&plan, &mut system, &ApplyOptions::new(temp.path())).unwrap();
        assert!(matches!(
            summary.failures[0].error,
            Error::Template { .. }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_diff_of_symlink_turned_file_has_one_block() {
        let temp = TempDir::new().unwrap();
        std::os::unix::fs::symlink("old-target", temp.path().join("x")).unwrap();
        let real = RealSystem::new(MemoryPersistentState::new());
        let mut system = system::GitDiffSystem::new(real, temp.path());
        let plan = ApplyPlan::new(vec![TargetEntry::file("x", "new\n", Mode::new(0o644))]);

        let summary = apply_simple(&plan, &mut system, &ApplyOptions::new(temp.path())).unwrap();
        let diff = system.finish();

        assert!(summary.is_success());
        assert_eq!(diff.matches("diff --git a/x b/x").count(), 1);
        assert!(diff.contains("+new\n"));
        assert!(temp.path().join("x").is_symlink());
    }

    #[test]
    fn test_null_system_without_root() {
        let mut system = NullSystem;
        let summary = apply_simple(&tree(), &mut system, &ApplyOptions::default()).unwrap();
        assert!(summary.is_success());
        assert_eq!(summary.removed, 0);
    }
}
