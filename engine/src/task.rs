// Copyright 2026 Workflow project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use crate::error::Failure;
use crate::node::{WorkflowItem, WorkflowNode};
use crate::program::TaskSpec;
use crate::target::Target;
use crate::template;
use graph::Context;

/// A unit of work (§3), with all target-producing fields already parsed into concrete `Target`s.
/// `script`/`description` may still carry `${var}` placeholders referencing this task's own
/// Variable-kind `requires` -- those are substituted lazily, at run time (§4.4), not here.
#[derive(Clone, Debug)]
pub struct Task {
    pub creates: Vec<Target>,
    pub requires: Vec<Target>,
    pub name: Option<String>,
    pub runner: Option<String>,
    pub path: Option<PathBuf>,
    pub script: Option<String>,
    pub stdin: Option<Target>,
    pub stdout: Option<Target>,
    pub description: Option<String>,
    pub force: bool,
}

impl Task {
    /// Converts a fully-substituted `TaskSpec` (no remaining identity placeholders) into a
    /// concrete `Task`, folding `name`/`stdin`/`stdout`/`path` into `creates`/`requires` so that
    /// the invariants of §3 hold by construction rather than by validation.
    pub fn from_spec(spec: &TaskSpec) -> Result<Task, Failure> {
        if spec.script.is_some() && spec.path.is_some() {
            return Err(Failure::User(
                "a task may declare `script` or `path`, not both".to_string(),
            ));
        }
        // A task with neither is a pure phony aggregator (§4.6's `collect`): it does no work of
        // its own beyond ordering its `requires`.

        let mut creates: Vec<Target> = spec.creates.iter().map(|s| Target::parse(s)).collect();
        let mut requires: Vec<Target> = spec.requires.iter().map(|s| Target::parse(s)).collect();

        let stdout = spec.stdout.as_deref().map(Target::parse);
        if let Some(Target::Phony(name)) = &stdout {
            return Err(Failure::User(format!(
                "task cannot direct stdout to phony target #{name}"
            )));
        }
        if let Some(target) = &stdout {
            if !creates.contains(target) {
                creates.push(target.clone());
            }
        }

        let stdin = spec.stdin.as_deref().map(Target::parse);
        if let Some(target) = &stdin {
            if !requires.contains(target) {
                requires.push(target.clone());
            }
        }

        if let Some(name) = &spec.name {
            let phony = Target::Phony(name.clone());
            if !creates.contains(&phony) {
                creates.push(phony);
            }
        }

        let path = spec.path.as_ref().map(PathBuf::from);
        if let Some(p) = &path {
            let target = Target::File(p.clone());
            if !requires.contains(&target) {
                requires.push(target);
            }
        }

        Ok(Task {
            creates,
            requires,
            name: spec.name.clone(),
            runner: spec.runner.clone(),
            path,
            script: spec.script.clone(),
            stdin,
            stdout,
            description: spec.description.clone(),
            force: spec.force,
        })
    }

    pub fn label(&self) -> String {
        if let Some(description) = &self.description {
            return description.clone();
        }
        if let Some(name) = &self.name {
            return format!("#{name}");
        }
        self.creates
            .first()
            .map(ToString::to_string)
            .unwrap_or_else(|| "<task>".to_string())
    }

    fn file_creates(&self) -> Vec<&PathBuf> {
        self.creates
            .iter()
            .filter_map(|t| match t {
                Target::File(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    fn file_requires(&self) -> Vec<&PathBuf> {
        self.requires
            .iter()
            .filter_map(|t| match t {
                Target::File(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    /// Freshness decision of §4.4 step 1-2.
    fn needs_run(&self, force_db: bool) -> bool {
        if self.force || force_db {
            return true;
        }
        let file_creates = self.file_creates();
        if file_creates.is_empty() {
            return true;
        }
        if file_creates.iter().any(|p| !p.exists()) {
            return true;
        }
        self.is_stale(&file_creates)
    }

    /// The post-run check of §4.4: "did the task actually achieve its declared file targets".
    /// Unlike `needs_run`, this ignores `force`/"no file targets" -- those would make every task
    /// report "still needs to run" immediately after running it.
    fn achieved_goals(&self) -> bool {
        let file_creates = self.file_creates();
        if file_creates.is_empty() {
            return true;
        }
        if file_creates.iter().any(|p| !p.exists()) {
            return false;
        }
        !self.is_stale(&file_creates)
    }

    fn is_stale(&self, file_creates: &[&PathBuf]) -> bool {
        let newest_dependency = self
            .file_requires()
            .into_iter()
            .filter_map(|p| std::fs::metadata(p).and_then(|m| m.modified()).ok())
            .max();
        let Some(newest_dependency) = newest_dependency else {
            return false;
        };
        file_creates.iter().any(|p| {
            std::fs::metadata(p)
                .and_then(|m| m.modified())
                .map(|mtime| mtime < newest_dependency)
                .unwrap_or(true)
        })
    }
}

/// The `graph::Node::run` body for a Task (§4.4).
pub(crate) async fn run(
    task: std::sync::Arc<Task>,
    context: Context<WorkflowNode>,
) -> Result<WorkflowItem, Failure> {
    let dep_items = crate::node::resolve_and_run(&context, &task.requires).await?;

    let env: HashMap<String, String> = task
        .requires
        .iter()
        .zip(dep_items.iter())
        .filter_map(|(target, item)| match (target, item) {
            (Target::Variable(name), WorkflowItem::Text(value)) => {
                Some((name.clone(), value.clone()))
            }
            _ => None,
        })
        .collect();

    if task.script.is_none() && task.path.is_none() {
        // A pure phony aggregator: nothing to run, its dependencies have already been awaited.
        return Ok(WorkflowItem::Unit);
    }

    if !task.needs_run(context.force()) {
        log::debug!("{} is up to date", task.label());
        return Ok(read_captured_stdout_target(&task, &env));
    }

    log::info!("{}", task.label());

    let script = task.script.as_deref().map(|s| template::substitute_str(s, &env));
    let captured = execute(&task, script.as_deref(), &env, &context).await?;

    if !task.achieved_goals() {
        return Err(Failure::Task(format!(
            "{} didn't achieve its declared targets",
            task.label()
        )));
    }

    Ok(captured
        .map(WorkflowItem::Text)
        .unwrap_or(WorkflowItem::Unit))
}

/// A task whose stdout target is a Variable but which was skipped as up-to-date still needs to
/// report *some* `Item` to its dependents; since the script didn't run, there is nothing to
/// capture, so the variable reads as empty. Any task actually requiring its value should name the
/// upstream task, not skip it via freshness -- an up-to-date stdout-to-Variable task is therefore
/// an unusual, but not erroneous, configuration.
fn read_captured_stdout_target(task: &Task, _env: &HashMap<String, String>) -> WorkflowItem {
    match &task.stdout {
        Some(Target::Variable(_)) => WorkflowItem::Text(String::new()),
        _ => WorkflowItem::Unit,
    }
}

async fn execute(
    task: &Task,
    script: Option<&str>,
    env: &HashMap<String, String>,
    context: &Context<WorkflowNode>,
) -> Result<Option<String>, Failure> {
    let stdin_bytes = match &task.stdin {
        Some(Target::Variable(name)) => {
            let value = env.get(name).cloned().unwrap_or_default();
            Some(value.into_bytes())
        }
        _ => None,
    };

    let capturing = matches!(task.stdout, Some(Target::Variable(_)));

    match &task.runner {
        Some(runner_name) => {
            let runner = context
                .shared()
                .runner(runner_name)
                .ok_or_else(|| Failure::Task(format!("no runner named `{runner_name}`")))?;

            let script_path = match (&task.path, script) {
                (Some(path), _) => path.clone(),
                (None, Some(script)) => {
                    let mut file = tempfile::NamedTempFile::new()
                        .map_err(|e| Failure::Task(format!("failed to create script file: {e}")))?;
                    use std::io::Write as _;
                    file.write_all(script.as_bytes())
                        .map_err(|e| Failure::Task(format!("failed to write script file: {e}")))?;
                    let (_, path) = file.keep().map_err(|e| {
                        Failure::Task(format!("failed to persist script file: {e}"))
                    })?;
                    path
                }
                (None, None) => unreachable!("Task::from_spec requires script or path"),
            };

            let mut substitution = HashMap::new();
            substitution.insert(
                "script".to_string(),
                script_path.to_string_lossy().into_owned(),
            );
            let args: Vec<String> = runner
                .args
                .iter()
                .map(|a| template::substitute_str(a, &substitution))
                .collect();

            spawn_one(
                &runner.command,
                &args,
                task.stdin.as_ref(),
                task.stdout.as_ref(),
                stdin_bytes.as_deref(),
                capturing,
                context,
            )
            .await
        }
        None => {
            let Some(script) = script else {
                // No runner and no inline script: `path` names an executable to run directly.
                let program = task
                    .path
                    .as_ref()
                    .expect("Task::from_spec requires script or path")
                    .to_string_lossy()
                    .into_owned();
                return spawn_one(
                    &program,
                    &[],
                    task.stdin.as_ref(),
                    task.stdout.as_ref(),
                    stdin_bytes.as_deref(),
                    capturing,
                    context,
                )
                .await;
            };
            let lines: Vec<&str> = script.lines().filter(|l| !l.trim().is_empty()).collect();

            if capturing && lines.len() > 1 {
                return Err(Failure::Task(
                    "capturing stdout into a Variable requires a single-line script in \
                     direct-exec mode"
                        .to_string(),
                ));
            }

            let mut captured_output = String::new();
            for (i, line) in lines.iter().enumerate() {
                let words = shlex::split(line)
                    .ok_or_else(|| Failure::Task(format!("couldn't parse script line: {line}")))?;
                let Some((program, args)) = words.split_first() else {
                    continue;
                };
                let is_last = i + 1 == lines.len();
                let result = spawn_one(
                    program,
                    args,
                    task.stdin.as_ref(),
                    task.stdout.as_ref(),
                    stdin_bytes.as_deref(),
                    capturing && is_last,
                    context,
                )
                .await?;
                if let Some(output) = result {
                    captured_output.push_str(&output);
                }
            }
            Ok(capturing.then_some(captured_output))
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn spawn_one(
    program: &str,
    args: &[String],
    stdin_target: Option<&Target>,
    stdout_target: Option<&Target>,
    stdin_bytes: Option<&[u8]>,
    capture_stdout: bool,
    context: &Context<WorkflowNode>,
) -> Result<Option<String>, Failure> {
    let _permit = context
        .subprocess_semaphore()
        .acquire()
        .await
        .expect("subprocess semaphore is never closed");

    let mut command = Command::new(program);
    command.args(args);
    command.stderr(Stdio::piped());

    match stdout_target {
        Some(Target::File(path)) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)
                .map_err(|e| Failure::Task(format!("failed to open {}: {e}", path.display())))?;
            command.stdout(Stdio::from(file));
        }
        Some(Target::Variable(_)) => {
            command.stdout(Stdio::piped());
        }
        _ => {
            command.stdout(Stdio::inherit());
        }
    }

    match stdin_target {
        Some(Target::File(path)) => {
            let file = std::fs::File::open(path)
                .map_err(|e| Failure::Task(format!("failed to open {}: {e}", path.display())))?;
            command.stdin(Stdio::from(file));
        }
        Some(Target::Variable(_)) => {
            command.stdin(Stdio::piped());
        }
        _ => {
            command.stdin(Stdio::null());
        }
    }

    let mut child = command
        .spawn()
        .map_err(|e| Failure::Task(format!("failed to spawn `{program}`: {e}")))?;

    if let (Some(mut stdin), Some(bytes)) = (child.stdin.take(), stdin_bytes) {
        stdin
            .write_all(bytes)
            .await
            .map_err(|e| Failure::Task(format!("failed to write to child stdin: {e}")))?;
    }
    drop(child.stdin.take());

    let mut captured = String::new();
    if capture_stdout {
        if let Some(mut stdout) = child.stdout.take() {
            stdout
                .read_to_string(&mut captured)
                .await
                .map_err(|e| Failure::Task(format!("failed to read child stdout: {e}")))?;
        }
    }

    let mut stderr_text = String::new();
    if let Some(mut stderr) = child.stderr.take() {
        stderr
            .read_to_string(&mut stderr_text)
            .await
            .map_err(|e| Failure::Task(format!("failed to read child stderr: {e}")))?;
    }
    for line in stderr_text.lines() {
        log::warn!("{program}: {line}");
    }

    let status = child
        .wait()
        .await
        .map_err(|e| Failure::Task(format!("failed to wait on `{program}`: {e}")))?;
    if !status.success() {
        log::warn!("`{program}` exited with {status}");
    }

    Ok(capture_stdout.then(|| captured.trim_end_matches('\n').to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::TaskSpec;

    fn spec() -> TaskSpec {
        TaskSpec {
            script: Some("echo hi".to_string()),
            ..TaskSpec::default()
        }
    }

    #[test]
    fn stdout_folds_into_creates() {
        let mut s = spec();
        s.stdout = Some("var(x)".to_string());
        let task = Task::from_spec(&s).unwrap();
        assert!(task.creates.contains(&Target::Variable("x".to_string())));
    }

    #[test]
    fn stdin_folds_into_requires() {
        let mut s = spec();
        s.stdin = Some("var(x)".to_string());
        let task = Task::from_spec(&s).unwrap();
        assert!(task.requires.contains(&Target::Variable("x".to_string())));
    }

    #[test]
    fn name_folds_into_phony_creates() {
        let mut s = spec();
        s.name = Some("build".to_string());
        let task = Task::from_spec(&s).unwrap();
        assert!(task.creates.contains(&Target::Phony("build".to_string())));
    }

    #[test]
    fn stdout_to_phony_is_rejected() {
        let mut s = spec();
        s.stdout = Some("#build".to_string());
        assert!(Task::from_spec(&s).is_err());
    }

    #[test]
    fn script_and_path_are_mutually_exclusive() {
        let mut s = spec();
        s.path = Some("foo.sh".to_string());
        assert!(Task::from_spec(&s).is_err());
    }

    #[test]
    fn no_file_targets_always_needs_run() {
        let task = Task::from_spec(&spec()).unwrap();
        assert!(task.needs_run(false));
    }
}
