// Copyright 2026 Workflow project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::path::Path;

use engine::Database;

/// Writes `contents` to `path` (relative to `dir`) and returns its absolute path as a string,
/// suitable for splicing into a program file's `creates`/`script` fields so tests never depend on
/// the process's current directory.
pub fn write(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path.display().to_string()
}

pub fn path_str(dir: &Path, name: &str) -> String {
    dir.join(name).display().to_string()
}

/// Loads a program under the ambient `#[tokio::test]` runtime. Uses the "borrowed" Executor
/// flavor (see `task_executor::Executor::new`), since the runtime here is owned by the test
/// macro, not by this helper.
pub async fn load(dir: &Path, program_path: &str) -> Database {
    let executor = task_executor::Executor::new();
    Database::load(program_path, executor, false, 4)
        .await
        .unwrap_or_else(|e| panic!("failed to resolve {}: {e}", dir.display()))
}
