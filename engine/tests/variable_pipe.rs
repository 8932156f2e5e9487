// Copyright 2026 Workflow project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

mod common;

use tempfile::TempDir;

/// Scenario 2 (§8): one task captures its stdout into a Variable; a second task substitutes that
/// Variable into its own script.
#[tokio::test]
async fn captured_stdout_feeds_a_downstream_script() {
    let dir = TempDir::new().unwrap();
    let out = common::path_str(dir.path(), "out");

    let program = format!(
        r#"
[[task]]
stdout = "var(x)"
script = "echo 42"

[[task]]
creates = ["{out}"]
requires = ["var(x)"]
script = "echo ${{x}} > {out}"
"#
    );
    let program_path = common::write(dir.path(), "workflow.toml", &program);

    let database = common::load(dir.path(), &program_path).await;
    database.run(&out).await.unwrap();

    let contents = std::fs::read_to_string(&out).unwrap();
    assert_eq!(contents.trim(), "42");
}
