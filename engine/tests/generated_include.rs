// Copyright 2026 Workflow project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

mod common;

use tempfile::TempDir;

/// Scenario 5 (§8): one program includes a file that a task of its own generates. Resolving the
/// include must first run the generator, then re-enter resolution over the generated content.
#[tokio::test]
async fn generated_include_runs_generator_before_resolving_it() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().display().to_string();
    let gen_json = common::path_str(dir.path(), "gen.json");

    let item_paths: Vec<String> = (0..10)
        .map(|i| common::path_str(dir.path(), &format!("out/item-{i}")))
        .collect();

    let generated_tasks: Vec<serde_json::Value> = item_paths
        .iter()
        .map(|path| {
            serde_json::json!({
                "creates": [path],
                "script": format!("mkdir -p {base}/out && touch {path}"),
            })
        })
        .collect();
    let generated_program = serde_json::json!({ "task": generated_tasks }).to_string();

    let generator = common::write(
        dir.path(),
        "generator.sh",
        &format!("#!/bin/sh\ncat > {gen_json} <<'EOF'\n{generated_program}\nEOF\n"),
    );

    let requires = item_paths
        .iter()
        .map(|p| format!("\"{p}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let program = format!(
        r#"
include = ["{gen_json}"]

[[task]]
creates = ["{gen_json}"]
script = "sh {generator}"

[[task]]
name = "all"
requires = [{requires}]
"#
    );
    let program_path = common::write(dir.path(), "workflow.toml", &program);

    let database = common::load(dir.path(), &program_path).await;
    database.run("#all").await.unwrap();

    for path in &item_paths {
        assert!(
            std::path::Path::new(path).exists(),
            "expected generated task to have created {path}"
        );
    }
}
