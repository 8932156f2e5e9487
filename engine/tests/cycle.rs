// Copyright 2026 Workflow project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

mod common;

use tempfile::TempDir;

use engine::Failure;

/// Scenario 6 (§8): two phony tasks requiring each other must raise a cyclic-dependency failure
/// naming a chain of at least two entries, not hang.
#[tokio::test]
async fn mutual_requires_is_rejected_as_cyclic() {
    let dir = TempDir::new().unwrap();

    let program = r#"
[[task]]
name = "t1"
requires = ["#t2"]

[[task]]
name = "t2"
requires = ["#t1"]
"#;
    let program_path = common::write(dir.path(), "workflow.toml", program);

    let database = common::load(dir.path(), &program_path).await;
    let result = database.run("#t1").await;

    match result {
        Err(failure) => {
            assert!(
                contains_cycle(&failure),
                "expected a cyclic failure somewhere in: {failure:?}"
            );
        }
        Ok(item) => panic!("expected a cyclic-dependency failure, got Ok({item:?})"),
    }
}

fn contains_cycle(failure: &Failure) -> bool {
    match failure {
        Failure::Cyclic(chain) => chain.len() >= 2,
        Failure::Dependency(children) => children.iter().any(|(_, f)| contains_cycle(f)),
        _ => false,
    }
}
