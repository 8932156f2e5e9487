// Copyright 2026 Workflow project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

mod common;

use tempfile::TempDir;

/// Scenario 4 (§8): the same template multiplexed with `outer` join produces the full Cartesian
/// product of its list args.
#[tokio::test]
async fn outer_join_is_the_cartesian_product() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().display().to_string();

    let program = format!(
        r#"
[template.make]
creates = ["{base}/dir/${{pre}}-${{a}}-${{b}}"]
script = "mkdir -p {base}/dir && touch {base}/dir/${{pre}}-${{a}}-${{b}}"

[[call]]
template = "make"
join = "outer"
collect = "outer"
args = {{ pre = "o", a = ["x", "y"], b = ["1", "2"] }}
"#
    );
    let program_path = common::write(dir.path(), "workflow.toml", &program);

    let database = common::load(dir.path(), &program_path).await;
    database.run("#outer").await.unwrap();

    for name in ["o-x-1", "o-x-2", "o-y-1", "o-y-2"] {
        assert!(
            dir.path().join("dir").join(name).exists(),
            "expected dir/{name} to have been created"
        );
    }
}
