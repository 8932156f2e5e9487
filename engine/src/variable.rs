// Copyright 2026 Workflow project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Failure;
use crate::node::{resolve_and_run, WorkflowItem, WorkflowNode};
use crate::target::Target;
use crate::template;
use graph::Context;

/// A lazy node whose value is a templated string (§3, §4.5). Its dependencies are exactly the
/// variables referenced in its own template, so by the time its thunk runs, every one of them is
/// already resolved.
#[derive(Debug)]
pub struct VariableDef {
    pub name: String,
    pub template: String,
}

impl VariableDef {
    fn dependencies(&self) -> Vec<Target> {
        template::gather_args_str(&self.template)
            .into_iter()
            .map(Target::Variable)
            .collect()
    }
}

/// The `graph::Node::run` body for a Variable (§4.5): `substitute(template, environment)` where
/// `environment` is the memoized string of every referenced Variable.
pub(crate) async fn run(
    var: Arc<VariableDef>,
    context: Context<WorkflowNode>,
) -> Result<WorkflowItem, Failure> {
    let dependencies = var.dependencies();
    let items = resolve_and_run(&context, &dependencies).await?;

    let env: HashMap<String, String> = dependencies
        .iter()
        .zip(items.iter())
        .filter_map(|(target, item)| match (target, item) {
            (Target::Variable(name), WorkflowItem::Text(value)) => {
                Some((name.clone(), value.clone()))
            }
            _ => None,
        })
        .collect();

    log::debug!("var({}) resolved", var.name);
    Ok(WorkflowItem::Text(template::substitute_str(
        &var.template,
        &env,
    )))
}
