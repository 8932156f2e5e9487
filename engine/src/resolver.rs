// Copyright 2026 Workflow project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::config;
use crate::error::Failure;
use crate::node::{WorkflowItem, WorkflowNode, WorkflowShared};
use crate::program::{self, ProgramSpec, TaskSpec, TemplateCallSpec};
use crate::target::Target;
use crate::task::Task;
use crate::template;
use crate::variable::VariableDef;
use graph::Graph;

struct ResolverState {
    templates: HashMap<String, TaskSpec>,
    deferred_calls: Vec<TemplateCallSpec>,
    delayed: Vec<TaskSpec>,
}

/// Turns a declarative program into a populated node database (§4.7), recursing across
/// `include`s that share the same database, runner table, and template index.
pub struct Resolver {
    graph: Arc<Graph<WorkflowNode>>,
    shared: WorkflowShared,
    state: Mutex<ResolverState>,
}

impl Resolver {
    pub fn new(graph: Arc<Graph<WorkflowNode>>, shared: WorkflowShared) -> Resolver {
        Resolver {
            graph,
            shared,
            state: Mutex::new(ResolverState {
                templates: HashMap::new(),
                deferred_calls: Vec::new(),
                delayed: Vec::new(),
            }),
        }
    }

    pub fn shared(&self) -> &WorkflowShared {
        &self.shared
    }

    /// Resolves the program named by `reference` (a path, optionally with a `#a.b.c` subsection
    /// suffix, §4.10) and everything it transitively includes, then performs the final
    /// deferred-call and delayed-template passes (§4.7 steps 8-9).
    pub async fn resolve_root(&self, reference: &str) -> Result<(), Failure> {
        self.resolve_reference(reference).await?;
        self.retry_deferred_calls().await?;
        self.final_delayed_pass()
    }

    fn resolve_reference<'a>(&'a self, reference: &'a str) -> BoxFuture<'a, Result<(), Failure>> {
        Box::pin(async move {
            let spec = config::load_program(reference)?;
            self.resolve_program(spec).await
        })
    }

    fn resolve_program<'a>(&'a self, spec: ProgramSpec) -> BoxFuture<'a, Result<(), Failure>> {
        Box::pin(async move {
            // Step 1: environment variables become Variable nodes.
            for (name, template) in spec.environment {
                self.shared
                    .register(WorkflowNode::Variable(Arc::new(VariableDef { name, template })));
            }

            // Step 2: merge runners into the runner table.
            self.shared.merge_runners(spec.runner);

            // Step 3: index this file's templates (accumulated globally, visible to later
            // includes and to deferred-call retries regardless of which file declared them).
            {
                let mut state = self.state.lock();
                state.templates.extend(spec.template);
            }

            // Step 4: direct tasks, plus calls whose template is already known; others deferred.
            let mut pending: Vec<TaskSpec> = spec.task;
            for call in spec.call {
                let template_spec = {
                    let state = self.state.lock();
                    state.templates.get(&call.template).cloned()
                };
                match template_spec {
                    Some(template_spec) => {
                        pending.extend(program::expand_template(&template_spec, &call)?);
                    }
                    None => self.state.lock().deferred_calls.push(call),
                }
            }

            // Step 5: classify each pending task as ready or delayed, and insert the ready ones.
            self.classify_and_insert(pending)?;

            // Step 6: opportunistically resolve any delayed tasks that have become resolvable.
            self.try_resolve_delayed().await?;

            // Step 7: includes, which may themselves be templated and/or generated by a task.
            for include in spec.include {
                self.resolve_include(&include).await?;
            }

            Ok(())
        })
    }

    fn classify_and_insert(&self, specs: Vec<TaskSpec>) -> Result<(), Failure> {
        let mut state = self.state.lock();
        for spec in specs {
            if spec.identity_placeholders().is_empty() {
                let task = Task::from_spec(&spec)?;
                self.shared.register(WorkflowNode::Task(Arc::new(task)));
            } else {
                state.delayed.push(spec);
            }
        }
        Ok(())
    }

    /// Step 6/9: for each delayed task, check whether every placeholder in its identity fields
    /// names a Variable already present in the registry. If so, run those Variables now (this is
    /// the one point where resolution itself drives evaluation) to concretize the targets, then
    /// insert. Tasks that remain unresolvable are kept in `delayed` for a later pass.
    async fn try_resolve_delayed(&self) -> Result<(), Failure> {
        loop {
            let candidates: Vec<TaskSpec> = {
                let mut state = self.state.lock();
                std::mem::take(&mut state.delayed)
            };
            if candidates.is_empty() {
                return Ok(());
            }

            let mut still_delayed = Vec::new();
            let mut made_progress = false;
            for spec in candidates {
                let placeholders = spec.identity_placeholders();
                let all_known = placeholders
                    .iter()
                    .all(|name| self.shared.is_registered(&Target::Variable(name.clone())));

                if !all_known {
                    still_delayed.push(spec);
                    continue;
                }

                let mut env = HashMap::new();
                for name in &placeholders {
                    let value = self.run_variable(name).await?;
                    env.insert(name.clone(), value);
                }
                let substituted = spec.substitute(&env);
                if substituted.identity_placeholders().is_empty() {
                    let task = Task::from_spec(&substituted)?;
                    self.shared.register(WorkflowNode::Task(Arc::new(task)));
                    made_progress = true;
                } else {
                    still_delayed.push(substituted);
                }
            }

            self.state.lock().delayed.extend(still_delayed);
            if !made_progress {
                return Ok(());
            }
        }
    }

    async fn run_variable(&self, name: &str) -> Result<String, Failure> {
        let target = Target::Variable(name.to_string());
        let node = self.shared.resolve(&target)?;
        match self.graph.run(self.shared.clone(), node).await? {
            WorkflowItem::Text(value) => Ok(value),
            WorkflowItem::Unit => Ok(String::new()),
        }
    }

    async fn resolve_include(&self, include: &str) -> Result<(), Failure> {
        let placeholders = template::gather_args_str(include);
        let path_string = if placeholders.is_empty() {
            include.to_string()
        } else {
            let mut env = HashMap::new();
            for name in &placeholders {
                env.insert(name.clone(), self.run_variable(name).await?);
            }
            template::substitute_str(include, &env)
        };

        let target = Target::File(Path::new(&path_string).to_path_buf());
        if self.shared.is_registered(&target) {
            // The include file is itself the output of a declared task: run it first (includes
            // can be generated, §4.7 step 7).
            let node = self.shared.resolve(&target)?;
            self.graph.run(self.shared.clone(), node).await?;
        }

        if !Path::new(&path_string).exists() {
            return Err(Failure::MissingInclude(path_string));
        }

        self.resolve_reference(&path_string).await
    }

    /// Step 8: retry every deferred `TemplateCall` against the (now complete) template index.
    async fn retry_deferred_calls(&self) -> Result<(), Failure> {
        loop {
            let deferred: Vec<TemplateCallSpec> = {
                let mut state = self.state.lock();
                std::mem::take(&mut state.deferred_calls)
            };
            if deferred.is_empty() {
                return Ok(());
            }

            let attempted = deferred.len();
            let mut still_deferred = Vec::new();
            let mut pending = Vec::new();
            for call in deferred {
                let template_spec = {
                    let state = self.state.lock();
                    state.templates.get(&call.template).cloned()
                };
                match template_spec {
                    Some(template_spec) => {
                        pending.extend(program::expand_template(&template_spec, &call)?);
                    }
                    None => still_deferred.push(call),
                }
            }

            if still_deferred.len() == attempted {
                // No progress possible: every remaining call's template is genuinely missing.
                return Err(Failure::MissingTemplate(still_deferred[0].template.clone()));
            }

            self.classify_and_insert(pending)?;
            self.try_resolve_delayed().await?;
            self.state.lock().deferred_calls.extend(still_deferred);
        }
    }

    /// Step 9: any task whose identity placeholders are still unresolvable after every pass is a
    /// user error naming the offending tasks.
    fn final_delayed_pass(&self) -> Result<(), Failure> {
        let state = self.state.lock();
        if state.delayed.is_empty() {
            return Ok(());
        }
        let names: Vec<String> = state
            .delayed
            .iter()
            .flat_map(|spec| spec.identity_placeholders())
            .collect();
        Err(Failure::User(format!(
            "unresolvable templated targets referencing: {}",
            names.join(", ")
        )))
    }
}
