// Copyright 2026 Workflow project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

#![deny(warnings)]
#![deny(
    clippy::all,
    clippy::default_trait_access,
    clippy::expl_impl_clone_on_copy,
    clippy::if_not_else,
    clippy::needless_continue,
    clippy::unseparated_literal_suffix,
    clippy::used_underscore_binding
)]
#![allow(clippy::match_ref_pats)]
#![allow(
    clippy::len_without_is_empty,
    clippy::redundant_field_names,
    clippy::too_many_arguments
)]
#![allow(clippy::new_without_default, clippy::new_ret_no_self)]
#![allow(clippy::mutex_atomic)]

//! The thin CLI front door described in §4.10: parses a program file reference and a list of
//! goal targets, resolves the program, runs the goals concurrently, and maps the outcome to a
//! process exit code.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use engine::{Database, WorkflowItem};

/// Resolves and runs a declarative program's tasks and variables.
#[derive(Parser)]
#[command(name = "workflow")]
struct Opt {
    /// Program file to load, optionally suffixed with `#a.b.c` to address a nested subsection.
    /// Defaults to `workflow.toml` in the current directory.
    #[arg(long)]
    file: Option<String>,

    /// Increase logging verbosity. May be given more than once (`-vv`).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Treat every target as stale, ignoring on-disk freshness.
    #[arg(long)]
    force: bool,

    /// Maximum number of subprocesses to run concurrently.
    #[arg(long, default_value = "8")]
    max_concurrent_subprocesses: usize,

    /// Number of worker threads for the runtime. Defaults to the number of available cores.
    #[arg(long)]
    worker_threads: Option<usize>,

    /// One or more goal targets to build (file paths, `#phony` names, or `var(name)`).
    #[arg(required = true)]
    goals: Vec<String>,
}

fn main() -> ExitCode {
    let opt = Opt::parse();

    if logging::init(logging::level_for_verbosity(opt.verbose)).is_err() {
        eprintln!("a logger was already installed");
    }

    let worker_threads = opt
        .worker_threads
        .unwrap_or_else(|| std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get));

    let executor = match task_executor::Executor::new_owned(worker_threads) {
        Ok(executor) => executor,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let reference = opt.file.unwrap_or_else(default_program_reference);

    let result = executor.block_on(run(
        &executor,
        &reference,
        opt.force,
        opt.max_concurrent_subprocesses,
        &opt.goals,
    ));

    executor.shutdown(Duration::from_secs(5));

    result
}

fn default_program_reference() -> String {
    PathBuf::from("workflow.toml").display().to_string()
}

async fn run(
    executor: &task_executor::Executor,
    reference: &str,
    force: bool,
    max_concurrent_subprocesses: usize,
    goals: &[String],
) -> ExitCode {
    let database = match Database::load(
        reference,
        executor.to_borrowed(),
        force,
        max_concurrent_subprocesses,
    )
    .await
    {
        Ok(database) => database,
        Err(e) => {
            eprintln!("error: failed to resolve {reference}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let results = database.run_all(goals).await;

    let mut failures = 0;
    for (goal, result) in &results {
        match result {
            Ok(WorkflowItem::Text(text)) if !text.is_empty() => {
                println!("{goal}: {text}");
            }
            Ok(_) => {
                println!("{goal}: ok");
            }
            Err(e) => {
                failures += 1;
                eprintln!("{goal}: FAILED: {e}");
                log::error!("{goal} failed: {e:?}");
            }
        }
    }

    if failures == 0 {
        ExitCode::SUCCESS
    } else {
        eprintln!("{failures} of {} goal(s) failed", results.len());
        ExitCode::FAILURE
    }
}
