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

//! The one process-wide logging backend. The engine and resolver crates only ever call through
//! the `log` facade; this crate is where a binary installs the backend that renders it, exactly
//! once, at startup.

use std::io::Write;

use log::LevelFilter;

/// Installs the global logger, honoring `RUST_LOG` if set and otherwise defaulting to the given
/// verbosity. Returns an error if a logger has already been installed (calling this twice, e.g.
/// from two test harnesses in the same process, is a programmer error elsewhere).
pub fn init(default_level: LevelFilter) -> Result<(), log::SetLoggerError> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_level.to_string()),
    )
    .format(|buf, record| {
        writeln!(buf, "[{:>5}] {}", record.level(), record.args())
    })
    .try_init()
}

/// The verbosity requested on the command line, translated to a `log::LevelFilter`.
pub fn level_for_verbosity(verbose_count: u8) -> LevelFilter {
    match verbose_count {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

#[cfg(test)]
mod tests {
    use super::level_for_verbosity;
    use log::LevelFilter;

    #[test]
    fn verbosity_maps_to_level() {
        assert_eq!(level_for_verbosity(0), LevelFilter::Info);
        assert_eq!(level_for_verbosity(1), LevelFilter::Debug);
        assert_eq!(level_for_verbosity(5), LevelFilter::Trace);
    }
}
