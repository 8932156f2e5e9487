// Copyright 2026 Workflow project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fmt;
use std::path::{Path, PathBuf};

/// The unique key into the node database: a file path, a phony name, or a variable reference.
///
/// Parsed from its textual surface (§4.2): a leading `#` is a Phony, `var(IDENT)` is a Variable,
/// anything else is a File path, normalized to a canonical relative form so that `./a` and `a`
/// compare equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    File(PathBuf),
    Phony(String),
    Variable(String),
}

impl Target {
    pub fn parse(s: &str) -> Target {
        if let Some(name) = s.strip_prefix('#') {
            return Target::Phony(name.to_string());
        }
        if let Some(name) = parse_variable_ref(s) {
            return Target::Variable(name);
        }
        Target::File(normalize_path(Path::new(s)))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::File(path) => write!(f, "{}", path.display()),
            Target::Phony(name) => write!(f, "#{name}"),
            Target::Variable(name) => write!(f, "var({name})"),
        }
    }
}

fn parse_variable_ref(s: &str) -> Option<String> {
    let rest = s.strip_prefix("var(")?;
    let name = rest.strip_suffix(')')?;
    is_identifier(name).then(|| name.to_string())
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Collapses `.` components and leading `./`, without touching the filesystem: two spellings of
/// the same relative path (`a/./b`, `./a/b`, `a/b`) must hash and compare equal so that they
/// address the same node. `..` components are preserved verbatim -- resolving them lexically
/// would silently change meaning in the presence of symlinks.
fn normalize_path(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_phony() {
        assert_eq!(Target::parse("#build"), Target::Phony("build".to_string()));
    }

    #[test]
    fn parses_variable() {
        assert_eq!(
            Target::parse("var(greeting)"),
            Target::Variable("greeting".to_string())
        );
    }

    #[test]
    fn non_identifier_inside_var_is_a_file() {
        // `var(1bad)` isn't a valid identifier, so it falls through to the File case.
        assert!(matches!(Target::parse("var(1bad)"), Target::File(_)));
    }

    #[test]
    fn normalizes_current_dir_components() {
        assert_eq!(Target::parse("./a/b"), Target::parse("a/./b"));
    }

    #[test]
    fn plain_string_is_a_file() {
        assert_eq!(
            Target::parse("out/hello.txt"),
            Target::File(PathBuf::from("out/hello.txt"))
        );
    }
}
