// Copyright 2026 Workflow project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::collections::HashMap;
use std::collections::HashSet;

/// A structural value that may carry `$NAME`/`${NAME}` placeholders: the substrate that
/// `gather_args`/`substitute` are defined over (§4.1). Strings are the leaf case; `Sequence` and
/// `Record` let the same two operations walk a homogeneous list or a named-field record without
/// the caller special-casing either.
#[derive(Clone, Debug, PartialEq)]
pub enum TemplateValue {
    Absent,
    Scalar(String),
    Sequence(Vec<TemplateValue>),
    Record(Vec<(String, TemplateValue)>),
}

/// Collects every placeholder identifier referenced anywhere within `value`.
pub fn gather_args(value: &TemplateValue) -> HashSet<String> {
    match value {
        TemplateValue::Absent => HashSet::new(),
        TemplateValue::Scalar(s) => gather_args_str(s),
        TemplateValue::Sequence(items) => items.iter().flat_map(gather_args).collect(),
        TemplateValue::Record(fields) => fields.iter().flat_map(|(_, v)| gather_args(v)).collect(),
    }
}

/// Replaces every placeholder in `value` with its binding in `env`. Unknown placeholders are left
/// untouched exactly as written -- this is "safe" substitution: it never fails.
pub fn substitute(value: &TemplateValue, env: &HashMap<String, String>) -> TemplateValue {
    match value {
        TemplateValue::Absent => TemplateValue::Absent,
        TemplateValue::Scalar(s) => TemplateValue::Scalar(substitute_str(s, env)),
        TemplateValue::Sequence(items) => {
            TemplateValue::Sequence(items.iter().map(|v| substitute(v, env)).collect())
        }
        TemplateValue::Record(fields) => TemplateValue::Record(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), substitute(v, env)))
                .collect(),
        ),
    }
}

enum Token<'a> {
    Literal(&'a str),
    Placeholder { name: &'a str, raw: &'a str },
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if is_ident_start(c) => chars.all(is_ident_continue),
        _ => false,
    }
}

/// Splits `s` into literal spans and `$NAME`/`${NAME}` placeholders, with `$$` recognized as a
/// literal `$`. A `$` that doesn't introduce a valid placeholder is left as an ordinary character.
fn tokenize(s: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut literal_start = 0;

    while i < s.len() {
        if s.as_bytes()[i] != b'$' {
            i += 1;
            continue;
        }

        if literal_start < i {
            tokens.push(Token::Literal(&s[literal_start..i]));
        }
        literal_start = i;

        if s[i + 1..].starts_with('$') {
            tokens.push(Token::Literal("$"));
            i += 2;
            literal_start = i;
            continue;
        }

        if let Some(rest) = s[i + 1..].strip_prefix('{') {
            if let Some(end) = rest.find('}') {
                let name = &rest[..end];
                if is_identifier(name) {
                    let raw_end = i + 1 + 1 + end + 1;
                    tokens.push(Token::Placeholder {
                        name,
                        raw: &s[i..raw_end],
                    });
                    i = raw_end;
                    literal_start = i;
                    continue;
                }
            }
        } else if let Some(c) = s[i + 1..].chars().next() {
            if is_ident_start(c) {
                let rest = &s[i + 1..];
                let end = rest
                    .find(|c: char| !is_ident_continue(c))
                    .unwrap_or(rest.len());
                let raw_end = i + 1 + end;
                tokens.push(Token::Placeholder {
                    name: &rest[..end],
                    raw: &s[i..raw_end],
                });
                i = raw_end;
                literal_start = i;
                continue;
            }
        }

        // Bare `$` that doesn't introduce a recognized placeholder: treat as a literal character.
        i += 1;
    }

    if literal_start < s.len() {
        tokens.push(Token::Literal(&s[literal_start..]));
    }
    tokens
}

/// The grammar core of §4.1, operating directly on a single string.
pub fn gather_args_str(s: &str) -> HashSet<String> {
    tokenize(s)
        .into_iter()
        .filter_map(|t| match t {
            Token::Placeholder { name, .. } => Some(name.to_string()),
            Token::Literal(_) => None,
        })
        .collect()
}

/// The grammar core of §4.1, operating directly on a single string. Substitution is a single pass
/// over `s`: the replacement text is never re-scanned for placeholders of its own.
pub fn substitute_str(s: &str, env: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(s.len());
    for token in tokenize(s) {
        match token {
            Token::Literal(text) => out.push_str(text),
            Token::Placeholder { name, raw } => match env.get(name) {
                Some(value) => out.push_str(value),
                None => out.push_str(raw),
            },
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn gathers_both_placeholder_forms() {
        let args = gather_args_str("$a and ${b} and $$c");
        assert_eq!(args, ["a", "b"].into_iter().map(String::from).collect());
    }

    #[test]
    fn dollar_dollar_is_literal() {
        assert_eq!(substitute_str("$$5", &env(&[])), "$5");
    }

    #[test]
    fn unknown_placeholder_passes_through_literally() {
        assert_eq!(substitute_str("${missing}-x", &env(&[])), "${missing}-x");
        assert_eq!(substitute_str("$missing-x", &env(&[])), "$missing-x");
    }

    #[test]
    fn known_placeholder_is_replaced() {
        assert_eq!(
            substitute_str("hello ${name}!", &env(&[("name", "world")])),
            "hello world!"
        );
    }

    #[test]
    fn safe_substitution_property() {
        // gather_args(substitute(s, e)) == gather_args(s) \ keys(e), provided replacement values
        // don't themselves contain placeholder syntax.
        let s = "$a-${b}-$c";
        let e = env(&[("a", "1"), ("b", "2")]);
        let substituted = substitute_str(s, &e);
        let expected: HashSet<String> = gather_args_str(s)
            .difference(&e.keys().cloned().collect())
            .cloned()
            .collect();
        assert_eq!(gather_args_str(&substituted), expected);
    }

    #[test]
    fn record_and_sequence_recurse() {
        let value = TemplateValue::Record(vec![
            ("a".to_string(), TemplateValue::Scalar("$x".to_string())),
            (
                "b".to_string(),
                TemplateValue::Sequence(vec![TemplateValue::Scalar("${y}".to_string())]),
            ),
        ]);
        assert_eq!(
            gather_args(&value),
            ["x", "y"].into_iter().map(String::from).collect()
        );
        let substituted = substitute(&value, &env(&[("x", "1"), ("y", "2")]));
        assert_eq!(
            substituted,
            TemplateValue::Record(vec![
                ("a".to_string(), TemplateValue::Scalar("1".to_string())),
                (
                    "b".to_string(),
                    TemplateValue::Sequence(vec![TemplateValue::Scalar("2".to_string())])
                ),
            ])
        );
    }
}
