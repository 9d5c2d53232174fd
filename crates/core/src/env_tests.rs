// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn set_appends_then_replaces_in_place() {
    let mut env = EnvTable::new();
    env.set("TERM", "vt102");
    env.set("TTY", "tty1");
    env.set("TERM", "linux");

    assert_eq!(env.entries(), ["TERM=linux", "TTY=tty1"]);
    assert_eq!(env.get("TERM"), Some("linux"));
}

#[test]
fn lookup_returns_last_duplicate() {
    let env = EnvTable::from_entries(["KEY=one", "OTHER=x", "KEY=two"]);
    assert_eq!(env.get("KEY"), Some("two"));
    assert_eq!(env.entry("KEY"), Some("KEY=two"));
}

#[test]
fn lookup_missing_key() {
    let env = EnvTable::from_entries(["KEY=one"]);
    assert_eq!(env.get("MISSING"), None);
}

#[test]
fn empty_env_accepted() {
    let env = EnvTable::new();
    assert!(env.is_empty());
    assert_eq!(env.get("ANY"), None);
}

#[test]
fn merge_uses_replace_semantics() {
    let mut env = EnvTable::from_entries(["A=1", "B=2"]);
    env.merge(&EnvTable::from_entries(["B=3", "C=4"]));
    assert_eq!(env.entries(), ["A=1", "B=3", "C=4"]);
}

#[test]
fn entry_at_is_positional() {
    let env = EnvTable::from_entries(["A=1", "B=2"]);
    assert_eq!(env.entry_at(1), Some("B=2"));
    assert_eq!(env.entry_at(2), None);
}

#[parameterized(
    bare = { "tty$TTY", "ttytty1" },
    braced = { "con-${TTY}-sole", "con-tty1-sole" },
    doubled = { "$$TTY", "$TTY" },
    trailing_literal = { "price: 5$", "price: 5$" },
    adjacent = { "$TTY$TTY", "tty1tty1" },
)]
fn expand_substitutes(template: &str, expected: &str) {
    let env = EnvTable::from_entries(["TTY=tty1"]);
    assert_eq!(env.expand(template).unwrap(), expected);
}

#[test]
fn expand_unknown_variable_is_an_error() {
    let env = EnvTable::new();
    assert_eq!(
        env.expand("$MISSING"),
        Err(ExpandError::UnknownVariable("MISSING".to_string()))
    );
}

#[test]
fn expand_unterminated_brace_is_an_error() {
    let env = EnvTable::from_entries(["TTY=tty1"]);
    assert_eq!(env.expand("${TTY"), Err(ExpandError::Unterminated));
    assert_eq!(env.expand("${}"), Err(ExpandError::Unterminated));
}

#[parameterized(
    literal = { "linux", "linux", true },
    literal_miss = { "linux", "vt102", false },
    star = { "tty*", "ttyS0", true },
    star_empty = { "tty*", "tty", true },
    star_middle = { "a*c", "abbbc", true },
    star_backtrack = { "a*bc", "abbc", true },
    question = { "tty?", "tty1", true },
    question_miss = { "tty?", "tty", false },
    class = { "tty[12]", "tty2", true },
    class_miss = { "tty[12]", "tty3", false },
    class_range = { "runlevel[2-5]", "runlevel3", true },
    class_negated = { "runlevel[!2-5]", "runlevel1", true },
    class_negated_miss = { "runlevel[!2-5]", "runlevel3", false },
    unterminated_class = { "a[b", "a[b", true },
    star_tail = { "*", "", true },
)]
fn glob_cases(pattern: &str, text: &str, expected: bool) {
    assert_eq!(glob_match(pattern, text), expected, "{pattern} vs {text}");
}

#[test]
fn unterminated_class_matches_literal_bracket() {
    // `[` with no closing `]` matches itself, like fnmatch.
    assert!(glob_match("a[", "a["));
}
