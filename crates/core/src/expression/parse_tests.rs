// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn matcher(name: &str) -> Expr {
    Expr::Match(Matcher::new(name))
}

fn keyed(name: &str, key: &str, pattern: &str) -> Expr {
    Expr::Match(Matcher::new(name).with_patterns(vec![MatchPattern::Keyed {
        key: key.to_string(),
        pattern: pattern.to_string(),
    }]))
}

#[test]
fn bare_event_name() {
    assert_eq!(parse_condition("startup").unwrap(), matcher("startup"));
}

#[test]
fn keyed_argument() {
    assert_eq!(
        parse_condition("runlevel RUNLEVEL=[2345]").unwrap(),
        keyed("runlevel", "RUNLEVEL", "[2345]")
    );
}

#[test]
fn positional_argument() {
    assert_eq!(
        parse_condition("net-device-added eth0").unwrap(),
        Expr::Match(Matcher::new("net-device-added").with_patterns(vec![
            MatchPattern::Positional { pattern: "eth0".to_string() }
        ]))
    );
}

#[test]
fn and_binds_tighter_than_or() {
    let expr = parse_condition("a or b and c").unwrap();
    assert_eq!(
        expr,
        Expr::Or(
            Box::new(matcher("a")),
            Box::new(Expr::And(Box::new(matcher("b")), Box::new(matcher("c")))),
        )
    );
}

#[test]
fn parentheses_override_precedence() {
    let expr = parse_condition("(a or b) and c").unwrap();
    assert_eq!(
        expr,
        Expr::And(
            Box::new(Expr::Or(Box::new(matcher("a")), Box::new(matcher("b")))),
            Box::new(matcher("c")),
        )
    );
}

#[test]
fn chained_and_is_left_associative() {
    let expr = parse_condition("a and b and c").unwrap();
    assert_eq!(
        expr,
        Expr::And(
            Box::new(Expr::And(Box::new(matcher("a")), Box::new(matcher("b")))),
            Box::new(matcher("c")),
        )
    );
}

#[parameterized(
    empty = { "" },
    only_operator = { "and" },
    dangling_and = { "a and" },
    unbalanced_open = { "(a or b" },
    leading_close = { ") a" },
)]
fn rejected_conditions(input: &str) {
    assert!(parse_condition(input).is_err(), "{input:?} should not parse");
}

#[test]
fn trailing_close_paren_is_trailing_input() {
    assert_eq!(
        parse_condition("a )"),
        Err(ParseError::TrailingInput(")".to_string()))
    );
}

#[test]
fn tokens_hug_parens() {
    let expr = parse_condition("(a)and(b)").unwrap();
    assert_eq!(expr, Expr::And(Box::new(matcher("a")), Box::new(matcher("b"))));
}
