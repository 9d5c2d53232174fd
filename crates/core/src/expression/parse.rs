// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parser for `start-on` / `stop-on` condition strings.
//!
//! Grammar:
//!
//! ```text
//! expr   := term { "or" term }
//! term   := factor { "and" factor }
//! factor := "(" expr ")" | match
//! match  := NAME { KEY=PATTERN | PATTERN }
//! ```
//!
//! `and` binds tighter than `or`. An argument containing `=` matches by
//! key, anything else matches the event's env positionally.

use super::{Expr, MatchPattern, Matcher};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("expected an event name")]
    ExpectedEvent,

    #[error("unexpected token: {0}")]
    UnexpectedToken(String),

    #[error("unbalanced parenthesis")]
    UnbalancedParen,

    #[error("trailing input after condition: {0}")]
    TrailingInput(String),
}

/// Parse a condition string into an expression tree.
pub fn parse_condition(input: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(input);
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expr()?;
    match parser.peek() {
        None => Ok(expr),
        Some(tok) => Err(ParseError::TrailingInput(tok.to_string())),
    }
}

fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    for c in input.chars() {
        match c {
            '(' | ')' => {
                if !word.is_empty() {
                    tokens.push(std::mem::take(&mut word));
                }
                tokens.push(c.to_string());
            }
            c if c.is_whitespace() => {
                if !word.is_empty() {
                    tokens.push(std::mem::take(&mut word));
                }
            }
            c => word.push(c),
        }
    }
    if !word.is_empty() {
        tokens.push(word);
    }
    tokens
}

struct Parser {
    tokens: Vec<String>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn bump(&mut self) -> Option<&str> {
        let tok = self.tokens.get(self.pos).map(String::as_str);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.term()?;
        while self.peek() == Some("or") {
            self.bump();
            let right = self.term()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.factor()?;
        while self.peek() == Some("and") {
            self.bump();
            let right = self.factor()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<Expr, ParseError> {
        let tok = self.peek().map(str::to_string);
        match tok.as_deref() {
            Some("(") => {
                self.bump();
                let inner = self.expr()?;
                if self.bump() != Some(")") {
                    return Err(ParseError::UnbalancedParen);
                }
                Ok(inner)
            }
            Some(tok @ (")" | "and" | "or")) => {
                Err(ParseError::UnexpectedToken(tok.to_string()))
            }
            Some(_) => self.matcher(),
            None => Err(ParseError::ExpectedEvent),
        }
    }

    fn matcher(&mut self) -> Result<Expr, ParseError> {
        let name = match self.bump() {
            Some(name) => name.to_string(),
            None => return Err(ParseError::ExpectedEvent),
        };

        let mut patterns = Vec::new();
        while let Some(tok) = self.peek() {
            if matches!(tok, "and" | "or" | "(" | ")") {
                break;
            }
            patterns.push(match tok.split_once('=') {
                Some((key, pattern)) if !key.is_empty() => MatchPattern::Keyed {
                    key: key.to_string(),
                    pattern: pattern.to_string(),
                },
                _ => MatchPattern::Positional { pattern: tok.to_string() },
            });
            self.bump();
        }

        Ok(Expr::Match(Matcher::new(name).with_patterns(patterns)))
    }
}

#[cfg(test)]
#[path = "parse_tests.rs"]
mod tests;
