// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Boolean trees over event-name matchers.
//!
//! A class's `start-on`/`stop-on` condition is a tree of matchers composed
//! with `and`/`or`. Matchers latch: once an event satisfies one, it stays
//! satisfied (holding a capture of the event's environment) until the tree
//! is reset after a successful match has been acted on. That is what makes
//! `started A and started B` work across two separate events.

pub mod parse;

use crate::env::{glob_match, EnvTable};
use crate::id::EventId;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// One pattern inside a matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPattern {
    /// `KEY=PATTERN`: glob-match the event's value for `KEY`.
    Keyed { key: String, pattern: String },
    /// A bare pattern matching the event's Nth env entry by position.
    Positional { pattern: String },
}

/// The capture a satisfied matcher holds until reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Captured {
    pub event: EventId,
    pub env: EnvTable,
    pub fd: Option<i32>,
}

/// A single event matcher: name equality plus optional env patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matcher {
    pub name: SmolStr,
    pub patterns: Vec<MatchPattern>,
    #[serde(default)]
    value: bool,
    #[serde(default)]
    captured: Option<Captured>,
}

impl Matcher {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self { name: name.into(), patterns: Vec::new(), value: false, captured: None }
    }

    pub fn with_patterns(mut self, patterns: Vec<MatchPattern>) -> Self {
        self.patterns = patterns;
        self
    }

    /// Whether the matcher accepts this event. Patterns are expanded
    /// against the job environment first; an expansion failure means no
    /// match rather than an error.
    fn accepts(&self, name: &str, env: &EnvTable, job_env: Option<&EnvTable>) -> bool {
        if self.name != name {
            return false;
        }

        let expand = |pattern: &str| -> Option<String> {
            match job_env {
                Some(job_env) => job_env.expand(pattern).ok(),
                None => Some(pattern.to_string()),
            }
        };

        let mut position = 0;
        for item in &self.patterns {
            let ok = match item {
                MatchPattern::Keyed { key, pattern } => match (expand(pattern), env.get(key)) {
                    (Some(pattern), Some(value)) => glob_match(&pattern, value),
                    _ => false,
                },
                MatchPattern::Positional { pattern } => {
                    let index = position;
                    position += 1;
                    match (expand(pattern), env.entry_at(index)) {
                        (Some(pattern), Some(entry)) => glob_match(&pattern, entry),
                        _ => false,
                    }
                }
            };
            if !ok {
                return false;
            }
        }

        true
    }
}

/// A boolean expression over matchers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Match(Matcher),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Offer an event to the tree. Any matcher that now accepts it latches
    /// true and captures the event. Returns whether any matcher updated;
    /// callers combine this with [`Expr::value`] to decide whether the
    /// event triggered the condition.
    pub fn handle(
        &mut self,
        event: EventId,
        name: &str,
        env: &EnvTable,
        fd: Option<i32>,
        job_env: Option<&EnvTable>,
    ) -> bool {
        match self {
            Expr::Match(m) => {
                if m.accepts(name, env, job_env) {
                    m.value = true;
                    m.captured = Some(Captured { event, env: env.clone(), fd });
                    true
                } else {
                    false
                }
            }
            Expr::And(l, r) | Expr::Or(l, r) => {
                // No short-circuit: both sides see every event.
                let lu = l.handle(event, name, env, fd, job_env);
                let ru = r.handle(event, name, env, fd, job_env);
                lu || ru
            }
        }
    }

    /// Evaluate the tree bottom-up from the latched matcher values.
    pub fn value(&self) -> bool {
        match self {
            Expr::Match(m) => m.value,
            Expr::And(l, r) => l.value() && r.value(),
            Expr::Or(l, r) => l.value() || r.value(),
        }
    }

    /// Collect the environment captured by satisfied matchers into `sink`,
    /// led by a single `prefix` variable listing the matched event names.
    pub fn environment(&self, sink: &mut EnvTable, prefix: &str) {
        let captures = self.captures();

        let names: Vec<&str> =
            captures.iter().map(|(name, _)| name.as_str()).collect();
        sink.set(prefix, &names.join(" "));

        for (_, capture) in captures {
            sink.merge(&capture.env);
        }
    }

    /// The captures of all satisfied matchers, in tree order.
    pub fn captures(&self) -> Vec<(&SmolStr, &Captured)> {
        let mut out = Vec::new();
        self.collect_captures(&mut out);
        out
    }

    fn collect_captures<'a>(&'a self, out: &mut Vec<(&'a SmolStr, &'a Captured)>) {
        match self {
            Expr::Match(m) => {
                if m.value {
                    if let Some(capture) = &m.captured {
                        out.push((&m.name, capture));
                    }
                }
            }
            Expr::And(l, r) | Expr::Or(l, r) => {
                l.collect_captures(out);
                r.collect_captures(out);
            }
        }
    }

    /// Clear every matcher's value and capture, once a successful match
    /// has been acted on.
    pub fn reset(&mut self) {
        match self {
            Expr::Match(m) => {
                m.value = false;
                m.captured = None;
            }
            Expr::And(l, r) | Expr::Or(l, r) => {
                l.reset();
                r.reset();
            }
        }
    }
}

#[cfg(test)]
#[path = "expression_tests.rs"]
mod tests;
