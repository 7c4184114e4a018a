//! Label selector parsing and matching
//!
//! Selectors use the Kubernetes string syntax and are evaluated with
//! `kube::core::Selector`:
//! - Equality: `key=value` or `key==value`
//! - Inequality: `key!=value`
//! - Set-based: `key in (v1,v2)` or `key notin (v1,v2)`
//! - Existence: `key` or `!key`
//!
//! Requirements separated by commas must all hold.

use crate::{Error, Result};
use kube::core::{Expression, Selector, SelectorExt};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// A parsed label selector; the empty selector matches everything
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LabelSelector {
    source: String,
    expressions: Vec<Expression>,
}

impl LabelSelector {
    /// Selector matching every set of labels
    pub fn everything() -> Self {
        Self::default()
    }

    /// Parse an optional selector as carried by list parameters
    pub fn from_optional(selector: Option<&str>) -> Result<Self> {
        selector.map_or_else(|| Ok(Self::everything()), |s| s.parse())
    }

    pub fn is_everything(&self) -> bool {
        self.expressions.is_empty()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        if self.is_everything() {
            return true;
        }
        Selector::from_iter(self.expressions.clone()).matches(labels)
    }
}

impl FromStr for LabelSelector {
    type Err = Error;

    fn from_str(selector: &str) -> Result<Self> {
        let mut expressions = Vec::new();
        for requirement in split_requirements(selector)? {
            let requirement = requirement.trim();
            if requirement.is_empty() {
                continue;
            }
            expressions.push(parse_requirement(requirement)?);
        }
        Ok(Self {
            source: selector.trim().to_string(),
            expressions,
        })
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Split on commas that are not inside a value set
fn split_requirements(selector: &str) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_set = false;

    for (i, ch) in selector.char_indices() {
        match ch {
            '(' if in_set => return Err(invalid(selector, "nested '('")),
            '(' => in_set = true,
            ')' if !in_set => return Err(invalid(selector, "unbalanced ')'")),
            ')' => in_set = false,
            ',' if !in_set => {
                parts.push(&selector[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if in_set {
        return Err(invalid(selector, "unterminated value set"));
    }
    parts.push(&selector[start..]);
    Ok(parts)
}

fn parse_requirement(requirement: &str) -> Result<Expression> {
    if let Some(key) = requirement.strip_prefix('!') {
        return Ok(Expression::DoesNotExist(parse_key(requirement, key.trim())?));
    }

    let key_end = requirement
        .find(|c: char| c == '=' || c == '!' || c.is_whitespace())
        .unwrap_or(requirement.len());
    let key = parse_key(requirement, &requirement[..key_end])?;
    let rest = requirement[key_end..].trim_start();

    if rest.is_empty() {
        return Ok(Expression::Exists(key));
    }
    if let Some(value) = rest.strip_prefix("!=") {
        return Ok(Expression::NotIn(key, single(requirement, value)?));
    }
    if let Some(value) = rest.strip_prefix("==").or_else(|| rest.strip_prefix('=')) {
        return Ok(Expression::In(key, single(requirement, value)?));
    }
    if let Some(set) = strip_keyword(rest, "notin") {
        return Ok(Expression::NotIn(key, value_set(requirement, set)?));
    }
    if let Some(set) = strip_keyword(rest, "in") {
        return Ok(Expression::In(key, value_set(requirement, set)?));
    }
    Err(invalid(requirement, "unknown operator"))
}

fn strip_keyword<'a>(rest: &'a str, keyword: &str) -> Option<&'a str> {
    let tail = rest.strip_prefix(keyword)?;
    (tail.starts_with('(') || tail.starts_with(char::is_whitespace)).then_some(tail)
}

fn parse_key(requirement: &str, key: &str) -> Result<String> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'));
    if valid {
        Ok(key.to_string())
    } else {
        Err(invalid(requirement, "invalid label key"))
    }
}

fn parse_value(requirement: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        Ok(value.to_string())
    } else {
        Err(invalid(requirement, "invalid label value"))
    }
}

fn single(requirement: &str, value: &str) -> Result<BTreeSet<String>> {
    Ok(BTreeSet::from([parse_value(requirement, value)?]))
}

fn value_set(requirement: &str, set: &str) -> Result<BTreeSet<String>> {
    let inner = set
        .trim()
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| invalid(requirement, "expected a parenthesized value set"))?;
    if inner.trim().is_empty() {
        return Err(invalid(requirement, "empty value set"));
    }
    inner
        .split(',')
        .map(|value| parse_value(requirement, value))
        .collect()
}

fn invalid(requirement: &str, reason: &str) -> Error {
    Error::InvalidRequest(format!(
        "unable to parse label selector {:?}: {}",
        requirement, reason
    ))
}
