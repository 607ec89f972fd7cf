//! # Measures
//!
//! Dimension-valued style attributes: plain numbers, unit strings such as
//! `"3em"` or `"+2pt"`, and symbolic aliases like `"large"` that resolve
//! through a mapping table.
//!
//! The `em` unit is not a true em box. It is the supplied base size, which is
//! close enough for inline typography.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{InklineError, Result};

/// Aliases may point at other aliases; chains longer than this are rejected.
pub const MAX_ALIAS_DEPTH: usize = 16;

/// A raw dimension value as it appears in a style table or tag attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Measure {
    /// Absolute size in points.
    Points(f64),
    /// `[sign]digits[unit]` expression or a symbolic alias.
    Expr(String),
}

impl From<f64> for Measure {
    fn from(v: f64) -> Self {
        Measure::Points(v)
    }
}

impl From<&str> for Measure {
    fn from(s: &str) -> Self {
        Measure::Expr(s.to_string())
    }
}

impl From<String> for Measure {
    fn from(s: String) -> Self {
        Measure::Expr(s)
    }
}

/// Everything a measure may be relative to.
#[derive(Debug, Clone, Copy)]
pub struct MeasureContext<'a> {
    /// Base for `%` values.
    pub relative: f64,
    /// Base for `em` values.
    pub em: f64,
    /// Baseline for signed (`+`/`-`) values.
    pub current: f64,
    /// Symbolic alias table.
    pub mappings: Option<&'a HashMap<String, Measure>>,
}

impl Default for MeasureContext<'_> {
    fn default() -> Self {
        Self {
            relative: 0.0,
            em: 12.0,
            current: 0.0,
            mappings: None,
        }
    }
}

impl<'a> MeasureContext<'a> {
    pub fn with_relative(mut self, relative: f64) -> Self {
        self.relative = relative;
        self
    }

    pub fn with_em(mut self, em: f64) -> Self {
        self.em = em;
        self
    }

    pub fn with_current(mut self, current: f64) -> Self {
        self.current = current;
        self
    }

    pub fn with_mappings(mut self, mappings: &'a HashMap<String, Measure>) -> Self {
        self.mappings = Some(mappings);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sign {
    Plus,
    Minus,
    Absolute,
}

/// Resolve a measure to points.
pub fn evaluate_measure(measure: &Measure, ctx: &MeasureContext<'_>) -> Result<f64> {
    let mut chain = Vec::new();
    evaluate_inner(measure, ctx, &mut chain)
}

fn evaluate_inner(
    measure: &Measure,
    ctx: &MeasureContext<'_>,
    chain: &mut Vec<String>,
) -> Result<f64> {
    let expr = match measure {
        Measure::Points(v) => return Ok(*v),
        Measure::Expr(expr) => expr.trim(),
    };

    let Some((sign, value, unit)) = split_dimension(expr) else {
        return resolve_alias(expr, ctx, chain);
    };

    let value = match unit {
        "" | "pt" => value,
        "pc" => value * 12.0,
        "in" => value * 72.0,
        "%" => ctx.relative * value / 100.0,
        "em" => value * ctx.em,
        _ => {
            return Err(InklineError::style_value(
                "measure",
                expr,
                format!("unsupported unit {unit:?}"),
            ))
        }
    };

    Ok(match sign {
        Sign::Plus => ctx.current + value,
        Sign::Minus => ctx.current - value,
        Sign::Absolute => value,
    })
}

fn resolve_alias(name: &str, ctx: &MeasureContext<'_>, chain: &mut Vec<String>) -> Result<f64> {
    if chain.iter().any(|seen| seen == name) {
        return Err(InklineError::style_value(
            "measure",
            name,
            format!("alias cycle through {}", chain.join(" -> ")),
        ));
    }
    if chain.len() >= MAX_ALIAS_DEPTH {
        return Err(InklineError::style_value(
            "measure",
            name,
            format!("alias chain deeper than {MAX_ALIAS_DEPTH}"),
        ));
    }

    let target = ctx
        .mappings
        .and_then(|m| m.get(name))
        .ok_or_else(|| InklineError::style_value("measure", name, "unrecognized value"))?;

    chain.push(name.to_string());
    let resolved = evaluate_inner(target, ctx, chain);
    chain.pop();
    resolved
}

/// Split `[sign]digits[.digits]unit`. Returns `None` when no number leads the
/// expression, which marks it as an alias.
fn split_dimension(expr: &str) -> Option<(Sign, f64, &str)> {
    let (sign, rest) = match expr.as_bytes().first() {
        Some(b'+') => (Sign::Plus, &expr[1..]),
        Some(b'-') => (Sign::Minus, &expr[1..]),
        _ => (Sign::Absolute, expr),
    };

    let int_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if int_end == 0 {
        return None;
    }

    let mut num_end = int_end;
    if let Some(frac) = rest[int_end..].strip_prefix('.') {
        let frac_len = frac
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(frac.len());
        if frac_len > 0 {
            num_end = int_end + 1 + frac_len;
        }
    }

    let value: f64 = rest[..num_end].parse().ok()?;
    Some((sign, value, rest[num_end..].trim()))
}
