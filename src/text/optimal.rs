//! # Optimal Line Breaking
//!
//! Minimum-raggedness breaking over one paragraph of instructions. Instead
//! of filling each line greedily, every feasible break is considered and the
//! sequence with the lowest total badness wins, where a line's badness is
//! the square of the room left at its end.
//!
//! The search runs forward over an arena of [`BreakCandidate`]s linked to
//! their parents by index. Only the cheapest candidate per position is kept,
//! which makes the search a straightforward dynamic program.
//!
//! Breaks whose badness exceeds the current tolerance are not considered.
//! When no break sequence survives, the tolerance grows and the search runs
//! again; after a bounded number of attempts the paragraph is broken
//! greedily instead.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::font::FontMetrics;

use super::instruction::{Instruction, WidthKind};
use super::layout_builder::{greedy_line, EPSILON};
use super::line::Line;

/// Tuning for the optimal search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptimalConfig {
    /// Initial tolerance as a fraction of the line width; the badness limit
    /// is `(ratio * width)^2`.
    pub initial_tolerance_ratio: f64,
    /// Tolerance multiplier applied on each retry.
    pub growth: f64,
    pub max_retries: u32,
    /// Badness charged for a line holding a token wider than the column.
    pub overflow_penalty: f64,
}

impl Default for OptimalConfig {
    fn default() -> Self {
        Self {
            initial_tolerance_ratio: 0.2,
            growth: 2.0,
            max_retries: 12,
            overflow_penalty: 10_000.0,
        }
    }
}

impl OptimalConfig {
    fn tolerance(&self, width: f64, attempt: u32) -> f64 {
        (self.initial_tolerance_ratio * width).powi(2) * self.growth.powi(attempt as i32)
    }
}

/// A point where a line may start.
#[derive(Debug, Clone)]
struct BreakCandidate {
    /// Index of the first instruction on the line that starts here.
    position: usize,
    cumulative_badness: f64,
    /// Index of the previous candidate in the arena.
    parent: Option<usize>,
    /// Width of the line that ended at this candidate.
    width_so_far: f64,
}

/// Break a paragraph into lines. The last line is always a hard break; when
/// `justify` is set it is padded with a strut to the full width.
pub fn break_lines(
    instructions: Vec<Instruction>,
    width: f64,
    config: &OptimalConfig,
    justify: bool,
    fonts: &dyn FontMetrics,
) -> Result<Vec<Line>> {
    if instructions.is_empty() {
        return Ok(Vec::new());
    }

    let mut found = None;
    for attempt in 0..=config.max_retries {
        let tolerance = config.tolerance(width, attempt);
        if let Some(path) = find_breaks(&instructions, width, tolerance, config) {
            log::debug!(
                "optimal breaks for {} instructions at tolerance {tolerance:.1} after {} retries",
                instructions.len(),
                attempt
            );
            found = Some(path);
            break;
        }
        log::debug!("no break sequence within tolerance {tolerance:.1}, widening");
    }

    let Some(path) = found else {
        log::warn!(
            "optimal breaking gave up after {} retries, breaking {} instructions greedily",
            config.max_retries,
            instructions.len()
        );
        let mut source: VecDeque<Instruction> = instructions.into();
        let mut lines = Vec::new();
        while let Some(line) = greedy_line(&mut source, width)? {
            lines.push(line);
        }
        return Ok(lines);
    };

    let mut lines = Vec::with_capacity(path.len());
    let mut rest = instructions;
    // Split from the back so each split_off is cheap.
    for (index, &start) in path.iter().enumerate().rev() {
        let tail = rest.split_off(start);
        let last = index + 1 == path.len();
        lines.push(Line::new(tail, last));
    }
    lines.reverse();

    if justify {
        if let Some(last) = lines.last_mut() {
            if let Some(state) = last.instructions().last().map(|i| i.state().clone()) {
                last.pad_to(width, |room| Instruction::strut(room, state, fonts));
            }
        }
    }

    Ok(lines)
}

/// Positions at which lines start, in order, or `None` when no break
/// sequence fits the tolerance.
fn find_breaks(
    items: &[Instruction],
    width: f64,
    tolerance: f64,
    config: &OptimalConfig,
) -> Option<Vec<usize>> {
    let n = items.len();

    // visible_from[k]: something visible remains in items[k..].
    let mut visible_from = vec![false; n + 1];
    for k in (0..n).rev() {
        visible_from[k] = visible_from[k + 1] || items[k].is_visible();
    }

    let mut arena = vec![BreakCandidate {
        position: 0,
        cumulative_badness: 0.0,
        parent: None,
        width_so_far: 0.0,
    }];
    let mut best_at: Vec<Option<usize>> = vec![None; n];
    best_at[0] = Some(0);
    let mut terminal: Option<usize> = None;

    for start in 0..n {
        let Some(current) = best_at[start] else {
            continue;
        };
        let base = arena[current].cumulative_badness;

        let mut running = 0.0;
        let mut seen_break = false;
        let mut penalty = 0.0;
        let mut reached_end = true;

        for i in start..n {
            let item = &items[i];
            let solid = item.width(WidthKind::NonDiscardable);
            if solid > 0.0 && running + solid > width + EPSILON {
                if seen_break {
                    reached_end = false;
                    break;
                }
                // Nothing to break at: the token stays, at a price.
                penalty = config.overflow_penalty;
            }
            running += solid;

            if !item.is_break_opportunity() {
                running += item.width(WidthKind::Discardable);
                continue;
            }
            seen_break = true;
            if !visible_from[i + 1] {
                // Only trailing whitespace and markers remain.
                break;
            }

            let badness = if penalty > 0.0 {
                penalty
            } else {
                (width - running).powi(2)
            };
            // A line never starts with whitespace: the next line begins after
            // the whole whitespace run, which was already considered at its
            // first instruction.
            let mut next = i + 1;
            while next < n && items[next].is_discardable() {
                next += 1;
            }
            let continues_run = i > start && item.is_discardable() && items[i - 1].is_discardable();
            if (penalty > 0.0 || badness <= tolerance) && next < n && !continues_run {
                let cumulative = base + badness;
                let better = best_at[next]
                    .map_or(true, |idx| cumulative < arena[idx].cumulative_badness);
                if better {
                    best_at[next] = Some(arena.len());
                    arena.push(BreakCandidate {
                        position: next,
                        cumulative_badness: cumulative,
                        parent: Some(current),
                        width_so_far: running,
                    });
                }
            }

            let trailing = item.width(WidthKind::Discardable);
            if penalty > 0.0 || running + trailing > width + EPSILON {
                reached_end = false;
                break;
            }
            running += trailing;
        }

        if reached_end {
            // The last line is free apart from any overflow penalty.
            let cumulative = base + penalty;
            let better = terminal.map_or(true, |idx| cumulative < arena[idx].cumulative_badness);
            if better {
                terminal = Some(arena.len());
                arena.push(BreakCandidate {
                    position: n,
                    cumulative_badness: cumulative,
                    parent: Some(current),
                    width_so_far: running,
                });
            }
        }
    }

    let terminal = terminal?;
    log::trace!(
        "best break sequence: badness {:.1}, last line {:.2} wide, {} candidates",
        arena[terminal].cumulative_badness,
        arena[terminal].width_so_far,
        arena.len()
    );

    // Walk parents back from the terminal, collecting line starts.
    let mut starts = Vec::new();
    let mut node = arena[terminal].parent;
    while let Some(idx) = node {
        starts.push(arena[idx].position);
        node = arena[idx].parent;
    }
    starts.reverse();
    Some(starts)
}
