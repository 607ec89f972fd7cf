//! Line breaking.
//!
//! The greedy breaker fills each line as far as it can and cuts at the last
//! break opportunity. It only ever looks one line ahead, so it works on
//! unbounded input. The optimal breaker (see [`super::optimal`]) buffers one
//! paragraph at a time and hands lines out from a queue.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::instruction::{Instruction, InstructionKind, WidthKind};
use super::line::Line;
use super::optimal::{self, OptimalConfig};
use super::parser::{InstructionSource, Parser};

/// Slack allowed when comparing widths.
pub(crate) const EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    #[default]
    Greedy,
    Optimal,
}

/// Take one line from `source`. Returns `None` once the source is empty.
///
/// An unbreakable run wider than `width` gets a line of its own; every other
/// line fits.
pub fn greedy_line(source: &mut dyn InstructionSource, width: f64) -> Result<Option<Line>> {
    let mut line: Vec<Instruction> = Vec::new();
    let mut filled = 0.0;
    // Cut point just after the most recent break opportunity.
    let mut last_break: Option<usize> = None;

    loop {
        let Some(instruction) = source.next_instruction()? else {
            if line.is_empty() {
                return Ok(None);
            }
            return Ok(Some(Line::new(line, true)));
        };

        if instruction.is_forced_break() {
            line.push(instruction);
            return Ok(Some(Line::new(line, true)));
        }

        let solid = instruction.width(WidthKind::NonDiscardable);
        if solid > 0.0 && filled + solid > width + EPSILON {
            if let Some(cut) = last_break {
                let carry = line.split_off(cut);
                source.push_back(instruction);
                for carried in carry.into_iter().rev() {
                    source.push_back(carried);
                }
                return Ok(Some(Line::new(line, false)));
            }
            // Nothing to break at yet: the run stays together, over-wide.
        }

        let all = instruction.width(WidthKind::All);
        if instruction.is_discardable() && filled + all > width + EPSILON {
            if filled == 0.0 {
                continue;
            }
            // Whitespace that would overflow ends the line and is dropped.
            return close_after_whitespace(source, line).map(Some);
        }

        filled += all;
        let breakable = instruction.is_break_opportunity();
        line.push(instruction);
        if breakable {
            last_break = Some(line.len());
        }
    }
}

/// End a line whose trailing whitespace overflowed. What follows decides
/// whether the line is soft: end of input and forced breaks (possibly behind
/// more whitespace or closing markers) make it hard.
fn close_after_whitespace(
    source: &mut dyn InstructionSource,
    mut line: Vec<Instruction>,
) -> Result<Line> {
    loop {
        let Some(next) = source.next_instruction()? else {
            return Ok(Line::new(line, true));
        };
        if next.is_forced_break() {
            line.push(next);
            return Ok(Line::new(line, true));
        }
        match next.kind() {
            _ if next.is_discardable() => {}
            InstructionKind::TagClose { .. } | InstructionKind::LinkEnd => line.push(next),
            _ => {
                source.push_back(next);
                return Ok(Line::new(line, false));
            }
        }
    }
}

/// Incremental line producer over a parser.
pub struct LayoutBuilder<'a> {
    parser: Parser<'a>,
    algorithm: Algorithm,
    optimal: OptimalConfig,
    /// Pad the last line of each paragraph when breaking optimally.
    justify: bool,
    queued: VecDeque<Line>,
}

impl<'a> LayoutBuilder<'a> {
    pub fn new(parser: Parser<'a>) -> Self {
        Self {
            parser,
            algorithm: Algorithm::Greedy,
            optimal: OptimalConfig::default(),
            justify: false,
            queued: VecDeque::new(),
        }
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm, config: OptimalConfig) -> Self {
        self.algorithm = algorithm;
        self.optimal = config;
        self
    }

    pub fn with_justify(mut self, justify: bool) -> Self {
        self.justify = justify;
        self
    }

    /// True when every line has been handed out.
    pub fn done(&mut self) -> Result<bool> {
        Ok(self.queued.is_empty() && self.parser.eos()?)
    }

    pub fn next_line(&mut self, width: f64) -> Result<Option<Line>> {
        if let Some(line) = self.queued.pop_front() {
            return Ok(Some(line));
        }
        match self.algorithm {
            Algorithm::Greedy => greedy_line(&mut self.parser, width),
            Algorithm::Optimal => {
                let paragraph = self.next_paragraph()?;
                let fonts = self.parser.fonts();
                let lines =
                    optimal::break_lines(paragraph, width, &self.optimal, self.justify, fonts)?;
                self.queued.extend(lines);
                Ok(self.queued.pop_front())
            }
        }
    }

    /// Lines up to and including the next forced break.
    fn next_paragraph(&mut self) -> Result<Vec<Instruction>> {
        let mut paragraph = Vec::new();
        while let Some(instruction) = self.parser.next()? {
            let forced = instruction.is_forced_break();
            paragraph.push(instruction);
            if forced {
                break;
            }
        }
        Ok(paragraph)
    }

    /// Return a line so the next `next_line` hands it out again.
    pub fn unshift(&mut self, line: Line) {
        self.queued.push_front(line);
    }

    /// Take as many lines as fit in `height`, advancing `spacing` extra per
    /// line. At least one line is taken so callers always make progress, and
    /// a page-break line ends the batch.
    pub fn fill(&mut self, width: f64, height: f64, spacing: f64) -> Result<Vec<Line>> {
        let mut lines = Vec::new();
        let mut used = 0.0;
        while let Some(line) = self.next_line(width)? {
            let advance = line.height() + spacing;
            if !lines.is_empty() && used + advance > height + EPSILON {
                self.unshift(line);
                break;
            }
            used += advance;
            let page_break = line.page_break;
            lines.push(line);
            if page_break {
                break;
            }
        }
        log::trace!("filled {} lines using {used:.2} of {height:.2}", lines.len());
        Ok(lines)
    }

    /// Lay out everything that is left.
    pub fn lines(mut self, width: f64) -> Result<Vec<Line>> {
        let mut lines = Vec::new();
        while let Some(line) = self.next_line(width)? {
            lines.push(line);
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::FontContext;
    use crate::style::StyleRegistry;
    use crate::text::state::{RootStyle, StyleState};

    /// Courier 10pt: every character is 6pt wide.
    fn layout(text: &str, width: f64, algorithm: Algorithm) -> Vec<Line> {
        let fonts = FontContext::new();
        let registry = StyleRegistry::default();
        let root = StyleState::root(
            &fonts,
            &RootStyle {
                font_family: "Courier",
                font_size: 10.0,
                ..Default::default()
            },
        );
        let parser = Parser::new(text, root, &fonts, &registry);
        LayoutBuilder::new(parser)
            .with_algorithm(algorithm, OptimalConfig::default())
            .lines(width)
            .unwrap()
    }

    fn texts(lines: &[Line]) -> Vec<String> {
        lines.iter().map(Line::text).collect()
    }

    #[test]
    fn short_text_is_one_hard_line() {
        let lines = layout("hello", 100.0, Algorithm::Greedy);
        assert_eq!(texts(&lines), vec!["hello"]);
        assert!(lines[0].hard_break);
    }

    #[test]
    fn greedy_wraps_at_spaces() {
        // 60pt holds ten characters.
        let lines = layout("aaa bbb ccc ddd", 60.0, Algorithm::Greedy);
        assert_eq!(texts(&lines), vec!["aaa bbb", "ccc ddd"]);
        assert!(!lines[0].hard_break);
        assert!(lines[1].hard_break);
        assert_eq!(lines[0].width(), 42.0);
    }

    #[test]
    fn greedy_wraps_after_hyphens() {
        let lines = layout("well-known fact", 36.0, Algorithm::Greedy);
        assert_eq!(texts(&lines), vec!["well-", "known", "fact"]);
    }

    #[test]
    fn oversized_word_gets_its_own_line() {
        let lines = layout("a bbbbbbbbbbbb c", 30.0, Algorithm::Greedy);
        assert_eq!(texts(&lines), vec!["a", "bbbbbbbbbbbb", "c"]);
        assert_eq!(lines[1].width(), 72.0);
    }

    #[test]
    fn forced_breaks_end_lines() {
        let lines = layout("a<br/>b", 100.0, Algorithm::Greedy);
        assert_eq!(texts(&lines), vec!["a", "b"]);
        assert!(lines.iter().all(|l| l.hard_break));
    }

    #[test]
    fn page_break_lines_are_flagged() {
        let lines = layout("a<page/>b", 100.0, Algorithm::Greedy);
        assert!(lines[0].page_break);
        assert!(!lines[1].page_break);
    }

    #[test]
    fn whitespace_that_does_not_fit_is_dropped() {
        let lines = layout("abcde fgh", 30.0, Algorithm::Greedy);
        assert_eq!(texts(&lines), vec!["abcde", "fgh"]);
    }

    #[test]
    fn trailing_whitespace_at_end_of_input_keeps_the_line_hard() {
        // "aa bb cc" is 48pt; the trailing space would make it 54.
        let lines = layout("aa bb cc\n", 50.0, Algorithm::Greedy);
        assert_eq!(texts(&lines), vec!["aa bb cc"]);
        assert!(lines[0].hard_break);
    }

    #[test]
    fn overflowing_whitespace_before_a_break_joins_that_break() {
        let lines = layout("aa bb cc <br/>dd", 50.0, Algorithm::Greedy);
        assert_eq!(texts(&lines), vec!["aa bb cc", "dd"]);
        assert!(lines.iter().all(|l| l.hard_break));

        let lines = layout("aa bb <b>cc </b> <br/>dd", 50.0, Algorithm::Greedy);
        assert_eq!(texts(&lines), vec!["aa bb cc", "dd"]);
        assert!(lines[0].hard_break);
    }

    #[test]
    fn overflowing_whitespace_before_more_text_is_a_soft_break() {
        let lines = layout("aa bb cc dd", 50.0, Algorithm::Greedy);
        assert_eq!(texts(&lines), vec!["aa bb cc", "dd"]);
        assert!(!lines[0].hard_break);
        assert!(lines[1].hard_break);
    }

    #[test]
    fn optimal_paragraphs_are_queued() {
        let lines = layout("aaa bbb ccc ddd<br/>eee", 60.0, Algorithm::Optimal);
        assert_eq!(texts(&lines), vec!["aaa bbb", "ccc ddd", "eee"]);
        assert!(!lines[0].hard_break);
        assert!(lines[1].hard_break);
    }

    #[test]
    fn fill_respects_height_and_always_progresses() {
        let fonts = FontContext::new();
        let registry = StyleRegistry::default();
        let root = StyleState::root(
            &fonts,
            &RootStyle {
                font_family: "Courier",
                font_size: 10.0,
                ..Default::default()
            },
        );
        let parser = Parser::new("aa bb cc dd", root, &fonts, &registry);
        let mut builder = LayoutBuilder::new(parser);

        // Courier line height at 10pt is 10.55.
        let first = builder.fill(12.0, 25.0, 0.0).unwrap();
        assert_eq!(texts(&first), vec!["aa", "bb"]);
        let second = builder.fill(12.0, 1.0, 0.0).unwrap();
        assert_eq!(texts(&second), vec!["cc"]);
        assert!(!builder.done().unwrap());
        let rest = builder.fill(12.0, 100.0, 0.0).unwrap();
        assert_eq!(texts(&rest), vec!["dd"]);
        assert!(builder.done().unwrap());
    }
}
