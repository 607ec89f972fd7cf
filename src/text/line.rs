//! A finished line of instructions.

use super::instruction::{Instruction, WidthKind};

#[derive(Debug, Clone)]
pub struct Line {
    instructions: Vec<Instruction>,
    width: f64,
    height: f64,
    ascent: f64,
    descent: f64,
    spaces: usize,
    /// Ended by a forced break or the end of input; never justified.
    pub hard_break: bool,
    /// Contains a page break; whatever follows belongs to the next column.
    pub page_break: bool,
}

impl Line {
    /// Build a line, dropping trailing whitespace. Whitespace hidden behind
    /// trailing zero-width markers (a closing tag, a forced break) is dropped
    /// too.
    pub fn new(mut instructions: Vec<Instruction>, hard_break: bool) -> Self {
        let mut i = instructions.len();
        while i > 0 {
            let candidate = &instructions[i - 1];
            if candidate.is_discardable() {
                instructions.remove(i - 1);
            } else if !candidate.is_marker() {
                break;
            }
            i -= 1;
        }

        let page_break = instructions.iter().any(Instruction::is_page_break);
        let mut line = Self {
            instructions,
            width: 0.0,
            height: 0.0,
            ascent: 0.0,
            descent: 0.0,
            spaces: 1,
            hard_break,
            page_break,
        };
        line.measure();
        line
    }

    fn measure(&mut self) {
        let instructions = &self.instructions;
        self.width = instructions.iter().map(|i| i.width(WidthKind::All)).sum();
        self.height = instructions
            .iter()
            .map(|i| i.height(false))
            .fold(0.0, f64::max);
        self.ascent = instructions.iter().map(|i| i.ascent()).fold(0.0, f64::max);
        self.descent = instructions.iter().map(|i| i.descent()).fold(0.0, f64::min);
        self.spaces = instructions.iter().map(|i| i.spaces()).sum::<usize>().max(1);
    }

    /// Append a strut so the line fills `width` exactly.
    pub fn pad_to(&mut self, width: f64, strut: impl FnOnce(f64) -> Instruction) {
        let remaining = width - self.width;
        if remaining > 0.0 {
            self.instructions.push(strut(remaining));
            self.measure();
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn ascent(&self) -> f64 {
        self.ascent
    }

    pub fn descent(&self) -> f64 {
        self.descent
    }

    /// Stretch units for justification, at least one.
    pub fn spaces(&self) -> usize {
        self.spaces
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// The visible text of the line.
    pub fn text(&self) -> String {
        self.instructions
            .iter()
            .filter_map(Instruction::as_text)
            .collect()
    }
}
