//! Layout instructions: the unit the line breaker and draw engine work in.

use crate::font::FontMetrics;

use super::lexer::is_space;
use super::state::StateRef;

#[derive(Debug, Clone, PartialEq)]
pub enum InstructionKind {
    Text { text: String },
    /// Invisible advance.
    Strut { width: f64 },
    TagOpen { tag: String },
    TagClose { tag: String },
    LinkStart {
        /// Named destination, optionally prefixed with a view directive such
        /// as `fith:` or `zoom=2:`.
        name: Option<String>,
        target: Option<String>,
    },
    LinkEnd,
    LineBreak,
    PageBreak,
    ParagraphStart { indent: f64 },
    ParagraphEnd,
}

/// Which part of an instruction's width to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidthKind {
    All,
    /// Width that disappears when the instruction ends a line.
    Discardable,
    NonDiscardable,
}

/// An instruction bound to the style it was produced under. Metrics are
/// computed once at construction; the state is immutable so they never go
/// stale.
#[derive(Debug, Clone)]
pub struct Instruction {
    kind: InstructionKind,
    state: StateRef,
    width: f64,
    height: f64,
    ascent: f64,
    descent: f64,
    spaces: usize,
    discardable: bool,
    break_opportunity: bool,
}

impl Instruction {
    pub fn new(mut kind: InstructionKind, state: StateRef, fonts: &dyn FontMetrics) -> Self {
        let size = state.font_size;
        let height = fonts.line_height(state.font, size);
        let ascent = fonts.ascender(state.font, size) + state.rise;
        let descent = fonts.descender(state.font, size) + state.rise;

        let (width, spaces, discardable, break_opportunity) = match &mut kind {
            InstructionKind::Text { text } => {
                *text = fonts.normalize_encoding(state.font, text);
                let width = fonts.string_width(state.font, text, size, state.kerning);
                let spaces = text.matches(' ').count();
                let discardable = text.chars().any(is_space);
                let breakable = text
                    .chars()
                    .any(|c| c == '-' || c == '\u{2014}' || c == '\u{2013}' || is_space(c));
                (width, spaces, discardable, breakable)
            }
            InstructionKind::Strut { width } => (*width, 0, false, false),
            InstructionKind::ParagraphStart { indent } => (*indent, 0, false, false),
            _ => (0.0, 0, false, false),
        };

        Self {
            kind,
            state,
            width,
            height,
            ascent,
            descent,
            spaces,
            discardable,
            break_opportunity,
        }
    }

    pub fn text(text: impl Into<String>, state: StateRef, fonts: &dyn FontMetrics) -> Self {
        Self::new(InstructionKind::Text { text: text.into() }, state, fonts)
    }

    pub fn strut(width: f64, state: StateRef, fonts: &dyn FontMetrics) -> Self {
        Self::new(InstructionKind::Strut { width }, state, fonts)
    }

    /// Allow a line to end after this instruction regardless of its content.
    /// Used for character-by-character wrapping.
    pub fn breakable(mut self) -> Self {
        self.break_opportunity = true;
        self
    }

    pub fn kind(&self) -> &InstructionKind {
        &self.kind
    }

    pub fn state(&self) -> &StateRef {
        &self.state
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.kind {
            InstructionKind::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn width(&self, kind: WidthKind) -> f64 {
        match kind {
            WidthKind::All => self.width,
            WidthKind::Discardable if self.discardable => self.width,
            WidthKind::NonDiscardable if !self.discardable => self.width,
            _ => 0.0,
        }
    }

    /// Line height contributed by this instruction. Blank instructions count
    /// as zero when `ignore_blank` is set.
    pub fn height(&self, ignore_blank: bool) -> f64 {
        if ignore_blank && self.discardable {
            0.0
        } else {
            self.height
        }
    }

    pub fn ascent(&self) -> f64 {
        self.ascent
    }

    pub fn descent(&self) -> f64 {
        self.descent
    }

    /// Literal spaces in the text; each one takes a share of justification
    /// padding.
    pub fn spaces(&self) -> usize {
        self.spaces
    }

    pub fn is_discardable(&self) -> bool {
        self.discardable
    }

    pub fn is_break_opportunity(&self) -> bool {
        self.break_opportunity
    }

    /// Ends the current line no matter how much room is left.
    pub fn is_forced_break(&self) -> bool {
        matches!(
            self.kind,
            InstructionKind::LineBreak | InstructionKind::PageBreak | InstructionKind::ParagraphEnd
        )
    }

    pub fn is_page_break(&self) -> bool {
        matches!(self.kind, InstructionKind::PageBreak)
    }

    /// Zero-width bookkeeping that never shows anything by itself.
    pub fn is_marker(&self) -> bool {
        matches!(
            self.kind,
            InstructionKind::TagOpen { .. }
                | InstructionKind::TagClose { .. }
                | InstructionKind::LinkStart { .. }
                | InstructionKind::LinkEnd
                | InstructionKind::LineBreak
                | InstructionKind::PageBreak
                | InstructionKind::ParagraphEnd
        )
    }

    /// Takes up room on the line even at a line end.
    pub fn is_visible(&self) -> bool {
        self.width(WidthKind::NonDiscardable) > 0.0
    }
}
