//! Turns scanner tokens into [`Instruction`]s.
//!
//! The parser owns the style-state chain. Opening a registered tag derives a
//! child state; closing it resumes the parent. Text runs become one
//! instruction each, bound to whichever state is current.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{InklineError, NestingErrorKind, Result};
use crate::font::FontMetrics;
use crate::style::{evaluate_measure, Display, MeasureContext, StyleRegistry};

use super::instruction::{Instruction, InstructionKind};
use super::lexer::{Lexer, Token};
use super::state::StateRef;

/// Where lines may be broken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapMode {
    /// At whitespace and hyphen/dash runs.
    #[default]
    Word,
    /// After any character.
    Character,
}

/// A pull-based stream of instructions that can take instructions back.
pub trait InstructionSource {
    fn next_instruction(&mut self) -> Result<Option<Instruction>>;

    /// Return an instruction so the next pull yields it again. Instructions
    /// pushed back in reverse order come out in their original order.
    fn push_back(&mut self, instruction: Instruction);
}

impl InstructionSource for VecDeque<Instruction> {
    fn next_instruction(&mut self) -> Result<Option<Instruction>> {
        Ok(self.pop_front())
    }

    fn push_back(&mut self, instruction: Instruction) {
        self.push_front(instruction);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenKind {
    Inline,
    Block,
    Link,
}

#[derive(Debug)]
struct OpenTag {
    tag: String,
    kind: OpenKind,
    /// State to resume when the tag closes.
    saved: StateRef,
    position: usize,
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    fonts: &'a dyn FontMetrics,
    registry: &'a StyleRegistry,
    mode: WrapMode,
    state: StateRef,
    stack: Vec<OpenTag>,
    /// Unread runs of the current text token.
    runs: VecDeque<String>,
    /// Instructions handed back by `push`, newest last.
    pushed: Vec<Instruction>,
    /// Set at the start of input and after a paragraph closes; whitespace is
    /// skipped until content arrives.
    between_paragraphs: bool,
    /// Something visible has been emitted since the last forced break.
    line_open: bool,
}

impl<'a> Parser<'a> {
    pub fn new(
        text: &'a str,
        root: StateRef,
        fonts: &'a dyn FontMetrics,
        registry: &'a StyleRegistry,
    ) -> Self {
        Self {
            lexer: Lexer::new(text),
            fonts,
            registry,
            mode: WrapMode::Word,
            state: root,
            stack: Vec::new(),
            runs: VecDeque::new(),
            pushed: Vec::new(),
            between_paragraphs: true,
            line_open: false,
        }
    }

    pub fn with_mode(mut self, mode: WrapMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn fonts(&self) -> &'a dyn FontMetrics {
        self.fonts
    }

    /// The state text would currently be drawn with.
    pub fn state(&self) -> &StateRef {
        &self.state
    }

    pub fn next(&mut self) -> Result<Option<Instruction>> {
        if let Some(instruction) = self.pushed.pop() {
            return Ok(Some(instruction));
        }
        let next = self.parse_next()?;
        if let Some(instruction) = &next {
            if instruction.is_forced_break() {
                self.line_open = false;
            } else if instruction.is_visible() {
                self.line_open = true;
            }
        }
        Ok(next)
    }

    pub fn push(&mut self, instruction: Instruction) {
        self.pushed.push(instruction);
    }

    pub fn peek(&mut self) -> Result<Option<&Instruction>> {
        if self.pushed.is_empty() {
            match self.next()? {
                Some(instruction) => self.pushed.push(instruction),
                None => return Ok(None),
            }
        }
        Ok(self.pushed.last())
    }

    pub fn eos(&mut self) -> Result<bool> {
        Ok(self.peek()?.is_none())
    }

    fn parse_next(&mut self) -> Result<Option<Instruction>> {
        loop {
            if let Some(run) = self.runs.pop_front() {
                let mut instruction = Instruction::text(run, self.state.clone(), self.fonts);
                if self.mode == WrapMode::Character && !instruction.is_discardable() {
                    instruction = instruction.breakable();
                }
                if self.between_paragraphs && instruction.is_discardable() {
                    continue;
                }
                self.between_paragraphs = false;
                return Ok(Some(instruction));
            }

            let position = self.lexer.position();
            let token = match self.lexer.next_token()? {
                Some(token) => token,
                None => {
                    if let Some(open) = self.stack.last() {
                        return Err(InklineError::TagNesting {
                            kind: NestingErrorKind::Unclosed,
                            tag: open.tag.clone(),
                            position: open.position,
                        });
                    }
                    return Ok(None);
                }
            };

            let instruction = match token {
                Token::Text(pieces) => {
                    self.queue_runs(pieces);
                    None
                }
                Token::Open { tag, options } => {
                    self.between_paragraphs = false;
                    self.open_tag(tag, options, position)?
                }
                Token::Close { tag } => self.close_tag(tag, position)?,
            };
            if instruction.is_some() {
                return Ok(instruction);
            }
        }
    }

    fn queue_runs(&mut self, pieces: Vec<String>) {
        match self.mode {
            WrapMode::Word => self.runs.extend(pieces),
            WrapMode::Character => {
                for piece in pieces {
                    if piece == " " {
                        self.runs.push_back(piece);
                    } else {
                        self.runs.extend(piece.chars().map(String::from));
                    }
                }
            }
        }
    }

    fn open_tag(
        &mut self,
        tag: String,
        raw_options: BTreeMap<String, String>,
        position: usize,
    ) -> Result<Option<Instruction>> {
        let registered = self
            .registry
            .get(&tag)
            .ok_or_else(|| InklineError::TagNesting {
                kind: NestingErrorKind::UnknownTag,
                tag: tag.clone(),
                position,
            })?;
        let options = self.registry.resolve_options(registered, &raw_options);
        let style = registered.with_options(&options)?;

        match style.display {
            Display::Break => {
                return Ok(Some(self.instruction(InstructionKind::LineBreak)));
            }
            Display::PageBreak => {
                return Ok(Some(self.instruction(InstructionKind::PageBreak)));
            }
            Display::Inline | Display::Block => {}
        }

        let child = self.state.derive(&style, self.fonts, self.registry)?;

        let (kind, open_kind) = if style.display == Display::Block {
            let indent = match &style.text_indent {
                Some(measure) => {
                    let ctx = MeasureContext::default()
                        .with_relative(child.font_size)
                        .with_em(child.font_size)
                        .with_mappings(&self.registry.measures);
                    evaluate_measure(measure, &ctx)?
                }
                None => 0.0,
            };
            (InstructionKind::ParagraphStart { indent }, OpenKind::Block)
        } else if options.contains_key("target") || options.contains_key("anchor") {
            (
                InstructionKind::LinkStart {
                    name: options.get("anchor").cloned(),
                    target: options.get("target").cloned(),
                },
                OpenKind::Link,
            )
        } else {
            (InstructionKind::TagOpen { tag: tag.clone() }, OpenKind::Inline)
        };

        let saved = std::mem::replace(&mut self.state, child);
        self.stack.push(OpenTag {
            tag,
            kind: open_kind,
            saved,
            position,
        });
        let instruction = self.instruction(kind);

        // A block always starts on a fresh line.
        if open_kind == OpenKind::Block && self.line_open {
            let previous = self.stack.last().map(|open| open.saved.clone());
            self.pushed.push(instruction);
            let state = previous.unwrap_or_else(|| self.state.clone());
            return Ok(Some(Instruction::new(
                InstructionKind::LineBreak,
                state,
                self.fonts,
            )));
        }
        Ok(Some(instruction))
    }

    fn close_tag(&mut self, tag: String, position: usize) -> Result<Option<Instruction>> {
        // Void tags never open a scope, so their close is a no-op.
        if let Some(style) = self.registry.get(&tag) {
            if matches!(style.display, Display::Break | Display::PageBreak) {
                return Ok(None);
            }
        }

        let open = self.stack.pop().ok_or_else(|| InklineError::TagNesting {
            kind: NestingErrorKind::NothingOpen,
            tag: tag.clone(),
            position,
        })?;
        if open.tag != tag {
            return Err(InklineError::TagNesting {
                kind: NestingErrorKind::Mismatched,
                tag,
                position,
            });
        }

        let closing = std::mem::replace(&mut self.state, open.saved);
        let kind = match open.kind {
            OpenKind::Inline => InstructionKind::TagClose { tag },
            OpenKind::Link => InstructionKind::LinkEnd,
            OpenKind::Block => {
                self.between_paragraphs = true;
                InstructionKind::ParagraphEnd
            }
        };
        Ok(Some(Instruction::new(kind, closing, self.fonts)))
    }

    fn instruction(&self, kind: InstructionKind) -> Instruction {
        Instruction::new(kind, self.state.clone(), self.fonts)
    }
}

impl InstructionSource for Parser<'_> {
    fn next_instruction(&mut self) -> Result<Option<Instruction>> {
        self.next()
    }

    fn push_back(&mut self, instruction: Instruction) {
        self.push(instruction);
    }
}
