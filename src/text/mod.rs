//! # Inline Text Pipeline
//!
//! ```text
//! markup
//!       ↓
//!   [lexer]           - text runs, tags, entities
//!       ↓
//!   [parser]          - tag nesting, style-state chain, instructions
//!       ↓
//!   [layout_builder]  - greedy lines, or [optimal] per paragraph
//!       ↓
//!   [draw]            - alignment, justification, style diffing, links
//! ```
//!
//! Everything is pull-based. The greedy breaker asks the parser for one
//! instruction at a time and can push instructions back when a line is cut,
//! so arbitrarily long input is laid out with one line of lookahead.

pub mod draw;
pub mod instruction;
pub mod layout_builder;
pub mod lexer;
pub mod line;
pub mod optimal;
pub mod parser;
pub mod state;

pub use draw::{DrawContext, DrawOptions};
pub use instruction::{Instruction, InstructionKind, WidthKind};
pub use layout_builder::{greedy_line, Algorithm, LayoutBuilder};
pub use line::Line;
pub use optimal::OptimalConfig;
pub use parser::{InstructionSource, Parser, WrapMode};
pub use state::{RootStyle, StateRef, StyleState};
