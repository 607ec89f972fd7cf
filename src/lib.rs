//! # Inkline
//!
//! Paragraph layout for lightly marked-up text.
//!
//! Inkline takes a string like `Some <b>bold</b> and <a href="…">linked</a>
//! text` and turns it into fixed-width lines, then into positioned PDF text
//! operators. Styling comes from a tag table ([`StyleRegistry`]); glyph
//! measurement comes from a [`FontMetrics`] implementation; output goes to a
//! [`PageSink`].
//!
//! ## Architecture
//!
//! ```text
//! Markup + FormatOptions
//!       ↓
//!   [text]       - scan, parse, break into lines, draw
//!       ↓
//!   [pdf]        - text objects, destinations, link rectangles
//! ```
//!
//! [`style`] and [`font`] are consulted along the way. [`Formatter`] ties
//! the stages together for callers that flow text across columns and pages.

pub mod error;
pub mod font;
pub mod formatter;
pub mod pdf;
pub mod style;
pub mod text;

pub use error::{InklineError, NestingErrorKind, Result};
pub use font::{FontContext, FontMetrics};
pub use formatter::{FormatOptions, Formatter};
pub use pdf::{Canvas, PageSink};
pub use style::{evaluate_measure, Measure, MeasureContext, StyleRegistry};
pub use text::Line;

/// Break `text` into lines no wider than `width`.
///
/// An unbreakable run wider than `width` is the only thing that can make a
/// line wider.
pub fn layout(
    text: &str,
    width: f64,
    options: &FormatOptions,
    fonts: &dyn FontMetrics,
    registry: &StyleRegistry,
) -> Result<Vec<Line>> {
    Formatter::new(text, options.clone(), fonts, registry)?.lines(width)
}

/// Draw previously laid out lines with the first line's top at `origin`.
/// Returns the height used.
pub fn draw(
    lines: &[Line],
    origin: (f64, f64),
    width: f64,
    options: &FormatOptions,
    fonts: &dyn FontMetrics,
    sink: &mut dyn PageSink,
) -> Result<f64> {
    options.validate()?;
    text::DrawContext::new(options.draw_options()?).draw(lines, origin, width, fonts, sink)
}
