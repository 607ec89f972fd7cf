//! # Formatter
//!
//! The caller-facing side of the pipeline: options, incremental filling,
//! column/page flow and fixed-point drawing.

use serde::{Deserialize, Serialize};

use crate::error::{InklineError, Result};
use crate::font::FontMetrics;
use crate::pdf::{PageSink, RenderMode};
use crate::style::{Color, FontStyle, StyleRegistry, TextAlign};
use crate::text::draw::{DrawContext, DrawOptions};
use crate::text::layout_builder::{Algorithm, LayoutBuilder};
use crate::text::line::Line;
use crate::text::optimal::OptimalConfig;
use crate::text::parser::{Parser, WrapMode};
use crate::text::state::{RootStyle, StyleState};

/// Layout and drawing options. Deserializes from camelCase JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormatOptions {
    pub font_family: String,
    pub font_size: f64,
    pub font_style: FontStyle,
    /// Hex color, `#rgb` or `#rrggbb`.
    pub color: String,
    /// `None` uses the font's kerning data when it has any.
    pub kerning: Option<bool>,
    pub align: TextAlign,
    /// Extra space between lines.
    pub spacing: f64,
    pub mode: WrapMode,
    pub algorithm: Algorithm,
    pub optimal: OptimalConfig,
    pub columns: usize,
    /// Space between columns.
    pub gap: f64,
    /// Fixed top-left position; disables flowing.
    pub at: Option<[f64; 2]>,
    /// Rotation in degrees around `at`.
    pub rotate: Option<f64>,
    pub render_mode: Option<String>,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            font_family: "Helvetica".to_string(),
            font_size: 12.0,
            font_style: FontStyle::Normal,
            color: "000000".to_string(),
            kerning: None,
            align: TextAlign::Left,
            spacing: 0.0,
            mode: WrapMode::Word,
            algorithm: Algorithm::Greedy,
            optimal: OptimalConfig::default(),
            columns: 1,
            gap: 18.0,
            at: None,
            rotate: None,
            render_mode: None,
        }
    }
}

impl FormatOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reject option combinations before any layout happens.
    pub fn validate(&self) -> Result<()> {
        if self.rotate.is_some() && self.at.is_none() {
            return Err(InklineError::Usage(
                "rotate needs a fixed position; set `at` or drop `rotate`".to_string(),
            ));
        }
        if self.columns == 0 {
            return Err(InklineError::Usage("columns must be at least 1".to_string()));
        }
        if self.font_size.is_nan() || self.font_size <= 0.0 {
            return Err(InklineError::style_value(
                "font_size",
                self.font_size.to_string(),
                "must be positive",
            ));
        }
        self.draw_options()?;
        Color::parse_hex(&self.color)?;
        Ok(())
    }

    pub fn draw_options(&self) -> Result<DrawOptions> {
        let render_mode = self
            .render_mode
            .as_deref()
            .map(str::parse::<RenderMode>)
            .transpose()?;
        Ok(DrawOptions {
            align: self.align,
            spacing: self.spacing,
            rotate: self.rotate,
            render_mode,
        })
    }

    fn root_style(&self) -> Result<RootStyle<'_>> {
        Ok(RootStyle {
            font_family: &self.font_family,
            font_size: self.font_size,
            font_style: self.font_style,
            color: Color::parse_hex(&self.color)?,
            kerning: self.kerning,
        })
    }
}

/// Lays out one piece of markup and draws it into a [`PageSink`].
pub struct Formatter<'a> {
    fonts: &'a dyn FontMetrics,
    options: FormatOptions,
    builder: LayoutBuilder<'a>,
    context: DrawContext,
}

impl<'a> Formatter<'a> {
    pub fn new(
        text: &'a str,
        options: FormatOptions,
        fonts: &'a dyn FontMetrics,
        registry: &'a StyleRegistry,
    ) -> Result<Self> {
        options.validate()?;
        let root = StyleState::root(fonts, &options.root_style()?);
        let parser = Parser::new(text, root, fonts, registry).with_mode(options.mode);
        let builder = LayoutBuilder::new(parser)
            .with_algorithm(options.algorithm, options.optimal.clone())
            .with_justify(options.align == TextAlign::Justify);
        let context = DrawContext::new(options.draw_options()?);
        Ok(Self {
            fonts,
            options,
            builder,
            context,
        })
    }

    pub fn options(&self) -> &FormatOptions {
        &self.options
    }

    /// True once every line has been taken.
    pub fn done(&mut self) -> Result<bool> {
        self.builder.done()
    }

    /// Take the lines that fit in a `width` by `height` box.
    pub fn fill(&mut self, width: f64, height: f64) -> Result<Vec<Line>> {
        self.builder.fill(width, height, self.options.spacing)
    }

    /// Everything that is left, as lines `width` wide.
    pub fn lines(self, width: f64) -> Result<Vec<Line>> {
        self.builder.lines(width)
    }

    /// Draw lines with their top-left corner at `origin`. Returns the
    /// height used.
    pub fn draw(
        &mut self,
        lines: &[Line],
        origin: (f64, f64),
        width: f64,
        sink: &mut dyn PageSink,
    ) -> Result<f64> {
        self.context.draw(lines, origin, width, self.fonts, sink)
    }

    /// Flow the text through the sink's columns, starting new pages as
    /// needed. Leaves the sink's cursor below the tallest column of the
    /// last page.
    pub fn paginate(&mut self, sink: &mut dyn PageSink) -> Result<()> {
        if self.options.at.is_some() {
            return Err(InklineError::Usage(
                "text with a fixed position cannot flow; use draw_at".to_string(),
            ));
        }
        let columns = self.options.columns.max(1);
        let gap = self.options.gap;

        loop {
            let bounds = sink.bounds();
            let column_width = (bounds.width - gap * (columns - 1) as f64) / columns as f64;
            let top = sink.y();
            let mut lowest = top;

            for column in 0..columns {
                if self.done()? {
                    break;
                }
                let left = bounds.left + column as f64 * (column_width + gap);
                let lines = self.fill(column_width, top - bounds.bottom())?;
                let used = self.draw(&lines, (left, top), column_width, sink)?;
                log::debug!("column {column}: {} lines, {used:.2} tall", lines.len());
                lowest = lowest.min(top - used);
            }

            sink.set_y(lowest);
            if self.done()? {
                return Ok(());
            }
            sink.start_new_page();
        }
    }

    /// Draw everything at the fixed `at` position, rotated when asked.
    /// Page breaks in the markup end lines but do not turn pages.
    pub fn draw_at(&mut self, width: f64, sink: &mut dyn PageSink) -> Result<f64> {
        let Some([x, y]) = self.options.at else {
            return Err(InklineError::Usage(
                "draw_at needs a fixed position (`at`)".to_string(),
            ));
        };
        let mut lines = Vec::new();
        while let Some(line) = self.builder.next_line(width)? {
            lines.push(line);
        }
        self.draw(&lines, (x, y), width, sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::FontContext;
    use crate::pdf::Canvas;

    fn courier() -> FormatOptions {
        FormatOptions {
            font_family: "Courier".to_string(),
            font_size: 10.0,
            ..Default::default()
        }
    }

    #[test]
    fn rotate_without_position_is_a_usage_error() {
        let options = FormatOptions {
            rotate: Some(45.0),
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(InklineError::Usage(_))));

        let fixed = FormatOptions {
            rotate: Some(45.0),
            at: Some([100.0, 100.0]),
            ..Default::default()
        };
        assert!(fixed.validate().is_ok());
    }

    #[test]
    fn bad_render_mode_is_a_style_error() {
        let options = FormatOptions {
            render_mode: Some("glow".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(InklineError::StyleValue { .. })
        ));
    }

    #[test]
    fn options_from_camel_case_json() {
        let options = FormatOptions::from_json(
            r#"{"fontFamily": "Times", "fontSize": 9, "align": "justify", "algorithm": "optimal", "optimal": {"maxRetries": 3}}"#,
        )
        .unwrap();
        assert_eq!(options.font_family, "Times");
        assert_eq!(options.font_size, 9.0);
        assert_eq!(options.align, TextAlign::Justify);
        assert_eq!(options.algorithm, Algorithm::Optimal);
        assert_eq!(options.optimal.max_retries, 3);
        assert_eq!(options.columns, 1);
    }

    #[test]
    fn paginate_flows_onto_new_pages() {
        let fonts = FontContext::new();
        let registry = StyleRegistry::default();
        // 40pt of column height holds three 10.55pt lines.
        let mut canvas = Canvas::new(140.0, 80.0, 20.0);
        let text = "aaaa bbbb cccc dddd eeee ffff gggg";
        let mut formatter = Formatter::new(text, courier(), &fonts, &registry).unwrap();
        formatter.paginate(&mut canvas).unwrap();
        assert!(formatter.done().unwrap());
        // 100pt columns give three lines, which fit on one page.
        assert_eq!(canvas.pages().len(), 1);
        assert!((canvas.y() - (60.0 - 3.0 * 10.55)).abs() < 1e-9);

        let mut narrow = Canvas::new(70.0, 80.0, 20.0);
        let mut formatter = Formatter::new(text, courier(), &fonts, &registry).unwrap();
        formatter.paginate(&mut narrow).unwrap();
        // 30pt columns hold one word per line, three lines per page.
        assert_eq!(narrow.pages().len(), 3);
    }

    #[test]
    fn page_breaks_move_to_the_next_column() {
        let fonts = FontContext::new();
        let registry = StyleRegistry::default();
        let mut canvas = Canvas::new(300.0, 200.0, 20.0);
        let options = FormatOptions {
            columns: 2,
            gap: 20.0,
            ..courier()
        };
        let mut formatter = Formatter::new("left<page/>right", options, &fonts, &registry).unwrap();
        formatter.paginate(&mut canvas).unwrap();
        assert_eq!(canvas.pages().len(), 1);
        let content = &canvas.pages()[0].content;
        // Second column starts at 20 + 120 + 20.
        assert!(content.contains("BT\n160.00 180.00 Td\n"), "{content}");
        assert!(content.contains("(right) Tj"));
    }

    #[test]
    fn draw_at_rotates_around_the_position() {
        let fonts = FontContext::new();
        let registry = StyleRegistry::default();
        let mut canvas = Canvas::default();
        let options = FormatOptions {
            at: Some([100.0, 200.0]),
            rotate: Some(90.0),
            ..courier()
        };
        let mut formatter = Formatter::new("up", options, &fonts, &registry).unwrap();
        let height = formatter.draw_at(100.0, &mut canvas).unwrap();
        assert!(height > 0.0);
        assert!(canvas.pages()[0].content.contains("100.00 200.00 Tm"));
        assert!(matches!(
            formatter.paginate(&mut canvas),
            Err(InklineError::Usage(_))
        ));
    }
}
