//! # Drawing
//!
//! Turns finished lines into text operators.
//!
//! Adjacent text instructions bound to the same style state are collected
//! into a run and shown with one operator. Style operators (`Tf`, `rg`,
//! `Ts`) are only written when the value differs from the last one written
//! in the current text object; the [`DrawContext`] keeps those values as
//! "cookies".
//!
//! Justified lines get their extra room as `TJ` displacements after each
//! space, so the word spacing never leaks into the next line.
//!
//! Links are tracked on a stack. A link still open at the end of a line is
//! closed off with a rectangle for that line and picked up again at the
//! start of the next, so a link spanning three lines gets three rectangles.
//! The stack survives between [`DrawContext::draw`] calls, which lets a link
//! continue into the next column.

use std::fmt::Write as FmtWrite;
use std::rc::Rc;

use crate::error::Result;
use crate::font::{FontHandle, FontMetrics, ShowItem};
use crate::pdf::{Destination, PageSink, RenderMode, TextObject};
use crate::style::{Color, TextAlign, TextDecoration};

use super::instruction::{Instruction, InstructionKind, WidthKind};
use super::layout_builder::EPSILON;
use super::line::Line;
use super::state::StateRef;

/// Underline offset below the baseline, as a fraction of the font size.
const UNDERLINE_DROP: f64 = 0.1;
/// Strike-through offset above the baseline, as a fraction of the font size.
const LINE_THROUGH_RISE: f64 = 0.3;
const DECORATION_THICKNESS: f64 = 0.05;

#[derive(Debug, Clone, Default)]
pub struct DrawOptions {
    /// Used for lines whose style does not request an alignment.
    pub align: TextAlign,
    /// Extra space between lines.
    pub spacing: f64,
    /// Counter-clockwise rotation in degrees around the origin.
    pub rotate: Option<f64>,
    pub render_mode: Option<RenderMode>,
}

/// Last style values written to the current text object.
#[derive(Debug, Default)]
struct Cookies {
    font: Option<(FontHandle, usize, f64)>,
    color: Option<Color>,
    rise: Option<f64>,
}

#[derive(Debug)]
struct Run {
    state: StateRef,
    /// Text of each instruction with its space count.
    segments: Vec<(String, usize)>,
    width: f64,
}

#[derive(Debug, Clone)]
struct OpenLink {
    target: String,
    start_x: f64,
}

#[derive(Debug, Clone)]
struct Decoration {
    x1: f64,
    x2: f64,
    y: f64,
    thickness: f64,
    color: Color,
}

/// Drawing state for one text block. Positions are relative to the block
/// origin; `y` grows upward like page space.
#[derive(Debug)]
pub struct DrawContext {
    options: DrawOptions,
    links: Vec<Option<OpenLink>>,
    origin: (f64, f64),
    x: f64,
    baseline: f64,
    /// Start of the current text line, as last set by `Td`.
    last_x: f64,
    last_y: f64,
    /// Where the next glyph lands if nothing moves it.
    pen_x: f64,
    /// Justification padding per space on the current line.
    padding: f64,
    ascent: f64,
    descent: f64,
    cookies: Cookies,
    run: Option<Run>,
    decorations: Vec<Decoration>,
}

impl DrawContext {
    pub fn new(options: DrawOptions) -> Self {
        Self {
            options,
            links: Vec::new(),
            origin: (0.0, 0.0),
            x: 0.0,
            baseline: 0.0,
            last_x: 0.0,
            last_y: 0.0,
            pen_x: 0.0,
            padding: 0.0,
            ascent: 0.0,
            descent: 0.0,
            cookies: Cookies::default(),
            run: None,
            decorations: Vec::new(),
        }
    }

    pub fn options(&self) -> &DrawOptions {
        &self.options
    }

    /// Links opened but not yet closed.
    pub fn open_links(&self) -> usize {
        self.links.iter().flatten().count()
    }

    /// Draw `lines` with the first line's top at `origin`, in a column
    /// `width` wide. Returns the height used.
    pub fn draw(
        &mut self,
        lines: &[Line],
        origin: (f64, f64),
        width: f64,
        fonts: &dyn FontMetrics,
        sink: &mut dyn PageSink,
    ) -> Result<f64> {
        if lines.is_empty() {
            return Ok(0.0);
        }
        self.origin = origin;
        self.x = 0.0;
        self.baseline = 0.0;
        self.last_x = 0.0;
        self.last_y = 0.0;
        self.pen_x = 0.0;
        self.cookies = Cookies::default();
        self.run = None;
        self.decorations.clear();

        let mut text = TextObject::begin();
        match self.options.rotate {
            Some(degrees) => {
                let (sin, cos) = degrees.to_radians().sin_cos();
                text.set_matrix([cos, sin, -sin, cos, origin.0, origin.1]);
            }
            None => {
                text.move_to(origin.0, origin.1);
            }
        }
        if let Some(mode) = self.options.render_mode {
            text.render_mode(mode);
        }

        let mut top = 0.0;
        for line in lines {
            // Descent is negative: the baseline sits that far above the
            // bottom of the line box.
            let baseline = top - line.height() - line.descent();
            self.draw_line(line, baseline, width, &mut text, fonts, sink)?;
            top -= line.height() + self.options.spacing;
        }

        sink.add_content(&text.finish());
        self.draw_decorations(sink);
        log::trace!("drew {} lines, {:.2} tall", lines.len(), -top);
        Ok(-top)
    }

    fn draw_line(
        &mut self,
        line: &Line,
        baseline: f64,
        width: f64,
        text: &mut TextObject,
        fonts: &dyn FontMetrics,
        sink: &mut dyn PageSink,
    ) -> Result<()> {
        let align = line
            .instructions()
            .first()
            .and_then(|i| i.state().text_align)
            .unwrap_or(self.options.align);
        let room = width - line.width();
        let (offset, padding) = match align {
            TextAlign::Left => (0.0, 0.0),
            TextAlign::Center => ((room / 2.0).max(0.0), 0.0),
            TextAlign::Right => (room.max(0.0), 0.0),
            TextAlign::Justify if !line.hard_break && room > 0.0 => {
                (0.0, room / line.spaces() as f64)
            }
            TextAlign::Justify => (0.0, 0.0),
        };

        self.padding = padding;
        self.ascent = line.ascent();
        self.descent = line.descent();
        self.baseline = baseline;
        self.x = offset;
        text.move_to(offset - self.last_x, baseline - self.last_y);
        self.last_x = offset;
        self.last_y = baseline;
        self.pen_x = offset;

        for link in self.links.iter_mut().flatten() {
            link.start_x = self.x;
        }
        for instruction in line.instructions() {
            self.draw_instruction(instruction, text, fonts, sink)?;
        }
        self.flush(text, fonts, sink);
        for link in self.links.iter().flatten() {
            self.annotate(link, sink);
        }
        Ok(())
    }

    fn draw_instruction(
        &mut self,
        instruction: &Instruction,
        text: &mut TextObject,
        fonts: &dyn FontMetrics,
        sink: &mut dyn PageSink,
    ) -> Result<()> {
        match instruction.kind() {
            InstructionKind::Text { text: content } => {
                if let Some(run) = self.run.as_mut() {
                    if Rc::ptr_eq(&run.state, instruction.state()) {
                        run.segments.push((content.clone(), instruction.spaces()));
                        run.width += instruction.width(WidthKind::All);
                        return Ok(());
                    }
                }
                self.flush(text, fonts, sink);
                self.run = Some(Run {
                    state: instruction.state().clone(),
                    segments: vec![(content.clone(), instruction.spaces())],
                    width: instruction.width(WidthKind::All),
                });
            }
            InstructionKind::Strut { .. } | InstructionKind::ParagraphStart { .. } => {
                self.flush(text, fonts, sink);
                self.x += instruction.width(WidthKind::All);
            }
            InstructionKind::LinkStart { name, target } => {
                self.flush(text, fonts, sink);
                if let Some(name) = name {
                    let (left, top) = self.to_page(self.x, self.baseline + instruction.ascent());
                    let (label, dest) = Destination::from_anchor(name, left, top)?;
                    sink.add_dest(&label, dest);
                }
                self.links.push(target.as_ref().map(|target| OpenLink {
                    target: target.clone(),
                    start_x: self.x,
                }));
            }
            InstructionKind::LinkEnd => {
                self.flush(text, fonts, sink);
                if let Some(Some(link)) = self.links.pop() {
                    self.annotate(&link, sink);
                }
            }
            InstructionKind::TagOpen { .. }
            | InstructionKind::TagClose { .. }
            | InstructionKind::LineBreak
            | InstructionKind::PageBreak
            | InstructionKind::ParagraphEnd => {}
        }
        Ok(())
    }

    /// Show the pending run.
    fn flush(&mut self, text: &mut TextObject, fonts: &dyn FontMetrics, sink: &mut dyn PageSink) {
        let Some(run) = self.run.take() else {
            return;
        };
        let state = &run.state;

        if (self.x - self.pen_x).abs() > EPSILON {
            text.move_to(self.x - self.last_x, 0.0);
            self.last_x = self.x;
            self.pen_x = self.x;
        }
        if self.cookies.color != Some(state.color) {
            text.fill_color(state.color);
            self.cookies.color = Some(state.color);
        }
        if self.cookies.rise != Some(state.rise) {
            text.rise(state.rise);
            self.cookies.rise = Some(state.rise);
        }

        // Encode per instruction so kerning matches what was measured.
        let adjust = if state.font_size > 0.0 {
            -self.padding * 1000.0 / state.font_size
        } else {
            0.0
        };
        let mut groups: Vec<(usize, Vec<ShowItem>)> = Vec::new();
        let mut spaces = 0;
        for (segment, segment_spaces) in &run.segments {
            for chunk in fonts.encode_text(state.font, segment, state.kerning) {
                match groups.last_mut() {
                    Some((subset, items)) if *subset == chunk.subset => {
                        for item in chunk.items {
                            push_item(items, item);
                        }
                    }
                    _ => groups.push((chunk.subset, chunk.items)),
                }
            }
            if *segment_spaces > 0 && adjust != 0.0 {
                if let Some((_, items)) = groups.last_mut() {
                    items.push(ShowItem::Adjust(adjust * *segment_spaces as f64));
                }
            }
            spaces += segment_spaces;
        }

        let base_font = fonts.base_font(state.font);
        let embedded = fonts.embedded_font(state.font);
        for (subset, items) in &groups {
            let resource = sink.font_resource(&base_font, *subset, embedded.as_ref());
            let cookie = (state.font, *subset, state.font_size);
            if self.cookies.font != Some(cookie) {
                text.font(&resource, state.font_size);
                self.cookies.font = Some(cookie);
            }
            if embedded.is_some() {
                let shown: String = run.segments.iter().map(|(s, _)| s.as_str()).collect();
                sink.glyphs_used(&resource, &shown);
            }
            text.show(items);
        }

        let advance = run.width + self.padding * spaces as f64;
        let y = match state.decoration {
            TextDecoration::None => None,
            TextDecoration::Underline => Some(-UNDERLINE_DROP),
            TextDecoration::LineThrough => Some(LINE_THROUGH_RISE),
        };
        if let Some(factor) = y {
            self.decorations.push(Decoration {
                x1: self.x,
                x2: self.x + advance,
                y: self.baseline + state.rise + factor * state.font_size,
                thickness: DECORATION_THICKNESS * state.font_size,
                color: state.color,
            });
        }

        self.x += advance;
        self.pen_x = self.x;
    }

    /// Rectangle for the part of `link` on the current line.
    fn annotate(&self, link: &OpenLink, sink: &mut dyn PageSink) {
        if self.x - link.start_x <= EPSILON {
            return;
        }
        let low = self.baseline + self.descent;
        let high = self.baseline + self.ascent;
        let corners = [
            self.to_page(link.start_x, low),
            self.to_page(self.x, low),
            self.to_page(link.start_x, high),
            self.to_page(self.x, high),
        ];
        let x1 = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
        let y1 = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
        let x2 = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
        let y2 = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);
        sink.link_annotation([x1, y1, x2, y2], &link.target);
    }

    /// Map a block-relative point to page space.
    fn to_page(&self, x: f64, y: f64) -> (f64, f64) {
        let (ox, oy) = self.origin;
        match self.options.rotate {
            Some(degrees) => {
                let (sin, cos) = degrees.to_radians().sin_cos();
                (ox + x * cos - y * sin, oy + x * sin + y * cos)
            }
            None => (ox + x, oy + y),
        }
    }

    fn draw_decorations(&mut self, sink: &mut dyn PageSink) {
        if self.decorations.is_empty() {
            return;
        }
        let (ox, oy) = self.origin;
        let (sin, cos) = self
            .options
            .rotate
            .map(|d| d.to_radians().sin_cos())
            .unwrap_or((0.0, 1.0));
        let mut ops = String::from("q\n");
        let _ = writeln!(
            ops,
            "{:.3} {:.3} {:.3} {:.3} {:.2} {:.2} cm",
            cos, sin, -sin, cos, ox, oy
        );
        for d in self.decorations.drain(..) {
            let _ = writeln!(ops, "{:.3} {:.3} {:.3} RG", d.color.r, d.color.g, d.color.b);
            let _ = writeln!(ops, "{:.2} w", d.thickness);
            let _ = writeln!(ops, "{:.2} {:.2} m {:.2} {:.2} l S", d.x1, d.y, d.x2, d.y);
        }
        ops.push_str("Q\n");
        sink.add_content(&ops);
    }
}

/// Append to a show array, joining adjacent strings.
fn push_item(items: &mut Vec<ShowItem>, item: ShowItem) {
    if let (Some(ShowItem::Text(last)), ShowItem::Text(bytes)) = (items.last_mut(), &item) {
        last.extend_from_slice(bytes);
        return;
    }
    items.push(item);
}
