//! # PDF Output
//!
//! The draw engine never writes bytes itself. It builds `BT … ET` text
//! objects with [`TextObject`] and hands them, along with destinations and
//! link rectangles, to a [`PageSink`]. The sink owns column bounds, the
//! vertical cursor and page turning.
//!
//! [`Canvas`] is the in-memory sink used by the CLI and the tests. It keeps
//! one content stream per page and can serialize everything as a small
//! PDF 1.7 file. Standard fonts are referenced by name; TrueType faces are
//! embedded as Identity-H CID fonts.
//!
//! ```text
//! %PDF-1.7            <- header
//! 1 0 obj ... endobj  <- catalog, page tree, fonts, annotations, pages
//! ...
//! xref                <- byte offsets of each object
//! trailer             <- points to the catalog
//! %%EOF
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as FmtWrite; // for write! on String
use std::io::Write as IoWrite; // for write! on Vec<u8>
use std::str::FromStr;

use miniz_oxide::deflate::compress_to_vec_zlib;

use crate::error::{InklineError, Result};
use crate::font::{EmbeddedFont, ShowItem};
use crate::style::Color;

/// Text rendering mode (`Tr` operand).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Fill,
    Stroke,
    FillStroke,
    Invisible,
    FillClip,
    StrokeClip,
    FillStrokeClip,
    Clip,
}

impl RenderMode {
    pub fn operand(self) -> u8 {
        match self {
            RenderMode::Fill => 0,
            RenderMode::Stroke => 1,
            RenderMode::FillStroke => 2,
            RenderMode::Invisible => 3,
            RenderMode::FillClip => 4,
            RenderMode::StrokeClip => 5,
            RenderMode::FillStrokeClip => 6,
            RenderMode::Clip => 7,
        }
    }
}

impl FromStr for RenderMode {
    type Err = InklineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fill" => Ok(RenderMode::Fill),
            "stroke" => Ok(RenderMode::Stroke),
            "fill_stroke" => Ok(RenderMode::FillStroke),
            "invisible" => Ok(RenderMode::Invisible),
            "fill_clip" => Ok(RenderMode::FillClip),
            "stroke_clip" => Ok(RenderMode::StrokeClip),
            "fill_stroke_clip" => Ok(RenderMode::FillStrokeClip),
            "clip" => Ok(RenderMode::Clip),
            other => Err(InklineError::style_value(
                "render_mode",
                other,
                "unsupported rendering mode",
            )),
        }
    }
}

/// Builder for one text object. Operators are appended in call order.
#[derive(Debug, Clone)]
pub struct TextObject {
    ops: String,
}

impl TextObject {
    pub fn begin() -> Self {
        Self {
            ops: String::from("BT\n"),
        }
    }

    /// Start a new text line offset from the start of the current one.
    pub fn move_to(&mut self, dx: f64, dy: f64) -> &mut Self {
        let _ = writeln!(self.ops, "{:.2} {:.2} Td", dx, dy);
        self
    }

    pub fn set_matrix(&mut self, matrix: [f64; 6]) -> &mut Self {
        let [a, b, c, d, e, f] = matrix;
        let _ = writeln!(
            self.ops,
            "{:.3} {:.3} {:.3} {:.3} {:.2} {:.2} Tm",
            a, b, c, d, e, f
        );
        self
    }

    pub fn font(&mut self, resource: &str, size: f64) -> &mut Self {
        let _ = writeln!(self.ops, "/{} {:.2} Tf", resource, size);
        self
    }

    pub fn fill_color(&mut self, color: Color) -> &mut Self {
        let _ = writeln!(self.ops, "{:.3} {:.3} {:.3} rg", color.r, color.g, color.b);
        self
    }

    pub fn rise(&mut self, rise: f64) -> &mut Self {
        let _ = writeln!(self.ops, "{:.2} Ts", rise);
        self
    }

    pub fn render_mode(&mut self, mode: RenderMode) -> &mut Self {
        let _ = writeln!(self.ops, "{} Tr", mode.operand());
        self
    }

    /// Show encoded text. A single string goes out as `Tj`; anything with
    /// displacements needs a `TJ` array.
    pub fn show(&mut self, items: &[ShowItem]) -> &mut Self {
        match items {
            [] => {}
            [ShowItem::Text(bytes)] => {
                let _ = writeln!(self.ops, "({}) Tj", escape_pdf_bytes(bytes));
            }
            _ => {
                self.ops.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.ops.push(' ');
                    }
                    match item {
                        ShowItem::Text(bytes) => {
                            let _ = write!(self.ops, "({})", escape_pdf_bytes(bytes));
                        }
                        ShowItem::Adjust(amount) => {
                            let _ = write!(self.ops, "{:.3}", amount);
                        }
                    }
                }
                self.ops.push_str("] TJ\n");
            }
        }
        self
    }

    pub fn as_str(&self) -> &str {
        &self.ops
    }

    pub fn finish(mut self) -> String {
        self.ops.push_str("ET\n");
        self.ops
    }
}

/// Escape bytes for a PDF literal string. Delimiters get a backslash,
/// bytes outside printable ASCII become octal escapes.
pub fn escape_pdf_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            0x20..=0x7e => out.push(b as char),
            _ => {
                let _ = write!(out, "\\{:03o}", b);
            }
        }
    }
    out
}

/// How a viewer should frame a destination.
#[derive(Debug, Clone, PartialEq)]
pub enum Destination {
    Xyz {
        left: f64,
        top: f64,
        zoom: Option<f64>,
    },
    Fit,
    FitH { top: f64 },
    FitV { left: f64 },
    FitB,
    FitBH { top: f64 },
    FitBV { left: f64 },
}

impl Destination {
    /// Split an anchor name into its label and view. The name may carry a
    /// directive prefix: `zoom=<factor>:`, `fit:`, `fith:`, `fitv:`,
    /// `fitb:`, `fitbh:` or `fitbv:`. Anything else is a plain label shown
    /// at `(left, top)`.
    pub fn from_anchor(name: &str, left: f64, top: f64) -> Result<(String, Destination)> {
        let Some((directive, label)) = name.split_once(':') else {
            return Ok((name.to_string(), Destination::Xyz { left, top, zoom: None }));
        };
        let dest = match directive {
            "fit" => Destination::Fit,
            "fith" => Destination::FitH { top },
            "fitv" => Destination::FitV { left },
            "fitb" => Destination::FitB,
            "fitbh" => Destination::FitBH { top },
            "fitbv" => Destination::FitBV { left },
            d => match d.strip_prefix("zoom=") {
                Some(factor) => {
                    let zoom = factor.trim().parse::<f64>().map_err(|_| {
                        InklineError::style_value("zoom", factor, "expected a number")
                    })?;
                    Destination::Xyz {
                        left,
                        top,
                        zoom: Some(zoom),
                    }
                }
                None => {
                    return Ok((name.to_string(), Destination::Xyz { left, top, zoom: None }));
                }
            },
        };
        Ok((label.to_string(), dest))
    }

    /// Explicit destination array for the given page reference.
    pub fn to_pdf(&self, page_ref: &str) -> String {
        match self {
            Destination::Xyz { left, top, zoom } => match zoom {
                Some(z) => format!("[{} /XYZ {:.2} {:.2} {:.3}]", page_ref, left, top, z),
                None => format!("[{} /XYZ {:.2} {:.2} null]", page_ref, left, top),
            },
            Destination::Fit => format!("[{} /Fit]", page_ref),
            Destination::FitH { top } => format!("[{} /FitH {:.2}]", page_ref, top),
            Destination::FitV { left } => format!("[{} /FitV {:.2}]", page_ref, left),
            Destination::FitB => format!("[{} /FitB]", page_ref),
            Destination::FitBH { top } => format!("[{} /FitBH {:.2}]", page_ref, top),
            Destination::FitBV { left } => format!("[{} /FitBV {:.2}]", page_ref, left),
        }
    }
}

/// The column text is flowed into, in page coordinates (y grows upward).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top - self.height
    }
}

/// Where drawn text goes.
pub trait PageSink {
    fn bounds(&self) -> Bounds;

    /// Top of the free space on the current page.
    fn y(&self) -> f64;

    fn set_y(&mut self, y: f64);

    /// Move to a fresh page. The cursor goes back to the top of the bounds.
    fn start_new_page(&mut self);

    /// Resource name for a font subset on the current page. `embedded` is
    /// set for faces whose program has to travel with the document.
    fn font_resource(
        &mut self,
        base_font: &str,
        subset: usize,
        embedded: Option<&EmbeddedFont>,
    ) -> String;

    /// Characters shown with an embedded font resource.
    fn glyphs_used(&mut self, _resource: &str, _text: &str) {}

    fn add_dest(&mut self, label: &str, dest: Destination);

    /// Clickable rectangle `[x1, y1, x2, y2]` pointing at `target`.
    fn link_annotation(&mut self, rect: [f64; 4], target: &str);

    fn add_content(&mut self, content: &str);
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkAnnotation {
    pub rect: [f64; 4],
    pub target: String,
}

#[derive(Debug, Clone, Default)]
pub struct CanvasPage {
    pub content: String,
    pub links: Vec<LinkAnnotation>,
}

#[derive(Debug, Clone)]
pub struct NamedDest {
    pub label: String,
    pub page: usize,
    pub dest: Destination,
}

#[derive(Debug, Clone)]
struct CanvasFont {
    key: String,
    embedded: Option<EmbeddedFont>,
    used: BTreeSet<char>,
}

/// In-memory page sink.
#[derive(Debug, Clone)]
pub struct Canvas {
    width: f64,
    height: f64,
    margin: f64,
    y: f64,
    pages: Vec<CanvasPage>,
    /// Index `i` is resource `F{i + 1}`.
    fonts: Vec<CanvasFont>,
    dests: Vec<NamedDest>,
}

impl Default for Canvas {
    /// A4 with 54pt margins.
    fn default() -> Self {
        Self::new(595.28, 841.89, 54.0)
    }
}

impl Canvas {
    pub fn new(width: f64, height: f64, margin: f64) -> Self {
        Self {
            width,
            height,
            margin,
            y: height - margin,
            pages: vec![CanvasPage::default()],
            fonts: Vec::new(),
            dests: Vec::new(),
        }
    }

    pub fn pages(&self) -> &[CanvasPage] {
        &self.pages
    }

    pub fn dests(&self) -> &[NamedDest] {
        &self.dests
    }

    /// Every link on every page, in drawing order.
    pub fn links(&self) -> impl Iterator<Item = &LinkAnnotation> {
        self.pages.iter().flat_map(|p| p.links.iter())
    }

    fn current_page(&mut self) -> &mut CanvasPage {
        if self.pages.is_empty() {
            self.pages.push(CanvasPage::default());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    /// The page's content as a Flate-compressed stream object body.
    pub fn content_stream(&self, page: usize) -> Option<Vec<u8>> {
        let content = &self.pages.get(page)?.content;
        Some(flate_stream(content.as_bytes(), ""))
    }

    /// Serialize all pages as a PDF file.
    pub fn to_pdf(&self) -> Vec<u8> {
        // 0 is the free-list head, 1 the catalog, 2 the page tree.
        let mut objects: Vec<Vec<u8>> = vec![Vec::new(), Vec::new(), Vec::new()];

        let mut font_refs = String::new();
        for (i, font) in self.fonts.iter().enumerate() {
            let embedded = font
                .embedded
                .as_ref()
                .and_then(|embedded| write_embedded_font(&mut objects, embedded, &font.used));
            let id = match embedded {
                Some(id) => id,
                None => {
                    objects.push(
                        format!(
                            "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
                            pdf_name(&font.key)
                        )
                        .into_bytes(),
                    );
                    objects.len() - 1
                }
            };
            let _ = write!(font_refs, "/F{} {} 0 R ", i + 1, id);
        }

        let mut page_ids = Vec::with_capacity(self.pages.len());
        for (index, page) in self.pages.iter().enumerate() {
            let mut annot_ids = Vec::new();
            for link in &page.links {
                annot_ids.push(objects.len());
                objects.push(link_annotation_dict(link).into_bytes());
            }

            let content_id = objects.len();
            objects.push(self.content_stream(index).unwrap_or_default());

            let annots = if annot_ids.is_empty() {
                String::new()
            } else {
                let refs: Vec<String> = annot_ids.iter().map(|id| format!("{} 0 R", id)).collect();
                format!(" /Annots [{}]", refs.join(" "))
            };
            page_ids.push(objects.len());
            objects.push(
                format!(
                    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
                     /Contents {} 0 R /Resources << /Font << {}>> >>{} >>",
                    self.width, self.height, content_id, font_refs, annots
                )
                .into_bytes(),
            );
        }

        let dests_id = if self.dests.is_empty() {
            None
        } else {
            let mut dict = String::from("<< ");
            for named in &self.dests {
                let page_ref = page_ids
                    .get(named.page)
                    .map(|id| format!("{} 0 R", id))
                    .unwrap_or_else(|| "null".to_string());
                let _ = write!(dict, "/{} {} ", pdf_name(&named.label), named.dest.to_pdf(&page_ref));
            }
            dict.push_str(">>");
            objects.push(dict.into_bytes());
            Some(objects.len() - 1)
        };

        objects[1] = match dests_id {
            Some(id) => format!("<< /Type /Catalog /Pages 2 0 R /Dests {} 0 R >>", id),
            None => "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        }
        .into_bytes();

        let kids: Vec<String> = page_ids.iter().map(|id| format!("{} 0 R", id)).collect();
        objects[2] = format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            page_ids.len()
        )
        .into_bytes();

        serialize(&objects)
    }
}

impl PageSink for Canvas {
    fn bounds(&self) -> Bounds {
        Bounds {
            left: self.margin,
            top: self.height - self.margin,
            width: self.width - 2.0 * self.margin,
            height: self.height - 2.0 * self.margin,
        }
    }

    fn y(&self) -> f64 {
        self.y
    }

    fn set_y(&mut self, y: f64) {
        self.y = y;
    }

    fn start_new_page(&mut self) {
        self.pages.push(CanvasPage::default());
        self.y = self.height - self.margin;
        log::debug!("started page {}", self.pages.len());
    }

    fn font_resource(
        &mut self,
        base_font: &str,
        subset: usize,
        embedded: Option<&EmbeddedFont>,
    ) -> String {
        let key = if subset == 0 {
            base_font.to_string()
        } else {
            format!("{}+{}", base_font, subset)
        };
        let index = match self.fonts.iter().position(|f| f.key == key) {
            Some(i) => i,
            None => {
                self.fonts.push(CanvasFont {
                    key,
                    embedded: embedded.cloned(),
                    used: BTreeSet::new(),
                });
                self.fonts.len() - 1
            }
        };
        format!("F{}", index + 1)
    }

    fn glyphs_used(&mut self, resource: &str, text: &str) {
        let index = resource
            .strip_prefix('F')
            .and_then(|n| n.parse::<usize>().ok())
            .and_then(|n| n.checked_sub(1));
        if let Some(font) = index.and_then(|i| self.fonts.get_mut(i)) {
            if font.embedded.is_some() {
                font.used.extend(text.chars());
            }
        }
    }

    fn add_dest(&mut self, label: &str, dest: Destination) {
        let page = self.pages.len().saturating_sub(1);
        self.dests.push(NamedDest {
            label: label.to_string(),
            page,
            dest,
        });
    }

    fn link_annotation(&mut self, rect: [f64; 4], target: &str) {
        self.current_page().links.push(LinkAnnotation {
            rect,
            target: target.to_string(),
        });
    }

    fn add_content(&mut self, content: &str) {
        self.current_page().content.push_str(content);
    }
}

/// Write the font program, descriptor, CID font, ToUnicode map and Type0
/// dictionary for a TrueType face. Returns the Type0 object id, or `None`
/// when the program cannot be parsed.
///
/// Text is encoded with the face's own glyph ids, so the whole program is
/// embedded and `/CIDToGIDMap` is the identity.
fn write_embedded_font(
    objects: &mut Vec<Vec<u8>>,
    font: &EmbeddedFont,
    used: &BTreeSet<char>,
) -> Option<usize> {
    let face = match ttf_parser::Face::parse(&font.data, 0) {
        Ok(face) => face,
        Err(e) => {
            log::warn!("cannot embed {}: {}", font.name, e);
            return None;
        }
    };
    let scale = 1000.0 / face.units_per_em() as f64;
    let name = pdf_name(&font.name);

    let glyphs: BTreeMap<u16, char> = used
        .iter()
        .filter_map(|&ch| face.glyph_index(ch).map(|gid| (gid.0, ch)))
        .collect();

    let file_id = objects.len();
    objects.push(flate_stream(
        &font.data,
        &format!("/Length1 {}", font.data.len()),
    ));

    let bbox = face.global_bounding_box();
    let ascent = face.ascender() as f64 * scale;
    let cap_height = face.capital_height().unwrap_or(face.ascender()) as f64 * scale;
    let descriptor_id = objects.len();
    objects.push(
        format!(
            "<< /Type /FontDescriptor /FontName /{} /Flags 4 \
             /FontBBox [{} {} {} {}] /ItalicAngle {} \
             /Ascent {} /Descent {} /CapHeight {} /StemV {} \
             /FontFile2 {} 0 R >>",
            name,
            (bbox.x_min as f64 * scale) as i32,
            (bbox.y_min as f64 * scale) as i32,
            (bbox.x_max as f64 * scale) as i32,
            (bbox.y_max as f64 * scale) as i32,
            if font.italic { -12 } else { 0 },
            ascent as i32,
            (face.descender() as f64 * scale) as i32,
            cap_height as i32,
            if font.bold { 120 } else { 80 },
            file_id,
        )
        .into_bytes(),
    );

    let mut widths = String::from("[");
    for &gid in glyphs.keys() {
        let advance = face.glyph_hor_advance(ttf_parser::GlyphId(gid)).unwrap_or(0);
        let _ = write!(widths, " {} [{}]", gid, (advance as f64 * scale) as u32);
    }
    widths.push_str(" ]");
    let default_width = face
        .glyph_hor_advance(ttf_parser::GlyphId(0))
        .map(|advance| (advance as f64 * scale) as u32)
        .unwrap_or(1000);
    let cid_font_id = objects.len();
    objects.push(
        format!(
            "<< /Type /Font /Subtype /CIDFontType2 /BaseFont /{} \
             /CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> \
             /FontDescriptor {} 0 R /DW {} /W {} /CIDToGIDMap /Identity >>",
            name, descriptor_id, default_width, widths,
        )
        .into_bytes(),
    );

    let to_unicode_id = objects.len();
    objects.push(flate_stream(to_unicode_cmap(&glyphs, &name).as_bytes(), ""));

    objects.push(
        format!(
            "<< /Type /Font /Subtype /Type0 /BaseFont /{} /Encoding /Identity-H \
             /DescendantFonts [{} 0 R] /ToUnicode {} 0 R >>",
            name, cid_font_id, to_unicode_id,
        )
        .into_bytes(),
    );
    Some(objects.len() - 1)
}

/// A Flate-compressed stream object body. `extra` goes into the dictionary.
fn flate_stream(bytes: &[u8], extra: &str) -> Vec<u8> {
    let compressed = compress_to_vec_zlib(bytes, 6);
    let mut data: Vec<u8> = Vec::new();
    let _ = write!(data, "<< /Length {} ", compressed.len());
    if !extra.is_empty() {
        let _ = write!(data, "{} ", extra);
    }
    let _ = write!(data, "/Filter /FlateDecode >>\nstream\n");
    data.extend_from_slice(&compressed);
    data.extend_from_slice(b"\nendstream");
    data
}

/// Glyph id to Unicode map so text can be copied back out.
fn to_unicode_cmap(glyphs: &BTreeMap<u16, char>, name: &str) -> String {
    let mut cmap = String::new();
    cmap.push_str("/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n");
    cmap.push_str("/CIDSystemInfo\n<< /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
    let _ = writeln!(cmap, "/CMapName /{}-UTF16 def", name);
    cmap.push_str("/CMapType 2 def\n1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n");

    let entries: Vec<(&u16, &char)> = glyphs.iter().collect();
    // At most 100 entries per bfchar block.
    for chunk in entries.chunks(100) {
        let _ = writeln!(cmap, "{} beginbfchar", chunk.len());
        for (gid, ch) in chunk {
            let mut units = [0u16; 2];
            let utf16: String = ch
                .encode_utf16(&mut units)
                .iter()
                .map(|unit| format!("{:04X}", unit))
                .collect();
            let _ = writeln!(cmap, "<{:04X}> <{}>", gid, utf16);
        }
        cmap.push_str("endbfchar\n");
    }
    cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    cmap
}

/// `#name` targets jump to a named destination, anything else is a URI.
fn link_annotation_dict(link: &LinkAnnotation) -> String {
    let [x1, y1, x2, y2] = link.rect;
    let action = match link.target.strip_prefix('#') {
        Some(name) => format!("<< /S /GoTo /D /{} >>", pdf_name(name)),
        None => format!(
            "<< /S /URI /URI ({}) >>",
            escape_pdf_bytes(link.target.as_bytes())
        ),
    };
    format!(
        "<< /Type /Annot /Subtype /Link /Rect [{:.2} {:.2} {:.2} {:.2}] /Border [0 0 0] /A {} >>",
        x1, y1, x2, y2, action
    )
}

/// Encode a string as the body of a PDF name object.
fn pdf_name(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        let delimiter = matches!(
            b,
            b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%' | b'#'
        );
        if (0x21..=0x7e).contains(&b) && !delimiter {
            out.push(b as char);
        } else {
            let _ = write!(out, "#{:02X}", b);
        }
    }
    out
}

/// Write objects 1.. with an xref table and trailer.
fn serialize(objects: &[Vec<u8>]) -> Vec<u8> {
    let mut output: Vec<u8> = Vec::new();
    let mut offsets: Vec<usize> = vec![0; objects.len()];

    output.extend_from_slice(b"%PDF-1.7\n");
    output.extend_from_slice(b"%\xe2\xe3\xcf\xd3\n");

    for (i, data) in objects.iter().enumerate().skip(1) {
        offsets[i] = output.len();
        let _ = write!(output, "{} 0 obj\n", i);
        output.extend_from_slice(data);
        output.extend_from_slice(b"\nendobj\n\n");
    }

    let xref_offset = output.len();
    let _ = write!(output, "xref\n0 {}\n", objects.len());
    let _ = write!(output, "0000000000 65535 f \n");
    for offset in offsets.iter().skip(1) {
        let _ = write!(output, "{:010} 00000 n \n", offset);
    }
    let _ = write!(
        output,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len(),
        xref_offset
    );
    output
}
