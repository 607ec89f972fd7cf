//! # Font Management
//!
//! Font lookup, text measurement and text encoding for the layout engine.
//!
//! The standard PDF fonts (Helvetica, Times, Courier) are always available
//! and need no embedding. TrueType fonts can be registered from bytes; their
//! advance widths come from ttf-parser.
//!
//! Layout never talks to a font directly. Everything goes through the
//! [`FontMetrics`] trait so callers can plug in their own measurement.

pub mod metrics;

pub use metrics::StandardFontMetrics;
use std::collections::HashMap;
use std::sync::Arc;

use crate::style::FontStyle;

/// Opaque reference to a resolved font face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FontHandle(pub usize);

/// One element of a text-show array.
#[derive(Debug, Clone, PartialEq)]
pub enum ShowItem {
    /// Encoded glyph bytes.
    Text(Vec<u8>),
    /// Displacement in thousandths of a text-space unit. Positive values
    /// move the next glyph left.
    Adjust(f64),
}

/// A run of encoded text that can be shown with a single font resource.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedChunk {
    pub subset: usize,
    pub items: Vec<ShowItem>,
}

/// Measurement and encoding service used by the parser and draw engine.
pub trait FontMetrics {
    /// Resolve a family and style. Unknown families resolve to a fallback
    /// face, never to an error.
    fn find_font(&self, family: &str, style: FontStyle) -> FontHandle;

    /// PostScript name of the face, used for the page font resource.
    fn base_font(&self, font: FontHandle) -> String;

    fn string_width(&self, font: FontHandle, text: &str, size: f64, kerning: bool) -> f64;

    /// Distance from baseline to the top of the face, positive.
    fn ascender(&self, font: FontHandle, size: f64) -> f64;

    /// Distance from baseline to the bottom of the face, negative.
    fn descender(&self, font: FontHandle, size: f64) -> f64;

    fn line_height(&self, font: FontHandle, size: f64) -> f64;

    fn has_kerning_data(&self, font: FontHandle) -> bool;

    /// Replace characters the face cannot encode.
    fn normalize_encoding(&self, font: FontHandle, text: &str) -> String;

    fn encode_text(&self, font: FontHandle, text: &str, kerning: bool) -> Vec<EncodedChunk>;

    /// Font program to embed for faces PDF viewers do not carry. Text in
    /// such a face is encoded as 2-byte glyph ids.
    fn embedded_font(&self, _font: FontHandle) -> Option<EmbeddedFont> {
        None
    }
}

/// A TrueType face the page sink must embed.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedFont {
    /// PostScript-safe name, also the font's `base_font`.
    pub name: String,
    pub data: Arc<[u8]>,
    pub bold: bool,
    pub italic: bool,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct FontKey {
    /// Lowercased family name.
    pub family: String,
    pub bold: bool,
    pub italic: bool,
}

impl FontKey {
    fn new(family: &str, style: FontStyle) -> Self {
        Self {
            family: family.to_ascii_lowercase(),
            bold: style.is_bold(),
            italic: style.is_italic(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FontData {
    /// One of the standard PDF fonts. No embedding needed.
    Standard(StandardFont),
    /// A TrueType/OpenType font measured with ttf-parser.
    Custom {
        name: String,
        /// `None` when the bytes could not be parsed; the face then measures
        /// and draws as Helvetica.
        metrics: Option<CustomFontMetrics>,
        data: Arc<[u8]>,
        style: FontStyle,
    },
}

/// Parsed metrics from a TrueType/OpenType font via ttf-parser.
#[derive(Debug, Clone)]
pub struct CustomFontMetrics {
    pub units_per_em: u16,
    pub advance_widths: HashMap<char, u16>,
    pub default_advance: u16,
    pub ascender: i16,
    pub descender: i16,
    pub line_gap: i16,
    /// Maps characters to their glyph IDs in the original font.
    pub glyph_ids: HashMap<char, u16>,
}

impl CustomFontMetrics {
    /// Get the advance width of a character in points.
    pub fn char_width(&self, ch: char, font_size: f64) -> f64 {
        let w = self
            .advance_widths
            .get(&ch)
            .copied()
            .unwrap_or(self.default_advance);
        self.scale(w as f64, font_size)
    }

    fn scale(&self, units: f64, font_size: f64) -> f64 {
        units / self.units_per_em as f64 * font_size
    }

    /// Parse metrics from font data using ttf-parser.
    pub fn from_font_data(data: &[u8]) -> Option<Self> {
        let face = ttf_parser::Face::parse(data, 0).ok()?;
        let units_per_em = face.units_per_em();

        let mut advance_widths = HashMap::new();
        let mut glyph_ids = HashMap::new();
        let mut default_advance = 0u16;

        for code in 32u32..=0xFFFF {
            if let Some(ch) = char::from_u32(code) {
                if let Some(glyph_id) = face.glyph_index(ch) {
                    let advance = face.glyph_hor_advance(glyph_id).unwrap_or(0);
                    advance_widths.insert(ch, advance);
                    glyph_ids.insert(ch, glyph_id.0);
                    if ch == ' ' {
                        default_advance = advance;
                    }
                }
            }
        }

        if default_advance == 0 {
            default_advance = units_per_em / 2;
        }

        Some(CustomFontMetrics {
            units_per_em,
            advance_widths,
            default_advance,
            ascender: face.ascender(),
            descender: face.descender(),
            line_gap: face.line_gap(),
            glyph_ids,
        })
    }
}

/// The standard PDF fonts the registry knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

impl StandardFont {
    /// The PDF name for this font.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::HelveticaBold => "Helvetica-Bold",
            Self::HelveticaOblique => "Helvetica-Oblique",
            Self::HelveticaBoldOblique => "Helvetica-BoldOblique",
            Self::TimesRoman => "Times-Roman",
            Self::TimesBold => "Times-Bold",
            Self::TimesItalic => "Times-Italic",
            Self::TimesBoldItalic => "Times-BoldItalic",
            Self::Courier => "Courier",
            Self::CourierBold => "Courier-Bold",
            Self::CourierOblique => "Courier-Oblique",
            Self::CourierBoldOblique => "Courier-BoldOblique",
        }
    }
}

/// Maps family + style to font data. Handles index into `faces`.
pub struct FontRegistry {
    faces: Vec<FontData>,
    index: HashMap<FontKey, usize>,
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            faces: Vec::new(),
            index: HashMap::new(),
        };

        let standard_mappings = [
            ("Helvetica", FontStyle::Normal, StandardFont::Helvetica),
            ("Helvetica", FontStyle::Bold, StandardFont::HelveticaBold),
            ("Helvetica", FontStyle::Italic, StandardFont::HelveticaOblique),
            ("Helvetica", FontStyle::BoldItalic, StandardFont::HelveticaBoldOblique),
            ("Times", FontStyle::Normal, StandardFont::TimesRoman),
            ("Times", FontStyle::Bold, StandardFont::TimesBold),
            ("Times", FontStyle::Italic, StandardFont::TimesItalic),
            ("Times", FontStyle::BoldItalic, StandardFont::TimesBoldItalic),
            ("Courier", FontStyle::Normal, StandardFont::Courier),
            ("Courier", FontStyle::Bold, StandardFont::CourierBold),
            ("Courier", FontStyle::Italic, StandardFont::CourierOblique),
            ("Courier", FontStyle::BoldItalic, StandardFont::CourierBoldOblique),
        ];

        for (family, style, font) in standard_mappings {
            registry.insert(family, style, FontData::Standard(font));
        }
        // Common spellings of the same faces.
        for (alias, target) in [("Times-Roman", "Times"), ("Arial", "Helvetica")] {
            for style in [
                FontStyle::Normal,
                FontStyle::Bold,
                FontStyle::Italic,
                FontStyle::BoldItalic,
            ] {
                if let Some(&slot) = registry.index.get(&FontKey::new(target, style)) {
                    registry.index.insert(FontKey::new(alias, style), slot);
                }
            }
        }

        registry
    }

    fn insert(&mut self, family: &str, style: FontStyle, data: FontData) -> FontHandle {
        let slot = self.faces.len();
        self.faces.push(data);
        self.index.insert(FontKey::new(family, style), slot);
        FontHandle(slot)
    }

    /// Look up a font, falling back to Helvetica in the same style.
    pub fn resolve(&self, family: &str, style: FontStyle) -> FontHandle {
        if let Some(&slot) = self.index.get(&FontKey::new(family, style)) {
            return FontHandle(slot);
        }
        // Slots 0..4 are Helvetica in Normal, Bold, Italic, BoldItalic order.
        let fallback = match style {
            FontStyle::Normal => 0,
            FontStyle::Bold => 1,
            FontStyle::Italic => 2,
            FontStyle::BoldItalic => 3,
        };
        log::debug!("font {family:?} {style:?} not registered, using Helvetica");
        FontHandle(fallback)
    }

    /// Register a custom font.
    pub fn register(&mut self, family: &str, style: FontStyle, data: &[u8]) -> FontHandle {
        let metrics = CustomFontMetrics::from_font_data(data);
        if metrics.is_none() {
            log::warn!("could not parse font data for {family:?}, measuring as Helvetica");
        }
        self.insert(
            family,
            style,
            FontData::Custom {
                name: pdf_font_name(family, style),
                metrics,
                data: Arc::from(data),
                style,
            },
        )
    }

    pub fn get(&self, font: FontHandle) -> &FontData {
        // Handles only come from this registry; slot 0 is always present.
        self.faces.get(font.0).unwrap_or(&self.faces[0])
    }
}

/// Shared font context used by layout and drawing.
pub struct FontContext {
    registry: FontRegistry,
}

impl Default for FontContext {
    fn default() -> Self {
        Self::new()
    }
}

enum Face<'a> {
    Standard(StandardFontMetrics),
    Custom(&'a CustomFontMetrics),
}

impl FontContext {
    pub fn new() -> Self {
        Self {
            registry: FontRegistry::new(),
        }
    }

    /// Access the underlying font registry.
    pub fn registry(&self) -> &FontRegistry {
        &self.registry
    }

    /// Access the underlying font registry mutably.
    pub fn registry_mut(&mut self) -> &mut FontRegistry {
        &mut self.registry
    }

    fn face(&self, font: FontHandle) -> Face<'_> {
        match self.registry.get(font) {
            FontData::Standard(std_font) => Face::Standard(std_font.metrics()),
            FontData::Custom {
                metrics: Some(m), ..
            } => Face::Custom(m),
            FontData::Custom { metrics: None, .. } => {
                Face::Standard(StandardFont::Helvetica.metrics())
            }
        }
    }
}

impl FontMetrics for FontContext {
    fn find_font(&self, family: &str, style: FontStyle) -> FontHandle {
        self.registry.resolve(family, style)
    }

    fn base_font(&self, font: FontHandle) -> String {
        match self.registry.get(font) {
            FontData::Standard(std_font) => std_font.pdf_name().to_string(),
            FontData::Custom {
                name,
                metrics: Some(_),
                ..
            } => name.clone(),
            FontData::Custom { metrics: None, .. } => StandardFont::Helvetica.pdf_name().to_string(),
        }
    }

    fn string_width(&self, font: FontHandle, text: &str, size: f64, kerning: bool) -> f64 {
        match self.face(font) {
            Face::Standard(m) => m.measure_string(text, size, kerning),
            Face::Custom(m) => text.chars().map(|ch| m.char_width(ch, size)).sum(),
        }
    }

    fn ascender(&self, font: FontHandle, size: f64) -> f64 {
        match self.face(font) {
            Face::Standard(m) => m.ascender as f64 / 1000.0 * size,
            Face::Custom(m) => m.scale(m.ascender as f64, size),
        }
    }

    fn descender(&self, font: FontHandle, size: f64) -> f64 {
        match self.face(font) {
            Face::Standard(m) => m.descender as f64 / 1000.0 * size,
            Face::Custom(m) => m.scale(m.descender as f64, size),
        }
    }

    fn line_height(&self, font: FontHandle, size: f64) -> f64 {
        match self.face(font) {
            Face::Standard(m) => m.bbox_height as f64 / 1000.0 * size,
            Face::Custom(m) => {
                let units = m.ascender as f64 - m.descender as f64 + m.line_gap as f64;
                m.scale(units, size)
            }
        }
    }

    fn has_kerning_data(&self, font: FontHandle) -> bool {
        match self.face(font) {
            Face::Standard(m) => m.has_kerning(),
            Face::Custom(_) => false,
        }
    }

    fn normalize_encoding(&self, font: FontHandle, text: &str) -> String {
        match self.face(font) {
            Face::Standard(_) => text
                .chars()
                .map(|ch| if unicode_to_winansi(ch).is_some() { ch } else { '?' })
                .collect(),
            Face::Custom(m) => text
                .chars()
                .map(|ch| if m.glyph_ids.contains_key(&ch) { ch } else { '?' })
                .collect(),
        }
    }

    fn encode_text(&self, font: FontHandle, text: &str, kerning: bool) -> Vec<EncodedChunk> {
        let mut items = Vec::new();
        match self.face(font) {
            Face::Standard(m) => {
                let mut bytes = Vec::new();
                let mut prev: Option<char> = None;
                for ch in text.chars() {
                    if kerning {
                        if let Some(p) = prev {
                            let k = m.kern(p, ch);
                            if k != 0 {
                                items.push(ShowItem::Text(std::mem::take(&mut bytes)));
                                items.push(ShowItem::Adjust(-(k as f64)));
                            }
                        }
                    }
                    bytes.push(unicode_to_winansi(ch).unwrap_or(b'?'));
                    prev = Some(ch);
                }
                if !bytes.is_empty() {
                    items.push(ShowItem::Text(bytes));
                }
            }
            Face::Custom(m) => {
                let bytes = text
                    .chars()
                    .flat_map(|ch| m.glyph_ids.get(&ch).copied().unwrap_or(0).to_be_bytes())
                    .collect::<Vec<u8>>();
                if !bytes.is_empty() {
                    items.push(ShowItem::Text(bytes));
                }
            }
        }
        vec![EncodedChunk { subset: 0, items }]
    }

    fn embedded_font(&self, font: FontHandle) -> Option<EmbeddedFont> {
        match self.registry.get(font) {
            FontData::Custom {
                name,
                metrics: Some(_),
                data,
                style,
            } => Some(EmbeddedFont {
                name: name.clone(),
                data: Arc::clone(data),
                bold: style.is_bold(),
                italic: style.is_italic(),
            }),
            _ => None,
        }
    }
}

/// A font name usable as a PDF name object, with style suffixes.
fn pdf_font_name(family: &str, style: FontStyle) -> String {
    let mut name: String = family
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if name.is_empty() {
        name = "CustomFont".to_string();
    }
    if style.is_bold() {
        name.push_str("-Bold");
    }
    if style.is_italic() {
        name.push_str("-Italic");
    }
    name
}

/// Map a character to its WinAnsiEncoding byte.
pub fn unicode_to_winansi(ch: char) -> Option<u8> {
    let cp = ch as u32;
    // ASCII printable and Latin-1 supplement map directly
    if (0x20..=0x7E).contains(&cp) || (0xA0..=0xFF).contains(&cp) {
        return Some(cp as u8);
    }
    // Windows-1252 special mappings (0x80-0x9F)
    match cp {
        0x20AC => Some(0x80), // Euro sign
        0x201A => Some(0x82), // Single low-9 quotation mark
        0x0192 => Some(0x83), // Latin small letter f with hook
        0x201E => Some(0x84), // Double low-9 quotation mark
        0x2026 => Some(0x85), // Horizontal ellipsis
        0x2020 => Some(0x86), // Dagger
        0x2021 => Some(0x87), // Double dagger
        0x02C6 => Some(0x88), // Modifier letter circumflex accent
        0x2030 => Some(0x89), // Per mille sign
        0x0160 => Some(0x8A), // Latin capital letter S with caron
        0x2039 => Some(0x8B), // Single left-pointing angle quotation
        0x0152 => Some(0x8C), // Latin capital ligature OE
        0x017D => Some(0x8E), // Latin capital letter Z with caron
        0x2018 => Some(0x91), // Left single quotation mark
        0x2019 => Some(0x92), // Right single quotation mark
        0x201C => Some(0x93), // Left double quotation mark
        0x201D => Some(0x94), // Right double quotation mark
        0x2022 => Some(0x95), // Bullet
        0x2013 => Some(0x96), // En dash
        0x2014 => Some(0x97), // Em dash
        0x02DC => Some(0x98), // Small tilde
        0x2122 => Some(0x99), // Trade mark sign
        0x0161 => Some(0x9A), // Latin small letter s with caron
        0x203A => Some(0x9B), // Single right-pointing angle quotation
        0x0153 => Some(0x9C), // Latin small ligature oe
        0x017E => Some(0x9E), // Latin small letter z with caron
        0x0178 => Some(0x9F), // Latin capital letter Y with diaeresis
        _ => None,
    }
}
