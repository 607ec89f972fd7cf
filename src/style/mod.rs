//! # Style System
//!
//! Tag-scoped typography for inline markup. Each registered tag carries a
//! style delta ([`TagStyle`]) that is layered over the enclosing style when
//! the tag opens and dropped again when it closes.
//!
//! This is deliberately not CSS. There is no selector matching and no
//! cascade beyond "a nested tag inherits whatever it does not set".

pub mod measure;

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{InklineError, Result};
pub use measure::{evaluate_measure, Measure, MeasureContext};

/// Weight and slant combined, the way font families are looked up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontStyle {
    #[default]
    Normal,
    Bold,
    Italic,
    BoldItalic,
}

impl FontStyle {
    pub fn from_parts(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (false, false) => FontStyle::Normal,
            (true, false) => FontStyle::Bold,
            (false, true) => FontStyle::Italic,
            (true, true) => FontStyle::BoldItalic,
        }
    }

    pub fn is_bold(self) -> bool {
        matches!(self, FontStyle::Bold | FontStyle::BoldItalic)
    }

    pub fn is_italic(self) -> bool {
        matches!(self, FontStyle::Italic | FontStyle::BoldItalic)
    }

    /// Layer `added` over this style. `Normal` resets; bold and italic
    /// accumulate, so bold over italic is bold-italic and bold over
    /// bold-italic stays bold-italic.
    pub fn compose(self, added: FontStyle) -> FontStyle {
        match added {
            FontStyle::Normal => FontStyle::Normal,
            FontStyle::Bold => FontStyle::from_parts(true, self.is_italic()),
            FontStyle::Italic => FontStyle::from_parts(self.is_bold(), true),
            FontStyle::BoldItalic => FontStyle::BoldItalic,
        }
    }
}

impl FromStr for FontStyle {
    type Err = InklineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "normal" => Ok(FontStyle::Normal),
            "bold" => Ok(FontStyle::Bold),
            "italic" => Ok(FontStyle::Italic),
            "bold_italic" => Ok(FontStyle::BoldItalic),
            _ => Err(InklineError::style_value(
                "font_style",
                s,
                "unknown font-style combination",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontWeight {
    Normal,
    Bold,
}

impl FromStr for FontWeight {
    type Err = InklineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "normal" => Ok(FontWeight::Normal),
            "bold" => Ok(FontWeight::Bold),
            _ => Err(InklineError::style_value("font_weight", s, "expected normal or bold")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontSlant {
    Normal,
    Italic,
}

impl FromStr for FontSlant {
    type Err = InklineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "normal" => Ok(FontSlant::Normal),
            "italic" => Ok(FontSlant::Italic),
            _ => Err(InklineError::style_value("font_style", s, "expected normal or italic")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    #[default]
    Left,
    Right,
    Center,
    Justify,
}

impl FromStr for TextAlign {
    type Err = InklineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "left" => Ok(TextAlign::Left),
            "right" => Ok(TextAlign::Right),
            "center" => Ok(TextAlign::Center),
            "justify" => Ok(TextAlign::Justify),
            _ => Err(InklineError::style_value(
                "text_align",
                s,
                "expected left, right, center or justify",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextDecoration {
    #[default]
    None,
    Underline,
    LineThrough,
}

/// How a tag participates in line flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Display {
    /// Style change only.
    #[default]
    Inline,
    /// Paragraph: starts on a fresh line and ends with a forced break.
    Block,
    /// Void tag that forces a line break.
    Break,
    /// Void tag that forces a line break and ends the current column.
    PageBreak,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalAlign {
    #[default]
    Baseline,
    Super,
    Sub,
}

/// An RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64, // 0.0 - 1.0
    pub g: f64,
    pub b: f64,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };
    pub const BLUE: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 1.0,
    };

    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Parse `rgb`, `rrggbb`, with or without a leading `#`.
    pub fn parse_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim_start_matches('#');
        let bad = || InklineError::style_value("color", hex, "expected 3 or 6 hex digits");
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(bad());
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| bad());
        let (r, g, b) = match digits.len() {
            3 => (
                channel(&digits[0..1].repeat(2))?,
                channel(&digits[1..2].repeat(2))?,
                channel(&digits[2..3].repeat(2))?,
            ),
            6 => (
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
            ),
            _ => return Err(bad()),
        };
        Ok(Self {
            r: r as f64 / 255.0,
            g: g as f64 / 255.0,
            b: b as f64 / 255.0,
        })
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

/// The style delta a tag applies. Unset fields inherit from the enclosing
/// style.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TagStyle {
    pub display: Display,
    pub font_family: Option<String>,
    pub font_size: Option<Measure>,
    pub font_weight: Option<FontWeight>,
    pub font_style: Option<FontSlant>,
    /// Hex color, e.g. `"0000ff"`.
    pub color: Option<String>,
    pub kerning: Option<bool>,
    pub vertical_align: Option<VerticalAlign>,
    pub text_decoration: Option<TextDecoration>,
    pub text_align: Option<TextAlign>,
    pub text_indent: Option<Measure>,
    /// Renames raw attribute keys to logical option names, e.g.
    /// `href -> target`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
}

impl TagStyle {
    fn display(display: Display) -> Self {
        Self {
            display,
            ..Default::default()
        }
    }

    /// Apply logical options that name style properties on top of this
    /// style, e.g. `<font size="14">`. Options that are not style
    /// properties are left for the caller.
    pub fn with_options(&self, options: &BTreeMap<String, String>) -> Result<TagStyle> {
        let mut style = self.clone();
        for (key, value) in options {
            match key.as_str() {
                "font_family" => style.font_family = Some(value.clone()),
                "font_size" => style.font_size = Some(Measure::Expr(value.clone())),
                "color" => style.color = Some(value.clone()),
                "text_align" => style.text_align = Some(value.parse()?),
                "font_weight" => style.font_weight = Some(value.parse()?),
                "font_style" => style.font_style = Some(value.parse()?),
                "kerning" => {
                    style.kerning = Some(value.parse().map_err(|_| {
                        InklineError::style_value("kerning", value, "expected true or false")
                    })?)
                }
                _ => {}
            }
        }
        Ok(style)
    }
}

/// Tag name → style delta, plus the symbolic size aliases tags may use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StyleRegistry {
    pub tags: HashMap<String, TagStyle>,
    pub measures: HashMap<String, Measure>,
}

impl Default for StyleRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();

        let bold = TagStyle {
            font_weight: Some(FontWeight::Bold),
            ..Default::default()
        };
        let italic = TagStyle {
            font_style: Some(FontSlant::Italic),
            ..Default::default()
        };
        registry.insert("b", bold.clone());
        registry.insert("strong", bold);
        registry.insert("i", italic.clone());
        registry.insert("em", italic);
        registry.insert(
            "u",
            TagStyle {
                text_decoration: Some(TextDecoration::Underline),
                ..Default::default()
            },
        );
        registry.insert(
            "s",
            TagStyle {
                text_decoration: Some(TextDecoration::LineThrough),
                ..Default::default()
            },
        );
        registry.insert(
            "big",
            TagStyle {
                font_size: Some(Measure::from("+2")),
                ..Default::default()
            },
        );
        registry.insert(
            "small",
            TagStyle {
                font_size: Some(Measure::from("-2")),
                ..Default::default()
            },
        );
        registry.insert("br", TagStyle::display(Display::Break));
        registry.insert("page", TagStyle::display(Display::PageBreak));
        registry.insert(
            "p",
            TagStyle {
                display: Display::Block,
                text_indent: Some(Measure::from("3em")),
                ..Default::default()
            },
        );
        registry.insert(
            "sup",
            TagStyle {
                vertical_align: Some(VerticalAlign::Super),
                font_size: Some(Measure::from("70%")),
                ..Default::default()
            },
        );
        registry.insert(
            "sub",
            TagStyle {
                vertical_align: Some(VerticalAlign::Sub),
                font_size: Some(Measure::from("70%")),
                ..Default::default()
            },
        );
        registry.insert(
            "a",
            TagStyle {
                color: Some("0000ff".to_string()),
                text_decoration: Some(TextDecoration::Underline),
                meta: meta(&[("name", "anchor"), ("href", "target")]),
                ..Default::default()
            },
        );
        registry.insert(
            "font",
            TagStyle {
                meta: meta(&[
                    ("face", "font_family"),
                    ("font", "font_family"),
                    ("size", "font_size"),
                    ("color", "color"),
                ]),
                ..Default::default()
            },
        );
        registry.insert(
            "center",
            TagStyle {
                display: Display::Block,
                text_align: Some(TextAlign::Center),
                ..Default::default()
            },
        );
        for (tag, size) in [("h1", "3em"), ("h2", "2em"), ("h3", "1.2em")] {
            registry.insert(
                tag,
                TagStyle {
                    display: Display::Block,
                    text_align: Some(TextAlign::Center),
                    font_size: Some(Measure::from(size)),
                    font_weight: Some(FontWeight::Bold),
                    ..Default::default()
                },
            );
        }

        for (alias, size) in [
            ("xx-small", "7"),
            ("x-small", "8"),
            ("small", "10"),
            ("medium", "12"),
            ("large", "14"),
            ("x-large", "18"),
            ("xx-large", "24"),
            ("smaller", "-2"),
            ("larger", "+2"),
        ] {
            registry
                .measures
                .insert(alias.to_string(), Measure::from(size));
        }

        registry
    }
}

fn meta(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(raw, logical)| (raw.to_string(), logical.to_string()))
        .collect()
}

impl StyleRegistry {
    /// A registry with no tags at all.
    pub fn empty() -> Self {
        Self {
            tags: HashMap::new(),
            measures: HashMap::new(),
        }
    }

    /// Load a registry from JSON. Missing sections fall back to the
    /// built-in table.
    /// Tag names are case-insensitive, so keys are lowercased like the
    /// scanner lowercases tags.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut registry: Self = serde_json::from_str(json)?;
        registry.tags = std::mem::take(&mut registry.tags)
            .into_iter()
            .map(|(tag, style)| (tag.to_ascii_lowercase(), style))
            .collect();
        Ok(registry)
    }

    /// Overlay tags and measures from another registry onto this one.
    pub fn merge(&mut self, other: StyleRegistry) {
        self.tags.extend(other.tags);
        self.measures.extend(other.measures);
    }

    pub fn insert(&mut self, tag: &str, style: TagStyle) {
        self.tags.insert(tag.to_ascii_lowercase(), style);
    }

    pub fn get(&self, tag: &str) -> Option<&TagStyle> {
        self.tags.get(tag)
    }

    /// Rename raw attribute keys through the tag's `meta` table. Keys with no
    /// mapping keep their raw name.
    pub fn resolve_options(
        &self,
        style: &TagStyle,
        raw: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        raw.iter()
            .map(|(key, value)| {
                let logical = style.meta.get(key).unwrap_or(key);
                (logical.clone(), value.clone())
            })
            .collect()
    }
}
