//! Immutable style snapshots.
//!
//! Every opened tag derives a child [`StyleState`] from the current one; the
//! child keeps a reference to its parent so closing the tag is just a matter
//! of going back to `parent()`. Instructions hold an `Rc` to the state they
//! were produced under, so states live exactly as long as something still
//! draws with them.

use std::rc::Rc;

use crate::error::{InklineError, Result};
use crate::font::{FontHandle, FontMetrics};
use crate::style::{
    evaluate_measure, Color, FontSlant, FontStyle, FontWeight, MeasureContext, StyleRegistry,
    TagStyle, TextAlign, TextDecoration, VerticalAlign,
};

pub type StateRef = Rc<StyleState>;

/// Superscript and subscript text is drawn at this fraction of the
/// surrounding size.
pub const SCRIPT_SCALE: f64 = 0.7;
/// Superscript baseline shift, as a fraction of the surrounding size.
pub const SUPER_RISE: f64 = 0.4;
/// Subscript baseline shift, as a fraction of the surrounding size.
pub const SUB_DROP: f64 = 0.3;

#[derive(Debug, Clone)]
pub struct StyleState {
    parent: Option<StateRef>,
    pub font: FontHandle,
    pub font_family: String,
    pub font_size: f64,
    pub font_style: FontStyle,
    pub color: Color,
    pub kerning: bool,
    /// Baseline offset in points, positive is up.
    pub rise: f64,
    pub decoration: TextDecoration,
    /// Alignment requested by an enclosing block tag, if any.
    pub text_align: Option<TextAlign>,
}

/// Starting values for a root state.
#[derive(Debug, Clone)]
pub struct RootStyle<'a> {
    pub font_family: &'a str,
    pub font_size: f64,
    pub font_style: FontStyle,
    pub color: Color,
    /// `None` turns kerning on exactly when the font has kerning data.
    pub kerning: Option<bool>,
}

impl Default for RootStyle<'_> {
    fn default() -> Self {
        Self {
            font_family: "Helvetica",
            font_size: 12.0,
            font_style: FontStyle::Normal,
            color: Color::BLACK,
            kerning: None,
        }
    }
}

impl StyleState {
    pub fn root(fonts: &dyn FontMetrics, root: &RootStyle<'_>) -> StateRef {
        let font = fonts.find_font(root.font_family, root.font_style);
        Rc::new(StyleState {
            parent: None,
            font,
            font_family: root.font_family.to_string(),
            font_size: root.font_size,
            font_style: root.font_style,
            color: root.color,
            kerning: root
                .kerning
                .unwrap_or_else(|| fonts.has_kerning_data(font)),
            rise: 0.0,
            decoration: TextDecoration::None,
            text_align: None,
        })
    }

    pub fn parent(&self) -> Option<&StateRef> {
        self.parent.as_ref()
    }

    /// Number of ancestors.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut node = self.parent.as_ref();
        while let Some(state) = node {
            depth += 1;
            node = state.parent.as_ref();
        }
        depth
    }

    /// Derive a child state with `delta` layered on top. Fields the delta
    /// leaves unset are inherited unchanged.
    pub fn derive(
        self: &Rc<Self>,
        delta: &TagStyle,
        fonts: &dyn FontMetrics,
        registry: &StyleRegistry,
    ) -> Result<StateRef> {
        let mut style = self.font_style;
        match delta.font_weight {
            Some(FontWeight::Bold) => style = style.compose(FontStyle::Bold),
            Some(FontWeight::Normal) => style = FontStyle::from_parts(false, style.is_italic()),
            None => {}
        }
        match delta.font_style {
            Some(FontSlant::Italic) => style = style.compose(FontStyle::Italic),
            Some(FontSlant::Normal) => style = FontStyle::from_parts(style.is_bold(), false),
            None => {}
        }

        let font_family = delta
            .font_family
            .clone()
            .unwrap_or_else(|| self.font_family.clone());

        let font_size = match &delta.font_size {
            Some(measure) => {
                let ctx = MeasureContext::default()
                    .with_relative(self.font_size)
                    .with_em(self.font_size)
                    .with_current(self.font_size)
                    .with_mappings(&registry.measures);
                evaluate_measure(measure, &ctx)?
            }
            None => self.font_size,
        };
        if font_size.is_nan() || font_size <= 0.0 {
            return Err(InklineError::style_value(
                "font_size",
                font_size.to_string(),
                "must be positive",
            ));
        }

        let rise = match delta.vertical_align {
            Some(VerticalAlign::Super) => self.rise + SUPER_RISE * self.font_size,
            Some(VerticalAlign::Sub) => self.rise - SUB_DROP * self.font_size,
            Some(VerticalAlign::Baseline) => 0.0,
            None => self.rise,
        };

        let color = match &delta.color {
            Some(hex) => Color::parse_hex(hex)?,
            None => self.color,
        };

        Ok(Rc::new(StyleState {
            parent: Some(Rc::clone(self)),
            font: fonts.find_font(&font_family, style),
            font_family,
            font_size,
            font_style: style,
            color,
            kerning: delta.kerning.unwrap_or(self.kerning),
            rise,
            decoration: delta.text_decoration.unwrap_or(self.decoration),
            text_align: delta.text_align.or(self.text_align),
        }))
    }
}
