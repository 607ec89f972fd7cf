//! Glyph metrics for the standard PDF fonts.
//!
//! Widths come from the Adobe AFM files and are in thousandths of an em.
//! Only printable ASCII plus the handful of typographic characters the
//! scanner produces (dashes, quotes, ellipsis, no-break space) are tabled;
//! anything else measures as the font's fallback width. Oblique and italic
//! faces share the widths of their upright face.

use super::StandardFont;

/// Metrics for one standard font.
#[derive(Debug, Clone, Copy)]
pub struct StandardFontMetrics {
    /// Widths for U+0020 through U+007E.
    pub widths: &'static [u16; 95],
    pub ascender: i16,
    pub descender: i16,
    /// Font bounding box height, used as the line height.
    pub bbox_height: u16,
    pub en_dash: u16,
    pub single_quote: u16,
    pub double_quote: u16,
    pub fallback: u16,
    pub kern_pairs: &'static [(char, char, i16)],
}

impl StandardFontMetrics {
    /// Width of a character in thousandths of an em.
    pub fn glyph_width(&self, ch: char) -> u16 {
        let code = ch as u32;
        if (0x20..=0x7E).contains(&code) {
            return self.widths[(code - 0x20) as usize];
        }
        match ch {
            '\u{00A0}' => self.widths[0],
            '\u{2013}' => self.en_dash,
            '\u{2014}' | '\u{2026}' => 1000,
            '\u{2018}' | '\u{2019}' => self.single_quote,
            '\u{201C}' | '\u{201D}' => self.double_quote,
            _ => self.fallback,
        }
    }

    /// Width of a character in points.
    pub fn char_width(&self, ch: char, font_size: f64) -> f64 {
        self.glyph_width(ch) as f64 / 1000.0 * font_size
    }

    /// Kerning adjustment between two characters, thousandths of an em.
    pub fn kern(&self, left: char, right: char) -> i16 {
        self.kern_pairs
            .iter()
            .find(|(l, r, _)| *l == left && *r == right)
            .map(|(_, _, k)| *k)
            .unwrap_or(0)
    }

    pub fn has_kerning(&self) -> bool {
        !self.kern_pairs.is_empty()
    }

    /// Measure a string in points, optionally applying pair kerning.
    pub fn measure_string(&self, text: &str, font_size: f64, kerning: bool) -> f64 {
        let mut units: i64 = 0;
        let mut prev: Option<char> = None;
        for ch in text.chars() {
            units += self.glyph_width(ch) as i64;
            if kerning {
                if let Some(p) = prev {
                    units += self.kern(p, ch) as i64;
                }
            }
            prev = Some(ch);
        }
        units as f64 / 1000.0 * font_size
    }
}

impl StandardFont {
    pub fn metrics(&self) -> StandardFontMetrics {
        match self {
            Self::Helvetica | Self::HelveticaOblique => HELVETICA,
            Self::HelveticaBold | Self::HelveticaBoldOblique => HELVETICA_BOLD,
            Self::TimesRoman | Self::TimesItalic => TIMES_ROMAN,
            Self::TimesBold | Self::TimesBoldItalic => TIMES_BOLD,
            Self::Courier
            | Self::CourierBold
            | Self::CourierOblique
            | Self::CourierBoldOblique => COURIER,
        }
    }
}

#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    278, 278, 584, 584, 584, 556, 1015,
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    278, 278, 278, 469, 556, 333,
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833,
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500,
    334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    333, 333, 584, 584, 584, 611, 975,
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    333, 278, 333, 584, 556, 333,
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889,
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500,
    389, 280, 389, 584,
];

#[rustfmt::skip]
const TIMES_ROMAN_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    278, 278, 564, 564, 564, 444, 921,
    722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889,
    722, 722, 556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611,
    333, 278, 333, 469, 500, 333,
    444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778,
    500, 500, 500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444,
    480, 200, 480, 541,
];

#[rustfmt::skip]
const TIMES_BOLD_WIDTHS: [u16; 95] = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    333, 333, 570, 570, 570, 500, 930,
    722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944,
    722, 778, 611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667,
    333, 278, 333, 581, 500, 333,
    500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833,
    556, 500, 556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444,
    394, 220, 394, 520,
];

const COURIER_WIDTHS: [u16; 95] = [600; 95];

const HELVETICA_KERNING: &[(char, char, i16)] = &[
    ('A', 'T', -120),
    ('A', 'V', -70),
    ('A', 'W', -50),
    ('A', 'Y', -100),
    ('L', 'T', -110),
    ('L', 'V', -110),
    ('L', 'W', -70),
    ('L', 'Y', -140),
    ('T', 'a', -120),
    ('T', 'o', -120),
    ('V', 'a', -70),
    ('Y', 'o', -140),
];

const TIMES_KERNING: &[(char, char, i16)] = &[
    ('A', 'T', -111),
    ('A', 'V', -135),
    ('A', 'W', -90),
    ('A', 'Y', -105),
    ('L', 'T', -92),
    ('L', 'V', -100),
    ('L', 'W', -74),
    ('L', 'Y', -100),
    ('T', 'a', -80),
    ('T', 'o', -80),
    ('V', 'a', -111),
    ('Y', 'o', -100),
];

const HELVETICA: StandardFontMetrics = StandardFontMetrics {
    widths: &HELVETICA_WIDTHS,
    ascender: 718,
    descender: -207,
    bbox_height: 1156,
    en_dash: 556,
    single_quote: 222,
    double_quote: 333,
    fallback: 556,
    kern_pairs: HELVETICA_KERNING,
};

const HELVETICA_BOLD: StandardFontMetrics = StandardFontMetrics {
    widths: &HELVETICA_BOLD_WIDTHS,
    ascender: 718,
    descender: -207,
    bbox_height: 1156,
    en_dash: 556,
    single_quote: 278,
    double_quote: 500,
    fallback: 611,
    kern_pairs: HELVETICA_KERNING,
};

const TIMES_ROMAN: StandardFontMetrics = StandardFontMetrics {
    widths: &TIMES_ROMAN_WIDTHS,
    ascender: 683,
    descender: -217,
    bbox_height: 1116,
    en_dash: 500,
    single_quote: 333,
    double_quote: 444,
    fallback: 500,
    kern_pairs: TIMES_KERNING,
};

const TIMES_BOLD: StandardFontMetrics = StandardFontMetrics {
    widths: &TIMES_BOLD_WIDTHS,
    ascender: 683,
    descender: -217,
    bbox_height: 1116,
    en_dash: 500,
    single_quote: 333,
    double_quote: 500,
    fallback: 500,
    kern_pairs: TIMES_KERNING,
};

const COURIER: StandardFontMetrics = StandardFontMetrics {
    widths: &COURIER_WIDTHS,
    ascender: 629,
    descender: -157,
    bbox_height: 1055,
    en_dash: 600,
    single_quote: 600,
    double_quote: 600,
    fallback: 600,
    kern_pairs: &[],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helvetica_space_width() {
        let m = StandardFont::Helvetica.metrics();
        assert!((m.char_width(' ', 12.0) - 3.336).abs() < 1e-9);
    }

    #[test]
    fn courier_is_monospaced() {
        let m = StandardFont::Courier.metrics();
        assert_eq!(m.measure_string("iiii", 10.0, false), 24.0);
        assert_eq!(m.measure_string("WWWW", 10.0, true), 24.0);
        assert!(!m.has_kerning());
    }

    #[test]
    fn kerning_tightens_known_pairs() {
        let m = StandardFont::Helvetica.metrics();
        let loose = m.measure_string("AVA", 10.0, false);
        let tight = m.measure_string("AVA", 10.0, true);
        assert!(tight < loose, "kerned {tight} should be narrower than {loose}");
        assert_eq!(m.kern('A', 'V'), -70);
        assert_eq!(m.kern('V', 'A'), 0);
    }

    #[test]
    fn typographic_characters_have_widths() {
        let m = StandardFont::TimesRoman.metrics();
        assert_eq!(m.glyph_width('\u{2014}'), 1000);
        assert_eq!(m.glyph_width('\u{2013}'), 500);
        assert_eq!(m.glyph_width('\u{00A0}'), m.glyph_width(' '));
    }
}
