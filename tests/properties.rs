//! Property-based invariant tests for line breaking and justification.
//!
//! Verifies:
//! 1. Every line fits the column, unless it holds a single token that is
//!    wider than the column on its own
//! 2. Breaking never loses, reorders or duplicates words
//! 3. Justified soft lines are drawn exactly as wide as the column

use inkline::font::FontContext;
use inkline::pdf::Canvas;
use inkline::style::{StyleRegistry, TextAlign};
use inkline::text::{Algorithm, WidthKind};
use inkline::{FormatOptions, Formatter, Line};
use proptest::prelude::*;

// ── Strategy helpers ──────────────────────────────────────────────────

fn arb_word() -> impl Strategy<Value = String> {
    "[a-z]{1,14}"
}

/// A word, sometimes wrapped in an inline style tag.
fn arb_marked_word() -> impl Strategy<Value = String> {
    (arb_word(), 0u8..4).prop_map(|(word, tag)| match tag {
        1 => format!("<b>{word}</b>"),
        2 => format!("<i>{word}</i>"),
        _ => word,
    })
}

fn arb_gap() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just(" "), Just("  "), Just(" \n ")]
}

/// Whatever trails the last word: nothing, or whitespace.
fn arb_tail() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just(""), Just(" "), Just("\n"), Just("  \n")]
}

fn arb_markup() -> impl Strategy<Value = (Vec<String>, String)> {
    let parts = prop::collection::vec((arb_marked_word(), arb_gap()), 1..40);
    (parts, arb_tail()).prop_map(|(parts, tail)| {
        let words = parts
            .iter()
            .map(|(w, _)| {
                w.trim_start_matches("<b>")
                    .trim_start_matches("<i>")
                    .trim_end_matches("</b>")
                    .trim_end_matches("</i>")
                    .to_string()
            })
            .collect();
        let mut markup = String::new();
        for (i, (word, gap)) in parts.iter().enumerate() {
            if i > 0 {
                markup.push_str(gap);
            }
            markup.push_str(word);
        }
        markup.push_str(tail);
        (words, markup)
    })
}

fn arb_algorithm() -> impl Strategy<Value = Algorithm> {
    prop_oneof![Just(Algorithm::Greedy), Just(Algorithm::Optimal)]
}

/// Courier 10pt: every glyph, bold or italic, is 6pt wide.
fn courier(algorithm: Algorithm, align: TextAlign) -> FormatOptions {
    FormatOptions {
        font_family: "Courier".to_string(),
        font_size: 10.0,
        algorithm,
        align,
        ..Default::default()
    }
}

fn lay_out(markup: &str, width: f64, options: &FormatOptions) -> Vec<Line> {
    let fonts = FontContext::new();
    let registry = StyleRegistry::default();
    inkline::layout(markup, width, options, &fonts, &registry).unwrap()
}

/// Drawn width of each `Tj`/`TJ` operator in Courier 10pt content.
fn shown_widths(content: &str) -> Vec<f64> {
    let mut widths = Vec::new();
    for op in content.lines() {
        if let Some(body) = op.strip_suffix(") Tj") {
            let text = body.trim_start_matches('(');
            widths.push(text.chars().count() as f64 * 6.0);
        } else if let Some(body) = op.strip_suffix("] TJ") {
            let body = body.trim_start_matches('[');
            let mut width = 0.0;
            let mut rest = body;
            while !rest.is_empty() {
                rest = rest.trim_start();
                if let Some(after) = rest.strip_prefix('(') {
                    let end = after.find(')').unwrap();
                    width += after[..end].chars().count() as f64 * 6.0;
                    rest = &after[end + 1..];
                } else {
                    let end = rest.find(' ').unwrap_or(rest.len());
                    let adjust: f64 = rest[..end].parse().unwrap();
                    width -= adjust * 10.0 / 1000.0;
                    rest = &rest[end..];
                }
            }
            widths.push(width);
        }
    }
    widths
}

// ── Properties ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn lines_fit_unless_a_single_token_overflows(
        (_, markup) in arb_markup(),
        width in 30.0f64..300.0,
        algorithm in arb_algorithm(),
    ) {
        let lines = lay_out(&markup, width, &courier(algorithm, TextAlign::Left));
        for line in &lines {
            if line.width() <= width + 1e-6 {
                continue;
            }
            let visible: Vec<_> = line.instructions().iter().filter(|i| i.is_visible()).collect();
            prop_assert_eq!(visible.len(), 1, "{:?} overflows {}", line.text(), width);
            prop_assert!((visible[0].width(WidthKind::All) - line.width()).abs() < 1e-9);
        }
    }

    #[test]
    fn breaking_keeps_every_word_in_order(
        (words, markup) in arb_markup(),
        width in 30.0f64..300.0,
        algorithm in arb_algorithm(),
    ) {
        let lines = lay_out(&markup, width, &courier(algorithm, TextAlign::Left));
        let laid_out: Vec<String> = lines
            .iter()
            .flat_map(|l| l.text().split(' ').map(str::to_string).collect::<Vec<_>>())
            .collect();
        prop_assert_eq!(laid_out, words);
        prop_assert!(lines.last().map_or(false, |l| l.hard_break));
    }

    #[test]
    fn justified_soft_lines_fill_the_column(
        words in prop::collection::vec(arb_word(), 1..30),
        tail in arb_tail(),
        width in 90.0f64..300.0,
        algorithm in arb_algorithm(),
    ) {
        let markup = format!("{}{tail}", words.join(" "));
        let options = courier(algorithm, TextAlign::Justify);
        let lines = lay_out(&markup, width, &options);

        let fonts = FontContext::new();
        let registry = StyleRegistry::default();
        let mut canvas = Canvas::new(width + 100.0, 100_000.0, 50.0);
        let mut formatter = Formatter::new(&markup, options, &fonts, &registry).unwrap();
        formatter.paginate(&mut canvas).unwrap();

        let drawn = shown_widths(&canvas.pages()[0].content);
        prop_assert_eq!(drawn.len(), lines.len());
        for (line, drawn) in lines.iter().zip(&drawn) {
            let has_space = line.text().contains(' ');
            if !line.hard_break && has_space {
                prop_assert!((drawn - width).abs() < 1e-3, "{:?}: {} vs {}", line.text(), drawn, width);
            } else {
                let text_width = line.text().chars().count() as f64 * 6.0;
                prop_assert!((drawn - text_width).abs() < 1e-9);
            }
        }
    }
}
