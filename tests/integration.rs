//! Integration tests for the inkline pipeline.
//!
//! These tests go from markup to lines and from lines to page content.
//! They verify:
//! - Tag nesting is validated and reported with the offending tag
//! - Entities and whitespace come out of the scanner as expected
//! - Lines respect the column width
//! - Links split over lines get one rectangle per line
//! - Options and measures are validated before layout

use inkline::font::FontContext;
use inkline::pdf::{Canvas, PageSink};
use inkline::style::{evaluate_measure, Measure, MeasureContext, StyleRegistry};
use inkline::text::{Algorithm, InstructionKind, Parser, RootStyle, StyleState, WidthKind};
use inkline::{FontMetrics, FormatOptions, Formatter, InklineError, Line, NestingErrorKind};

// ─── Helpers ────────────────────────────────────────────────────

/// Courier 10pt: every glyph is exactly 6pt wide.
fn courier() -> FormatOptions {
    FormatOptions {
        font_family: "Courier".to_string(),
        font_size: 10.0,
        ..Default::default()
    }
}

fn layout_with(text: &str, width: f64, options: FormatOptions) -> inkline::Result<Vec<Line>> {
    let fonts = FontContext::new();
    let registry = StyleRegistry::default();
    inkline::layout(text, width, &options, &fonts, &registry)
}

fn layout(text: &str, width: f64) -> Vec<Line> {
    layout_with(text, width, courier()).unwrap()
}

fn texts(lines: &[Line]) -> Vec<String> {
    lines.iter().map(Line::text).collect()
}

fn nesting_error(text: &str) -> (NestingErrorKind, String) {
    match layout_with(text, 100.0, courier()) {
        Err(InklineError::TagNesting { kind, tag, .. }) => (kind, tag),
        other => panic!("expected a nesting error for {text:?}, got {other:?}"),
    }
}

fn render(text: &str, width: f64, options: FormatOptions) -> Canvas {
    let fonts = FontContext::new();
    let registry = StyleRegistry::default();
    let mut canvas = Canvas::new(width + 100.0, 400.0, 50.0);
    let mut formatter = Formatter::new(text, options, &fonts, &registry).unwrap();
    formatter.paginate(&mut canvas).unwrap();
    canvas
}

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 50, "PDF too small to be valid");
    assert!(bytes.starts_with(b"%PDF-1.7"), "Missing PDF header");
    assert!(
        bytes.windows(5).any(|w| w == b"%%EOF"),
        "Missing %%EOF marker"
    );
    assert!(bytes.windows(4).any(|w| w == b"xref"), "Missing xref table");
    assert!(
        bytes.windows(7).any(|w| w == b"trailer"),
        "Missing trailer"
    );
}

// ─── Nesting ────────────────────────────────────────────────────

#[test]
fn test_properly_nested_tags_parse() {
    let lines = layout("<b><i>x</i></b>", 100.0);
    assert_eq!(texts(&lines), vec!["x"]);
}

#[test]
fn test_crossed_tags_are_rejected() {
    let (kind, tag) = nesting_error("<b><i>x</b></i>");
    assert_eq!(kind, NestingErrorKind::Mismatched);
    assert_eq!(tag, "b");
}

#[test]
fn test_close_with_nothing_open() {
    let (kind, tag) = nesting_error("x</b>");
    assert_eq!(kind, NestingErrorKind::NothingOpen);
    assert_eq!(tag, "b");
}

#[test]
fn test_unknown_tag() {
    let (kind, tag) = nesting_error("<blink>x</blink>");
    assert_eq!(kind, NestingErrorKind::UnknownTag);
    assert_eq!(tag, "blink");
}

#[test]
fn test_unclosed_tag_at_end_of_input() {
    let (kind, tag) = nesting_error("a <i>b");
    assert_eq!(kind, NestingErrorKind::Unclosed);
    assert_eq!(tag, "i");
}

#[test]
fn test_scan_errors_carry_position() {
    match layout_with("ok &bogus; text", 100.0, courier()) {
        Err(InklineError::Scan { position, .. }) => assert_eq!(position, 4),
        other => panic!("expected a scan error, got {other:?}"),
    }
}

// ─── Scanning ───────────────────────────────────────────────────

#[test]
fn test_entities_decode() {
    let lines = layout("&amp;&lt;&gt;&#65;&#x42;", 100.0);
    assert_eq!(texts(&lines), vec!["&<>AB"]);
}

#[test]
fn test_whitespace_runs_collapse_to_one_space() {
    let fonts = FontContext::new();
    let registry = StyleRegistry::default();
    let root = StyleState::root(
        &fonts,
        &RootStyle {
            font_family: "Courier",
            font_size: 10.0,
            ..Default::default()
        },
    );
    let space = fonts.string_width(root.font, " ", 10.0, false);
    let mut parser = Parser::new("a   b", root, &fonts, &registry);

    let mut blanks = Vec::new();
    while let Some(instruction) = parser.next().unwrap() {
        if instruction.is_discardable() {
            blanks.push(instruction);
        }
    }
    assert_eq!(blanks.len(), 1);
    assert_eq!(blanks[0].as_text(), Some(" "));
    assert_eq!(blanks[0].width(WidthKind::All), space);
}

// ─── Line breaking ──────────────────────────────────────────────

#[test]
fn test_short_unbreakable_text_is_one_hard_line() {
    let lines = layout("supercalifragilistic", 1000.0);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].text(), "supercalifragilistic");
    assert!(lines[0].hard_break);
}

#[test]
fn test_lines_respect_the_width() {
    let text = "It was the best of times, it was the worst of times, it was the age \
                of wisdom, it was the age of foolishness, it was the epoch of belief";
    for algorithm in [Algorithm::Greedy, Algorithm::Optimal] {
        let options = FormatOptions {
            algorithm,
            ..courier()
        };
        let lines = layout_with(text, 120.0, options).unwrap();
        assert!(lines.len() > 3);
        for line in &lines {
            assert!(
                line.width() <= 120.0 + 1e-9,
                "{algorithm:?}: {:?} is {} wide",
                line.text(),
                line.width()
            );
        }
        assert!(lines.last().unwrap().hard_break);
    }
}

#[test]
fn test_oversized_token_is_exactly_its_own_width() {
    let lines = layout("a abcdefghijklmnop b", 60.0);
    assert_eq!(texts(&lines), vec!["a", "abcdefghijklmnop", "b"]);
    assert_eq!(lines[1].width(), 96.0);
}

#[test]
fn test_paragraphs_are_indented_and_end_lines() {
    let lines = layout("intro <p>body text</p> outro", 300.0);
    assert_eq!(texts(&lines), vec!["intro", "body text", "outro"]);
    match lines[1].instructions()[0].kind() {
        // 3em at 10pt
        InstructionKind::ParagraphStart { indent } => assert_eq!(*indent, 30.0),
        other => panic!("expected a paragraph start, got {other:?}"),
    }
    assert_eq!(lines[1].width(), 30.0 + 54.0);
    assert!(lines.iter().all(|l| l.hard_break));
}

#[test]
fn test_markup_opening_with_whitespace_has_no_blank_line() {
    for algorithm in [Algorithm::Greedy, Algorithm::Optimal] {
        let options = FormatOptions {
            algorithm,
            ..courier()
        };
        let lines = layout_with("\n<p>one</p>\n<p>two</p>\n", 200.0, options).unwrap();
        assert_eq!(texts(&lines), vec!["one", "two"], "{algorithm:?}");
    }
}

#[test]
fn test_character_mode_breaks_inside_words() {
    let options = FormatOptions {
        mode: inkline::text::WrapMode::Character,
        ..courier()
    };
    let lines = layout_with("abcdefgh", 30.0, options).unwrap();
    assert_eq!(texts(&lines), vec!["abcde", "fgh"]);
}

#[test]
fn test_superscript_shrinks_and_rises() {
    let lines = layout("x<sup>2</sup>", 100.0);
    let two = lines[0]
        .instructions()
        .iter()
        .find(|i| i.as_text() == Some("2"))
        .unwrap();
    assert!((two.state().font_size - 7.0).abs() < 1e-9);
    assert!((two.state().rise - 4.0).abs() < 1e-9);
}

// ─── Drawing ────────────────────────────────────────────────────

#[test]
fn test_link_over_two_lines_has_two_rectangles() {
    let canvas = render(
        r#"see <a href="https://example.com/docs">the manual</a> now"#,
        60.0,
        courier(),
    );
    let links: Vec<_> = canvas.links().collect();
    assert_eq!(links.len(), 2, "{links:?}");
    assert!(links.iter().all(|l| l.target == "https://example.com/docs"));

    // "see the" / "manual now": the link covers "the" then "manual".
    let left = canvas.bounds().left;
    assert!((links[0].rect[0] - (left + 24.0)).abs() < 1e-9);
    assert!((links[0].rect[2] - (left + 42.0)).abs() < 1e-9);
    assert!((links[1].rect[0] - left).abs() < 1e-9);
    assert!((links[1].rect[2] - (left + 36.0)).abs() < 1e-9);
    assert!(links[1].rect[3] < links[0].rect[3]);
}

#[test]
fn test_justified_soft_lines_fill_the_width() {
    let options = FormatOptions {
        align: inkline::style::TextAlign::Justify,
        ..courier()
    };
    let lines = layout_with("aaa bbb ccc ddd eee", 70.0, options.clone()).unwrap();
    for line in lines.iter().filter(|l| !l.hard_break) {
        let padding = (70.0 - line.width()) / line.spaces() as f64;
        let filled = line.width() + line.spaces() as f64 * padding;
        assert!((filled - 70.0).abs() < 1e-9);
    }

    let canvas = render("aaa bbb ccc ddd eee", 70.0, options);
    let content = &canvas.pages()[0].content;
    assert!(content.contains("[(aaa ) -200.000 (bbb ) -200.000 (ccc)] TJ"));
    assert!(content.contains("(ddd eee) Tj"));
}

#[test]
fn test_last_line_is_not_stretched_when_input_ends_in_whitespace() {
    let options = FormatOptions {
        align: inkline::style::TextAlign::Justify,
        ..courier()
    };
    let canvas = render("aa bb cc\n", 50.0, options.clone());
    let content = &canvas.pages()[0].content;
    assert!(content.contains("(aa bb cc) Tj"), "{content}");
    assert!(!content.contains(" TJ"));

    let canvas = render("aa bb cc <br/>dd", 50.0, options);
    let content = &canvas.pages()[0].content;
    assert!(content.contains("(aa bb cc) Tj"), "{content}");
    assert_eq!(content.matches(" Tj").count(), 2);
}

#[test]
fn test_rendered_document_is_valid_pdf() {
    let canvas = render(
        "<h1>Title</h1><p>Some <b>bold</b>, <i>italic</i> and <u>underlined</u> text.</p>",
        300.0,
        FormatOptions::default(),
    );
    let bytes = canvas.to_pdf();
    assert_valid_pdf(&bytes);
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("/BaseFont /Helvetica-Bold"));
    assert!(text.contains("/BaseFont /Helvetica-Oblique"));
}

#[test]
fn test_long_text_flows_onto_more_pages() {
    let text = "word ".repeat(400);
    let canvas = render(&text, 100.0, courier());
    assert!(canvas.pages().len() > 1);
    assert!(canvas.pages().iter().all(|p| p.content.starts_with("BT\n")));
}

// ─── Custom fonts ───────────────────────────────────────────────

/// Load a system TrueType font for testing. Returns None if not available.
fn load_test_font() -> Option<Vec<u8>> {
    let paths = [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/System/Library/Fonts/Supplemental/Verdana.ttf",
        "/System/Library/Fonts/Supplemental/Andale Mono.ttf",
    ];
    for path in &paths {
        if let Ok(data) = std::fs::read(path) {
            if ttf_parser::Face::parse(&data, 0).is_ok() {
                return Some(data);
            }
        }
    }
    None
}

#[test]
fn test_custom_font_is_embedded_as_cid_font() {
    let font_data = match load_test_font() {
        Some(data) => data,
        None => {
            eprintln!("Skipping: no test TTF font found");
            return;
        }
    };
    let mut fonts = FontContext::new();
    fonts
        .registry_mut()
        .register("Test Font", inkline::style::FontStyle::Normal, &font_data);
    let registry = StyleRegistry::default();
    let options = FormatOptions {
        font_family: "Test Font".to_string(),
        ..Default::default()
    };
    let mut canvas = Canvas::default();
    let mut formatter = Formatter::new("Hi", options, &fonts, &registry).unwrap();
    formatter.paginate(&mut canvas).unwrap();

    // Text is shown as 2-byte glyph ids of the face.
    let face = ttf_parser::Face::parse(&font_data, 0).unwrap();
    let gids: Vec<u8> = "Hi"
        .chars()
        .flat_map(|ch| face.glyph_index(ch).unwrap().0.to_be_bytes())
        .collect();
    let shown = format!("({}) Tj", inkline::pdf::escape_pdf_bytes(&gids));
    assert!(canvas.pages()[0].content.contains(&shown));

    let bytes = canvas.to_pdf();
    assert_valid_pdf(&bytes);
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("/Subtype /Type0 /BaseFont /TestFont /Encoding /Identity-H"));
    assert!(text.contains("/Subtype /CIDFontType2"));
    assert!(text.contains("/CIDToGIDMap /Identity"));
    assert!(text.contains("/FontFile2"));
    assert!(text.contains("/ToUnicode"));
    assert!(!text.contains("/BaseFont /TestFont /Encoding /WinAnsiEncoding"));

    let h = face.glyph_index('H').unwrap().0;
    let advance = face.glyph_hor_advance(ttf_parser::GlyphId(h)).unwrap();
    let width = (advance as f64 * 1000.0 / face.units_per_em() as f64) as u32;
    assert!(text.contains(&format!(" {} [{}]", h, width)));
}

// ─── Options and measures ───────────────────────────────────────

#[test]
fn test_rotation_without_position_is_rejected() {
    let options = FormatOptions {
        rotate: Some(90.0),
        ..courier()
    };
    assert!(matches!(
        layout_with("x", 100.0, options),
        Err(InklineError::Usage(_))
    ));
}

#[test]
fn test_measures() {
    let eval = |m: &str, ctx: MeasureContext| evaluate_measure(&Measure::from(m), &ctx);
    assert_eq!(eval("50%", MeasureContext::default().with_relative(100.0)).unwrap(), 50.0);
    assert_eq!(eval("2em", MeasureContext::default().with_em(10.0)).unwrap(), 20.0);
    assert_eq!(eval("+5", MeasureContext::default().with_current(10.0)).unwrap(), 15.0);
    assert!(matches!(
        eval("3xyz", MeasureContext::default()),
        Err(InklineError::StyleValue { .. })
    ));
}

#[test]
fn test_custom_tags_from_json() {
    let mut registry = StyleRegistry::default();
    registry.merge(
        StyleRegistry::from_json(r#"{"tags": {"code": {"fontFamily": "Courier", "fontSize": "90%"}}}"#)
            .unwrap(),
    );
    let fonts = FontContext::new();
    let lines = inkline::layout(
        "run <code>ls</code>",
        200.0,
        &FormatOptions::default(),
        &fonts,
        &registry,
    )
    .unwrap();
    let ls = lines[0]
        .instructions()
        .iter()
        .find(|i| i.as_text() == Some("ls"))
        .unwrap();
    assert_eq!(fonts.base_font(ls.state().font), "Courier");
    assert!((ls.state().font_size - 10.8).abs() < 1e-9);
    // Built-in tags survive the merge.
    assert!(registry.get("b").is_some());
}
