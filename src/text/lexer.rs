//! Markup scanner.
//!
//! Splits marked-up text into [`Token`]s: text runs, opening tags with their
//! attributes, and closing tags. Text is pre-segmented into the runs the
//! line breaker cares about (hyphens, dashes, whitespace, words) so break
//! opportunities are decided here and nowhere else.

use std::collections::BTreeMap;

use crate::error::{InklineError, Result};

const EM_DASH: char = '\u{2014}';
const EN_DASH: char = '\u{2013}';

/// Length of the input snippet quoted in scan errors.
const CONTEXT_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Consecutive text runs. Each run is a word, a hyphen run, a dash run
    /// or a single `" "` standing in for a whole whitespace run.
    Text(Vec<String>),
    Open {
        tag: String,
        options: BTreeMap<String, String>,
    },
    Close {
        tag: String,
    },
}

/// Pull-based scanner over a markup string.
///
/// Iteration stops after the first error; a scanner can only be restarted
/// by building a new one over the same input.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    /// Set by `<tag/>`; the matching close is returned by the next call.
    pending_close: Option<String>,
    failed: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            pending_close: None,
            failed: false,
        }
    }

    /// Byte offset of the next unread character.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pending_close.is_none() && self.pos >= self.input.len()
    }

    pub fn next_token(&mut self) -> Result<Option<Token>> {
        if let Some(tag) = self.pending_close.take() {
            return Ok(Some(Token::Close { tag }));
        }
        let Some(ch) = self.peek() else {
            return Ok(None);
        };

        let token = match ch {
            '<' => {
                self.bump();
                if self.eat('/') {
                    self.scan_end_tag()?
                } else {
                    self.scan_open_tag()?
                }
            }
            '&' => {
                self.bump();
                self.scan_entity()?
            }
            _ => self.scan_text(),
        };
        Ok(Some(token))
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn skip_space(&mut self) {
        self.eat_while(is_space);
    }

    fn error(&self, message: impl Into<String>) -> InklineError {
        let context: String = format!("{:?}", self.rest()).chars().take(CONTEXT_LEN).collect();
        InklineError::Scan {
            message: message.into(),
            position: self.pos,
            context,
        }
    }

    fn scan_text(&mut self) -> Token {
        let mut pieces = Vec::new();
        while let Some(ch) = self.peek() {
            let piece = match ch {
                '<' | '&' => break,
                '-' => self.eat_while(|c| c == '-').to_string(),
                EM_DASH | EN_DASH => self.eat_while(is_dash).to_string(),
                c if is_space(c) => {
                    self.skip_space();
                    " ".to_string()
                }
                _ => self
                    .eat_while(|c| !(c == '<' || c == '&' || c == '-' || is_dash(c) || is_space(c)))
                    .to_string(),
            };
            pieces.push(piece);
        }
        Token::Text(pieces)
    }

    fn scan_entity(&mut self) -> Result<Token> {
        let start = self.pos;
        if self.eat('#') {
            self.eat('x');
        }
        let name_len = self.eat_while(is_word).len();
        if name_len == 0 {
            return Err(self.error("bad format for entity"));
        }
        let entity = &self.input[start..self.pos];
        if !self.eat(';') {
            return Err(self.error("missing semicolon to terminate entity"));
        }

        let decoded = match decode_entity(entity) {
            Some(text) => text,
            None => {
                self.pos = start;
                return Err(self.error(format!("unrecognized entity {entity:?}")));
            }
        };
        Ok(Token::Text(vec![decoded]))
    }

    fn scan_open_tag(&mut self) -> Result<Token> {
        let tag = self.eat_while(is_word).to_ascii_lowercase();
        if tag.is_empty() {
            return Err(self.error("'<' without valid tag"));
        }

        let mut options = BTreeMap::new();
        self.skip_space();
        while self.peek().is_some_and(is_word) {
            let name = self.eat_while(is_word).to_ascii_lowercase();
            self.skip_space();
            if !self.eat('=') {
                return Err(self.error(format!("expected assignment after option {name}")));
            }
            self.skip_space();

            let value = match self.peek() {
                Some(delim @ ('"' | '\'')) => {
                    self.bump();
                    let value = self.eat_while(|c| c != delim).to_string();
                    if !self.eat(delim) {
                        return Err(self.error(format!("expected option value to end with {delim}")));
                    }
                    value
                }
                _ => self.eat_while(|c| !is_space(c) && c != '>').to_string(),
            };
            options.insert(name, value);
            self.skip_space();
        }

        let self_closing = self.eat('/');
        if !self.eat('>') {
            return Err(self.error(format!("unclosed tag {tag:?}")));
        }
        if self_closing {
            self.pending_close = Some(tag.clone());
        }

        Ok(Token::Open { tag, options })
    }

    fn scan_end_tag(&mut self) -> Result<Token> {
        let tag = self.eat_while(is_word).to_ascii_lowercase();
        if tag.is_empty() {
            return Err(self.error("'</' without valid tag"));
        }
        self.skip_space();
        if !self.eat('>') {
            return Err(self.error(format!("unclosed ending tag {tag:?}")));
        }
        Ok(Token::Close { tag })
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_token() {
            Ok(token) => token.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

fn decode_entity(entity: &str) -> Option<String> {
    if let Some(numeric) = entity.strip_prefix('#') {
        let hex = numeric
            .strip_prefix('x')
            .or_else(|| numeric.strip_prefix('X'));
        let code = match hex {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }

    let text = match entity {
        "lt" => "<",
        "gt" => ">",
        "amp" => "&",
        "quot" => "\"",
        "apos" => "'",
        "mdash" => "\u{2014}",
        "ndash" => "\u{2013}",
        "nbsp" => "\u{00A0}",
        "hellip" => "\u{2026}",
        "copy" => "\u{00A9}",
        _ => return None,
    };
    Some(text.to_string())
}

fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Whitespace in the markup sense: ASCII blanks, tabs and line breaks.
/// A no-break space is ordinary text.
pub(crate) fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c')
}

fn is_dash(c: char) -> bool {
    c == EM_DASH || c == EN_DASH
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        Lexer::new(input).collect::<Result<Vec<_>>>().unwrap()
    }

    fn text(pieces: &[&str]) -> Token {
        Token::Text(pieces.iter().map(|s| s.to_string()).collect())
    }

    fn decoded(input: &str) -> String {
        tokens(input)
            .into_iter()
            .map(|t| match t {
                Token::Text(pieces) => pieces.concat(),
                other => panic!("unexpected token {other:?}"),
            })
            .collect()
    }

    #[test]
    fn segments_text_runs() {
        assert_eq!(
            tokens("well-known \u{2014}\u{2014} fact"),
            vec![text(&["well", "-", "known", " ", "\u{2014}\u{2014}", " ", "fact"])]
        );
    }

    #[test]
    fn collapses_whitespace_runs() {
        assert_eq!(tokens("a   b\n\tc"), vec![text(&["a", " ", "b", " ", "c"])]);
    }

    #[test]
    fn decodes_entities() {
        assert_eq!(decoded("&amp;&lt;&gt;&#65;&#x42;"), "&<>AB");
        assert_eq!(decoded("&#X43;&#x2014;"), "C\u{2014}");
    }

    #[test]
    fn nbsp_does_not_split_words() {
        assert_eq!(tokens("a\u{00A0}b"), vec![text(&["a\u{00A0}b"])]);
    }

    #[test]
    fn scans_tags_with_options() {
        let toks = tokens("<A HREF=\"#top\" title='Go up' name=x>up</a>");
        let mut options = BTreeMap::new();
        options.insert("href".to_string(), "#top".to_string());
        options.insert("title".to_string(), "Go up".to_string());
        options.insert("name".to_string(), "x".to_string());
        assert_eq!(
            toks,
            vec![
                Token::Open {
                    tag: "a".to_string(),
                    options
                },
                text(&["up"]),
                Token::Close {
                    tag: "a".to_string()
                },
            ]
        );
    }

    #[test]
    fn self_closing_tag_emits_open_then_close() {
        let toks = tokens("x<br/>y");
        assert_eq!(toks.len(), 4);
        assert!(matches!(&toks[1], Token::Open { tag, .. } if tag == "br"));
        assert!(matches!(&toks[2], Token::Close { tag } if tag == "br"));
    }

    #[test]
    fn scan_errors_carry_position_and_context() {
        let err = Lexer::new("ab<b").collect::<Result<Vec<_>>>().unwrap_err();
        match err {
            InklineError::Scan {
                message, position, ..
            } => {
                assert_eq!(message, "unclosed tag \"b\"");
                assert_eq!(position, 4);
            }
            other => panic!("expected scan error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_markup_is_rejected() {
        for input in [
            "< b>",
            "</>",
            "<a href=\"x>",
            "<a href>",
            "</b",
            "&;",
            "&amp",
            "&bogus;",
            "&#xZZ;",
        ] {
            let result = Lexer::new(input).collect::<Result<Vec<_>>>();
            assert!(
                matches!(result, Err(InklineError::Scan { .. })),
                "{input:?} should fail to scan, got {result:?}"
            );
        }
    }

    #[test]
    fn iteration_stops_after_an_error() {
        let mut lexer = Lexer::new("&bogus; more text");
        assert!(matches!(lexer.next(), Some(Err(_))));
        assert!(lexer.next().is_none());
    }
}
