//! Structured error types for the inkline layout pipeline.
//!
//! Every stage fails fast: the scanner, the parser, style resolution and
//! option validation each surface a typed variant and nothing is retried.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, InklineError>;

/// What went wrong with tag nesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestingErrorKind {
    /// The tag has no entry in the style registry.
    UnknownTag,
    /// A close tag did not match the innermost open tag.
    Mismatched,
    /// A close tag arrived while no tag was open.
    NothingOpen,
    /// Input ended with tags still open.
    Unclosed,
}

impl std::fmt::Display for NestingErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            NestingErrorKind::UnknownTag => "unknown tag",
            NestingErrorKind::Mismatched => "mismatched closing tag",
            NestingErrorKind::NothingOpen => "closing tag with nothing open",
            NestingErrorKind::Unclosed => "unclosed tag",
        };
        f.write_str(text)
    }
}

/// The unified error type returned by all public inkline functions.
#[derive(Error, Debug)]
pub enum InklineError {
    /// Malformed markup: bad tag syntax, unterminated quoting, bad entity.
    #[error("{message} at {position} -> {context}...")]
    Scan {
        message: String,
        /// Byte offset into the markup.
        position: usize,
        /// Debug-quoted snippet of the input following `position`.
        context: String,
    },

    /// Tags that are unregistered or do not nest.
    #[error("{kind} <{tag}> at {position}")]
    TagNesting {
        kind: NestingErrorKind,
        tag: String,
        position: usize,
    },

    /// A style attribute that cannot be resolved to a concrete value.
    #[error("invalid value {value:?} for {property}: {reason}")]
    StyleValue {
        property: String,
        value: String,
        reason: String,
    },

    /// Options that make no sense together, rejected before layout.
    #[error("usage error: {0}")]
    Usage(String),

    /// A style table or option set failed to deserialize.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl InklineError {
    pub(crate) fn style_value(
        property: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        InklineError::StyleValue {
            property: property.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}
