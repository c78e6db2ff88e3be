//! The compiler's error taxonomy (§6.1, §7).
//!
//! `CompileError` is a plain enum with a hand-written `Display`, matching
//! `rexc-base::SpannedError`'s style rather than pulling in `thiserror`
//! (the teacher carries neither `thiserror` nor `anyhow` anywhere in its
//! workspace). Every variant's `Display` output is one of the literal
//! message strings from §6.1 so the testable message catalogue survives
//! verbatim; downstream callers that want the span separately can match on
//! the variant.

use rexc_base::Span;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    NothingToRepeat(Span),
    MinGreaterThanMax(Span),
    RepeatCountTooBig(Span),
    MissingDelimiter { delimiter: &'static str, span: Span },
    BadGroupName(Span),
    UnknownGroup(Span),
    DuplicateGroup(Span),
    OpenGroupBackref(Span),
    BadEscape(Span),
    BadHexEscape(Span),
    BadOctalEscape(Span),
    BadSet(Span),
    BadCharacterRange(Span),
    UndefinedCharacterName(Span),
    UnknownProperty(Span),
    UnknownPropertyValue(Span),
    UnknownExtension(Span),
    BadInlineFlags(Span),
    CantTurnFlagsOff(Span),
    TrailingCharacters(Span),
}

impl CompileError {
    pub fn span(&self) -> Span {
        match self {
            CompileError::NothingToRepeat(s)
            | CompileError::MinGreaterThanMax(s)
            | CompileError::RepeatCountTooBig(s)
            | CompileError::MissingDelimiter { span: s, .. }
            | CompileError::BadGroupName(s)
            | CompileError::UnknownGroup(s)
            | CompileError::DuplicateGroup(s)
            | CompileError::OpenGroupBackref(s)
            | CompileError::BadEscape(s)
            | CompileError::BadHexEscape(s)
            | CompileError::BadOctalEscape(s)
            | CompileError::BadSet(s)
            | CompileError::BadCharacterRange(s)
            | CompileError::UndefinedCharacterName(s)
            | CompileError::UnknownProperty(s)
            | CompileError::UnknownPropertyValue(s)
            | CompileError::UnknownExtension(s)
            | CompileError::BadInlineFlags(s)
            | CompileError::CantTurnFlagsOff(s)
            | CompileError::TrailingCharacters(s) => *s,
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            CompileError::NothingToRepeat(_) => "nothing to repeat".to_string(),
            CompileError::MinGreaterThanMax(_) => "min repeat greater than max repeat".to_string(),
            CompileError::RepeatCountTooBig(_) => "repeat count too big".to_string(),
            CompileError::MissingDelimiter { delimiter, .. } => format!("missing {delimiter}"),
            CompileError::BadGroupName(_) => "bad group name".to_string(),
            CompileError::UnknownGroup(_) => "unknown group".to_string(),
            CompileError::DuplicateGroup(_) => "duplicate group".to_string(),
            CompileError::OpenGroupBackref(_) => "can't refer to an open group".to_string(),
            CompileError::BadEscape(_) => "bad escape".to_string(),
            CompileError::BadHexEscape(_) => "bad hex escape".to_string(),
            CompileError::BadOctalEscape(_) => "bad octal escape".to_string(),
            CompileError::BadSet(_) => "bad set".to_string(),
            CompileError::BadCharacterRange(_) => "bad character range".to_string(),
            CompileError::UndefinedCharacterName(_) => "undefined character name".to_string(),
            CompileError::UnknownProperty(_) => "unknown property".to_string(),
            CompileError::UnknownPropertyValue(_) => "unknown property value".to_string(),
            CompileError::UnknownExtension(_) => "unknown extension".to_string(),
            CompileError::BadInlineFlags(_) => "bad inline flags".to_string(),
            CompileError::CantTurnFlagsOff(_) => "bad inline flags: can't turn flags off".to_string(),
            CompileError::TrailingCharacters(_) => "trailing characters in pattern".to_string(),
        };
        let span = self.span();
        write!(f, "{message} at {}..{}", span.start, span.end)
    }
}

impl std::error::Error for CompileError {}

pub type Result<T> = std::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_contract_message() {
        let err = CompileError::NothingToRepeat(Span::new(3, 4));
        assert_eq!(err.to_string(), "nothing to repeat at 3..4");
    }

    #[test]
    fn missing_delimiter_interpolates_literal() {
        let err = CompileError::MissingDelimiter {
            delimiter: ")",
            span: Span::new(0, 1),
        };
        assert_eq!(err.to_string(), "missing ) at 0..1");
    }

    #[test]
    fn cant_turn_flags_off_uses_compound_message() {
        let err = CompileError::CantTurnFlagsOff(Span::new(0, 2));
        assert_eq!(err.to_string(), "bad inline flags: can't turn flags off at 0..2");
    }
}
