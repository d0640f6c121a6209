//! Rule outcomes and rule tables.
//!
//! A production either matches, declines without committing, or fails
//! hard:
//!
//! | Result | Meaning |
//! |--------|---------|
//! | `Ok(Matched(v))` | Committed and succeeded |
//! | `Ok(NotMatched)` | Shape did not fit; caller rewinds and tries the next rule |
//! | `Err(e)` | Committed and failed; propagated with `?`, no further attempts |
//!
//! Rule tables pair a trigger token with a body. Bodies are plain
//! functions so a table can be a `const` slice.

use hlslcc_diagnostic::SourceError;
use hlslcc_syntax::ast::Attribute;
use hlslcc_syntax::TokenKind;

use crate::Parser;

#[derive(Clone, Debug, PartialEq)]
#[must_use]
pub enum ParseOutcome<T> {
    Matched(T),
    NotMatched,
}

impl<T> ParseOutcome<T> {
    pub fn is_matched(&self) -> bool {
        matches!(self, ParseOutcome::Matched(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ParseOutcome<U> {
        match self {
            ParseOutcome::Matched(v) => ParseOutcome::Matched(f(v)),
            ParseOutcome::NotMatched => ParseOutcome::NotMatched,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            ParseOutcome::Matched(v) => Some(v),
            ParseOutcome::NotMatched => None,
        }
    }
}

pub type ParseResult<T> = Result<ParseOutcome<T>, SourceError>;

/// Bail out of a rule body with `NotMatched` unless the expression matched.
macro_rules! matched_or_decline {
    ($e:expr) => {
        match $e? {
            $crate::outcome::ParseOutcome::Matched(v) => v,
            $crate::outcome::ParseOutcome::NotMatched => {
                return Ok($crate::outcome::ParseOutcome::NotMatched)
            }
        }
    };
}
pub(crate) use matched_or_decline;

/// When a rule is attempted.
#[derive(Copy, Clone, Debug)]
pub enum Trigger {
    /// Always attempted.
    Any,
    /// Attempted when the current token is this variant (payload ignored).
    Token(TokenKind),
}

/// Runs before the trigger check; consumes leading attributes.
pub type PrefixFn = fn(&mut Parser<'_>) -> Result<Vec<Attribute>, SourceError>;

/// Production body; receives the attributes the prefix collected.
pub type BodyFn<T> = fn(&mut Parser<'_>, Vec<Attribute>) -> ParseResult<T>;

pub struct Rule<T> {
    pub trigger: Trigger,
    pub prefix: Option<PrefixFn>,
    pub body: BodyFn<T>,
}

impl<T> Rule<T> {
    pub const fn on(kind: TokenKind, body: BodyFn<T>) -> Self {
        Rule {
            trigger: Trigger::Token(kind),
            prefix: None,
            body,
        }
    }

    pub const fn any(body: BodyFn<T>) -> Self {
        Rule {
            trigger: Trigger::Any,
            prefix: None,
            body,
        }
    }

    pub const fn with_prefix(mut self, prefix: PrefixFn) -> Self {
        self.prefix = Some(prefix);
        self
    }

    pub(crate) fn triggered_by(&self, current: TokenKind) -> bool {
        match self.trigger {
            Trigger::Any => true,
            Trigger::Token(kind) => kind.same_variant(current),
        }
    }
}
