//! Error types for the OráculoScript pipeline.
//!
//! Errors fall into two families:
//!
//! - **Front end** ([`LexError`], [`SyntaxError`]): returned from
//!   [`tokenize`](crate::lexer::tokenize) and [`parse`](crate::parser::parse).
//!   They never touch an evaluator.
//! - **Evaluation** ([`EvalError`]): name/type/internal failures are raised
//!   while a program runs and are reported inside the run's console log;
//!   the remaining variants are returned from the evaluator's API calls.

use thiserror::Error;

/// An input character that matches no token pattern.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unexpected character '{ch}' at line {line}, column {column}")]
pub struct LexError {
    /// The offending character.
    pub ch: char,
    /// 1-based line of the character.
    pub line: usize,
    /// 1-based column of the character.
    pub column: usize,
}

/// A grammar violation (or a lexical one surfaced through [`parse`](crate::parser::parse)).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at line {line}, column {column}")]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl From<LexError> for SyntaxError {
    fn from(e: LexError) -> Self {
        SyntaxError {
            message: format!("unexpected character '{}'", e.ch),
            line: e.line,
            column: e.column,
        }
    }
}

/// Errors produced by the evaluator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    /// A name was not bound anywhere in the scope chain.
    #[error("NameError: '{0}' is not defined")]
    Name(String),

    /// A value had the wrong type for the operation (loop bounds, collections, arguments).
    #[error("TypeError: {0}")]
    Type(String),

    /// An evaluator invariant was broken. Indicates a bug, not a script error.
    #[error("RuntimeError: {0}")]
    Internal(String),

    /// `submit_input` was called while no input was pending.
    #[error("no input is pending")]
    NotSuspended,

    /// An operation needed a program but none was attached.
    #[error("no program loaded")]
    NoProgram,

    /// `trigger_event` was called with an id that was never registered.
    #[error("event handler '{0}' not found")]
    EventNotFound(String),
}

/// Result alias for evaluator operations.
pub type EvalResult<T> = Result<T, EvalError>;
