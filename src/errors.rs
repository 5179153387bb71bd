//! Crate-level errors.

use thiserror::Error;

/// An error that occurs while driving the parser.
#[derive(Error, Debug, Eq, PartialEq, Copy, Clone)]
pub enum ParserError {
    #[error("Input can't be appended: the parser has already received its last chunk.")]
    InputAfterFinish,

    #[error("The parser has been stopped and no longer accepts input.")]
    Stopped,

    #[error("No script completion is pending.")]
    NotWaitingForScript,
}
