//! Lexing ahead of the committed parse position.

mod chunk;
mod worker;

pub use self::chunk::{Checkpoint, TokenChunk};
pub use self::worker::{ChunkPoll, Speculation};
