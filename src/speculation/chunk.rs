use crate::parser::lexer::LexerSnapshot;
use crate::parser::tree_builder_simulator::SimulatorSnapshot;
use crate::token::Token;

/// A resumable position in the logical stream: lexer state plus the
/// simulator's view of the open-element trajectory at that position.
///
/// Chunk validation is an equality check between the checkpoint a chunk
/// was lexed from and the orchestrator's ground truth.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Checkpoint {
    pub lexer: LexerSnapshot,
    pub simulator: SimulatorSnapshot,
}

impl Checkpoint {
    /// Stream position this checkpoint resumes from.
    #[inline]
    #[must_use]
    pub fn pos(&self) -> usize {
        self.lexer.pos
    }
}

/// A batch of speculatively lexed tokens.
///
/// Valid exactly when the stream state at `start` still matches ground
/// truth by the time the orchestrator gets to it; then committing it moves
/// ground truth to `end`.
#[derive(Debug)]
pub struct TokenChunk {
    pub tokens: Vec<Token>,
    pub start: Checkpoint,
    pub end: Checkpoint,
    /// The chunk ends with an opening `<script>`: everything lexed after
    /// `end` is speculation across a script the orchestrator has not run
    /// yet.
    pub starts_script: bool,
}
