use encoding_rs::{Encoding, UTF_8};

/// Tuning knobs for a parsing session.
#[derive(Clone, Debug)]
pub struct ParserSettings {
    /// Encoding of the incoming byte stream.
    pub encoding: &'static Encoding,

    /// Lex ahead on a background thread while the main thread is busy
    /// (usually: while a script runs). When disabled every token is
    /// produced synchronously.
    pub background_parsing_enabled: bool,

    /// Upper bound on tokens lexed ahead but not yet committed. The
    /// background thread blocks once the bound is reached.
    pub outstanding_token_limit: usize,

    /// How many tokens a speculative chunk may carry before it is closed
    /// and shipped. Smaller chunks commit sooner; larger ones amortize
    /// channel traffic better.
    pub pending_token_limit: usize,

    /// Run the reflected-content filter over the committed token stream.
    pub reflected_filter_enabled: bool,
}

impl Default for ParserSettings {
    fn default() -> Self {
        ParserSettings {
            encoding: UTF_8,
            background_parsing_enabled: true,
            outstanding_token_limit: 10_000,
            pending_token_limit: 1_000,
            reflected_filter_enabled: true,
        }
    }
}