//! The parsing pipeline orchestrator.
//!
//! Owns the ground-truth view of the stream: the committed input, the
//! lexer and simulator state at the commit position, and the token filter.
//! When background parsing is on, tokens actually come from the
//! speculation worker; the orchestrator's job is then to validate each
//! chunk against ground truth before letting it through. A failed
//! validation is not an error: the chunk is discarded and parsing falls
//! back to synchronous lexing from the last committed checkpoint, which by
//! construction produces the exact token stream a purely synchronous parse
//! would have.

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "test_api")] {
        pub mod lexer;
        pub mod tree_builder_simulator;
    } else {
        pub(crate) mod lexer;
        pub(crate) mod tree_builder_simulator;
    }
}

mod source_tracker;

pub use self::source_tracker::SourceTracker;

use self::lexer::Lexer;
use self::tree_builder_simulator::{Feedback, TreeBuilderSimulator};
use crate::base::BufferedInput;
use crate::errors::ParserError;
use crate::filter::{DocumentRequest, ReflectedContentFilter, ReportSink};
use crate::html::{TagName, TextType};
use crate::settings::ParserSettings;
use crate::speculation::{ChunkPoll, Speculation, TokenChunk};
use crate::token::{Token, TokenKind};
use bitflags::bitflags;
use encoding_rs::{CoderResult, Decoder};
use log::{debug, warn};

/// Receives the committed, filtered token stream.
pub trait TokenSink {
    fn handle_token(&mut self, token: &Token);
}

/// Sink for markup a script writes at the current insertion point.
pub struct DocumentWrite<'a> {
    writes: &'a mut Vec<String>,
}

impl DocumentWrite<'_> {
    pub fn write(&mut self, markup: &str) {
        self.writes.push(markup.to_owned());
    }
}

/// Outcome of handing a parsed script to the host.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ScriptOutcome {
    Completed,
    /// The script is still running (e.g. waiting on a fetch); the parser
    /// pauses until [`Parser::script_completed`] is called.
    Pending,
}

/// Executes scripts on behalf of the parser.
///
/// Called every time a script element's content has been fully parsed,
/// with the (already filtered) script text.
pub trait ScriptHost {
    fn script_parsed(&mut self, text: &str, doc: &mut DocumentWrite<'_>) -> ScriptOutcome;
}

/// Host that executes nothing.
pub struct InertScriptHost;

impl ScriptHost for InertScriptHost {
    #[inline]
    fn script_parsed(&mut self, _text: &str, _doc: &mut DocumentWrite<'_>) -> ScriptOutcome {
        ScriptOutcome::Completed
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RunMode {
    Synchronous,
    Speculative,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ParserState {
    /// Not currently pumping; waiting for input.
    Idle,
    Running(RunMode),
    /// Paused at a script the host has not finished executing.
    WaitingForScript,
    Suspended,
    Stopped,
}

bitflags! {
    #[derive(Copy, Clone)]
    struct ParserFlags: u8 {
        const INPUT_FINISHED = 1 << 0;
        /// A script rewrote the stream; every outstanding speculative
        /// chunk is invalid even where positions happen to line up.
        const SPECULATION_DIRTY = 1 << 1;
        const EOF_EMITTED = 1 << 2;
        /// A script is still executing. Tracked separately from the state
        /// so the embedder can suspend and resume around the completion.
        const SCRIPT_PENDING = 1 << 3;
    }
}

pub struct Parser<S: TokenSink> {
    sink: S,
    script_host: Box<dyn ScriptHost>,
    report_sink: Box<dyn ReportSink>,
    decoder: Decoder,
    input: BufferedInput,
    lexer: Lexer,
    simulator: TreeBuilderSimulator,
    filter: ReflectedContentFilter,
    speculation: Option<Speculation>,
    state: ParserState,
    flags: ParserFlags,
    token: Token,
    script_text: String,
    in_script: bool,
}

impl<S: TokenSink> Parser<S> {
    pub fn new(
        sink: S,
        request: &DocumentRequest,
        settings: &ParserSettings,
        script_host: Box<dyn ScriptHost>,
        report_sink: Box<dyn ReportSink>,
    ) -> Self {
        let speculation = if settings.background_parsing_enabled {
            match Speculation::spawn(settings) {
                Ok(speculation) => Some(speculation),
                Err(err) => {
                    warn!("background lexing unavailable ({err}); parsing synchronously");
                    None
                }
            }
        } else {
            None
        };

        Parser {
            sink,
            script_host,
            report_sink,
            decoder: settings.encoding.new_decoder(),
            input: BufferedInput::new(),
            lexer: Lexer::new(),
            simulator: TreeBuilderSimulator::default(),
            filter: ReflectedContentFilter::new(settings.reflected_filter_enabled, request),
            speculation,
            state: ParserState::Idle,
            flags: ParserFlags::empty(),
            token: Token::default(),
            script_text: String::new(),
            in_script: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> ParserState {
        self.state
    }

    #[inline]
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    #[inline]
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    #[must_use]
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Appends a chunk of the document byte stream and parses as far as
    /// possible.
    pub fn append(&mut self, chunk: &[u8]) -> Result<(), ParserError> {
        self.check_accepts_input()?;

        let decoded = self.decode(chunk, false);

        self.push_input(&decoded);
        self.pump()
    }

    /// Marks the end of the stream and parses everything that remains.
    pub fn finish(&mut self) -> Result<(), ParserError> {
        self.check_accepts_input()?;

        let decoded = self.decode(&[], true);

        self.push_input(&decoded);
        self.flags.insert(ParserFlags::INPUT_FINISHED);
        self.input.mark_last();

        if let Some(speculation) = &self.speculation {
            if !speculation.finish() {
                warn!("background lexer went away; finishing synchronously");
                self.speculation = None;
            }
        }

        self.pump()
    }

    /// Resumes parsing after a pending script has finished executing.
    ///
    /// The script may finish while the parser is suspended; dispatch then
    /// stays frozen until [`Parser::resume`].
    pub fn script_completed(&mut self) -> Result<(), ParserError> {
        if self.state == ParserState::Stopped {
            return Err(ParserError::Stopped);
        }

        if !self.flags.contains(ParserFlags::SCRIPT_PENDING) {
            return Err(ParserError::NotWaitingForScript);
        }

        self.flags.remove(ParserFlags::SCRIPT_PENDING);

        if self.state == ParserState::Suspended {
            return Ok(());
        }

        self.state = ParserState::Idle;
        self.pump()
    }

    /// Pauses token dispatch until [`Parser::resume`]. A pending script is
    /// remembered across the suspension.
    pub fn suspend(&mut self) {
        if matches!(
            self.state,
            ParserState::Idle | ParserState::Running(_) | ParserState::WaitingForScript
        ) {
            self.state = ParserState::Suspended;
        }
    }

    pub fn resume(&mut self) -> Result<(), ParserError> {
        if self.state != ParserState::Suspended {
            return Ok(());
        }

        if self.flags.contains(ParserFlags::SCRIPT_PENDING) {
            self.state = ParserState::WaitingForScript;
            return Ok(());
        }

        self.state = ParserState::Idle;
        self.pump()
    }

    /// Terminally stops the parser. No further tokens are dispatched.
    pub fn stop(&mut self) {
        self.speculation = None;
        self.state = ParserState::Stopped;
    }

    fn check_accepts_input(&self) -> Result<(), ParserError> {
        if self.state == ParserState::Stopped {
            return Err(ParserError::Stopped);
        }

        if self.flags.contains(ParserFlags::INPUT_FINISHED) {
            return Err(ParserError::InputAfterFinish);
        }

        Ok(())
    }

    fn decode(&mut self, bytes: &[u8], last: bool) -> String {
        let capacity = self
            .decoder
            .max_utf8_buffer_length(bytes.len())
            .unwrap_or(bytes.len() * 3 + 16);

        let mut decoded = String::with_capacity(capacity);
        let (result, read, _) = self.decoder.decode_to_string(bytes, &mut decoded, last);

        debug_assert!(matches!(result, CoderResult::InputEmpty));
        debug_assert_eq!(read, bytes.len());

        decoded
    }

    fn push_input(&mut self, decoded: &str) {
        if decoded.is_empty() {
            return;
        }

        self.input.push(decoded);

        if let Some(speculation) = &self.speculation {
            if !speculation.append(decoded) {
                warn!("background lexer went away; falling back to synchronous parsing");
                self.speculation = None;
            }
        }
    }

    fn pump(&mut self) -> Result<(), ParserError> {
        loop {
            match self.state {
                ParserState::Suspended | ParserState::Stopped | ParserState::WaitingForScript => {
                    return Ok(());
                }
                _ => (),
            }

            if self.flags.contains(ParserFlags::EOF_EMITTED) {
                self.speculation = None;
                self.state = ParserState::Idle;
                return Ok(());
            }

            if self.speculation.is_none() {
                self.state = ParserState::Running(RunMode::Synchronous);
                self.pump_sync();

                if self.state == ParserState::Running(RunMode::Synchronous) {
                    // Out of input.
                    self.state = ParserState::Idle;
                    return Ok(());
                }

                continue;
            }

            self.state = ParserState::Running(RunMode::Speculative);

            let poll = match &self.speculation {
                Some(speculation) if self.flags.contains(ParserFlags::INPUT_FINISHED) => {
                    speculation.next_chunk()
                }
                Some(speculation) => speculation.try_next_chunk(),
                None => ChunkPoll::Disconnected,
            };

            match poll {
                ChunkPoll::Chunk(chunk) => {
                    if self.validate_chunk(&chunk) {
                        self.commit_chunk(chunk);
                    } else {
                        debug!(
                            "speculation mismatch at pos {}; reparsing synchronously",
                            self.lexer.pos()
                        );
                        self.speculation = None;
                        self.flags.remove(ParserFlags::SPECULATION_DIRTY);
                    }
                }
                ChunkPoll::Empty => {
                    self.state = ParserState::Idle;
                    return Ok(());
                }
                ChunkPoll::Disconnected => {
                    // The thread died mid-flight. Same recovery as a
                    // validation failure: relex from the committed
                    // checkpoint.
                    warn!("background lexer went away; reparsing synchronously");
                    self.speculation = None;
                    self.flags.remove(ParserFlags::SPECULATION_DIRTY);
                }
            }
        }
    }

    /// A chunk is trustworthy iff the stream state it was lexed from is
    /// byte-for-byte the committed state, and no script has rewritten the
    /// stream since it was produced.
    fn validate_chunk(&self, chunk: &TokenChunk) -> bool {
        !self.flags.contains(ParserFlags::SPECULATION_DIRTY)
            && chunk.start.lexer == self.lexer.snapshot()
            && chunk.start.simulator == self.simulator.snapshot()
    }

    fn commit_chunk(&mut self, chunk: TokenChunk) {
        debug!(
            "committing {} speculative tokens at {}..{}",
            chunk.tokens.len(),
            chunk.start.pos(),
            chunk.end.pos()
        );

        let mut ends_script = false;

        for mut token in chunk.tokens {
            // Keep the ground-truth trajectory current; the lexer state
            // comes wholesale from the end checkpoint below.
            let _ = self.simulator.feedback_for_token(&token);

            ends_script = token.is_end_tag(TagName::Script);

            self.filter_and_dispatch(&mut token);
        }

        self.lexer.restore(&chunk.end.lexer);

        // The worker closes chunks right after script end tags, so the
        // script always runs at the chunk boundary with the lexer already
        // at the correct insertion point.
        if ends_script {
            self.run_script_element();
        }
    }

    fn pump_sync(&mut self) {
        loop {
            if self.state != ParserState::Running(RunMode::Synchronous) {
                return;
            }

            let mut token = std::mem::take(&mut self.token);

            if !self.lexer.next(&self.input, &mut token) {
                self.token = token;
                return;
            }

            match self.simulator.feedback_for_token(&token) {
                Feedback::SwitchTextType(text_type) => self.lexer.set_text_type(text_type),
                Feedback::ScriptStart => self.lexer.set_text_type(TextType::ScriptData),
                Feedback::None => (),
            }

            let ends_script = token.is_end_tag(TagName::Script);
            let is_eof = token.kind == TokenKind::Eof;

            self.filter_and_dispatch(&mut token);
            self.token = token;

            if ends_script {
                self.run_script_element();
            }

            if is_eof {
                return;
            }
        }
    }

    fn filter_and_dispatch(&mut self, token: &mut Token) {
        let tracker = SourceTracker::new(&self.input);

        if let Some(report) = self.filter.filter_token(token, &tracker) {
            self.report_sink.blocked_script(report);
        }

        match token.kind {
            TokenKind::StartTag if token.is_start_tag(TagName::Script) => {
                self.in_script = true;
                self.script_text.clear();
            }
            TokenKind::Character if self.in_script => {
                self.script_text.push_str(&token.text);
            }
            TokenKind::EndTag if token.is_end_tag(TagName::Script) => {
                self.in_script = false;
            }
            TokenKind::Eof => {
                self.flags.insert(ParserFlags::EOF_EMITTED);
            }
            _ => (),
        }

        self.sink.handle_token(token);
    }

    fn run_script_element(&mut self) {
        let text = std::mem::take(&mut self.script_text);
        let mut writes = Vec::new();

        let outcome = self
            .script_host
            .script_parsed(&text, &mut DocumentWrite { writes: &mut writes });

        let written = writes.concat();

        if !written.is_empty() {
            debug!(
                "script wrote {} bytes at pos {}",
                written.len(),
                self.lexer.pos()
            );

            self.input.splice(self.lexer.pos(), &written);

            if self.speculation.is_some() {
                self.flags.insert(ParserFlags::SPECULATION_DIRTY);
            }
        }

        if outcome == ScriptOutcome::Pending {
            self.flags.insert(ParserFlags::SCRIPT_PENDING);
            self.state = ParserState::WaitingForScript;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::NoopReportSink;

    #[derive(Default)]
    struct Collect(Vec<Token>);

    impl TokenSink for Collect {
        fn handle_token(&mut self, token: &Token) {
            self.0.push(token.clone());
        }
    }

    fn new_parser() -> Parser<Collect> {
        Parser::new(
            Collect::default(),
            &DocumentRequest::default(),
            &ParserSettings::default(),
            Box::new(InertScriptHost),
            Box::new(NoopReportSink),
        )
    }

    fn texts(parser: &Parser<Collect>) -> Vec<String> {
        parser
            .sink()
            .0
            .iter()
            .filter(|t| t.kind == TokenKind::Character)
            .map(|t| t.text.clone())
            .collect()
    }

    #[test]
    fn dead_worker_at_finish_falls_back_to_synchronous_parsing() {
        let mut parser = new_parser();

        parser.append(b"<p>a</p>").unwrap();

        if let Some(speculation) = parser.speculation.as_mut() {
            speculation.shut_down_worker();
        }

        parser.finish().unwrap();

        assert!(parser.speculation.is_none());
        assert_eq!(texts(&parser), ["a"]);
        assert_eq!(parser.sink().0.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn dead_worker_mid_stream_falls_back_to_synchronous_parsing() {
        let mut parser = new_parser();

        parser.append(b"<p>a</p>").unwrap();

        if let Some(speculation) = parser.speculation.as_mut() {
            speculation.shut_down_worker();
        }

        parser.append(b"<p>b</p>").unwrap();

        assert!(parser.speculation.is_none());

        parser.finish().unwrap();

        assert_eq!(texts(&parser), ["a", "b"]);
    }

    #[test]
    fn chunk_channel_loss_falls_back_to_synchronous_parsing() {
        let mut parser = new_parser();

        if let Some(speculation) = parser.speculation.as_mut() {
            speculation.sever_chunk_channel();
        }

        parser.append(b"<p>a</p><p>b</p>").unwrap();

        assert!(parser.speculation.is_none());

        parser.finish().unwrap();

        assert_eq!(texts(&parser), ["a", "b"]);
        assert_eq!(parser.sink().0.last().unwrap().kind, TokenKind::Eof);
    }
}
