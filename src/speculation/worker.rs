//! The background lexing thread.
//!
//! The worker owns a private copy of the input stream and lexes ahead of
//! the orchestrator, shipping batches of tokens back over a bounded
//! channel. It never observes script side effects: when a script rewrites
//! the stream the orchestrator simply stops trusting (and then drops) the
//! worker. The bounded chunk channel is the backpressure mechanism that
//! caps how far ahead of the committed position the worker can run.

use super::chunk::{Checkpoint, TokenChunk};
use crate::base::BufferedInput;
use crate::html::{TagName, TextType};
use crate::parser::lexer::Lexer;
use crate::parser::tree_builder_simulator::{Feedback, TreeBuilderSimulator};
use crate::settings::ParserSettings;
use crate::token::{Token, TokenKind};
use log::trace;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TryRecvError};
use std::thread;

enum WorkerMsg {
    Input(String),
    Finish,
    Stop,
}

/// Outcome of asking for the next speculative chunk.
pub enum ChunkPoll {
    Chunk(TokenChunk),
    /// Nothing ready yet; the worker is waiting for input or still lexing.
    Empty,
    /// The worker is gone. Expected after the final chunk, fatal before it.
    Disconnected,
}

/// Handle to a running speculation worker.
///
/// Dropping the handle stops the thread.
pub struct Speculation {
    msgs: Sender<WorkerMsg>,
    chunks: Option<Receiver<TokenChunk>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Speculation {
    pub fn spawn(settings: &ParserSettings) -> io::Result<Self> {
        let pending_limit = settings.pending_token_limit.max(1);

        // The channel bound is what enforces the outstanding-token limit:
        // once this many chunks sit unclaimed, the worker blocks in `send`.
        let capacity = (settings.outstanding_token_limit / pending_limit).max(1);

        let (msg_tx, msg_rx) = mpsc::channel();
        let (chunk_tx, chunk_rx) = mpsc::sync_channel(capacity);

        let thread = thread::Builder::new()
            .name("lookahead-lexer".into())
            .spawn(move || Worker::new(pending_limit, chunk_tx, msg_rx).run())?;

        Ok(Speculation {
            msgs: msg_tx,
            chunks: Some(chunk_rx),
            thread: Some(thread),
        })
    }

    #[must_use]
    pub fn append(&self, text: &str) -> bool {
        self.msgs.send(WorkerMsg::Input(text.into())).is_ok()
    }

    #[must_use]
    pub fn finish(&self) -> bool {
        self.msgs.send(WorkerMsg::Finish).is_ok()
    }

    pub fn try_next_chunk(&self) -> ChunkPoll {
        match &self.chunks {
            Some(rx) => match rx.try_recv() {
                Ok(chunk) => ChunkPoll::Chunk(chunk),
                Err(TryRecvError::Empty) => ChunkPoll::Empty,
                Err(TryRecvError::Disconnected) => ChunkPoll::Disconnected,
            },
            None => ChunkPoll::Disconnected,
        }
    }

    /// Blocking variant, used once all input has been handed over.
    pub fn next_chunk(&self) -> ChunkPoll {
        match &self.chunks {
            Some(rx) => match rx.recv() {
                Ok(chunk) => ChunkPoll::Chunk(chunk),
                Err(_) => ChunkPoll::Disconnected,
            },
            None => ChunkPoll::Disconnected,
        }
    }
}

#[cfg(test)]
impl Speculation {
    /// Stops and joins the worker thread while keeping the handle alive.
    /// Afterwards every send on the handle fails, the way it does when the
    /// thread dies on its own.
    pub(crate) fn shut_down_worker(&mut self) {
        let _ = self.msgs.send(WorkerMsg::Stop);

        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    /// Severs the chunk channel while leaving the command channel open, so
    /// polls report the worker as gone even though sends still succeed.
    pub(crate) fn sever_chunk_channel(&mut self) {
        drop(self.chunks.take());
    }
}

impl Drop for Speculation {
    fn drop(&mut self) {
        let _ = self.msgs.send(WorkerMsg::Stop);

        // Unblocks a worker stuck in `send` on a full channel.
        drop(self.chunks.take());

        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

struct Worker {
    input: BufferedInput,
    lexer: Lexer,
    simulator: TreeBuilderSimulator,
    pending_limit: usize,
    chunks: SyncSender<TokenChunk>,
    msgs: Receiver<WorkerMsg>,
}

impl Worker {
    fn new(pending_limit: usize, chunks: SyncSender<TokenChunk>, msgs: Receiver<WorkerMsg>) -> Self {
        Worker {
            input: BufferedInput::new(),
            lexer: Lexer::new(),
            simulator: TreeBuilderSimulator::default(),
            pending_limit,
            chunks,
            msgs,
        }
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            lexer: self.lexer.snapshot(),
            simulator: self.simulator.snapshot(),
        }
    }

    fn run(mut self) {
        let mut token = Token::default();
        let mut tokens = Vec::new();
        let mut start = self.checkpoint();

        loop {
            while self.lexer.next(&self.input, &mut token) {
                let mut starts_script = false;

                match self.simulator.feedback_for_token(&token) {
                    Feedback::SwitchTextType(text_type) => self.lexer.set_text_type(text_type),
                    Feedback::ScriptStart => {
                        self.lexer.set_text_type(TextType::ScriptData);
                        starts_script = true;
                    }
                    Feedback::None => (),
                }

                let is_eof = token.kind == TokenKind::Eof;
                let ends_script = token.is_end_tag(TagName::Script);

                tokens.push(token.clone());

                if is_eof {
                    let _ = self.ship(&mut tokens, &mut start, false);
                    return;
                }

                // Chunks close at script boundaries so that the
                // orchestrator always runs a script before it validates
                // anything lexed past it.
                if (starts_script || ends_script || tokens.len() >= self.pending_limit)
                    && !self.ship(&mut tokens, &mut start, starts_script)
                {
                    return;
                }
            }

            // Out of input mid-token; wait for more.
            match self.msgs.recv() {
                Ok(WorkerMsg::Input(text)) => self.input.push(&text),
                Ok(WorkerMsg::Finish) => self.input.mark_last(),
                Ok(WorkerMsg::Stop) | Err(_) => return,
            }

            // Drain whatever else is already queued before lexing again.
            loop {
                match self.msgs.try_recv() {
                    Ok(WorkerMsg::Input(text)) => self.input.push(&text),
                    Ok(WorkerMsg::Finish) => self.input.mark_last(),
                    Ok(WorkerMsg::Stop) => return,
                    Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
                }
            }
        }
    }

    fn ship(&self, tokens: &mut Vec<Token>, start: &mut Checkpoint, starts_script: bool) -> bool {
        if tokens.is_empty() {
            return true;
        }

        let end = self.checkpoint();

        trace!(
            "shipping chunk: {} tokens, {}..{}",
            tokens.len(),
            start.pos(),
            end.pos()
        );

        let chunk = TokenChunk {
            tokens: std::mem::take(tokens),
            start: start.clone(),
            end: end.clone(),
            starts_script,
        };

        *start = end;

        self.chunks.send(chunk).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_chunks(html: &str, pending_limit: usize) -> Vec<TokenChunk> {
        let settings = ParserSettings {
            pending_token_limit: pending_limit,
            ..ParserSettings::default()
        };

        let handle = Speculation::spawn(&settings).unwrap();

        assert!(handle.append(html));
        assert!(handle.finish());

        let mut chunks = Vec::new();

        loop {
            match handle.next_chunk() {
                ChunkPoll::Chunk(chunk) => chunks.push(chunk),
                ChunkPoll::Empty | ChunkPoll::Disconnected => return chunks,
            }
        }
    }

    #[test]
    fn chunks_are_contiguous() {
        let chunks = collect_chunks("<p>a</p><p>b</p><p>c</p>", 2);

        assert!(chunks.len() > 1);

        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }

        let total: usize = chunks.iter().map(|c| c.tokens.len()).sum();

        // 9 markup tokens + EOF.
        assert_eq!(total, 10);
    }

    #[test]
    fn script_start_closes_a_chunk() {
        let chunks = collect_chunks("<p>a</p><script>f()</script><p>b</p>", 1000);
        let script_chunk = chunks.iter().find(|c| c.starts_script).unwrap();

        assert!(script_chunk.tokens.last().unwrap().is_start_tag(TagName::Script));
    }

    #[test]
    fn script_end_closes_a_chunk() {
        let chunks = collect_chunks("<script>f()</script><p>b</p>", 1000);
        let end_chunk = chunks
            .iter()
            .find(|c| {
                c.tokens
                    .last()
                    .is_some_and(|t| t.is_end_tag(TagName::Script))
            })
            .unwrap();

        assert!(!end_chunk.starts_script);
    }

    #[test]
    fn worker_survives_byte_by_byte_input() {
        let html = "<div id=a>text</div>";
        let settings = ParserSettings::default();
        let handle = Speculation::spawn(&settings).unwrap();

        for b in html.bytes() {
            assert!(handle.append(std::str::from_utf8(&[b]).unwrap()));
        }

        assert!(handle.finish());

        let mut tokens = Vec::new();

        while let ChunkPoll::Chunk(chunk) = handle.next_chunk() {
            tokens.extend(chunk.tokens);
        }

        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].name, "div");
        assert_eq!(tokens[1].text, "text");
    }

    #[test]
    fn dropping_the_handle_stops_a_blocked_worker() {
        // Tiny channel so the worker blocks in `send`.
        let settings = ParserSettings {
            outstanding_token_limit: 1,
            pending_token_limit: 1,
            ..ParserSettings::default()
        };

        let handle = Speculation::spawn(&settings).unwrap();

        assert!(handle.append(&"<p>x</p>".repeat(100)));
        assert!(handle.finish());

        // Drop without draining; `drop` joins the thread, so returning at
        // all is the assertion.
        drop(handle);
    }
}
