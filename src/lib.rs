//! Streaming HTML parsing pipeline with speculative background lexing and
//! a reflected-content (XSS) filter.
//!
//! The pipeline lexes markup into tokens on a background thread while the
//! main thread is busy (typically: executing a script), validates each
//! speculative batch against the committed stream state, and falls back to
//! synchronous lexing whenever a script invalidates the lookahead. The
//! committed token stream is observationally identical to a fully
//! synchronous parse. Before tokens reach the sink, the filter compares
//! them against the request that produced the document and neutralizes
//! markup that looks like reflected script injection.
//!
//! # Example
//!
//! ```
//! use lookahead_html::{
//!     DocumentRequest, InertScriptHost, NoopReportSink, Parser, ParserSettings, Token, TokenSink,
//! };
//!
//! struct Collector(Vec<Token>);
//!
//! impl TokenSink for Collector {
//!     fn handle_token(&mut self, token: &Token) {
//!         self.0.push(token.clone());
//!     }
//! }
//!
//! let request = DocumentRequest {
//!     url: "http://example.com/".into(),
//!     ..DocumentRequest::default()
//! };
//!
//! let mut parser = Parser::new(
//!     Collector(Vec::new()),
//!     &request,
//!     &ParserSettings::default(),
//!     Box::new(InertScriptHost),
//!     Box::new(NoopReportSink),
//! );
//!
//! parser.append(b"<p>Hello!</p>").unwrap();
//! parser.finish().unwrap();
//!
//! let tokens = parser.into_sink().0;
//!
//! assert_eq!(tokens[1].text, "Hello!");
//! ```

use cfg_if::cfg_if;

mod base;
mod errors;
mod html;
mod settings;
mod token;

pub mod filter;
pub mod parser;

cfg_if! {
    if #[cfg(feature = "test_api")] {
        pub mod speculation;
    } else {
        pub(crate) mod speculation;
    }
}

pub use self::base::{BufferedInput, Range};
pub use self::errors::ParserError;
pub use self::filter::{
    BlockedScriptReport, DocumentRequest, FilterDisposition, NoopReportSink,
    ReflectedContentFilter, ReportSink,
};
pub use self::html::{TagName, TextType};
pub use self::parser::{
    DocumentWrite, InertScriptHost, Parser, ParserState, RunMode, ScriptHost, ScriptOutcome,
    SourceTracker, TokenSink,
};
pub use self::settings::ParserSettings;
pub use self::token::{Attribute, Token, TokenKind};
