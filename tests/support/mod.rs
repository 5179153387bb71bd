#![allow(dead_code)]

use lookahead_html::{
    BlockedScriptReport, DocumentRequest, DocumentWrite, Parser, ParserSettings, ParserState,
    ReportSink, ScriptHost, ScriptOutcome, Token, TokenSink,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct TokenCollector(pub Vec<Token>);

impl TokenSink for TokenCollector {
    fn handle_token(&mut self, token: &Token) {
        self.0.push(token.clone());
    }
}

pub struct SharedReports(pub Arc<Mutex<Vec<BlockedScriptReport>>>);

impl ReportSink for SharedReports {
    fn blocked_script(&mut self, report: BlockedScriptReport) {
        self.0.lock().unwrap().push(report);
    }
}

/// What a scripted host does for each successive script element.
#[derive(Clone)]
pub enum ScriptAction {
    Run,
    Write(&'static str),
    Pend,
}

/// Host driven by a fixed list of actions; records every script text it
/// was handed.
pub struct ScriptedHost {
    actions: VecDeque<ScriptAction>,
    pub seen: Arc<Mutex<Vec<String>>>,
}

impl ScriptedHost {
    pub fn new(actions: &[ScriptAction]) -> (Self, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let host = ScriptedHost {
            actions: actions.iter().cloned().collect(),
            seen: Arc::clone(&seen),
        };

        (host, seen)
    }
}

impl ScriptHost for ScriptedHost {
    fn script_parsed(&mut self, text: &str, doc: &mut DocumentWrite<'_>) -> ScriptOutcome {
        self.seen.lock().unwrap().push(text.to_owned());

        match self.actions.pop_front() {
            Some(ScriptAction::Write(markup)) => {
                doc.write(markup);
                ScriptOutcome::Completed
            }
            Some(ScriptAction::Pend) => ScriptOutcome::Pending,
            Some(ScriptAction::Run) | None => ScriptOutcome::Completed,
        }
    }
}

pub struct Collected {
    pub tokens: Vec<Token>,
    pub reports: Vec<BlockedScriptReport>,
}

/// Feeds `html` in `chunk_size`-byte pieces and drives the parser to
/// completion, completing pending scripts as they come up.
pub fn parse_chunked(
    html: &str,
    chunk_size: usize,
    request: &DocumentRequest,
    settings: &ParserSettings,
    host: Box<dyn ScriptHost>,
) -> Collected {
    let reports = Arc::new(Mutex::new(Vec::new()));
    let mut parser = Parser::new(
        TokenCollector::default(),
        request,
        settings,
        host,
        Box::new(SharedReports(Arc::clone(&reports))),
    );

    for chunk in html.as_bytes().chunks(chunk_size.max(1)) {
        parser.append(chunk).unwrap();

        while parser.state() == ParserState::WaitingForScript {
            parser.script_completed().unwrap();
        }
    }

    parser.finish().unwrap();

    while parser.state() == ParserState::WaitingForScript {
        parser.script_completed().unwrap();
    }

    let tokens = parser.into_sink().0;
    let reports = reports.lock().unwrap().clone();

    Collected { tokens, reports }
}

pub fn parse(html: &str, request: &DocumentRequest, settings: &ParserSettings) -> Collected {
    parse_chunked(
        html,
        html.len().max(1),
        request,
        settings,
        Box::new(lookahead_html::InertScriptHost),
    )
}

pub fn settings(background: bool) -> ParserSettings {
    ParserSettings {
        background_parsing_enabled: background,
        ..ParserSettings::default()
    }
}

pub fn request_with_url(url: &str) -> DocumentRequest {
    DocumentRequest {
        url: url.into(),
        ..DocumentRequest::default()
    }
}

pub fn plain_request() -> DocumentRequest {
    DocumentRequest::default()
}
