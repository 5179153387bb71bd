/// Details of the first neutralized script in a document.
///
/// Emitted at most once per document, when the filter first rewrites a
/// token. Consumers typically log it, surface it in devtools, or post it
/// to `report_url`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockedScriptReport {
    pub document_url: String,
    /// The effective disposition was `Block`: the embedder should stop
    /// trusting the page, not just the one token.
    pub blocked_entire_page: bool,
    pub header_was_valid: bool,
    pub directive_was_valid: bool,
    pub report_url: Option<String>,
}

/// Where blocked-script reports go.
pub trait ReportSink {
    fn blocked_script(&mut self, report: BlockedScriptReport);
}

/// Discards reports; the default when the embedder does not care.
pub struct NoopReportSink;

impl ReportSink for NoopReportSink {
    #[inline]
    fn blocked_script(&mut self, _report: BlockedScriptReport) {}
}
