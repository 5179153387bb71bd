//! Filtering policy signals and their combination.
//!
//! Two independent signals may configure the filter: a response header sent
//! by the server and an in-document policy directive. Either may be absent
//! or malformed; the combination rule is deliberately conservative.

use log::warn;

/// What to do when reflected script is detected, from most to least
/// permissive. The derived ordering is what [`effective_disposition`]
/// relies on.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum FilterDisposition {
    /// Detection disabled for this document.
    Allow,
    /// Neutralize the offending token, keep parsing.
    Filter,
    /// Neutralize and treat the whole page as untrusted.
    Block,
}

/// Outcome of parsing one policy signal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedDirective {
    pub disposition: FilterDisposition,
    pub report_url: Option<String>,
    /// Malformed input still produces a directive (the fail-safe default),
    /// but is remembered as invalid for reporting.
    pub valid: bool,
}

impl ParsedDirective {
    fn invalid() -> Self {
        ParsedDirective {
            disposition: FilterDisposition::Filter,
            report_url: None,
            valid: false,
        }
    }
}

/// Parses a protection header value.
///
/// Grammar: `0` disables filtering, `1` enables it, and `1` may be followed
/// by `; mode=block` and/or `; report=<url>`. Anything else is malformed
/// and falls back to [`FilterDisposition::Filter`].
pub fn parse_directive(value: &str) -> ParsedDirective {
    let mut disposition = None;
    let mut report_url = None;

    for (i, part) in value.split(';').enumerate() {
        let part = part.trim();

        if i == 0 {
            disposition = match part {
                "0" => Some(FilterDisposition::Allow),
                "1" => Some(FilterDisposition::Filter),
                _ => {
                    warn!("malformed protection directive: {value:?}");
                    return ParsedDirective::invalid();
                }
            };

            continue;
        }

        if part.is_empty() {
            continue;
        }

        let lowered = part.to_ascii_lowercase();

        if lowered == "mode=block" {
            if disposition != Some(FilterDisposition::Filter) {
                warn!("mode=block is only meaningful with an enabling directive: {value:?}");
                return ParsedDirective::invalid();
            }

            disposition = Some(FilterDisposition::Block);
        } else if let Some(url) = part
            .strip_prefix("report=")
            .or_else(|| part.strip_prefix("Report="))
        {
            report_url = Some(url.to_owned());
        } else {
            warn!("unrecognized protection directive parameter: {part:?}");
            return ParsedDirective::invalid();
        }
    }

    match disposition {
        Some(disposition) => ParsedDirective {
            disposition,
            report_url,
            valid: true,
        },
        None => ParsedDirective::invalid(),
    }
}

/// Combines the header and in-document signals.
///
/// With no signal at all the filter runs in its default mode; when signals
/// are present the most restrictive one wins. A document can therefore
/// tighten but never loosen what the server asked for.
#[must_use]
pub fn effective_disposition(
    header: Option<&ParsedDirective>,
    directive: Option<&ParsedDirective>,
) -> FilterDisposition {
    match (header, directive) {
        (None, None) => FilterDisposition::Filter,
        (Some(h), None) => h.disposition,
        (None, Some(d)) => d.disposition,
        (Some(h), Some(d)) => h.disposition.max(d.disposition),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_values() {
        assert_eq!(parse_directive("0").disposition, FilterDisposition::Allow);
        assert_eq!(parse_directive("1").disposition, FilterDisposition::Filter);
        assert_eq!(
            parse_directive("1; mode=block").disposition,
            FilterDisposition::Block
        );
        assert!(parse_directive("1; mode=block").valid);
    }

    #[test]
    fn report_url_is_captured() {
        let parsed = parse_directive("1; report=/violations");

        assert_eq!(parsed.disposition, FilterDisposition::Filter);
        assert_eq!(parsed.report_url.as_deref(), Some("/violations"));
    }

    #[test]
    fn malformed_values_fail_safe() {
        for value in ["", "2", "yes", "1; mode=bloc", "0; mode=block", "1 1"] {
            let parsed = parse_directive(value);

            assert!(!parsed.valid, "expected {value:?} to be invalid");
            assert_eq!(parsed.disposition, FilterDisposition::Filter);
        }
    }

    #[test]
    fn most_restrictive_signal_wins() {
        let allow = parse_directive("0");
        let block = parse_directive("1; mode=block");

        assert_eq!(effective_disposition(None, None), FilterDisposition::Filter);
        assert_eq!(
            effective_disposition(Some(&allow), None),
            FilterDisposition::Allow
        );
        assert_eq!(
            effective_disposition(Some(&allow), Some(&block)),
            FilterDisposition::Block
        );
    }
}
