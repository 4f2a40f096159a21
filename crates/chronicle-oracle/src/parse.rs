//! Oracle reply parsing into a validated [`OracleReply`].
//!
//! The oracle returns raw text (ideally JSON). This module extracts and
//! validates the reply. Unlike transport hiccups, a malformed reply or
//! an empty narrative is a hard failure for the invocation -- the
//! pipeline abandons the cycle rather than publishing garbage events.

use chronicle_types::{OracleReply, MAX_CANDIDATE_EVENTS};
use tracing::debug;

use crate::error::OracleError;

/// Parse a raw oracle response into a validated [`OracleReply`].
///
/// Attempts multiple recovery strategies if the raw text is not clean
/// JSON:
/// 1. Direct `serde_json` deserialization
/// 2. Extract JSON from markdown code blocks
/// 3. Strip trailing commas and retry
///
/// Candidate events beyond [`MAX_CANDIDATE_EVENTS`] are discarded.
///
/// # Errors
///
/// Returns [`OracleError::Parse`] if no strategy yields valid JSON, or
/// [`OracleError::EmptyNarrative`] if the narrative is empty after
/// trimming.
pub fn parse_oracle_reply(raw: &str) -> Result<OracleReply, OracleError> {
    let mut reply = try_parse(raw)?;

    if reply.narrative.trim().is_empty() {
        return Err(OracleError::EmptyNarrative);
    }

    if reply.new_events.len() > MAX_CANDIDATE_EVENTS {
        debug!(
            proposed = reply.new_events.len(),
            kept = MAX_CANDIDATE_EVENTS,
            "oracle proposed too many events, truncating"
        );
        reply.new_events.truncate(MAX_CANDIDATE_EVENTS);
    }

    Ok(reply)
}

/// Attempt to parse the reply through multiple recovery strategies.
fn try_parse(raw: &str) -> Result<OracleReply, OracleError> {
    let trimmed = raw.trim();

    // Strategy 1: direct parse
    if let Ok(reply) = serde_json::from_str::<OracleReply>(trimmed) {
        return Ok(reply);
    }

    // Strategy 2: extract from markdown code block
    if let Some(json_str) = extract_json_from_codeblock(trimmed)
        && let Ok(reply) = serde_json::from_str::<OracleReply>(json_str)
    {
        return Ok(reply);
    }

    // Strategy 3: strip trailing commas and retry
    let cleaned = strip_trailing_commas(trimmed);
    if let Ok(reply) = serde_json::from_str::<OracleReply>(&cleaned) {
        return Ok(reply);
    }

    // Strategy 4: extract from code block then strip commas
    if let Some(json_str) = extract_json_from_codeblock(trimmed) {
        let cleaned_inner = strip_trailing_commas(json_str);
        if let Ok(reply) = serde_json::from_str::<OracleReply>(&cleaned_inner) {
            return Ok(reply);
        }
    }

    Err(OracleError::Parse(format!(
        "all parse strategies failed for: {trimmed}"
    )))
}

/// Extract the body of the first fenced code block, if any.
///
/// Handles both ```` ```json ```` and bare ```` ``` ```` fences.
fn extract_json_from_codeblock(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = text.get(start.checked_add(3)?..)?;
    // Skip an optional language tag up to the first newline.
    let body_start = after_fence.find('\n').map_or(0, |i| i.saturating_add(1));
    let body = after_fence.get(body_start..)?;
    let end = body.find("```")?;
    body.get(..end).map(str::trim)
}

/// Remove trailing commas before closing braces and brackets.
fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ',' {
            // Look ahead past whitespace for a closing brace/bracket.
            let mut lookahead = chars.clone();
            let mut next_significant = None;
            for n in lookahead.by_ref() {
                if !n.is_whitespace() {
                    next_significant = Some(n);
                    break;
                }
            }
            if matches!(next_significant, Some('}' | ']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}
