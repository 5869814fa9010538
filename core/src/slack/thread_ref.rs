use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// A thread root as typed on the command line, resolved to a Slack `ts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRef {
    /// Channel taken from a permalink URL, if one was given.
    pub channel_id: Option<String>,
    pub thread_ts: String,
}

/// Accepts a permalink token (`p1737558645123456`), a dotted ts
/// (`1737558645.123456`) or a full permalink URL
/// (`https://acme.slack.com/archives/C0123/p1737558645123456`).
pub fn parse_thread_ref(input: &str) -> CoreResult<ThreadRef> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidInput(
            "thread identifier is empty".to_string(),
        ));
    }

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return parse_permalink_url(trimmed);
    }

    Ok(ThreadRef {
        channel_id: None,
        thread_ts: token_to_ts(trimmed)?,
    })
}

fn parse_permalink_url(raw: &str) -> CoreResult<ThreadRef> {
    let url = url::Url::parse(raw)
        .map_err(|e| CoreError::InvalidInput(format!("invalid permalink URL: {}", e)))?;
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let archives = segments
        .iter()
        .position(|seg| *seg == "archives")
        .ok_or_else(|| {
            CoreError::InvalidInput(format!("permalink has no /archives/ segment: {}", raw))
        })?;
    let channel = segments.get(archives + 1).ok_or_else(|| {
        CoreError::InvalidInput(format!("permalink is missing the channel: {}", raw))
    })?;
    let token = segments.get(archives + 2).ok_or_else(|| {
        CoreError::InvalidInput(format!("permalink is missing the message id: {}", raw))
    })?;

    // Reply permalinks carry the root in `thread_ts`.
    let thread_ts = match url.query_pairs().find(|(k, _)| k == "thread_ts") {
        Some((_, ts)) => token_to_ts(&ts)?,
        None => token_to_ts(token)?,
    };

    Ok(ThreadRef {
        channel_id: Some(channel.to_string()),
        thread_ts,
    })
}

const SECONDS_DIGITS: usize = 10;

fn token_to_ts(token: &str) -> CoreResult<String> {
    if let Some(digits) = token.strip_prefix('p').or_else(|| token.strip_prefix('P')) {
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(CoreError::InvalidInput(format!(
                "permalink token must be 'p' followed by digits: {}",
                token
            )));
        }
        // Up to ten digits is already whole seconds.
        if digits.len() <= SECONDS_DIGITS {
            return Ok(format!("{}.000000", digits));
        }
        let (secs, micros) = digits.split_at(digits.len() - 6);
        return Ok(format!("{}.{}", secs, micros));
    }

    let mut parts = token.splitn(2, '.');
    let secs = parts.next().unwrap_or_default();
    let frac = parts.next();
    let digits_only = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    match frac {
        Some(frac) if digits_only(secs) && digits_only(frac) => Ok(token.to_string()),
        None if digits_only(secs) => Ok(format!("{}.000000", secs)),
        _ => Err(CoreError::InvalidInput(format!(
            "unrecognised thread identifier: {}",
            token
        ))),
    }
}

/// Slack `ts` strings to epoch seconds.
pub fn ts_to_epoch(ts: &str) -> Option<f64> {
    ts.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}
