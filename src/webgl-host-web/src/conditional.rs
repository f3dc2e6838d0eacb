//! Conditional GET support for disk-served assets
//!
//! Every file response carries a weak ETag derived from size and mtime plus
//! a `Last-Modified` date. A request whose validators still match is
//! answered with `304 Not Modified` instead of the body.

use axum::http::{header, HeaderMap, HeaderValue};
use std::fs::Metadata;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Cache validators for one file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validators {
    etag: String,
    /// Truncated to whole seconds, the resolution of HTTP dates
    last_modified: SystemTime,
}

impl Validators {
    pub fn new(size: u64, modified: SystemTime) -> Self {
        let secs = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Self {
            etag: format!("W/\"{:x}-{:x}\"", size, secs),
            last_modified: UNIX_EPOCH + Duration::from_secs(secs),
        }
    }

    /// `None` when the platform does not report modification times
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        metadata
            .modified()
            .ok()
            .map(|modified| Self::new(metadata.len(), modified))
    }

    pub fn etag(&self) -> &str {
        &self.etag
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        if let Ok(etag) = HeaderValue::from_str(&self.etag) {
            headers.insert(header::ETAG, etag);
        }
        if let Ok(date) = HeaderValue::from_str(&httpdate::fmt_http_date(self.last_modified)) {
            headers.insert(header::LAST_MODIFIED, date);
        }
    }

    /// True if the client's cached copy is still current.
    ///
    /// `If-None-Match` takes precedence; `If-Modified-Since` is only
    /// consulted when no entity tags were sent.
    pub fn is_fresh(&self, request: &HeaderMap) -> bool {
        if let Some(if_none_match) = request.get(header::IF_NONE_MATCH) {
            return if_none_match
                .to_str()
                .map(|tags| etag_matches(&self.etag, tags))
                .unwrap_or(false);
        }

        request
            .get(header::IF_MODIFIED_SINCE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| httpdate::parse_http_date(value).ok())
            .map_or(false, |since| self.last_modified <= since)
    }
}

/// Weak comparison against a comma-separated `If-None-Match` list
fn etag_matches(etag: &str, tags: &str) -> bool {
    let opaque = |tag: &str| tag.trim().trim_start_matches("W/").to_string();
    let ours = opaque(etag);

    tags.split(',')
        .map(str::trim)
        .any(|tag| tag == "*" || opaque(tag) == ours)
}
