//! Cross-origin isolation headers.
//!
//! Browsers only hand out shared memory, and with it the blocking read,
//! to documents served with both of these headers.
//!
//! Nothing in this crate serves HTTP. These helpers are for a server that
//! ships the engine to a browser: it stamps every response with
//! [`apply_isolation_headers`] (skipping those [`should_rewrite`] rejects),
//! and an embedder that receives a document's headers derives its read
//! capability from them:
//!
//! ```
//! use http::HeaderMap;
//! use ichigo_runtime::isolation::apply_isolation_headers;
//! use ichigo_runtime::{ReadCapability, RuntimeConfig};
//!
//! let mut headers = HeaderMap::new();
//! assert_eq!(ReadCapability::from_headers(&headers), ReadCapability::Unavailable);
//!
//! apply_isolation_headers(&mut headers);
//! let config = RuntimeConfig::default()
//!     .with_read_capability(ReadCapability::from_headers(&headers));
//! assert_eq!(config.read_capability, ReadCapability::Blocking);
//! ```
//!
//! The terminal REPL has no headers to inspect and picks its capability
//! from the `--no-blocking-read` flag instead.

use http::header::{HeaderMap, HeaderName, HeaderValue};

use crate::channel::ReadCapability;

pub const EMBEDDER_POLICY: HeaderName = HeaderName::from_static("cross-origin-embedder-policy");
pub const OPENER_POLICY: HeaderName = HeaderName::from_static("cross-origin-opener-policy");

const REQUIRE_CORP: &str = "require-corp";
const SAME_ORIGIN: &str = "same-origin";

/// Set both isolation headers, replacing any existing values.
pub fn apply_isolation_headers(headers: &mut HeaderMap) {
    headers.insert(EMBEDDER_POLICY, HeaderValue::from_static(REQUIRE_CORP));
    headers.insert(OPENER_POLICY, HeaderValue::from_static(SAME_ORIGIN));
}

/// Whether `headers` carry both isolation headers with the required values.
pub fn is_cross_origin_isolated(headers: &HeaderMap) -> bool {
    let has = |name: &HeaderName, value: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim().eq_ignore_ascii_case(value))
    };
    has(&EMBEDDER_POLICY, REQUIRE_CORP) && has(&OPENER_POLICY, SAME_ORIGIN)
}

/// Whether a response should be rewritten with isolation headers.
///
/// Cache-only requests from other origins cannot be re-issued and are
/// passed through untouched.
pub fn should_rewrite(only_if_cached: bool, same_origin: bool) -> bool {
    !(only_if_cached && !same_origin)
}

impl ReadCapability {
    /// Capability granted by a document served with `headers`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        if is_cross_origin_isolated(headers) {
            ReadCapability::Blocking
        } else {
            ReadCapability::Unavailable
        }
    }
}
