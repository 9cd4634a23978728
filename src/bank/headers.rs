//! Browser identification header sets.
//!
//! The bank sits behind a WAF that rejects requests without browser-like
//! characteristics. Header sets are provided by a rotating provider rather
//! than a hardcoded constant so a 403 can be answered by switching profiles
//! without touching call sites.

use std::sync::atomic::{AtomicUsize, Ordering};

use reqwest::header;

/// One browser profile worth of identification headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderSet {
    pub user_agent: &'static str,
    pub accept_language: &'static str,
}

/// Profiles cycled through on firewall rejections. Kept current-ish with
/// mainstream desktop browsers.
const PROFILES: &[HeaderSet] = &[
    HeaderSet {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                     (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
        accept_language: "en-US,en;q=0.9",
    },
    HeaderSet {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        accept_language: "en-US,en;q=0.8",
    },
    HeaderSet {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:122.0) Gecko/20100101 \
                     Firefox/122.0",
        accept_language: "en-US,en;q=0.5",
    },
];

/// Supplies the current header set and rotates to the next profile on demand.
#[derive(Debug, Default)]
pub struct HeaderProvider {
    index: AtomicUsize,
}

impl HeaderProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// The header set requests are currently sent with.
    pub fn current(&self) -> HeaderSet {
        PROFILES[self.index.load(Ordering::Relaxed) % PROFILES.len()]
    }

    /// Switch to the next profile; returns the newly active set.
    pub fn rotate(&self) -> HeaderSet {
        let next = self.index.fetch_add(1, Ordering::Relaxed) + 1;
        PROFILES[next % PROFILES.len()]
    }

    /// Attach the identification headers to an outgoing request.
    pub fn decorate(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let set = self.current();
        request
            .header(header::USER_AGENT, set.user_agent)
            .header(header::ACCEPT, "application/json")
            .header(header::ACCEPT_LANGUAGE, set.accept_language)
    }
}
