//! Scrubbing of user-visible messages.
//!
//! Provider errors tend to echo request details back at us. Anything that
//! leaves the service as a message has credential-shaped substrings and
//! absolute URLs replaced before a client can see them.

use std::sync::LazyLock;

use regex::Regex;

/// Compiled scrub patterns.
pub struct Scrubber {
    api_key: Regex,
    url: Regex,
}

impl Scrubber {
    pub fn new() -> Self {
        Self {
            api_key: Regex::new(r#"(?i)api[_-]?key[=:]\s*[^\s"'&]+"#).expect("api key pattern"),
            url: Regex::new(r#"https?://[^\s"']+"#).expect("url pattern"),
        }
    }

    /// Replace credential-shaped substrings with `API_KEY` and absolute URLs
    /// with `[URL]`.
    pub fn scrub(&self, message: &str) -> String {
        let replaced = self.api_key.replace_all(message, "API_KEY");
        self.url.replace_all(&replaced, "[URL]").into_owned()
    }
}

impl Default for Scrubber {
    fn default() -> Self {
        Self::new()
    }
}

static SCRUBBER: LazyLock<Scrubber> = LazyLock::new(Scrubber::new);

/// Scrub a message with the shared pattern set.
pub fn scrub_message(message: &str) -> String {
    SCRUBBER.scrub(message)
}
