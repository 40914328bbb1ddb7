//! Request input validation: URL allowlist, SSRF guards, title rules.

use std::net::Ipv4Addr;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use url::Url;

/// Hosts accepted when `ALLOWED_HOSTS` is not set.
pub const DEFAULT_ALLOWED_HOSTS: [&str; 4] = [
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "youtu.be",
];

/// Why an input was rejected. All variants map to `INVALID_REQUEST` on the
/// wire; the message tells the caller what to fix.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("url is not parseable")]
    Unparseable,
    #[error("scheme '{0}' is not allowed, use https")]
    SchemeNotAllowed(String),
    #[error("host is not an allowed video host")]
    HostNotAllowed,
    #[error("host is a private or loopback address")]
    PrivateAddress,
    #[error("url does not reference a video")]
    NoVideoId,
    #[error("title must be between 1 and 120 characters")]
    TitleLength,
    #[error("title must not contain markup")]
    TitleMarkup,
}

/// A URL that passed validation, with the extracted video id and the
/// canonical form used for cache fingerprinting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUrl {
    pub video_id: String,
    pub canonical_url: String,
}

/// Validates submitted video URLs against the host allowlist and the known
/// YouTube path shapes.
#[derive(Debug, Clone)]
pub struct UrlValidator {
    allowed_hosts: Vec<String>,
}

impl UrlValidator {
    pub fn new(allowed_hosts: Vec<String>) -> Self {
        Self {
            allowed_hosts: allowed_hosts
                .into_iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn validate(&self, raw: &str) -> Result<ValidatedUrl, InputError> {
        let url = Url::parse(raw).map_err(|_| InputError::Unparseable)?;

        if url.scheme() != "https" {
            return Err(InputError::SchemeNotAllowed(url.scheme().to_string()));
        }

        let host = url
            .host_str()
            .ok_or(InputError::HostNotAllowed)?
            .to_ascii_lowercase();

        if let Ok(addr) = host.parse::<Ipv4Addr>() {
            if addr.is_loopback() || addr.is_private() {
                return Err(InputError::PrivateAddress);
            }
        }

        if !self.allowed_hosts.iter().any(|h| h == &host) {
            return Err(InputError::HostNotAllowed);
        }

        let video_id = extract_video_id(&host, &url).ok_or(InputError::NoVideoId)?;

        Ok(ValidatedUrl {
            canonical_url: format!("https://www.youtube.com/watch?v={video_id}"),
            video_id,
        })
    }
}

impl Default for UrlValidator {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_HOSTS.iter().map(|h| h.to_string()).collect())
    }
}

/// Pull the video id out of the recognized path shapes: `/watch?v=ID`,
/// `/shorts/ID`, `/embed/ID`, and the `youtu.be/ID` short link.
fn extract_video_id(host: &str, url: &Url) -> Option<String> {
    let mut segments = url.path_segments()?;

    let candidate = if host == "youtu.be" {
        segments.next().map(str::to_string)
    } else {
        match segments.next() {
            Some("watch") => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            Some("shorts") | Some("embed") => segments.next().map(str::to_string),
            _ => None,
        }
    };

    candidate.filter(|id| !id.is_empty() && id.chars().all(is_id_char))
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

static MARKUP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("markup pattern"));

/// Client-supplied titles are display-only; keep them short and markup-free.
pub fn validate_title(title: &str) -> Result<(), InputError> {
    let chars = title.chars().count();
    if chars == 0 || chars > 120 {
        return Err(InputError::TitleLength);
    }
    if MARKUP.is_match(title) {
        return Err(InputError::TitleMarkup);
    }
    Ok(())
}
