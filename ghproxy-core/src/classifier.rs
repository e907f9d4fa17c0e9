//! GitHub URL classification.
//!
//! Maps a proxy target onto one of the GitHub resource shapes ghproxy knows
//! how to serve, capturing the owner and repository. Rules are evaluated in
//! order and the first match wins:
//!
//! 1. `github.com/<owner>/<repo>/(releases|archive)/...`
//! 2. `github.com/<owner>/<repo>/(blob|raw)/...`
//! 3. `github.com/<owner>/<repo>/(info|git-...)` (smart HTTP endpoints)
//! 4. `raw.github(usercontent).com/<owner>/<repo>/<ref>/<path>`
//! 5. `gist.github.com/<owner>/<id>/<path>` (owner only)
//!
//! Every rule accepts an optional `http://` or `https://` prefix.
//!
//! # Example
//!
//! ```
//! use ghproxy_core::classifier::{classify, normalize_target};
//!
//! let target = normalize_target("/github.com/foo/bar/releases/tag/v1");
//! assert_eq!(target, "https://github.com/foo/bar/releases/tag/v1");
//!
//! let matched = classify(&target).unwrap();
//! assert_eq!(matched.key(), "foo/bar");
//! assert!(classify("https://example.com/x").is_none());
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

/// Which GitHub resource shape a target matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GithubShape {
    /// Release assets and source archives.
    Release,
    /// File views and raw file downloads under github.com.
    Blob,
    /// Git smart HTTP endpoints (`info/refs`, `git-upload-pack`, ...).
    GitProtocol,
    /// raw.githubusercontent.com and the legacy raw.github.com.
    RawContent,
    /// gist.github.com resources.
    Gist,
}

/// A target that matched one of the GitHub shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubTarget {
    pub shape: GithubShape,
    pub owner: String,
    /// Empty for gists.
    pub repo: String,
}

impl GithubTarget {
    /// The `owner/repo` key that whitelist and blacklist entries are
    /// matched against.
    pub fn key(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

static RULES: Lazy<Vec<(GithubShape, Regex)>> = Lazy::new(|| {
    [
        (
            GithubShape::Release,
            r"^(?:https?://)?github\.com/([^/]+)/([^/]+)/(?:releases|archive)/.*$",
        ),
        (
            GithubShape::Blob,
            r"^(?:https?://)?github\.com/([^/]+)/([^/]+)/(?:blob|raw)/.*$",
        ),
        (
            GithubShape::GitProtocol,
            r"^(?:https?://)?github\.com/([^/]+)/([^/]+)/(?:info|git-).*$",
        ),
        (
            GithubShape::RawContent,
            r"^(?:https?://)?raw\.github(?:usercontent|)\.com/([^/]+)/([^/]+)/.+?/.+$",
        ),
        (
            GithubShape::Gist,
            r"^(?:https?://)?gist\.github\.com/([^/]+)/.+?/.+$",
        ),
    ]
    .into_iter()
    .map(|(shape, pattern)| (shape, Regex::new(pattern).expect("valid classifier pattern")))
    .collect()
});

/// Classifies a target against the GitHub shapes, first match wins.
///
/// Returns `None` for anything that is not GitHub-shaped (an "arbitrary
/// target").
pub fn classify(target: &str) -> Option<GithubTarget> {
    RULES.iter().find_map(|(shape, regex)| {
        let captures = regex.captures(target)?;
        Some(GithubTarget {
            shape: *shape,
            owner: captures.get(1).map_or("", |m| m.as_str()).to_string(),
            repo: captures.get(2).map_or("", |m| m.as_str()).to_string(),
        })
    })
}

/// Returns `true` when the target is a `blob`/`raw` file URL under github.com.
pub fn is_blob_style(target: &str) -> bool {
    RULES
        .iter()
        .any(|(shape, regex)| *shape == GithubShape::Blob && regex.is_match(target))
}

/// Turns a `/blob/` file view into its `/raw/` download.
///
/// Only the first `/blob/` segment is replaced, and only for blob-style
/// targets; everything else is returned unchanged.
pub fn blob_to_raw(target: &str) -> String {
    if is_blob_style(target) {
        target.replacen("/blob/", "/raw/", 1)
    } else {
        target.to_string()
    }
}

/// Builds the proxy target from the inbound request path and query.
///
/// - The path is percent-decoded, the query is kept verbatim
/// - All leading `/` are removed
/// - A scheme collapsed to a single slash (`https:/host`) is repaired
/// - `https://` is prepended when the result does not start with `http`
pub fn normalize_target(path_and_query: &str) -> String {
    let (path, query) = match path_and_query.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path_and_query, None),
    };

    let decoded = url_decode(path);
    let trimmed = decoded.trim_start_matches('/');

    let mut target = repair_scheme(trimmed);
    if !target.starts_with("http") {
        target = format!("https://{target}");
    }

    if let Some(query) = query {
        target.push('?');
        target.push_str(query);
    }
    target
}

/// Restores `scheme://` when an intermediary merged the double slash.
fn repair_scheme(target: &str) -> String {
    for scheme in ["https:/", "http:/"] {
        if let Some(rest) = target.strip_prefix(scheme)
            && !rest.starts_with('/')
        {
            return format!("{scheme}/{rest}");
        }
    }
    target.to_string()
}

/// Decode URL-encoded string (percent-encoding)
/// Invalid escapes are kept as-is; multi-byte UTF-8 sequences are reassembled.
fn url_decode(input: &str) -> String {
    let mut bytes = Vec::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '%' {
            let hex: String = chars.by_ref().take(2).collect();
            if hex.len() == 2
                && let Ok(byte) = u8::from_str_radix(&hex, 16)
            {
                bytes.push(byte);
                continue;
            }
            bytes.extend_from_slice(b"%");
            bytes.extend_from_slice(hex.as_bytes());
        } else {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
    }

    String::from_utf8_lossy(&bytes).into_owned()
}
