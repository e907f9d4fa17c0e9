//! Access-control decisions over proxy targets.
//!
//! GitHub-shaped targets are checked against `white_list` / `black_list` by
//! **prefix** on the `owner/repo` key. Arbitrary targets are refused unless
//! `allow_proxy_all` is set, and are then checked against
//! `other_white_list` / `other_black_list` by **substring** on the whole
//! normalized target.
//!
//! In both cases the whitelist is consulted first and the blacklist second,
//! independently: an entry present in both lists denies.

use tracing::debug;

use crate::classifier::GithubTarget;
use crate::error::DenyReason;
use crate::policy::PolicySnapshot;

/// Decides whether `target` may be proxied under `policy`.
///
/// # Arguments
///
/// * `classification` - Result of [`crate::classifier::classify`] for `target`
/// * `target` - The normalized target string
/// * `policy` - The snapshot in force for this request
///
/// # Example
///
/// ```
/// use ghproxy_core::access::authorize;
/// use ghproxy_core::classifier::classify;
/// use ghproxy_core::error::DenyReason;
/// use ghproxy_core::policy::PolicySnapshot;
///
/// let policy = PolicySnapshot {
///     white_list: vec!["foo/bar".into()],
///     ..PolicySnapshot::default()
/// };
///
/// let allowed = "https://github.com/foo/bar/releases/tag/v1";
/// assert!(authorize(classify(allowed).as_ref(), allowed, &policy).is_ok());
///
/// let denied = "https://github.com/baz/qux/releases/tag/v1";
/// assert_eq!(
///     authorize(classify(denied).as_ref(), denied, &policy),
///     Err(DenyReason::ForbiddenWhitelist)
/// );
/// ```
pub fn authorize(
    classification: Option<&GithubTarget>,
    target: &str,
    policy: &PolicySnapshot,
) -> Result<(), DenyReason> {
    let decision = match classification {
        Some(github) => check_github(&github.key(), policy),
        None => check_arbitrary(target, policy),
    };

    if let Err(reason) = decision {
        debug!(target = %target, reason = %reason, "Target denied by policy");
    }
    decision
}

fn check_github(key: &str, policy: &PolicySnapshot) -> Result<(), DenyReason> {
    if !policy.white_list.is_empty() && !any_prefix(key, &policy.white_list) {
        return Err(DenyReason::ForbiddenWhitelist);
    }
    if !policy.black_list.is_empty() && any_prefix(key, &policy.black_list) {
        return Err(DenyReason::ForbiddenBlacklist);
    }
    Ok(())
}

fn check_arbitrary(target: &str, policy: &PolicySnapshot) -> Result<(), DenyReason> {
    if !policy.allow_proxy_all {
        return Err(DenyReason::InvalidInput);
    }
    if !policy.other_white_list.is_empty() && !any_substring(target, &policy.other_white_list) {
        return Err(DenyReason::ForbiddenWhitelist);
    }
    if !policy.other_black_list.is_empty() && any_substring(target, &policy.other_black_list) {
        return Err(DenyReason::ForbiddenBlacklist);
    }
    Ok(())
}

fn any_prefix(key: &str, entries: &[String]) -> bool {
    entries.iter().any(|entry| key.starts_with(entry.as_str()))
}

fn any_substring(target: &str, entries: &[String]) -> bool {
    entries.iter().any(|entry| target.contains(entry.as_str()))
}
