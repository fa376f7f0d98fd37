//! Common helpers shared by the page driver and the runner
//!
//! URL resolution against the system under test and naming of on-disk
//! artifacts (screenshots, HTML dumps).

use chrono::{SecondsFormat, Utc};
use regex::Regex;
use std::sync::OnceLock;

/// Resolve a possibly relative target against the base URL.
///
/// Absolute `http(s)://` and `about:` targets are returned as-is.
pub fn resolve_url(base: &str, target: &str) -> String {
    if target.starts_with("http://") || target.starts_with("https://") || target.starts_with("about:")
    {
        return target.to_string();
    }
    let base = base.trim_end_matches('/');
    if target.starts_with('/') {
        format!("{}{}", base, target)
    } else {
        format!("{}/{}", base, target)
    }
}

/// Make a name safe to use as a file stem (every non-alphanumeric becomes `_`)
pub fn artifact_stem(name: &str) -> String {
    static NON_ALNUM: OnceLock<Regex> = OnceLock::new();
    let re = NON_ALNUM.get_or_init(|| Regex::new(r"[^a-zA-Z0-9]").expect("static regex"));
    re.replace_all(name, "_").to_string()
}

/// ISO-8601 timestamp usable inside file names (`:` and `.` replaced by `-`)
pub fn file_timestamp() -> String {
    Utc::now()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

/// ISO-8601 timestamp with milliseconds, as stored in results and logs
pub fn iso_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
