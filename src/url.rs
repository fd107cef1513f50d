//! Resource URL composition
//!
//! Remote endpoints are configured as `scheme://host/path?authorization`.
//! Addressing an object inside one means splicing its name between the path
//! and the `?`, never appending it to the query.

use regex::Regex;
use std::sync::OnceLock;

/// Split a URL on its first `?` into path and optional query
pub fn split_query(url: &str) -> (&str, Option<&str>) {
    match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url, None),
    }
}

/// Return `path` with exactly one trailing `/` added if it lacks one
pub fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

/// Address `resource` inside the endpoint `base`, keeping its query
///
/// ```
/// use harness::url::compose_resource_url;
///
/// assert_eq!(
///     compose_resource_url("https://acct.blob/container?sv=1&sig=x", "dir/file.txt"),
///     "https://acct.blob/container/dir/file.txt?sv=1&sig=x"
/// );
/// ```
pub fn compose_resource_url(base: &str, resource: &str) -> String {
    let (path, query) = split_query(base);
    let mut url = with_trailing_slash(path);
    url.push_str(resource);
    if let Some(query) = query {
        url.push('?');
        url.push_str(query);
    }
    url
}

/// Address `resource` inside `base` and drop the authorization query
///
/// Used for OAuth-authenticated endpoints where credentials travel
/// out of band.
pub fn compose_without_query(base: &str, resource: &str) -> String {
    let (path, _) = split_query(base);
    let mut url = with_trailing_slash(path);
    url.push_str(resource);
    url
}

fn signature_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)sig[ \t]*[:=][ \t]*[^& ,;"'\t\n\r]+"#).expect("signature pattern is valid")
    })
}

/// Replace any `sig=` value with `REDACTED` so URLs can be logged
pub fn redact_signature(text: &str) -> String {
    signature_pattern()
        .replace_all(text, "sig=REDACTED")
        .into_owned()
}
