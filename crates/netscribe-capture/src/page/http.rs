//! Header-block and query-string parsing for page requests.

use crate::types::{HeaderMap, QueryMap};

/// Parse a raw response header block (`name: value` lines separated by CRLF).
///
/// Each line is split on the first `": "`; lines without it are skipped.
pub fn parse_raw_headers(block: &str) -> HeaderMap {
    block
        .split("\r\n")
        .filter_map(|line| line.split_once(": "))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

/// Split a URL into its base and decoded query parameters.
///
/// Without a `?` the URL is returned unchanged with no parameters. Repeated
/// keys keep their first position and their last value.
pub fn split_query(url: &str) -> (String, QueryMap) {
    let Some((base, query)) = url.split_once('?') else {
        return (url.to_string(), QueryMap::new());
    };
    let params = url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    (base.to_string(), params)
}
