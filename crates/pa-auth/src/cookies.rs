use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE};
use tracing::warn;

/// Minimal per-host cookie jar, threaded by value through a redirect walk.
///
/// Only names and values are kept; attributes other than a zero `Max-Age`
/// are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: BTreeMap<String, String>,
}

impl CookieJar {
    /// Jar with every cookie of `headers` applied on top of this one
    pub fn merge_response(&self, headers: &HeaderMap) -> Self {
        let mut next = self.clone();
        for (name, value, removed) in headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(parse_set_cookie)
        {
            if removed {
                next.cookies.remove(&name);
            } else {
                next.cookies.insert(name, value);
            }
        }
        next
    }

    pub fn with(&self, name: &str, value: &str) -> Self {
        let mut next = self.clone();
        next.cookies.insert(name.to_string(), value.to_string());
        next
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// `Cookie` request header value, `None` when no cookie can be sent.
    ///
    /// A cookie that cannot appear in a header is left out and logged.
    pub fn header_value(&self) -> Option<HeaderValue> {
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|(name, value)| (name, format!("{name}={value}")))
            .filter_map(|(name, pair)| match HeaderValue::from_str(&pair) {
                Ok(_) => Some(pair),
                Err(_) => {
                    warn!(cookie = %name, "Skipping cookie not allowed in a request header");
                    None
                }
            })
            .collect();

        if pairs.is_empty() {
            return None;
        }
        HeaderValue::from_str(&pairs.join("; ")).ok()
    }
}

/// Value of cookie `name` set by these response headers, ignoring deletions
pub fn find_set_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    CookieJar::default()
        .merge_response(headers)
        .get(name)
        .map(str::to_string)
}

fn parse_set_cookie(header: &str) -> Option<(String, String, bool)> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let value = value.trim().trim_matches('"');

    let expired = parts.any(|attr| {
        attr.split_once('=').is_some_and(|(key, val)| {
            key.trim().eq_ignore_ascii_case("max-age") && val.trim().starts_with(['0', '-'])
        })
    });

    Some((name.to_string(), value.to_string(), expired || value.is_empty()))
}
