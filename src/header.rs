use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::{Error, Result};

/// Header name to header value, exactly as copied out of the browser.
pub type Headers = BTreeMap<String, String>;

/// Parses raw request header text as copied from the browser's network tab.
///
/// The first line is the request line (`GET /webtoon/detail?... HTTP/1.1`) and is ignored.
/// Every other non-blank line has to be `Key: Value`. HTTP/2 pseudo headers (`:authority`, ...)
/// are dropped since they can't be sent as regular headers. Later duplicates win.
pub fn parse_headers(raw: &str) -> Result<Headers> {
    let mut headers = Headers::new();
    for line in raw.lines().skip(1) {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once(": ")
            .ok_or_else(|| Error::HeaderLine(line.to_string()))?;
        if key.starts_with(':') {
            continue;
        }
        headers.insert(key.trim().to_string(), value.to_string());
    }
    Ok(headers)
}

/// Headers for the two kinds of requests we make. Built once and shared by every worker.
///
/// Required keys depend on the site, but in practice the page headers need `User-Agent` and
/// `Cookie`, and the image headers need `Referer` on top of that or the CDN answers 403.
#[derive(Debug, Clone, Default)]
pub struct HeaderSet {
    page: HeaderMap,
    image: HeaderMap,
}

impl HeaderSet {
    pub fn new(page: &Headers, image: &Headers) -> Result<Self> {
        Ok(Self {
            page: to_header_map(page)?,
            image: to_header_map(image)?,
        })
    }

    /// Parses both raw header blocks, see [`parse_headers`].
    pub fn from_raw(page_raw: &str, image_raw: &str) -> Result<Self> {
        Self::new(&parse_headers(page_raw)?, &parse_headers(image_raw)?)
    }

    pub fn page(&self) -> &HeaderMap {
        &self.page
    }

    pub fn image(&self) -> &HeaderMap {
        &self.image
    }
}

fn to_header_map(headers: &Headers) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (key, value) in headers {
        map.insert(
            HeaderName::from_bytes(key.as_bytes())?,
            HeaderValue::from_str(value)?,
        );
    }
    Ok(map)
}
