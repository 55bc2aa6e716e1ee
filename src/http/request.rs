use std::collections::HashMap;

use log::*;

use crate::buffer::LineReader;
use crate::config::ServerConfig;
use crate::error::{CapacityError, Error, Result};
use tokio::io::AsyncRead;

/// Headers as a case-insensitive, order-preserving multimap. Lookups are by lowercased name;
/// values for a repeated header are kept in the order they were received.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    fn new() -> Self {
        Headers { entries: Vec::new() }
    }

    /// Append a header line. Public so handlers and tests can build a `Headers` value
    /// directly (e.g. assembling a synthetic `Request` for a unit test).
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// All values for `name` (case-insensitive), in the order received.
    pub fn get_all(&self, name: &str) -> impl Iterator<Item = &str> {
        self.entries.iter().filter(move |(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    /// The first value for `name` (case-insensitive), if present.
    pub fn get_first(&self, name: &str) -> Option<&str> {
        self.get_all(name).next()
    }

    /// Number of header lines with the given name.
    pub fn count(&self, name: &str) -> usize {
        self.get_all(name).count()
    }

    /// True if `name`'s (first) value contains `token` as a comma-separated, case-insensitive
    /// token, e.g. the `Connection: keep-alive, Upgrade` header containing `upgrade`.
    pub fn contains_token(&self, name: &str, token: &str) -> bool {
        self.get_all(name).any(|value| value.split(',').any(|t| t.trim().eq_ignore_ascii_case(token)))
    }

    /// Iterate over all `(name, value)` pairs in receipt order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// An ordered multimap from query key to its (possibly repeated) values.
pub type QueryMap = HashMap<String, Vec<String>>;

/// A parsed HTTP/1.x request.
#[derive(Debug, Clone)]
pub struct Request {
    /// The HTTP version from the request line, e.g. `"HTTP/1.1"`.
    pub http_version: String,
    /// The request method, uppercased.
    pub method: String,
    /// The percent-decoded path, excluding any query string.
    pub path: String,
    /// The parsed query string as an ordered multimap; duplicate keys keep all values in
    /// the order they appeared.
    pub query: QueryMap,
    /// Request headers.
    pub headers: Headers,
    /// The request body, if any (`Content-Length` framed; empty when absent).
    pub body: Vec<u8>,
}

impl Request {
    /// True if the method is `HEAD`.
    pub fn is_head(&self) -> bool {
        self.method == "HEAD"
    }

    /// Parse one request off `stream`, using `reader` as the line/body buffer (so any
    /// residue left over belongs to the caller, not discarded).
    pub async fn parse<S>(reader: &mut LineReader, stream: &mut S, config: &ServerConfig) -> Result<Request>
    where
        S: AsyncRead + Unpin,
    {
        let request_line = reader.read_line(stream).await?;
        let (method, target, http_version) = split_request_line(&request_line)?;

        let mut headers = Headers::new();
        loop {
            let line = reader.read_line(stream).await?;
            if line.is_empty() {
                break;
            }
            let (name, value) = split_header_line(&line)?;
            headers.push(name, value);
        }

        if headers.count("Transfer-Encoding") > 0 {
            return Err(Error::Parse("chunked transfer encoding is not supported".into()));
        }

        let body = match headers.count("Content-Length") {
            0 => Vec::new(),
            1 => {
                let raw = headers.get_first("Content-Length").expect("count checked above");
                let len: usize =
                    raw.trim().parse().map_err(|_| Error::Parse(format!("bad Content-Length: {raw}")))?;
                if len > config.max_request_body_bytes {
                    return Err(Error::Capacity(CapacityError::BodyTooLarge {
                        size: len,
                        max_size: config.max_request_body_bytes,
                    }));
                }
                reader.read_body(stream, len).await?
            }
            _ => return Err(Error::Parse("duplicate Content-Length headers".into())),
        };

        let (path, query) = split_target(&target);
        trace!("parsed request {method} {path}");

        Ok(Request { http_version, method: method.to_ascii_uppercase(), path, query, headers, body })
    }
}

fn split_request_line(line: &str) -> Result<(&str, &str, String)> {
    let first = line.find(' ');
    let last = line.rfind(' ');
    match (first, last) {
        (Some(first), Some(last)) if first != last => {
            let method = &line[..first];
            let target = line[first + 1..last].trim();
            let version = line[last + 1..].trim();
            if method.is_empty() || target.is_empty() || version.is_empty() {
                return Err(Error::Parse("malformed request line".into()));
            }
            Ok((method, target, version.to_owned()))
        }
        _ => Err(Error::Parse("malformed request line".into())),
    }
}

fn split_header_line(line: &str) -> Result<(String, String)> {
    let colon = line.find(':').ok_or_else(|| Error::Parse(format!("header missing ':': {line}")))?;
    let name = line[..colon].trim().to_owned();
    let value = line[colon + 1..].trim().to_owned();
    if name.is_empty() {
        return Err(Error::Parse("empty header name".into()));
    }
    Ok((name, value))
}

fn split_target(target: &str) -> (String, QueryMap) {
    match target.split_once('?') {
        Some((path, query)) => (percent_decode(path), parse_query(query)),
        None => (percent_decode(target), QueryMap::new()),
    }
}

fn parse_query(raw: &str) -> QueryMap {
    let mut map = QueryMap::new();
    if raw.is_empty() {
        return map;
    }
    for pair in raw.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = match pair.split_once('=') {
            Some((k, v)) => (percent_decode(k), percent_decode(v)),
            None => (percent_decode(pair), String::new()),
        };
        map.entry(key).or_default().push(value);
    }
    map
}

/// Decode `%XX` escapes and `+` (as a space, conventional for query strings). Invalid escapes
/// are passed through verbatim rather than rejected, matching the parser's overall leniency.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() || i + 2 == bytes.len() => {
                if i + 2 < bytes.len() {
                    let hex = &input[i + 1..i + 3];
                    if let Ok(byte) = u8::from_str_radix(hex, 16) {
                        out.push(byte);
                        i += 3;
                        continue;
                    }
                }
                out.push(bytes[i]);
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn parses_simple_get() {
        let raw = b"GET /hello HTTP/1.1\r\nHost: x\r\n\r\n".to_vec();
        let mut stream = Cursor::new(raw);
        let mut reader = LineReader::new();
        let config = ServerConfig::default();
        let req = Request::parse(&mut reader, &mut stream, &config).await.unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/hello");
        assert!(req.body.is_empty());
        assert_eq!(req.headers.get_first("host"), Some("x"));
    }

    #[tokio::test]
    async fn parses_body_by_content_length() {
        let raw = b"POST /x HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhello".to_vec();
        let mut stream = Cursor::new(raw);
        let mut reader = LineReader::new();
        let config = ServerConfig::default();
        let req = Request::parse(&mut reader, &mut stream, &config).await.unwrap();
        assert_eq!(req.body, b"hello");
    }

    #[tokio::test]
    async fn zero_content_length_yields_empty_body() {
        let raw = b"POST /x HTTP/1.1\r\nHost: x\r\nContent-Length: 0\r\n\r\n".to_vec();
        let mut stream = Cursor::new(raw);
        let mut reader = LineReader::new();
        let config = ServerConfig::default();
        let req = Request::parse(&mut reader, &mut stream, &config).await.unwrap();
        assert!(req.body.is_empty());
    }

    #[tokio::test]
    async fn duplicate_content_length_is_rejected() {
        let raw =
            b"POST /x HTTP/1.1\r\nContent-Length: 1\r\nContent-Length: 2\r\n\r\nab".to_vec();
        let mut stream = Cursor::new(raw);
        let mut reader = LineReader::new();
        let config = ServerConfig::default();
        let err = Request::parse(&mut reader, &mut stream, &config).await.unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[tokio::test]
    async fn chunked_transfer_encoding_is_rejected() {
        let raw = b"POST /x HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
        let mut stream = Cursor::new(raw);
        let mut reader = LineReader::new();
        let config = ServerConfig::default();
        let err = Request::parse(&mut reader, &mut stream, &config).await.unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[tokio::test]
    async fn splits_and_decodes_query_string() {
        let raw = b"GET /search?q=a%20b&q=c&empty HTTP/1.1\r\n\r\n".to_vec();
        let mut stream = Cursor::new(raw);
        let mut reader = LineReader::new();
        let config = ServerConfig::default();
        let req = Request::parse(&mut reader, &mut stream, &config).await.unwrap();
        assert_eq!(req.path, "/search");
        assert_eq!(req.query.get("q").unwrap(), &["a b".to_owned(), "c".to_owned()]);
        assert_eq!(req.query.get("empty").unwrap(), &[String::new()]);
    }

    #[tokio::test]
    async fn tolerates_extra_internal_whitespace_in_target() {
        let raw = b"GET  /a b/c  HTTP/1.1\r\n\r\n".to_vec();
        let mut stream = Cursor::new(raw);
        let mut reader = LineReader::new();
        let config = ServerConfig::default();
        let req = Request::parse(&mut reader, &mut stream, &config).await.unwrap();
        assert_eq!(req.path, "/a b/c");
    }

    #[tokio::test]
    async fn malformed_request_line_is_a_parse_error() {
        let raw = b"GET\r\n\r\n".to_vec();
        let mut stream = Cursor::new(raw);
        let mut reader = LineReader::new();
        let config = ServerConfig::default();
        let err = Request::parse(&mut reader, &mut stream, &config).await.unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn headers_are_case_insensitive_and_preserve_order() {
        let mut headers = Headers::new();
        headers.push("Connection".into(), "keep-alive".into());
        headers.push("connection".into(), "Upgrade".into());
        assert!(headers.contains_token("CONNECTION", "upgrade"));
        assert_eq!(headers.get_all("connection").count(), 2);
    }
}
