use std::time::{SystemTime, UNIX_EPOCH};

use log::*;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::Result;

const SERVER_BANNER: &str = concat!("wslite/", env!("CARGO_PKG_VERSION"));

/// An HTTP response produced by an application handler.
#[derive(Debug, Clone)]
pub struct Response {
    /// The numeric status code, e.g. `200`.
    pub status_code: u16,
    /// The status line's reason phrase, e.g. `"OK"`.
    pub status_reason: String,
    /// The `Content-Type` value, without the `; charset=UTF-8` suffix (added automatically).
    pub content_type: String,
    /// Extra headers to append after the standard ones, in insertion order.
    pub extra_headers: Vec<(String, String)>,
    /// The response body.
    pub body: Vec<u8>,
}

impl Response {
    /// A plain `200 OK` text/plain response.
    pub fn ok(body: impl Into<Vec<u8>>) -> Response {
        Response {
            status_code: 200,
            status_reason: "OK".into(),
            content_type: "text/plain".into(),
            extra_headers: Vec::new(),
            body: body.into(),
        }
    }

    /// A response with an arbitrary status code and reason phrase.
    pub fn with_status(code: u16, reason: impl Into<String>, body: impl Into<Vec<u8>>) -> Response {
        Response {
            status_code: code,
            status_reason: reason.into(),
            content_type: "text/plain".into(),
            extra_headers: Vec::new(),
            body: body.into(),
        }
    }

    /// A `400 Bad Request` with `message` as the body.
    pub fn bad_request(message: impl Into<String>) -> Response {
        Response::with_status(400, "Bad Request", message.into().into_bytes())
    }

    /// A `500 Internal Server Error` with `message` as the body.
    pub fn internal_error(message: impl Into<String>) -> Response {
        Response::with_status(500, "Internal Server Error", message.into().into_bytes())
    }

    /// A `413 Payload Too Large`.
    pub fn payload_too_large() -> Response {
        Response::with_status(413, "Payload Too Large", Vec::new())
    }

    /// Append an extra header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Response {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    /// Write this response as an HTTP/1.0 reply. `suppress_body` is set for `HEAD` requests:
    /// headers (including `Content-Length`) are written but the body bytes are withheld.
    pub async fn write<S>(&self, stream: &mut S, suppress_body: bool) -> Result<()>
    where
        S: AsyncWrite + Unpin,
    {
        let mut out = String::new();
        out.push_str(&format!("HTTP/1.0 {} {}\r\n", self.status_code, self.status_reason));
        write_common_headers(&mut out, &self.content_type, self.body.len(), true, &self.extra_headers);

        debug!("writing response {} {}", self.status_code, self.status_reason);
        stream.write_all(out.as_bytes()).await?;
        if !suppress_body {
            stream.write_all(&self.body).await?;
        }
        stream.flush().await?;
        Ok(())
    }
}

/// Write the `101 Switching Protocols` handshake response.
pub(crate) async fn write_101<S>(stream: &mut S, accept_key: &str) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let mut out = String::new();
    out.push_str("HTTP/1.1 101 Switching Protocols\r\n");
    out.push_str(&format!("Server: {SERVER_BANNER}\r\n"));
    out.push_str(&format!("Date: {}\r\n", rfc1123_date(SystemTime::now())));
    out.push_str("Upgrade: websocket\r\n");
    out.push_str("Connection: Upgrade\r\n");
    out.push_str(&format!("Sec-WebSocket-Accept: {accept_key}\r\n"));
    out.push_str("\r\n");

    debug!("writing 101 Switching Protocols (accept={accept_key})");
    stream.write_all(out.as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}

fn write_common_headers(
    out: &mut String,
    content_type: &str,
    body_len: usize,
    close_connection: bool,
    extra_headers: &[(String, String)],
) {
    out.push_str(&format!("Server: {SERVER_BANNER}\r\n"));
    out.push_str(&format!("Content-Type: {content_type}; charset=UTF-8\r\n"));
    out.push_str(&format!("Content-Length: {body_len}\r\n"));
    out.push_str(&format!("Date: {}\r\n", rfc1123_date(SystemTime::now())));
    if close_connection {
        out.push_str("Connection: close\r\n");
    }
    for (name, value) in extra_headers {
        out.push_str(&format!("{name}: {value}\r\n"));
    }
    out.push_str("\r\n");
}

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const MONTHS: [&str; 12] =
    ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];

/// Format `time` as an RFC 1123 / HTTP-date string in GMT, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
/// Implemented by hand (civil-from-days, Howard Hinnant's algorithm) to avoid a date/time
/// dependency for a single formatting need.
fn rfc1123_date(time: SystemTime) -> String {
    let secs = time.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64;
    let days = secs.div_euclid(86_400);
    let secs_of_day = secs.rem_euclid(86_400);

    let hour = secs_of_day / 3600;
    let minute = (secs_of_day % 3600) / 60;
    let second = secs_of_day % 60;

    let weekday = WEEKDAYS[((days % 7 + 7 + 4) % 7) as usize]; // 1970-01-01 was a Thursday (index 4)
    let (year, month, day) = civil_from_days(days);

    format!(
        "{weekday}, {day:02} {month} {year:04} {hour:02}:{minute:02}:{second:02} GMT",
        month = MONTHS[(month - 1) as usize]
    )
}

/// Convert a day count since the Unix epoch into a `(year, month, day)` civil date, per
/// Howard Hinnant's `civil_from_days` algorithm (proleptic Gregorian calendar).
fn civil_from_days(z: i64) -> (i64, i64, i64) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64; // [0, 146096]
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365; // [0, 399]
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // [0, 365]
    let mp = (5 * doy + 2) / 153; // [0, 11]
    let d = (doy - (153 * mp + 2) / 5 + 1) as i64; // [1, 31]
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as i64; // [1, 12]
    (if m <= 2 { y + 1 } else { y }, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn known_epoch_instant_formats_correctly() {
        // 2000-01-01T00:00:00Z, a well-known reference instant.
        let time = UNIX_EPOCH + Duration::from_secs(946_684_800);
        assert_eq!(rfc1123_date(time), "Sat, 01 Jan 2000 00:00:00 GMT");
    }

    #[test]
    fn unix_epoch_is_a_thursday() {
        assert_eq!(rfc1123_date(UNIX_EPOCH), "Thu, 01 Jan 1970 00:00:00 GMT");
    }

    #[tokio::test]
    async fn head_request_suppresses_body_but_keeps_content_length() {
        let response = Response::ok(b"hello".to_vec());
        let mut out = Vec::new();
        response.write(&mut out, true).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Content-Length: 5"));
        assert!(!text.contains("hello"));
    }

    #[tokio::test]
    async fn non_head_request_includes_body() {
        let response = Response::ok(b"hello".to_vec());
        let mut out = Vec::new();
        response.write(&mut out, false).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("hello"));
        assert!(text.contains("HTTP/1.0 200 OK"));
        assert!(text.contains("Connection: close"));
    }

    #[tokio::test]
    async fn extra_headers_are_appended_in_order() {
        let response = Response::ok(Vec::new()).with_header("X-A", "1").with_header("X-B", "2");
        let mut out = Vec::new();
        response.write(&mut out, false).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.find("X-A").unwrap() < text.find("X-B").unwrap());
    }
}
