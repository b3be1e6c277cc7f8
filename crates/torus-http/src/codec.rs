//! Request parsing and response serialization.
//!
//! A request is complete once the empty line (`\r\n\r\n`) has arrived plus
//! as many body bytes as its `Content-Length` declares; the event loop uses
//! [`request_is_complete`] to drive its read loop and hands complete frames
//! to [`parse_request`].

use crate::status::reason_phrase;
use crate::{HttpError, Result};

/// The request method, as far as this server distinguishes them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Delete,
    /// Anything else; answered with `501 Not Implemented`.
    Other(String),
}

impl Method {
    fn from_token(token: &str) -> Self {
        match token {
            "GET" => Method::Get,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            other => Method::Other(other.to_string()),
        }
    }
}

/// A parsed HTTP request.
#[derive(Clone, Debug)]
pub struct Request {
    /// The request method.
    pub method: Method,
    /// The request target path.
    pub uri: String,
    /// Header fields in arrival order.
    pub headers: Vec<(String, String)>,
    /// The request body (`Content-Length` bytes).
    pub body: Vec<u8>,
}

impl Request {
    /// The value of the first header with the given name, compared
    /// case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response under construction.
///
/// `Content-Length` is always derived from the body on serialization, so
/// callers never set it themselves.
#[derive(Clone, Debug)]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Response {
    /// An empty response with the given status code.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Append a header field.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// The status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// The value of the first header with the given name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Serialize to wire form: status line, headers, `Content-Length`,
    /// empty line, body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128 + self.body.len());
        out.extend_from_slice(
            format!("HTTP/1.1 {} {}\r\n", self.status, reason_phrase(self.status)).as_bytes(),
        );
        for (name, value) in &self.headers {
            out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        out.extend_from_slice(format!("Content-Length: {}\r\n\r\n", self.body.len()).as_bytes());
        out.extend_from_slice(&self.body);
        out
    }
}

/// Whether `buf` holds at least one complete request: the header terminator
/// plus any declared body.
pub fn request_is_complete(buf: &[u8]) -> bool {
    let Some(head_end) = find_terminator(buf) else {
        return false;
    };
    let declared = declared_content_length(&buf[..head_end]).unwrap_or(0);
    buf.len() >= head_end + 4 + declared
}

/// Parse one complete request frame.
///
/// # Errors
///
/// Returns [`HttpError::Malformed`] when the request line or a header line
/// does not parse, or when fewer body bytes than declared are present.
pub fn parse_request(buf: &[u8]) -> Result<Request> {
    let head_end = find_terminator(buf).ok_or(HttpError::Malformed("no header terminator"))?;
    let head =
        std::str::from_utf8(&buf[..head_end]).map_err(|_| HttpError::Malformed("head not UTF-8"))?;

    let mut lines = head.split("\r\n");
    let request_line = lines.next().ok_or(HttpError::Malformed("no request line"))?;

    let mut parts = request_line.split_ascii_whitespace();
    let (method, uri, protocol) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(u), Some(p), None) => (m, u, p),
        _ => return Err(HttpError::Malformed("bad request line")),
    };
    if !protocol.starts_with("HTTP/") {
        return Err(HttpError::Malformed("bad protocol"));
    }

    let mut headers = Vec::new();
    for line in lines {
        let (name, value) = line
            .split_once(':')
            .ok_or(HttpError::Malformed("bad header line"))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    let declared = declared_content_length(&buf[..head_end]).unwrap_or(0);
    let body_start = head_end + 4;
    if buf.len() < body_start + declared {
        return Err(HttpError::Malformed("body shorter than Content-Length"));
    }
    let body = buf[body_start..body_start + declared].to_vec();

    Ok(Request {
        method: Method::from_token(method),
        uri: uri.to_string(),
        headers,
        body,
    })
}

/// Offset of the `\r\n\r\n` header terminator, if present.
fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// The `Content-Length` declared in the raw head, if any parses.
fn declared_content_length(head: &[u8]) -> Option<usize> {
    let head = std::str::from_utf8(head).ok()?;
    for line in head.split("\r\n").skip(1) {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                return value.trim().parse().ok();
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_get() {
        let req = parse_request(b"GET /static/foo HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .expect("parse");
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.uri, "/static/foo");
        assert_eq!(req.header("host"), Some("localhost"));
        assert!(req.body.is_empty());
    }

    #[test]
    fn test_parse_put_with_body() {
        let req = parse_request(
            b"PUT /dynamic/a HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello",
        )
        .expect("parse");
        assert_eq!(req.method, Method::Put);
        assert_eq!(req.body, b"hello");
    }

    #[test]
    fn test_parse_unknown_method() {
        let req = parse_request(b"PATCH /x HTTP/1.1\r\n\r\n").expect("parse");
        assert_eq!(req.method, Method::Other("PATCH".to_string()));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_request(b"GET /x HTTP/1.1\r\n").is_err(), "no terminator");
        assert!(parse_request(b"GET /x\r\n\r\n").is_err(), "two-token line");
        assert!(parse_request(b"GET /x NOTHTTP\r\n\r\n").is_err(), "bad protocol");
        assert!(
            parse_request(b"GET /x HTTP/1.1\r\nBadHeader\r\n\r\n").is_err(),
            "colon-less header"
        );
        assert!(
            parse_request(b"PUT /x HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc").is_err(),
            "short body"
        );
    }

    #[test]
    fn test_request_is_complete() {
        assert!(!request_is_complete(b"GET /x HTTP/1.1\r\n"));
        assert!(request_is_complete(b"GET /x HTTP/1.1\r\n\r\n"));
        assert!(!request_is_complete(
            b"PUT /x HTTP/1.1\r\nContent-Length: 5\r\n\r\nab"
        ));
        assert!(request_is_complete(
            b"PUT /x HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello"
        ));
    }

    #[test]
    fn test_response_wire_form() {
        let res = Response::new(303)
            .with_header("Location", "http://10.0.0.1:8080/x");
        let bytes = res.to_bytes();
        let text = String::from_utf8(bytes).expect("utf8");
        assert!(text.starts_with("HTTP/1.1 303 See Other\r\n"));
        assert!(text.contains("Location: http://10.0.0.1:8080/x\r\n"));
        assert!(text.ends_with("Content-Length: 0\r\n\r\n"));
    }

    #[test]
    fn test_response_body_sets_content_length() {
        let res = Response::new(200).with_body(&b"Foo"[..]);
        let text = String::from_utf8(res.to_bytes()).expect("utf8");
        assert!(text.contains("Content-Length: 3\r\n\r\nFoo"));
    }
}
