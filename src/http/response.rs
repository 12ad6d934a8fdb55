//! HTTP/1.1 response builder.
//!
//! Provides a small builder API for constructing responses and serializing
//! them to a byte buffer for transmission over TCP.

use bytes::{BufMut, BytesMut};

use super::StatusCode;

/// Content type used when a handler does not pick one.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// An HTTP/1.1 response, ready to be serialized and sent.
///
/// Every response closes its connection, and a response with an empty body
/// carries no `Content-Length` header at all.
///
/// # Examples
///
/// ```
/// use pingmon::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::OK)
///     .content_type("application/json")
///     .body(r#"{"status":"ok"}"#);
///
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.contains("Content-Length: 15\r\n"));
/// assert!(text.contains("Connection: close\r\n"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    content_type: String,
    body: Vec<u8>,
}

impl Response {
    /// Creates a new `text/plain` response with the given status and an empty body.
    pub fn new(status: impl Into<StatusCode>) -> Self {
        Self {
            status: status.into(),
            content_type: DEFAULT_CONTENT_TYPE.to_owned(),
            body: Vec::new(),
        }
    }

    /// Shorthand for a `text/plain` response carrying `message`.
    pub fn text(status: impl Into<StatusCode>, message: impl Into<String>) -> Self {
        Self::new(status).body(message)
    }

    /// Sets the response body from a string.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into().into_bytes();
        self
    }

    /// Sets the response body from raw bytes.
    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the `Content-Type` header value.
    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the configured content type.
    pub fn content_type_str(&self) -> &str {
        &self.content_type
    }

    /// Returns the body bytes.
    pub fn body_ref(&self) -> &[u8] {
        &self.body
    }

    /// Serializes the response into a `BytesMut` buffer using HTTP/1.1 wire format.
    ///
    /// Writes, in order: the status line, `Content-Type`, `Content-Length`
    /// (only for a non-empty body, counting bytes), `Connection: close`, the
    /// blank separator line and the body. No other headers are emitted.
    pub fn into_bytes(self) -> BytesMut {
        let content_length = self.body.len();
        let mut buf = BytesMut::with_capacity(128 + self.content_type.len() + content_length);

        // Status line
        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );

        buf.put(format!("Content-Type: {}\r\n", self.content_type).as_bytes());
        if content_length > 0 {
            buf.put(format!("Content-Length: {content_length}\r\n").as_bytes());
        }
        buf.put(&b"Connection: close\r\n"[..]);

        // Header/body separator
        buf.put(&b"\r\n"[..]);

        buf.put(self.body.as_slice());
        buf
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_string(bytes: BytesMut) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn simple_ok_response() {
        let r = Response::new(StatusCode::OK).body("Hello");
        let s = to_string(r.into_bytes());
        assert_eq!(
            s,
            "HTTP/1.1 200 OK\r\n\
             Content-Type: text/plain\r\n\
             Content-Length: 5\r\n\
             Connection: close\r\n\
             \r\n\
             Hello"
        );
    }

    #[test]
    fn empty_body_has_no_content_length() {
        let r = Response::new(StatusCode::OK);
        let s = to_string(r.into_bytes());
        assert!(!s.contains("Content-Length"));
        assert!(s.ends_with("Connection: close\r\n\r\n"));
    }

    #[test]
    fn content_length_counts_bytes_not_chars() {
        let r = Response::text(StatusCode::OK, "Grüße");
        let s = to_string(r.into_bytes());
        assert!(s.contains("Content-Length: 7\r\n"));
    }

    #[test]
    fn custom_content_type() {
        let r = Response::new(StatusCode::OK)
            .content_type("image/png")
            .body_bytes(vec![0x89, b'P', b'N', b'G']);
        let bytes = r.into_bytes();
        let head = String::from_utf8_lossy(&bytes);
        assert!(head.contains("Content-Type: image/png\r\n"));
        assert!(bytes.ends_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn unknown_code_uses_generic_reason() {
        let s = to_string(Response::new(503u16).into_bytes());
        assert!(s.starts_with("HTTP/1.1 503 Internal Server Error\r\n"));
    }

    #[test]
    fn not_found() {
        let r = Response::text(StatusCode::NOT_FOUND, "Path not found: /");
        let s = to_string(r.into_bytes());
        assert!(s.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(s.ends_with("\r\n\r\nPath not found: /"));
    }
}
