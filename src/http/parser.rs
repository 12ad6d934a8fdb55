//! HTTP/1.x request parsing using the [`httparse`] crate.
//!
//! Parsing happens in two steps because the connection reads a request in two
//! phases. [`parse_head`] inspects the bytes gathered by the head read and
//! either reports that more bytes are needed, rejects the request outright, or
//! yields a [`RequestHead`]. Once the connection has collected the declared
//! body, [`RequestHead::into_request`] validates its length and produces the
//! final [`Request`].

use bytes::Bytes;
use thiserror::Error;
use url::Url;

use super::{Headers, Method, QueryParams, Request, StatusCode, Version};

/// Maximum number of headers we support per request.
const MAX_HEADERS: usize = 64;

/// Terminal parse outcomes. Each one maps to exactly one error response.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Request is empty")]
    Empty,

    #[error("Request head is incomplete")]
    Incomplete,

    #[error("Malformed request: {0}")]
    Malformed(#[from] httparse::Error),

    #[error("Invalid request target: {0}")]
    InvalidTarget(#[from] url::ParseError),

    #[error("Invalid Content-Length: {0}")]
    InvalidContentLength(String),

    #[error("Only the following request methods are allowed: {}", Method::supported_list())]
    UnsupportedMethod,

    #[error("Content length must not exceed {max} bytes")]
    PayloadTooLarge { max: usize },

    #[error(
        "Request timeout. Body length ({actual}) does not match specified content length ({declared})"
    )]
    BodyLengthMismatch { declared: usize, actual: usize },
}

impl ParseError {
    /// The status code sent back to the client for this outcome.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Empty
            | Self::Incomplete
            | Self::Malformed(_)
            | Self::InvalidTarget(_)
            | Self::InvalidContentLength(_) => StatusCode::BAD_REQUEST,
            Self::UnsupportedMethod => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::BodyLengthMismatch { .. } => StatusCode::REQUEST_TIMEOUT,
        }
    }
}

/// Result of feeding the bytes read so far to [`parse_head`].
#[derive(Debug)]
pub enum HeadStatus {
    /// The request line and all headers are present.
    Complete(RequestHead),
    /// The header terminator has not arrived yet.
    Partial,
}

/// The request line and headers of a request whose body may still be in flight.
#[derive(Debug)]
pub struct RequestHead {
    method: Method,
    path: String,
    url_path: String,
    segments: Vec<String>,
    version: Version,
    headers: Headers,
    query: QueryParams,
    body_offset: usize,
    content_length: usize,
}

impl RequestHead {
    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Byte offset of the first body byte in the buffer given to [`parse_head`].
    pub fn body_offset(&self) -> usize {
        self.body_offset
    }

    /// Declared body length; `0` when no `Content-Length` header was sent.
    pub fn content_length(&self) -> usize {
        self.content_length
    }

    /// Completes the request with the body bytes read after the head.
    ///
    /// A single trailing line terminator is stripped first. The remaining body
    /// must be exactly as long as the declared `Content-Length`; anything else is
    /// reported as [`ParseError::BodyLengthMismatch`] because a short body almost
    /// always means the client stalled.
    ///
    /// # Errors
    ///
    /// [`ParseError::BodyLengthMismatch`] when the lengths disagree.
    pub fn into_request(self, body: impl Into<Vec<u8>>) -> Result<Request, ParseError> {
        let mut body = body.into();
        chomp(&mut body);

        if body.len() != self.content_length {
            return Err(ParseError::BodyLengthMismatch {
                declared: self.content_length,
                actual: body.len(),
            });
        }

        Ok(Request {
            method: self.method,
            path: self.path,
            url_path: self.url_path,
            segments: self.segments,
            version: self.version,
            headers: self.headers,
            query: self.query,
            content_length: self.content_length,
            body: Bytes::from(body),
        })
    }
}

/// Parses the request head out of `buf`.
///
/// The method is checked on the first whitespace-separated token of the
/// request line before anything else, so `HONK / HTTP/1.1` is rejected with
/// `405` even though it is otherwise well formed. Header lines that cannot be
/// parsed, or that carry an empty value, are skipped rather than failing the
/// request. A `Content-Length` above `max_content_length` is rejected here,
/// before any body byte is read.
///
/// Returns [`HeadStatus::Partial`] while the header terminator is missing; the
/// caller decides whether to keep reading or give up with
/// [`ParseError::Empty`] / [`ParseError::Incomplete`].
///
/// # Errors
///
/// - [`ParseError::UnsupportedMethod`]: the method is not `GET` or `POST`.
/// - [`ParseError::Malformed`]: the request line is structurally invalid.
/// - [`ParseError::InvalidTarget`]: the path cannot be parsed as a URL path.
/// - [`ParseError::InvalidContentLength`]: `Content-Length` is not a number.
/// - [`ParseError::PayloadTooLarge`]: the declared body exceeds the cap.
pub fn parse_head(buf: &[u8], max_content_length: usize) -> Result<HeadStatus, ParseError> {
    let Some(line) = request_line(buf) else {
        return Ok(HeadStatus::Partial);
    };
    let method = first_token(line)
        .and_then(|token| token.parse::<Method>().ok())
        .ok_or(ParseError::UnsupportedMethod)?;

    let mut header_slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut raw = httparse::Request::new(&mut header_slots);
    let mut config = httparse::ParserConfig::default();
    config
        .allow_multiple_spaces_in_request_line_delimiters(true)
        .ignore_invalid_headers_in_requests(true);

    let body_offset = match config.parse_request(&mut raw, buf)? {
        httparse::Status::Complete(offset) => offset,
        httparse::Status::Partial => return Ok(HeadStatus::Partial),
    };

    let path = raw.path.ok_or(ParseError::Malformed(httparse::Error::Token))?;
    let version = Version::from_minor(raw.version.unwrap_or(1));

    let mut headers = Headers::with_capacity(raw.headers.len());
    for header in raw.headers.iter() {
        let Ok(value) = std::str::from_utf8(header.value) else {
            continue;
        };
        let value = value.trim();
        if header.name.is_empty() || value.is_empty() {
            continue;
        }
        headers.insert(header.name, value);
    }

    let content_length = match headers.get("content-length") {
        Some(raw_len) => raw_len
            .parse::<usize>()
            .map_err(|_| ParseError::InvalidContentLength(raw_len.to_owned()))?,
        None => 0,
    };
    if content_length > max_content_length {
        return Err(ParseError::PayloadTooLarge {
            max: max_content_length,
        });
    }

    let (url_path, segments, query) = split_target(path)?;

    Ok(HeadStatus::Complete(RequestHead {
        method,
        path: path.to_owned(),
        url_path,
        segments,
        version,
        headers,
        query,
        body_offset,
        content_length,
    }))
}

/// Returns `true` when `buf` holds nothing but line terminators and spaces.
pub fn is_blank(buf: &[u8]) -> bool {
    buf.iter().all(u8::is_ascii_whitespace)
}

// The first non-empty line, without its terminator, once it has fully arrived.
fn request_line(buf: &[u8]) -> Option<&[u8]> {
    let start = buf.iter().position(|b| !matches!(b, b'\r' | b'\n'))?;
    let rest = &buf[start..];
    let end = rest.iter().position(|&b| b == b'\n')?;
    Some(&rest[..end])
}

fn first_token(line: &[u8]) -> Option<&str> {
    let token = line
        .split(u8::is_ascii_whitespace)
        .find(|t| !t.is_empty())?;
    std::str::from_utf8(token).ok()
}

// Origin-form targets are appended to a dummy origin rather than joined to it,
// so a leading `//` stays part of the path instead of naming a host.
fn split_target(target: &str) -> Result<(String, Vec<String>, QueryParams), ParseError> {
    let url = if target.starts_with('/') {
        Url::parse(&format!("http://localhost{target}"))?
    } else {
        Url::parse(target)?
    };

    let mut segments: Vec<String> = url
        .path_segments()
        .map(|segs| segs.map(str::to_owned).collect())
        .unwrap_or_default();
    while segments.last().is_some_and(|s| s.is_empty()) {
        segments.pop();
    }

    let query = url.query().map(QueryParams::parse).unwrap_or_default();

    Ok((url.path().to_owned(), segments, query))
}

// Strips one trailing `\r\n`, `\n` or `\r`.
fn chomp(body: &mut Vec<u8>) {
    if body.ends_with(b"\r\n") {
        body.truncate(body.len() - 2);
    } else if body.ends_with(b"\n") || body.ends_with(b"\r") {
        body.truncate(body.len() - 1);
    }
}
