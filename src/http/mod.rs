//! HTTP/1.x protocol types and parsing.
//!
//! This module provides the core HTTP primitives used by the status server:
//! [`Method`], [`StatusCode`], [`Version`], [`Headers`], [`QueryParams`],
//! [`Request`], and [`Response`].
//!
//! Only a deliberately small subset of HTTP/1.1 is understood: `GET` and `POST`
//! requests, a `Content-Length`-delimited body, and one request per connection.

use std::fmt;

use thiserror::Error;

pub mod headers;
pub mod parser;
pub mod query;
pub mod request;
pub mod response;

pub use headers::Headers;
pub use parser::ParseError;
pub use query::QueryParams;
pub use request::Request;
pub use response::Response;

/// An HTTP response status code.
///
/// Handlers may answer with any numeric code; only the codes this server
/// produces itself have named constants and a dedicated reason phrase.
///
/// # Examples
///
/// ```
/// use pingmon::http::StatusCode;
///
/// let status = StatusCode::OK;
/// assert_eq!(status.as_u16(), 200);
/// assert_eq!(status.canonical_reason(), "OK");
/// assert!(!status.is_error());
///
/// // Codes outside the reason table fall back to a generic phrase.
/// assert_eq!(StatusCode::from_u16(503).canonical_reason(), "Internal Server Error");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatusCode(u16);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(200);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const FORBIDDEN: StatusCode = StatusCode(403);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const METHOD_NOT_ALLOWED: StatusCode = StatusCode(405);
    pub const NOT_ACCEPTABLE: StatusCode = StatusCode(406);
    pub const REQUEST_TIMEOUT: StatusCode = StatusCode(408);
    pub const PAYLOAD_TOO_LARGE: StatusCode = StatusCode(413);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);

    /// Wraps an arbitrary numeric status code.
    pub const fn from_u16(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric status code as a `u16`.
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns the reason phrase written on the status line.
    pub fn canonical_reason(self) -> &'static str {
        match self.0 {
            200 => "OK",
            400 => "Bad Request",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            406 => "Not Acceptable",
            408 => "Request Timeout",
            413 => "Request Entity Too Large",
            _ => "Internal Server Error",
        }
    }

    /// Returns `true` for codes that are counted as errors (>= 400).
    pub const fn is_error(self) -> bool {
        self.0 >= 400
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.canonical_reason())
    }
}

impl From<StatusCode> for u16 {
    fn from(code: StatusCode) -> u16 {
        code.as_u16()
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> StatusCode {
        StatusCode(code)
    }
}

/// Returned when a request line names a method outside [`Method::SUPPORTED`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported request method `{0}`")]
pub struct UnsupportedMethod(pub String);

/// An HTTP request method.
///
/// The server only ever answers `GET` and `POST`; every other token is
/// rejected during parsing with `405 Method Not Allowed`.
///
/// # Examples
///
/// ```
/// use pingmon::http::Method;
///
/// let method: Method = "GET".parse().unwrap();
/// assert_eq!(method, Method::Get);
/// assert_eq!(method.as_str(), "GET");
/// assert!("PUT".parse::<Method>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Method {
    /// GET: retrieve a representation of the target resource.
    Get,
    /// POST: perform resource-specific processing on the request payload.
    Post,
}

impl Method {
    /// Every method the server accepts, in the order they are listed to clients.
    pub const SUPPORTED: [Method; 2] = [Method::Get, Method::Post];

    /// Returns the method as a string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }

    /// Space-separated list of supported methods, e.g. `"GET POST"`.
    pub fn supported_list() -> String {
        Self::SUPPORTED
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            other => Err(UnsupportedMethod(other.to_owned())),
        }
    }
}

impl AsRef<str> for Method {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// HTTP protocol version of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    /// Maps the minor version reported by `httparse` (0 or 1).
    pub(crate) fn from_minor(minor: u8) -> Self {
        if minor == 0 { Self::Http10 } else { Self::Http11 }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http10 => "HTTP/1.0",
            Self::Http11 => "HTTP/1.1",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
