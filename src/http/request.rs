//! A fully read HTTP request.

use bytes::Bytes;

use super::{Headers, Method, QueryParams, Version};

/// A fully parsed HTTP request.
///
/// Built by [`RequestHead::into_request`](super::parser::RequestHead::into_request)
/// once the head has been parsed and the declared body has been read. A
/// `Request` is immutable and lives only until its response is written.
///
/// # Examples
///
/// ```
/// use pingmon::http::parser::{parse_head, HeadStatus};
///
/// let raw = b"GET /chart/gateway?duration=3600 HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let HeadStatus::Complete(head) = parse_head(raw, 65536).unwrap() else {
///     panic!("head should be complete");
/// };
/// let request = head.into_request(Vec::new()).unwrap();
///
/// assert_eq!(request.method().as_str(), "GET");
/// assert_eq!(request.path(), "/chart/gateway?duration=3600");
/// assert_eq!(request.segments(), &["chart", "gateway"]);
/// assert_eq!(request.query().first("duration"), Some("3600"));
/// assert_eq!(request.headers().get("host"), Some("localhost"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) url_path: String,
    pub(crate) segments: Vec<String>,
    pub(crate) version: Version,
    pub(crate) headers: Headers,
    pub(crate) query: QueryParams,
    pub(crate) content_length: usize,
    pub(crate) body: Bytes,
}

impl Request {
    /// Returns the HTTP method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the request target exactly as the client sent it, query included.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the normalized path component of the target, without the query.
    pub fn url_path(&self) -> &str {
        &self.url_path
    }

    /// Returns the path split on `/`, without the leading empty segment.
    ///
    /// `/` yields no segments; `/foo/bar/` yields `["foo", "bar"]`. Inner empty
    /// segments are kept, so `//x` yields `["", "x"]`.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the protocol version from the request line.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the decoded query-string parameters.
    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    /// Returns the request body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the declared body length, as validated by the parser.
    ///
    /// A request without a `Content-Length` header declares `0`.
    pub fn content_length(&self) -> usize {
        self.content_length
    }
}
