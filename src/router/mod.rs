//! Request routing: maps an HTTP method and exact path to a handler.
//!
//! Routes are keyed by `(method, path segments)`. A path is registered as its
//! list of segments, so `["chart", "gateway"]` serves `/chart/gateway` and an
//! empty list serves `/`. Lookup is an exact match; there are no patterns or
//! wildcards.
//!
//! Registering the same key twice replaces the earlier handler. The table is
//! meant to be filled before the server starts and only read afterwards.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::FutureExt;
use thiserror::Error;
use tracing::{error, warn};

use crate::http::{Method, QueryParams, Request, Response, StatusCode};

/// Boxed error a handler may fail with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What a handler resolves to.
pub type HandlerResult = Result<Response, BoxError>;

/// Type-erased, heap-allocated async handler that turns query parameters into
/// a [`Response`].
///
/// Handlers are stored behind `Arc<dyn Fn(…)>` so they can be shared without
/// copying the underlying closure. Use [`Router::register`], [`Router::get`] or
/// [`Router::post`] rather than building one by hand.
pub type Handler = Arc<
    dyn Fn(QueryParams) -> Pin<Box<dyn Future<Output = HandlerResult> + Send>>
        + Send
        + Sync
        + 'static,
>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(QueryParams) -> impl Future<Output = HandlerResult> + Send` that is
/// also `Send + Sync + 'static` implements this trait through the blanket impl
/// below.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler with the given parameters, boxing the returned future.
    fn call(&self, params: QueryParams) -> Pin<Box<dyn Future<Output = HandlerResult> + Send>>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(QueryParams) -> F + Send + Sync + 'static,
    F: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, params: QueryParams) -> Pin<Box<dyn Future<Output = HandlerResult> + Send>> {
        Box::pin((self)(params))
    }
}

/// Rejected route registrations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("method must be one of: {}", Method::supported_list())]
    UnsupportedMethod,

    #[error("path segment `{0}` must not contain a `/`")]
    InvalidSegment(String),
}

/// How a request was resolved by [`Router::dispatch`].
#[derive(Debug)]
pub enum Dispatch {
    /// A route matched and its handler produced this response.
    Handled(Response),
    /// No route matched; carries the synthesized `404` response.
    NotFound(Response),
    /// The handler returned an error or panicked; carries a generic `500`.
    Failed(Response),
}

impl Dispatch {
    /// The response to send, whatever the outcome.
    pub fn into_response(self) -> Response {
        match self {
            Self::Handled(r) | Self::NotFound(r) | Self::Failed(r) => r,
        }
    }
}

type RouteKey = (Method, Vec<String>);

/// Exact-match routing table.
///
/// # Examples
///
/// ```rust,no_run
/// use pingmon::http::{QueryParams, Response, StatusCode};
/// use pingmon::router::Router;
///
/// let mut router = Router::new();
/// router
///     .get(&["hello"], |_params: QueryParams| async {
///         Ok(Response::text(StatusCode::OK, "Hello, world!"))
///     })
///     .unwrap();
/// assert_eq!(router.len(), 1);
/// ```
#[derive(Default)]
pub struct Router {
    routes: HashMap<RouteKey, Handler>,
}

impl Router {
    /// Create a new, empty `Router` with no registered routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` requests to the path made of `segments`.
    ///
    /// An existing route with the same method and segments is replaced.
    ///
    /// # Errors
    ///
    /// - [`RouteError::UnsupportedMethod`]: `method` does not parse as `GET` or `POST`.
    /// - [`RouteError::InvalidSegment`]: a segment contains the `/` separator.
    pub fn register<S>(
        &mut self,
        method: &str,
        segments: &[S],
        handler: impl IntoHandler,
    ) -> Result<(), RouteError>
    where
        S: AsRef<str>,
    {
        let method: Method = method.parse().map_err(|_| RouteError::UnsupportedMethod)?;
        self.add_route(method, segments, handler)
    }

    /// Register a handler for `GET` requests to `segments`.
    ///
    /// # Errors
    ///
    /// [`RouteError::InvalidSegment`] if a segment contains `/`.
    pub fn get<S: AsRef<str>>(
        &mut self,
        segments: &[S],
        handler: impl IntoHandler,
    ) -> Result<(), RouteError> {
        self.add_route(Method::Get, segments, handler)
    }

    /// Register a handler for `POST` requests to `segments`.
    ///
    /// # Errors
    ///
    /// [`RouteError::InvalidSegment`] if a segment contains `/`.
    pub fn post<S: AsRef<str>>(
        &mut self,
        segments: &[S],
        handler: impl IntoHandler,
    ) -> Result<(), RouteError> {
        self.add_route(Method::Post, segments, handler)
    }

    // Validate the segments, erase the handler type and store it, replacing any previous route.
    fn add_route<S: AsRef<str>>(
        &mut self,
        method: Method,
        segments: &[S],
        handler: impl IntoHandler,
    ) -> Result<(), RouteError> {
        let mut path = Vec::with_capacity(segments.len());
        for segment in segments {
            let segment = segment.as_ref();
            if segment.contains('/') {
                return Err(RouteError::InvalidSegment(segment.to_owned()));
            }
            path.push(segment.to_owned());
        }

        let handler: Handler = Arc::new(move |params| handler.call(params));
        self.routes.insert((method, path), handler);
        Ok(())
    }

    /// Return the number of routes registered in this router.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Return `true` if no routes have been registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Return `true` if a route exists for `method` and `segments`.
    pub fn contains<S: AsRef<str>>(&self, method: Method, segments: &[S]) -> bool {
        let key = (
            method,
            segments.iter().map(|s| s.as_ref().to_owned()).collect(),
        );
        self.routes.contains_key(&key)
    }

    /// Dispatch `request` to the route registered for its method and path.
    ///
    /// The handler receives the request's decoded query parameters and its
    /// response is passed through unchanged. Without a matching route a `404`
    /// naming the path is synthesized. A handler that returns an error or panics
    /// yields a `500` with a generic message; the failure never reaches the
    /// client connection.
    pub async fn dispatch(&self, request: &Request) -> Dispatch {
        let key = (request.method(), request.segments().to_vec());
        let Some(handler) = self.routes.get(&key) else {
            return Dispatch::NotFound(Response::text(
                StatusCode::NOT_FOUND,
                format!("Path not found: {}", request.url_path()),
            ));
        };

        // The closure body runs inside the caught region too, not only its future.
        let params = request.query().clone();
        let outcome = AssertUnwindSafe(async move { handler(params).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(response)) => Dispatch::Handled(response),
            Ok(Err(e)) => {
                warn!(path = %request.path(), error = %e, "handler failed");
                Dispatch::Failed(internal_error())
            }
            Err(_) => {
                error!(path = %request.path(), "handler panicked");
                Dispatch::Failed(internal_error())
            }
        }
    }
}

fn internal_error() -> Response {
    Response::text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::parser::{HeadStatus, parse_head};

    fn make_request(method: &str, path: &str) -> Request {
        let raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        match parse_head(raw.as_bytes(), 65536).unwrap() {
            HeadStatus::Complete(head) => head.into_request(Vec::new()).unwrap(),
            HeadStatus::Partial => panic!("test request should be complete"),
        }
    }

    fn ok(status: u16) -> impl IntoHandler {
        move |_params: QueryParams| async move { Ok::<_, BoxError>(Response::new(status)) }
    }

    #[test]
    fn router_starts_empty() {
        let router = Router::new();
        assert!(router.is_empty());
        assert_eq!(router.len(), 0);
    }

    #[test]
    fn register_rejects_unsupported_method() {
        let mut router = Router::new();
        let err = router.register("PUT", &["r"], ok(200)).unwrap_err();
        assert_eq!(err, RouteError::UnsupportedMethod);
        assert!(router.is_empty());
    }

    #[test]
    fn register_rejects_separator_in_segment() {
        let mut router = Router::new();
        let err = router.register("GET", &["a/b"], ok(200)).unwrap_err();
        assert_eq!(err, RouteError::InvalidSegment("a/b".to_owned()));
    }

    #[test]
    fn duplicate_registration_replaces() {
        let mut router = Router::new();
        router.get(&["path"], ok(200)).unwrap();
        router.get(&["path"], ok(202)).unwrap();
        assert_eq!(router.len(), 1);
        assert!(router.contains(Method::Get, &["path"]));
        assert!(!router.contains(Method::Post, &["path"]));
    }

    #[tokio::test]
    async fn latest_registration_wins() {
        let mut router = Router::new();
        router.get(&["path"], ok(200)).unwrap();
        router.get(&["path"], ok(202)).unwrap();

        let res = router.dispatch(&make_request("GET", "/path")).await;
        assert_eq!(res.into_response().status().as_u16(), 202);
    }

    #[tokio::test]
    async fn empty_router_returns_404_naming_path() {
        let router = Router::new();
        let res = router.dispatch(&make_request("GET", "/")).await;
        let res = match res {
            Dispatch::NotFound(res) => res,
            other => panic!("expected NotFound, got {other:?}"),
        };
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.body_ref(), b"Path not found: /");
    }

    #[tokio::test]
    async fn root_route_has_no_segments() {
        let mut router = Router::new();
        router.get::<&str>(&[], ok(200)).unwrap();
        let res = router.dispatch(&make_request("GET", "/")).await;
        assert!(matches!(res, Dispatch::Handled(_)));
    }

    #[tokio::test]
    async fn method_is_part_of_the_key() {
        let mut router = Router::new();
        router.get(&["hello"], ok(200)).unwrap();
        let res = router.dispatch(&make_request("POST", "/hello")).await;
        assert!(matches!(res, Dispatch::NotFound(_)));
    }

    #[tokio::test]
    async fn query_string_is_ignored_for_lookup_and_passed_to_handler() {
        let mut router = Router::new();
        router
            .get(&["chart", "gw"], |params: QueryParams| async move {
                let duration = params.first("duration").unwrap_or("none").to_owned();
                Ok(Response::text(StatusCode::OK, duration))
            })
            .unwrap();

        let res = router
            .dispatch(&make_request("GET", "/chart/gw/?duration=3600"))
            .await
            .into_response();
        assert_eq!(res.body_ref(), b"3600");
    }

    #[tokio::test]
    async fn handler_status_passes_through() {
        let mut router = Router::new();
        router.post(&["submit"], ok(403)).unwrap();
        let res = router.dispatch(&make_request("POST", "/submit")).await;
        let Dispatch::Handled(res) = res else {
            panic!("expected Handled");
        };
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn handler_error_becomes_500() {
        let mut router = Router::new();
        router
            .get(&["broken"], |_params: QueryParams| async {
                Err::<Response, BoxError>("chart backend unavailable".into())
            })
            .unwrap();
        let res = router.dispatch(&make_request("GET", "/broken")).await;
        let Dispatch::Failed(res) = res else {
            panic!("expected Failed");
        };
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.body_ref(), b"Internal Server Error");
    }

    #[tokio::test]
    async fn handler_panic_becomes_500() {
        let mut router = Router::new();
        router
            .get(&["panics"], |_params: QueryParams| async {
                if true {
                    panic!("handler bug");
                }
                Ok(Response::default())
            })
            .unwrap();
        let res = router.dispatch(&make_request("GET", "/panics")).await;
        assert!(matches!(res, Dispatch::Failed(_)));
    }

    #[tokio::test]
    async fn panic_before_future_is_built_becomes_500() {
        let mut router = Router::new();
        router
            .get(&["strict"], |params: QueryParams| {
                let n: u32 = params.first("n").unwrap().parse().unwrap();
                async move { Ok::<_, BoxError>(Response::text(StatusCode::OK, n.to_string())) }
            })
            .unwrap();

        let res = router.dispatch(&make_request("GET", "/strict")).await;
        let Dispatch::Failed(res) = res else {
            panic!("expected Failed");
        };
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let res = router.dispatch(&make_request("GET", "/strict?n=7")).await;
        assert_eq!(res.into_response().body_ref(), b"7");
    }
}
