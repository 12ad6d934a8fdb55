//! Handlers that expose monitoring data over the status server.
//!
//! Latency samples and chart rendering live behind [`MetricsStore`], so the
//! server never needs to know whether charts come from an RRD file, a
//! database, or memory. [`SampleLog`] is the in-memory store used by the
//! binary and tests; it renders a plain-text table instead of an image.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::http::{QueryParams, Response, StatusCode};
use crate::router::{BoxError, HandlerResult, IntoHandler, RouteError, Router};
use crate::stats::Statistics;

/// Chart windows a client may ask for, in seconds: 6 hours, 12 hours, 1 day,
/// 1 week and 30 days.
pub const CHART_WINDOWS: [u64; 5] = [
    6 * 60 * 60,
    12 * 60 * 60,
    24 * 60 * 60,
    7 * 24 * 60 * 60,
    30 * 24 * 60 * 60,
];

/// Window used when the `duration` parameter is absent or not in [`CHART_WINDOWS`].
pub const DEFAULT_CHART_WINDOW: Duration = Duration::from_secs(12 * 60 * 60);

/// One probe result for a host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Average round-trip time in milliseconds; `None` when every packet was lost.
    pub rtt_ms: Option<f64>,
    /// Share of lost packets, 0 to 100.
    pub loss_percent: f64,
}

/// Storage and rendering backend for latency history.
pub trait MetricsStore: Send + Sync + 'static {
    /// Appends a sample for `host`.
    fn record_sample(&self, host: &str, sample: Sample) -> Result<(), BoxError>;

    /// Renders the history of `host` over the last `window`.
    fn render_chart(&self, host: &str, window: Duration) -> Result<Vec<u8>, BoxError>;

    /// Content type of the bytes returned by [`render_chart`](Self::render_chart).
    fn chart_content_type(&self) -> &str {
        "image/png"
    }
}

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("no samples recorded for host `{0}`")]
    UnknownHost(String),
}

/// Bounded in-memory [`MetricsStore`].
///
/// Keeps at most `capacity` samples per host, dropping the oldest first.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use pingmon::monitor::{MetricsStore, Sample, SampleLog};
///
/// let log = SampleLog::new(16);
/// log.record_sample("gateway", Sample { rtt_ms: Some(1.5), loss_percent: 0.0 }).unwrap();
///
/// let chart = log.render_chart("gateway", Duration::from_secs(3600)).unwrap();
/// assert!(String::from_utf8(chart).unwrap().contains("1.50"));
/// ```
#[derive(Debug)]
pub struct SampleLog {
    capacity: usize,
    samples: Mutex<HashMap<String, VecDeque<(Instant, Sample)>>>,
}

impl SampleLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            samples: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<(Instant, Sample)>>> {
        self.samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MetricsStore for SampleLog {
    fn record_sample(&self, host: &str, sample: Sample) -> Result<(), BoxError> {
        let mut samples = self.lock();
        let history = samples.entry(host.to_owned()).or_default();
        if history.len() == self.capacity {
            history.pop_front();
        }
        history.push_back((Instant::now(), sample));
        Ok(())
    }

    fn render_chart(&self, host: &str, window: Duration) -> Result<Vec<u8>, BoxError> {
        let samples = self.lock();
        let history = samples
            .get(host)
            .ok_or_else(|| SampleError::UnknownHost(host.to_owned()))?;

        let mut out = format!("{host} (last {}s)\nage_s\trtt_ms\tloss_%\n", window.as_secs());
        for (at, sample) in history.iter().filter(|(at, _)| at.elapsed() <= window) {
            let rtt = sample
                .rtt_ms
                .map_or_else(|| "U".to_owned(), |rtt| format!("{rtt:.2}"));
            out.push_str(&format!(
                "{}\t{rtt}\t{:.1}\n",
                at.elapsed().as_secs(),
                sample.loss_percent
            ));
        }
        Ok(out.into_bytes())
    }

    fn chart_content_type(&self) -> &str {
        "text/plain"
    }
}

/// Picks the chart window from the `duration` query parameter.
pub fn chart_window(params: &QueryParams) -> Duration {
    params
        .first("duration")
        .and_then(|d| d.parse::<u64>().ok())
        .filter(|secs| CHART_WINDOWS.contains(secs))
        .map_or(DEFAULT_CHART_WINDOW, Duration::from_secs)
}

/// Handler serving the chart of `host`.
///
/// Rendering runs on the blocking thread pool because chart backends usually
/// shell out or touch the disk.
pub fn chart_handler(store: Arc<dyn MetricsStore>, host: impl Into<String>) -> impl IntoHandler {
    let host: String = host.into();
    move |params: QueryParams| {
        let store = Arc::clone(&store);
        let host = host.clone();
        async move { render_chart(store, host, chart_window(&params)).await }
    }
}

async fn render_chart(store: Arc<dyn MetricsStore>, host: String, window: Duration) -> HandlerResult {
    let content_type = store.chart_content_type().to_owned();
    let bytes = tokio::task::spawn_blocking(move || store.render_chart(&host, window)).await??;
    Ok(Response::new(StatusCode::OK)
        .content_type(content_type)
        .body_bytes(bytes))
}

/// Handler recording a sample from `host`, `rtt` and `loss` query parameters.
///
/// `rtt` may be `U` (unknown) when every probe was lost. Missing or
/// unparseable parameters are answered with `400`.
pub fn sample_handler(store: Arc<dyn MetricsStore>) -> impl IntoHandler {
    move |params: QueryParams| {
        let store = Arc::clone(&store);
        async move { record_sample(store.as_ref(), &params) }
    }
}

fn record_sample(store: &dyn MetricsStore, params: &QueryParams) -> HandlerResult {
    let Some(host) = params.first("host").filter(|h| !h.is_empty()) else {
        return Ok(Response::text(StatusCode::BAD_REQUEST, "Missing parameter: host"));
    };
    let rtt_ms = match params.first("rtt") {
        None | Some("U") => None,
        Some(raw) => match raw.parse::<f64>() {
            Ok(rtt) if rtt >= 0.0 => Some(rtt),
            _ => return Ok(Response::text(StatusCode::BAD_REQUEST, "Invalid parameter: rtt")),
        },
    };
    let loss_percent = match params.first("loss").map(str::parse::<f64>) {
        Some(Ok(loss)) if (0.0..=100.0).contains(&loss) => loss,
        _ => return Ok(Response::text(StatusCode::BAD_REQUEST, "Invalid parameter: loss")),
    };

    store.record_sample(host, Sample { rtt_ms, loss_percent })?;
    Ok(Response::text(StatusCode::OK, "OK"))
}

/// Handler answering with a JSON [`StatsSnapshot`](crate::stats::StatsSnapshot).
pub fn stats_handler(stats: Arc<Statistics>) -> impl IntoHandler {
    move |_params: QueryParams| {
        let stats = Arc::clone(&stats);
        async move { render_stats(&stats) }
    }
}

fn render_stats(stats: &Statistics) -> HandlerResult {
    let body = serde_json::to_vec(&stats.snapshot())?;
    Ok(Response::new(StatusCode::OK)
        .content_type("application/json")
        .body_bytes(body))
}

/// Registers `GET /chart/<host>` for each host.
///
/// # Errors
///
/// [`RouteError::InvalidSegment`] if a host name contains `/`.
pub fn register_hosts<S: AsRef<str>>(
    router: &mut Router,
    store: &Arc<dyn MetricsStore>,
    hosts: &[S],
) -> Result<(), RouteError> {
    for host in hosts {
        let host = host.as_ref();
        router.get(&["chart", host], chart_handler(Arc::clone(store), host))?;
    }
    Ok(())
}
