//! Process-lifetime request and error counters.
//!
//! The connection handler is the only writer. Readers (a status page, tests)
//! take a [`StatsSnapshot`], which is a consistent copy that can be serialized
//! with `serde`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use crate::http::{Method, StatusCode};

#[derive(Debug, Default)]
struct Counters {
    requests: HashMap<Method, u64>,
    errors: HashMap<u16, u64>,
}

/// Monotonic counters for served requests and error responses.
///
/// Missing keys read as `0`. Share it behind an `Arc` to observe it from
/// outside the accept loop.
///
/// # Examples
///
/// ```
/// use pingmon::http::{Method, StatusCode};
/// use pingmon::stats::Statistics;
///
/// let stats = Statistics::new();
/// stats.record_request(Method::Get);
/// stats.record_error(StatusCode::NOT_FOUND);
///
/// let snapshot = stats.snapshot();
/// assert_eq!(snapshot.requests(Method::Get), 1);
/// assert_eq!(snapshot.requests(Method::Post), 0);
/// assert_eq!(snapshot.errors(404), 1);
/// assert_eq!(snapshot.total_errors(), 1);
/// ```
#[derive(Debug, Default)]
pub struct Statistics {
    counters: Mutex<Counters>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a request that parsed successfully and reached dispatch.
    pub fn record_request(&self, method: Method) {
        *self.lock().requests.entry(method).or_insert(0) += 1;
    }

    /// Counts an error response. Codes below 400 are ignored.
    pub fn record_error(&self, status: StatusCode) {
        if status.is_error() {
            *self.lock().errors.entry(status.as_u16()).or_insert(0) += 1;
        }
    }

    /// Copies the current counter values.
    pub fn snapshot(&self) -> StatsSnapshot {
        let counters = self.lock();
        StatsSnapshot {
            requests: counters
                .requests
                .iter()
                .map(|(method, count)| (method.as_str().to_owned(), *count))
                .collect(),
            errors: counters.errors.iter().map(|(k, v)| (*k, *v)).collect(),
        }
    }

    // A panic while holding the lock cannot leave a half-applied increment,
    // so a poisoned mutex is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A point-in-time, read-only copy of [`Statistics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Requests per method name.
    pub requests: BTreeMap<String, u64>,
    /// Error responses per status code.
    pub errors: BTreeMap<u16, u64>,
}

impl StatsSnapshot {
    pub fn requests(&self, method: Method) -> u64 {
        self.requests.get(method.as_str()).copied().unwrap_or(0)
    }

    pub fn errors(&self, code: u16) -> u64 {
        self.errors.get(&code).copied().unwrap_or(0)
    }

    pub fn total_requests(&self) -> u64 {
        self.requests.values().sum()
    }

    pub fn total_errors(&self) -> u64 {
        self.errors.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn starts_at_zero() {
        let snap = Statistics::new().snapshot();
        assert_eq!(snap.requests(Method::Get), 0);
        assert_eq!(snap.errors(400), 0);
        assert_eq!(snap.total_errors(), 0);
    }

    #[test]
    fn success_codes_are_not_errors() {
        let stats = Statistics::new();
        stats.record_error(StatusCode::OK);
        stats.record_error(StatusCode::from_u16(302));
        assert_eq!(stats.snapshot().total_errors(), 0);
    }

    #[test]
    fn counts_accumulate_per_key() {
        let stats = Statistics::new();
        stats.record_request(Method::Get);
        stats.record_request(Method::Get);
        stats.record_request(Method::Post);
        stats.record_error(StatusCode::REQUEST_TIMEOUT);
        stats.record_error(StatusCode::REQUEST_TIMEOUT);
        stats.record_error(StatusCode::PAYLOAD_TOO_LARGE);

        let snap = stats.snapshot();
        assert_eq!(snap.requests(Method::Get), 2);
        assert_eq!(snap.requests(Method::Post), 1);
        assert_eq!(snap.total_requests(), 3);
        assert_eq!(snap.errors(408), 2);
        assert_eq!(snap.errors(413), 1);
        assert_eq!(snap.total_errors(), 3);
    }

    #[test]
    fn concurrent_readers_see_every_increment() {
        let stats = Arc::new(Statistics::new());
        let writer = {
            let stats = Arc::clone(&stats);
            thread::spawn(move || {
                for _ in 0..1000 {
                    stats.record_request(Method::Get);
                    stats.record_error(StatusCode::NOT_FOUND);
                }
            })
        };
        for _ in 0..100 {
            let snap = stats.snapshot();
            assert!(snap.requests(Method::Get) <= 1000);
        }
        writer.join().unwrap();

        let snap = stats.snapshot();
        assert_eq!(snap.requests(Method::Get), 1000);
        assert_eq!(snap.errors(404), 1000);
    }

    #[test]
    fn snapshot_serializes_as_json() {
        let stats = Statistics::new();
        stats.record_request(Method::Get);
        stats.record_error(StatusCode::NOT_FOUND);
        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["requests"]["GET"], 1);
        assert_eq!(json["errors"]["404"], 1);
    }
}
