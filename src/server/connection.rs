//! One accepted connection: read a request under deadlines, answer it, close.
//!
//! ```text
//! Accepted → ReadingHead ─┬─ empty / malformed ─────────────┐
//!                         ├─ unsupported method ────────────┤
//!                         ├─ Content-Length over the cap ───┤→ ErrorResponse ─┐
//!                         └─ ReadingBody ─┬─ length mismatch┘                 │
//!                                         └─ Complete → Dispatching ──────────┴→ Responded → Closed
//! ```
//!
//! Every read is bounded by a deadline, which is what keeps a slow or silent
//! client from stalling the serial accept loop.

use std::io;
use std::net::SocketAddr;

use bytes::{BufMut, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::http::parser::{HeadStatus, is_blank, parse_head};
use crate::http::{ParseError, Request, Response};
use crate::router::Router;
use crate::stats::Statistics;

const DRAIN_CHUNK: usize = 4096;

#[derive(Debug, Error)]
enum ReadError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

// What a single deadline-bounded read produced.
#[derive(Debug, PartialEq, Eq)]
enum ReadOutcome {
    Data(usize),
    Eof,
    TimedOut,
}

/// Services `stream` to completion: exactly one response is written, then the
/// connection is closed.
///
/// Statistics are updated here and nowhere else: a request that parsed is
/// counted under its method, and any response with a status of 400 or above is
/// counted under its code.
pub(crate) async fn serve(
    mut stream: TcpStream,
    peer: SocketAddr,
    router: &Router,
    stats: &Statistics,
    config: &ServerConfig,
) {
    let response = match read_request(&mut stream, config).await {
        Ok(request) => {
            stats.record_request(request.method());
            debug!(
                peer = %peer,
                method = %request.method(),
                path = %request.path(),
                "dispatching request"
            );
            router.dispatch(&request).await.into_response()
        }
        Err(ReadError::Parse(e)) => {
            debug!(peer = %peer, error = %e, "rejecting request");
            Response::text(e.status(), e.to_string())
        }
        Err(ReadError::Io(e)) => {
            warn!(peer = %peer, error = %e, "failed to read request");
            return;
        }
    };

    let status = response.status();
    stats.record_error(status);
    info!(peer = %peer, status = status.as_u16(), "responded");

    match timeout(config.body_timeout(), write_response(&mut stream, response)).await {
        Ok(Ok(())) => drain(&mut stream, config).await,
        Ok(Err(e)) => warn!(peer = %peer, error = %e, "failed to write response"),
        Err(_) => warn!(peer = %peer, "timed out writing response"),
    }
}

/// Reads the head, then the declared body, and assembles the [`Request`].
async fn read_request(
    stream: &mut TcpStream,
    config: &ServerConfig,
) -> Result<Request, ReadError> {
    let mut buf = BytesMut::with_capacity(config.head_buffer_size);
    let head_deadline = Instant::now() + config.head_timeout();

    let head = loop {
        if let HeadStatus::Complete(head) = parse_head(&buf, config.max_content_length)? {
            break head;
        }

        let room = config.head_buffer_size.saturating_sub(buf.len());
        let outcome = if room == 0 {
            ReadOutcome::Eof
        } else {
            read_with_deadline(stream, &mut buf, room, head_deadline).await?
        };
        match outcome {
            ReadOutcome::Data(_) => continue,
            ReadOutcome::Eof | ReadOutcome::TimedOut => {
                let err = if is_blank(&buf) {
                    ParseError::Empty
                } else {
                    ParseError::Incomplete
                };
                return Err(err.into());
            }
        }
    };

    let declared = head.content_length();
    let mut body = buf.split_off(head.body_offset());

    if declared > 0 {
        let body_deadline = Instant::now() + config.body_timeout();
        while body.len() < declared {
            let wanted = declared - body.len();
            match read_with_deadline(stream, &mut body, wanted, body_deadline).await? {
                ReadOutcome::Data(_) => {}
                ReadOutcome::Eof | ReadOutcome::TimedOut => break,
            }
        }
    }

    Ok(head.into_request(body.to_vec())?)
}

/// Reads at most `max` bytes into `buf`, giving up at `deadline`.
async fn read_with_deadline(
    stream: &mut TcpStream,
    buf: &mut BytesMut,
    max: usize,
    deadline: Instant,
) -> io::Result<ReadOutcome> {
    let mut limited = (&mut *buf).limit(max);
    match timeout_at(deadline, stream.read_buf(&mut limited)).await {
        Err(_elapsed) => Ok(ReadOutcome::TimedOut),
        Ok(Ok(0)) => Ok(ReadOutcome::Eof),
        Ok(Ok(n)) => Ok(ReadOutcome::Data(n)),
        Ok(Err(e)) => Err(e),
    }
}

/// Discards what the client still sends until it closes its side.
///
/// Closing a socket with unread input resets the connection, which can destroy
/// a response the client has not read yet (an unread body after a `405` or
/// `413`, or a stray line terminator after the body). Bounded by the head
/// timeout and by the largest request the server would have accepted.
async fn drain(stream: &mut TcpStream, config: &ServerConfig) {
    let deadline = Instant::now() + config.head_timeout();
    let mut budget = config.head_buffer_size + config.max_content_length;
    let mut scratch = BytesMut::with_capacity(DRAIN_CHUNK);
    while budget > 0 {
        scratch.clear();
        match read_with_deadline(stream, &mut scratch, budget.min(DRAIN_CHUNK), deadline).await {
            Ok(ReadOutcome::Data(n)) => budget = budget.saturating_sub(n),
            Ok(ReadOutcome::Eof | ReadOutcome::TimedOut) | Err(_) => break,
        }
    }
}

async fn write_response(stream: &mut TcpStream, response: Response) -> io::Result<()> {
    stream.write_all(&response.into_bytes()).await?;
    stream.flush().await?;
    stream.shutdown().await
}
