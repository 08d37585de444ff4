//! HTTP access logging: one structured record per request.
//!
//! # Record
//!
//! Message `"Request"`, level derived from the final status by
//! [`level_for_status`], attributes in this order:
//!
//! | Key | Value |
//! |-----|-------|
//! | `name` | middleware name |
//! | `method` | request method |
//! | `ip` | resolved client IP, or `"unknown"` |
//! | `status` | final status code (`0` if the service failed) |
//! | `query` | request target, path and query |
//! | `size` | body size, IEC (`"1.5 KiB"`) |
//! | `length` | body size in bytes |
//! | `duration` | elapsed seconds |
//! | `agent` | `User-Agent` |
//! | `referer` | `Referer` |
//! | `auth` | group from the attached auth descriptor, if any |
//!
//! The record goes to the logger bound to the request
//! ([`LogContextExt`](crate::LogContextExt)), else to the middleware's
//! fallback logger, else to the process default as it stands when the
//! request arrives.
//!
//! # Shapes
//!
//! - [`AccessLog::serve`] for writer-style handlers driving a
//!   [`ResponseWriter`].
//! - [`AccessLogLayer`] for axum/tower services. The record is emitted once
//!   the response body has been fully produced, or when the body is dropped
//!   before that, so `size` and `duration` cover the whole response.
//!
//! ```text
//! Request → AccessLogService → inner service → Response<ObservedBody>
//!              │                                    │
//!          start timer                     frames counted, emit on
//!          snapshot request                end of stream or drop
//! ```

use std::borrow::Cow;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::http::header::{REFERER, USER_AGENT};
use axum::http::{HeaderMap, HeaderName, Request, Response, StatusCode};
use http_body::{Body as HttpBody, Frame, SizeHint};
use tower::{Layer, Service};

use super::ip::client_ip_string;
use crate::context::{AuthInfo, LogContextExt};
use crate::humanize::byte_count_iec;
use crate::logger::{Logger, NAME_KEY, default_logger};
use crate::observer::{ResponseObserver, ResponseStats, ResponseWriter};
use crate::record::{Attr, Level, Loggable};

/// Message of every access-log record.
pub const ACCESS_LOG_MESSAGE: &str = "Request";

/// Severity for a response status: `>= 500` error, `4xx` warn, else info.
pub fn level_for_status(status: u16) -> Level {
    match status {
        500.. => Level::Error,
        400..=499 => Level::Warn,
        _ => Level::Info,
    }
}

// =============================================================================
// Request Snapshot
// =============================================================================

/// What the record needs from the request, taken before dispatch.
struct RequestInfo {
    logger: Logger,
    method: String,
    ip: Cow<'static, str>,
    uri: String,
    agent: String,
    referer: String,
    auth: Option<Arc<dyn Loggable>>,
}

impl RequestInfo {
    fn capture<B>(req: &Request<B>, fallback: Option<&Logger>) -> Self {
        Self {
            logger: req
                .bound_logger()
                .or_else(|| fallback.cloned())
                .unwrap_or_else(default_logger),
            method: req.method().as_str().to_string(),
            ip: client_ip_string(req),
            uri: req
                .uri()
                .path_and_query()
                .map_or_else(|| "/".to_string(), |pq| pq.as_str().to_string()),
            agent: header_string(req.headers(), USER_AGENT),
            referer: header_string(req.headers(), REFERER),
            auth: req.auth_info(),
        }
    }

    fn emit(self, name: &str, stats: ResponseStats, started: Instant) {
        let status = stats.status_code();
        let level = level_for_status(status);
        if !self.logger.enabled(level) {
            return;
        }

        let size = stats.size();
        let mut attrs = vec![
            Attr::string(NAME_KEY, name),
            Attr::string("method", self.method),
            Attr::string("ip", self.ip),
            Attr::int("status", i64::from(status)),
            Attr::string("query", self.uri),
            Attr::string("size", byte_count_iec(size)),
            Attr::uint("length", size),
            Attr::float("duration", started.elapsed().as_secs_f64()),
            Attr::string("agent", self.agent),
            Attr::string("referer", self.referer),
        ];
        if let Some(auth) = &self.auth {
            attrs.push(Attr::loggable("auth", auth.as_ref()));
        }

        self.logger.log(level, ACCESS_LOG_MESSAGE, attrs);
    }
}

/// Header value as a string; empty when absent or not visible ASCII.
fn header_string(headers: &HeaderMap, name: HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

// =============================================================================
// Writer-Style Middleware
// =============================================================================

/// Access logger for writer-style handlers.
///
/// ```rust
/// use axum::http::{Request, StatusCode};
/// use slogx::{AccessLog, CaptureHandler, Logger, ResponseRecorder, ResponseWriter};
///
/// let capture = CaptureHandler::new();
/// let access = AccessLog::new("access").with_fallback(Logger::new(capture.clone()));
///
/// let req = Request::get("/items?page=2").body(()).unwrap();
/// let recorder = access.serve(&req, ResponseRecorder::new(), |w, _req| {
///     w.write_status(StatusCode::CREATED);
///     w.write_body(b"hello").unwrap();
/// });
///
/// assert_eq!(recorder.status(), StatusCode::CREATED);
/// assert_eq!(capture.len(), 1);
/// ```
#[derive(Clone)]
pub struct AccessLog {
    name: Arc<str>,
    fallback: Option<Logger>,
}

impl AccessLog {
    /// Access logger tagged `name`.
    ///
    /// Requests without a bound logger go to the process default, read per
    /// request, so a default installed after the middleware is built still
    /// receives them.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            fallback: None,
        }
    }

    /// Send requests without a bound logger to `logger` instead of the
    /// process default.
    pub fn with_fallback(mut self, logger: Logger) -> Self {
        self.fallback = Some(logger);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `handler` against `writer` wrapped in a [`ResponseObserver`],
    /// log the exchange, and hand the writer back.
    ///
    /// A handler that sends nothing is logged as `200`, which is also written
    /// to `writer`. A handler that hijacks the connection is logged with
    /// status `0` and nothing more is written.
    pub fn serve<B, W, F>(&self, req: &Request<B>, writer: W, handler: F) -> W
    where
        W: ResponseWriter,
        F: FnOnce(&mut ResponseObserver<W>, &Request<B>),
    {
        let started = Instant::now();
        let info = RequestInfo::capture(req, self.fallback.as_ref());

        let mut observer = ResponseObserver::new(writer);
        handler(&mut observer, req);
        if !observer.hijacked() && observer.status().is_none() {
            observer.write_status(StatusCode::OK);
        }

        info.emit(&self.name, observer.stats(), started);
        observer.into_inner()
    }
}

impl fmt::Debug for AccessLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessLog")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tower Middleware
// =============================================================================

/// Access-log layer for the Tower middleware stack.
#[derive(Clone, Debug)]
pub struct AccessLogLayer {
    access: AccessLog,
}

impl AccessLogLayer {
    /// Layer tagged `name`. Unbound requests go to the process default at
    /// request time, see [`AccessLog::new`].
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            access: AccessLog::new(name),
        }
    }

    pub fn with_fallback(self, logger: Logger) -> Self {
        Self {
            access: self.access.with_fallback(logger),
        }
    }
}

impl From<AccessLog> for AccessLogLayer {
    fn from(access: AccessLog) -> Self {
        Self { access }
    }
}

impl<S> Layer<S> for AccessLogLayer {
    type Service = AccessLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessLogService {
            inner,
            access: self.access.clone(),
        }
    }
}

/// Access-log service wrapper.
#[derive(Clone)]
pub struct AccessLogService<S> {
    inner: S,
    access: AccessLog,
}

impl<S> Service<Request<Body>> for AccessLogService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let started = Instant::now();
        let mut info = RequestInfo::capture(&req, self.access.fallback.as_ref());
        let name = Arc::clone(&self.access.name);

        let mut inner = self.inner.clone();

        Box::pin(async move {
            let response = match inner.call(req).await {
                Ok(response) => response,
                Err(e) => {
                    info.emit(&name, ResponseStats::default(), started);
                    return Err(e);
                }
            };

            let (parts, body) = response.into_parts();
            if let Some(AuthInfo(auth)) = parts.extensions.get::<AuthInfo>() {
                info.auth = Some(Arc::clone(auth));
            }

            let mut stats = ResponseStats::default();
            stats.record_status(parts.status);

            let body = ObservedBody {
                inner: body,
                pending: Some(PendingLog {
                    name,
                    info,
                    stats,
                    started,
                }),
            };
            Ok(Response::from_parts(parts, Body::new(body)))
        })
    }
}

/// Record waiting for the response body to finish.
struct PendingLog {
    name: Arc<str>,
    info: RequestInfo,
    stats: ResponseStats,
    started: Instant,
}

/// Response body that counts data frames and emits the access record once.
struct ObservedBody {
    inner: Body,
    pending: Option<PendingLog>,
}

impl ObservedBody {
    fn finish(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending
                .info
                .emit(&pending.name, pending.stats, pending.started);
        }
    }
}

impl HttpBody for ObservedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);

        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref()
                    && let Some(pending) = this.pending.as_mut()
                {
                    pending.stats.record_bytes(data.len() as u64);
                }
                if this.inner.is_end_stream() {
                    this.finish();
                }
            }
            Poll::Ready(Some(Err(_)) | None) => this.finish(),
            Poll::Pending => {}
        }

        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for ObservedBody {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::LogResult;
    use crate::handler::CaptureHandler;
    use crate::observer::Capabilities;
    use crate::recorder::ResponseRecorder;

    /// Writer that can hand over its connection, recording what it receives.
    #[derive(Default)]
    struct UpgradableWriter {
        headers: HeaderMap,
        statuses: Vec<StatusCode>,
        body: Vec<u8>,
    }

    impl ResponseWriter for UpgradableWriter {
        type Conn = &'static str;

        fn headers_mut(&mut self) -> &mut HeaderMap {
            &mut self.headers
        }

        fn write_status(&mut self, status: StatusCode) {
            self.statuses.push(status);
        }

        fn write_body(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.body.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::ALL
        }

        fn hijack(&mut self) -> LogResult<Self::Conn> {
            Ok("websocket")
        }
    }

    struct Session(&'static str);

    impl Loggable for Session {
        fn log_fields(&self) -> Vec<Attr> {
            vec![Attr::string("user", self.0), Attr::string("scheme", "bearer")]
        }
    }

    fn access_with_capture() -> (AccessLog, CaptureHandler) {
        let capture = CaptureHandler::new();
        let access = AccessLog::new("access").with_fallback(Logger::new(capture.clone()));
        (access, capture)
    }

    #[test]
    fn test_level_for_status() {
        assert_eq!(level_for_status(0), Level::Info);
        assert_eq!(level_for_status(200), Level::Info);
        assert_eq!(level_for_status(399), Level::Info);
        assert_eq!(level_for_status(400), Level::Warn);
        assert_eq!(level_for_status(499), Level::Warn);
        assert_eq!(level_for_status(500), Level::Error);
        assert_eq!(level_for_status(599), Level::Error);
        assert_eq!(level_for_status(u16::MAX), Level::Error);
    }

    #[test]
    fn test_serve_empty_handler_logs_ok() {
        let (access, capture) = access_with_capture();
        let req = Request::get("/").body(()).unwrap();

        let recorder = access.serve(&req, ResponseRecorder::new(), |_, _| {});

        assert_eq!(recorder.status(), StatusCode::OK);
        let records = capture.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.message, ACCESS_LOG_MESSAGE);
        assert_eq!(record.level, Level::Info);
        assert_eq!(record.attr("status").and_then(|v| v.as_i64()), Some(200));
        assert_eq!(record.attr("size").and_then(|v| v.as_str()), Some("0 B"));
        assert_eq!(record.attr("length").and_then(|v| v.as_i64()), Some(0));
    }

    #[test]
    fn test_serve_records_attributes_in_order() {
        let (access, capture) = access_with_capture();
        let req = Request::post("/orders?limit=5")
            .header("user-agent", "curl/8.5.0")
            .header("referer", "https://example.com/")
            .header("x-real-ip", "10.9.8.7")
            .body(())
            .unwrap();

        access.serve(&req, ResponseRecorder::new(), |w, _| {
            w.write_status(StatusCode::CREATED);
            w.write_body(b"hello").unwrap();
        });

        let record = capture.records().remove(0);
        let keys: Vec<_> = record.attrs.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(
            keys,
            [
                "name", "method", "ip", "status", "query", "size", "length", "duration", "agent",
                "referer"
            ]
        );
        assert_eq!(record.attr("name").and_then(|v| v.as_str()), Some("access"));
        assert_eq!(record.attr("method").and_then(|v| v.as_str()), Some("POST"));
        assert_eq!(record.attr("ip").and_then(|v| v.as_str()), Some("10.9.8.7"));
        assert_eq!(
            record.attr("query").and_then(|v| v.as_str()),
            Some("/orders?limit=5")
        );
        assert_eq!(record.attr("size").and_then(|v| v.as_str()), Some("5 B"));
        assert_eq!(record.attr("length").and_then(|v| v.as_i64()), Some(5));
        assert_eq!(
            record.attr("agent").and_then(|v| v.as_str()),
            Some("curl/8.5.0")
        );
        assert!(record.attr("duration").and_then(|v| v.as_f64()).unwrap() >= 0.0);
    }

    #[test]
    fn test_serve_level_follows_status() {
        let (access, capture) = access_with_capture();
        let req = Request::get("/").body(()).unwrap();

        access.serve(&req, ResponseRecorder::new(), |w, _| {
            w.write_status(StatusCode::METHOD_NOT_ALLOWED);
        });
        access.serve(&req, ResponseRecorder::new(), |w, _| {
            w.write_status(StatusCode::BAD_GATEWAY);
        });

        let records = capture.records();
        assert_eq!(records[0].level, Level::Warn);
        assert_eq!(records[0].attr("status").and_then(|v| v.as_i64()), Some(405));
        assert_eq!(records[1].level, Level::Error);
    }

    #[test]
    fn test_serve_prefers_bound_logger() {
        let (access, fallback) = access_with_capture();
        let bound = CaptureHandler::new();
        let mut req = Request::get("/").body(()).unwrap();
        req.attach_logger(Logger::new(bound.clone()));

        access.serve(&req, ResponseRecorder::new(), |_, _| {});

        assert!(fallback.is_empty());
        assert_eq!(bound.len(), 1);
    }

    #[test]
    fn test_serve_missing_path_logs_root() {
        let (access, capture) = access_with_capture();
        let req = Request::builder()
            .uri("http://example.com")
            .body(())
            .unwrap();

        access.serve(&req, ResponseRecorder::new(), |_, _| {});

        let record = capture.records().remove(0);
        assert_eq!(record.attr("query").and_then(|v| v.as_str()), Some("/"));
        assert_eq!(record.attr("ip").and_then(|v| v.as_str()), Some("unknown"));
    }

    #[test]
    fn test_serve_hijack_sends_nothing_more() {
        let (access, capture) = access_with_capture();
        let req = Request::get("/ws").body(()).unwrap();

        let writer = access.serve(&req, UpgradableWriter::default(), |w, _| {
            assert_eq!(w.hijack().unwrap(), "websocket");
            w.write_status(StatusCode::SWITCHING_PROTOCOLS);
        });

        assert!(writer.statuses.is_empty());
        assert!(writer.body.is_empty());
        let record = capture.records().remove(0);
        assert_eq!(record.level, Level::Info);
        assert_eq!(record.attr("status").and_then(|v| v.as_i64()), Some(0));
        assert_eq!(record.attr("length").and_then(|v| v.as_i64()), Some(0));
    }

    #[test]
    fn test_serve_flush_before_write_sends_single_ok() {
        let (access, capture) = access_with_capture();
        let req = Request::get("/stream").body(()).unwrap();

        let writer = access.serve(&req, UpgradableWriter::default(), |w, _| {
            ResponseWriter::flush(w).unwrap();
            w.write_body(b"chunk").unwrap();
            w.write_status(StatusCode::INTERNAL_SERVER_ERROR);
        });

        assert_eq!(writer.statuses, [StatusCode::OK]);
        assert_eq!(writer.body, b"chunk");
        let record = capture.records().remove(0);
        assert_eq!(record.level, Level::Info);
        assert_eq!(record.attr("status").and_then(|v| v.as_i64()), Some(200));
        assert_eq!(record.attr("size").and_then(|v| v.as_str()), Some("5 B"));
    }

    #[test]
    fn test_serve_logs_auth_group() {
        let (access, capture) = access_with_capture();
        let mut req = Request::get("/").body(()).unwrap();
        req.attach_auth_info(Session("dana"));

        access.serve(&req, ResponseRecorder::new(), |_, _| {});

        let record = capture.records().remove(0);
        let auth = record.attr("auth").and_then(|v| v.as_group()).unwrap();
        assert_eq!(
            auth,
            [
                Attr::string("user", "dana"),
                Attr::string("scheme", "bearer")
            ]
        );
    }
}
