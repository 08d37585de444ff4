use std::convert::Infallible;
use std::io;

use axum::body::Body;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::observer::{Capabilities, ResponseWriter};

/// In-memory [`ResponseWriter`].
///
/// Buffers status, headers and body so writer-style handlers can run inside
/// an axum service: hand the recorder to the handler, then turn it into a
/// [`Response`]. Supports flushing (counted), not hijacking.
///
/// ```rust
/// use axum::http::StatusCode;
/// use slogx::{ResponseRecorder, ResponseWriter};
///
/// let mut recorder = ResponseRecorder::new();
/// recorder.write_status(StatusCode::CREATED);
/// recorder.write_body(b"hello").unwrap();
///
/// assert_eq!(recorder.status(), StatusCode::CREATED);
/// assert_eq!(recorder.body(), b"hello");
/// ```
#[derive(Debug, Default)]
pub struct ResponseRecorder {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
    flushes: usize,
}

impl ResponseRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded status, `200 OK` if none was written.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn flush_count(&self) -> usize {
        self.flushes
    }
}

impl ResponseWriter for ResponseRecorder {
    type Conn = Infallible;

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_status(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    fn write_body(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            flush: true,
            hijack: false,
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

impl IntoResponse for ResponseRecorder {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::LogError;
    use crate::observer::ResponseObserver;

    #[test]
    fn test_recorder_defaults_to_ok() {
        let recorder = ResponseRecorder::new();
        assert_eq!(recorder.status(), StatusCode::OK);
        assert!(recorder.body().is_empty());
    }

    #[test]
    fn test_recorder_through_observer() {
        let mut observer = ResponseObserver::new(ResponseRecorder::new());

        observer.write_status(StatusCode::ACCEPTED);
        observer.write_body(b"queued").unwrap();
        ResponseWriter::flush(&mut observer).unwrap();

        assert!(matches!(observer.hijack(), Err(LogError::HijackUnsupported)));

        let recorder = observer.into_inner();
        assert_eq!(recorder.status(), StatusCode::ACCEPTED);
        assert_eq!(recorder.body(), b"queued");
        assert_eq!(recorder.flush_count(), 1);
    }

    #[tokio::test]
    async fn test_recorder_into_response() {
        let mut recorder = ResponseRecorder::new();
        recorder
            .headers_mut()
            .insert("content-type", "text/plain".parse().unwrap());
        recorder.write_status(StatusCode::IM_A_TEAPOT);
        recorder.write_body(b"short and stout").unwrap();

        let response = recorder.into_response();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(response.headers()["content-type"], "text/plain");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"short and stout");
    }
}
