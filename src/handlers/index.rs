//! Demo endpoints that log through the request-bound logger.
//!
//! - `GET /` - Greeting
//! - `POST /echo` - Echoes the body back; `X-User` is reported as the
//!   access-log `auth` group

use axum::body::Bytes;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::context::LogContextExt;
use crate::middleware::RequestLogger;
use crate::observer::ResponseWriter;
use crate::record::{Attr, Loggable};
use crate::recorder::ResponseRecorder;

/// Header naming the caller of `/echo`.
pub const USER_HEADER: &str = "x-user";

struct Caller {
    name: String,
}

impl Loggable for Caller {
    fn log_fields(&self) -> Vec<Attr> {
        vec![Attr::string("user", &self.name)]
    }
}

pub async fn index(RequestLogger(log): RequestLogger) -> &'static str {
    log.debug("index requested", vec![]);
    "slogx demo\n"
}

pub async fn echo(RequestLogger(log): RequestLogger, headers: HeaderMap, body: Bytes) -> Response {
    let mut recorder = ResponseRecorder::new();
    recorder.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );

    if body.is_empty() {
        recorder.write_status(StatusCode::NO_CONTENT);
    } else if let Err(e) = recorder.write_body(&body) {
        log.error("echo failed", vec![Attr::error(&e)]);
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    log.debug("echo", vec![Attr::uint("bytes", body.len() as u64)]);

    let mut response = recorder.into_response();
    if let Some(name) = headers.get(USER_HEADER).and_then(|v| v.to_str().ok()) {
        response.attach_auth_info(Caller {
            name: name.to_string(),
        });
    }
    response
}
