//! Binds a logger to every request.
//!
//! [`LoggerLayer`] attaches a logger to the request extensions before the
//! inner service runs, so handlers and [`AccessLogLayer`](super::AccessLogLayer)
//! both see it. Handlers read it back through [`LogContextExt`] or the
//! [`RequestLogger`] extractor:
//!
//! ```rust,no_run
//! use slogx::{Attr, RequestLogger};
//!
//! async fn create_order(RequestLogger(log): RequestLogger) -> &'static str {
//!     log.info("order created", vec![Attr::int("items", 3)]);
//!     "ok"
//! }
//! ```

use std::convert::Infallible;
use std::task::{Context, Poll};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{Request, Response};
use tower::{Layer, Service};

use crate::context::LogContextExt;
use crate::logger::Logger;

/// Logger-binding layer for the Tower middleware stack.
#[derive(Clone, Debug)]
pub struct LoggerLayer {
    logger: Logger,
}

impl LoggerLayer {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl<S> Layer<S> for LoggerLayer {
    type Service = LoggerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggerService {
            inner,
            logger: self.logger.clone(),
        }
    }
}

/// Logger-binding service wrapper.
#[derive(Clone, Debug)]
pub struct LoggerService<S> {
    inner: S,
    logger: Logger,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for LoggerService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        // Keep a logger bound further out.
        if req.bound_logger().is_none() {
            req.attach_logger(self.logger.clone());
        }
        self.inner.call(req)
    }
}

/// Extractor for the request's logger, or the default logger.
#[derive(Clone, Debug)]
pub struct RequestLogger(pub Logger);

impl<S> FromRequestParts<S> for RequestLogger
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.logger()))
    }
}
