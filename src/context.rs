//! Request-scoped logger and auth descriptor propagation.
//!
//! Both live in the request's [`Extensions`], each under its own key:
//!
//! - a [`Logger`] bound for the lifetime of the request (falls back to the
//!   process default when absent)
//! - an auth descriptor ([`AuthInfo`]), any [`Loggable`] value, picked up by
//!   the access-log middleware and logged as the `auth` group
//!
//! The request only carries an association: loggers are shared handles.
//!
//! ```rust
//! use axum::body::Body;
//! use axum::http::Request;
//! use slogx::{Attr, CaptureHandler, LogContextExt, Loggable, Logger};
//!
//! struct Session {
//!     user: &'static str,
//! }
//!
//! impl Loggable for Session {
//!     fn log_fields(&self) -> Vec<Attr> {
//!         vec![Attr::string("user", self.user)]
//!     }
//! }
//!
//! let capture = CaptureHandler::new();
//! let mut req = Request::new(Body::empty());
//! req.attach_logger(Logger::new(capture.clone()));
//! req.attach_auth_info(Session { user: "admin" });
//!
//! req.named_logger("orders").info("listing", vec![]);
//! assert_eq!(capture.len(), 1);
//! assert!(req.auth_info().is_some());
//! ```

use std::fmt;
use std::sync::Arc;

use axum::http::{Extensions, Request, Response};

use crate::logger::{Logger, default_logger};
use crate::record::{Attr, Loggable};

#[derive(Clone)]
struct BoundLogger(Logger);

/// Auth descriptor stored in request or response extensions.
#[derive(Clone)]
pub struct AuthInfo(pub Arc<dyn Loggable>);

impl AuthInfo {
    pub fn new(info: impl Loggable + 'static) -> Self {
        Self(Arc::new(info))
    }
}

impl fmt::Debug for AuthInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AuthInfo").field(&self.0.log_fields()).finish()
    }
}

/// Access to the logger and auth descriptor carried by a request.
pub trait LogContextExt {
    fn attach_logger(&mut self, logger: Logger);

    /// The logger bound to this request, if any.
    fn bound_logger(&self) -> Option<Logger>;

    fn attach_auth_info(&mut self, info: impl Loggable + 'static);

    fn auth_info(&self) -> Option<Arc<dyn Loggable>>;

    /// The bound logger, or the process default.
    fn logger(&self) -> Logger {
        self.bound_logger().unwrap_or_else(default_logger)
    }

    /// [`LogContextExt::logger`] with extra attributes.
    fn logger_with(&self, attrs: Vec<Attr>) -> Logger {
        self.logger().with(attrs)
    }

    /// [`LogContextExt::logger`] with a `name` attribute.
    fn named_logger(&self, name: &str) -> Logger {
        self.logger().named(name)
    }
}

impl LogContextExt for Extensions {
    fn attach_logger(&mut self, logger: Logger) {
        self.insert(BoundLogger(logger));
    }

    fn bound_logger(&self) -> Option<Logger> {
        self.get::<BoundLogger>().map(|bound| bound.0.clone())
    }

    fn attach_auth_info(&mut self, info: impl Loggable + 'static) {
        self.insert(AuthInfo::new(info));
    }

    fn auth_info(&self) -> Option<Arc<dyn Loggable>> {
        self.get::<AuthInfo>().map(|auth| Arc::clone(&auth.0))
    }
}

impl<B> LogContextExt for Request<B> {
    fn attach_logger(&mut self, logger: Logger) {
        self.extensions_mut().attach_logger(logger);
    }

    fn bound_logger(&self) -> Option<Logger> {
        self.extensions().bound_logger()
    }

    fn attach_auth_info(&mut self, info: impl Loggable + 'static) {
        self.extensions_mut().attach_auth_info(info);
    }

    fn auth_info(&self) -> Option<Arc<dyn Loggable>> {
        self.extensions().auth_info()
    }
}

/// Lets inner handlers report the authenticated principal back to an outer
/// access-log layer.
impl<B> LogContextExt for Response<B> {
    fn attach_logger(&mut self, logger: Logger) {
        self.extensions_mut().attach_logger(logger);
    }

    fn bound_logger(&self) -> Option<Logger> {
        self.extensions().bound_logger()
    }

    fn attach_auth_info(&mut self, info: impl Loggable + 'static) {
        self.extensions_mut().attach_auth_info(info);
    }

    fn auth_info(&self) -> Option<Arc<dyn Loggable>> {
        self.extensions().auth_info()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::handler::CaptureHandler;
    use crate::logger::NAME_KEY;

    struct Role(&'static str);

    impl Loggable for Role {
        fn log_fields(&self) -> Vec<Attr> {
            vec![Attr::string("role", self.0)]
        }
    }

    #[test]
    fn test_bound_logger_is_returned() {
        let capture = CaptureHandler::new();
        let mut ext = Extensions::new();
        ext.attach_logger(Logger::new(capture.clone()));

        ext.logger().info("bound", vec![]);

        assert_eq!(capture.len(), 1);
    }

    #[test]
    fn test_no_bound_logger() {
        let ext = Extensions::new();
        assert!(ext.bound_logger().is_none());
    }

    #[test]
    fn test_attached_logger_is_shared_not_copied() {
        let capture = CaptureHandler::new();
        let logger = Logger::new(capture.clone());
        let mut a = Extensions::new();
        let mut b = Extensions::new();
        a.attach_logger(logger.clone());
        b.attach_logger(logger);

        a.logger().info("from a", vec![]);
        b.logger().info("from b", vec![]);

        assert_eq!(capture.len(), 2);
    }

    #[test]
    fn test_logger_with_and_named() {
        let capture = CaptureHandler::new();
        let mut req = Request::new(());
        req.attach_logger(Logger::new(capture.clone()));

        req.logger_with(vec![Attr::string("request_id", "abc")])
            .info("with", vec![]);
        req.named_logger("billing").info("named", vec![]);

        let records = capture.records();
        assert_eq!(
            records[0].attr("request_id").and_then(|v| v.as_str()),
            Some("abc")
        );
        assert_eq!(
            records[1].attr(NAME_KEY).and_then(|v| v.as_str()),
            Some("billing")
        );
    }

    #[test]
    fn test_auth_info_round_trip() {
        let mut req = Request::new(());
        assert!(req.auth_info().is_none());

        req.attach_auth_info(Role("admin"));

        let fields = req.auth_info().unwrap().log_fields();
        assert_eq!(fields, vec![Attr::string("role", "admin")]);
    }

    #[test]
    fn test_auth_info_on_response() {
        let mut resp = Response::new(());
        resp.attach_auth_info(Role("viewer"));

        assert!(resp.auth_info().is_some());
        assert!(resp.bound_logger().is_none());
    }
}
