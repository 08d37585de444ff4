//! Response observation.
//!
//! [`ResponseObserver`] decorates a [`ResponseWriter`] and records the status
//! line and the number of body bytes actually written, without changing what
//! the underlying writer sees. It is the measuring half of the access-log
//! middleware.
//!
//! # Status Semantics
//!
//! ```text
//!   write_status(404) ──► status = 404, forwarded
//!   write_status(500) ──► ignored (first call wins)
//!
//!   write_body(b"..") with no status ──► write_status(200), then forwarded
//!   flush()           with no status ──► write_status(200), then forwarded
//!                                        when the writer can flush
//! ```
//!
//! # Optional Capabilities
//!
//! Not every writer can flush on demand or give up its raw connection. A
//! writer advertises what it supports through [`ResponseWriter::capabilities`];
//! the observer reads that set once at construction and:
//!
//! - turns `flush` into a successful no-op when flushing is unsupported
//! - fails `hijack` with [`LogError::HijackUnsupported`] when takeover is
//!   unsupported, without touching the writer
//!
//! A hijacked connection is no longer tracked. Once [`ResponseWriter::hijack`]
//! succeeds the observer forwards nothing more to the writer, and body writes
//! through it fail.

use std::io;

use axum::http::{HeaderMap, StatusCode};

use crate::error::{LogError, LogResult};

/// Optional features of a response writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Buffered data can be pushed to the client on demand.
    pub flush: bool,
    /// The raw connection can be taken over (protocol upgrades).
    pub hijack: bool,
}

impl Capabilities {
    pub const NONE: Self = Self {
        flush: false,
        hijack: false,
    };

    pub const ALL: Self = Self {
        flush: true,
        hijack: true,
    };
}

/// An outbound HTTP response stream.
pub trait ResponseWriter {
    /// Raw connection handed over by [`ResponseWriter::hijack`].
    type Conn;

    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Send the status line.
    fn write_status(&mut self, status: StatusCode);

    /// Write body bytes, returning how many were accepted.
    fn write_body(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn hijack(&mut self) -> LogResult<Self::Conn> {
        Err(LogError::HijackUnsupported)
    }
}

impl<W: ResponseWriter + ?Sized> ResponseWriter for &mut W {
    type Conn = W::Conn;

    fn headers_mut(&mut self) -> &mut HeaderMap {
        (**self).headers_mut()
    }

    fn write_status(&mut self, status: StatusCode) {
        (**self).write_status(status);
    }

    fn write_body(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write_body(buf)
    }

    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn hijack(&mut self) -> LogResult<Self::Conn> {
        (**self).hijack()
    }
}

/// Status and byte count of one response.
///
/// The status is recorded once; bytes only accumulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResponseStats {
    status: Option<StatusCode>,
    size: u64,
}

impl ResponseStats {
    /// Record `status` if none was recorded yet. Returns whether it was kept.
    pub fn record_status(&mut self, status: StatusCode) -> bool {
        if self.status.is_some() {
            return false;
        }
        self.status = Some(status);
        true
    }

    pub fn record_bytes(&mut self, n: u64) {
        self.size = self.size.saturating_add(n);
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Numeric status, `0` while unset.
    pub fn status_code(&self) -> u16 {
        self.status.map_or(0, |s| s.as_u16())
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Decorator that tracks the status and size of a response.
///
/// Implements [`ResponseWriter`] itself, so it can stand in for the writer it
/// wraps, and [`io::Write`] for `write!`-style handlers.
#[derive(Debug)]
pub struct ResponseObserver<W> {
    inner: W,
    capabilities: Capabilities,
    stats: ResponseStats,
    hijacked: bool,
}

impl<W: ResponseWriter> ResponseObserver<W> {
    pub fn new(inner: W) -> Self {
        let capabilities = inner.capabilities();
        Self {
            inner,
            capabilities,
            stats: ResponseStats::default(),
            hijacked: false,
        }
    }

    /// Status sent so far, `None` while nothing has been sent.
    pub fn status(&self) -> Option<StatusCode> {
        self.stats.status()
    }

    /// Body bytes accepted by the underlying writer.
    pub fn size(&self) -> u64 {
        self.stats.size()
    }

    /// Whether the raw connection has been taken over.
    pub fn hijacked(&self) -> bool {
        self.hijacked
    }

    pub fn stats(&self) -> ResponseStats {
        self.stats
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn ensure_status(&mut self) {
        if !self.hijacked && self.stats.status().is_none() {
            self.write_status(StatusCode::OK);
        }
    }
}

impl<W: ResponseWriter> ResponseWriter for ResponseObserver<W> {
    type Conn = W::Conn;

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_status(&mut self, status: StatusCode) {
        if self.hijacked {
            return;
        }
        if self.stats.record_status(status) {
            self.inner.write_status(status);
        }
    }

    fn write_body(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.hijacked {
            return Err(io::Error::other("connection has been hijacked"));
        }
        self.ensure_status();
        let n = self.inner.write_body(buf)?;
        self.stats.record_bytes(n as u64);
        Ok(n)
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.hijacked {
            return Ok(());
        }
        self.ensure_status();
        if self.capabilities.flush {
            self.inner.flush()
        } else {
            Ok(())
        }
    }

    fn hijack(&mut self) -> LogResult<Self::Conn> {
        if !self.capabilities.hijack {
            return Err(LogError::HijackUnsupported);
        }
        let conn = self.inner.hijack()?;
        self.hijacked = true;
        Ok(conn)
    }
}

impl<W: ResponseWriter> io::Write for ResponseObserver<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_body(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        ResponseWriter::flush(self)
    }
}
