//! Response sink abstraction.
//!
//! A [`ResponseSink`] is the write side of an HTTP response: a header map, a
//! status line written once, and body chunks. Decorators (such as the error
//! interceptor) implement the same trait and forward to an inner sink,
//! overriding only what they need.

use bytes::BytesMut;
use http::{HeaderMap, StatusCode};
use http_body_util::Full;

use crate::types::Response;

/// The write side of an HTTP response.
pub trait ResponseSink {
    /// Mutable access to the response headers.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Writes the status line. Only the first call has an effect.
    fn write_header(&mut self, status: StatusCode);

    /// Writes a body chunk. Implies `write_header(200)` if no status was written yet.
    fn write(&mut self, chunk: &[u8]);
}

/// A sink that buffers everything written to it and turns it into a [`Response`].
///
/// # Example
///
/// ```
/// use httpgate_core::{ResponseSink, ResponseWriter};
/// use http::StatusCode;
///
/// let mut writer = ResponseWriter::new();
/// writer.write_header(StatusCode::CREATED);
/// writer.write(b"done");
///
/// let response = writer.into_response();
/// assert_eq!(response.status(), StatusCode::CREATED);
/// ```
#[derive(Debug, Default)]
pub struct ResponseWriter {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

impl ResponseWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the status written so far, if any.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Returns the body bytes written so far.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Finishes the response. A writer that never had a status written yields 200.
    #[must_use]
    pub fn into_response(self) -> Response {
        let mut response = http::Response::new(Full::new(self.body.freeze()));
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

impl ResponseSink for ResponseWriter {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        if self.status.is_some() {
            tracing::debug!(status = status.as_u16(), "superfluous write_header call ignored");
            return;
        }
        self.status = Some(status);
    }

    fn write(&mut self, chunk: &[u8]) {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_without_header_implies_ok() {
        let mut writer = ResponseWriter::new();
        writer.write(b"hello");
        assert_eq!(writer.status(), Some(StatusCode::OK));
        assert_eq!(writer.body(), b"hello");
    }

    #[test]
    fn test_first_write_header_wins() {
        let mut writer = ResponseWriter::new();
        writer.write_header(StatusCode::NOT_FOUND);
        writer.write_header(StatusCode::OK);
        assert_eq!(writer.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_headers_carry_into_response() {
        let mut writer = ResponseWriter::new();
        writer
            .headers_mut()
            .insert("x-test", http::HeaderValue::from_static("1"));
        writer.write_header(StatusCode::ACCEPTED);

        let response = writer.into_response();
        assert_eq!(response.headers().get("x-test").unwrap(), "1");
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[test]
    fn test_untouched_writer_is_empty_ok() {
        let response = ResponseWriter::new().into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
