//! Common request and response types shared by every httpgate crate.

use bytes::Bytes;
use http_body_util::Full;
use std::future::Future;
use std::pin::Pin;

/// The HTTP request type flowing through the pipeline.
///
/// This is a standard `http::Request` with a fully collected `Full<Bytes>` body.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type flowing through the pipeline.
pub type Response = http::Response<Full<Bytes>>;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Builds a response with the given status, content type and body.
///
/// Used by handlers that render plain payloads (health, status).
pub fn text_response(status: http::StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response {
    let mut response = http::Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static(content_type),
    );
    response
}

/// Builds an empty-bodied response with the given status.
pub fn empty_response(status: http::StatusCode) -> Response {
    let mut response = http::Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_text_response() {
        let response = text_response(StatusCode::OK, "text/plain; charset=utf-8", "OK");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(http::header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn test_empty_response() {
        let response = empty_response(StatusCode::NO_CONTENT);
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers().is_empty());
    }
}
