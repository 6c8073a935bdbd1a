//! hyper integration.
//!
//! [`Endpoint`] implements [`hyper::service::Service`] for any request body,
//! so it can be handed straight to a hyper connection builder. The body is
//! collected before the chain runs; a body that cannot be read is answered
//! with a `400` problem.
//!
//! ```rust,ignore
//! let endpoint = chain.endpoint(handler);
//! let (stream, peer) = listener.accept().await?;
//! tokio::spawn(
//!     http1::Builder::new().serve_connection(TokioIo::new(stream), endpoint.for_peer(peer)),
//! );
//! ```

use std::convert::Infallible;
use std::fmt::Display;
use std::net::SocketAddr;

use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::service::Service;
use httpgate_core::{present_error, BoxFuture, GateError, ProblemOptions, Response};

use crate::pipeline::Endpoint;

impl Endpoint {
    /// Serves one request with any body type.
    pub async fn serve<B>(&self, request: http::Request<B>, peer: Option<SocketAddr>) -> Response
    where
        B: Body,
        B::Error: Display,
    {
        let (mut parts, body) = request.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) => {
                let options = ProblemOptions {
                    instance: Some(parts.uri.path().to_string()),
                    ..ProblemOptions::default()
                };
                return present_error(
                    &GateError::invalid_input(format!("failed to read request body: {err}")),
                    StatusCode::BAD_REQUEST,
                    options,
                );
            }
        };
        if let Some(peer) = peer {
            parts.extensions.insert(peer);
        }
        self.call(http::Request::from_parts(parts, Full::new(body))).await
    }

    /// A service for one accepted connection. The peer address is made
    /// available to stages as a [`SocketAddr`] request extension.
    #[must_use]
    pub fn for_peer(&self, peer: SocketAddr) -> PeerService {
        PeerService {
            endpoint: self.clone(),
            peer,
        }
    }
}

impl<B> Service<http::Request<B>> for Endpoint
where
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Display + Send,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn call(&self, request: http::Request<B>) -> Self::Future {
        let endpoint = self.clone();
        Box::pin(async move { Ok(endpoint.serve(request, None).await) })
    }
}

/// An [`Endpoint`] bound to the remote address of one connection.
#[derive(Debug, Clone)]
pub struct PeerService {
    endpoint: Endpoint,
    peer: SocketAddr,
}

impl PeerService {
    /// The remote address.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl<B> Service<http::Request<B>> for PeerService
where
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Display + Send,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn call(&self, request: http::Request<B>) -> Self::Future {
        let endpoint = self.endpoint.clone();
        let peer = self.peer;
        Box::pin(async move { Ok(endpoint.serve(request, Some(peer)).await) })
    }
}
