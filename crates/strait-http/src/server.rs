//! The HTTP/2.5 server: a transport socket plus a router.
//!
//! Incoming associations are accepted passively by the transport; the
//! server only reads delivered payloads, so one serve loop handles any
//! number of peers.

use std::time::Duration;

use strait_core::wire::RWND;
use strait_transport::{AssociationKey, Socket, TransportError};

use crate::parse::{parse_request, serialize_response};
use crate::router::{RouteError, RouteParams, Router};
use crate::types::{Request, Response, StatusCode};

/// How long the serve loop sleeps when no request is waiting.
const IDLE_POLL: Duration = Duration::from_millis(5);

pub struct Server {
    socket: Socket,
    router: Router,
}

impl Server {
    /// Bind the underlying transport socket.
    pub async fn bind(ip: &str, port: u16) -> Result<Server, TransportError> {
        Ok(Server {
            socket: Socket::bind(ip, port).await?,
            router: Router::new(),
        })
    }

    /// Register a route; see [`Router::register`] for the pattern grammar.
    pub fn route<H>(&mut self, pattern: &str, handler: H) -> Result<(), RouteError>
    where
        H: Fn(&Request, &RouteParams) -> Response + Send + Sync + 'static,
    {
        self.router.register(pattern, handler)
    }

    /// Start the transport and answer requests until the task is dropped.
    pub async fn serve(&self) {
        self.socket.run().await;
        tracing::info!(local = %self.socket.local_key(), "serving");

        let mut buf = vec![0u8; RWND];
        loop {
            match self.socket.recv_data(&mut buf).await {
                Some((peer, n)) => {
                    let response = self.respond(peer, &buf[..n]);
                    self.socket.send_data(peer, &serialize_response(&response)).await;
                }
                None => tokio::time::sleep(IDLE_POLL).await,
            }
        }
    }

    fn respond(&self, peer: AssociationKey, raw: &[u8]) -> Response {
        let request = match parse_request(raw) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(%peer, error = %e, "malformed request");
                return Response::with_body(StatusCode::BadRequest, "Bad Request");
            }
        };

        tracing::info!(%peer, method = %request.method, uri = %request.uri, "request");
        match self.router.match_route(&request.uri) {
            Some((route, params)) => (route.handler)(&request, &params),
            None => Response::with_body(StatusCode::NotFound, "Not Found"),
        }
    }

    /// Stop the transport event loop.
    pub async fn close(&self) {
        self.socket.close().await;
    }

    /// The server's bound endpoint.
    pub fn local_key(&self) -> AssociationKey {
        self.socket.local_key()
    }
}
