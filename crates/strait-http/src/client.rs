//! The HTTP/2.5 client: one association to a server, request/response with
//! bounded resend. The transport has no retransmission, so a lost datagram
//! is recovered here by re-sending the whole request.

use std::time::Duration;

use strait_core::config::HttpConfig;
use strait_core::wire::RWND;
use strait_transport::{AssociationKey, Socket, TransportError};

use crate::parse::{parse_response, serialize_request, ParseError};
use crate::types::{Request, Response};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("client is not connected")]
    NotConnected,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("no response after {0} attempts")]
    NoResponse(u32),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// How hard to try before declaring a request lost.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub poll_interval: Duration,
    pub polls_per_attempt: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from_config(&HttpConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &HttpConfig) -> Self {
        RetryPolicy {
            attempts: config.request_retries,
            poll_interval: Duration::from_millis(config.response_poll_ms),
            polls_per_attempt: config.polls_per_attempt,
        }
    }
}

pub struct Client {
    socket: Socket,
    server: Option<AssociationKey>,
    policy: RetryPolicy,
}

impl Client {
    /// Bind a local endpoint and start its transport. Port 0 picks an
    /// ephemeral port.
    pub async fn bind(ip: &str, port: u16) -> Result<Client, TransportError> {
        let socket = Socket::bind(ip, port).await?;
        socket.run().await;
        Ok(Client {
            socket,
            server: None,
            policy: RetryPolicy::default(),
        })
    }

    pub fn set_policy(&mut self, policy: RetryPolicy) {
        self.policy = policy;
    }

    /// Associate with the server and wait for establishment.
    pub async fn connect(
        &mut self,
        server_ip: &str,
        server_port: u16,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        let key = self.socket.associate(server_ip, server_port).await?;
        self.socket.await_established(key, timeout).await?;
        self.server = Some(key);
        tracing::info!(server = %key, "connected");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.server.is_some()
    }

    /// Build a request with the default header set.
    pub fn build_request(&self, method: &str, uri: &str, body: &[u8]) -> Request {
        let mut request = Request::new(method, uri);
        request
            .headers
            .insert("Host".to_string(), self.socket.local_key().to_string());
        request
            .headers
            .insert("Connection".to_string(), "close".to_string());
        request
            .headers
            .insert("User-Agent".to_string(), "strait-client/0.1".to_string());
        if !body.is_empty() {
            request
                .headers
                .insert("Content-Length".to_string(), body.len().to_string());
            request.headers.insert(
                "Content-Type".to_string(),
                "application/octet-stream".to_string(),
            );
            request.body = body.to_vec();
        }
        request
    }

    pub async fn get(&self, uri: &str) -> Result<Response, ClientError> {
        self.request(&self.build_request("GET", uri, &[])).await
    }

    pub async fn post(&self, uri: &str, body: &[u8]) -> Result<Response, ClientError> {
        self.request(&self.build_request("POST", uri, body)).await
    }

    /// Send a request and wait for its response, re-sending the request
    /// when a poll window expires without one.
    pub async fn request(&self, request: &Request) -> Result<Response, ClientError> {
        let server = self.server.ok_or(ClientError::NotConnected)?;
        let wire = serialize_request(request);
        let mut buf = vec![0u8; RWND];

        for attempt in 1..=self.policy.attempts {
            self.socket.send_data(server, &wire).await;
            for _ in 0..self.policy.polls_per_attempt {
                let n = self.socket.recv_data_from(server, &mut buf).await;
                if n > 0 {
                    return Ok(parse_response(&buf[..n])?);
                }
                tokio::time::sleep(self.policy.poll_interval).await;
            }
            tracing::debug!(uri = %request.uri, attempt, "no response yet, re-sending");
        }

        Err(ClientError::NoResponse(self.policy.attempts))
    }

    /// Shut down the local transport.
    pub async fn close(&self) {
        self.socket.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_without_connect_fails() {
        let client = Client::bind("127.0.0.1", 0).await.expect("bind");
        let result = client.get("/hello").await;
        assert!(matches!(result, Err(ClientError::NotConnected)));
        client.close().await;
    }

    #[tokio::test]
    async fn build_request_sets_default_headers() {
        let client = Client::bind("127.0.0.1", 0).await.expect("bind");
        let request = client.build_request("POST", "/echo", b"data");
        assert_eq!(request.version, "HTTP/2.5");
        assert_eq!(
            request.headers.get("Content-Length").map(String::as_str),
            Some("4")
        );
        assert_eq!(
            request.headers.get("Connection").map(String::as_str),
            Some("close")
        );
        assert!(request.headers.contains_key("Host"));
        client.close().await;
    }

    #[tokio::test]
    async fn connect_to_dead_endpoint_times_out() {
        let mut client = Client::bind("127.0.0.1", 0).await.expect("bind");
        // Nothing is listening here; the INIT is simply lost.
        let result = client
            .connect("127.0.0.1", 1, Duration::from_millis(100))
            .await;
        assert!(matches!(result, Err(TransportError::Timeout)));
        client.close().await;
    }
}
