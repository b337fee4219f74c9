//! HTTP/2.5 round trips over the transport, client to server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use strait_http::{parse_response, Client, Response, Server, StatusCode};

use crate::*;

async fn demo_server() -> Result<Arc<Server>> {
    let mut server = Server::bind("127.0.0.1", 0).await?;
    server.route("/hello", |_request, _params| {
        Response::with_body(StatusCode::Ok, "Hello, World!")
    })?;
    server.route("/echo", |request, _params| {
        Response::with_body(StatusCode::Ok, request.body.clone())
    })?;
    server.route("/peers/:name", |_request, params| {
        let name = params.get("name").map(String::as_str).unwrap_or("stranger");
        Response::with_body(StatusCode::Ok, format!("Hello, {}!", name))
    })?;
    Ok(Arc::new(server))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn client_server_round_trip() -> Result<()> {
    let server = demo_server().await?;
    let server_port = server.local_key().port;
    let serve_task = {
        let server = server.clone();
        tokio::spawn(async move { server.serve().await })
    };

    let mut client = Client::bind("127.0.0.1", 0).await?;
    client
        .connect("127.0.0.1", server_port, ESTABLISH_TIMEOUT)
        .await?;

    let response = client.get("/hello").await?;
    assert_eq!(response.status, StatusCode::Ok);
    assert_eq!(response.body, b"Hello, World!");
    assert_eq!(response.header("content-type"), Some("text/plain"));

    let response = client.post("/echo", b"ping-pong").await?;
    assert_eq!(response.status, StatusCode::Ok);
    assert_eq!(response.body, b"ping-pong");

    let response = client.get("/peers/alice").await?;
    assert_eq!(response.body, b"Hello, alice!");

    let response = client.get("/missing").await?;
    assert_eq!(response.status, StatusCode::NotFound);

    client.close().await;
    serve_task.abort();
    server.close().await;
    Ok(())
}

/// A request in any version other than HTTP/2.5 gets a 400, straight from
/// the wire.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn wrong_version_gets_bad_request() -> Result<()> {
    let server = demo_server().await?;
    let server_port = server.local_key().port;
    let serve_task = {
        let server = server.clone();
        tokio::spawn(async move { server.serve().await })
    };

    // Speak to the server's transport directly so we can send a request
    // the client refuses to build.
    let socket = spawn_socket().await?;
    let key = socket.associate("127.0.0.1", server_port).await?;
    socket.await_established(key, ESTABLISH_TIMEOUT).await?;

    socket
        .send_data(key, b"GET /hello HTTP/1.1\r\n\r\n")
        .await;

    let mut buf = vec![0u8; 2048];
    let n = recv_from_with_retry(&socket, key, &mut buf).await?;
    let response = parse_response(&buf[..n])?;
    assert_eq!(response.status, StatusCode::BadRequest);

    socket.close().await;
    serve_task.abort();
    server.close().await;
    Ok(())
}

/// The client resends across response loss it cannot see; a second request
/// on the same association also works.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sequential_requests_share_one_association() -> Result<()> {
    let server = demo_server().await?;
    let server_port = server.local_key().port;
    let serve_task = {
        let server = server.clone();
        tokio::spawn(async move { server.serve().await })
    };

    let mut client = Client::bind("127.0.0.1", 0).await?;
    client
        .connect("127.0.0.1", server_port, ESTABLISH_TIMEOUT)
        .await?;

    for i in 0..3 {
        let body = format!("round {}", i);
        let response = client.post("/echo", body.as_bytes()).await?;
        assert_eq!(response.body, body.as_bytes());
    }

    client.close().await;
    serve_task.abort();
    server.close().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn connect_timeout_is_reported() -> Result<()> {
    let mut client = Client::bind("127.0.0.1", 0).await?;
    let result = client
        .connect("127.0.0.1", 9, Duration::from_millis(200))
        .await;
    assert!(result.is_err(), "nothing listens on port 9");
    client.close().await;
    Ok(())
}
