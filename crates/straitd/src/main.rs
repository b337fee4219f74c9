//! straitd — demo HTTP/2.5 daemon over the strait transport.

use std::time::Instant;

use anyhow::{Context, Result};

use strait_core::config::StraitConfig;
use strait_http::{Response, Server, StatusCode};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing — RUST_LOG controls verbosity
    // e.g. RUST_LOG=debug cargo run -p straitd
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut config = StraitConfig::load().context("loading config")?;

    // Optional positional override: straitd [<ip:port>]
    if let Some(addr) = std::env::args().nth(1) {
        let (ip, port) = addr
            .rsplit_once(':')
            .context("expected bind address as <ip>:<port>")?;
        config.network.bind_addr = ip.to_string();
        config.network.bind_port = port.parse().context("port must be a number")?;
    }

    tracing::info!(
        addr = %config.network.bind_addr,
        port = config.network.bind_port,
        "straitd starting"
    );

    let mut server = Server::bind(&config.network.bind_addr, config.network.bind_port)
        .await
        .context("binding server")?;

    let started = Instant::now();

    server.route("/hello", |_request, _params| {
        Response::with_body(StatusCode::Ok, "Hello, World!")
    })?;

    server.route("/echo", |request, _params| {
        Response::with_body(StatusCode::Ok, request.body.clone())
    })?;

    server.route("/peers/:name", |_request, params| {
        let name = params.get("name").map(String::as_str).unwrap_or("stranger");
        Response::with_body(StatusCode::Ok, format!("Hello, {name}!"))
    })?;

    server.route("/status", move |_request, _params| {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_secs": started.elapsed().as_secs(),
        });
        let mut response = Response::with_body(StatusCode::Ok, status.to_string());
        response
            .headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        response
    })?;

    tokio::select! {
        _ = server.serve() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }

    server.close().await;
    Ok(())
}
