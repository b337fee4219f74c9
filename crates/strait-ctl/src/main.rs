//! strait-ctl — command-line client for a running straitd.

use std::time::Duration;

use anyhow::{bail, Context, Result};

use strait_core::config::StraitConfig;
use strait_http::{Client, RetryPolicy};

const DEFAULT_SERVER: &str = "127.0.0.1:8080";

fn print_usage() {
    println!("Usage: strait-ctl [--addr <ip:port>] <command>");
    println!();
    println!("Commands");
    println!("  get <uri>               Issue a GET request");
    println!("  post <uri> <body>       Issue a POST request with a text body");
    println!();
    println!(
        "Options:\n  --addr <ip:port>        Server endpoint (default: {})",
        DEFAULT_SERVER
    );
    println!();
    println!("Examples:");
    println!("  strait-ctl get /hello");
    println!("  strait-ctl get /peers/alice");
    println!("  strait-ctl --addr 127.0.0.1:9000 post /echo 'hello world'");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --addr option
    let mut server = DEFAULT_SERVER.to_string();
    let mut remaining: Vec<String> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--addr" {
            i += 1;
            server = args.get(i).context("--addr requires a value")?.clone();
        } else {
            remaining.push(args[i].clone());
        }
        i += 1;
    }

    let remaining_refs: Vec<&str> = remaining.iter().map(|s| s.as_str()).collect();

    match remaining_refs.as_slice() {
        ["get", uri] => run_request(&server, "GET", uri, b"").await,
        ["post", uri, body] => run_request(&server, "POST", uri, body.as_bytes()).await,
        ["help"] | ["--help"] | ["-h"] | [] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

async fn run_request(server: &str, method: &str, uri: &str, body: &[u8]) -> Result<()> {
    let (ip, port) = server
        .rsplit_once(':')
        .context("expected server endpoint as <ip>:<port>")?;
    let port: u16 = port.parse().context("port must be a number")?;

    let config = StraitConfig::load().unwrap_or_default();
    let mut client = Client::bind("127.0.0.1", 0)
        .await
        .context("binding local socket")?;
    client.set_policy(RetryPolicy::from_config(&config.http));

    let timeout = Duration::from_millis(config.network.association_timeout_ms);
    if client.connect(ip, port, timeout).await.is_err() {
        client.close().await;
        bail!("could not reach {} within {}ms", server, timeout.as_millis());
    }

    let request = client.build_request(method, uri, body);
    let result = client.request(&request).await;
    client.close().await;

    let response = result.with_context(|| format!("{} {} failed", method, uri))?;
    println!(
        "{} {} {}",
        response.version,
        response.status.code(),
        response.reason
    );
    println!("{}", String::from_utf8_lossy(&response.body));
    Ok(())
}
