//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use paywindow::{EndpointConfig, EndpointSelector, HttpProber};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Start a backend that answers every request with `status`.
pub async fn start_mock_backend(status: u16) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = [0u8; 2048];
                        let _ = socket.read(&mut buf).await;
                        let status_text = match status {
                            200 => "200 OK",
                            302 => "302 Found",
                            404 => "404 Not Found",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Length: 0\r\nLocation: http://127.0.0.1:1/\r\nConnection: close\r\n\r\n",
                            status_text
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a backend that accepts connections and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    addr
}

/// An address nothing listens on.
#[allow(dead_code)]
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn base_url(addr: SocketAddr) -> String {
    format!("http://{}", addr)
}

/// Prober that ignores proxy environment variables.
pub fn local_prober() -> Arc<HttpProber> {
    let client = reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    Arc::new(HttpProber::with_client(client))
}

/// Selector over local backends with a one second probe timeout.
#[allow(dead_code)]
pub fn selector(default: SocketAddr, failovers: &[SocketAddr]) -> Arc<EndpointSelector> {
    let failovers: Vec<String> = failovers.iter().map(|a| base_url(*a)).collect();
    let config = EndpointConfig::new(&base_url(default), "/paywin/mobile", failovers)
        .unwrap()
        .with_timeout_secs(1);
    EndpointSelector::new(config, local_prober()).unwrap()
}

/// Upper bound for a cycle with one second probe timeouts.
#[allow(dead_code)]
pub const CYCLE_DEADLINE: Duration = Duration::from_secs(5);
