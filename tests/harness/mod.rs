//! Integration test harness
//!
//! - `free_port` - a port nothing is listening on
//! - `echo_context` - context with an echoing `/ws` endpoint and `/health`
//! - `WsClient` - tokio-tungstenite client with text helpers

#![allow(dead_code)]

mod client;

use std::net::SocketAddr;

use axum::{
    extract::ws::{Message, WebSocket},
    routing::get,
};
use lodge_test_server::{telemetry, ApplicationContext};

pub use client::WsClient;

/// Find a port that is currently free on the loopback interface
pub fn free_port() -> u16 {
    telemetry::init_test_tracing();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    port
}

/// Echo every text and binary message back to the sender
pub async fn echo(mut socket: WebSocket) {
    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(_) | Message::Binary(_) => {
                if socket.send(msg).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}

/// Context exposing `/ws` (echo) and `/health`
pub fn echo_context() -> ApplicationContext {
    let mut ctx = ApplicationContext::new("echo");
    ctx.websocket("/ws", echo)
        .and_then(|ctx| ctx.route("/health", get(|| async { "ok" })))
        .expect("echo context wiring");
    ctx
}

/// True if a TCP connection to `addr` can be established
pub async fn can_connect(addr: SocketAddr) -> bool {
    tokio::net::TcpStream::connect(addr).await.is_ok()
}
