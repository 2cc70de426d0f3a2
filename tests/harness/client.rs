//! WsClient - WebSocket client for driving test servers

use std::time::Duration;

use anyhow::{bail, Result};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Message},
    MaybeTlsStream, WebSocketStream,
};

type Stream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// WebSocket test client
pub struct WsClient {
    stream: Stream,
    /// HTTP status of the handshake response
    pub status: u16,
    /// Sub-protocol selected by the server, if any
    pub protocol: Option<String>,
}

impl WsClient {
    /// Connect to a WebSocket URL
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_protocols(url, &[]).await
    }

    /// Connect offering the given sub-protocols
    pub async fn connect_with_protocols(url: &str, protocols: &[&str]) -> Result<Self> {
        let mut request = url.into_client_request()?;
        if !protocols.is_empty() {
            request.headers_mut().insert(
                "Sec-WebSocket-Protocol",
                HeaderValue::from_str(&protocols.join(", "))?,
            );
        }

        let (stream, response) = connect_async(request).await?;
        let protocol = response
            .headers()
            .get("Sec-WebSocket-Protocol")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(Self {
            stream,
            status: response.status().as_u16(),
            protocol,
        })
    }

    /// Send a text message
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.stream
            .send(Message::Text(text.to_string().into()))
            .await?;
        Ok(())
    }

    /// Receive the next text message
    pub async fn recv_text(&mut self) -> Result<String> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.to_string()),
                Some(Ok(Message::Close(_))) | None => bail!("WebSocket closed"),
                Some(Err(e)) => return Err(e.into()),
                _ => continue, // Skip binary/ping/pong frames
            }
        }
    }

    /// Receive with timeout
    pub async fn recv_text_timeout(&mut self, timeout: Duration) -> Result<String> {
        match tokio::time::timeout(timeout, self.recv_text()).await {
            Ok(result) => result,
            Err(_) => bail!("Timeout waiting for WebSocket message"),
        }
    }

    /// Send a message and wait for the echo
    pub async fn round_trip(&mut self, text: &str) -> Result<String> {
        self.send_text(text).await?;
        self.recv_text_timeout(Duration::from_secs(5)).await
    }

    /// Close the connection
    pub async fn close(&mut self) -> Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}
