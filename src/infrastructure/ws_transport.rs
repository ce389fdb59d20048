// WebSocket transport backed by tokio-tungstenite
use crate::application::connection_machine::CLOSE_ABNORMAL;
use crate::application::transport::{
    SocketEvent, TelemetrySocket, TelemetryTransport, TransportError,
};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Close frame without a status code
const CLOSE_NO_STATUS: u16 = 1005;

#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TelemetryTransport for WebSocketTransport {
    async fn open(&self, endpoint: &str) -> Result<Box<dyn TelemetrySocket>, TransportError> {
        let (stream, response) = tokio_tungstenite::connect_async(endpoint)
            .await
            .map_err(|e| TransportError::Open {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!(
            "WebSocket handshake with {} returned {}",
            endpoint,
            response.status()
        );

        Ok(Box::new(WebSocketSocket {
            stream,
            failed: false,
        }))
    }
}

struct WebSocketSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    failed: bool,
}

#[async_trait]
impl TelemetrySocket for WebSocketSocket {
    async fn next_event(&mut self) -> SocketEvent {
        if self.failed {
            return SocketEvent::Closed(CLOSE_ABNORMAL);
        }

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return SocketEvent::Frame(text.to_string()),
                Some(Ok(Message::Binary(bytes))) => {
                    return SocketEvent::Frame(String::from_utf8_lossy(&bytes).into_owned());
                }
                Some(Ok(Message::Close(frame))) => {
                    let code = frame
                        .map(|f| u16::from(f.code))
                        .unwrap_or(CLOSE_NO_STATUS);
                    return SocketEvent::Closed(code);
                }
                // Pings are answered by tungstenite itself
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    self.failed = true;
                    return SocketEvent::Error(e.to_string());
                }
                None => return SocketEvent::Closed(CLOSE_ABNORMAL),
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }

    async fn close(&mut self, code: u16) {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: "".into(),
        };
        if let Err(e) = self.stream.close(Some(frame)).await {
            tracing::debug!("WebSocket close failed: {}", e);
        }
    }
}
