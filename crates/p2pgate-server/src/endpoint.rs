//! Relay endpoint capability traits and their WebSocket/TCP adapters.
//!
//! Every endpoint half used by the bridge must implement [`RelayRead`] or
//! [`RelayWrite`]; in particular `close` is part of the write contract, so
//! the bridge never has to ask at runtime whether an endpoint can be closed.

use std::future::Future;
use std::pin::Pin;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::debug;

use p2pgate_core::{GateError, GateResult};

/// Read half of a relay endpoint. `Ok(None)` signals a clean end-of-stream.
pub trait RelayRead: Send {
    fn recv(&mut self) -> Pin<Box<dyn Future<Output = GateResult<Option<Vec<u8>>>> + Send + '_>>;
}

/// Write half of a relay endpoint.
pub trait RelayWrite: Send {
    fn send<'a>(
        &'a mut self,
        data: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = GateResult<()>> + Send + 'a>>;

    /// Close this half so the peer observes end-of-stream.
    fn close(&mut self) -> Pin<Box<dyn Future<Output = GateResult<()>> + Send + '_>>;
}

/// Read half of an upgraded client WebSocket.
///
/// Binary frames are relay payload. Text frames are not part of the relay
/// contract and are dropped with a log line; ping/pong is handled by the
/// protocol layer.
pub struct WsReader(SplitStream<WebSocket>);

impl WsReader {
    pub fn new(stream: SplitStream<WebSocket>) -> Self {
        Self(stream)
    }
}

impl RelayRead for WsReader {
    fn recv(&mut self) -> Pin<Box<dyn Future<Output = GateResult<Option<Vec<u8>>>> + Send + '_>> {
        Box::pin(async move {
            loop {
                match self.0.next().await {
                    Some(Ok(Message::Binary(data))) => return Ok(Some(data.to_vec())),
                    Some(Ok(Message::Text(text))) => {
                        debug!(len = text.len(), "ignoring text frame from client");
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => return Ok(None),
                    Some(Err(e)) => {
                        return Err(GateError::Transport(format!("websocket recv failed: {e}")))
                    }
                }
            }
        })
    }
}

/// Write half of an upgraded client WebSocket. Payload goes out as binary
/// frames; `close` sends a normal-closure close frame.
pub struct WsWriter(SplitSink<WebSocket, Message>);

impl WsWriter {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self(sink)
    }
}

impl RelayWrite for WsWriter {
    fn send<'a>(
        &'a mut self,
        data: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = GateResult<()>> + Send + 'a>> {
        Box::pin(async move {
            self.0
                .send(Message::Binary(data.to_vec().into()))
                .await
                .map_err(|e| GateError::Transport(format!("websocket send failed: {e}")))
        })
    }

    fn close(&mut self) -> Pin<Box<dyn Future<Output = GateResult<()>> + Send + '_>> {
        Box::pin(async move {
            self.0
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::NORMAL,
                    reason: "".into(),
                })))
                .await
                .map_err(|e| GateError::Transport(format!("websocket close failed: {e}")))
        })
    }
}

/// Read half of the dialed destination TCP connection.
pub struct TcpReader {
    half: OwnedReadHalf,
    buf: Vec<u8>,
}

impl TcpReader {
    pub fn new(half: OwnedReadHalf) -> Self {
        Self {
            half,
            buf: vec![0u8; 8192],
        }
    }
}

impl RelayRead for TcpReader {
    fn recv(&mut self) -> Pin<Box<dyn Future<Output = GateResult<Option<Vec<u8>>>> + Send + '_>> {
        Box::pin(async move {
            let n = self.half.read(&mut self.buf).await?;
            if n == 0 {
                return Ok(None);
            }
            Ok(Some(self.buf[..n].to_vec()))
        })
    }
}

/// Write half of the dialed destination TCP connection. `close` shuts down
/// the write direction so the destination observes end-of-stream.
pub struct TcpWriter(OwnedWriteHalf);

impl TcpWriter {
    pub fn new(half: OwnedWriteHalf) -> Self {
        Self(half)
    }
}

impl RelayWrite for TcpWriter {
    fn send<'a>(
        &'a mut self,
        data: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = GateResult<()>> + Send + 'a>> {
        Box::pin(async move {
            self.0.write_all(data).await?;
            Ok(())
        })
    }

    fn close(&mut self) -> Pin<Box<dyn Future<Output = GateResult<()>> + Send + '_>> {
        Box::pin(async move {
            self.0.shutdown().await?;
            Ok(())
        })
    }
}
