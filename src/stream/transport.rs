//! Transport seam between the stream channel and the network.
//!
//! [`StreamChannel`](super::StreamChannel) only talks to a boxed
//! [`Transport`] produced by a [`Connector`]. Production code uses the
//! WebSocket implementation below; tests substitute scripted doubles.

use std::net::{Shutdown, TcpStream};

use tracing::debug;
use tungstenite::protocol::CloseFrame;
use tungstenite::protocol::frame::coding::CloseCode;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use super::error::StreamError;

/// An open, message-framed, ordered connection.
pub trait Transport: Send {
    /// Transmit one text message. Fire-and-forget: no acknowledgement.
    fn send_text(&mut self, text: String) -> Result<(), StreamError>;

    /// Send a close control frame carrying `reason`.
    fn close(&mut self, reason: &str) -> Result<(), StreamError>;

    /// Handle that can tear the connection down from another thread while a
    /// send is blocked on it. `None` if the transport cannot be interrupted.
    fn interrupter(&self) -> Option<Box<dyn Interrupt>> {
        None
    }
}

/// Aborts a transport from outside, making a blocked send return an error.
pub trait Interrupt: Send + Sync {
    fn interrupt(&self);
}

/// Opens transports. Called from the channel's background connect thread.
pub trait Connector: Send + Sync {
    fn connect(&self, url: &str) -> Result<Box<dyn Transport>, StreamError>;
}

/// Plain `ws://` client built on `tungstenite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    fn connect(&self, url: &str) -> Result<Box<dyn Transport>, StreamError> {
        let (socket, response) =
            tungstenite::connect(url).map_err(|e| StreamError::Connect(e.to_string()))?;
        debug!("WebSocket handshake with {} done ({})", url, response.status());
        Ok(Box::new(WebSocketTransport { socket }))
    }
}

struct WebSocketTransport {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
}

impl Transport for WebSocketTransport {
    fn send_text(&mut self, text: String) -> Result<(), StreamError> {
        self.socket
            .send(Message::Text(text.into()))
            .map_err(|e| StreamError::Send(e.to_string()))
    }

    fn interrupter(&self) -> Option<Box<dyn Interrupt>> {
        match self.socket.get_ref() {
            MaybeTlsStream::Plain(stream) => match stream.try_clone() {
                Ok(stream) => Some(Box::new(SocketInterrupt { stream })),
                Err(e) => {
                    debug!("Could not clone socket handle: {}", e);
                    None
                }
            },
            _ => None,
        }
    }

    fn close(&mut self, reason: &str) -> Result<(), StreamError> {
        let frame = CloseFrame {
            code: CloseCode::Away,
            reason: reason.to_owned().into(),
        };
        self.socket
            .close(Some(frame))
            .map_err(|e| StreamError::Close(e.to_string()))?;
        // Push the queued close frame out; the peer's reply is not awaited.
        match self.socket.flush() {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(StreamError::Close(e.to_string())),
        }
    }
}

/// Second handle on the WebSocket's TCP stream.
struct SocketInterrupt {
    stream: TcpStream,
}

impl Interrupt for SocketInterrupt {
    fn interrupt(&self) {
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            debug!("Socket shutdown failed: {}", e);
        }
    }
}
