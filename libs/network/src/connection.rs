//! Per-connection frame pump shared by client and server
//!
//! Every link is one task owning the WebSocket. Outbound frames arrive over an
//! unbounded channel; inbound text frames are decoded with the record registry
//! and pushed into the link's inbox. A frame that fails to decode is terminal
//! for the link.

use crate::error::{Result, TransportError};
use codec::{Record, Registry};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

/// Inbound side of a link
pub type Inbox = mpsc::UnboundedReceiver<Box<dyn Record>>;

/// Outbound side of a link
pub type Outbox = mpsc::UnboundedSender<Message>;

/// What a single WebSocket message turned out to be
#[derive(Debug)]
pub enum Frame {
    Record(Box<dyn Record>),
    /// Ping, pong and raw frames carry nothing for the application
    Control,
    Close,
}

/// Encode a record as one text frame
pub fn encode_frame(record: &dyn Record) -> Message {
    Message::Text(codec::to_text(record))
}

/// Decode one WebSocket message
///
/// Binary frames are accepted when they hold UTF-8 JSON.
pub fn decode_frame(registry: &Registry, message: Message) -> Result<Frame> {
    match message {
        Message::Text(text) => Ok(Frame::Record(registry.decode_text(&text)?)),
        Message::Binary(bytes) => {
            let text = String::from_utf8(bytes)
                .map_err(|e| TransportError::protocol_with_source("binary frame is not UTF-8", e))?;
            Ok(Frame::Record(registry.decode_text(&text)?))
        }
        Message::Close(_) => Ok(Frame::Close),
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Ok(Frame::Control),
    }
}

/// Read frames until the first record arrives
pub(crate) async fn next_record<S>(
    ws: &mut WebSocketStream<S>,
    registry: &Registry,
) -> Result<Box<dyn Record>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let message = match ws.next().await {
            Some(message) => message?,
            None => return Err(TransportError::Closed),
        };
        match decode_frame(registry, message)? {
            Frame::Record(record) => return Ok(record),
            Frame::Control => continue,
            Frame::Close => return Err(TransportError::Closed),
        }
    }
}

/// Pump frames between `ws` and the two channels until either side closes
///
/// Dropping every sender of `outbound` closes the link gracefully. Dropping
/// the inbox receiver closes it on the next inbound record.
pub(crate) async fn run_connection<S>(
    ws: WebSocketStream<S>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    inbox: mpsc::UnboundedSender<Box<dyn Record>>,
    registry: &'static Registry,
    peer: String,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            message = outbound.recv() => match message {
                Some(message) => {
                    let closing = matches!(message, Message::Close(_));
                    if let Err(e) = sink.send(message).await {
                        warn!(%peer, error = %e, "Failed to send frame");
                        break;
                    }
                    if closing {
                        break;
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            frame = stream.next() => match frame {
                Some(Ok(message)) => match decode_frame(registry, message) {
                    Ok(Frame::Record(record)) => {
                        debug!(%peer, type_name = record.type_name(), "Received record");
                        if inbox.send(record).is_err() {
                            debug!(%peer, "Inbox dropped, closing link");
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        }
                    }
                    Ok(Frame::Control) => {}
                    Ok(Frame::Close) => {
                        info!(%peer, "Peer closed the connection");
                        break;
                    }
                    Err(e) => {
                        error!(%peer, error = %e, "Dropping connection after undecodable frame");
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                },
                Some(Err(e)) => {
                    warn!(%peer, error = %e, "WebSocket error");
                    break;
                }
                None => break,
            }
        }
    }

    debug!(%peer, "Connection task finished");
}
