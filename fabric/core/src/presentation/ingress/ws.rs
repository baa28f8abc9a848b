// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// WebSocket listener and outbound connector for DIDComm sessions.
//
// Each session is a single read loop: data frames are published verbatim,
// empty ones included, and control frames are not. Pings are sent from the same loop on a ticker, so
// no lock is shared between reader and writer. The first failed ping turns
// pinging off for the rest of the session.

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    Router,
};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as TungsteniteCloseFrame;
use tokio_tungstenite::tungstenite::Message as TungsteniteMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{IngressError, PING_FREQUENCY};
use crate::domain::envelope::{Envelope, Transport};
use crate::domain::queue::Publisher;
use crate::infrastructure::metrics;

const CLOSE_REASON: &str = "closing the connection";

#[derive(Clone)]
struct WsState {
    publisher: Arc<dyn Publisher>,
    ping_inbound: bool,
    shutdown: CancellationToken,
}

/// Router accepting an upgrade on every path. No origin check.
pub fn router(
    publisher: Arc<dyn Publisher>,
    ping_inbound: bool,
    shutdown: CancellationToken,
) -> Router {
    Router::new().fallback(upgrade).with_state(WsState {
        publisher,
        ping_inbound,
        shutdown,
    })
}

async fn upgrade(State(state): State<WsState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| inbound_session(socket, state))
}

async fn publish_frame(publisher: &dyn Publisher, frame: Bytes) {
    match publisher.publish_message(Envelope::frame(frame).into_delivery()).await {
        Ok(()) => metrics::record_ingress_message(Transport::WebSocket),
        Err(e) => warn!(error = %e, "Failed to publish WebSocket frame"),
    }
}

fn ticker(frequency: Duration) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + frequency, frequency);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker
}

async fn inbound_session(socket: WebSocket, state: WsState) {
    let (mut sink, mut stream) = socket.split();
    let mut pinging = state.ping_inbound;
    let mut ping = ticker(PING_FREQUENCY);
    debug!(pinging, "Inbound WebSocket session opened");

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,
            _ = ping.tick(), if pinging => {
                if let Err(e) = sink.send(Message::Ping(Bytes::new())).await {
                    warn!(error = %e, "WebSocket ping failed; keepalive stopped");
                    pinging = false;
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Binary(data))) => publish_frame(state.publisher.as_ref(), data).await,
                Some(Ok(Message::Text(text))) => {
                    publish_frame(state.publisher.as_ref(), Bytes::copy_from_slice(text.as_str().as_bytes())).await
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    match frame {
                        Some(frame) if frame.code != close_code::NORMAL => {
                            warn!(code = frame.code, reason = %frame.reason.as_str(), "WebSocket closed abnormally")
                        }
                        _ => debug!("WebSocket closed by peer"),
                    }
                    break;
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Error reading request message");
                    break;
                }
                None => break,
            },
        }
    }

    let close = Message::Close(Some(CloseFrame {
        code: close_code::NORMAL,
        reason: Utf8Bytes::from_static(CLOSE_REASON),
    }));
    if let Err(e) = sink.send(close).await {
        debug!(error = %e, "Connection close error");
    }
}

/// Open an outbound session to `url` and pump its frames into `publisher`.
/// Outbound sessions always ping every `frequency`.
pub async fn connect_outbound(
    url: &str,
    publisher: Arc<dyn Publisher>,
    frequency: Duration,
    shutdown: CancellationToken,
) -> Result<JoinHandle<()>, IngressError> {
    let (socket, _) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| IngressError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    info!(url, "Outbound WebSocket session established");

    Ok(tokio::spawn(async move {
        let (mut sink, mut stream) = socket.split();
        let mut pinging = true;
        let mut ping = ticker(frequency);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ping.tick(), if pinging => {
                    if let Err(e) = sink.send(TungsteniteMessage::Ping(Vec::new())).await {
                        warn!(error = %e, "WebSocket ping failed; keepalive stopped");
                        pinging = false;
                    }
                }
                frame = stream.next() => match frame {
                    Some(Ok(TungsteniteMessage::Binary(data))) => publish_frame(publisher.as_ref(), Bytes::from(data)).await,
                    Some(Ok(TungsteniteMessage::Text(text))) => publish_frame(publisher.as_ref(), Bytes::from(text)).await,
                    Some(Ok(TungsteniteMessage::Close(frame))) => {
                        match frame {
                            Some(frame) if frame.code != CloseCode::Normal => {
                                warn!(code = u16::from(frame.code), reason = %frame.reason, "WebSocket closed abnormally")
                            }
                            _ => debug!("WebSocket closed by peer"),
                        }
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Error reading request message");
                        break;
                    }
                    None => break,
                },
            }
        }

        let close = TungsteniteMessage::Close(Some(TungsteniteCloseFrame {
            code: CloseCode::Normal,
            reason: CLOSE_REASON.into(),
        }));
        if let Err(e) = sink.send(close).await {
            debug!(error = %e, "Connection close error");
        }
    }))
}
