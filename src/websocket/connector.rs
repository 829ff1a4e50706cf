use super::factory::WebSocketFactory;
use super::transport::{Connector, TransportEvents, TransportHandle};
use crate::infrastructure::TaskManager;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Production connector: one tokio-tungstenite socket per attempt, driven by a
/// single task that multiplexes the outbound queue and the read half.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    fn open(&self, endpoint: &str, events: TransportEvents) -> TransportHandle {
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let endpoint = endpoint.to_string();
        let mut tasks = TaskManager::new();

        tasks.spawn(async move {
            let generation = events.generation();
            tracing::info!("Opening WebSocket (attempt generation {})", generation);

            let ws_stream = match WebSocketFactory::create(&endpoint).await {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::error!("WebSocket connect failed: {}", e);
                    events.error(e.to_string());
                    events.closed();
                    return;
                }
            };
            events.opened();

            let (mut write_half, mut read_half) = ws_stream.split();
            loop {
                tokio::select! {
                    outbound = outbound_rx.recv() => match outbound {
                        Some(text) => {
                            tracing::debug!("Sending frame: {}", text);
                            if let Err(e) = write_half.send(Message::Text(text.into())).await {
                                tracing::error!("WebSocket write error: {}", e);
                                events.send_failed(e.to_string());
                            }
                        }
                        None => {
                            tracing::debug!("Outbound queue dropped, closing socket");
                            if let Err(e) = write_half.close().await {
                                tracing::debug!("Close handshake failed: {}", e);
                            }
                            break;
                        }
                    },
                    inbound = read_half.next() => match inbound {
                        Some(Ok(Message::Text(text))) => {
                            tracing::debug!("Received text message: {}", text);
                            events.message(text.as_str());
                        }
                        Some(Ok(Message::Close(frame))) => {
                            if let Some(close_frame) = frame {
                                tracing::warn!(
                                    "Server closed connection: code={:?}, reason='{}'",
                                    close_frame.code,
                                    close_frame.reason
                                );
                            } else {
                                tracing::warn!("Server closed connection without close frame");
                            }
                            break;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            tracing::debug!("Received ping ({} bytes)", data.len());
                        }
                        Some(Ok(Message::Pong(data))) => {
                            tracing::debug!("Received pong ({} bytes)", data.len());
                        }
                        Some(Ok(Message::Binary(data))) => {
                            tracing::warn!("Received unexpected binary message ({} bytes)", data.len());
                        }
                        Some(Ok(Message::Frame(_))) => {
                            tracing::debug!("Received raw frame (internal)");
                        }
                        Some(Err(e)) => {
                            tracing::error!("WebSocket read error: {}", e);
                            events.error(e.to_string());
                            break;
                        }
                        None => {
                            tracing::warn!("WebSocket stream ended");
                            break;
                        }
                    },
                }
            }

            events.closed();
            tracing::info!("Socket task finished (attempt generation {})", generation);
        });

        TransportHandle::new(outbound_tx, tasks)
    }
}
