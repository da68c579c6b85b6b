//! Socket - Sessione WebSocket verso il relay real-time
//!
//! Connessione con timeout limitato e `authenticate` esplicito appena
//! aperta; ping periodico per tenere viva la connessione. Nessuna
//! riconnessione automatica: una caduta si gestisce con un nuovo ciclo di
//! connect esplicito, nel frattempo la cache riconcilia col polling.

use crate::dtos::{ClientEvent, Message, ServerEvent};
use futures_util::{SinkExt, StreamExt};
use std::fmt;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{Duration, interval, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{error, info, warn};

/// Timeout della fase di connessione.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Intervallo dei ping verso il server.
pub const PING_INTERVAL_SECS: u64 = 30;

#[derive(Debug)]
pub enum SocketError {
    /// La connessione non si è aperta entro il timeout.
    Timeout,
    Connect(String),
    InvalidRequest(String),
}

impl fmt::Display for SocketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketError::Timeout => write!(f, "websocket connect timed out"),
            SocketError::Connect(detail) => write!(f, "websocket connect failed: {}", detail),
            SocketError::InvalidRequest(detail) => write!(f, "invalid ws request: {}", detail),
        }
    }
}

impl std::error::Error for SocketError {}

/// Lato comando della sessione: accoda eventi verso il task di scrittura.
pub struct SocketHandle {
    out_tx: UnboundedSender<ClientEvent>,
}

impl SocketHandle {
    pub fn join_conversation(&self, conversation_id: &str) {
        self.emit(ClientEvent::JoinConversation {
            conversation_id: conversation_id.to_string(),
        });
    }

    pub fn leave_conversation(&self, conversation_id: &str) {
        self.emit(ClientEvent::LeaveConversation {
            conversation_id: conversation_id.to_string(),
        });
    }

    pub fn send_typing(&self, conversation_id: &str, user_id: i64, is_typing: bool) {
        self.emit(ClientEvent::Typing {
            conversation_id: conversation_id.to_string(),
            user_id,
            is_typing,
        });
    }

    /// Relay effimero di un messaggio già persistito verso la room.
    pub fn relay_message(&self, conversation_id: &str, message: Message) {
        self.emit(ClientEvent::NewMessage {
            conversation_id: conversation_id.to_string(),
            message,
        });
    }

    pub fn is_open(&self) -> bool {
        !self.out_tx.is_closed()
    }

    fn emit(&self, event: ClientEvent) {
        if self.out_tx.send(event).is_err() {
            warn!("socket session is gone, event dropped");
        }
    }
}

/// Apre la sessione: handshake autenticato, split nei due task, authenticate
/// immediato. Ritorna il lato comando e lo stream degli eventi del server.
pub async fn connect(
    ws_url: &str,
    token: &str,
    user_id: i64,
) -> Result<(SocketHandle, UnboundedReceiver<ServerEvent>), SocketError> {
    use tokio_tungstenite::tungstenite::http::Request;

    // Host estratto dall'URL: ws://host:port/path -> host:port
    let host = ws_url
        .trim_start_matches("ws://")
        .trim_start_matches("wss://")
        .split('/')
        .next()
        .unwrap_or("localhost")
        .to_string();

    let request = Request::builder()
        .uri(ws_url)
        .header("Host", host)
        .header("Authorization", format!("Bearer {}", token))
        .header("Sec-WebSocket-Version", "13")
        .header("Connection", "Upgrade")
        .header("Upgrade", "websocket")
        .header(
            "Sec-WebSocket-Key",
            tokio_tungstenite::tungstenite::handshake::client::generate_key(),
        )
        .body(())
        .map_err(|e| SocketError::InvalidRequest(e.to_string()))?;

    let connect_timeout = Duration::from_secs(CONNECT_TIMEOUT_SECS);
    let (ws_stream, _) = timeout(connect_timeout, connect_async(request))
        .await
        .map_err(|_| SocketError::Timeout)?
        .map_err(|e| SocketError::Connect(e.to_string()))?;

    info!("websocket connected");
    let (mut write, mut read) = ws_stream.split();

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ClientEvent>();
    let (event_tx, event_rx) = mpsc::unbounded_channel::<ServerEvent>();

    // Task di scrittura: eventi in uscita più ping periodici
    tokio::spawn(async move {
        let mut ping_interval = interval(Duration::from_secs(PING_INTERVAL_SECS));
        ping_interval.tick().await; // consuma il primo tick immediato

        loop {
            tokio::select! {
                maybe_event = out_rx.recv() => {
                    match maybe_event {
                        Some(event) => {
                            let json = match serde_json::to_string(&event) {
                                Ok(json) => json,
                                Err(e) => {
                                    error!("failed to serialize client event: {}", e);
                                    continue;
                                }
                            };
                            if write.send(WsMessage::Text(json)).await.is_err() {
                                warn!("websocket write failed, stopping session");
                                break;
                            }
                        }
                        None => {
                            let _ = write.send(WsMessage::Close(None)).await;
                            break;
                        }
                    }
                }
                _ = ping_interval.tick() => {
                    if write.send(WsMessage::Ping(Vec::new())).await.is_err() {
                        warn!("ping failed, stopping session");
                        break;
                    }
                }
            }
        }
        info!("socket write task terminated");
    });

    // Task di lettura: frame di testo parsati e inoltrati al chiamante
    tokio::spawn(async move {
        while let Some(frame) = read.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                    Ok(event) => {
                        if event_tx.send(event).is_err() {
                            break; // il chiamante ha chiuso lo stream
                        }
                    }
                    Err(e) => warn!("unparsable server event: {}", e),
                },
                Ok(WsMessage::Close(_)) => {
                    info!("websocket closed by server");
                    break;
                }
                Ok(_) => {} // ping/pong
                Err(e) => {
                    warn!("websocket read error: {}", e);
                    break;
                }
            }
        }
        info!("socket read task terminated");
    });

    let handle = SocketHandle { out_tx };
    handle.emit(ClientEvent::Authenticate { user_id });

    Ok((handle, event_rx))
}
