//! WebSocket Connection Management - Task di lettura e scrittura
//!
//! Ogni connessione viene divisa in due task: `listen_ws` consuma gli eventi
//! del client (con rate limit e timeout di inattività), `write_ws` unisce i
//! canali broadcast delle room a cui la connessione è iscritta con il canale
//! interno dei segnali diretti e scrive sul socket.

use crate::ws::{IDLE_TIMEOUT_SECONDS, RATE_LIMITER_MILLIS};
use crate::{
    AppState,
    dtos::{ClientEventDTO, ServerEventDTO},
    ws::{events::process_event, registry::InternalSignal},
};
use axum::extract::ws::Utf8Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::Duration;
use tokio::time::{interval, timeout};
use tokio_stream::StreamMap;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, instrument, warn};

#[instrument(skip(ws, state), fields(user_id))]
pub async fn handle_socket(ws: WebSocket, state: Arc<AppState>, user_id: i64) {
    info!("WebSocket connection established");

    let (ws_tx, ws_rx) = ws.split();

    // Canale interno: segnali di join/leave, consegne dirette, shutdown.
    // Il binding nel registro di presenza NON avviene qui: arriva solo con
    // l'evento authenticate esplicito, gestito dal listen task.
    let (int_tx, int_rx) = unbounded_channel::<InternalSignal>();

    tokio::spawn(listen_ws(user_id, ws_rx, int_tx, state.clone()));
    tokio::spawn(write_ws(user_id, ws_tx, int_rx, state));
}

#[instrument(skip(websocket_tx, internal_rx, state), fields(user_id))]
pub async fn write_ws(
    user_id: i64,
    mut websocket_tx: SplitSink<WebSocket, Message>,
    mut internal_rx: UnboundedReceiver<InternalSignal>,
    state: Arc<AppState>,
) {
    let mut stream_map: StreamMap<String, BroadcastStream<Arc<ServerEventDTO>>> = StreamMap::new();

    'external: loop {
        tokio::select! {
            Some((_, result)) = tokio_stream::StreamExt::next(&mut stream_map) => {
                if let Ok(event) = result {
                    // il typing del proprio utente non torna indietro: la
                    // room include anche il mittente, il filtro sta qui
                    if let ServerEventDTO::UserTyping { user_id: origin, .. } = event.as_ref() {
                        if *origin == user_id {
                            continue;
                        }
                    }
                    if send_event(&mut websocket_tx, &event).await.is_err() {
                        warn!("failed to forward room event, closing connection");
                        break 'external;
                    }
                }
                // Err = receiver in ritardo sul canale broadcast: eventi
                // persi, il client riconcilia col prossimo poll
            }

            signal = internal_rx.recv() => {
                match signal {
                    Some(InternalSignal::Shutdown) => {
                        info!("shutdown signal received");
                        break 'external;
                    }
                    Some(InternalSignal::JoinRoom(conversation_id)) => {
                        debug!(conversation_id, "joining room");
                        let rx = state.rooms.subscribe(&conversation_id);
                        // insert su chiave già presente rimpiazza lo stream:
                        // join ripetuta idempotente
                        stream_map.insert(conversation_id, BroadcastStream::new(rx));
                    }
                    Some(InternalSignal::LeaveRoom(conversation_id)) => {
                        debug!(conversation_id, "leaving room");
                        stream_map.remove(&conversation_id);
                    }
                    Some(InternalSignal::Deliver(event)) => {
                        if send_event(&mut websocket_tx, &event).await.is_err() {
                            warn!("failed to deliver direct event, closing connection");
                            break 'external;
                        }
                    }
                    None => {
                        // canale chiuso: o il listen task è terminato, o il
                        // binding è stato rimpiazzato da una connessione nuova
                        info!("internal channel closed");
                        break 'external;
                    }
                }
            }
        }
    }

    info!("write task terminated");
}

async fn send_event(
    websocket_tx: &mut SplitSink<WebSocket, Message>,
    event: &ServerEventDTO,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).map_err(axum::Error::new)?;
    websocket_tx.send(Message::Text(Utf8Bytes::from(json))).await
}

#[instrument(skip(websocket_rx, internal_tx, state), fields(user_id))]
pub async fn listen_ws(
    user_id: i64,
    mut websocket_rx: SplitStream<WebSocket>,
    internal_tx: UnboundedSender<InternalSignal>,
    state: Arc<AppState>,
) {
    info!("listen task started");

    // Epoch del binding nel registro, presente solo dopo authenticate
    let mut bound_epoch: Option<u64> = None;

    let mut rate_limiter = interval(Duration::from_millis(RATE_LIMITER_MILLIS));
    let timeout_duration = Duration::from_secs(IDLE_TIMEOUT_SECONDS);

    loop {
        match timeout(timeout_duration, StreamExt::next(&mut websocket_rx)).await {
            Ok(Some(msg_result)) => {
                rate_limiter.tick().await;

                let msg = match msg_result {
                    Ok(m) => m,
                    Err(e) => {
                        warn!("WebSocket error: {:?}", e);
                        break;
                    }
                };

                match msg {
                    Message::Text(text) => {
                        if let Ok(event) = serde_json::from_str::<ClientEventDTO>(&text) {
                            process_event(&state, user_id, &mut bound_epoch, &internal_tx, event)
                                .await;
                        } else {
                            warn!("failed to deserialize client event");
                        }
                    }
                    Message::Close(_) => {
                        info!("close message received");
                        break;
                    }
                    _ => {}
                }
            }
            Ok(None) => {
                info!("WebSocket stream ended");
                break;
            }
            Err(_) => {
                warn!(timeout_secs = IDLE_TIMEOUT_SECONDS, "connection idle timeout");
                break;
            }
        }
    }

    // Cleanup: la unbind con epoch ignora le close arrivate fuori ordine
    // rispetto a un binding più recente dello stesso utente
    if let Some(epoch) = bound_epoch {
        state.sessions.unbind(&user_id, epoch);
    }
    let _ = internal_tx.send(InternalSignal::Shutdown);
    info!("listen task terminated");
}
