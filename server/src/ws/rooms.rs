//! RoomMap - Canali broadcast per conversazione
//!
//! Una room esiste finché ha almeno un iscritto: la prima subscribe crea il
//! canale, l'ultima send senza receiver lo rimuove.

use crate::dtos::ServerEventDTO;
use crate::ws::BROADCAST_CHANNEL_CAPACITY;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::SendError;
use tokio::sync::broadcast::{Receiver, Sender};
use tracing::{debug, instrument, warn};

pub struct RoomMap {
    /// tx del canale broadcast di ogni room, per chiave canonica di coppia
    channels: DashMap<String, Sender<Arc<ServerEventDTO>>>,
}

impl RoomMap {
    pub fn new() -> Self {
        RoomMap {
            channels: DashMap::new(),
        }
    }

    #[instrument(skip(self), fields(conversation_id))]
    pub fn subscribe(&self, conversation_id: &str) -> Receiver<Arc<ServerEventDTO>> {
        match self.channels.get(conversation_id) {
            None => {
                debug!("creating broadcast channel for conversation");
                // Arc<ServerEventDTO> per condividere il riferimento tra i
                // receiver, non copiare l'evento per ciascuno
                let (tx, rx) =
                    broadcast::channel::<Arc<ServerEventDTO>>(BROADCAST_CHANNEL_CAPACITY);
                self.channels.insert(conversation_id.to_string(), tx);
                rx
            }
            Some(c) => c.value().subscribe(),
        }
    }

    /// Emissione verso la room. Ritorna quanti receiver hanno ricevuto;
    /// una room senza receiver viene smontata e l'errore torna al chiamante
    /// (che per contratto lo tratta come no-op).
    #[instrument(skip(self, event), fields(conversation_id))]
    pub fn send(
        &self,
        conversation_id: &str,
        event: Arc<ServerEventDTO>,
    ) -> Result<usize, SendError<Arc<ServerEventDTO>>> {
        if let Some(room) = self.channels.get(conversation_id) {
            match room.send(event) {
                Ok(n) => {
                    debug!(receivers = n, "event broadcast to room");
                    Ok(n)
                }
                Err(e) => {
                    warn!("no active receivers, removing room channel");
                    drop(room); // rilascia il lock prima della remove
                    self.channels.remove(conversation_id);
                    Err(e)
                }
            }
        } else {
            debug!("no room channel for conversation");
            Err(SendError(event))
        }
    }

    pub fn active_rooms(&self) -> usize {
        self.channels.len()
    }
}

impl Default for RoomMap {
    fn default() -> Self {
        Self::new()
    }
}
