//! SessionRegistry - Registro di presenza processo-locale
//!
//! Mappa user_id -> sessione real-time attiva. Al più un binding per utente:
//! un nuovo handshake rimpiazza il precedente, e la chiusura di una
//! connessione ormai rimpiazzata non deve sfrattare il binding più recente
//! (ogni binding porta un epoch proprio per distinguerla).

use crate::dtos::ServerEventDTO;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, instrument, warn};

/// Segnali interni tra i task di una connessione e il resto del server.
pub enum InternalSignal {
    Shutdown,
    JoinRoom(String),
    LeaveRoom(String),
    /// Evento da consegnare direttamente sul socket dell'utente.
    Deliver(Arc<ServerEventDTO>),
}

struct SessionHandle {
    epoch: u64,
    tx: UnboundedSender<InternalSignal>,
}

pub struct SessionRegistry {
    sessions: DashMap<i64, SessionHandle>,
    next_epoch: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry {
            sessions: DashMap::new(),
            next_epoch: AtomicU64::new(0),
        }
    }

    /// Lega l'utente alla connessione e ritorna l'epoch del binding.
    /// Un binding precedente viene rimpiazzato: il suo canale viene chiuso e
    /// il vecchio write task si spegne da solo.
    #[instrument(skip(self, tx), fields(user_id))]
    pub fn bind(&self, user_id: i64, tx: UnboundedSender<InternalSignal>) -> u64 {
        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed) + 1;
        self.sessions.insert(user_id, SessionHandle { epoch, tx });
        info!(online = self.sessions.len(), "user bound to realtime session");
        epoch
    }

    /// Rimuove il binding solo se appartiene ancora alla connessione che sta
    /// chiudendo: una close arrivata fuori ordine non tocca il binding nuovo.
    #[instrument(skip(self), fields(user_id, epoch))]
    pub fn unbind(&self, user_id: &i64, epoch: u64) {
        let removed = self
            .sessions
            .remove_if(user_id, |_, handle| handle.epoch == epoch)
            .is_some();
        if removed {
            info!("user unbound from realtime session");
        } else {
            debug!("stale close ignored, a newer binding exists");
        }
    }

    /// Consegna fire-and-forget: nessun binding attivo non è un errore,
    /// l'utente riconcilierà via fetch/poll.
    #[instrument(skip(self, signal), fields(user_id))]
    pub fn send_if_online(&self, user_id: &i64, signal: InternalSignal) {
        if let Some(entry) = self.sessions.get(user_id) {
            if let Err(e) = entry.tx.send(signal) {
                warn!("failed to deliver signal to bound session: {:?}", e);
            }
        } else {
            debug!("user not online, signal dropped");
        }
    }

    pub fn is_online(&self, user_id: &i64) -> bool {
        self.sessions.contains_key(user_id)
    }

    pub fn online_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
