//! vitalink-client - Libreria di riconciliazione lato client
//!
//! Lo stato locale (elenco conversazioni, thread aperto, marker di
//! notifica) viene tenuto coerente rispetto a tre sorgenti che corrono tra
//! loro: fetch esplicite, polling periodico e push del canale real-time.
//! Il canale push non ha garanzie di consegna: ogni aggiornamento spinto è
//! sempre riconciliabile da una pull indipendente.

pub mod api;
pub mod cache;
pub mod client;
pub mod dtos;
pub mod socket;

// Re-export dei tipi principali
pub use api::{ApiClient, ApiError};
pub use cache::{ConversationCache, PushOutcome};
pub use client::{MessagingClient, POLL_INTERVAL_SECS};
pub use dtos::conversation_key;
pub use socket::{SocketError, SocketHandle};
