//! Application State - Stato globale dell'applicazione
//!
//! Contiene i repository, la configurazione condivisa e le due strutture
//! in-memory del layer real-time: il registro di presenza e le room.
//! Entrambe sono locali al processo e non replicate: in un deployment
//! multi-istanza il fan-out raggiunge solo gli utenti connessi alla stessa
//! istanza (limite documentato, serve un relay pub/sub esterno per superarlo).

use crate::repositories::{DoctorRepository, MessageRepository, UserRepository};
use crate::ws::registry::SessionRegistry;
use crate::ws::rooms::RoomMap;
use sqlx::SqlitePool;

pub struct AppState {
    /// Repository della directory utenti
    pub user: UserRepository,

    /// Repository dei profili medici (solo decorazione specialty)
    pub doctor: DoctorRepository,

    /// Repository dei messaggi
    pub msg: MessageRepository,

    /// Secret key per i token JWT
    pub jwt_secret: String,

    /// Directory dove salvare gli allegati caricati
    pub upload_dir: String,

    /// Registro user_id -> sessione real-time attiva (al più una per utente)
    pub sessions: SessionRegistry,

    /// Room di conversazione con almeno un iscritto
    pub rooms: RoomMap,
}

impl AppState {
    /// Crea lo stato inizializzando i repository sul pool fornito.
    pub fn new(pool: SqlitePool, jwt_secret: String, upload_dir: String) -> Self {
        Self {
            user: UserRepository::new(pool.clone()),
            doctor: DoctorRepository::new(pool.clone()),
            msg: MessageRepository::new(pool),
            jwt_secret,
            upload_dir,
            sessions: SessionRegistry::new(),
            rooms: RoomMap::new(),
        }
    }
}
