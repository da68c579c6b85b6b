//! Repositories module - Accesso al database
//!
//! Ogni repository incapsula le query per una singola entità. Le query usano
//! l'API runtime di sqlx (`query_as` + bind): il crate deve compilare senza
//! un database raggiungibile, quindi niente macro con verifica a compile time.

pub mod doctor;
pub mod message;
pub mod traits;
pub mod user;

// Re-esportazione dei trait per facilitare l'import
pub use traits::{Create, Delete, Read};

// Re-esportazione delle struct dei repository per facilitare l'import
pub use doctor::DoctorRepository;
pub use message::{ConversationSummary, MessageRepository};
pub use user::UserRepository;
