//! Entities module - Entità del dominio applicativo
//!
//! Ogni entity corrisponde a una tabella del database.

pub mod doctor;
pub mod enums;
pub mod message;
pub mod user;

// Re-exports per facilitare l'import
pub use doctor::Doctor;
pub use enums::{MessageKind, UserRole};
pub use message::Message;
pub use user::User;
