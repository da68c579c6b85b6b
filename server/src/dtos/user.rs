//! User DTOs - Data Transfer Objects per utenti

use crate::entities::{User, UserRole};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Proiezione pubblica di un utente: quello che gli altri utenti possono
/// vedere. La specialty è presente solo per i medici, presa dal profilo
/// Doctor.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserPublicDTO {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub profile_image: Option<String>,
    pub role: UserRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
}

impl UserPublicDTO {
    pub fn with_specialty(mut self, specialty: Option<String>) -> Self {
        self.specialty = specialty;
        self
    }
}

impl From<User> for UserPublicDTO {
    fn from(value: User) -> Self {
        Self {
            user_id: value.user_id,
            name: value.name,
            email: value.email,
            profile_image: value.profile_image,
            role: value.role,
            specialty: None, // decorata a parte per i medici
        }
    }
}

/// DTO per la registrazione di un nuovo utente
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateUserDTO {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[serde(default = "default_role")]
    pub role: UserRole,

    /// Solo per role = doctor: etichetta di specializzazione del profilo.
    pub specialty: Option<String>,
}

fn default_role() -> UserRole {
    UserRole::Patient
}
