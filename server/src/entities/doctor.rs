//! Doctor entity - Profilo medico collegato ad un utente con ruolo doctor

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Doctor {
    pub doctor_id: i64,
    pub user_id: i64,
    pub specialty: String,
}
