use axum_test::TestServer;
use sqlx::SqlitePool;
use std::sync::Arc;
use vitalink_server::core::AppState;

/// Secret JWT condiviso da tutti i test
pub const TEST_JWT_SECRET: &str = "un segreto di test che non firma niente di vero";

/// Crea un AppState per i test, con upload dir usa-e-getta in temp
pub fn create_test_state(pool: SqlitePool) -> Arc<AppState> {
    let upload_dir = std::env::temp_dir().join("vitalink-test-uploads");
    Arc::new(AppState::new(
        pool,
        TEST_JWT_SECRET.to_string(),
        upload_dir.to_string_lossy().into_owned(),
    ))
}

/// Crea un TestServer pronto per eseguire richieste
pub fn create_test_server(state: Arc<AppState>) -> TestServer {
    let app = vitalink_server::create_router(state);
    TestServer::new(app).expect("Failed to create test server")
}

/// Token bearer valido 24 ore per l'utente indicato
pub fn create_test_jwt(user_id: i64, email: &str) -> String {
    vitalink_server::auth::encode_jwt(email.to_string(), user_id, TEST_JWT_SECRET)
        .expect("Failed to create JWT token")
}
