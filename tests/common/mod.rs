#![allow(dead_code)]

use axum::Router;

pub async fn create_test_app() -> Router {
    std::env::set_var("DATABASE_URL", "");
    std::env::set_var("JWT_SECRET", "integration-test-secret");

    kanji_tracker::create_app().await
}
