// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, evaluate, test_session},
    state::AppState,
};

/// Assembles the main application router.
///
/// * Authentication is enforced per handler by the `AuthUser`/`AdminUser` extractors.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:5173"),
        HeaderValue::from_static("http://127.0.0.1:5173"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let test_routes = Router::new()
        .route(
            "/api/tests",
            post(test_session::start_test).get(test_session::list_tests),
        )
        .route("/api/tests/{id}", get(test_session::get_test))
        .route("/api/tests/{id}/autosave", put(test_session::autosave_test))
        .route("/api/tests/{id}/submit", post(test_session::submit_test))
        .route("/api/tests/{id}/review", get(test_session::review_test));

    let admin_routes = Router::new()
        .route("/questions", post(admin::create_question))
        .route("/questions/{id}", delete(admin::delete_question));

    Router::new()
        .nest("/api/auth", auth_routes)
        .route("/api/evaluate", post(evaluate::evaluate_answers))
        .merge(test_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
