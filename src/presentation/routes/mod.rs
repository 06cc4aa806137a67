use axum::{routing::any, Router};

use crate::presentation::handlers::resources;

/// Create all resource routes
pub fn create_routes() -> Router {
    Router::new()
        .route("/", any(resources::root))
        .route("/teachers/", any(resources::teachers))
        .route("/teachers/{id}", any(resources::teacher))
        .route("/students/", any(resources::students))
        .route("/execs/", any(resources::execs))
}
