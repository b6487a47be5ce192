//! Defines routes for the gateway.
//!
//! ## Structure
//! - **Object-level endpoints**
//!   - `PUT    /v1/{env}/{region}/{bucket}/{*key}`: store object
//!   - `GET    /v1/{env}/{region}/{bucket}/{*key}`: fetch object
//!   - `DELETE /v1/{env}/{region}/{bucket}/{*key}`: soft-delete object
//!
//! The wildcard `*key` allows nested keys like `photos/2025/img.jpg`.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        object_handlers::{delete_object, get_object, put_object},
    },
    state::AppState,
};
use axum::{Router, routing::get};

/// Build the router carrying `AppState` to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/v1/{env}/{region}/{bucket}/{*key}",
            get(get_object).put(put_object).delete(delete_object),
        )
}
