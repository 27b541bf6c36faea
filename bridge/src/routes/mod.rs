//! Route definitions for the iClock push listener

use axum::{routing::get, Router};

use crate::{handlers, ListenerState};

/// Create the listener routes
pub fn iclock_routes() -> Router<ListenerState> {
    Router::new()
        // Manual status checks
        .route("/", get(handlers::service_status))
        // iClock protocol endpoints
        .route(
            "/iclock/cdata",
            get(handlers::cdata_get).post(handlers::cdata_post),
        )
        .route(
            "/iclock/getrequest",
            get(handlers::always_ok).post(handlers::always_ok),
        )
        .route(
            "/iclock/devicecmd",
            get(handlers::always_ok).post(handlers::always_ok),
        )
}
