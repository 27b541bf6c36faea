//! Service status handler

use axum::{extract::State, Json};
use serde::Serialize;
use shared::DEVICE_TIMESTAMP_FORMAT;

use crate::ListenerState;

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub listen_port: u16,
    pub timestamp: String,
}

/// Status endpoint, also handy for manual curl checks from the shop PC
pub async fn service_status(State(state): State<ListenerState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
        service: "timeclock-bridge".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        listen_port: state.config.listener.port,
        timestamp: chrono::Local::now()
            .format(DEVICE_TIMESTAMP_FORMAT)
            .to_string(),
    })
}
