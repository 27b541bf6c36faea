//! Bridge services

pub mod bridge;

pub use bridge::{filter_new, BridgePhase, BridgeService, BridgeState};
