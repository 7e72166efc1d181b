//! The protocol/session layer: bearer authentication, the live session
//! registry, method dispatch, and the axum HTTP + SSE front door.

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod frames;
pub mod registry;
pub mod server;

pub use auth::AuthConfig;
pub use config::ServerConfig;
pub use server::{build_router, start, AppState, ServerHandle};
