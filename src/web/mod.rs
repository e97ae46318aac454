//! Web server module (Axum): health, webhook intake and queue introspection.

pub mod router;
pub mod server;

pub use router::{create_app_router, AppState};
pub use server::{run_server, WebServerConfig};
