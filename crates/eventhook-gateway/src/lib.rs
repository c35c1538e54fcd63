pub mod auth;
pub mod server;
pub mod types;

pub use auth::AuthConfig;
pub use server::{create_router, start_server, AppState};
