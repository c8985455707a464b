pub mod auth;
pub mod handlers;
pub mod middleware;
pub mod state;
pub mod utils;

pub use auth::{RequestIdentity, SwaggerGate};
pub use state::AppState;
pub use utils::{ApiError, Config};
