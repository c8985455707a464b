use crate::{auth::SwaggerGate, utils::Config};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<SwaggerGate>,
    pub config: Arc<Config>,
}
