pub mod dto;
pub mod gemini;
pub mod handlers;
mod services;

use crate::state::AppState;
use axum::Router;

pub fn router(max_image_bytes: usize) -> Router<AppState> {
    Router::new().merge(handlers::chat_routes(max_image_bytes))
}
