use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::{CurrentUser, ValidJson},
    chat::{
        dto::{ChatRequest, TextResponse},
        services::{self, MealPhoto},
    },
    error::AppError,
    state::AppState,
};

pub fn chat_routes(max_image_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/chat/chat", post(chat))
        .route(
            "/chat/analyze",
            post(analyze).layer(DefaultBodyLimit::max(max_image_bytes)),
        )
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn chat(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidJson(body): ValidJson<ChatRequest>,
) -> Result<Json<TextResponse>, AppError> {
    let text = services::chat_health(&state, body.messages).await?;
    Ok(Json(TextResponse { text }))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn analyze(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<TextResponse>, AppError> {
    let mut photo: Option<MealPhoto> = None;
    let mut user_context = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let mime_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(e.body_text()))?;
                photo = Some(MealPhoto {
                    bytes: bytes.to_vec(),
                    mime_type,
                });
            }
            Some("userContext") => {
                user_context = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(e.body_text()))?;
            }
            _ => {}
        }
    }

    let photo = photo.ok_or_else(|| AppError::Validation("file is required".into()))?;
    let text = services::analyze_meal(&state, photo, &user_context).await?;
    Ok(Json(TextResponse { text }))
}
