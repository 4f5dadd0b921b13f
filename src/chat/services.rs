use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{info, warn};

use crate::{
    chat::{
        dto::{Content, InlineData, Part},
        gemini::{GenerateError, GenerativeClient},
    },
    error::AppError,
    state::AppState,
};

const MEAL_PROMPT: &str = "You are a health guide. Analyze meals from photos.
Return:
- Estimated total calories
- Exercise to burn those calories (walking, running, cycling) with suggested durations
- Macronutrients (g): protein, carbs, fats
- Likely vitamins/minerals
- Hydration advice
Be concise and list assumptions.";

const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// An uploaded meal photo.
pub struct MealPhoto {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

/// Asks each model in order. Unavailable models are skipped; any other failure stops the walk.
pub async fn generate_with_fallbacks(
    client: &dyn GenerativeClient,
    models: &[String],
    contents: &[Content],
) -> Result<String, AppError> {
    let mut last_unavailable: Option<GenerateError> = None;
    for model in models {
        match client.generate(model, contents).await {
            Ok(text) => {
                info!(model = %model, "generation succeeded");
                return Ok(text);
            }
            Err(err @ GenerateError::ModelUnavailable { .. }) => {
                warn!(model = %model, error = %err, "model unavailable, trying next");
                last_unavailable = Some(err);
            }
            Err(GenerateError::MissingApiKey) => {
                return Err(AppError::Internal(GenerateError::MissingApiKey.into()));
            }
            Err(GenerateError::Failed(message)) => {
                warn!(model = %model, error = %message, "generation failed");
                return Err(AppError::Upstream(message));
            }
        }
    }
    Err(AppError::Upstream(
        last_unavailable
            .map(|e| e.to_string())
            .unwrap_or_else(|| "All Gemini models unavailable".into()),
    ))
}

pub async fn chat_health(
    state: &AppState,
    messages: Option<Vec<Content>>,
) -> Result<String, AppError> {
    let messages = messages
        .filter(|m| !m.is_empty())
        .ok_or_else(|| AppError::Validation("messages[] is required".into()))?;
    generate_with_fallbacks(state.ai.as_ref(), &state.config.gemini.models, &messages).await
}

/// Builds the single user turn sent for a meal photo.
pub(crate) fn meal_contents(photo: &MealPhoto, user_context: &str) -> Vec<Content> {
    let mut parts = vec![Part::text(MEAL_PROMPT)];
    if !user_context.trim().is_empty() {
        parts.push(Part::text(format!("User context: {user_context}")));
    }
    parts.push(Part::InlineData {
        inline_data: InlineData {
            mime_type: photo
                .mime_type
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string()),
            data: STANDARD.encode(&photo.bytes),
        },
    });
    vec![Content {
        role: "user".into(),
        parts,
    }]
}

pub async fn analyze_meal(
    state: &AppState,
    photo: MealPhoto,
    user_context: &str,
) -> Result<String, AppError> {
    let contents = meal_contents(&photo, user_context);
    generate_with_fallbacks(state.ai.as_ref(), &state.config.gemini.models, &contents).await
}
