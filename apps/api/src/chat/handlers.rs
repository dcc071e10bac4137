use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::chat::prompts::build_resume_prompt;
use crate::errors::AppError;
use crate::routes::{no_store_headers, AppJson, NoStoreHeaders};
use crate::state::AppState;

const MAX_QUESTION_LEN: usize = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub question: String,
    #[serde(default)]
    pub resume_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
}

impl ChatRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.question.is_empty() {
            return Err(AppError::Validation("question cannot be empty".to_string()));
        }
        if self.question.chars().count() > MAX_QUESTION_LEN {
            return Err(AppError::Validation(format!(
                "question must be at most {MAX_QUESTION_LEN} characters"
            )));
        }
        Ok(())
    }
}

/// POST /api/chat
///
/// Answers a question about a stored résumé. An unknown or absent
/// `resumeId` falls back to the configured default résumé.
pub async fn handle_chat(
    State(state): State<AppState>,
    AppJson(request): AppJson<ChatRequest>,
) -> Result<(NoStoreHeaders, Json<ChatResponse>), AppError> {
    request.validate()?;

    let stored = match request.resume_id.as_deref() {
        Some(id) => state.store.resolve(id).await,
        None => None,
    };
    let resume_path = stored.unwrap_or_else(|| state.config.default_resume_path.clone());

    let resume_text = state.extractor.extract(&resume_path).await.map_err(|e| {
        warn!("{e}");
        AppError::NotFound(
            "Resume not found or unreadable. Upload a CV or set RESUME_PATH to an existing PDF."
                .to_string(),
        )
    })?;

    let prompt = build_resume_prompt(&resume_text, &request.question);
    let answer = state.answerer.answer(&prompt).await?;

    info!(
        "Answered question about {} ({} chars)",
        resume_path.display(),
        answer.len()
    );

    Ok((no_store_headers(), Json(ChatResponse { answer })))
}
