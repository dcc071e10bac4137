use axum::{extract::State, Json};
use lettre::Address;
use serde::{Deserialize, Serialize};

use crate::email::notifier::NotifyOutcome;
use crate::errors::AppError;
use crate::routes::{no_store_headers, AppJson, NoStoreHeaders};
use crate::state::AppState;

const MAX_RECIPIENT_LEN: usize = 255;
const MAX_SUBJECT_LEN: usize = 120;
const MAX_BODY_LEN: usize = 10_000;

#[derive(Debug, Deserialize)]
pub struct SendEmailRequest {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct SendEmailResponse {
    pub message: String,
}

impl SendEmailRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.recipient.chars().count() > MAX_RECIPIENT_LEN
            || self.recipient.parse::<Address>().is_err()
        {
            return Err(AppError::Validation(
                "recipient must be a valid email address".to_string(),
            ));
        }
        check_length("subject", &self.subject, MAX_SUBJECT_LEN)?;
        check_length("body", &self.body, MAX_BODY_LEN)?;
        Ok(())
    }
}

fn check_length(field: &str, value: &str, max: usize) -> Result<(), AppError> {
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    if value.chars().count() > max {
        return Err(AppError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

/// POST /api/email
///
/// Sends a free-form message. Unlike upload notifications, an unconfigured
/// SMTP server is an error here.
pub async fn handle_send_email(
    State(state): State<AppState>,
    AppJson(request): AppJson<SendEmailRequest>,
) -> Result<(NoStoreHeaders, Json<SendEmailResponse>), AppError> {
    request.validate()?;

    let message = state
        .templates
        .plain_message(&request.recipient, &request.subject, &request.body)
        .map_err(|e| AppError::Email(e.to_string()))?;
    match state.notifier.notify(message).await {
        Ok(NotifyOutcome::Sent) => Ok((
            no_store_headers(),
            Json(SendEmailResponse {
                message: "Email sent successfully".to_string(),
            }),
        )),
        Ok(NotifyOutcome::Skipped) => Err(AppError::Email(
            "email delivery is not configured".to_string(),
        )),
        Err(e) => Err(AppError::Email(e.to_string())),
    }
}
