use std::sync::Arc;

use crate::config::Config;
use crate::cv::extract::TextExtractor;
use crate::cv::store::ResumeStore;
use crate::email::notifier::Notifier;
use crate::email::templates::EmailTemplates;
use crate::llm_client::AnswerService;
use crate::rate_limit::RateLimiters;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: ResumeStore,
    /// PDF text extraction. Default: `PdfTextExtractor`.
    pub extractor: Arc<dyn TextExtractor>,
    /// Inference backend. Default: `LlmClient`.
    pub answerer: Arc<dyn AnswerService>,
    /// Outbound mail. Default: `SmtpNotifier`, which skips when SMTP is unset.
    pub notifier: Arc<dyn Notifier>,
    pub templates: Arc<EmailTemplates>,
    /// One independent limiter per endpoint; installed as route middleware.
    pub limiters: RateLimiters,
}
