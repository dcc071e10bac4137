// Outbound e-mail: SMTP notifier, message templates, and the send endpoint.

pub mod handlers;
pub mod notifier;
pub mod templates;

/// A message ready for delivery. `html_body`, when present, is sent as the
/// alternative part next to the plain text.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
}
