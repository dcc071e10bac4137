//! Handlebars templates for outbound mail.
//!
//! HTML parts use `{{var}}` and are escaped by the engine; subject and plain
//! text parts use `{{{var}}}` so user text is carried through verbatim.

use handlebars::Handlebars;
use serde_json::json;
use thiserror::Error;

use crate::email::EmailMessage;

const UPLOAD_PROCESSED_SUBJECT: &str = "upload_processed.subject";
const UPLOAD_PROCESSED_TEXT: &str = "upload_processed.txt";
const UPLOAD_PROCESSED_HTML: &str = "upload_processed.html";
const PLAIN_MESSAGE_HTML: &str = "plain_message.html";

const TEMPLATES: &[(&str, &str)] = &[
    (UPLOAD_PROCESSED_SUBJECT, "CV Processed: {{{cv_name}}}"),
    (
        UPLOAD_PROCESSED_TEXT,
        "Your CV \"{{{cv_name}}}\" has been successfully processed and is ready for chat!",
    ),
    (
        UPLOAD_PROCESSED_HTML,
        "<h2>CV Processed Successfully!</h2>\n\
         <p>Your CV \"<strong>{{cv_name}}</strong>\" has been successfully processed and is ready for chat.</p>\n\
         <p>You can now ask questions about your CV using our AI chat feature.</p>",
    ),
    (PLAIN_MESSAGE_HTML, "<p>{{body}}</p>"),
];

#[derive(Debug, Error)]
pub enum EmailTemplateError {
    #[error("failed to register email template: {0}")]
    Register(#[from] handlebars::TemplateError),

    #[error("failed to render email template: {0}")]
    Render(#[from] handlebars::RenderError),
}

/// Registered message templates, built once at startup.
pub struct EmailTemplates {
    handlebars: Handlebars<'static>,
}

impl EmailTemplates {
    pub fn new() -> Result<Self, EmailTemplateError> {
        let mut handlebars = Handlebars::new();
        // Undefined variables are a bug in the caller, not an empty string.
        handlebars.set_strict_mode(true);
        for &(name, template) in TEMPLATES {
            handlebars.register_template_string(name, template)?;
        }
        Ok(Self { handlebars })
    }

    /// Notification sent after a résumé upload has been stored.
    pub fn upload_processed(
        &self,
        recipient: &str,
        cv_name: &str,
    ) -> Result<EmailMessage, EmailTemplateError> {
        let vars = json!({ "cv_name": cv_name });
        Ok(EmailMessage {
            to: recipient.to_string(),
            subject: self.handlebars.render(UPLOAD_PROCESSED_SUBJECT, &vars)?,
            text_body: self.handlebars.render(UPLOAD_PROCESSED_TEXT, &vars)?,
            html_body: Some(self.handlebars.render(UPLOAD_PROCESSED_HTML, &vars)?),
        })
    }

    /// A free-form message; the HTML part is the body in a paragraph.
    pub fn plain_message(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<EmailMessage, EmailTemplateError> {
        let html = self
            .handlebars
            .render(PLAIN_MESSAGE_HTML, &json!({ "body": body }))?;
        Ok(EmailMessage {
            to: recipient.to_string(),
            subject: subject.to_string(),
            text_body: body.to_string(),
            html_body: Some(html),
        })
    }
}
