// Résumé Q&A: extract the stored résumé, wrap it in the career-assistant
// prompt, forward to the inference endpoint.

pub mod handlers;
pub mod prompts;
