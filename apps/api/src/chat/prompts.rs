/// Instruction block sent ahead of every question.
pub const CAREER_ASSISTANT_PREAMBLE: &str = "You are an expert career assistant. \
Analyze the following resume and answer the user's question with precision, clearly, \
and in a professional tone.";

pub const ANSWER_RULES: &str = "\
Instructions:
- Answer in full sentences.
- Highlight roles, companies, skills, and achievements when relevant.
- If the question asks for lists (e.g., skills, responsibilities), format them as bullet points.
- If information is missing from the resume, say \"Not specified in resume.\"
- Keep answers concise but informative.";

/// Builds the single user message forwarded to the inference endpoint.
pub fn build_resume_prompt(resume_text: &str, question: &str) -> String {
    format!(
        "{CAREER_ASSISTANT_PREAMBLE}\n\nResume:\n{resume_text}\n\n{ANSWER_RULES}\n\nQuestion: {question}"
    )
}
