//! # Job Enrichment Prompts
//!
//! Templates for restructuring a job's free-text fields into four sections.

/// The system message sent with every enrichment request.
pub const JOB_SUMMARY_SYSTEM_PROMPT: &str =
    "You are a helpful assistant specialized in summarizing job information.";

/// The user message. `{job_json}` is replaced with the job's JSON payload.
pub const JOB_SUMMARY_USER_PROMPT: &str = r#"Given the following job information:

{job_json}

1. Job Description: Provide a concise summary tailored to the job.
2. Qualifications Needed: Present clear bullet points, list core skills and qualifications.
3. Job Responsibilities: Present clear bullet points for the main tasks.
4. Job Benefits: Present clear bullet points, list potential benefits (using general examples if necessary).

Format your answer using these section headings exactly as shown and convert it to a json object:
- **Job Description:**
- **Qualifications Needed:**
- **Job Responsibilities:**
- **Job Benefits:**"#;

/// Fills the user prompt template with a job payload.
pub fn render_job_prompt(template: &str, job_json: &str) -> String {
    template.replace("{job_json}", job_json)
}
