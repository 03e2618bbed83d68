// Critique LLM prompt templates.
// All prompts for the critique module are defined here.

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;

pub const PROFILE_INSTRUCTION: &str = "\
You are a precise résumé data extractor. Read the résumé and return this JSON object: \
{ \"name\": \"string\", \"headline\": \"string\", \"location\": \"string\", \
\"summary\": \"string\", \"topSkills\": [\"string\"], \"education\": \"string\", \
\"experienceYears\": \"string\" }. Use an empty string when a field is not present.";

pub const ANALYSIS_SYSTEM_TEMPLATE: &str = "\
You are a critical senior recruiter. Evaluate the résumé against the job description. \
If the posting does not state a salary, search the web for current market estimates \
in {currency} and set isEstimatedSalary to true. Return ONLY this JSON object: \
{ \"matchPercentage\": number 0-100, \"jobExplanation\": \"string\", \
\"strongMatches\": [\"string\"], \"toolsRequested\": [\"string\"], \
\"collaborativeProfile\": \"string\", \"gaps\": [\"string\"], \
\"objectiveEvaluation\": [\"string\"], \"honestConclusion\": \"string\", \
\"salaryEstimate\": \"string\", \"isEstimatedSalary\": boolean }";

pub const POWER_UP_SYSTEM: &str = "\
You are a career coach. Produce polished, professional text grounded only in the \
résumé and job description provided. Never invent experience the résumé does not show.";

pub const OPTIMIZED_BULLETS_REQUEST: &str =
    "Rewrite the résumé's achievements as bullets that lead with measurable results.";
pub const TECH_QUESTIONS_REQUEST: &str =
    "Write 4 hard technical interview questions specific to this job.";
pub const CULTURE_DECODER_REQUEST: &str =
    "Analyze the company culture implied by the tone of the job description.";
pub const COVER_LETTER_REQUEST: &str = "Write a persuasive cover letter for this job.";
pub const INTERVIEW_REQUEST: &str =
    "Simulate a behavioral interview: questions and strong example answers.";
pub const PITCH_REQUEST: &str = "Write a 30-second elevator pitch for this candidate.";

pub fn profile_system() -> String {
    format!("{PROFILE_INSTRUCTION} {JSON_ONLY_SYSTEM}")
}

pub fn analysis_system(currency: &str) -> String {
    ANALYSIS_SYSTEM_TEMPLATE.replace("{currency}", currency)
}

pub fn analysis_prompt(resume_text: &str, job_text: &str) -> String {
    format!("RÉSUMÉ:\n{resume_text}\n\nJOB DESCRIPTION:\n{job_text}")
}

pub fn power_up_prompt(resume_text: &str, job_text: &str, request: &str) -> String {
    format!("RÉSUMÉ:\n{resume_text}\n\nJOB DESCRIPTION:\n{job_text}\n\nREQUEST:\n{request}")
}
