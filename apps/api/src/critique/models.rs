//! Structured results produced from model output.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::critique::prompts;

/// Candidate details synthesized from the résumé text. Cosmetic; may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateProfile {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub headline: String,
    #[serde(deserialize_with = "lenient_string")]
    pub location: String,
    #[serde(deserialize_with = "lenient_string")]
    pub summary: String,
    pub top_skills: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub education: String,
    /// Free-form descriptor such as "8+ years"; models sometimes answer with a bare number.
    #[serde(deserialize_with = "lenient_string")]
    pub experience_years: String,
}

/// Output of the résumé-vs-job match step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Always within 0..=100.
    #[serde(deserialize_with = "percentage")]
    pub match_percentage: u8,
    #[serde(default, deserialize_with = "lenient_string")]
    pub job_explanation: String,
    #[serde(default)]
    pub strong_matches: Vec<String>,
    #[serde(default)]
    pub tools_requested: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub collaborative_profile: String,
    #[serde(default)]
    pub gaps: Vec<String>,
    #[serde(default)]
    pub objective_evaluation: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub honest_conclusion: String,
    #[serde(default, alias = "salaryBRL", deserialize_with = "lenient_string")]
    pub salary_estimate: String,
    /// True when the salary was estimated rather than stated in the posting.
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_estimated_salary: bool,
}

/// Auxiliary generations available once a résumé and a job description exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PowerUpKind {
    OptimizedBullets,
    TechQuestions,
    CultureDecoder,
    CoverLetter,
    Interview,
    Pitch,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 6] = [
        PowerUpKind::OptimizedBullets,
        PowerUpKind::TechQuestions,
        PowerUpKind::CultureDecoder,
        PowerUpKind::CoverLetter,
        PowerUpKind::Interview,
        PowerUpKind::Pitch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PowerUpKind::OptimizedBullets => "optimizedBullets",
            PowerUpKind::TechQuestions => "techQuestions",
            PowerUpKind::CultureDecoder => "cultureDecoder",
            PowerUpKind::CoverLetter => "coverLetter",
            PowerUpKind::Interview => "interview",
            PowerUpKind::Pitch => "pitch",
        }
    }

    /// What the model is asked to produce for this kind.
    pub fn request(&self) -> &'static str {
        match self {
            PowerUpKind::OptimizedBullets => prompts::OPTIMIZED_BULLETS_REQUEST,
            PowerUpKind::TechQuestions => prompts::TECH_QUESTIONS_REQUEST,
            PowerUpKind::CultureDecoder => prompts::CULTURE_DECODER_REQUEST,
            PowerUpKind::CoverLetter => prompts::COVER_LETTER_REQUEST,
            PowerUpKind::Interview => prompts::INTERVIEW_REQUEST,
            PowerUpKind::Pitch => prompts::PITCH_REQUEST,
        }
    }
}

impl fmt::Display for PowerUpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job description text as supplied by the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobDescription {
    pub text: String,
    /// Confirmed descriptions are frozen until reopened.
    pub confirmed: bool,
}

/// Strings, numbers and booleans become strings; null becomes empty.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Accepts JSON booleans plus the `"true"`/`"no"`/`1` spellings models fall back to.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::Null => Ok(false),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" | "" => Ok(false),
            _ => Err(D::Error::custom(format!("'{s}' is not a boolean"))),
        },
        other => Err(D::Error::custom(format!(
            "expected a boolean, got {other}"
        ))),
    }
}

/// Accepts `87`, `87.4` or `"87%"`, clamped into 0..=100.
fn percentage<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let raw = match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| D::Error::custom("matchPercentage is not a finite number"))?,
        Value::String(s) => s
            .trim()
            .trim_end_matches('%')
            .trim()
            .parse::<f64>()
            .map_err(|_| D::Error::custom(format!("matchPercentage '{s}' is not numeric")))?,
        other => {
            return Err(D::Error::custom(format!(
                "matchPercentage has unexpected type: {other}"
            )))
        }
    };

    if raw.is_nan() {
        return Err(D::Error::custom("matchPercentage is NaN"));
    }
    Ok(raw.clamp(0.0, 100.0).round() as u8)
}
