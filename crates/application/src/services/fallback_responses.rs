//! Canned responses served when every text provider is exhausted
//!
//! Payloads are JSON documents shaped like the providers' own answers and
//! always carry `"source": "fallback"` so callers can tell them apart.

use serde_json::{Value, json};

use super::text_generation::TextRequest;

pub const DEFAULT_QUESTION_COUNT: usize = 5;
pub const MAX_QUESTION_COUNT: usize = 10;

const FALLBACK_SOURCE: &str = "fallback";
const FALLBACK_REASON: &str = "all_services_failed";
const DEFAULT_ROLE: &str = "this role";
const NEUTRAL_SCORE: f64 = 7.0;

const QUESTION_TEMPLATES: [&str; MAX_QUESTION_COUNT] = [
    "Tell me about your experience with {role}.",
    "What challenges have you faced working in {role}?",
    "How do you stay current with best practices in {role}?",
    "Describe a complex project you delivered in {role}.",
    "Which tools and technologies do you rely on in {role}?",
    "How do you approach problem-solving in {role}?",
    "How do you collaborate with your team in {role}?",
    "How do you handle deadlines and competing priorities in {role}?",
    "What are your career goals in {role}?",
    "How do you ensure the quality of your work in {role}?",
];

fn role_of(request: &TextRequest) -> &str {
    request
        .role
        .as_deref()
        .map(str::trim)
        .filter(|role| !role.is_empty())
        .unwrap_or(DEFAULT_ROLE)
}

fn marker() -> Value {
    json!({ "source": FALLBACK_SOURCE, "reason": FALLBACK_REASON })
}

/// Role-specific interview questions, clamped to `1..=MAX_QUESTION_COUNT`
pub fn question_generation(request: &TextRequest) -> String {
    let role = role_of(request);
    let count = request
        .count
        .unwrap_or(DEFAULT_QUESTION_COUNT)
        .clamp(1, MAX_QUESTION_COUNT);

    let questions: Vec<Value> = QUESTION_TEMPLATES
        .iter()
        .take(count)
        .enumerate()
        .map(|(index, template)| {
            json!({
                "id": format!("fallback_{index}"),
                "text": template.replace("{role}", role),
                "type": FALLBACK_SOURCE,
                "metadata": marker(),
            })
        })
        .collect();

    json!({
        "questions": questions,
        "role": role,
        "source": FALLBACK_SOURCE,
        "reason": FALLBACK_REASON,
    })
    .to_string()
}

/// Neutral analysis with every score at 7.0
pub fn answer_analysis(_request: &TextRequest) -> String {
    json!({
        "analysis": "Analysis temporarily unavailable. Please try again later.",
        "score": {
            "clarity": NEUTRAL_SCORE,
            "confidence": NEUTRAL_SCORE,
            "technical": NEUTRAL_SCORE,
            "overall": NEUTRAL_SCORE,
        },
        "suggestions": [
            "Analysis service is temporarily unavailable",
            "Please try again in a few moments",
        ],
        "source": FALLBACK_SOURCE,
        "reason": FALLBACK_REASON,
    })
    .to_string()
}

/// Minimal role profile
pub fn role_analysis(request: &TextRequest) -> String {
    json!({
        "role": role_of(request),
        "seniority": "unknown",
        "skills": [],
        "focus_areas": ["experience", "problem solving", "collaboration"],
        "source": FALLBACK_SOURCE,
        "reason": FALLBACK_REASON,
    })
    .to_string()
}
