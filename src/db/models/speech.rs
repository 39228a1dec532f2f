use serde::{Deserialize, Serialize};

/// Outcome of a single speech exercise within a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpeechResult {
    pub correct: bool,
    pub score: Option<f64>,
    pub transcript: Option<String>,
}

impl SpeechResult {
    pub fn correct_with_score(score: f64) -> Self {
        Self {
            correct: true,
            score: Some(score),
            transcript: None,
        }
    }

    pub fn incorrect() -> Self {
        Self {
            correct: false,
            score: None,
            transcript: None,
        }
    }
}
