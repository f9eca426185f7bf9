pub mod movies;
pub mod session;
pub mod stats;

use chrono::{DateTime, Utc};

/// One round's material: poster, prompt and the flag the user's tap is
/// checked against. Immutable once built by the provider.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QuizQuestion {
    pub image_url: String,
    pub text: String,
    pub correct_answer: bool,
}

impl QuizQuestion {
    pub fn new(image_url: String, text: String, correct_answer: bool) -> Self {
        Self {
            image_url,
            text,
            correct_answer,
        }
    }
}

/// View data for one round, derived from the current question plus the
/// session's position. Recomputed per round, never stored.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QuizStep {
    pub image_url: String,
    pub question: String,
    pub position: String,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GameResult {
    pub correct: u32,
    pub total: u32,
    pub finished_at: Option<DateTime<Utc>>,
}

impl GameResult {
    pub fn new(correct: u32, total: u32, finished_at: DateTime<Utc>) -> Self {
        Self {
            correct,
            total,
            finished_at: Some(finished_at),
        }
    }

    /// Strictly better means more correct answers. Ties keep the old record,
    /// total and date never break them.
    pub fn is_better_than(&self, other: &GameResult) -> bool {
        self.correct > other.correct
    }
}

/// Everything the results screen needs, including freshly read
/// lifetime statistics.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QuizResults {
    pub title: String,
    pub text: String,
    pub best_game: GameResult,
    pub total_accuracy: f64,
    pub games_count: u32,
}
