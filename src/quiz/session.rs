use std::time::Duration;

use log::debug;

use crate::quiz::stats::StatisticsStore;
use crate::quiz::{QuizQuestion, QuizResults, QuizStep};

/// Fixed number of rounds per game.
pub const QUESTIONS_AMOUNT: usize = 10;

/// How long the pass/fail feedback stays on screen before the next round.
pub const FEEDBACK_DELAY: Duration = Duration::from_secs(1);

pub const ROUND_OVER_TITLE: &str = "This round is over!";
pub const ERROR_TITLE: &str = "Something went wrong";
pub const LOAD_FAILED_MESSAGE: &str = "Unable to load data";
pub const NO_QUESTION_MESSAGE: &str = "Failed to get the next question.";
pub const NO_IMAGE_MESSAGE: &str = "Failed to get an image for the question.";

/// What the driver must do after the session has handled one event.
/// Render effects go to the presentation layer, the rest are requests to
/// the question provider and the feedback timer.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    RenderStep(QuizStep),
    RenderFeedback { is_correct: bool },
    RenderResults(QuizResults),
    RenderLoading(bool),
    RenderError(String),
    SetInputEnabled(bool),
    LoadQuestions { generation: u64 },
    RequestQuestion { generation: u64 },
    AwaitFeedback { generation: u64 },
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
enum Phase {
    #[default]
    Loading,
    Presenting,
    ShowingFeedback,
    ShowingResults,
    /// `resume: true` means the current round can be retried in place;
    /// `false` means the whole game has to start over.
    Failed {
        resume: bool,
    },
}

/// One play-through of the quiz. Every external event (user tap, question
/// delivery, load outcome, feedback timer) is handled to completion by one
/// of the methods below; each returns the effects the driver should run.
/// Out-of-order and duplicate events are no-ops, never panics.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct QuizSession {
    phase: Phase,
    current_index: usize,
    correct_count: u32,
    current_question: Option<QuizQuestion>,
    // Bumped on every (re)start. Timer and provider callbacks carry the
    // generation they were issued under; stale ones are discarded.
    generation: u64,
}

impl QuizSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins a fresh game: resets the round state and asks for the
    /// question material to be (re)loaded.
    pub fn start(&mut self) -> Vec<Effect> {
        self.generation += 1;
        self.current_index = 0;
        self.correct_count = 0;
        self.current_question = None;
        self.phase = Phase::Loading;

        vec![
            Effect::RenderLoading(true),
            Effect::LoadQuestions {
                generation: self.generation,
            },
        ]
    }

    /// Same contract as [`start`](Self::start); callable from the results
    /// screen or an error screen.
    pub fn restart(&mut self) -> Vec<Effect> {
        self.start()
    }

    /// The provider finished loading its material.
    pub fn questions_ready(&mut self) -> Vec<Effect> {
        if self.phase != Phase::Loading {
            return Vec::new();
        }

        self.phase = Phase::Presenting;
        vec![
            Effect::RenderLoading(false),
            Effect::RequestQuestion {
                generation: self.generation,
            },
        ]
    }

    /// The provider failed to load. Recoverable only by starting over.
    pub fn load_failed(&mut self, message: &str) -> Vec<Effect> {
        debug!("question load failed: {message}");
        self.phase = Phase::Failed { resume: false };
        vec![
            Effect::RenderLoading(false),
            Effect::RenderError(message.to_string()),
        ]
    }

    /// One question arrived from the provider. Deliveries from a previous
    /// game or for a round that already has its question are ignored; a
    /// missing question or one without an image fails the round without
    /// touching the round counter.
    pub fn question_delivered(
        &mut self,
        generation: u64,
        question: Option<QuizQuestion>,
    ) -> Vec<Effect> {
        if generation != self.generation {
            debug!("discarding stale question delivery");
            return Vec::new();
        }
        if self.phase != Phase::Presenting || self.current_question.is_some() {
            return Vec::new();
        }

        let question = match question {
            None => return self.fail_round(NO_QUESTION_MESSAGE),
            Some(question) if question.image_url.is_empty() => {
                return self.fail_round(NO_IMAGE_MESSAGE)
            }
            Some(question) => question,
        };

        let step = self.convert(&question);
        self.current_question = Some(question);
        vec![Effect::RenderStep(step), Effect::SetInputEnabled(true)]
    }

    /// The user tapped Yes or No. Only the first tap of a round counts:
    /// while feedback is showing the session is not in `Presenting` and
    /// every further tap falls through to a no-op.
    pub fn submit_answer(&mut self, user_choice: bool) -> Vec<Effect> {
        if self.phase != Phase::Presenting {
            return Vec::new();
        }
        let Some(question) = &self.current_question else {
            return Vec::new();
        };

        let is_correct = user_choice == question.correct_answer;
        if is_correct {
            self.correct_count += 1;
        }
        self.phase = Phase::ShowingFeedback;

        vec![
            Effect::RenderFeedback { is_correct },
            Effect::SetInputEnabled(false),
            Effect::AwaitFeedback {
                generation: self.generation,
            },
        ]
    }

    /// The feedback delay ran out. A timer scheduled by a superseded game
    /// carries an old generation and is ignored here.
    pub fn feedback_elapsed(
        &mut self,
        generation: u64,
        stats: &mut dyn StatisticsStore,
    ) -> Vec<Effect> {
        if generation != self.generation || self.phase != Phase::ShowingFeedback {
            debug!("discarding stale feedback timer");
            return Vec::new();
        }

        let mut effects = vec![Effect::SetInputEnabled(true)];
        effects.extend(self.advance(stats));
        effects
    }

    /// Retry after a failure: a mid-game round error resumes at the same
    /// round, a load error starts the game over.
    pub fn retry(&mut self) -> Vec<Effect> {
        match self.phase {
            Phase::Failed { resume: true } => {
                self.phase = Phase::Presenting;
                self.current_question = None;
                vec![Effect::RequestQuestion {
                    generation: self.generation,
                }]
            }
            Phase::Failed { resume: false } => self.start(),
            _ => Vec::new(),
        }
    }

    pub fn is_showing_results(&self) -> bool {
        self.phase == Phase::ShowingResults
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.phase, Phase::Failed { .. })
    }

    fn advance(&mut self, stats: &mut dyn StatisticsStore) -> Vec<Effect> {
        debug_assert!(self.correct_count as usize <= self.current_index + 1);

        if self.current_index + 1 == QUESTIONS_AMOUNT {
            stats.record_game(self.correct_count, QUESTIONS_AMOUNT as u32);
            self.phase = Phase::ShowingResults;

            let results = QuizResults {
                title: ROUND_OVER_TITLE.to_string(),
                text: result_text(self.correct_count, QUESTIONS_AMOUNT as u32),
                best_game: stats.best_game(),
                total_accuracy: stats.total_accuracy(),
                games_count: stats.games_count(),
            };
            return vec![Effect::RenderResults(results)];
        }

        self.current_index += 1;
        self.current_question = None;
        self.phase = Phase::Presenting;
        vec![Effect::RequestQuestion {
            generation: self.generation,
        }]
    }

    fn fail_round(&mut self, message: &str) -> Vec<Effect> {
        self.phase = Phase::Failed { resume: true };
        vec![
            Effect::RenderLoading(false),
            Effect::RenderError(message.to_string()),
        ]
    }

    fn convert(&self, question: &QuizQuestion) -> QuizStep {
        QuizStep {
            image_url: question.image_url.clone(),
            question: question.text.clone(),
            position: format!("{}/{}", self.current_index + 1, QUESTIONS_AMOUNT),
        }
    }
}

fn result_text(correct: u32, total: u32) -> String {
    if correct == total {
        format!("Congratulations, you answered {total} out of {total}!")
    } else {
        format!("Your result: {correct}/{total}")
    }
}
