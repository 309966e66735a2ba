//! Multiple-choice quizzes, per-user progress and scored attempts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

use crate::types::Difficulty;

/// Percentage needed to pass a scored attempt when none is given
pub const DEFAULT_PASSING_SCORE: f64 = 70.0;
/// XP for a passed scored attempt
pub const PASSED_ATTEMPT_XP: i64 = 50;
/// XP for a failed scored attempt
pub const FAILED_ATTEMPT_XP: i64 = 25;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuizError {
    #[error("Question is required")]
    EmptyQuestion,
    #[error("Choices must be a list with at least 2 options")]
    TooFewChoices,
    #[error("correct_choice must be a valid index for the choices array")]
    CorrectChoiceOutOfRange,
    #[error("xp_reward must not be negative")]
    NegativeReward,
    #[error("max_score must be greater than 0")]
    InvalidMaxScore,
    #[error("score must be between 0 and max_score")]
    ScoreOutOfRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: u64,
    pub question: String,
    pub choices: Vec<String>,
    pub correct_choice: usize,
    pub xp_reward: u64,
    pub difficulty: Difficulty,
}

/// Fields of a quiz before an id is assigned
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewQuiz {
    pub question: String,
    pub choices: Vec<String>,
    pub correct_choice: i64,
    pub xp_reward: i64,
    pub difficulty: Difficulty,
}

impl NewQuiz {
    pub fn into_quiz(self, id: u64) -> Result<Quiz, QuizError> {
        if self.question.trim().is_empty() {
            return Err(QuizError::EmptyQuestion);
        }
        if self.choices.len() < 2 {
            return Err(QuizError::TooFewChoices);
        }
        if self.correct_choice < 0 || self.correct_choice as usize >= self.choices.len() {
            return Err(QuizError::CorrectChoiceOutOfRange);
        }
        if self.xp_reward < 0 {
            return Err(QuizError::NegativeReward);
        }
        Ok(Quiz {
            id,
            question: self.question,
            choices: self.choices,
            correct_choice: self.correct_choice as usize,
            xp_reward: self.xp_reward as u64,
            difficulty: self.difficulty,
        })
    }
}

/// Per (user, quiz) progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizProgress {
    pub user_id: Uuid,
    pub quiz_id: u64,
    pub attempts: u32,
    /// 1 once the quiz has been answered correctly, 0 before
    pub best_score: u8,
    pub earned_xp: u64,
    pub last_attempted: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerOutcome {
    pub correct: bool,
    /// True only for the answer that first solves the quiz
    pub first_success: bool,
    pub correct_choice: usize,
    /// XP to credit to the user for this answer; non-zero only on the first
    /// correct answer
    pub xp_earned: u64,
    pub explanation: String,
}

impl Quiz {
    /// Scores `selected` and folds it into the user's progress. XP is only
    /// granted when best score moves from 0 to 1.
    pub fn answer(
        &self,
        user_id: Uuid,
        progress: Option<QuizProgress>,
        selected: i64,
        now: DateTime<Utc>,
    ) -> (QuizProgress, AnswerOutcome) {
        let correct = selected >= 0 && selected as usize == self.correct_choice;
        let score = u8::from(correct);

        let first_success = correct && progress.as_ref().is_none_or(|p| p.best_score == 0);
        let xp_earned = if first_success { self.xp_reward } else { 0 };

        let progress = match progress {
            Some(mut progress) => {
                progress.attempts += 1;
                progress.best_score = progress.best_score.max(score);
                progress.earned_xp += xp_earned;
                progress.last_attempted = now;
                progress
            }
            None => QuizProgress {
                user_id,
                quiz_id: self.id,
                attempts: 1,
                best_score: score,
                earned_xp: xp_earned,
                last_attempted: now,
            },
        };

        let explanation = format!(
            "The correct answer is: {}",
            self.choices
                .get(self.correct_choice)
                .map(String::as_str)
                .unwrap_or_default()
        );

        let outcome = AnswerOutcome {
            correct,
            first_success,
            correct_choice: self.correct_choice,
            xp_earned,
            explanation,
        };
        (progress, outcome)
    }
}

/// A scored multi-question attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub quiz_id: String,
    pub score: f64,
    pub max_score: f64,
    pub percentage: f64,
    pub passed: bool,
    pub answers: serde_json::Value,
    pub time_taken: Option<u64>,
    pub attempt_number: u32,
    pub completed_at: DateTime<Utc>,
}

impl QuizAttempt {
    /// XP granted for submitting this attempt
    pub fn xp_reward(&self) -> i64 {
        if self.passed {
            PASSED_ATTEMPT_XP
        } else {
            FAILED_ATTEMPT_XP
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AttemptSubmission {
    pub quiz_id: String,
    pub score: f64,
    pub max_score: f64,
    pub answers: serde_json::Value,
    pub passing_score: Option<f64>,
    pub time_taken: Option<u64>,
}

impl AttemptSubmission {
    pub fn grade(
        self,
        user_id: Uuid,
        attempt_number: u32,
        now: DateTime<Utc>,
    ) -> Result<QuizAttempt, QuizError> {
        if !self.max_score.is_finite() || self.max_score <= 0.0 {
            return Err(QuizError::InvalidMaxScore);
        }
        if !self.score.is_finite() || self.score < 0.0 || self.score > self.max_score {
            return Err(QuizError::ScoreOutOfRange);
        }
        let percentage = self.score / self.max_score * 100.0;
        let passing = self.passing_score.unwrap_or(DEFAULT_PASSING_SCORE);

        Ok(QuizAttempt {
            id: Uuid::new_v4(),
            user_id,
            quiz_id: self.quiz_id,
            score: self.score,
            max_score: self.max_score,
            percentage,
            passed: percentage >= passing,
            answers: self.answers,
            time_taken: self.time_taken,
            attempt_number,
            completed_at: now,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizStatistics {
    pub quiz_id: u64,
    pub question: String,
    pub difficulty: Difficulty,
    pub users_attempted: usize,
    pub total_attempts: u64,
    pub users_correct: usize,
    pub success_rate: f64,
}

/// Aggregates progress rows into per-quiz statistics, ordered by quiz id
pub fn statistics<'a>(
    quizzes: impl IntoIterator<Item = &'a Quiz>,
    progress: impl IntoIterator<Item = &'a QuizProgress>,
) -> Vec<QuizStatistics> {
    let mut per_quiz: HashMap<u64, (HashSet<Uuid>, u64, usize)> = HashMap::new();
    for row in progress {
        let entry = per_quiz.entry(row.quiz_id).or_default();
        entry.0.insert(row.user_id);
        entry.1 += u64::from(row.attempts);
        if row.best_score > 0 {
            entry.2 += 1;
        }
    }

    let mut stats: Vec<QuizStatistics> = quizzes
        .into_iter()
        .map(|quiz| {
            let (users, attempts, correct) = per_quiz
                .get(&quiz.id)
                .map(|(users, attempts, correct)| (users.len(), *attempts, *correct))
                .unwrap_or((0, 0, 0));
            QuizStatistics {
                quiz_id: quiz.id,
                question: quiz.question.clone(),
                difficulty: quiz.difficulty,
                users_attempted: users,
                total_attempts: attempts,
                users_correct: correct,
                success_rate: if users > 0 {
                    correct as f64 / users as f64 * 100.0
                } else {
                    0.0
                },
            }
        })
        .collect();
    stats.sort_by_key(|s| s.quiz_id);
    stats
}
