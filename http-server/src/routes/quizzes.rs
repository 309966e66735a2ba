use academy::leveling::XpGain;
use academy::quiz::{
    AnswerOutcome, AttemptSubmission, NewQuiz, Quiz, QuizAttempt, QuizProgress, QuizStatistics,
    statistics,
};
use academy::social::ActivityKind;
use academy::types::Difficulty;
use axum::extract::State;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{ApiResult, Created, created, ok, ok_with};
use crate::{
    AppState,
    error::ApiError,
    extract::{ApiJson, ApiPath, ApiQuery},
    middleware::AuthUser,
};

#[derive(Deserialize)]
pub struct QuizFilter {
    pub difficulty: Option<String>,
}

#[derive(Deserialize)]
pub struct AnswerRequest {
    pub selected_choice: i64,
}

#[derive(Serialize)]
pub struct AnswerResponse {
    #[serde(flatten)]
    pub outcome: AnswerOutcome,
    pub progress: QuizProgress,
    pub xp: Option<XpGain>,
}

#[derive(Deserialize)]
pub struct AttemptFilter {
    pub quiz_id: Option<String>,
}

#[derive(Serialize)]
pub struct AttemptResponse {
    pub attempt: QuizAttempt,
    pub xp: XpGain,
    pub newly_completed: bool,
}

pub async fn list_quizzes(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<QuizFilter>,
) -> ApiResult<Vec<Quiz>> {
    let difficulty = filter
        .difficulty
        .as_deref()
        .map(str::parse::<Difficulty>)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let mut quizzes: Vec<Quiz> = state.storage.read(|t| {
        t.quizzes
            .iter()
            .filter(|q| difficulty.is_none_or(|d| q.difficulty == d))
            .cloned()
            .collect()
    });
    quizzes.sort_by_key(|q| q.id);
    ok(quizzes)
}

pub async fn create_quiz(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiJson(payload): ApiJson<NewQuiz>,
) -> Created<Quiz> {
    let quiz = state.write(|t| t.insert_quiz(payload))?;
    tracing::info!("Created quiz {}", quiz.id);
    created("Quiz created", quiz)
}

pub async fn get_quiz(
    State(state): State<AppState>,
    ApiPath(quiz_id): ApiPath<u64>,
) -> ApiResult<Quiz> {
    let quiz = state.storage.read(|t| t.quiz(quiz_id).cloned())?;
    ok(quiz)
}

pub async fn submit_answer(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(quiz_id): ApiPath<u64>,
    ApiJson(payload): ApiJson<AnswerRequest>,
) -> ApiResult<AnswerResponse> {
    let response = state.write(|t| {
        let now = Utc::now();
        let quiz = t.quiz(quiz_id)?.clone();
        let existing = t
            .quiz_progress
            .iter()
            .find(|p| p.user_id == auth.user_id && p.quiz_id == quiz_id)
            .cloned();

        let (progress, outcome) = quiz.answer(auth.user_id, existing, payload.selected_choice, now);
        t.save_quiz_progress(progress.clone());

        let xp = if outcome.xp_earned > 0 {
            Some(t.credit_xp(auth.user_id, outcome.xp_earned as i64, "quiz_correct", now)?)
        } else {
            None
        };
        if outcome.first_success {
            t.record_activity(
                auth.user_id,
                ActivityKind::QuizCompleted,
                format!("Answered quiz {} correctly", quiz.id),
                now,
            );
        }

        Ok::<_, ApiError>(AnswerResponse {
            outcome,
            progress,
            xp,
        })
    })?;

    let message = if response.outcome.correct {
        "Correct answer"
    } else {
        "Incorrect answer"
    };
    ok_with(message, response)
}

pub async fn get_quiz_progress(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(quiz_id): ApiPath<u64>,
) -> ApiResult<Option<QuizProgress>> {
    let progress = state.storage.read(|t| {
        t.quiz(quiz_id)?;
        Ok::<_, ApiError>(
            t.quiz_progress
                .iter()
                .find(|p| p.user_id == auth.user_id && p.quiz_id == quiz_id)
                .cloned(),
        )
    })?;
    ok(progress)
}

pub async fn list_progress(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Vec<QuizProgress>> {
    let mut progress: Vec<QuizProgress> = state.storage.read(|t| {
        t.quiz_progress
            .iter()
            .filter(|p| p.user_id == auth.user_id)
            .cloned()
            .collect()
    });
    progress.sort_by(|a, b| b.last_attempted.cmp(&a.last_attempted));
    ok(progress)
}

pub async fn submit_attempt(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<AttemptSubmission>,
) -> Created<AttemptResponse> {
    if payload.quiz_id.trim().is_empty() {
        return Err(ApiError::bad_request("Quiz ID is required"));
    }

    let response = state.write(|t| {
        let now = Utc::now();
        let previous = t
            .quiz_attempts
            .iter()
            .filter(|a| a.user_id == auth.user_id && a.quiz_id == payload.quiz_id)
            .count();
        let attempt = payload.grade(auth.user_id, previous as u32 + 1, now)?;
        t.quiz_attempts.push(attempt.clone());

        let xp = t.credit_xp(auth.user_id, attempt.xp_reward(), "quiz_attempt", now)?;

        let user = t.user_mut(auth.user_id)?;
        let newly_completed = attempt.passed && !user.completed_quizzes.contains(&attempt.quiz_id);
        if newly_completed {
            user.completed_quizzes.push(attempt.quiz_id.clone());
            t.record_activity(
                auth.user_id,
                ActivityKind::QuizCompleted,
                format!("Passed quiz {} with {:.0}%", attempt.quiz_id, attempt.percentage),
                now,
            );
        }

        Ok::<_, ApiError>(AttemptResponse {
            attempt,
            xp,
            newly_completed,
        })
    })?;

    let message = if response.attempt.passed {
        "Quiz passed"
    } else {
        "Quiz attempt recorded"
    };
    created(message, response)
}

pub async fn list_attempts(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(filter): ApiQuery<AttemptFilter>,
) -> ApiResult<Vec<QuizAttempt>> {
    let mut attempts: Vec<QuizAttempt> = state.storage.read(|t| {
        t.quiz_attempts
            .iter()
            .filter(|a| a.user_id == auth.user_id)
            .filter(|a| filter.quiz_id.as_ref().is_none_or(|id| &a.quiz_id == id))
            .cloned()
            .collect()
    });
    attempts.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
    ok(attempts)
}

pub async fn get_statistics(State(state): State<AppState>) -> ApiResult<Vec<QuizStatistics>> {
    let stats = state
        .storage
        .read(|t| statistics(&t.quizzes, &t.quiz_progress));
    ok(stats)
}
