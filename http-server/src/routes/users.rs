use academy::badges::{ACHIEVEMENTS, Achievement};
use academy::leaderboard::{Category, rank_of};
use academy::leveling::{LevelProgress, XpGain};
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiResult, ok, ok_with};
use crate::{AppState, error::ApiError, extract::ApiJson, middleware::AuthUser};

#[derive(Serialize)]
pub struct UserStats {
    pub level: u32,
    pub total_xp: u64,
    pub level_progress: LevelProgress,
    pub cash_balance: f64,
    pub total_pl: f64,
    pub win_rate: f64,
    pub total_trades: u64,
    pub winning_trades: u64,
    pub option_trades: u64,
    pub current_streak: u64,
    pub longest_streak: u64,
    pub best_trade: f64,
    pub worst_trade: f64,
    pub average_trade: f64,
    pub badges: usize,
    /// Position on the total-profit leaderboard
    pub rank: usize,
    pub quizzes_attempted: usize,
    pub quizzes_correct: usize,
    pub quiz_success_rate: f64,
    pub quests_completed: usize,
    pub activity_count: usize,
}

#[derive(Serialize)]
pub struct AchievementStatus {
    #[serde(flatten)]
    pub achievement: &'static Achievement,
    pub earned: bool,
    pub earned_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct ExperienceRequest {
    pub amount: i64,
    pub activity_type: Option<String>,
}

#[derive(Serialize)]
pub struct ExperienceResponse {
    #[serde(flatten)]
    pub gain: XpGain,
    pub leveled_up: bool,
    pub level_progress: LevelProgress,
}

#[derive(Deserialize)]
pub struct BadgeRequest {
    #[serde(default)]
    pub badge_id: String,
    pub badge_name: Option<String>,
}

#[derive(Serialize)]
pub struct BadgeResponse {
    pub badge_id: String,
    pub xp_awarded: i64,
    pub total_xp: u64,
    pub level: u32,
}

#[derive(Deserialize)]
pub struct BalanceRequest {
    pub amount: f64,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub cash_balance: f64,
}

pub async fn get_stats(State(state): State<AppState>, auth: AuthUser) -> ApiResult<UserStats> {
    let stats = state.storage.read(|t| {
        let user = t.user(auth.user_id)?;
        let standings: Vec<_> = t
            .users
            .iter()
            .filter(|u| u.is_active)
            .map(|u| u.standing())
            .collect();
        let rank = rank_of(&standings, &user.standing(), Category::TotalProfit);

        let progress: Vec<_> = t
            .quiz_progress
            .iter()
            .filter(|p| p.user_id == auth.user_id)
            .collect();
        let quizzes_attempted = progress.len();
        let quizzes_correct = progress.iter().filter(|p| p.best_score > 0).count();
        let quiz_success_rate = if quizzes_attempted > 0 {
            quizzes_correct as f64 / quizzes_attempted as f64 * 100.0
        } else {
            0.0
        };

        Ok::<_, ApiError>(UserStats {
            level: user.experience.level,
            total_xp: user.experience.total_xp,
            level_progress: user.experience.progress(),
            cash_balance: user.portfolio.cash_balance,
            total_pl: user.stats.total_pl,
            win_rate: user.stats.win_rate(),
            total_trades: user.stats.total_trades,
            winning_trades: user.stats.winning_trades,
            option_trades: user.stats.option_trades,
            current_streak: user.stats.current_streak,
            longest_streak: user.stats.longest_streak,
            best_trade: user.stats.best_trade,
            worst_trade: user.stats.worst_trade,
            average_trade: user.stats.average_trade(),
            badges: user.badges.len(),
            rank,
            quizzes_attempted,
            quizzes_correct,
            quiz_success_rate,
            quests_completed: user.quests.completed.len(),
            activity_count: t
                .experience_logs
                .iter()
                .filter(|l| l.user_id == auth.user_id)
                .count(),
        })
    })?;
    ok(stats)
}

pub async fn get_achievements(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Vec<AchievementStatus>> {
    let badges = state
        .storage
        .read(|t| t.user(auth.user_id).map(|u| u.badges.clone()))?;
    let achievements = ACHIEVEMENTS
        .iter()
        .map(|achievement| {
            let earned_at = badges
                .0
                .iter()
                .find(|b| b.id == achievement.id)
                .map(|b| b.earned_at);
            AchievementStatus {
                achievement,
                earned: earned_at.is_some(),
                earned_at,
            }
        })
        .collect();
    ok(achievements)
}

pub async fn add_experience(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<ExperienceRequest>,
) -> ApiResult<ExperienceResponse> {
    let activity_type = payload
        .activity_type
        .filter(|a| !a.trim().is_empty())
        .unwrap_or_else(|| "manual".to_string());

    let (gain, level_progress) = state.write(|t| {
        let gain = t.credit_xp(auth.user_id, payload.amount, &activity_type, Utc::now())?;
        let progress = t.user(auth.user_id)?.experience.progress();
        Ok::<_, ApiError>((gain, progress))
    })?;

    let message = if gain.leveled_up() {
        format!("Level up! You reached level {}", gain.level)
    } else {
        format!("Gained {} XP", gain.xp_gained)
    };
    ok_with(
        message,
        ExperienceResponse {
            gain,
            leveled_up: gain.leveled_up(),
            level_progress,
        },
    )
}

pub async fn award_badge(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<BadgeRequest>,
) -> ApiResult<BadgeResponse> {
    let badge_id = payload.badge_id.trim().to_string();
    if badge_id.is_empty() {
        return Err(ApiError::bad_request("Badge ID is required"));
    }
    let badge_name = payload
        .badge_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| badge_id.clone());

    let response = state.write(|t| {
        if !t.award_badge(auth.user_id, &badge_id, &badge_name, Utc::now())? {
            return Err(ApiError::Conflict("Badge already earned".to_string()));
        }
        let user = t.user(auth.user_id)?;
        Ok::<_, ApiError>(BadgeResponse {
            badge_id: badge_id.clone(),
            xp_awarded: academy::badges::BADGE_XP,
            total_xp: user.experience.total_xp,
            level: user.experience.level,
        })
    })?;
    ok_with(format!("Badge {badge_name} earned"), response)
}

pub async fn adjust_balance(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<BalanceRequest>,
) -> ApiResult<BalanceResponse> {
    if !payload.amount.is_finite() {
        return Err(ApiError::bad_request("Amount must be a finite number"));
    }
    let cash_balance = state.write(|t| {
        let user = t.user_mut(auth.user_id)?;
        Ok::<_, ApiError>(user.portfolio.adjust_cash(payload.amount))
    })?;
    tracing::info!(
        "Adjusted cash for user {} by {:.2} to {:.2}",
        auth.user_id,
        payload.amount,
        cash_balance
    );
    ok(BalanceResponse { cash_balance })
}
