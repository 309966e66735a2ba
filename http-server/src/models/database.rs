use academy::badges::BADGE_XP;
use academy::leveling::XpGain;
use academy::quest::{Quest, seed_quests};
use academy::quiz::{NewQuiz, Quiz, QuizAttempt, QuizError, QuizProgress};
use academy::social::{Activity, ActivityKind, FriendRequest};
use academy::types::{Difficulty, Instrument, OptionDetails, TradeSide};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::User;
use super::user::random_token;
use crate::error::ApiError;

/// One XP credit, kept for the activity count in user statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperienceLog {
    pub user_id: Uuid,
    pub xp_gained: u64,
    pub activity_type: String,
    pub total_xp_after: u64,
    pub timestamp: DateTime<Utc>,
}

/// A buy or close executed against a user's portfolio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub side: TradeSide,
    pub symbol: String,
    pub instrument: Instrument,
    pub quantity: f64,
    pub price: f64,
    pub total: f64,
    pub realized_pl: Option<f64>,
    pub option_details: Option<OptionDetails>,
    pub created_at: DateTime<Utc>,
}

/// Notifications produced while the tables were locked, delivered once the
/// lock is released
#[derive(Debug, Clone)]
pub enum Outgoing {
    Activity {
        activity: Activity,
        audience: Vec<Uuid>,
    },
    FriendRequest {
        request: FriendRequest,
        from_username: String,
    },
}

#[derive(Default)]
pub struct Tables {
    /// Registration order, which leaderboard ties fall back to
    pub users: Vec<User>,
    pub sessions: HashMap<String, Uuid>,
    pub quizzes: Vec<Quiz>,
    pub quiz_progress: Vec<QuizProgress>,
    pub quiz_attempts: Vec<QuizAttempt>,
    pub experience_logs: Vec<ExperienceLog>,
    pub friend_requests: Vec<FriendRequest>,
    pub activities: Vec<Activity>,
    pub trades: Vec<TradeRecord>,
    pub quests: Vec<Quest>,
    next_quiz_id: u64,
    outbox: Vec<Outgoing>,
}

impl Tables {
    pub fn user(&self, user_id: Uuid) -> Result<&User, ApiError> {
        self.users
            .iter()
            .find(|u| u.user_id == user_id)
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    pub fn user_mut(&mut self, user_id: Uuid) -> Result<&mut User, ApiError> {
        self.users
            .iter_mut()
            .find(|u| u.user_id == user_id)
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    pub fn active_user(&self, user_id: Uuid) -> Option<&User> {
        self.users
            .iter()
            .find(|u| u.user_id == user_id && u.is_active)
    }

    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        let email = email.to_lowercase();
        self.users.iter().find(|u| u.email == email)
    }

    pub fn user_exists(&self, email: &str, username: &str) -> bool {
        let email = email.to_lowercase();
        self.users
            .iter()
            .any(|u| u.email == email || u.username == username)
    }

    // Sessions

    pub fn create_session(&mut self, user_id: Uuid) -> String {
        let token = random_token(32);
        self.sessions.insert(token.clone(), user_id);
        token
    }

    pub fn session_user(&self, token: &str) -> Option<&User> {
        let user_id = self.sessions.get(token)?;
        self.active_user(*user_id)
    }

    pub fn end_session(&mut self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Marks the account inactive and drops every session it holds.
    /// Returns how many sessions were ended.
    pub fn deactivate_user(&mut self, user_id: Uuid) -> Result<usize, ApiError> {
        self.user_mut(user_id)?.is_active = false;
        let before = self.sessions.len();
        self.sessions.retain(|_, owner| *owner != user_id);
        Ok(before - self.sessions.len())
    }

    // Quizzes

    pub fn insert_quiz(&mut self, quiz: NewQuiz) -> Result<Quiz, QuizError> {
        let quiz = quiz.into_quiz(self.next_quiz_id + 1)?;
        self.next_quiz_id = quiz.id;
        self.quizzes.push(quiz.clone());
        Ok(quiz)
    }

    pub fn quiz(&self, quiz_id: u64) -> Result<&Quiz, ApiError> {
        self.quizzes
            .iter()
            .find(|q| q.id == quiz_id)
            .ok_or_else(|| ApiError::not_found("Quiz not found"))
    }

    /// Inserts or replaces the (user, quiz) progress row
    pub fn save_quiz_progress(&mut self, progress: QuizProgress) {
        match self
            .quiz_progress
            .iter_mut()
            .find(|p| p.user_id == progress.user_id && p.quiz_id == progress.quiz_id)
        {
            Some(existing) => *existing = progress,
            None => self.quiz_progress.push(progress),
        }
    }

    pub fn quest(&self, quest_id: u64) -> Result<&Quest, ApiError> {
        self.quests
            .iter()
            .find(|q| q.id == quest_id)
            .ok_or_else(|| ApiError::not_found("Quest not found"))
    }

    // Gamification

    /// Credits XP, logs it, records a level-up activity and awards any
    /// achievement the new level unlocks
    pub fn credit_xp(
        &mut self,
        user_id: Uuid,
        delta: i64,
        activity_type: &str,
        now: DateTime<Utc>,
    ) -> Result<XpGain, ApiError> {
        let user = self.user_mut(user_id)?;
        let gain = user.experience.apply(delta)?;
        user.last_active = now;

        tracing::info!(
            "User {} gained {} XP from {} (total {}, level {})",
            user_id,
            gain.xp_gained,
            activity_type,
            gain.total_xp,
            gain.level
        );

        self.experience_logs.push(ExperienceLog {
            user_id,
            xp_gained: gain.xp_gained,
            activity_type: activity_type.to_string(),
            total_xp_after: gain.total_xp,
            timestamp: now,
        });

        if gain.leveled_up() {
            self.record_activity(
                user_id,
                ActivityKind::LevelUp,
                format!("Reached level {}", gain.level),
                now,
            );
            self.check_achievements(user_id, now)?;
        }
        Ok(gain)
    }

    /// Awards a badge once; the first award is worth `BADGE_XP`
    pub fn award_badge(
        &mut self,
        user_id: Uuid,
        badge_id: &str,
        badge_name: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, ApiError> {
        let user = self.user_mut(user_id)?;
        if !user.badges.award(badge_id, badge_name, now) {
            return Ok(false);
        }
        tracing::info!("User {} earned badge {}", user_id, badge_id);

        self.record_activity(
            user_id,
            ActivityKind::BadgeEarned,
            format!("Earned the {badge_name} badge"),
            now,
        );
        self.credit_xp(user_id, BADGE_XP, "badge_earned", now)?;
        Ok(true)
    }

    /// Awards every catalogue achievement the user now qualifies for.
    /// Returns the ids of the badges awarded, in award order.
    pub fn check_achievements(
        &mut self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, ApiError> {
        let held = self.user(user_id)?.badges.len();
        loop {
            let user = self.user(user_id)?;
            let pending = user.badges.newly_met(&user.stats, user.experience.level);
            let Some(next) = pending.first().copied() else {
                break;
            };
            // Badge XP may level the user up, which re-enters this check
            self.award_badge(user_id, next.id, next.name, now)?;
        }
        let badges = &self.user(user_id)?.badges.0;
        Ok(badges[held..].iter().map(|b| b.id.clone()).collect())
    }

    /// Stores an activity and queues it for the user's friends
    pub fn record_activity(
        &mut self,
        user_id: Uuid,
        kind: ActivityKind,
        details: String,
        now: DateTime<Utc>,
    ) {
        let activity = Activity::new(user_id, kind, details, now);
        let audience = self
            .user(user_id)
            .map(|u| u.friends.clone())
            .unwrap_or_default();
        self.activities.push(activity.clone());
        if !audience.is_empty() {
            self.outbox.push(Outgoing::Activity { activity, audience });
        }
    }

    pub fn queue(&mut self, outgoing: Outgoing) {
        self.outbox.push(outgoing);
    }
}

fn seed_quizzes() -> Vec<NewQuiz> {
    let quiz = |question: &str, choices: &[&str], correct: i64, xp: i64, difficulty| NewQuiz {
        question: question.to_string(),
        choices: choices.iter().map(|c| c.to_string()).collect(),
        correct_choice: correct,
        xp_reward: xp,
        difficulty,
    };
    vec![
        quiz(
            "What does buying a call option give you?",
            &[
                "The obligation to buy the stock",
                "The right to buy the stock at the strike price",
                "The right to sell the stock at the strike price",
                "Ownership of the stock",
            ],
            1,
            10,
            Difficulty::Easy,
        ),
        quiz(
            "How many shares does one standard equity option contract cover?",
            &["1", "10", "100", "1000"],
            2,
            10,
            Difficulty::Easy,
        ),
        quiz(
            "A put option gains value when the underlying price...",
            &["Rises", "Falls", "Stays flat", "Pays a dividend"],
            1,
            20,
            Difficulty::Medium,
        ),
        quiz(
            "What is the maximum loss when selling a covered call?",
            &[
                "The premium received",
                "Unlimited",
                "Stock price minus premium received",
                "Strike price plus premium",
            ],
            2,
            30,
            Difficulty::Hard,
        ),
    ]
}

// Simple in-memory storage implementation
#[derive(Clone)]
pub struct InMemoryStorage {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStorage {
    /// Empty store holding the seed quests and quizzes
    pub fn new() -> Self {
        let mut tables = Tables {
            quests: seed_quests(),
            ..Tables::default()
        };
        for quiz in seed_quizzes() {
            if let Err(e) = tables.insert_quiz(quiz) {
                tracing::error!("Invalid seed quiz: {}", e);
            }
        }
        Self {
            tables: Arc::new(Mutex::new(tables)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned storage mutex");
            poisoned.into_inner()
        })
    }

    pub fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        f(&self.lock())
    }

    /// Runs `f` with exclusive access, returning its result together with
    /// the notifications it queued
    pub fn write<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> (R, Vec<Outgoing>) {
        let mut tables = self.lock();
        let result = f(&mut tables);
        let outbox = std::mem::take(&mut tables.outbox);
        (result, outbox)
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}
