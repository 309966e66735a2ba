//! Friend requests, friend lists and the friends activity feed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Days a pending friend request stays valid
pub const REQUEST_TTL_DAYS: i64 = 7;
/// Most activities returned by one feed read
pub const FEED_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SocialError {
    #[error("Cannot send friend request to yourself")]
    SelfRequest,
    #[error("Already friends")]
    AlreadyFriends,
    #[error("Friend request already exists")]
    DuplicateRequest,
    #[error("Friend request not found")]
    RequestNotFound,
    #[error("Not friends")]
    NotFriends,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Declined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendRequest {
    pub id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub message: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl FriendRequest {
    pub fn new(from: Uuid, to: Uuid, message: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_user_id: from,
            to_user_id: to,
            message,
            status: RequestStatus::Pending,
            created_at: now,
            expires_at: now + Duration::days(REQUEST_TTL_DAYS),
            responded_at: None,
        }
    }

    /// Pending and not yet expired
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.status == RequestStatus::Pending && now < self.expires_at
    }

    /// True if the request is between `a` and `b`, in either direction
    pub fn connects(&self, a: Uuid, b: Uuid) -> bool {
        (self.from_user_id == a && self.to_user_id == b)
            || (self.from_user_id == b && self.to_user_id == a)
    }

    fn respond(
        &mut self,
        by: Uuid,
        status: RequestStatus,
        now: DateTime<Utc>,
    ) -> Result<(), SocialError> {
        if self.to_user_id != by || !self.is_open(now) {
            return Err(SocialError::RequestNotFound);
        }
        self.status = status;
        self.responded_at = Some(now);
        Ok(())
    }

    /// Only the recipient can accept an open request
    pub fn accept(&mut self, by: Uuid, now: DateTime<Utc>) -> Result<(), SocialError> {
        self.respond(by, RequestStatus::Accepted, now)
    }

    pub fn decline(&mut self, by: Uuid, now: DateTime<Utc>) -> Result<(), SocialError> {
        self.respond(by, RequestStatus::Declined, now)
    }
}

/// Checks whether `from` may send a new request to `to`
pub fn check_new_request<'a>(
    from: Uuid,
    to: Uuid,
    from_friends: &[Uuid],
    existing: impl IntoIterator<Item = &'a FriendRequest>,
    now: DateTime<Utc>,
) -> Result<(), SocialError> {
    if from == to {
        return Err(SocialError::SelfRequest);
    }
    if from_friends.contains(&to) {
        return Err(SocialError::AlreadyFriends);
    }
    if existing
        .into_iter()
        .any(|r| r.connects(from, to) && r.is_open(now))
    {
        return Err(SocialError::DuplicateRequest);
    }
    Ok(())
}

/// Set insert; returns true if `id` was not already present
pub fn add_friend(friends: &mut Vec<Uuid>, id: Uuid) -> bool {
    if friends.contains(&id) {
        return false;
    }
    friends.push(id);
    true
}

pub fn remove_friend(friends: &mut Vec<Uuid>, id: Uuid) -> bool {
    let before = friends.len();
    friends.retain(|f| *f != id);
    friends.len() != before
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricComparison {
    pub user: f64,
    pub friend: f64,
    pub difference: f64,
}

pub fn compare(user: f64, friend: f64) -> MetricComparison {
    MetricComparison {
        user,
        friend,
        difference: user - friend,
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Trade,
    QuizCompleted,
    BadgeEarned,
    LevelUp,
    QuestCompleted,
    NewFriend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: ActivityKind,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

impl Activity {
    pub fn new(user_id: Uuid, kind: ActivityKind, details: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            details,
            created_at: now,
        }
    }
}

/// Activities of `friends`, newest first, at most `FEED_LIMIT`
pub fn feed<'a>(activities: impl IntoIterator<Item = &'a Activity>, friends: &[Uuid]) -> Vec<Activity> {
    if friends.is_empty() {
        return Vec::new();
    }
    let mut items: Vec<Activity> = activities
        .into_iter()
        .filter(|a| friends.contains(&a.user_id))
        .cloned()
        .collect();
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    items.truncate(FEED_LIMIT);
    items
}
