use academy::social::{
    Activity, ActivityKind, FriendRequest, MetricComparison, SocialError, add_friend,
    check_new_request, compare, feed, remove_friend,
};
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApiResult, Created, created, ok, ok_with};
use crate::{
    AppState,
    error::ApiError,
    extract::{ApiJson, ApiPath, ApiQuery},
    middleware::AuthUser,
    models::{Outgoing, PublicProfile, Tables},
};

pub const MIN_SEARCH_LEN: usize = 2;
pub const SEARCH_LIMIT: usize = 20;

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Deserialize)]
pub struct FriendRequestBody {
    pub to_user_id: Option<Uuid>,
    #[serde(default)]
    pub message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

/// The other side of a request
#[derive(Serialize)]
pub struct Counterpart {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub level: u32,
}

#[derive(Serialize)]
pub struct PendingRequest {
    #[serde(flatten)]
    pub request: FriendRequest,
    pub direction: Direction,
    pub counterpart: Option<Counterpart>,
}

#[derive(Serialize)]
pub struct Comparison {
    pub friend: PublicProfile,
    pub total_pl: MetricComparison,
    pub win_rate: MetricComparison,
    pub total_trades: MetricComparison,
    pub level: MetricComparison,
    pub streak: MetricComparison,
}

#[derive(Serialize)]
pub struct FriendshipChange {
    pub friend_id: Uuid,
    pub responded_at: Option<DateTime<Utc>>,
}

fn counterpart(t: &Tables, user_id: Uuid) -> Option<Counterpart> {
    t.user(user_id).ok().map(|u| Counterpart {
        user_id: u.user_id,
        username: u.username.clone(),
        display_name: u.display_name.clone(),
        level: u.experience.level,
    })
}

/// Index of an open request addressed to `user_id`
fn open_request(t: &Tables, request_id: Uuid, now: DateTime<Utc>) -> Result<usize, ApiError> {
    t.friend_requests
        .iter()
        .position(|r| r.id == request_id && r.is_open(now))
        .ok_or_else(|| SocialError::RequestNotFound.into())
}

pub async fn list_friends(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Vec<PublicProfile>> {
    let friends = state.storage.read(|t| {
        let user = t.user(auth.user_id)?;
        Ok::<_, ApiError>(
            user.friends
                .iter()
                .filter_map(|id| t.active_user(*id))
                .map(PublicProfile::from)
                .collect::<Vec<_>>(),
        )
    })?;
    ok(friends)
}

pub async fn search_users(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> ApiResult<Vec<PublicProfile>> {
    let needle = query.q.trim().to_lowercase();
    if needle.chars().count() < MIN_SEARCH_LEN {
        return Err(ApiError::bad_request(format!(
            "Search query must be at least {MIN_SEARCH_LEN} characters"
        )));
    }

    let matches: Vec<PublicProfile> = state.storage.read(|t| {
        t.users
            .iter()
            .filter(|u| u.is_active && u.user_id != auth.user_id)
            .filter(|u| {
                u.username.to_lowercase().contains(&needle)
                    || u.display_name.to_lowercase().contains(&needle)
            })
            .take(SEARCH_LIMIT)
            .map(PublicProfile::from)
            .collect()
    });
    ok(matches)
}

pub async fn list_requests(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Vec<PendingRequest>> {
    let now = Utc::now();
    let mut pending: Vec<PendingRequest> = state.storage.read(|t| {
        t.friend_requests
            .iter()
            .filter(|r| r.is_open(now))
            .filter_map(|r| {
                let (direction, other) = if r.from_user_id == auth.user_id {
                    (Direction::Sent, r.to_user_id)
                } else if r.to_user_id == auth.user_id {
                    (Direction::Received, r.from_user_id)
                } else {
                    return None;
                };
                Some(PendingRequest {
                    request: r.clone(),
                    direction,
                    counterpart: counterpart(t, other),
                })
            })
            .collect()
    });
    pending.sort_by(|a, b| b.request.created_at.cmp(&a.request.created_at));
    ok(pending)
}

pub async fn send_request(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<FriendRequestBody>,
) -> Created<FriendRequest> {
    let to = body
        .to_user_id
        .ok_or_else(|| ApiError::bad_request("Recipient is required"))?;

    let request = state.write(|t| {
        let now = Utc::now();
        let from = t.user(auth.user_id)?;
        let from_username = from.username.clone();
        if to != auth.user_id && t.active_user(to).is_none() {
            return Err(ApiError::not_found("User not found"));
        }
        check_new_request(auth.user_id, to, &from.friends, &t.friend_requests, now)?;

        let request = FriendRequest::new(auth.user_id, to, body.message.trim().to_string(), now);
        t.friend_requests.push(request.clone());
        t.queue(Outgoing::FriendRequest {
            request: request.clone(),
            from_username,
        });
        Ok::<_, ApiError>(request)
    })?;

    tracing::info!("User {} sent a friend request to {}", auth.user_id, to);
    created("Friend request sent", request)
}

pub async fn accept_request(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(request_id): ApiPath<Uuid>,
) -> ApiResult<FriendshipChange> {
    let change = state.write(|t| {
        let now = Utc::now();
        let index = open_request(t, request_id, now)?;
        t.friend_requests[index].accept(auth.user_id, now)?;
        let request = t.friend_requests[index].clone();
        let (a, b) = (request.from_user_id, request.to_user_id);

        add_friend(&mut t.user_mut(a)?.friends, b);
        add_friend(&mut t.user_mut(b)?.friends, a);

        for (user, friend) in [(a, b), (b, a)] {
            let name = t.user(friend)?.username.clone();
            t.record_activity(
                user,
                ActivityKind::NewFriend,
                format!("Became friends with {name}"),
                now,
            );
        }
        Ok::<_, ApiError>(FriendshipChange {
            friend_id: a,
            responded_at: request.responded_at,
        })
    })?;

    tracing::info!("User {} is now friends with {}", auth.user_id, change.friend_id);
    ok_with("Friend request accepted", change)
}

pub async fn decline_request(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(request_id): ApiPath<Uuid>,
) -> ApiResult<FriendshipChange> {
    let change = state.write(|t| {
        let now = Utc::now();
        let index = open_request(t, request_id, now)?;
        let request = &mut t.friend_requests[index];
        request.decline(auth.user_id, now)?;
        Ok::<_, ApiError>(FriendshipChange {
            friend_id: request.from_user_id,
            responded_at: request.responded_at,
        })
    })?;
    ok_with("Friend request declined", change)
}

pub async fn remove(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(friend_id): ApiPath<Uuid>,
) -> ApiResult<FriendshipChange> {
    state.write(|t| {
        if !remove_friend(&mut t.user_mut(auth.user_id)?.friends, friend_id) {
            return Err(ApiError::not_found("Friend not found"));
        }
        if let Ok(friend) = t.user_mut(friend_id) {
            remove_friend(&mut friend.friends, auth.user_id);
        }
        Ok::<_, ApiError>(())
    })?;

    tracing::info!("User {} removed friend {}", auth.user_id, friend_id);
    ok_with(
        "Friend removed",
        FriendshipChange {
            friend_id,
            responded_at: None,
        },
    )
}

pub async fn compare_with(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(friend_id): ApiPath<Uuid>,
) -> ApiResult<Comparison> {
    let comparison = state.storage.read(|t| {
        let user = t.user(auth.user_id)?;
        if !user.friends.contains(&friend_id) {
            return Err(ApiError::from(SocialError::NotFriends));
        }
        let friend = t.user(friend_id)?;
        let (mine, theirs) = (user.standing(), friend.standing());
        Ok::<_, ApiError>(Comparison {
            friend: PublicProfile::from(friend),
            total_pl: compare(mine.total_pl, theirs.total_pl),
            win_rate: compare(mine.win_rate, theirs.win_rate),
            total_trades: compare(mine.total_trades as f64, theirs.total_trades as f64),
            level: compare(f64::from(mine.level), f64::from(theirs.level)),
            streak: compare(mine.streak as f64, theirs.streak as f64),
        })
    })?;
    ok(comparison)
}

pub async fn activities(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Vec<Activity>> {
    let items = state.storage.read(|t| {
        let user = t.user(auth.user_id)?;
        Ok::<_, ApiError>(feed(&t.activities, &user.friends))
    })?;
    ok(items)
}
