use academy::leaderboard::{
    Category, CategoryInfo, DEFAULT_LIMIT, MAX_LIMIT, Ranked, Standing, categories, rank, rank_of,
};
use axum::extract::State;
use serde::{Deserialize, Serialize};

use super::{ApiResult, ok};
use crate::{AppState, error::ApiError, extract::ApiQuery, middleware::AuthUser, models::PublicProfile};

#[derive(Deserialize)]
pub struct LeaderboardQuery {
    pub category: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct LeaderboardEntry {
    #[serde(flatten)]
    pub profile: PublicProfile,
    /// The ranked metric
    pub score: f64,
    #[serde(skip)]
    pub standing: Standing,
}

#[derive(Serialize)]
pub struct Leaderboard {
    pub category: &'static str,
    pub entries: Vec<Ranked<LeaderboardEntry>>,
    pub total_users: usize,
}

#[derive(Serialize)]
pub struct UserRank {
    pub category: &'static str,
    pub rank: usize,
    pub score: f64,
    pub total_users: usize,
}

pub async fn get_leaderboard(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<LeaderboardQuery>,
) -> ApiResult<Leaderboard> {
    let category = Category::parse_or_default(query.category.as_deref());
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let rows: Vec<LeaderboardEntry> = state.storage.read(|t| {
        t.users
            .iter()
            .filter(|u| u.is_active)
            .map(|u| {
                let standing = u.standing();
                LeaderboardEntry {
                    profile: PublicProfile::from(u),
                    score: standing.metric(category),
                    standing,
                }
            })
            .collect()
    });
    let total_users = rows.len();
    let entries = rank(rows, category, limit, |e| e.standing);

    ok(Leaderboard {
        category: category.id(),
        entries,
        total_users,
    })
}

pub async fn get_categories() -> ApiResult<Vec<CategoryInfo>> {
    ok(categories())
}

pub async fn get_user_rank(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<LeaderboardQuery>,
) -> ApiResult<UserRank> {
    let category = Category::parse_or_default(query.category.as_deref());

    let (mine, standings) = state.storage.read(|t| {
        let mine = t.user(auth.user_id)?.standing();
        let standings: Vec<Standing> = t
            .users
            .iter()
            .filter(|u| u.is_active)
            .map(|u| u.standing())
            .collect();
        Ok::<_, ApiError>((mine, standings))
    })?;

    ok(UserRank {
        category: category.id(),
        rank: rank_of(&standings, &mine, category),
        score: mine.metric(category),
        total_users: standings.len(),
    })
}
