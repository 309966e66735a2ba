use academy::leveling::{LevelProgress, XpGain};
use academy::quest::{ProgressSummary, Quest, QuestStatus};
use academy::social::ActivityKind;
use axum::extract::State;
use chrono::Utc;
use serde::Serialize;

use super::{ApiResult, ok, ok_with};
use crate::{AppState, error::ApiError, extract::ApiPath, middleware::AuthUser};

#[derive(Serialize)]
pub struct QuestView {
    #[serde(flatten)]
    pub quest: Quest,
    pub status: QuestStatus,
}

#[derive(Serialize)]
pub struct QuestCompletion {
    pub quest_id: u64,
    pub xp_earned: u64,
    pub xp: Option<XpGain>,
}

#[derive(Serialize)]
pub struct EducationProgress {
    #[serde(flatten)]
    pub summary: ProgressSummary,
    pub level_progress: LevelProgress,
}

pub async fn list_quests(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Vec<QuestView>> {
    let quests = state.storage.read(|t| {
        let progress = &t.user(auth.user_id)?.quests;
        let mut quests: Vec<QuestView> = t
            .quests
            .iter()
            .map(|q| QuestView {
                quest: q.clone(),
                status: progress.status(q),
            })
            .collect();
        quests.sort_by_key(|v| v.quest.order);
        Ok::<_, ApiError>(quests)
    })?;
    ok(quests)
}

pub async fn start_quest(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(quest_id): ApiPath<u64>,
) -> ApiResult<QuestView> {
    let view = state.write(|t| {
        let quest = t.quest(quest_id)?.clone();
        let user = t.user_mut(auth.user_id)?;
        user.quests.start(&quest, Utc::now())?;
        let status = user.quests.status(&quest);
        Ok::<_, ApiError>(QuestView { quest, status })
    })?;
    ok_with("Quest started", view)
}

pub async fn complete_quest(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(quest_id): ApiPath<u64>,
) -> ApiResult<QuestCompletion> {
    let completion = state.write(|t| {
        let now = Utc::now();
        let quest = t.quest(quest_id)?.clone();
        let xp_earned = t.user_mut(auth.user_id)?.quests.complete(&quest)?;

        let xp = if xp_earned > 0 {
            t.record_activity(
                auth.user_id,
                ActivityKind::QuestCompleted,
                format!("Completed the {} quest", quest.title),
                now,
            );
            Some(t.credit_xp(auth.user_id, xp_earned as i64, "quest_completed", now)?)
        } else {
            None
        };
        Ok::<_, ApiError>(QuestCompletion {
            quest_id,
            xp_earned,
            xp,
        })
    })?;

    let message = if completion.xp_earned > 0 {
        "Quest completed"
    } else {
        "Quest already completed"
    };
    ok_with(message, completion)
}

pub async fn get_progress(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<EducationProgress> {
    let progress = state.storage.read(|t| {
        let user = t.user(auth.user_id)?;
        Ok::<_, ApiError>(EducationProgress {
            summary: user.quests.summary(t.quests.len()),
            level_progress: user.experience.progress(),
        })
    })?;
    ok(progress)
}
