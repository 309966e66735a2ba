//! Educational quests: ordered modules unlocked by completing prerequisites.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestError {
    #[error("Quest is locked until its prerequisites are completed")]
    Locked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub module: String,
    pub difficulty: String,
    pub xp: u64,
    /// Ids of quests that must be completed first
    pub prerequisites: Vec<u64>,
    pub learning_objectives: Vec<String>,
    pub estimated_minutes: u32,
    pub order: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    Completed,
    InProgress,
    Available,
    Locked,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestProgress {
    pub completed: Vec<u64>,
    pub current: Option<u64>,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub completed_quests: Vec<u64>,
    pub current_quest: Option<u64>,
    pub total_quests: usize,
    pub completed_count: usize,
    pub completion_percentage: f64,
}

impl QuestProgress {
    pub fn status(&self, quest: &Quest) -> QuestStatus {
        if self.completed.contains(&quest.id) {
            QuestStatus::Completed
        } else if self.current == Some(quest.id) {
            QuestStatus::InProgress
        } else if quest
            .prerequisites
            .iter()
            .all(|p| self.completed.contains(p))
        {
            QuestStatus::Available
        } else {
            QuestStatus::Locked
        }
    }

    pub fn start(&mut self, quest: &Quest, now: DateTime<Utc>) -> Result<(), QuestError> {
        if self.status(quest) == QuestStatus::Locked {
            return Err(QuestError::Locked);
        }
        self.current = Some(quest.id);
        self.started_at = Some(now);
        Ok(())
    }

    /// Marks the quest completed. Returns the XP to credit: the quest's XP the
    /// first time, 0 on repeats.
    pub fn complete(&mut self, quest: &Quest) -> Result<u64, QuestError> {
        let status = self.status(quest);
        if status == QuestStatus::Locked {
            return Err(QuestError::Locked);
        }
        if self.current == Some(quest.id) {
            self.current = None;
            self.started_at = None;
        }
        if status == QuestStatus::Completed {
            return Ok(0);
        }
        self.completed.push(quest.id);
        Ok(quest.xp)
    }

    pub fn summary(&self, total_quests: usize) -> ProgressSummary {
        let completed_count = self.completed.len();
        ProgressSummary {
            completed_quests: self.completed.clone(),
            current_quest: self.current,
            total_quests,
            completed_count,
            completion_percentage: if total_quests > 0 {
                completed_count as f64 / total_quests as f64 * 100.0
            } else {
                0.0
            },
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn quest(
    id: u64,
    title: &str,
    description: &str,
    module: &str,
    difficulty: &str,
    xp: u64,
    prerequisites: &[u64],
    objectives: &[&str],
    estimated_minutes: u32,
) -> Quest {
    Quest {
        id,
        title: title.to_string(),
        description: description.to_string(),
        module: module.to_string(),
        difficulty: difficulty.to_string(),
        xp,
        prerequisites: prerequisites.to_vec(),
        learning_objectives: objectives.iter().map(|s| s.to_string()).collect(),
        estimated_minutes,
        order: id as u32,
    }
}

/// The starter curriculum loaded into an empty store
pub fn seed_quests() -> Vec<Quest> {
    vec![
        quest(
            1,
            "What is an Option?",
            "Learn the fundamentals of options contracts",
            "Options Basics",
            "beginner",
            50,
            &[],
            &[
                "Understand what options are",
                "Learn basic options terminology",
                "Understand the difference between calls and puts",
            ],
            15,
        ),
        quest(
            2,
            "The Call Option",
            "Master bullish speculation with call options",
            "Options Basics",
            "beginner",
            75,
            &[1],
            &[
                "Understand call option mechanics",
                "Learn when to use call options",
                "Calculate call option profit/loss",
            ],
            20,
        ),
        quest(
            3,
            "The Put Option",
            "Learn bearish strategies with put options",
            "Options Basics",
            "beginner",
            75,
            &[1],
            &[
                "Understand put option mechanics",
                "Learn when to use put options",
                "Calculate put option profit/loss",
            ],
            20,
        ),
        quest(
            4,
            "The Covered Call",
            "Generate income from stock holdings",
            "Income Generation",
            "intermediate",
            100,
            &[2],
            &[
                "Understand covered call strategy",
                "Learn risk/reward of covered calls",
                "Identify optimal stocks for covered calls",
            ],
            25,
        ),
        quest(
            5,
            "Cash-Secured Put",
            "Get paid to buy stocks at lower prices",
            "Income Generation",
            "intermediate",
            100,
            &[3],
            &[
                "Understand cash-secured put strategy",
                "Learn when to use cash-secured puts",
                "Calculate margin requirements",
            ],
            25,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        let quests = seed_quests();
        let mut progress = QuestProgress::default();

        assert_eq!(progress.status(&quests[0]), QuestStatus::Available);
        assert_eq!(progress.status(&quests[1]), QuestStatus::Locked);

        progress.start(&quests[0], Utc::now()).unwrap();
        assert_eq!(progress.status(&quests[0]), QuestStatus::InProgress);

        assert_eq!(progress.complete(&quests[0]), Ok(50));
        assert_eq!(progress.current, None);
        assert_eq!(progress.status(&quests[0]), QuestStatus::Completed);
        assert_eq!(progress.status(&quests[1]), QuestStatus::Available);
        assert_eq!(progress.status(&quests[2]), QuestStatus::Available);
        assert_eq!(progress.status(&quests[3]), QuestStatus::Locked);
    }

    #[test]
    fn test_locked_quest_cannot_start_or_complete() {
        let quests = seed_quests();
        let mut progress = QuestProgress::default();
        assert_eq!(progress.start(&quests[3], Utc::now()), Err(QuestError::Locked));
        assert_eq!(progress.complete(&quests[3]), Err(QuestError::Locked));
    }

    #[test]
    fn test_repeat_completion_grants_no_xp() {
        let quests = seed_quests();
        let mut progress = QuestProgress::default();
        assert_eq!(progress.complete(&quests[0]), Ok(50));
        assert_eq!(progress.complete(&quests[0]), Ok(0));
        assert_eq!(progress.completed, vec![1]);
    }

    #[test]
    fn test_summary() {
        let quests = seed_quests();
        let mut progress = QuestProgress::default();
        progress.complete(&quests[0]).unwrap();
        progress.complete(&quests[1]).unwrap();

        let summary = progress.summary(quests.len());
        assert_eq!(summary.completed_count, 2);
        assert_eq!(summary.total_quests, 5);
        assert!((summary.completion_percentage - 40.0).abs() < 1e-9);
        assert_eq!(QuestProgress::default().summary(0).completion_percentage, 0.0);
    }
}
