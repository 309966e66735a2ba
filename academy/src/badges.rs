//! Badges and the achievement catalogue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stats::TradeStats;

/// XP credited the first time a badge is earned
pub const BADGE_XP: i64 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub earned_at: DateTime<Utc>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
#[serde(tag = "metric", content = "threshold", rename_all = "snake_case")]
pub enum Criterion {
    TotalTrades(u64),
    TotalPl(f64),
    WinningTrades(u64),
    OptionTrades(u64),
    Streak(u64),
    Level(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Achievement {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub rarity: Rarity,
    pub criterion: Criterion,
}

pub const ACHIEVEMENTS: &[Achievement] = &[
    Achievement {
        id: "first_trade",
        name: "First Trade",
        description: "Complete your first trade",
        rarity: Rarity::Common,
        criterion: Criterion::TotalTrades(1),
    },
    Achievement {
        id: "profit_maker",
        name: "Profit Maker",
        description: "Make your first profit",
        rarity: Rarity::Common,
        criterion: Criterion::TotalPl(100.0),
    },
    Achievement {
        id: "risk_manager",
        name: "Risk Manager",
        description: "Complete 10 trades with positive P&L",
        rarity: Rarity::Rare,
        criterion: Criterion::WinningTrades(10),
    },
    Achievement {
        id: "options_expert",
        name: "Options Expert",
        description: "Complete 50 options trades",
        rarity: Rarity::Rare,
        criterion: Criterion::OptionTrades(50),
    },
    Achievement {
        id: "streak_master",
        name: "Streak Master",
        description: "Achieve a 10-trade winning streak",
        rarity: Rarity::Epic,
        criterion: Criterion::Streak(10),
    },
    Achievement {
        id: "level_10",
        name: "Level 10",
        description: "Reach level 10",
        rarity: Rarity::Epic,
        criterion: Criterion::Level(10),
    },
    Achievement {
        id: "high_roller",
        name: "High Roller",
        description: "Make $10,000 profit",
        rarity: Rarity::Legendary,
        criterion: Criterion::TotalPl(10_000.0),
    },
];

impl Criterion {
    pub fn is_met(&self, stats: &TradeStats, level: u32) -> bool {
        match *self {
            Criterion::TotalTrades(n) => stats.total_trades >= n,
            Criterion::TotalPl(amount) => stats.total_pl >= amount,
            Criterion::WinningTrades(n) => stats.winning_trades >= n,
            Criterion::OptionTrades(n) => stats.option_trades >= n,
            Criterion::Streak(n) => stats.current_streak >= n,
            Criterion::Level(n) => level >= n,
        }
    }
}

/// A user's earned badges, unique by id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BadgeSet(pub Vec<Badge>);

impl BadgeSet {
    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|b| b.id == id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Adds the badge unless one with the same id exists. Returns true when
    /// the badge is new.
    pub fn award(&mut self, id: &str, name: &str, now: DateTime<Utc>) -> bool {
        if self.contains(id) {
            return false;
        }
        self.0.push(Badge {
            id: id.to_string(),
            name: name.to_string(),
            earned_at: now,
        });
        true
    }

    /// Catalogue achievements whose criteria are met but not yet earned
    pub fn newly_met(&self, stats: &TradeStats, level: u32) -> Vec<&'static Achievement> {
        ACHIEVEMENTS
            .iter()
            .filter(|a| !self.contains(a.id) && a.criterion.is_met(stats, level))
            .collect()
    }
}
