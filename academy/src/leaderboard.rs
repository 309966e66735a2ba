//! Ranking users by a selected metric.

use serde::{Deserialize, Serialize};

/// Upper bound on entries returned by one ranking
pub const MAX_LIMIT: usize = 500;
pub const DEFAULT_LIMIT: usize = 50;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    TotalProfit,
    WinRate,
    MostTrades,
    Streak,
    Level,
    Xp,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::TotalProfit,
        Category::WinRate,
        Category::MostTrades,
        Category::Streak,
        Category::Level,
        Category::Xp,
    ];

    /// Parses a category id, falling back to total profit for anything unknown
    pub fn parse_or_default(id: Option<&str>) -> Self {
        match id {
            Some("win_rate") => Category::WinRate,
            Some("most_trades") => Category::MostTrades,
            Some("streak") => Category::Streak,
            Some("level") => Category::Level,
            Some("xp") => Category::Xp,
            _ => Category::TotalProfit,
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            Category::TotalProfit => "total_profit",
            Category::WinRate => "win_rate",
            Category::MostTrades => "most_trades",
            Category::Streak => "streak",
            Category::Level => "level",
            Category::Xp => "xp",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::TotalProfit => "Total Profit",
            Category::WinRate => "Win Rate",
            Category::MostTrades => "Most Active",
            Category::Streak => "Current Streak",
            Category::Level => "Highest Level",
            Category::Xp => "Most Experience",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Category::TotalProfit => "Highest total profit/loss",
            Category::WinRate => "Highest percentage of winning trades",
            Category::MostTrades => "Most trades completed",
            Category::Streak => "Longest current winning streak",
            Category::Level => "Highest level reached",
            Category::Xp => "Most experience points earned",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CategoryInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub fn categories() -> Vec<CategoryInfo> {
    Category::ALL
        .iter()
        .map(|c| CategoryInfo {
            id: c.id(),
            name: c.name(),
            description: c.description(),
        })
        .collect()
}

/// The metrics a user is ranked on
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Standing {
    pub total_pl: f64,
    pub win_rate: f64,
    pub total_trades: u64,
    pub streak: u64,
    pub level: u32,
    pub xp: u64,
}

impl Standing {
    pub fn metric(&self, category: Category) -> f64 {
        match category {
            Category::TotalProfit => self.total_pl,
            Category::WinRate => self.win_rate,
            Category::MostTrades => self.total_trades as f64,
            Category::Streak => self.streak as f64,
            Category::Level => f64::from(self.level),
            Category::Xp => self.xp as f64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranked<T> {
    pub rank: usize,
    #[serde(flatten)]
    pub entry: T,
}

/// Sorts `rows` best-first by `category` and numbers them from 1.
/// The sort is stable, so equal metrics keep the order rows were given in.
pub fn rank<T, F>(mut rows: Vec<T>, category: Category, limit: usize, standing: F) -> Vec<Ranked<T>>
where
    F: Fn(&T) -> Standing,
{
    rows.sort_by(|a, b| {
        standing(b)
            .metric(category)
            .total_cmp(&standing(a).metric(category))
    });
    rows.into_iter()
        .take(limit.min(MAX_LIMIT))
        .enumerate()
        .map(|(i, entry)| Ranked { rank: i + 1, entry })
        .collect()
}

/// One plus the number of standings strictly better than `target`
pub fn rank_of<'a>(
    standings: impl IntoIterator<Item = &'a Standing>,
    target: &Standing,
    category: Category,
) -> usize {
    let score = target.metric(category);
    standings
        .into_iter()
        .filter(|s| s.metric(category) > score)
        .count()
        + 1
}
