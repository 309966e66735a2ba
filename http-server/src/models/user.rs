use academy::badges::BadgeSet;
use academy::leaderboard::Standing;
use academy::leveling::Experience;
use academy::portfolio::Portfolio;
use academy::quest::QuestProgress;
use academy::stats::TradeStats;
use chrono::{DateTime, Utc};
use hex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub avatar: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub password_salt: String,
    #[serde(flatten)]
    pub experience: Experience,
    pub portfolio: Portfolio,
    pub stats: TradeStats,
    pub badges: BadgeSet,
    pub friends: Vec<Uuid>,
    /// Ids of scored quizzes the user has passed
    pub completed_quizzes: Vec<String>,
    pub quests: QuestProgress,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

// Salted SHA-256 of the password, hex encoded
fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Random hex string of `n` bytes
pub fn random_token(n: usize) -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..n).map(|_| rng.r#gen()).collect();
    hex::encode(bytes)
}

impl User {
    pub fn new(
        email: &str,
        username: &str,
        display_name: Option<String>,
        password: &str,
        starting_cash: f64,
        now: DateTime<Utc>,
    ) -> Self {
        let password_salt = random_token(16);
        Self {
            user_id: Uuid::new_v4(),
            email: email.to_lowercase(),
            username: username.to_string(),
            display_name: display_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| username.to_string()),
            avatar: None,
            password_hash: hash_password(password, &password_salt),
            password_salt,
            experience: Experience::default(),
            portfolio: Portfolio::with_cash(starting_cash),
            stats: TradeStats::default(),
            badges: BadgeSet::default(),
            friends: Vec::new(),
            completed_quizzes: Vec::new(),
            quests: QuestProgress::default(),
            is_active: true,
            created_at: now,
            last_active: now,
        }
    }

    pub fn verify_password(&self, password: &str) -> bool {
        hash_password(password, &self.password_salt) == self.password_hash
    }

    pub fn standing(&self) -> Standing {
        Standing {
            total_pl: self.stats.total_pl,
            win_rate: self.stats.win_rate(),
            total_trades: self.stats.total_trades,
            streak: self.stats.current_streak,
            level: self.experience.level,
            xp: self.experience.total_xp,
        }
    }
}

// Session view returned on login/registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub level: u32,
    pub total_xp: u64,
}

impl From<&User> for AuthenticatedUser {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email.clone(),
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            level: user.experience.level,
            total_xp: user.experience.total_xp,
        }
    }
}

/// What other users may see: no email, credentials or portfolio
#[derive(Debug, Clone, Serialize)]
pub struct PublicProfile {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub avatar: Option<String>,
    pub level: u32,
    pub total_xp: u64,
    pub total_pl: f64,
    pub win_rate: f64,
    pub total_trades: u64,
    pub streak: u64,
    pub badges: usize,
    pub last_active: DateTime<Utc>,
}

impl From<&User> for PublicProfile {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id,
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            avatar: user.avatar.clone(),
            level: user.experience.level,
            total_xp: user.experience.total_xp,
            total_pl: user.stats.total_pl,
            win_rate: user.stats.win_rate(),
            total_trades: user.stats.total_trades,
            streak: user.stats.current_streak,
            badges: user.badges.len(),
            last_active: user.last_active,
        }
    }
}
