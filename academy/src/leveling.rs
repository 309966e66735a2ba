//! Experience points and levels.
//!
//! Level is a pure function of cumulative XP:
//! `level = floor(sqrt(total_xp / 100)) + 1`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// XP divisor inside the square root
const XP_SCALE: u64 = 100;

/// Largest amount a single credit may add
pub const MAX_XP_CREDIT: i64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XpError {
    #[error("Experience gained must be positive")]
    NonPositiveDelta,
    #[error("Experience gained must be at most {MAX_XP_CREDIT}")]
    DeltaTooLarge,
}

/// Level reached with `total_xp` cumulative experience
pub fn level_for_xp(total_xp: u64) -> u32 {
    // floor(sqrt(floor(x))) == floor(sqrt(x)) for x >= 0
    ((total_xp / XP_SCALE).isqrt() as u32).saturating_add(1)
}

/// Minimum cumulative XP at which `level` is reached, saturating at
/// `u64::MAX` for levels past the representable range
pub fn xp_for_level(level: u32) -> u64 {
    let steps = u64::from(level.max(1) - 1);
    steps.saturating_mul(steps).saturating_mul(XP_SCALE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experience {
    pub total_xp: u64,
    pub level: u32,
}

impl Default for Experience {
    fn default() -> Self {
        Self {
            total_xp: 0,
            level: 1,
        }
    }
}

/// Result of crediting experience
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct XpGain {
    pub xp_gained: u64,
    pub total_xp: u64,
    pub previous_level: u32,
    pub level: u32,
}

impl XpGain {
    pub fn leveled_up(&self) -> bool {
        self.level > self.previous_level
    }
}

/// Where a user sits between their current and next level
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LevelProgress {
    pub level: u32,
    pub total_xp: u64,
    pub current_level_xp: u64,
    pub next_level_xp: u64,
    pub progress_percent: f64,
}

impl Experience {
    pub fn from_xp(total_xp: u64) -> Self {
        Self {
            total_xp,
            level: level_for_xp(total_xp),
        }
    }

    /// Credits `delta` XP and recomputes the level
    pub fn apply(&mut self, delta: i64) -> Result<XpGain, XpError> {
        if delta <= 0 {
            return Err(XpError::NonPositiveDelta);
        }
        if delta > MAX_XP_CREDIT {
            return Err(XpError::DeltaTooLarge);
        }
        let previous_level = self.level;
        self.total_xp = self.total_xp.saturating_add(delta as u64);
        self.level = level_for_xp(self.total_xp);

        Ok(XpGain {
            xp_gained: delta as u64,
            total_xp: self.total_xp,
            previous_level,
            level: self.level,
        })
    }

    pub fn progress(&self) -> LevelProgress {
        let current_level_xp = xp_for_level(self.level);
        let next_level_xp = xp_for_level(self.level.saturating_add(1));
        let span = next_level_xp.saturating_sub(current_level_xp);
        let progress_percent = if span == 0 {
            0.0
        } else {
            let into_level = self.total_xp.saturating_sub(current_level_xp);
            (into_level as f64 / span as f64 * 100.0).min(100.0)
        };
        LevelProgress {
            level: self.level,
            total_xp: self.total_xp,
            current_level_xp,
            next_level_xp,
            progress_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_thresholds() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(99), 1);
        assert_eq!(level_for_xp(100), 2);
        assert_eq!(level_for_xp(399), 2);
        assert_eq!(level_for_xp(400), 3);
        assert_eq!(level_for_xp(8_100), 10);
    }

    #[test]
    fn test_level_is_non_decreasing() {
        let mut previous = level_for_xp(0);
        for xp in (0..50_000).step_by(7) {
            let level = level_for_xp(xp);
            assert!(level >= previous, "level dropped at {xp} xp");
            previous = level;
        }
    }

    #[test]
    fn test_xp_for_level_inverts_level_for_xp() {
        for level in 1..40 {
            let xp = xp_for_level(level);
            assert_eq!(level_for_xp(xp), level);
            if xp > 0 {
                assert_eq!(level_for_xp(xp - 1), level - 1);
            }
        }
    }

    #[test]
    fn test_apply_levels_up() {
        let mut exp = Experience::default();
        let gain = exp.apply(150).unwrap();
        assert_eq!(gain.total_xp, 150);
        assert_eq!(gain.previous_level, 1);
        assert_eq!(gain.level, 2);
        assert!(gain.leveled_up());

        let gain = exp.apply(10).unwrap();
        assert!(!gain.leveled_up());
        assert_eq!(exp.total_xp, 160);
    }

    #[test]
    fn test_apply_rejects_non_positive() {
        let mut exp = Experience::from_xp(500);
        assert_eq!(exp.apply(0), Err(XpError::NonPositiveDelta));
        assert_eq!(exp.apply(-20), Err(XpError::NonPositiveDelta));
        assert_eq!(exp.total_xp, 500);
    }

    #[test]
    fn test_apply_rejects_oversized_credit() {
        let mut exp = Experience::default();
        assert_eq!(exp.apply(i64::MAX), Err(XpError::DeltaTooLarge));
        assert_eq!(exp.apply(MAX_XP_CREDIT + 1), Err(XpError::DeltaTooLarge));
        assert_eq!(exp.total_xp, 0);
        assert!(exp.apply(MAX_XP_CREDIT).is_ok());
    }

    #[test]
    fn test_progress_at_max_xp() {
        let progress = Experience::from_xp(u64::MAX).progress();
        assert_eq!(progress.level, level_for_xp(u64::MAX));
        assert_eq!(progress.current_level_xp, xp_for_level(progress.level));
        assert_eq!(progress.next_level_xp, u64::MAX);
        assert!((0.0..=100.0).contains(&progress.progress_percent));
        assert_eq!(xp_for_level(u32::MAX), u64::MAX);

        let mut exp = Experience::from_xp(u64::MAX - 10);
        exp.apply(MAX_XP_CREDIT).unwrap();
        assert_eq!(exp.total_xp, u64::MAX);
        assert!((0.0..=100.0).contains(&exp.progress().progress_percent));
    }

    #[test]
    fn test_progress() {
        let exp = Experience::from_xp(250);
        let progress = exp.progress();
        assert_eq!(progress.level, 2);
        assert_eq!(progress.current_level_xp, 100);
        assert_eq!(progress.next_level_xp, 400);
        assert!((progress.progress_percent - 50.0).abs() < 1e-9);
    }
}
