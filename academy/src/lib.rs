//! Domain core of the options-trading education platform.
//!
//! Everything in here is pure: no I/O, no clocks except where a timestamp is
//! passed in, no async. The HTTP service owns persistence and market data
//! and calls into these modules to apply the platform rules.

pub mod badges;
pub mod leaderboard;
pub mod leveling;
pub mod portfolio;
pub mod quest;
pub mod quiz;
pub mod social;
pub mod stats;
pub mod types;
