//! Realized-trade bookkeeping: win rate, streaks, best and worst trades.

use serde::{Deserialize, Serialize};

use crate::types::Instrument;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    pub total_trades: u64,
    pub winning_trades: u64,
    pub option_trades: u64,
    /// Consecutive winning trades up to the most recent one
    pub current_streak: u64,
    pub longest_streak: u64,
    pub total_pl: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
}

impl TradeStats {
    /// Records one closed trade. A break-even trade counts as a loss.
    pub fn record(&mut self, instrument: Instrument, realized_pl: f64) {
        let first = self.total_trades == 0;
        self.total_trades += 1;
        if instrument == Instrument::Option {
            self.option_trades += 1;
        }

        if realized_pl > 0.0 {
            self.winning_trades += 1;
            self.current_streak += 1;
            self.longest_streak = self.longest_streak.max(self.current_streak);
        } else {
            self.current_streak = 0;
        }

        self.total_pl += realized_pl;
        if first {
            self.best_trade = realized_pl;
            self.worst_trade = realized_pl;
        } else {
            self.best_trade = self.best_trade.max(realized_pl);
            self.worst_trade = self.worst_trade.min(realized_pl);
        }
    }

    /// Percentage of closed trades that made money
    pub fn win_rate(&self) -> f64 {
        if self.total_trades == 0 {
            0.0
        } else {
            self.winning_trades as f64 / self.total_trades as f64 * 100.0
        }
    }

    pub fn average_trade(&self) -> f64 {
        if self.total_trades == 0 {
            0.0
        } else {
            self.total_pl / self.total_trades as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streak_bookkeeping() {
        let mut stats = TradeStats::default();
        stats.record(Instrument::Stock, 10.0);
        stats.record(Instrument::Stock, 5.0);
        stats.record(Instrument::Option, 1.0);
        assert_eq!(stats.current_streak, 3);
        assert_eq!(stats.longest_streak, 3);

        stats.record(Instrument::Stock, -4.0);
        assert_eq!(stats.current_streak, 0);
        assert_eq!(stats.longest_streak, 3);

        stats.record(Instrument::Stock, 2.0);
        assert_eq!(stats.current_streak, 1);
        assert_eq!(stats.longest_streak, 3);
        assert_eq!(stats.option_trades, 1);
    }

    #[test]
    fn test_break_even_resets_streak() {
        let mut stats = TradeStats::default();
        stats.record(Instrument::Stock, 3.0);
        stats.record(Instrument::Stock, 0.0);
        assert_eq!(stats.current_streak, 0);
        assert_eq!(stats.winning_trades, 1);
    }

    #[test]
    fn test_totals_and_rates() {
        let mut stats = TradeStats::default();
        assert_eq!(stats.win_rate(), 0.0);
        assert_eq!(stats.average_trade(), 0.0);

        stats.record(Instrument::Stock, -20.0);
        assert_eq!(stats.best_trade, -20.0);
        assert_eq!(stats.worst_trade, -20.0);

        stats.record(Instrument::Stock, 50.0);
        stats.record(Instrument::Stock, 30.0);
        stats.record(Instrument::Stock, -10.0);

        assert_eq!(stats.total_trades, 4);
        assert_eq!(stats.total_pl, 50.0);
        assert_eq!(stats.best_trade, 50.0);
        assert_eq!(stats.worst_trade, -20.0);
        assert_eq!(stats.win_rate(), 50.0);
        assert_eq!(stats.average_trade(), 12.5);
    }
}
