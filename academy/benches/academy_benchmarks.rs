use academy::leaderboard::{rank, rank_of, Category, Standing};
use academy::portfolio::{Fill, Portfolio};
use academy::types::Instrument;
use chrono::Utc;
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn standings(n: u64) -> Vec<Standing> {
    (0..n)
        .map(|i| Standing {
            total_pl: ((i * 7919) % 10_007) as f64 - 5_000.0,
            win_rate: (i % 100) as f64,
            total_trades: i % 250,
            streak: i % 12,
            level: (i % 40) as u32 + 1,
            xp: (i * 31) % 100_000,
        })
        .collect()
}

fn stock(symbol: &str, quantity: f64, price: f64) -> Fill {
    Fill {
        symbol: symbol.to_string(),
        instrument: Instrument::Stock,
        quantity,
        price,
        option_details: None,
    }
}

// Benchmark for ranking ten thousand users by profit
fn bench_rank_users(c: &mut Criterion) {
    c.bench_function("rank_10k_total_profit", |b| {
        b.iter_with_setup(
            || standings(10_000),
            |rows| {
                black_box(rank(rows, Category::TotalProfit, 50, |s| *s));
            },
        )
    });
}

// Benchmark for a single user's rank lookup
fn bench_rank_of_user(c: &mut Criterion) {
    let rows = standings(10_000);
    let target = rows[4_321];
    c.bench_function("rank_of_10k_xp", |b| {
        b.iter(|| black_box(rank_of(&rows, &target, Category::Xp)))
    });
}

// Benchmark for repeated buys merging into a held position
fn bench_averaging_buys(c: &mut Criterion) {
    c.bench_function("portfolio_averaging_buy", |b| {
        b.iter_with_setup(
            || {
                let mut portfolio = Portfolio::with_cash(1_000_000.0);
                for (i, symbol) in ["AAPL", "MSFT", "NVDA", "AMD", "TSLA"].iter().enumerate() {
                    let _ = portfolio.buy(stock(symbol, 10.0, 100.0 + i as f64), Utc::now());
                }
                portfolio
            },
            |mut portfolio| {
                black_box(portfolio.buy(stock("TSLA", 5.0, 210.0), Utc::now()).ok());
            },
        )
    });
}

criterion_group!(
    benches,
    bench_rank_users,
    bench_rank_of_user,
    bench_averaging_buys
);
criterion_main!(benches);
