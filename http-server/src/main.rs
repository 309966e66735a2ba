use anyhow::Context;
use axum::{
    Router,
    routing::{any, delete, get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod extract;
mod market_data;
mod middleware;
mod models;
mod routes;
mod websocket;

#[cfg(test)]
mod tests;

use config::{MarketDataProvider, ServerConfig};
use market_data::{MarketData, StaticMarketData, YahooFinance};
use models::{InMemoryStorage, Tables};
use routes::{auth, education, friends, leaderboard, market, portfolio, quizzes, users};
use websocket::{NotificationManager, create_notification_manager, websocket_handler};

// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub storage: InMemoryStorage,
    pub market_data: Arc<dyn MarketData>,
    pub notification_manager: NotificationManager,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig, market_data: Arc<dyn MarketData>) -> Self {
        Self {
            storage: InMemoryStorage::new(),
            market_data,
            notification_manager: create_notification_manager(),
            config: Arc::new(config),
        }
    }

    /// Mutates storage, then pushes any notifications it produced to
    /// connected users
    pub fn write<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
        let (result, outbox) = self.storage.write(f);
        websocket::deliver(&self.notification_manager, outbox);
        result
    }
}

pub fn app(state: AppState) -> Router {
    let api = Router::new()
        // auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/deactivate", post(auth::deactivate))
        .route(
            "/auth/profile",
            get(auth::get_profile).put(auth::update_profile),
        )
        // users
        .route("/users/stats", get(users::get_stats))
        .route("/users/achievements", get(users::get_achievements))
        .route("/users/experience", post(users::add_experience))
        .route("/users/badges", post(users::award_badge))
        .route("/users/balance", post(users::adjust_balance))
        // quizzes
        .route(
            "/quizzes",
            get(quizzes::list_quizzes).post(quizzes::create_quiz),
        )
        .route("/quizzes/progress", get(quizzes::list_progress))
        .route("/quizzes/statistics", get(quizzes::get_statistics))
        .route(
            "/quizzes/attempts",
            get(quizzes::list_attempts).post(quizzes::submit_attempt),
        )
        .route("/quizzes/{id}", get(quizzes::get_quiz))
        .route("/quizzes/{id}/answer", post(quizzes::submit_answer))
        .route("/quizzes/{id}/progress", get(quizzes::get_quiz_progress))
        // portfolio
        .route("/portfolio", get(portfolio::get_portfolio))
        .route("/portfolio/positions", post(portfolio::open_position))
        .route(
            "/portfolio/positions/{id}",
            delete(portfolio::close_position),
        )
        .route("/portfolio/history", get(portfolio::get_history))
        // friends
        .route("/friends", get(friends::list_friends))
        .route("/friends/search", get(friends::search_users))
        .route("/friends/activities", get(friends::activities))
        .route(
            "/friends/requests",
            get(friends::list_requests).post(friends::send_request),
        )
        .route(
            "/friends/requests/{id}/accept",
            post(friends::accept_request),
        )
        .route(
            "/friends/requests/{id}/decline",
            post(friends::decline_request),
        )
        .route("/friends/{id}", delete(friends::remove))
        .route("/friends/{id}/compare", get(friends::compare_with))
        // leaderboard
        .route("/leaderboard", get(leaderboard::get_leaderboard))
        .route("/leaderboard/categories", get(leaderboard::get_categories))
        .route("/leaderboard/user-rank", get(leaderboard::get_user_rank))
        // education
        .route("/education/quests", get(education::list_quests))
        .route(
            "/education/quests/{id}/start",
            post(education::start_quest),
        )
        .route(
            "/education/quests/{id}/complete",
            post(education::complete_quest),
        )
        .route("/education/progress", get(education::get_progress))
        // market data
        .route("/market/quote/{symbol}", get(market::get_quote))
        .route("/market/options/{symbol}", get(market::get_options))
        .route("/market/chart/{symbol}", get(market::get_chart))
        .route("/market/search", get(market::search_symbols));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/notifications", any(websocket_handler))
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

fn market_data_for(config: &ServerConfig) -> anyhow::Result<Arc<dyn MarketData>> {
    Ok(match config.market_data_provider {
        MarketDataProvider::Yahoo => Arc::new(
            YahooFinance::new(&config.market_data_url, config.market_data_timeout)
                .context("Failed to build market data client")?,
        ),
        MarketDataProvider::Static => Arc::new(StaticMarketData::with_defaults()),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env().context("Invalid configuration")?;
    let market_data = market_data_for(&config)?;
    tracing::info!(
        "Market data provider: {:?} ({})",
        config.market_data_provider,
        config.market_data_url
    );

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config, market_data);
    tracing::info!("In-memory storage initialized successfully");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    tracing::info!("Server running on http://{}", bind_addr);
    axum::serve(listener, app(state)).await?;

    Ok(())
}

// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

// Root endpoint
async fn root() -> &'static str {
    "Options Academy API - POST /api/auth/register or /api/auth/login for a token, then call /api/* with Authorization: Bearer <token>. WebSocket /notifications for live friend activity"
}
