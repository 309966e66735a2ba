use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

use crate::{AppState, app, config::ServerConfig, market_data::StaticMarketData};

fn test_app() -> Router {
    let market_data = StaticMarketData::new()
        .with_price("AAPL", 150.0)
        .with_price("MSFT", 400.0);
    app(AppState::new(ServerConfig::default(), Arc::new(market_data)))
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// Registers a user and returns (token, user_id)
async fn register(app: &Router, username: &str) -> (String, String) {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "email": format!("{username}@example.com"),
            "password": "password123",
            "username": username,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    (
        body["data"]["token"].as_str().unwrap().to_string(),
        body["data"]["user"]["user_id"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_auth_flow() {
    let app = test_app();
    let (token, _) = register(&app, "alice").await;

    // Duplicate email or username
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"email": "ALICE@example.com", "password": "password123", "username": "other"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"email": "bob@example.com", "password": "short", "username": "bob"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"email": "not-an-email", "password": "password123", "username": "bob"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": "alice@example.com", "password": "wrong-password"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": "alice@example.com", "password": "password123"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let login_token = body["data"]["token"].as_str().unwrap().to_string();
    assert_ne!(login_token, token);

    let (status, body) = call(&app, Method::GET, "/api/auth/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "alice");
    assert_eq!(body["data"]["level"], 1);
    assert!(body["data"].get("password_hash").is_none());

    let (status, body) = call(
        &app,
        Method::PUT,
        "/api/auth/profile",
        Some(&token),
        Some(json!({"display_name": "Alice A."})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["display_name"], "Alice A.");

    let (status, _) = call(
        &app,
        Method::PUT,
        "/api/auth/profile",
        Some(&token),
        Some(json!({"display_name": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, Method::POST, "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, Method::GET, "/api/auth/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The login session is independent
    let (status, _) = call(&app, Method::GET, "/api/auth/profile", Some(&login_token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, Method::GET, "/api/users/stats", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Missing Authorization header");
}

#[tokio::test]
async fn test_portfolio_lifecycle() {
    let app = test_app();
    let (token, _) = register(&app, "trader").await;

    for price in [100.0, 120.0] {
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/portfolio/positions",
            Some(&token),
            Some(json!({"symbol": "aapl", "quantity": 10, "price": price})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }

    let (status, body) = call(&app, Method::GET, "/api/portfolio", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["positions"].as_array().unwrap().len(), 1);
    let position = &data["positions"][0];
    assert_eq!(position["symbol"], "AAPL");
    assert_eq!(position["quantity"], 20.0);
    assert_eq!(position["avg_price"], 110.0);
    assert_eq!(position["current_price"], 150.0);
    assert_eq!(position["quote_available"], true);
    assert_eq!(data["cash_balance"], 7_800.0);
    assert_eq!(data["total_value"], 7_800.0 + 3_000.0);
    let position_id = position["id"].as_str().unwrap().to_string();

    // Rejected without touching cash
    let (status, _) = call(
        &app,
        Method::POST,
        "/api/portfolio/positions",
        Some(&token),
        Some(json!({"symbol": "MSFT", "quantity": 100, "price": 400.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Option buys need contract terms
    let (status, _) = call(
        &app,
        Method::POST,
        "/api/portfolio/positions",
        Some(&token),
        Some(json!({"symbol": "AAPL", "instrument": "option", "quantity": 1, "price": 2.5})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &app,
        Method::DELETE,
        &format!("/api/portfolio/positions/{position_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["exit_price"], 150.0);
    assert_eq!(body["data"]["realized_pl"], 800.0);
    assert_eq!(body["data"]["cash_balance"], 10_800.0);
    assert_eq!(
        body["data"]["badges_earned"],
        json!(["first_trade", "profit_maker"])
    );

    let (status, _) = call(
        &app,
        Method::DELETE,
        &format!("/api/portfolio/positions/{position_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = call(&app, Method::GET, "/api/portfolio/history", Some(&token), None).await;
    let history = body["data"].as_array().unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0]["side"], "sell");
    assert_eq!(history[0]["realized_pl"], 800.0);

    let (_, body) = call(&app, Method::GET, "/api/users/stats", Some(&token), None).await;
    let stats = &body["data"];
    assert_eq!(stats["total_trades"], 1);
    assert_eq!(stats["win_rate"], 100.0);
    assert_eq!(stats["total_pl"], 800.0);
    assert_eq!(stats["badges"], 2);
    assert_eq!(stats["total_xp"], 200);
    assert_eq!(stats["level"], 2);
}

#[tokio::test]
async fn test_quiz_xp_credited_once() {
    let app = test_app();
    let (token, _) = register(&app, "student").await;

    let (status, body) = call(&app, Method::GET, "/api/quizzes?difficulty=easy", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let quizzes = body["data"].as_array().unwrap();
    assert!(quizzes.iter().all(|q| q["difficulty"] == "easy"));
    let quiz = &quizzes[0];
    let quiz_id = quiz["id"].as_u64().unwrap();
    let correct = quiz["correct_choice"].as_i64().unwrap();
    let reward = quiz["xp_reward"].as_u64().unwrap();

    let (status, _) = call(&app, Method::GET, "/api/quizzes?difficulty=expert", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let answer_uri = format!("/api/quizzes/{quiz_id}/answer");
    let (_, body) = call(
        &app,
        Method::POST,
        &answer_uri,
        Some(&token),
        Some(json!({"selected_choice": correct + 1})),
    )
    .await;
    assert_eq!(body["data"]["correct"], false);
    assert_eq!(body["data"]["xp_earned"], 0);

    for expected_xp in [reward, 0] {
        let (status, body) = call(
            &app,
            Method::POST,
            &answer_uri,
            Some(&token),
            Some(json!({"selected_choice": correct})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["correct"], true);
        assert_eq!(body["data"]["xp_earned"], expected_xp);
    }

    let (_, body) = call(
        &app,
        Method::GET,
        &format!("/api/quizzes/{quiz_id}/progress"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["data"]["attempts"], 3);
    assert_eq!(body["data"]["best_score"], 1);
    assert_eq!(body["data"]["earned_xp"], reward);

    let (_, body) = call(&app, Method::GET, "/api/users/stats", Some(&token), None).await;
    assert_eq!(body["data"]["total_xp"], reward);
    assert_eq!(body["data"]["quizzes_correct"], 1);

    let (_, body) = call(&app, Method::GET, "/api/quizzes/statistics", None, None).await;
    let stats = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["quiz_id"] == quiz_id)
        .unwrap()
        .clone();
    assert_eq!(stats["users_attempted"], 1);
    assert_eq!(stats["total_attempts"], 3);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/quizzes/999/answer",
        Some(&token),
        Some(json!({"selected_choice": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_quiz_validation() {
    let app = test_app();
    let (token, _) = register(&app, "author").await;

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/quizzes",
        Some(&token),
        Some(json!({
            "question": "Pick one",
            "choices": ["only"],
            "correct_choice": 0,
            "xp_reward": 10,
            "difficulty": "easy"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/quizzes",
        Some(&token),
        Some(json!({
            "question": "What is theta?",
            "choices": ["Time decay", "Volatility sensitivity"],
            "correct_choice": 0,
            "xp_reward": 15,
            "difficulty": "medium"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["id"].as_u64().unwrap();

    let (status, body) = call(&app, Method::GET, &format!("/api/quizzes/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["question"], "What is theta?");
}

#[tokio::test]
async fn test_quiz_attempts() {
    let app = test_app();
    let (token, _) = register(&app, "examinee").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/quizzes/attempts",
        Some(&token),
        Some(json!({"quiz_id": "greeks-101", "score": 8, "max_score": 10, "answers": [1, 2]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["attempt"]["passed"], true);
    assert_eq!(body["data"]["attempt"]["percentage"], 80.0);
    assert_eq!(body["data"]["xp"]["xp_gained"], 50);
    assert_eq!(body["data"]["newly_completed"], true);

    let (_, body) = call(
        &app,
        Method::POST,
        "/api/quizzes/attempts",
        Some(&token),
        Some(json!({"quiz_id": "greeks-101", "score": 5, "max_score": 10, "answers": []})),
    )
    .await;
    assert_eq!(body["data"]["attempt"]["passed"], false);
    assert_eq!(body["data"]["attempt"]["attempt_number"], 2);
    assert_eq!(body["data"]["xp"]["xp_gained"], 25);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/quizzes/attempts",
        Some(&token),
        Some(json!({"quiz_id": "greeks-101", "score": 1, "max_score": 0, "answers": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = call(
        &app,
        Method::GET,
        "/api/quizzes/attempts?quiz_id=greeks-101",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_friends_flow() {
    let app = test_app();
    let (alice, _) = register(&app, "alice").await;
    let (bob, bob_id) = register(&app, "bob").await;

    let (status, body) = call(&app, Method::GET, "/api/friends/search?q=bo", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["username"], "bob");
    let (status, _) = call(&app, Method::GET, "/api/friends/search?q=b", Some(&alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = json!({"to_user_id": bob_id, "message": "Trade with me"});
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/friends/requests",
        Some(&alice),
        Some(request.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let request_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/friends/requests",
        Some(&alice),
        Some(request),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = call(&app, Method::GET, "/api/friends/requests", Some(&bob), None).await;
    assert_eq!(body["data"][0]["direction"], "received");
    assert_eq!(body["data"][0]["counterpart"]["username"], "alice");

    // Only the recipient may accept
    let accept_uri = format!("/api/friends/requests/{request_id}/accept");
    let (status, _) = call(&app, Method::POST, &accept_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&app, Method::POST, &accept_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(&app, Method::GET, "/api/friends", Some(&alice), None).await;
    assert_eq!(body["data"][0]["username"], "bob");

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/friends/requests",
        Some(&alice),
        Some(json!({"to_user_id": bob_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    call(
        &app,
        Method::POST,
        "/api/portfolio/positions",
        Some(&bob),
        Some(json!({"symbol": "MSFT", "quantity": 1, "price": 390.0})),
    )
    .await;
    let (_, body) = call(&app, Method::GET, "/api/friends/activities", Some(&alice), None).await;
    let feed = body["data"].as_array().unwrap();
    assert_eq!(feed[0]["kind"], "trade");
    assert!(feed.iter().all(|a| a["user_id"] == bob_id.as_str()));

    let (status, body) = call(
        &app,
        Method::GET,
        &format!("/api/friends/{bob_id}/compare"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["level"]["difference"], 0.0);

    let (status, _) = call(
        &app,
        Method::DELETE,
        &format!("/api/friends/{bob_id}"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(
        &app,
        Method::GET,
        &format!("/api/friends/{bob_id}/compare"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_self_friend_request_rejected() {
    let app = test_app();
    let (token, user_id) = register(&app, "loner").await;
    let (status, _) = call(
        &app,
        Method::POST,
        "/api/friends/requests",
        Some(&token),
        Some(json!({"to_user_id": user_id})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_leaderboard_ties_keep_registration_order() {
    let app = test_app();
    let mut tokens = Vec::new();
    for name in ["first", "second", "third"] {
        tokens.push(register(&app, name).await.0);
    }

    let (status, body) = call(
        &app,
        Method::GET,
        "/api/leaderboard?category=unknown&limit=2",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["category"], "total_profit");
    assert_eq!(body["data"]["total_users"], 3);
    let entries = body["data"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["rank"], 1);
    assert_eq!(entries[0]["username"], "first");
    assert_eq!(entries[1]["username"], "second");

    call(
        &app,
        Method::POST,
        "/api/users/experience",
        Some(&tokens[2]),
        Some(json!({"amount": 150})),
    )
    .await;
    let (_, body) = call(&app, Method::GET, "/api/leaderboard?category=xp", None, None).await;
    assert_eq!(body["data"]["entries"][0]["username"], "third");
    assert_eq!(body["data"]["entries"][0]["score"], 150.0);

    let (_, body) = call(
        &app,
        Method::GET,
        "/api/leaderboard/user-rank?category=xp",
        Some(&tokens[0]),
        None,
    )
    .await;
    assert_eq!(body["data"]["rank"], 2);

    let (_, body) = call(&app, Method::GET, "/api/leaderboard/categories", None, None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn test_experience_and_badges() {
    let app = test_app();
    let (token, _) = register(&app, "grinder").await;

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/users/experience",
        Some(&token),
        Some(json!({"amount": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = call(
        &app,
        Method::POST,
        "/api/users/experience",
        Some(&token),
        Some(json!({"amount": 100, "activity_type": "lesson"})),
    )
    .await;
    assert_eq!(body["data"]["leveled_up"], true);
    assert_eq!(body["data"]["level"], 2);

    let badge = json!({"badge_id": "early_bird", "badge_name": "Early Bird"});
    let (status, body) = call(&app, Method::POST, "/api/users/badges", Some(&token), Some(badge.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_xp"], 200);
    let (status, _) = call(&app, Method::POST, "/api/users/badges", Some(&token), Some(badge)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = call(
        &app,
        Method::POST,
        "/api/users/balance",
        Some(&token),
        Some(json!({"amount": -20_000.0})),
    )
    .await;
    assert_eq!(body["data"]["cash_balance"], 0.0);

    let (_, body) = call(&app, Method::GET, "/api/users/achievements", Some(&token), None).await;
    let achievements = body["data"].as_array().unwrap();
    assert!(achievements.iter().all(|a| a["earned"] == false));
}

#[tokio::test]
async fn test_quests() {
    let app = test_app();
    let (token, _) = register(&app, "learner").await;

    let (_, body) = call(&app, Method::GET, "/api/education/quests", Some(&token), None).await;
    let quests = body["data"].as_array().unwrap();
    assert_eq!(quests[0]["status"], "available");
    assert_eq!(quests[1]["status"], "locked");

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/education/quests/2/start",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/education/quests/1/start",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "in_progress");

    let (_, body) = call(
        &app,
        Method::POST,
        "/api/education/quests/1/complete",
        Some(&token),
        None,
    )
    .await;
    let earned = body["data"]["xp_earned"].as_u64().unwrap();
    assert!(earned > 0);

    let (_, body) = call(
        &app,
        Method::POST,
        "/api/education/quests/1/complete",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["data"]["xp_earned"], 0);

    let (_, body) = call(&app, Method::GET, "/api/education/progress", Some(&token), None).await;
    assert_eq!(body["data"]["completed_count"], 1);
    assert_eq!(body["data"]["total_quests"], 5);
    assert_eq!(body["data"]["level_progress"]["total_xp"], earned);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/education/quests/42/start",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_market_endpoints() {
    let app = test_app();

    let (status, body) = call(&app, Method::GET, "/api/market/quote/aapl", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["symbol"], "AAPL");
    assert_eq!(body["data"]["price"], 150.0);

    let (status, body) = call(&app, Method::GET, "/api/market/quote/ZZZZ", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, _) = call(&app, Method::GET, "/api/market/chart/AAPL?period=2w", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(&app, Method::GET, "/api/market/chart/AAPL", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["period"], "1mo");

    let (status, _) = call(&app, Method::GET, "/api/market/options/AAPL", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = call(&app, Method::GET, "/api/market/search?q=micro", None, None).await;
    assert_eq!(body["data"][0]["symbol"], "MSFT");
}

#[tokio::test]
async fn test_experience_credit_is_capped() {
    let app = test_app();
    let (token, _) = register(&app, "farmer").await;

    for amount in [json!(1_000_001), json!(i64::MAX)] {
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/users/experience",
            Some(&token),
            Some(json!({"amount": amount})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    for _ in 0..2 {
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/users/experience",
            Some(&token),
            Some(json!({"amount": 1_000_000})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = call(&app, Method::GET, "/api/users/stats", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["total_xp"].as_u64().unwrap() >= 2_000_000);
}

#[tokio::test]
async fn test_deactivated_account_disappears() {
    let app = test_app();
    let (alice, _) = register(&app, "alice").await;
    let (bob, _) = register(&app, "bobby").await;

    let (status, _) = call(&app, Method::POST, "/api/auth/deactivate", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, Method::GET, "/api/auth/profile", Some(&bob), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": "bobby@example.com", "password": "password123"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, body) = call(&app, Method::GET, "/api/friends/search?q=bob", Some(&alice), None).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let (_, body) = call(&app, Method::GET, "/api/leaderboard", None, None).await;
    let entries = body["data"]["entries"].as_array().unwrap();
    assert!(entries.iter().all(|e| e["username"] != "bobby"));
    assert!(entries.iter().any(|e| e["username"] == "alice"));
}

#[tokio::test]
async fn test_unrewarded_quiz_reaches_friend_feed_once() {
    let app = test_app();
    let (alice, _) = register(&app, "alice").await;
    let (bob, bob_id) = register(&app, "bob").await;

    let (_, body) = call(
        &app,
        Method::POST,
        "/api/friends/requests",
        Some(&alice),
        Some(json!({"to_user_id": bob_id})),
    )
    .await;
    let request_id = body["data"]["id"].as_str().unwrap().to_string();
    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/api/friends/requests/{request_id}/accept"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/quizzes",
        Some(&alice),
        Some(json!({
            "question": "Who sets the strike?",
            "choices": ["The contract", "The weather"],
            "correct_choice": 0,
            "xp_reward": 0,
            "difficulty": "easy"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let answer_uri = format!("/api/quizzes/{}/answer", body["data"]["id"].as_u64().unwrap());

    for _ in 0..2 {
        let (status, body) = call(
            &app,
            Method::POST,
            &answer_uri,
            Some(&bob),
            Some(json!({"selected_choice": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["xp_earned"], 0);
    }

    let (_, body) = call(&app, Method::GET, "/api/friends/activities", Some(&alice), None).await;
    let completed = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|a| a["kind"] == "quiz_completed")
        .count();
    assert_eq!(completed, 1);
}
