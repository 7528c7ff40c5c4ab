// tests/common/mod.rs
//! In-process stand-in for the dashboard backend, served with warp.
#![allow(dead_code)]

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stock_dashboard::{ApiClient, CredentialStore};
use tokio::sync::oneshot;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

const SECRET: &[u8] = b"test_secret_key";

#[derive(Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
}

pub fn create_token(user_id: &str) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: 10000000000,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET),
    )
    .expect("token encodes")
}

fn bearer_subject(header: Option<String>) -> Option<String> {
    let token = header?.strip_prefix("Bearer ")?.to_string();
    decode::<Claims>(
        &token,
        &DecodingKey::from_secret(SECRET),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims.sub)
}

#[derive(Default)]
pub struct BackendState {
    pub prices: Mutex<HashMap<String, Value>>,
    pub price_delays: Mutex<HashMap<String, Duration>>,
    pub sectors: Mutex<Value>,
    pub holdings: Mutex<Vec<Value>>,
    pub requests: Mutex<Vec<String>>,
    pub last_query: Mutex<HashMap<String, String>>,
}

pub struct MockBackend {
    pub base_url: String,
    pub state: Arc<BackendState>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(BackendState::default());
        *state.sectors.lock().unwrap() = json!([]);

        let recorder = state.clone();
        let routes = routes(state.clone()).with(warp::log::custom(move |info: warp::log::Info<'_>| {
            recorder
                .requests
                .lock()
                .unwrap()
                .push(format!("{} {}", info.method(), info.path()));
        }));

        let (tx, rx) = oneshot::channel::<()>();
        let (addr, server): (SocketAddr, _) = warp::serve(routes)
            .bind_with_graceful_shutdown(([127, 0, 0, 1], 0), async move {
                rx.await.ok();
            });
        tokio::spawn(server);

        MockBackend {
            base_url: format!("http://{}/api", addr),
            state,
            shutdown: Some(tx),
        }
    }

    pub fn client(&self, credentials: Arc<dyn CredentialStore>) -> ApiClient {
        ApiClient::with_client(reqwest::Client::new(), &self.base_url, credentials)
    }

    pub fn set_price(&self, symbol: &str, body: Value) {
        self.state
            .prices
            .lock()
            .unwrap()
            .insert(symbol.to_string(), body);
    }

    pub fn delay_price(&self, symbol: &str, delay: Duration) {
        self.state
            .price_delays
            .lock()
            .unwrap()
            .insert(symbol.to_string(), delay);
    }

    pub fn set_sectors(&self, body: Value) {
        *self.state.sectors.lock().unwrap() = body;
    }

    pub fn hold(&self, symbol: &str, quantity: f64, average_buy_price: f64) {
        self.state.holdings.lock().unwrap().push(json!({
            "symbol": symbol,
            "quantity": quantity,
            "averageBuyPrice": average_buy_price,
        }));
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<String> {
        self.state.requests.lock().unwrap().clone()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

fn with_state(
    state: Arc<BackendState>,
) -> impl Filter<Extract = (Arc<BackendState>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn reply(body: Value, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

fn unauthorized() -> Response {
    reply(json!({"error": "Invalid token"}), StatusCode::UNAUTHORIZED)
}

fn routes(
    state: Arc<BackendState>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let auth = warp::header::optional::<String>("authorization");

    let sectors = warp::path!("api" / "stocks" / "market" / "sectors")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(sectors_handler);

    let price = warp::path!("api" / "stocks" / "price" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(price_handler);

    let prices = warp::path!("api" / "stocks" / "prices")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(prices_handler);

    let search = warp::path!("api" / "stocks" / "search")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_state(state.clone()))
        .and_then(search_handler);

    let profile = warp::path!("api" / "stocks" / "profile" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(profile_handler);

    let historical = warp::path!("api" / "stocks" / "historical" / String)
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_state(state.clone()))
        .and_then(historical_handler);

    let portfolio = warp::path!("api" / "portfolio")
        .and(warp::get())
        .and(auth.clone())
        .and(with_state(state.clone()))
        .and_then(portfolio_handler);

    let performance = warp::path!("api" / "portfolio" / "performance")
        .and(warp::get())
        .and(auth.clone())
        .and(with_state(state.clone()))
        .and_then(performance_handler);

    let add = warp::path!("api" / "portfolio" / "add")
        .and(warp::post())
        .and(auth.clone())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(add_handler);

    let update = warp::path!("api" / "portfolio" / "update" / String)
        .and(warp::put())
        .and(auth.clone())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(update_handler);

    let remove = warp::path!("api" / "portfolio" / "remove" / String)
        .and(warp::delete())
        .and(auth.clone())
        .and(with_state(state.clone()))
        .and_then(remove_handler);

    let register = warp::path!("api" / "auth" / "register")
        .and(warp::post())
        .and(warp::body::json())
        .and_then(register_handler);

    let validate = warp::path!("api" / "auth" / "validate")
        .and(warp::get())
        .and(auth.clone())
        .and_then(validate_handler);

    sectors
        .or(price)
        .or(prices)
        .or(search)
        .or(profile)
        .or(historical)
        .or(portfolio)
        .or(performance)
        .or(add)
        .or(update)
        .or(remove)
        .or(register)
        .or(validate)
}

async fn sectors_handler(state: Arc<BackendState>) -> Result<Response, Rejection> {
    let body = state.sectors.lock().unwrap().clone();
    Ok(reply(body, StatusCode::OK))
}

async fn price_handler(symbol: String, state: Arc<BackendState>) -> Result<Response, Rejection> {
    let delay = state.price_delays.lock().unwrap().get(&symbol).copied();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    let price = state.prices.lock().unwrap().get(&symbol).cloned();
    Ok(match price {
        Some(body) => reply(body, StatusCode::OK),
        None => reply(
            json!({"error": "Failed to fetch price"}),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    })
}

async fn prices_handler(body: Value, state: Arc<BackendState>) -> Result<Response, Rejection> {
    let prices = state.prices.lock().unwrap();
    let found: Vec<Value> = body["symbols"]
        .as_array()
        .map(|symbols| {
            symbols
                .iter()
                .filter_map(|s| s.as_str())
                .filter_map(|s| prices.get(s).cloned())
                .collect()
        })
        .unwrap_or_default();
    Ok(reply(Value::Array(found), StatusCode::OK))
}

async fn search_handler(
    query: HashMap<String, String>,
    state: Arc<BackendState>,
) -> Result<Response, Rejection> {
    let needle = query.get("query").cloned().unwrap_or_default().to_uppercase();
    let mut matches: Vec<String> = state
        .prices
        .lock()
        .unwrap()
        .keys()
        .filter(|symbol| symbol.contains(&needle))
        .cloned()
        .collect();
    matches.sort();
    let body: Vec<Value> = matches
        .into_iter()
        .map(|symbol| json!({"symbol": symbol, "exchange": "NASDAQ", "type": "EQUITY"}))
        .collect();
    Ok(reply(Value::Array(body), StatusCode::OK))
}

async fn profile_handler(symbol: String, state: Arc<BackendState>) -> Result<Response, Rejection> {
    if !state.prices.lock().unwrap().contains_key(&symbol) {
        return Ok(reply(json!({"error": "Not found"}), StatusCode::NOT_FOUND));
    }
    Ok(reply(
        json!({"symbol": symbol, "name": format!("{} Inc.", symbol), "sector": "Technology", "marketCap": 1.0e12}),
        StatusCode::OK,
    ))
}

async fn historical_handler(
    _symbol: String,
    query: HashMap<String, String>,
    state: Arc<BackendState>,
) -> Result<Response, Rejection> {
    *state.last_query.lock().unwrap() = query;
    Ok(reply(
        json!([
            {"date": "2024-01-02", "open": 10.0, "high": 12.0, "low": 9.5, "close": 11.0, "volume": 1000},
            {"date": "2024-01-03", "open": 11.0, "high": 11.5, "low": 10.0, "close": 10.5, "volume": 800}
        ]),
        StatusCode::OK,
    ))
}

fn portfolio_json(state: &BackendState) -> Value {
    let prices = state.prices.lock().unwrap();
    let holdings = state.holdings.lock().unwrap();

    let mut total_current = 0.0;
    let mut total_invested = 0.0;
    let rows: Vec<Value> = holdings
        .iter()
        .map(|h| {
            let symbol = h["symbol"].as_str().unwrap_or_default();
            let quantity = h["quantity"].as_f64().unwrap_or_default();
            let average = h["averageBuyPrice"].as_f64().unwrap_or_default();
            let current = prices
                .get(symbol)
                .and_then(|p| p["currentPrice"].as_f64())
                .unwrap_or(average);
            let invested = quantity * average;
            let value = quantity * current;
            total_current += value;
            total_invested += invested;
            json!({
                "symbol": symbol,
                "quantity": quantity,
                "averageBuyPrice": average,
                "currentPrice": current,
                "currentValue": value,
                "investedValue": invested,
                "profitLoss": value - invested,
                "profitLossPercentage": if invested > 0.0 { (value - invested) / invested * 100.0 } else { 0.0 },
            })
        })
        .collect();

    let profit = total_current - total_invested;
    json!({
        "holdings": rows,
        "summary": {
            "totalCurrentValue": total_current,
            "totalInvestedValue": total_invested,
            "totalProfitLoss": profit,
            "totalProfitLossPercentage": if total_invested > 0.0 { profit / total_invested * 100.0 } else { 0.0 },
        }
    })
}

async fn portfolio_handler(
    auth: Option<String>,
    state: Arc<BackendState>,
) -> Result<Response, Rejection> {
    if bearer_subject(auth).is_none() {
        return Ok(unauthorized());
    }
    Ok(reply(portfolio_json(&state), StatusCode::OK))
}

async fn performance_handler(
    auth: Option<String>,
    state: Arc<BackendState>,
) -> Result<Response, Rejection> {
    if bearer_subject(auth).is_none() {
        return Ok(unauthorized());
    }
    let portfolio = portfolio_json(&state);
    let summary = &portfolio["summary"];
    Ok(reply(
        json!({
            "performance": portfolio["holdings"],
            "overall": {
                "totalReturn": summary["totalProfitLoss"],
                "totalReturnPercentage": summary["totalProfitLossPercentage"],
            }
        }),
        StatusCode::OK,
    ))
}

async fn add_handler(
    auth: Option<String>,
    body: Value,
    state: Arc<BackendState>,
) -> Result<Response, Rejection> {
    if bearer_subject(auth).is_none() {
        return Ok(unauthorized());
    }
    match body["symbol"].as_str() {
        Some("BAD") => {
            return Ok(reply(
                json!({"error": "Invalid symbol"}),
                StatusCode::BAD_REQUEST,
            ))
        }
        Some("NOMSG") => {
            return Ok(warp::reply::with_status("", StatusCode::BAD_REQUEST).into_response())
        }
        _ => {}
    }
    state.holdings.lock().unwrap().push(json!({
        "symbol": body["symbol"],
        "quantity": body["quantity"],
        "averageBuyPrice": body["buyPrice"],
    }));
    Ok(reply(portfolio_json(&state), StatusCode::CREATED))
}

async fn update_handler(
    symbol: String,
    auth: Option<String>,
    body: Value,
    state: Arc<BackendState>,
) -> Result<Response, Rejection> {
    if bearer_subject(auth).is_none() {
        return Ok(unauthorized());
    }
    {
        let mut holdings = state.holdings.lock().unwrap();
        let Some(holding) = holdings.iter_mut().find(|h| h["symbol"] == symbol.as_str()) else {
            return Ok(reply(
                json!({"error": "Stock not found in portfolio"}),
                StatusCode::NOT_FOUND,
            ));
        };
        if let Some(quantity) = body.get("quantity") {
            holding["quantity"] = quantity.clone();
        }
        if let Some(price) = body.get("buyPrice") {
            holding["averageBuyPrice"] = price.clone();
        }
    }
    Ok(reply(portfolio_json(&state), StatusCode::OK))
}

async fn remove_handler(
    symbol: String,
    auth: Option<String>,
    state: Arc<BackendState>,
) -> Result<Response, Rejection> {
    if bearer_subject(auth).is_none() {
        return Ok(unauthorized());
    }
    {
        let mut holdings = state.holdings.lock().unwrap();
        let before = holdings.len();
        holdings.retain(|h| h["symbol"] != symbol.as_str());
        if holdings.len() == before {
            return Ok(warp::reply::with_status("", StatusCode::NOT_FOUND).into_response());
        }
    }
    Ok(reply(portfolio_json(&state), StatusCode::OK))
}

async fn register_handler(body: Value) -> Result<Response, Rejection> {
    let email = body["email"].as_str().unwrap_or_default();
    if email == "taken@example.com" {
        return Ok(reply(
            json!({"message": "User already exists"}),
            StatusCode::BAD_REQUEST,
        ));
    }
    Ok(reply(
        json!({"token": create_token(email), "message": "User registered successfully"}),
        StatusCode::CREATED,
    ))
}

async fn validate_handler(auth: Option<String>) -> Result<Response, Rejection> {
    match bearer_subject(auth) {
        Some(sub) => Ok(reply(json!({"valid": true, "user": sub}), StatusCode::OK)),
        None => Ok(unauthorized()),
    }
}
