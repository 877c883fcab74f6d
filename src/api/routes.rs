//! API Routes
//!
//! HTTP endpoint definitions.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthService, AuthSettings};
use crate::domain::{AuthenticatedUser, Catalog, OperationContext, UserInfo};
use crate::error::{AppError, AppResult};
use crate::handlers::{PurchaseCommand, PurchaseHandler, TransferCommand, TransferHandler};
use crate::query::QueryService;
use crate::store::{Ledger, UserDirectory};

use super::middleware::{auth_middleware, logging_middleware};

// =========================================================================
// Application state
// =========================================================================

/// Services shared by every request
#[derive(Debug, Clone)]
pub struct AppState<L> {
    pub auth: AuthService<L>,
    pub transfers: TransferHandler<L>,
    pub purchases: PurchaseHandler<L>,
    pub queries: QueryService<L>,
}

impl<L> AppState<L>
where
    L: Ledger + UserDirectory,
{
    pub fn new(ledger: L, catalog: Arc<Catalog>, auth_settings: AuthSettings) -> Self {
        Self {
            auth: AuthService::new(ledger.clone(), auth_settings),
            transfers: TransferHandler::new(ledger.clone()),
            purchases: PurchaseHandler::new(ledger.clone(), catalog),
            queries: QueryService::new(ledger),
        }
    }
}

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCoinRequest {
    pub to_user: String,
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct InventoryItemResponse {
    #[serde(rename = "type")]
    pub item_type: String,
    pub quantity: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedResponse {
    pub from_user: String,
    pub amount: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentResponse {
    pub to_user: String,
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct CoinHistoryResponse {
    pub received: Vec<ReceivedResponse>,
    pub sent: Vec<SentResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub coins: i64,
    pub inventory: Vec<InventoryItemResponse>,
    pub coin_history: CoinHistoryResponse,
}

impl From<UserInfo> for InfoResponse {
    fn from(info: UserInfo) -> Self {
        Self {
            coins: info.coins,
            inventory: info
                .inventory
                .into_iter()
                .map(|entry| InventoryItemResponse {
                    item_type: entry.item_type,
                    quantity: entry.quantity,
                })
                .collect(),
            coin_history: CoinHistoryResponse {
                received: info
                    .coin_history
                    .received
                    .into_iter()
                    .map(|r| ReceivedResponse {
                        from_user: r.from_user,
                        amount: r.amount,
                    })
                    .collect(),
                sent: info
                    .coin_history
                    .sent
                    .into_iter()
                    .map(|s| SentResponse {
                        to_user: s.to_user,
                        amount: s.amount,
                    })
                    .collect(),
            },
        }
    }
}

// =========================================================================
// API Router
// =========================================================================

/// Create the `/api` router
pub fn create_router<L>(state: AppState<L>) -> Router<AppState<L>>
where
    L: Ledger + UserDirectory,
{
    let protected = Router::new()
        .route("/info", get(get_info::<L>))
        .route("/sendCoin", post(send_coin::<L>))
        .route("/buy/:item", get(buy_item::<L>))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware::<L>));

    Router::new()
        .route("/users", post(register::<L>))
        .route("/auth", post(authenticate::<L>))
        .merge(protected)
}

/// Build the full application: health check, `/api` and request logging
pub fn build_router<L>(state: AppState<L>) -> Router
where
    L: Ledger + UserDirectory,
{
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", create_router(state.clone()))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

// =========================================================================
// Authentication
// =========================================================================

async fn register<L>(
    State(state): State<AppState<L>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)>
where
    L: Ledger + UserDirectory,
{
    let Json(req) = payload?;
    let user_id = state.auth.register(&req.username, &req.password).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: user_id.value(),
            username: req.username,
        }),
    ))
}

async fn authenticate<L>(
    State(state): State<AppState<L>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> AppResult<Json<AuthResponse>>
where
    L: Ledger + UserDirectory,
{
    let Json(req) = payload?;
    let issued = state.auth.authenticate(&req.username, &req.password).await?;

    Ok(Json(AuthResponse {
        token: issued.token,
    }))
}

// =========================================================================
// Ledger operations
// =========================================================================

async fn get_info<L>(
    State(state): State<AppState<L>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<InfoResponse>>
where
    L: Ledger + UserDirectory,
{
    let info = state.queries.get_user_info(user.id).await?;
    Ok(Json(info.into()))
}

async fn send_coin<L>(
    State(state): State<AppState<L>>,
    Extension(user): Extension<AuthenticatedUser>,
    Extension(context): Extension<OperationContext>,
    payload: Result<Json<SendCoinRequest>, JsonRejection>,
) -> AppResult<StatusCode>
where
    L: Ledger + UserDirectory,
{
    let Json(req) = payload?;
    if req.to_user.is_empty() {
        return Err(AppError::InvalidRequest("toUser must not be empty".to_string()));
    }

    let command = TransferCommand::new(user.id, req.to_user, req.amount);
    state.transfers.execute(command, &context).await?;

    Ok(StatusCode::OK)
}

async fn buy_item<L>(
    State(state): State<AppState<L>>,
    Extension(user): Extension<AuthenticatedUser>,
    Extension(context): Extension<OperationContext>,
    Path(item): Path<String>,
) -> AppResult<StatusCode>
where
    L: Ledger + UserDirectory,
{
    let command = PurchaseCommand::new(user.id, item);
    state.purchases.execute(command, &context).await?;

    Ok(StatusCode::OK)
}
