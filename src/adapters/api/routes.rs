//! API Router and Handlers
//!
//! Axum handlers for the engine's logical operations, plus liveness,
//! readiness, and Prometheus exposition. Handlers coerce and validate
//! the typed DTOs, enforce that requests target the configured
//! (chain, verifying contract) domain, delegate to the use cases, and
//! map `EngineError` variants to HTTP statuses.

use std::sync::Arc;

use alloy::primitives::Address;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::warn;

use crate::adapters::chain::OrderTerms;
use crate::adapters::metrics::{HealthState, MetricsRegistry};
use crate::domain::error::EngineError;
use crate::domain::order::{BookScope, OrderIdentity};
use crate::ports::order_store::OrderStore;
use crate::usecases::{
    CancelService, DepthAggregator, ExecutionPlanner, FillApplier, OrderIntake,
    OrderSubmission,
};

use super::types::{
    CancelRequest, DepthQuery, DepthResponse, ErrorResponse, FillRequest,
    FillResponse, OrderDto, OrdersQuery, OrdersResponse, PlanRequest,
    PlanResponse, ReconcileRequest, ReconcileResponse, SettlementEventDto,
    SubmitOrderRequest, SubmitOrderResponse, parse_address, parse_expiry,
    parse_side, parse_signature, parse_u256,
};

/// The single (chain, contract) domain this engine instance serves.
#[derive(Debug, Clone)]
pub struct EngineDomain {
    pub chain_id: u64,
    pub verifying_contract: Address,
    /// Hard cap on depth levels per request.
    pub max_depth_levels: usize,
    /// Hard cap on events per reconcile batch.
    pub max_reconcile_batch: usize,
}

/// Shared handler state: use cases, metrics, health, and domain config.
pub struct AppState<S: OrderStore + ?Sized> {
    pub store: Arc<S>,
    pub depth: DepthAggregator<S>,
    pub planner: ExecutionPlanner<S>,
    pub fills: FillApplier<S>,
    pub cancels: CancelService<S>,
    pub intake: OrderIntake<S>,
    pub metrics: Arc<MetricsRegistry>,
    pub health: Arc<HealthState>,
    pub domain: EngineDomain,
}

impl<S: OrderStore + ?Sized> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            depth: self.depth.clone(),
            planner: self.planner.clone(),
            fills: self.fills.clone(),
            cancels: self.cancels.clone(),
            intake: self.intake.clone(),
            metrics: Arc::clone(&self.metrics),
            health: Arc::clone(&self.health),
            domain: self.domain.clone(),
        }
    }
}

/// `EngineError` carrier implementing the HTTP status mapping.
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::InvalidParameters(_)
            | EngineError::InvalidPrice(_)
            | EngineError::Overflow(_) => StatusCode::BAD_REQUEST,
            EngineError::InvalidSignature => StatusCode::UNAUTHORIZED,
            EngineError::Unauthorized { .. } => StatusCode::FORBIDDEN,
            EngineError::OrderNotFound => StatusCode::NOT_FOUND,
            EngineError::OrderClosed
            | EngineError::DuplicateOrder
            | EngineError::DuplicateTrade { .. }
            | EngineError::ConcurrentUpdateConflict => StatusCode::CONFLICT,
            EngineError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        if status.is_server_error() {
            warn!(error = %self.0, "Request failed");
        }
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

/// Build the full engine router.
pub fn router<S: OrderStore + ?Sized>(state: AppState<S>) -> Router {
    Router::new()
        .route("/depth", get(get_depth::<S>))
        .route("/plan", post(post_plan::<S>))
        .route("/orders", post(post_order::<S>).get(get_orders::<S>))
        .route("/fills", post(post_fill::<S>))
        .route("/cancel", post(post_cancel::<S>))
        .route("/reconcile", post(post_reconcile::<S>))
        .route("/live", get(liveness))
        .route("/ready", get(readiness::<S>))
        .route("/metrics", get(metrics::<S>))
        .with_state(state)
}

/// Require the request to target the configured chain and contract,
/// returning the parsed contract address.
fn check_domain<S: OrderStore + ?Sized>(
    state: &AppState<S>,
    chain_id: u64,
    verifying_contract: &str,
) -> Result<Address, EngineError> {
    let contract = parse_address(verifying_contract)?;
    if chain_id != state.domain.chain_id || contract != state.domain.verifying_contract {
        return Err(EngineError::InvalidParameters(format!(
            "engine serves chain {} contract {}, not chain {chain_id} contract {contract}",
            state.domain.chain_id, state.domain.verifying_contract
        )));
    }
    Ok(contract)
}

async fn get_depth<S: OrderStore + ?Sized>(
    State(state): State<AppState<S>>,
    Query(query): Query<DepthQuery>,
) -> Result<Json<DepthResponse>, ApiError> {
    let contract = check_domain(&state, query.chain_id, &query.verifying_contract)?;
    let side = parse_side(&query.side)?;
    let levels = query
        .levels
        .unwrap_or(state.domain.max_depth_levels)
        .min(state.domain.max_depth_levels);

    let scope = BookScope {
        chain_id: query.chain_id,
        verifying_contract: contract,
        market_key: query.market_key,
    };
    let depth = state
        .depth
        .depth(&scope, query.outcome_index, side.is_buy(), levels)
        .await?;
    Ok(Json(DepthResponse::from_domain(depth)))
}

async fn post_plan<S: OrderStore + ?Sized>(
    State(state): State<AppState<S>>,
    Json(req): Json<PlanRequest>,
) -> Result<Json<PlanResponse>, ApiError> {
    let contract = check_domain(&state, req.chain_id, &req.verifying_contract)?;
    let side = parse_side(&req.side)?;
    let target_amount = parse_u256(&req.target_amount)?;

    let scope = BookScope {
        chain_id: req.chain_id,
        verifying_contract: contract,
        market_key: req.market_key,
    };
    let plan = state
        .planner
        .plan(&scope, req.outcome_index, side, target_amount)
        .await?;

    let side_label = side.to_string();
    state
        .metrics
        .plans_computed
        .with_label_values(&[side_label.as_str()])
        .inc();
    Ok(Json(PlanResponse::from_domain(plan)))
}

async fn post_order<S: OrderStore + ?Sized>(
    State(state): State<AppState<S>>,
    Json(req): Json<SubmitOrderRequest>,
) -> Result<(StatusCode, Json<SubmitOrderResponse>), ApiError> {
    check_domain(&state, req.chain_id, &req.verifying_contract)?;
    let side = parse_side(&req.side)?;

    let submission = OrderSubmission {
        terms: OrderTerms {
            maker: parse_address(&req.maker)?,
            salt: parse_u256(&req.salt)?,
            outcome_index: req.outcome_index,
            is_buy: side.is_buy(),
            price: parse_u256(&req.price)?,
            amount: parse_u256(&req.amount)?,
            expiry: parse_expiry(req.expiry)?,
        },
        market_key: req.market_key,
        signature: parse_signature(&req.signature)?,
    };

    let order = state.intake.submit(submission).await?;
    state.metrics.orders_submitted.inc();

    Ok((
        StatusCode::CREATED,
        Json(SubmitOrderResponse {
            status: order.status.to_string(),
            sequence: order.sequence,
            created_at: order.created_at,
        }),
    ))
}

async fn get_orders<S: OrderStore + ?Sized>(
    State(state): State<AppState<S>>,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<OrdersResponse>, ApiError> {
    check_domain(&state, query.chain_id, &query.verifying_contract)?;
    let maker = parse_address(&query.maker)?;

    let orders = state
        .store
        .open_orders_for_maker(query.chain_id, state.domain.verifying_contract, maker)
        .await?;
    Ok(Json(OrdersResponse {
        orders: orders.iter().map(OrderDto::from_domain).collect(),
    }))
}

async fn post_fill<S: OrderStore + ?Sized>(
    State(state): State<AppState<S>>,
    Json(req): Json<FillRequest>,
) -> Result<Json<FillResponse>, ApiError> {
    let contract = check_domain(&state, req.chain_id, &req.verifying_contract)?;
    let id = OrderIdentity {
        chain_id: req.chain_id,
        verifying_contract: contract,
        maker: parse_address(&req.maker)?,
        salt: parse_u256(&req.salt)?,
    };
    let fill_amount = parse_u256(&req.fill_amount)?;

    let outcome = state.fills.apply_direct(&id, fill_amount).await.map_err(|e| {
        if e.is_retryable() {
            state.metrics.fill_conflicts.inc();
        }
        ApiError(e)
    })?;

    state
        .metrics
        .fills_applied
        .with_label_values(&["direct"])
        .inc();
    state
        .metrics
        .trades_recorded
        .with_label_values(&["off_chain"])
        .inc();

    Ok(Json(FillResponse {
        remaining: outcome.remaining.to_string(),
        status: outcome.status.to_string(),
    }))
}

async fn post_cancel<S: OrderStore + ?Sized>(
    State(state): State<AppState<S>>,
    Json(req): Json<CancelRequest>,
) -> Result<StatusCode, ApiError> {
    let contract = check_domain(&state, req.chain_id, &req.verifying_contract)?;
    let id = OrderIdentity {
        chain_id: req.chain_id,
        verifying_contract: contract,
        maker: parse_address(&req.maker)?,
        salt: parse_u256(&req.salt)?,
    };
    let signature = parse_signature(&req.signature)?;

    state.cancels.cancel(&id, &signature).await?;
    state.metrics.orders_cancelled.inc();
    Ok(StatusCode::NO_CONTENT)
}

async fn post_reconcile<S: OrderStore + ?Sized>(
    State(state): State<AppState<S>>,
    Json(req): Json<ReconcileRequest>,
) -> Result<Json<ReconcileResponse>, ApiError> {
    let contract = check_domain(&state, req.chain_id, &req.verifying_contract)?;
    if req.events.len() > state.domain.max_reconcile_batch {
        return Err(ApiError(EngineError::InvalidParameters(format!(
            "batch of {} events exceeds cap {}",
            req.events.len(),
            state.domain.max_reconcile_batch
        ))));
    }

    let events = req
        .events
        .into_iter()
        .map(SettlementEventDto::into_domain)
        .collect::<Result<Vec<_>, _>>()?;

    let report = state.fills.reconcile(req.chain_id, contract, &events).await?;

    let m = &state.metrics;
    m.fills_applied
        .with_label_values(&["reconcile"])
        .inc_by(report.orders_updated as u64);
    m.trades_recorded
        .with_label_values(&["on_chain"])
        .inc_by(report.trades_recorded as u64);
    m.reconcile_events
        .with_label_values(&["updated"])
        .inc_by(report.orders_updated as u64);
    m.reconcile_events
        .with_label_values(&["recorded"])
        .inc_by(report.trades_recorded as u64);
    m.reconcile_events
        .with_label_values(&["skipped"])
        .inc_by(report.skipped as u64);

    Ok(Json(ReconcileResponse::from_domain(report)))
}

/// Liveness probe: 200 whenever the process responds.
async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness probe: 200 only while the store is healthy and the
/// engine is not draining.
async fn readiness<S: OrderStore + ?Sized>(
    State(state): State<AppState<S>>,
) -> impl IntoResponse {
    if state.health.is_ready() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

/// Prometheus text exposition.
async fn metrics<S: OrderStore + ?Sized>(
    State(state): State<AppState<S>>,
) -> Result<String, ApiError> {
    state
        .metrics
        .render()
        .map_err(|e| ApiError(EngineError::StorageUnavailable(e.to_string())))
}
