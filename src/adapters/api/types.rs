//! API Request/Response Types
//!
//! Strongly-typed serde DTOs for the engine's HTTP boundary. Every
//! request struct rejects unknown fields, and all money values travel
//! as decimal strings (U256 precision survives JSON). Field coercion
//! happens here, before any domain logic runs; a failure is
//! `InvalidParameters`.

use alloy::primitives::{Address, B256, U256};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::EngineError;
use crate::domain::order::{Order, SettlementEvent, Side};
use crate::domain::plan::{DepthLevel, ExecutionPlan};
use crate::usecases::fill::ReconcileReport;

// ────────────────────────────────────────────
// Boundary parsing helpers
// ────────────────────────────────────────────

/// Parse a 0x-prefixed EVM address.
pub fn parse_address(s: &str) -> Result<Address, EngineError> {
    s.parse()
        .map_err(|_| EngineError::InvalidParameters(format!("invalid address: {s}")))
}

/// Parse a decimal-string U256.
pub fn parse_u256(s: &str) -> Result<U256, EngineError> {
    U256::from_str_radix(s, 10)
        .map_err(|_| EngineError::InvalidParameters(format!("invalid amount: {s}")))
}

/// Parse a 0x-prefixed 32-byte hash.
pub fn parse_b256(s: &str) -> Result<B256, EngineError> {
    s.parse()
        .map_err(|_| EngineError::InvalidParameters(format!("invalid hash: {s}")))
}

/// Parse a 0x-prefixed hex signature blob.
pub fn parse_signature(s: &str) -> Result<Vec<u8>, EngineError> {
    alloy::hex::decode(s.trim_start_matches("0x"))
        .map_err(|_| EngineError::InvalidParameters("invalid signature hex".into()))
}

/// Parse a "buy"/"sell" side string.
pub fn parse_side(s: &str) -> Result<Side, EngineError> {
    s.parse().map_err(EngineError::InvalidParameters)
}

/// Parse an optional unix-seconds expiry; absent or 0 = GTC.
pub fn parse_expiry(secs: Option<i64>) -> Result<Option<DateTime<Utc>>, EngineError> {
    match secs {
        None | Some(0) => Ok(None),
        Some(s) => Utc
            .timestamp_opt(s, 0)
            .single()
            .map(Some)
            .ok_or_else(|| EngineError::InvalidParameters(format!("invalid expiry: {s}"))),
    }
}

// ────────────────────────────────────────────
// Requests
// ────────────────────────────────────────────

/// Query parameters for GET /depth.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DepthQuery {
    pub chain_id: u64,
    pub verifying_contract: String,
    pub market_key: Option<String>,
    pub outcome_index: u32,
    /// "buy" or "sell" — the side being aggregated.
    pub side: String,
    /// Price levels to return; capped by config.
    pub levels: Option<usize>,
}

/// Body of POST /plan.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanRequest {
    pub chain_id: u64,
    pub verifying_contract: String,
    pub market_key: Option<String>,
    pub outcome_index: u32,
    /// The taker's side; the opposite book side is walked.
    pub side: String,
    /// Target quantity, decimal string.
    pub target_amount: String,
}

/// Body of POST /orders.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitOrderRequest {
    pub chain_id: u64,
    pub verifying_contract: String,
    pub market_key: Option<String>,
    pub maker: String,
    /// Maker-chosen nonce, decimal string.
    pub salt: String,
    pub outcome_index: u32,
    pub side: String,
    /// Fixed-point price, decimal string.
    pub price: String,
    /// Order size, decimal string.
    pub amount: String,
    /// Unix seconds; absent or 0 = good-til-cancelled.
    pub expiry: Option<i64>,
    /// EIP-712 signature over the order terms, 0x hex.
    pub signature: String,
}

/// Query parameters for GET /orders.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrdersQuery {
    pub chain_id: u64,
    pub verifying_contract: String,
    pub maker: String,
}

/// Body of POST /fills.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FillRequest {
    pub chain_id: u64,
    pub verifying_contract: String,
    /// Accepted for interface symmetry; the identity tuple alone
    /// resolves the order.
    pub market_key: Option<String>,
    pub maker: String,
    pub salt: String,
    /// Quantity to apply, decimal string.
    pub fill_amount: String,
}

/// Body of POST /cancel.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CancelRequest {
    pub chain_id: u64,
    pub verifying_contract: String,
    pub maker: String,
    pub salt: String,
    /// EIP-712 signature over (maker, salt), 0x hex.
    pub signature: String,
}

/// One decoded settlement event in a POST /reconcile batch.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettlementEventDto {
    pub maker: String,
    pub salt: String,
    pub amount: String,
    pub taker: Option<String>,
    pub tx_hash: String,
    pub log_index: u64,
    pub block_number: u64,
    /// Unix seconds of the containing block.
    pub block_timestamp: i64,
}

impl SettlementEventDto {
    pub fn into_domain(self) -> Result<SettlementEvent, EngineError> {
        let block_timestamp = Utc
            .timestamp_opt(self.block_timestamp, 0)
            .single()
            .ok_or_else(|| {
                EngineError::InvalidParameters(format!(
                    "invalid block timestamp: {}",
                    self.block_timestamp
                ))
            })?;
        Ok(SettlementEvent {
            maker: parse_address(&self.maker)?,
            salt: parse_u256(&self.salt)?,
            amount: parse_u256(&self.amount)?,
            taker: self.taker.as_deref().map(parse_address).transpose()?,
            tx_hash: parse_b256(&self.tx_hash)?,
            log_index: self.log_index,
            block_number: self.block_number,
            block_timestamp,
        })
    }
}

/// Body of POST /reconcile.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconcileRequest {
    pub chain_id: u64,
    pub verifying_contract: String,
    pub events: Vec<SettlementEventDto>,
}

// ────────────────────────────────────────────
// Responses
// ────────────────────────────────────────────

/// One aggregated price level.
#[derive(Debug, Clone, Serialize)]
pub struct DepthLevelDto {
    pub price: String,
    pub quantity: String,
}

/// Response of GET /depth.
#[derive(Debug, Clone, Serialize)]
pub struct DepthResponse {
    pub levels: Vec<DepthLevelDto>,
}

impl DepthResponse {
    pub fn from_domain(levels: Vec<DepthLevel>) -> Self {
        Self {
            levels: levels
                .into_iter()
                .map(|l| DepthLevelDto {
                    price: l.price.to_string(),
                    quantity: l.quantity.to_string(),
                })
                .collect(),
        }
    }
}

/// One proposed fill inside a plan response.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedFillDto {
    pub maker: String,
    pub salt: String,
    pub fill_amount: String,
    pub price: String,
    pub order_amount: String,
    /// Unix seconds; 0 = good-til-cancelled.
    pub order_expiry: i64,
    pub signature: String,
}

/// Response of POST /plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlanResponse {
    pub side: String,
    pub outcome_index: u32,
    pub fills: Vec<PlannedFillDto>,
    pub filled_amount: String,
    pub total_cost: String,
    pub avg_price: Option<String>,
    pub best_price: Option<String>,
    pub worst_price: Option<String>,
    pub slippage_bps: u64,
    pub has_more_depth: bool,
}

impl PlanResponse {
    pub fn from_domain(plan: ExecutionPlan) -> Self {
        Self {
            side: plan.taker_side.to_string(),
            outcome_index: plan.outcome_index,
            fills: plan
                .fills
                .into_iter()
                .map(|f| PlannedFillDto {
                    maker: f.identity.maker.to_string(),
                    salt: f.identity.salt.to_string(),
                    fill_amount: f.fill_amount.to_string(),
                    price: f.price.to_string(),
                    order_amount: f.order_amount.to_string(),
                    order_expiry: f.order_expiry.map_or(0, |e| e.timestamp()),
                    signature: f.signature.to_string(),
                })
                .collect(),
            filled_amount: plan.filled_amount.to_string(),
            total_cost: plan.total_cost.to_string(),
            avg_price: plan.avg_price.map(|p| p.to_string()),
            best_price: plan.best_price.map(|p| p.to_string()),
            worst_price: plan.worst_price.map(|p| p.to_string()),
            slippage_bps: plan.slippage_bps,
            has_more_depth: plan.has_more_depth,
        }
    }
}

/// A resting order in API form.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDto {
    pub maker: String,
    pub salt: String,
    pub market_key: Option<String>,
    pub outcome_index: u32,
    pub side: String,
    pub price: String,
    pub amount: String,
    pub remaining: String,
    pub status: String,
    pub sequence: u64,
    /// Unix seconds; 0 = good-til-cancelled.
    pub expiry: i64,
    pub created_at: DateTime<Utc>,
}

impl OrderDto {
    pub fn from_domain(order: &Order) -> Self {
        Self {
            maker: order.identity.maker.to_string(),
            salt: order.identity.salt.to_string(),
            market_key: order.market_key.clone(),
            outcome_index: order.outcome_index,
            side: order.side.to_string(),
            price: order.price.to_string(),
            amount: order.amount.to_string(),
            remaining: order.remaining.to_string(),
            status: order.status.to_string(),
            sequence: order.sequence,
            expiry: order.expiry.map_or(0, |e| e.timestamp()),
            created_at: order.created_at,
        }
    }
}

/// Response of GET /orders.
#[derive(Debug, Clone, Serialize)]
pub struct OrdersResponse {
    pub orders: Vec<OrderDto>,
}

/// Response of POST /orders.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOrderResponse {
    pub status: String,
    pub sequence: u64,
    pub created_at: DateTime<Utc>,
}

/// Response of POST /fills.
#[derive(Debug, Clone, Serialize)]
pub struct FillResponse {
    pub remaining: String,
    pub status: String,
}

/// Response of POST /reconcile.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileResponse {
    pub orders_updated: usize,
    pub trades_recorded: usize,
    pub skipped: usize,
    pub warnings: Vec<String>,
}

impl ReconcileResponse {
    pub fn from_domain(report: ReconcileReport) -> Self {
        Self {
            orders_updated: report.orders_updated,
            trades_recorded: report.trades_recorded,
            skipped: report.skipped,
            warnings: report.warnings,
        }
    }
}

/// Error body returned for every failed request.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
