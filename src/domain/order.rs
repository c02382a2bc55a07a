//! Core Order Book Domain Types
//!
//! Defines the business entities of the hybrid exchange: resting
//! orders, their identity tuple, immutable trade records, and the
//! decoded settlement events the reconciliation path consumes.
//! No I/O here (hexagonal architecture inner ring); everything is
//! serializable and testable in isolation.

use alloy::primitives::{Address, B256, Bytes, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ────────────────────────────────────────────
// Sides and lifecycle status
// ────────────────────────────────────────────

/// Order/trade side — buy consumes resting sells and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The book side a taker on this side consumes.
    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    pub fn is_buy(self) -> bool {
        matches!(self, Self::Buy)
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            other => Err(format!("invalid side: {other}")),
        }
    }
}

/// Lifecycle status of a resting order.
///
/// `Filled` and `Canceled` are terminal. `Canceled` is only reachable
/// through a verified cancellation — expiry never mutates status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Resting on the book, untouched.
    Open,
    /// Some quantity consumed, remainder still matchable.
    PartiallyFilled,
    /// Remaining reached zero. Terminal.
    Filled,
    /// Cancelled by a verified maker request. Terminal.
    Canceled,
}

impl OrderStatus {
    /// Whether fills may still be applied.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Open | Self::PartiallyFilled)
    }

    /// Whether the order is in a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Filled | Self::Canceled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::PartiallyFilled => write!(f, "filled_partial"),
            Self::Filled => write!(f, "filled"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

// ────────────────────────────────────────────
// Identity and book scoping
// ────────────────────────────────────────────

/// Natural primary key of an order.
///
/// The salt is a maker-chosen nonce, globally unique per
/// (maker, verifying contract); the tuple is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderIdentity {
    /// EVM chain the settlement contract lives on.
    pub chain_id: u64,
    /// On-chain settlement contract the order is signed against.
    pub verifying_contract: Address,
    /// Maker who signed the order.
    pub maker: Address,
    /// Maker-chosen replay-protection nonce.
    pub salt: U256,
}

impl std::fmt::Display for OrderIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.chain_id, self.verifying_contract, self.maker, self.salt
        )
    }
}

/// Scope of a book query: one settlement contract on one chain,
/// optionally narrowed to a single market instance.
///
/// `market_key` is an optional disambiguating filter for deployments
/// where several markets share a verifying contract; stores that
/// predate the column ignore it (see `OrderStore::supports_market_key`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookScope {
    pub chain_id: u64,
    pub verifying_contract: Address,
    pub market_key: Option<String>,
}

// ────────────────────────────────────────────
// Orders
// ────────────────────────────────────────────

/// A resting limit order: the unit of liquidity on the book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Natural primary key (chain, contract, maker, salt).
    pub identity: OrderIdentity,
    /// Optional market-instance filter key.
    pub market_key: Option<String>,
    /// Which outcome token the order trades.
    pub outcome_index: u32,
    /// Buy or sell.
    pub side: Side,
    /// Limit price, fixed-point scaled, strictly inside (0, scale).
    pub price: U256,
    /// Original order size in outcome shares.
    pub amount: U256,
    /// Unfilled quantity: 0 <= remaining <= amount. Only ever
    /// decreases, or is zeroed by a verified cancellation.
    pub remaining: U256,
    /// Matchability cutoff. `None` = good-til-cancelled. Expired
    /// orders never match but stay cancelable and queryable.
    pub expiry: Option<DateTime<Utc>>,
    /// The maker's EIP-712 authorization, carried verbatim into
    /// execution plans so a relayer can settle on-chain.
    pub signature: Bytes,
    /// Lifecycle status; `Filled` iff remaining == 0.
    pub status: OrderStatus,
    /// Store-assigned monotonic tie-break for equal-price time priority.
    pub sequence: u64,
    /// When the order was accepted into the book.
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Whether the order can still be matched at `now`.
    pub fn is_restable(&self, now: DateTime<Utc>) -> bool {
        self.status.is_open()
            && !self.remaining.is_zero()
            && self.expiry.is_none_or(|e| e > now)
    }

    /// Status implied by a remaining quantity after a fill.
    pub fn status_for_remaining(remaining: U256) -> OrderStatus {
        if remaining.is_zero() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        }
    }
}

/// Result of applying a fill: the order's new remaining and status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillOutcome {
    pub remaining: U256,
    pub status: OrderStatus,
}

// ────────────────────────────────────────────
// Trades and settlement events
// ────────────────────────────────────────────

/// Where a trade record came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TradeProvenance {
    /// Replayed from a settlement contract event. `(tx_hash, log_index)`
    /// is the uniqueness key — reconciliation never inserts it twice.
    OnChain {
        tx_hash: B256,
        log_index: u64,
        block_number: u64,
        block_timestamp: DateTime<Utc>,
    },
    /// Recorded by the direct fill path on out-of-band confirmation.
    OffChain,
}

/// Immutable record of a matched and settled exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    /// Internal record id.
    pub id: Uuid,
    /// Chain the settlement happened on.
    pub chain_id: u64,
    /// Settlement contract.
    pub verifying_contract: Address,
    /// Optional market-instance key, mirrored from the order when known.
    pub market_key: Option<String>,
    /// Maker whose resting order was consumed.
    pub maker: Address,
    /// Taker, when the settlement event carries one.
    pub taker: Option<Address>,
    /// Outcome token traded.
    pub outcome_index: u32,
    /// Taker's side.
    pub side: Side,
    /// Execution price (the maker's limit price).
    pub price: U256,
    /// Executed quantity.
    pub amount: U256,
    /// On-chain or off-chain origin.
    pub provenance: TradeProvenance,
    /// When the trade was recorded locally.
    pub executed_at: DateTime<Utc>,
}

/// A decoded settlement-contract fill event.
///
/// ABI/event-schema decoding is the settlement watcher's job; the
/// engine receives these already parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementEvent {
    /// Maker of the filled order.
    pub maker: Address,
    /// Salt of the filled order.
    pub salt: U256,
    /// Quantity the contract reports as filled.
    pub amount: U256,
    /// Taker, if the event layout exposes one.
    pub taker: Option<Address>,
    /// Transaction that emitted the event.
    pub tx_hash: B256,
    /// Position of the event within the transaction logs.
    pub log_index: u64,
    /// Block the transaction was mined in.
    pub block_number: u64,
    /// Timestamp of that block.
    pub block_timestamp: DateTime<Utc>,
}
