//! Order Store Port - Durable Book Persistence Interface
//!
//! The abstract relational store behind the engine: order records keyed
//! by (chain, verifying contract, maker, salt), price-time-ordered
//! resting scans, atomic conditional fill application, and the
//! immutable trade log. Adapters implement this trait; everything above
//! it (planner, depth, fill, cancel) only sees the contract below.

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;

use crate::domain::error::EngineError;
use crate::domain::order::{
  BookScope, FillOutcome, Order, OrderIdentity, Trade,
};

/// Durable order + trade storage.
///
/// Concurrency contract: ALL mutation of an order's `remaining`/`status`
/// goes through `apply_fill`'s compare-and-swap or through `cancel`.
/// Blind writes are forbidden; they are what turns concurrent fills
/// into silent over-fill.
#[async_trait]
pub trait OrderStore: Send + Sync + 'static {
  /// Insert a new order. Fails with `DuplicateOrder` if the identity
  /// tuple already exists. The store assigns `sequence`; any value on
  /// the incoming order is overwritten.
  async fn insert(&self, order: Order) -> Result<Order, EngineError>;

  /// Point lookup by the natural primary key.
  async fn find(&self, id: &OrderIdentity) -> Result<Option<Order>, EngineError>;

  /// Snapshot of all matchable orders on one side of a book.
  ///
  /// Returns orders with status in {open, filled_partial} and an
  /// unexpired (or absent) expiry, ordered by price priority then
  /// ascending `sequence`: descending price for the buy side,
  /// ascending for the sell side, so the best price is always first.
  /// This ordering is the sole ordering contract the planner and
  /// depth aggregation depend on. The result is a finite
  /// point-in-time snapshot, not a restartable stream.
  async fn scan_resting(
    &self,
    scope: &BookScope,
    outcome_index: u32,
    is_buy: bool,
  ) -> Result<Vec<Order>, EngineError>;

  /// Conditionally decrement an order's remaining quantity.
  ///
  /// Compare-and-swap semantics: the write happens only if the order's
  /// current `remaining` still equals `expected_remaining` and
  /// `take <= remaining`. A mismatch means the caller's read is stale
  /// and fails with `ConcurrentUpdateConflict` — retry with a fresh
  /// read or treat the order as closed. Fails with `OrderClosed` on a
  /// canceled or fully-filled order and `OrderNotFound` when the id
  /// has no record. A relational adapter implements this as
  /// `UPDATE .. SET remaining = remaining - ? WHERE remaining = ?`
  /// and maps a zero-row result to the conflict error.
  async fn apply_fill(
    &self,
    id: &OrderIdentity,
    take: U256,
    expected_remaining: U256,
  ) -> Result<FillOutcome, EngineError>;

  /// Cancel an order: status -> canceled, remaining -> 0.
  ///
  /// Unconditional and idempotent: canceling an already-canceled or
  /// fully-filled order is a no-op, not an error. Only an unknown
  /// identity fails (`OrderNotFound`).
  async fn cancel(&self, id: &OrderIdentity) -> Result<(), EngineError>;

  /// All open/partially-filled orders a maker has on one contract.
  async fn open_orders_for_maker(
    &self,
    chain_id: u64,
    verifying_contract: Address,
    maker: Address,
  ) -> Result<Vec<Order>, EngineError>;

  /// Append an immutable trade record.
  ///
  /// Fails with `DuplicateTrade` when the trade carries on-chain
  /// provenance whose (tx_hash, log_index) is already recorded.
  /// Off-chain-provenance trades have no uniqueness constraint.
  async fn record_trade(&self, trade: Trade) -> Result<(), EngineError>;

  /// Whether an on-chain event has already produced a trade record.
  async fn trade_exists(
    &self,
    tx_hash: B256,
    log_index: u64,
  ) -> Result<bool, EngineError>;

  /// Audit listing of recorded trades for one contract scope.
  async fn list_trades(
    &self,
    chain_id: u64,
    verifying_contract: Address,
  ) -> Result<Vec<Trade>, EngineError>;

  /// Whether this store can filter scans by `market_key`.
  ///
  /// Resolved once at adapter construction (older schemas predate the
  /// column). When false, callers pass the filter and the store
  /// ignores it — never an error, never a per-call re-probe.
  fn supports_market_key(&self) -> bool;

  /// Whether the persistence layer is reachable and writable.
  async fn is_healthy(&self) -> bool;
}
