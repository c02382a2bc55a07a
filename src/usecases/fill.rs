//! Fill Application - Direct Fills and On-Chain Reconciliation
//!
//! The only component that mutates order state, through two entry
//! points sharing one invariant set:
//! - `apply_direct`: the caller has out-of-band confirmation a fill
//!   happened (e.g. a relayer that submitted the transaction itself).
//!   Fails fast and loudly — these calls protect real funds.
//! - `reconcile`: replays decoded settlement-contract events. Safe to
//!   run repeatedly over the same receipt (replays are no-ops) and
//!   concurrently with direct fills (the store's compare-and-swap
//!   turns races into clean retries, never silent over-fill).

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::error::EngineError;
use crate::domain::order::{
  FillOutcome, Order, OrderIdentity, SettlementEvent, Side, Trade,
  TradeProvenance,
};
use crate::ports::order_store::OrderStore;

/// Outcome summary of one reconciliation batch.
///
/// Events are processed independently: one missing or already-settled
/// order never aborts the rest of the batch.
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
  /// Orders whose remaining quantity was decremented.
  pub orders_updated: usize,
  /// Trade records inserted (including orphans).
  pub trades_recorded: usize,
  /// Events skipped as idempotent no-ops.
  pub skipped: usize,
  /// Human-readable per-event warnings.
  pub warnings: Vec<String>,
}

/// Applies fills to the order store with bounded conflict retries.
pub struct FillApplier<S: OrderStore + ?Sized> {
  store: Arc<S>,
  /// Retries after a lost compare-and-swap race before surfacing
  /// `ConcurrentUpdateConflict` to the caller.
  max_retries: u32,
}

impl<S: OrderStore + ?Sized> Clone for FillApplier<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      max_retries: self.max_retries,
    }
  }
}

impl<S: OrderStore + ?Sized> FillApplier<S> {
  pub fn new(store: Arc<S>, max_retries: u32) -> Self {
    Self { store, max_retries }
  }

  /// Apply a fill the caller has independently confirmed.
  ///
  /// The order must be open or partially filled (`OrderClosed`
  /// otherwise) and the amount must not exceed remaining
  /// (`InvalidParameters` — clamping is reserved for the
  /// chain-authoritative reconciliation path). Records an off-chain
  /// provenance trade on success.
  #[instrument(skip(self), fields(order = %id))]
  pub async fn apply_direct(
    &self,
    id: &OrderIdentity,
    fill_amount: U256,
  ) -> Result<FillOutcome, EngineError> {
    if fill_amount.is_zero() {
      return Err(EngineError::InvalidParameters(
        "fill amount must be positive".into(),
      ));
    }

    for attempt in 0..=self.max_retries {
      let order = self
        .store
        .find(id)
        .await?
        .ok_or(EngineError::OrderNotFound)?;

      if !order.status.is_open() {
        return Err(EngineError::OrderClosed);
      }
      if fill_amount > order.remaining {
        return Err(EngineError::InvalidParameters(format!(
          "fill amount {fill_amount} exceeds remaining {}",
          order.remaining
        )));
      }

      match self
        .store
        .apply_fill(id, fill_amount, order.remaining)
        .await
      {
        Ok(outcome) => {
          self
            .store
            .record_trade(Self::trade_for(
              &order,
              fill_amount,
              None,
              TradeProvenance::OffChain,
            ))
            .await?;
          info!(
            remaining = %outcome.remaining,
            status = %outcome.status,
            "Direct fill applied"
          );
          return Ok(outcome);
        }
        Err(EngineError::ConcurrentUpdateConflict) => {
          debug!(attempt, "Fill lost a concurrent update race, retrying");
        }
        Err(e) => return Err(e),
      }
    }

    Err(EngineError::ConcurrentUpdateConflict)
  }

  /// Replay decoded settlement events against the local book.
  ///
  /// Per event: skip if its (tx_hash, log_index) already produced a
  /// trade; resolve the order by (maker, salt): when absent, record
  /// the trade anyway (it is a fact about the chain) and warn; when
  /// already fully settled locally, skip; otherwise record the trade
  /// and clamp the take to remaining through the compare-and-swap
  /// path. The trade insert happens FIRST and doubles as the
  /// idempotency gate: a second reconciler racing on the same event
  /// loses the (tx_hash, log_index) insert and never touches the
  /// order, so one event can decrement at most once.
  #[instrument(skip(self, events), fields(chain = chain_id, event_count = events.len()))]
  pub async fn reconcile(
    &self,
    chain_id: u64,
    verifying_contract: Address,
    events: &[SettlementEvent],
  ) -> Result<ReconcileReport, EngineError> {
    let mut report = ReconcileReport::default();

    for event in events {
      if event.amount.is_zero() {
        report.skipped += 1;
        report.warnings.push(format!(
          "event {}#{} carries zero amount",
          event.tx_hash, event.log_index
        ));
        continue;
      }

      if self.store.trade_exists(event.tx_hash, event.log_index).await? {
        debug!(
          tx = %event.tx_hash,
          log_index = event.log_index,
          "Event already reconciled, skipping"
        );
        report.skipped += 1;
        continue;
      }

      let id = OrderIdentity {
        chain_id,
        verifying_contract,
        maker: event.maker,
        salt: event.salt,
      };

      match self.store.find(&id).await? {
        None => {
          // The chain settled an order this book never tracked
          // (placed before the store existed, or through another
          // instance). Record the fact; there is no local state to
          // mutate.
          warn!(
            maker = %event.maker,
            salt = %event.salt,
            tx = %event.tx_hash,
            "Fill event for unknown order, recording orphan trade"
          );
          report.warnings.push(format!(
            "no local order for maker {} salt {} (tx {}#{})",
            event.maker, event.salt, event.tx_hash, event.log_index
          ));
          if self.record_event_trade(&id, None, event).await? {
            report.trades_recorded += 1;
          } else {
            report.skipped += 1;
          }
        }
        Some(order) if order.remaining.is_zero() => {
          // Already fully settled locally; the same fill was observed
          // through another channel (e.g. a direct relayer call).
          debug!(order = %id, "Order already settled locally, skipping event");
          report.skipped += 1;
        }
        Some(order) => {
          if !self.record_event_trade(&id, Some(&order), event).await? {
            // Another reconciler claimed this event between our
            // existence check and the insert.
            report.skipped += 1;
            continue;
          }
          report.trades_recorded += 1;

          if self.settle_event(&order, event).await?.is_some() {
            report.orders_updated += 1;
          } else {
            report.warnings.push(format!(
              "order {} closed before event {}#{} could apply",
              id, event.tx_hash, event.log_index
            ));
          }
        }
      }
    }

    info!(
      updated = report.orders_updated,
      recorded = report.trades_recorded,
      skipped = report.skipped,
      warnings = report.warnings.len(),
      "Reconciliation batch complete"
    );
    Ok(report)
  }

  /// Apply one event's quantity with clamping and conflict retries.
  ///
  /// Returns `None` when the order reached a terminal state or zero
  /// remaining between reads — a skip, not an error.
  async fn settle_event(
    &self,
    first_read: &Order,
    event: &SettlementEvent,
  ) -> Result<Option<FillOutcome>, EngineError> {
    let mut order = first_read.clone();

    for _attempt in 0..=self.max_retries {
      if !order.status.is_open() || order.remaining.is_zero() {
        return Ok(None);
      }

      let take = order.remaining.min(event.amount);
      match self
        .store
        .apply_fill(&order.identity, take, order.remaining)
        .await
      {
        Ok(outcome) => return Ok(Some(outcome)),
        Err(EngineError::ConcurrentUpdateConflict) => {
          match self.store.find(&order.identity).await? {
            Some(fresh) => order = fresh,
            None => return Ok(None),
          }
        }
        Err(EngineError::OrderClosed) => return Ok(None),
        Err(e) => return Err(e),
      }
    }

    Err(EngineError::ConcurrentUpdateConflict)
  }

  /// Insert the trade record for an event; `false` means another
  /// reconciler recorded it first.
  ///
  /// The recorded amount is the event's amount verbatim (the chain's
  /// fact), even when the local mutation clamps to a smaller
  /// remaining.
  async fn record_event_trade(
    &self,
    id: &OrderIdentity,
    order: Option<&Order>,
    event: &SettlementEvent,
  ) -> Result<bool, EngineError> {
    let provenance = TradeProvenance::OnChain {
      tx_hash: event.tx_hash,
      log_index: event.log_index,
      block_number: event.block_number,
      block_timestamp: event.block_timestamp,
    };

    let trade = match order {
      Some(order) => {
        Self::trade_for(order, event.amount, event.taker, provenance)
      }
      // Orphan: the order's side, price, and outcome are unknown
      // locally; the record keeps the chain's own facts and neutral
      // placeholders for the rest.
      None => Trade {
        id: Uuid::new_v4(),
        chain_id: id.chain_id,
        verifying_contract: id.verifying_contract,
        market_key: None,
        maker: event.maker,
        taker: event.taker,
        outcome_index: 0,
        side: Side::Buy,
        price: U256::ZERO,
        amount: event.amount,
        provenance,
        executed_at: Utc::now(),
      },
    };

    match self.store.record_trade(trade).await {
      Ok(()) => Ok(true),
      Err(EngineError::DuplicateTrade { .. }) => Ok(false),
      Err(e) => Err(e),
    }
  }

  fn trade_for(
    order: &Order,
    amount: U256,
    taker: Option<Address>,
    provenance: TradeProvenance,
  ) -> Trade {
    Trade {
      id: Uuid::new_v4(),
      chain_id: order.identity.chain_id,
      verifying_contract: order.identity.verifying_contract,
      market_key: order.market_key.clone(),
      maker: order.identity.maker,
      taker,
      outcome_index: order.outcome_index,
      // The trade's side is the taker's: the opposite of the resting
      // order that was consumed.
      side: order.side.opposite(),
      price: order.price,
      amount,
      provenance,
      executed_at: Utc::now(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::adapters::persistence::InMemoryOrderStore;
  use crate::domain::order::OrderStatus;
  use alloy::primitives::{B256, Bytes};

  fn contract() -> Address {
    Address::repeat_byte(0xee)
  }

  async fn seed(store: &InMemoryOrderStore, maker_byte: u8, salt: u64, qty: u64) -> Order {
    store
      .insert(Order {
        identity: OrderIdentity {
          chain_id: 137,
          verifying_contract: contract(),
          maker: Address::repeat_byte(maker_byte),
          salt: U256::from(salt),
        },
        market_key: None,
        outcome_index: 0,
        side: Side::Sell,
        price: U256::from(400_000u64),
        amount: U256::from(qty),
        remaining: U256::from(qty),
        expiry: None,
        signature: Bytes::from(vec![maker_byte; 65]),
        status: OrderStatus::Open,
        sequence: 0,
        created_at: Utc::now(),
      })
      .await
      .unwrap()
  }

  fn event(maker_byte: u8, salt: u64, amount: u64, tx_byte: u8, log_index: u64) -> SettlementEvent {
    SettlementEvent {
      maker: Address::repeat_byte(maker_byte),
      salt: U256::from(salt),
      amount: U256::from(amount),
      taker: Some(Address::repeat_byte(0x99)),
      tx_hash: B256::repeat_byte(tx_byte),
      log_index,
      block_number: 1_000,
      block_timestamp: Utc::now(),
    }
  }

  #[tokio::test]
  async fn test_direct_fill_decrements_and_records_trade() {
    let store = Arc::new(InMemoryOrderStore::new());
    let order = seed(&store, 0x01, 1, 100).await;
    let applier = FillApplier::new(Arc::clone(&store), 3);

    let outcome = applier
      .apply_direct(&order.identity, U256::from(40u64))
      .await
      .unwrap();
    assert_eq!(outcome.remaining, U256::from(60u64));
    assert_eq!(outcome.status, OrderStatus::PartiallyFilled);

    let trades = store.list_trades(137, contract()).await.unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].provenance, TradeProvenance::OffChain);
    assert_eq!(trades[0].side, Side::Buy);
  }

  #[tokio::test]
  async fn test_direct_fill_rejects_closed_order_without_effect() {
    let store = Arc::new(InMemoryOrderStore::new());
    let order = seed(&store, 0x01, 1, 100).await;
    store.cancel(&order.identity).await.unwrap();

    let applier = FillApplier::new(Arc::clone(&store), 3);
    assert!(matches!(
      applier.apply_direct(&order.identity, U256::from(10u64)).await,
      Err(EngineError::OrderClosed)
    ));

    let stored = store.find(&order.identity).await.unwrap().unwrap();
    assert_eq!(stored.remaining, U256::ZERO);
    assert_eq!(stored.status, OrderStatus::Canceled);
    assert!(store.list_trades(137, contract()).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_direct_fill_overdraw_rejected() {
    let store = Arc::new(InMemoryOrderStore::new());
    let order = seed(&store, 0x01, 1, 50).await;
    let applier = FillApplier::new(store, 3);

    assert!(matches!(
      applier.apply_direct(&order.identity, U256::from(60u64)).await,
      Err(EngineError::InvalidParameters(_))
    ));
  }

  #[tokio::test]
  async fn test_reconcile_applies_and_is_idempotent() {
    let store = Arc::new(InMemoryOrderStore::new());
    let order = seed(&store, 0x01, 1, 100).await;
    let applier = FillApplier::new(Arc::clone(&store), 3);

    let events = vec![event(0x01, 1, 40, 0xaa, 0)];
    let report = applier.reconcile(137, contract(), &events).await.unwrap();
    assert_eq!(report.orders_updated, 1);
    assert_eq!(report.trades_recorded, 1);
    assert_eq!(report.skipped, 0);

    let stored = store.find(&order.identity).await.unwrap().unwrap();
    assert_eq!(stored.remaining, U256::from(60u64));

    // Replaying the same receipt is a no-op: one trade, one change.
    let report = applier.reconcile(137, contract(), &events).await.unwrap();
    assert_eq!(report.orders_updated, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(store.list_trades(137, contract()).await.unwrap().len(), 1);
    let stored = store.find(&order.identity).await.unwrap().unwrap();
    assert_eq!(stored.remaining, U256::from(60u64));
  }

  #[tokio::test]
  async fn test_reconcile_clamps_oversized_event_to_remaining() {
    let store = Arc::new(InMemoryOrderStore::new());
    let order = seed(&store, 0x01, 1, 30).await;
    let applier = FillApplier::new(Arc::clone(&store), 3);

    let report = applier
      .reconcile(137, contract(), &[event(0x01, 1, 80, 0xab, 0)])
      .await
      .unwrap();
    assert_eq!(report.orders_updated, 1);

    let stored = store.find(&order.identity).await.unwrap().unwrap();
    assert_eq!(stored.remaining, U256::ZERO);
    assert_eq!(stored.status, OrderStatus::Filled);
  }

  #[tokio::test]
  async fn test_reconcile_records_orphan_and_continues_batch() {
    let store = Arc::new(InMemoryOrderStore::new());
    let order = seed(&store, 0x01, 1, 100).await;
    let applier = FillApplier::new(Arc::clone(&store), 3);

    // First event targets an order this book never tracked.
    let events = vec![event(0x77, 9, 25, 0xac, 0), event(0x01, 1, 10, 0xac, 1)];
    let report = applier.reconcile(137, contract(), &events).await.unwrap();

    assert_eq!(report.orders_updated, 1);
    assert_eq!(report.trades_recorded, 2);
    assert_eq!(report.warnings.len(), 1);

    let stored = store.find(&order.identity).await.unwrap().unwrap();
    assert_eq!(stored.remaining, U256::from(90u64));
  }

  #[tokio::test]
  async fn test_reconcile_skips_locally_settled_order() {
    let store = Arc::new(InMemoryOrderStore::new());
    let order = seed(&store, 0x01, 1, 50).await;
    let applier = FillApplier::new(Arc::clone(&store), 3);

    // Direct path already consumed everything.
    applier.apply_direct(&order.identity, U256::from(50u64)).await.unwrap();

    let report = applier
      .reconcile(137, contract(), &[event(0x01, 1, 50, 0xad, 0)])
      .await
      .unwrap();
    assert_eq!(report.orders_updated, 0);
    assert_eq!(report.skipped, 1);
    // Only the off-chain trade from the direct path exists.
    assert_eq!(store.list_trades(137, contract()).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_reconcile_zero_amount_event_warned_and_skipped() {
    let store = Arc::new(InMemoryOrderStore::new());
    seed(&store, 0x01, 1, 50).await;
    let applier = FillApplier::new(Arc::clone(&store), 3);

    let report = applier
      .reconcile(137, contract(), &[event(0x01, 1, 0, 0xae, 0)])
      .await
      .unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(report.warnings.len(), 1);
    assert!(store.list_trades(137, contract()).await.unwrap().is_empty());
  }
}
