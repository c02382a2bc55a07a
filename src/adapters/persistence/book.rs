//! In-Process Order Store - Reference `OrderStore` Adapter
//!
//! Keeps the full book and trade log behind a single `RwLock`, with a
//! monotonic sequence counter for price-time tie-breaks. The
//! compare-and-swap contract of the port is honored by performing the
//! read-compare-write of `apply_fill` under one write guard; a
//! relational adapter would express the same condition as
//! `UPDATE .. WHERE remaining = ?` and map zero rows to a conflict.
//!
//! Durability comes from the companion `journal` module: every recorded
//! trade is appended to the JSONL journal, and `export_orders` /
//! `import_orders` feed the crash-safe book snapshot.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::domain::error::EngineError;
use crate::domain::order::{
    BookScope, FillOutcome, Order, OrderIdentity, Trade, TradeProvenance,
};
use crate::ports::order_store::OrderStore;

use super::journal::TradeJournal;

/// Mutable book state guarded by one lock.
struct BookState {
    orders: HashMap<OrderIdentity, Order>,
    trades: Vec<Trade>,
    /// On-chain provenance keys already recorded.
    trade_keys: HashSet<(B256, u64)>,
}

/// In-process `OrderStore` with optional trade journaling.
pub struct InMemoryOrderStore {
    state: RwLock<BookState>,
    /// Monotonic sequence source for equal-price time priority.
    next_sequence: AtomicU64,
    /// Append-only durable trade log, when attached.
    journal: Option<TradeJournal>,
    /// Capability flag resolved at construction (see port docs).
    market_key_supported: bool,
}

impl InMemoryOrderStore {
    /// Create an empty store with `market_key` filtering enabled.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(BookState {
                orders: HashMap::new(),
                trades: Vec::new(),
                trade_keys: HashSet::new(),
            }),
            next_sequence: AtomicU64::new(1),
            journal: None,
            market_key_supported: true,
        }
    }

    /// Create a store emulating a pre-`market_key` schema: the filter
    /// is accepted but ignored.
    pub fn without_market_key() -> Self {
        Self {
            market_key_supported: false,
            ..Self::new()
        }
    }

    /// Attach a durable trade journal; every `record_trade` appends.
    pub fn with_journal(mut self, journal: TradeJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Export every order for the book snapshot.
    pub async fn export_orders(&self) -> Vec<Order> {
        self.state.read().await.orders.values().cloned().collect()
    }

    /// Restore journaled trades, rebuilding the (tx_hash, log_index)
    /// dedup set so reconciliation stays idempotent across restarts.
    pub async fn import_trades(&self, trades: Vec<Trade>) {
        let mut state = self.state.write().await;
        for trade in trades {
            if let TradeProvenance::OnChain {
                tx_hash, log_index, ..
            } = trade.provenance
            {
                state.trade_keys.insert((tx_hash, log_index));
            }
            state.trades.push(trade);
        }
    }

    /// Restore orders from a snapshot, advancing the sequence counter
    /// past the highest restored value.
    pub async fn import_orders(&self, orders: Vec<Order>) {
        let mut state = self.state.write().await;
        let mut max_seq = 0u64;
        for order in orders {
            max_seq = max_seq.max(order.sequence);
            state.orders.insert(order.identity, order);
        }
        let floor = max_seq.saturating_add(1);
        if self.next_sequence.load(Ordering::SeqCst) < floor {
            self.next_sequence.store(floor, Ordering::SeqCst);
        }
    }

    fn in_scope(&self, order: &Order, scope: &BookScope) -> bool {
        if order.identity.chain_id != scope.chain_id
            || order.identity.verifying_contract != scope.verifying_contract
        {
            return false;
        }
        if let Some(key) = &scope.market_key {
            if !self.market_key_supported {
                debug!(market_key = %key, "market_key filter ignored: unsupported schema");
                return true;
            }
            return order.market_key.as_deref() == Some(key.as_str());
        }
        true
    }
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, mut order: Order) -> Result<Order, EngineError> {
        let mut state = self.state.write().await;
        if state.orders.contains_key(&order.identity) {
            return Err(EngineError::DuplicateOrder);
        }
        order.sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        state.orders.insert(order.identity, order.clone());
        Ok(order)
    }

    async fn find(&self, id: &OrderIdentity) -> Result<Option<Order>, EngineError> {
        Ok(self.state.read().await.orders.get(id).cloned())
    }

    async fn scan_resting(
        &self,
        scope: &BookScope,
        outcome_index: u32,
        is_buy: bool,
    ) -> Result<Vec<Order>, EngineError> {
        let now = Utc::now();
        let state = self.state.read().await;

        let mut resting: Vec<Order> = state
            .orders
            .values()
            .filter(|o| {
                self.in_scope(o, scope)
                    && o.outcome_index == outcome_index
                    && o.side.is_buy() == is_buy
                    && o.is_restable(now)
            })
            .cloned()
            .collect();

        // Best price first: descending for buys, ascending for sells;
        // equal prices break by ascending sequence (strict FIFO).
        resting.sort_by(|a, b| {
            let by_price = if is_buy {
                b.price.cmp(&a.price)
            } else {
                a.price.cmp(&b.price)
            };
            by_price.then(a.sequence.cmp(&b.sequence))
        });

        Ok(resting)
    }

    async fn apply_fill(
        &self,
        id: &OrderIdentity,
        take: U256,
        expected_remaining: U256,
    ) -> Result<FillOutcome, EngineError> {
        if take.is_zero() {
            return Err(EngineError::InvalidParameters(
                "fill amount must be positive".into(),
            ));
        }

        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(id)
            .ok_or(EngineError::OrderNotFound)?;

        if !order.status.is_open() {
            return Err(EngineError::OrderClosed);
        }
        if order.remaining != expected_remaining {
            return Err(EngineError::ConcurrentUpdateConflict);
        }
        if take > order.remaining {
            return Err(EngineError::InvalidParameters(format!(
                "fill amount {take} exceeds remaining {}",
                order.remaining
            )));
        }

        order.remaining -= take;
        order.status = Order::status_for_remaining(order.remaining);

        Ok(FillOutcome {
            remaining: order.remaining,
            status: order.status,
        })
    }

    async fn cancel(&self, id: &OrderIdentity) -> Result<(), EngineError> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(id)
            .ok_or(EngineError::OrderNotFound)?;

        if order.status.is_terminal() {
            debug!(order = %id, status = %order.status, "cancel is a no-op");
            return Ok(());
        }

        order.status = crate::domain::order::OrderStatus::Canceled;
        order.remaining = U256::ZERO;
        Ok(())
    }

    async fn open_orders_for_maker(
        &self,
        chain_id: u64,
        verifying_contract: Address,
        maker: Address,
    ) -> Result<Vec<Order>, EngineError> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| {
                o.identity.chain_id == chain_id
                    && o.identity.verifying_contract == verifying_contract
                    && o.identity.maker == maker
                    && o.status.is_open()
            })
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.sequence);
        Ok(orders)
    }

    async fn record_trade(&self, trade: Trade) -> Result<(), EngineError> {
        let mut state = self.state.write().await;

        if let TradeProvenance::OnChain {
            tx_hash, log_index, ..
        } = trade.provenance
        {
            if !state.trade_keys.insert((tx_hash, log_index)) {
                return Err(EngineError::DuplicateTrade { tx_hash, log_index });
            }
        }

        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append(&trade).await {
                // The in-memory record is the source of truth for
                // dedup; a journal failure must still surface.
                warn!(error = %e, "trade journal append failed");
                if let TradeProvenance::OnChain {
                    tx_hash, log_index, ..
                } = trade.provenance
                {
                    state.trade_keys.remove(&(tx_hash, log_index));
                }
                return Err(EngineError::StorageUnavailable(e.to_string()));
            }
        }

        state.trades.push(trade);
        Ok(())
    }

    async fn trade_exists(
        &self,
        tx_hash: B256,
        log_index: u64,
    ) -> Result<bool, EngineError> {
        Ok(self
            .state
            .read()
            .await
            .trade_keys
            .contains(&(tx_hash, log_index)))
    }

    async fn list_trades(
        &self,
        chain_id: u64,
        verifying_contract: Address,
    ) -> Result<Vec<Trade>, EngineError> {
        Ok(self
            .state
            .read()
            .await
            .trades
            .iter()
            .filter(|t| {
                t.chain_id == chain_id && t.verifying_contract == verifying_contract
            })
            .cloned()
            .collect())
    }

    fn supports_market_key(&self) -> bool {
        self.market_key_supported
    }

    async fn is_healthy(&self) -> bool {
        match &self.journal {
            Some(journal) => journal.is_healthy().await,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderStatus, Side};
    use alloy::primitives::Bytes;

    fn contract() -> Address {
        Address::repeat_byte(0xee)
    }

    fn scope() -> BookScope {
        BookScope {
            chain_id: 137,
            verifying_contract: contract(),
            market_key: None,
        }
    }

    fn order(maker_byte: u8, salt: u64, side: Side, price: u64, amount: u64) -> Order {
        Order {
            identity: OrderIdentity {
                chain_id: 137,
                verifying_contract: contract(),
                maker: Address::repeat_byte(maker_byte),
                salt: U256::from(salt),
            },
            market_key: Some("mkt-1".into()),
            outcome_index: 0,
            side,
            price: U256::from(price),
            amount: U256::from(amount),
            remaining: U256::from(amount),
            expiry: None,
            signature: Bytes::from(vec![1u8; 65]),
            status: OrderStatus::Open,
            sequence: 0,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_identity() {
        let store = InMemoryOrderStore::new();
        let o = order(0x01, 1, Side::Sell, 400_000, 100);
        store.insert(o.clone()).await.unwrap();
        assert!(matches!(
            store.insert(o).await,
            Err(EngineError::DuplicateOrder)
        ));
    }

    #[tokio::test]
    async fn test_scan_orders_sell_side_price_then_sequence() {
        let store = InMemoryOrderStore::new();
        // Insertion order fixes sequence: A then B at 0.40, C at 0.45.
        let a = store.insert(order(0x0a, 1, Side::Sell, 400_000, 50)).await.unwrap();
        let b = store.insert(order(0x0b, 1, Side::Sell, 400_000, 50)).await.unwrap();
        let c = store.insert(order(0x0c, 1, Side::Sell, 450_000, 100)).await.unwrap();

        let resting = store.scan_resting(&scope(), 0, false).await.unwrap();
        let ids: Vec<OrderIdentity> =
            resting.iter().map(|o| o.identity).collect();
        assert_eq!(ids, vec![a.identity, b.identity, c.identity]);
    }

    #[tokio::test]
    async fn test_scan_orders_buy_side_descending() {
        let store = InMemoryOrderStore::new();
        store.insert(order(0x0a, 1, Side::Buy, 300_000, 10)).await.unwrap();
        store.insert(order(0x0b, 1, Side::Buy, 500_000, 10)).await.unwrap();

        let resting = store.scan_resting(&scope(), 0, true).await.unwrap();
        assert_eq!(resting[0].price, U256::from(500_000u64));
        assert_eq!(resting[1].price, U256::from(300_000u64));
    }

    #[tokio::test]
    async fn test_scan_excludes_expired_and_closed() {
        let store = InMemoryOrderStore::new();
        let mut expired = order(0x0a, 1, Side::Sell, 400_000, 10);
        expired.expiry = Some(Utc::now() - chrono::Duration::seconds(5));
        store.insert(expired).await.unwrap();

        let live = store.insert(order(0x0b, 2, Side::Sell, 400_000, 10)).await.unwrap();
        store.cancel(&live.identity).await.unwrap();

        assert!(store.scan_resting(&scope(), 0, false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_market_key_filter_applies_when_supported() {
        let store = InMemoryOrderStore::new();
        store.insert(order(0x0a, 1, Side::Sell, 400_000, 10)).await.unwrap();

        let mut other_scope = scope();
        other_scope.market_key = Some("mkt-2".into());
        assert!(store.scan_resting(&other_scope, 0, false).await.unwrap().is_empty());

        let mut matching = scope();
        matching.market_key = Some("mkt-1".into());
        assert_eq!(store.scan_resting(&matching, 0, false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_market_key_filter_ignored_when_unsupported() {
        let store = InMemoryOrderStore::without_market_key();
        store.insert(order(0x0a, 1, Side::Sell, 400_000, 10)).await.unwrap();

        let mut other_scope = scope();
        other_scope.market_key = Some("mkt-2".into());
        assert_eq!(store.scan_resting(&other_scope, 0, false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_apply_fill_cas_detects_stale_read() {
        let store = InMemoryOrderStore::new();
        let o = store.insert(order(0x0a, 1, Side::Sell, 400_000, 100)).await.unwrap();

        // First writer wins with a fresh read.
        let outcome = store
            .apply_fill(&o.identity, U256::from(40u64), U256::from(100u64))
            .await
            .unwrap();
        assert_eq!(outcome.remaining, U256::from(60u64));
        assert_eq!(outcome.status, OrderStatus::PartiallyFilled);

        // Second writer still holds the old remaining and must lose.
        assert!(matches!(
            store
                .apply_fill(&o.identity, U256::from(40u64), U256::from(100u64))
                .await,
            Err(EngineError::ConcurrentUpdateConflict)
        ));

        // Retry with a fresh read succeeds.
        let outcome = store
            .apply_fill(&o.identity, U256::from(60u64), U256::from(60u64))
            .await
            .unwrap();
        assert_eq!(outcome.remaining, U256::ZERO);
        assert_eq!(outcome.status, OrderStatus::Filled);
    }

    #[tokio::test]
    async fn test_apply_fill_rejects_closed_and_overdraw() {
        let store = InMemoryOrderStore::new();
        let o = store.insert(order(0x0a, 1, Side::Sell, 400_000, 50)).await.unwrap();

        assert!(matches!(
            store
                .apply_fill(&o.identity, U256::from(60u64), U256::from(50u64))
                .await,
            Err(EngineError::InvalidParameters(_))
        ));

        store.cancel(&o.identity).await.unwrap();
        assert!(matches!(
            store
                .apply_fill(&o.identity, U256::from(10u64), U256::from(50u64))
                .await,
            Err(EngineError::OrderClosed)
        ));
    }

    #[tokio::test]
    async fn test_cancel_idempotent_and_zeroing() {
        let store = InMemoryOrderStore::new();
        let o = store.insert(order(0x0a, 1, Side::Sell, 400_000, 50)).await.unwrap();

        store.cancel(&o.identity).await.unwrap();
        store.cancel(&o.identity).await.unwrap();

        let stored = store.find(&o.identity).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Canceled);
        assert_eq!(stored.remaining, U256::ZERO);
    }

    #[tokio::test]
    async fn test_record_trade_dedups_on_chain_provenance() {
        let store = InMemoryOrderStore::new();
        let tx = B256::repeat_byte(0xaa);
        let trade = Trade {
            id: uuid::Uuid::new_v4(),
            chain_id: 137,
            verifying_contract: contract(),
            market_key: None,
            maker: Address::repeat_byte(0x01),
            taker: None,
            outcome_index: 0,
            side: Side::Buy,
            price: U256::from(400_000u64),
            amount: U256::from(10u64),
            provenance: TradeProvenance::OnChain {
                tx_hash: tx,
                log_index: 3,
                block_number: 100,
                block_timestamp: Utc::now(),
            },
            executed_at: Utc::now(),
        };

        store.record_trade(trade.clone()).await.unwrap();
        assert!(store.trade_exists(tx, 3).await.unwrap());
        assert!(matches!(
            store.record_trade(trade).await,
            Err(EngineError::DuplicateTrade { .. })
        ));
        assert_eq!(store.list_trades(137, contract()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_import_trades_restores_dedup_keys() {
        let store = InMemoryOrderStore::new();
        let tx = B256::repeat_byte(0xbb);
        let trade = Trade {
            id: uuid::Uuid::new_v4(),
            chain_id: 137,
            verifying_contract: contract(),
            market_key: None,
            maker: Address::repeat_byte(0x01),
            taker: None,
            outcome_index: 0,
            side: Side::Buy,
            price: U256::from(400_000u64),
            amount: U256::from(10u64),
            provenance: TradeProvenance::OnChain {
                tx_hash: tx,
                log_index: 7,
                block_number: 50,
                block_timestamp: Utc::now(),
            },
            executed_at: Utc::now(),
        };

        store.import_trades(vec![trade.clone()]).await;
        assert!(store.trade_exists(tx, 7).await.unwrap());
        assert!(matches!(
            store.record_trade(trade).await,
            Err(EngineError::DuplicateTrade { .. })
        ));
    }

    #[tokio::test]
    async fn test_import_orders_advances_sequence() {
        let store = InMemoryOrderStore::new();
        let mut snap = order(0x0a, 1, Side::Sell, 400_000, 10);
        snap.sequence = 41;
        store.import_orders(vec![snap]).await;

        let next = store.insert(order(0x0b, 2, Side::Sell, 400_000, 10)).await.unwrap();
        assert!(next.sequence > 41);
    }
}
