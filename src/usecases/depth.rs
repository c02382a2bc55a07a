//! Depth Aggregation - Price-Level Book Snapshots
//!
//! Folds the resting side of a book into aggregated price levels,
//! best price first. Prices are already quantized to the fixed-point
//! scale, so grouping is by exact price — no binning. A pure read:
//! runs in parallel with planners and writers, and the snapshot may be
//! stale by the time a caller acts on it.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::domain::error::EngineError;
use crate::domain::order::BookScope;
use crate::domain::plan::DepthLevel;
use crate::ports::order_store::OrderStore;

/// Read-only depth view over the order store.
pub struct DepthAggregator<S: OrderStore + ?Sized> {
  store: Arc<S>,
}

impl<S: OrderStore + ?Sized> Clone for DepthAggregator<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
    }
  }
}

impl<S: OrderStore + ?Sized> DepthAggregator<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store }
  }

  /// Aggregate resting quantity by price level.
  ///
  /// Returns at most `levels` entries, best-first (descending price
  /// for the buy side, ascending for the sell side — the scan's own
  /// ordering). An empty side yields an empty vec, never an error.
  #[instrument(skip(self, scope), fields(chain = scope.chain_id, outcome = outcome_index, is_buy))]
  pub async fn depth(
    &self,
    scope: &BookScope,
    outcome_index: u32,
    is_buy: bool,
    levels: usize,
  ) -> Result<Vec<DepthLevel>, EngineError> {
    let resting = self.store.scan_resting(scope, outcome_index, is_buy).await?;

    // The scan orders by price priority, so equal prices are adjacent:
    // one pass merges them.
    let mut aggregated: Vec<DepthLevel> = Vec::new();
    for order in &resting {
      match aggregated.last_mut() {
        Some(level) if level.price == order.price => {
          level.quantity = level
            .quantity
            .checked_add(order.remaining)
            .ok_or(EngineError::Overflow("depth aggregation"))?;
        }
        _ => {
          if aggregated.len() == levels {
            break;
          }
          aggregated.push(DepthLevel {
            price: order.price,
            quantity: order.remaining,
          });
        }
      }
    }

    debug!(
      resting = resting.len(),
      levels = aggregated.len(),
      "Depth aggregated"
    );
    Ok(aggregated)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::adapters::persistence::InMemoryOrderStore;
  use crate::domain::order::{Order, OrderIdentity, OrderStatus, Side};
  use alloy::primitives::{Address, Bytes, U256};
  use chrono::Utc;

  fn scope() -> BookScope {
    BookScope {
      chain_id: 137,
      verifying_contract: Address::repeat_byte(0xee),
      market_key: None,
    }
  }

  async fn seed(store: &InMemoryOrderStore, salt: u64, side: Side, price: u64, qty: u64) {
    store
      .insert(Order {
        identity: OrderIdentity {
          chain_id: 137,
          verifying_contract: Address::repeat_byte(0xee),
          maker: Address::repeat_byte(0x01),
          salt: U256::from(salt),
        },
        market_key: None,
        outcome_index: 0,
        side,
        price: U256::from(price),
        amount: U256::from(qty),
        remaining: U256::from(qty),
        expiry: None,
        signature: Bytes::from(vec![1u8; 65]),
        status: OrderStatus::Open,
        sequence: 0,
        created_at: Utc::now(),
      })
      .await
      .unwrap();
  }

  #[tokio::test]
  async fn test_same_price_orders_aggregate_into_one_level() {
    let store = Arc::new(InMemoryOrderStore::new());
    seed(&store, 1, Side::Sell, 600_000, 30).await;
    seed(&store, 2, Side::Sell, 600_000, 20).await;

    let depth = DepthAggregator::new(store)
      .depth(&scope(), 0, false, 10)
      .await
      .unwrap();

    assert_eq!(depth.len(), 1);
    assert_eq!(depth[0].price, U256::from(600_000u64));
    assert_eq!(depth[0].quantity, U256::from(50u64));
  }

  #[tokio::test]
  async fn test_levels_cap_and_best_first_ordering() {
    let store = Arc::new(InMemoryOrderStore::new());
    seed(&store, 1, Side::Buy, 300_000, 10).await;
    seed(&store, 2, Side::Buy, 500_000, 10).await;
    seed(&store, 3, Side::Buy, 400_000, 10).await;

    let depth = DepthAggregator::new(store)
      .depth(&scope(), 0, true, 2)
      .await
      .unwrap();

    assert_eq!(depth.len(), 2);
    assert_eq!(depth[0].price, U256::from(500_000u64));
    assert_eq!(depth[1].price, U256::from(400_000u64));
  }

  #[tokio::test]
  async fn test_empty_side_returns_empty_vec() {
    let store = Arc::new(InMemoryOrderStore::new());
    let depth = DepthAggregator::new(store)
      .depth(&scope(), 0, false, 10)
      .await
      .unwrap();
    assert!(depth.is_empty());
  }
}
