//! Cancellation - Signature-Verified Order Withdrawal
//!
//! Flow: recover the signer of the EIP-712 cancellation message,
//! require it to be the order's maker, then cancel through the store.
//! Verification is CPU-bound and completes before any mutation; the
//! store cancel itself is idempotent, so racing a concurrent fill
//! resolves cleanly in either order (the fill is rejected as
//! `OrderClosed` if the cancel won, or the cancel merely preempts
//! whatever remained if the fill won).

use std::sync::Arc;

use tracing::{info, instrument};

use crate::adapters::chain::Eip712Verifier;
use crate::domain::error::EngineError;
use crate::domain::order::OrderIdentity;
use crate::ports::order_store::OrderStore;

/// Verified cancellation service.
pub struct CancelService<S: OrderStore + ?Sized> {
  store: Arc<S>,
  verifier: Arc<Eip712Verifier>,
}

impl<S: OrderStore + ?Sized> Clone for CancelService<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      verifier: Arc::clone(&self.verifier),
    }
  }
}

impl<S: OrderStore + ?Sized> CancelService<S> {
  pub fn new(store: Arc<S>, verifier: Arc<Eip712Verifier>) -> Self {
    Self { store, verifier }
  }

  /// Cancel the order identified by `id`, authorized by `signature`.
  ///
  /// The signature must recover to `id.maker` over the cancellation
  /// digest of (maker, salt) under the engine's signing domain; any
  /// other signer is `Unauthorized` and leaves the order untouched.
  /// Canceling an already-terminal order succeeds as a no-op.
  #[instrument(skip(self, signature), fields(order = %id))]
  pub async fn cancel(
    &self,
    id: &OrderIdentity,
    signature: &[u8],
  ) -> Result<(), EngineError> {
    let digest = self.verifier.cancellation_digest(id.maker, id.salt);
    self.verifier.verify_maker(digest, signature, id.maker)?;

    // Existence check gives the caller a clean 404 instead of a
    // silent no-op for identities that were never on this book.
    if self.store.find(id).await?.is_none() {
      return Err(EngineError::OrderNotFound);
    }

    self.store.cancel(id).await?;
    info!("Order canceled");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::adapters::persistence::InMemoryOrderStore;
  use crate::domain::order::{Order, OrderStatus, Side};
  use alloy::primitives::{Address, Bytes, U256};
  use alloy::signers::SignerSync;
  use alloy::signers::local::PrivateKeySigner;
  use chrono::Utc;

  fn contract() -> Address {
    Address::repeat_byte(0xee)
  }

  fn verifier() -> Arc<Eip712Verifier> {
    Arc::new(Eip712Verifier::new("Hybrid CLOB", "1", 137, contract()))
  }

  async fn seed(store: &InMemoryOrderStore, maker: Address, salt: u64) -> Order {
    store
      .insert(Order {
        identity: OrderIdentity {
          chain_id: 137,
          verifying_contract: contract(),
          maker,
          salt: U256::from(salt),
        },
        market_key: None,
        outcome_index: 0,
        side: Side::Sell,
        price: U256::from(400_000u64),
        amount: U256::from(100u64),
        remaining: U256::from(100u64),
        expiry: None,
        signature: Bytes::from(vec![1u8; 65]),
        status: OrderStatus::Open,
        sequence: 0,
        created_at: Utc::now(),
      })
      .await
      .unwrap()
  }

  #[tokio::test]
  async fn test_maker_signed_cancellation_succeeds() {
    let maker = PrivateKeySigner::random();
    let store = Arc::new(InMemoryOrderStore::new());
    let order = seed(&store, maker.address(), 7).await;

    let v = verifier();
    let digest = v.cancellation_digest(maker.address(), U256::from(7u64));
    let sig = maker.sign_hash_sync(&digest).unwrap();

    CancelService::new(Arc::clone(&store), v)
      .cancel(&order.identity, &sig.as_bytes())
      .await
      .unwrap();

    let stored = store.find(&order.identity).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Canceled);
    assert_eq!(stored.remaining, U256::ZERO);
  }

  #[tokio::test]
  async fn test_foreign_signature_rejected_without_state_change() {
    let maker = PrivateKeySigner::random();
    let intruder = PrivateKeySigner::random();
    let store = Arc::new(InMemoryOrderStore::new());
    let order = seed(&store, maker.address(), 7).await;

    let v = verifier();
    let digest = v.cancellation_digest(maker.address(), U256::from(7u64));
    let sig = intruder.sign_hash_sync(&digest).unwrap();

    let result = CancelService::new(Arc::clone(&store), v)
      .cancel(&order.identity, &sig.as_bytes())
      .await;
    assert!(matches!(result, Err(EngineError::Unauthorized { .. })));

    let stored = store.find(&order.identity).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Open);
    assert_eq!(stored.remaining, U256::from(100u64));
  }

  #[tokio::test]
  async fn test_unknown_order_is_not_found() {
    let maker = PrivateKeySigner::random();
    let store = Arc::new(InMemoryOrderStore::new());

    let v = verifier();
    let digest = v.cancellation_digest(maker.address(), U256::from(1u64));
    let sig = maker.sign_hash_sync(&digest).unwrap();

    let id = OrderIdentity {
      chain_id: 137,
      verifying_contract: contract(),
      maker: maker.address(),
      salt: U256::from(1u64),
    };
    assert!(matches!(
      CancelService::new(store, v).cancel(&id, &sig.as_bytes()).await,
      Err(EngineError::OrderNotFound)
    ));
  }
}
