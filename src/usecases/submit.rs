//! Order Intake - Signed Limit Order Submission
//!
//! Accepts a maker's signed limit order into the book: validate the
//! terms (price inside the fixed-point bounds, positive amount,
//! unexpired), verify the EIP-712 signature against the claimed
//! maker, then insert. Insertion assigns the price-time sequence; a
//! reused (maker, salt) is rejected as `DuplicateOrder`.

use std::sync::Arc;

use alloy::primitives::Address;
use chrono::Utc;
use tracing::{info, instrument};

use crate::adapters::chain::{Eip712Verifier, OrderTerms};
use crate::domain::error::EngineError;
use crate::domain::math;
use crate::domain::order::{Order, OrderIdentity, OrderStatus, Side};
use crate::ports::order_store::OrderStore;

/// A submission request: signed terms plus book placement.
#[derive(Debug, Clone)]
pub struct OrderSubmission {
  pub terms: OrderTerms,
  pub market_key: Option<String>,
  pub signature: Vec<u8>,
}

/// Signed order intake service.
pub struct OrderIntake<S: OrderStore + ?Sized> {
  store: Arc<S>,
  verifier: Arc<Eip712Verifier>,
  chain_id: u64,
  verifying_contract: Address,
}

impl<S: OrderStore + ?Sized> Clone for OrderIntake<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      verifier: Arc::clone(&self.verifier),
      chain_id: self.chain_id,
      verifying_contract: self.verifying_contract,
    }
  }
}

impl<S: OrderStore + ?Sized> OrderIntake<S> {
  pub fn new(
    store: Arc<S>,
    verifier: Arc<Eip712Verifier>,
    chain_id: u64,
    verifying_contract: Address,
  ) -> Self {
    Self {
      store,
      verifier,
      chain_id,
      verifying_contract,
    }
  }

  /// Validate, verify, and insert a signed limit order.
  #[instrument(skip(self, submission), fields(maker = %submission.terms.maker, salt = %submission.terms.salt))]
  pub async fn submit(&self, submission: OrderSubmission) -> Result<Order, EngineError> {
    let terms = &submission.terms;

    math::validate_price(terms.price)?;
    if terms.amount.is_zero() {
      return Err(EngineError::InvalidParameters(
        "order amount must be positive".into(),
      ));
    }
    if let Some(expiry) = terms.expiry {
      if expiry <= Utc::now() {
        return Err(EngineError::InvalidParameters(
          "order is already expired".into(),
        ));
      }
    }

    // Signature check before any store access.
    let digest = self.verifier.order_digest(terms);
    self
      .verifier
      .verify_maker(digest, &submission.signature, terms.maker)?;

    let order = Order {
      identity: OrderIdentity {
        chain_id: self.chain_id,
        verifying_contract: self.verifying_contract,
        maker: terms.maker,
        salt: terms.salt,
      },
      market_key: submission.market_key,
      outcome_index: terms.outcome_index,
      side: if terms.is_buy { Side::Buy } else { Side::Sell },
      price: terms.price,
      amount: terms.amount,
      remaining: terms.amount,
      expiry: terms.expiry,
      signature: submission.signature.into(),
      status: OrderStatus::Open,
      sequence: 0, // assigned by the store
      created_at: Utc::now(),
    };

    let inserted = self.store.insert(order).await?;
    info!(sequence = inserted.sequence, "Order accepted into the book");
    Ok(inserted)
  }
}
