//! Execution Planning - Price-Time-Priority Book Walk
//!
//! Computes the execution plan for a taker intent: walk the opposite
//! book side best-price-first (FIFO within a price level) and propose
//! fills until the target amount is satisfied or the side is
//! exhausted. Performs NO mutation — a plan is a proposal, not a
//! reservation, and no order is locked while planning. Committing
//! happens later through the fill paths, after on-chain settlement
//! confirms (or immediately, for the off-chain variant).

use std::sync::Arc;

use alloy::primitives::U256;
use tracing::{debug, info, instrument};

use crate::domain::error::EngineError;
use crate::domain::math;
use crate::domain::order::{BookScope, Side};
use crate::domain::plan::{ExecutionPlan, PlannedFill};
use crate::ports::order_store::OrderStore;

/// Read-only execution planner over the order store.
pub struct ExecutionPlanner<S: OrderStore + ?Sized> {
  store: Arc<S>,
}

impl<S: OrderStore + ?Sized> Clone for ExecutionPlanner<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
    }
  }
}

impl<S: OrderStore + ?Sized> ExecutionPlanner<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store }
  }

  /// Plan an execution for `target_amount` shares on `taker_side`.
  ///
  /// A taker buy consumes resting sells and vice versa. The scan's
  /// ordering contract (best price first, ascending sequence within a
  /// level) makes the walk greedy-optimal; the worst price is
  /// monotonically non-improving by construction. An empty or
  /// exhausted book yields a valid zeroed plan, never an error.
  #[instrument(skip(self, scope), fields(chain = scope.chain_id, outcome = outcome_index, side = %taker_side))]
  pub async fn plan(
    &self,
    scope: &BookScope,
    outcome_index: u32,
    taker_side: Side,
    target_amount: U256,
  ) -> Result<ExecutionPlan, EngineError> {
    if target_amount.is_zero() {
      return Err(EngineError::InvalidParameters(
        "target amount must be positive".into(),
      ));
    }

    let resting = self
      .store
      .scan_resting(scope, outcome_index, taker_side.opposite().is_buy())
      .await?;

    let mut plan = ExecutionPlan::empty(taker_side, outcome_index);
    let mut needed = target_amount;

    for (idx, order) in resting.iter().enumerate() {
      // Fully-filled orders never appear in a resting scan; seeing one
      // is a store invariant violation, not a case to handle here.
      debug_assert!(!order.remaining.is_zero());

      let take = order.remaining.min(needed);
      let cost = math::fill_cost(take, order.price)?;

      plan.fills.push(PlannedFill {
        identity: order.identity,
        fill_amount: take,
        price: order.price,
        order_amount: order.amount,
        order_expiry: order.expiry,
        signature: order.signature.clone(),
      });

      plan.filled_amount = plan
        .filled_amount
        .checked_add(take)
        .ok_or(EngineError::Overflow("plan filled amount"))?;
      plan.total_cost = plan
        .total_cost
        .checked_add(cost)
        .ok_or(EngineError::Overflow("plan total cost"))?;

      if plan.best_price.is_none() {
        plan.best_price = Some(order.price);
      }
      plan.worst_price = Some(order.price);

      needed -= take;
      if needed.is_zero() {
        // Cut short with liquidity left behind?
        plan.has_more_depth =
          order.remaining > take || idx + 1 < resting.len();
        break;
      }
    }

    if plan.is_empty() {
      debug!("No resting liquidity, returning empty plan");
      return Ok(plan);
    }

    plan.avg_price = Some(math::average_price(plan.total_cost, plan.filled_amount)?);
    if let (Some(best), Some(worst)) = (plan.best_price, plan.worst_price) {
      plan.slippage_bps = math::slippage_bps(best, worst)?;
    }

    info!(
      fills = plan.fills.len(),
      filled = %plan.filled_amount,
      requested = %target_amount,
      slippage_bps = plan.slippage_bps,
      more_depth = plan.has_more_depth,
      "Execution plan computed"
    );
    Ok(plan)
  }
}
