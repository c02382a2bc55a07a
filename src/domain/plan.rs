//! Execution Plans
//!
//! The planner's output: an ordered, non-binding proposal of which
//! resting orders a taker intent would consume, at what prices.
//! Plans are ephemeral — never persisted, never a reservation.
//! Committing to one happens later through the fill paths.

use alloy::primitives::{Bytes, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::order::{OrderIdentity, Side};

/// One proposed fill against a specific resting order.
///
/// Carries the maker's signature and original terms verbatim so the
/// caller can assemble a matching on-chain settlement transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedFill {
    /// Identity of the resting order to consume.
    pub identity: OrderIdentity,
    /// Quantity to take from this order.
    pub fill_amount: U256,
    /// The maker's limit price, at which this fill executes.
    pub price: U256,
    /// Original order size, part of the signed terms.
    pub order_amount: U256,
    /// Original expiry, part of the signed terms.
    pub order_expiry: Option<DateTime<Utc>>,
    /// The maker's authorization over those terms.
    pub signature: Bytes,
}

/// A computed execution proposal for a taker intent.
///
/// An empty book produces a valid plan with `filled_amount == 0` and
/// no best/worst price — never an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// The taker's side (the opposite book side was walked).
    pub taker_side: Side,
    /// Outcome token the plan trades.
    pub outcome_index: u32,
    /// Proposed fills in strict price-time priority order.
    pub fills: Vec<PlannedFill>,
    /// Total quantity the plan would fill.
    pub filled_amount: U256,
    /// Total collateral cost of the filled quantity.
    pub total_cost: U256,
    /// Volume-weighted average price; `None` for an empty plan.
    pub avg_price: Option<U256>,
    /// First fill's price; `None` for an empty plan.
    pub best_price: Option<U256>,
    /// Last fill's price; `None` for an empty plan.
    pub worst_price: Option<U256>,
    /// `|worst - best| * 10_000 / best`; 0 for an empty plan.
    pub slippage_bps: u64,
    /// Whether resting quantity remained after the target was reached.
    pub has_more_depth: bool,
}

impl ExecutionPlan {
    /// The valid zeroed plan for an empty (or exhausted) book side.
    pub fn empty(taker_side: Side, outcome_index: u32) -> Self {
        Self {
            taker_side,
            outcome_index,
            fills: Vec::new(),
            filled_amount: U256::ZERO,
            total_cost: U256::ZERO,
            avg_price: None,
            best_price: None,
            worst_price: None,
            slippage_bps: 0,
            has_more_depth: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fills.is_empty()
    }
}

/// One aggregated price level of book depth, best-first in context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel {
    /// Exact fixed-point price of the level.
    pub price: U256,
    /// Sum of `remaining` across all resting orders at this price.
    pub quantity: U256,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_plan_shape() {
        let plan = ExecutionPlan::empty(Side::Buy, 1);
        assert!(plan.is_empty());
        assert_eq!(plan.filled_amount, U256::ZERO);
        assert_eq!(plan.best_price, None);
        assert_eq!(plan.worst_price, None);
        assert_eq!(plan.avg_price, None);
        assert_eq!(plan.slippage_bps, 0);
        assert!(!plan.has_more_depth);
    }
}
