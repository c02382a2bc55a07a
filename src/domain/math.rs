//! Fixed-Point Money Arithmetic
//!
//! All prices, amounts, and costs are `U256` integers scaled by
//! `PRICE_SCALE` (10^6, matching the collateral token's decimals).
//! No floating point exists on any money path. Division always
//! truncates toward zero; each helper documents which party the
//! truncation favors.

use alloy::primitives::U256;

use super::error::EngineError;

/// Fixed-point scale: 10^6, the collateral token's decimal scale.
///
/// A price of 0.40 collateral per share is stored as 400_000.
/// Valid order prices are strictly inside (0, PRICE_SCALE).
pub const PRICE_SCALE: u64 = 1_000_000;

/// Basis-point denominator for slippage computation.
const BPS: u64 = 10_000;

/// `floor(a * b / d)`.
///
/// The product is checked; overflow is an error, not a wrap or a panic.
/// `d == 0` is rejected as `InvalidPrice`.
pub fn mul_div_floor(a: U256, b: U256, d: U256) -> Result<U256, EngineError> {
    if d.is_zero() {
        return Err(EngineError::InvalidPrice("division by zero".into()));
    }
    let product = a
        .checked_mul(b)
        .ok_or(EngineError::Overflow("mul_div_floor"))?;
    Ok(product / d)
}

/// Collateral cost of taking `amount` shares at `price`.
///
/// `floor(amount * price / PRICE_SCALE)` — truncation rounds the cost
/// down, favoring the taker by at most one collateral base unit.
pub fn fill_cost(amount: U256, price: U256) -> Result<U256, EngineError> {
    mul_div_floor(amount, price, U256::from(PRICE_SCALE))
}

/// Volume-weighted average price of an execution.
///
/// `floor(total_cost * PRICE_SCALE / filled_amount)` — truncation
/// understates the average by at most one price unit, favoring the
/// taker when the average is displayed as the effective rate paid.
pub fn average_price(total_cost: U256, filled_amount: U256) -> Result<U256, EngineError> {
    if filled_amount.is_zero() {
        return Err(EngineError::InvalidParameters(
            "average price over zero filled amount".into(),
        ));
    }
    mul_div_floor(total_cost, U256::from(PRICE_SCALE), filled_amount)
}

/// Slippage between the best and worst fill price, in basis points.
///
/// `|worst - best| * 10_000 / best`, integer-truncated. A zero best
/// price is a precondition violation: resting orders with price 0 can
/// never exist, so seeing one here means the book is corrupt.
pub fn slippage_bps(best: U256, worst: U256) -> Result<u64, EngineError> {
    if best.is_zero() {
        return Err(EngineError::InvalidPrice(
            "slippage against a zero best price".into(),
        ));
    }
    let spread = if worst >= best { worst - best } else { best - worst };
    let bps = mul_div_floor(spread, U256::from(BPS), best)?;
    u64::try_from(bps).map_err(|_| EngineError::Overflow("slippage_bps"))
}

/// Validate that a limit price is strictly inside (0, PRICE_SCALE).
pub fn validate_price(price: U256) -> Result<(), EngineError> {
    if price.is_zero() || price >= U256::from(PRICE_SCALE) {
        return Err(EngineError::InvalidPrice(format!(
            "price {price} outside (0, {PRICE_SCALE})"
        )));
    }
    Ok(())
}
