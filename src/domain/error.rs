//! Engine Error Taxonomy
//!
//! One typed error enum for everything the engine can reject. Adapters
//! and the binary wire layer wrap these in `anyhow` with context; the
//! HTTP boundary maps each variant to a status code in `adapters::api`.

use alloy::primitives::{Address, B256};
use thiserror::Error;

/// All failure modes of the order book / settlement core.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed or out-of-range request data, rejected before any store access.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Price outside (0, scale) or a zero divisor in a price computation.
    #[error("invalid price: {0}")]
    InvalidPrice(String),

    /// Checked arithmetic overflowed. Never panics, never wraps.
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    /// Signature bytes are malformed or ECDSA recovery failed.
    #[error("invalid signature")]
    InvalidSignature,

    /// Signature recovered to an address other than the claimed maker.
    #[error("unauthorized: recovered signer {signer} does not match maker {maker}")]
    Unauthorized { signer: Address, maker: Address },

    /// No order exists for the identity tuple.
    #[error("order not found")]
    OrderNotFound,

    /// Action attempted on a canceled or fully-filled order.
    #[error("order is closed")]
    OrderClosed,

    /// An order with the same (chain, contract, maker, salt) already exists.
    #[error("duplicate order")]
    DuplicateOrder,

    /// A trade with the same on-chain (tx_hash, log_index) already exists.
    #[error("duplicate trade {tx_hash}#{log_index}")]
    DuplicateTrade { tx_hash: B256, log_index: u64 },

    /// The conditional update lost a race. Retry with a fresh read.
    #[error("concurrent update conflict")]
    ConcurrentUpdateConflict,

    /// The persistence layer could not be reached.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl EngineError {
    /// Whether the caller should retry with a fresh read instead of
    /// surfacing the failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentUpdateConflict)
    }
}
