//! Chain Adapters - Ethereum Primitives via alloy-rs
//!
//! The engine never talks to a node: settlement-event decoding is the
//! watcher's job and plans are settled by the caller. What remains of
//! the chain boundary is cryptography — EIP-712 structured-message
//! hashing and ECDSA signer recovery.

pub mod eip712;

pub use eip712::{Eip712Verifier, OrderTerms};
