//! EIP-712 Signature Verification
//!
//! Recovers signer addresses from the structured messages makers sign:
//! order submissions and cancellation requests. The signing domain is
//! bound to (name, version, chain_id, verifying_contract), so a
//! message signed for one settlement contract or chain can never be
//! replayed against another.
//!
//! Verification is pure CPU work and always completes before any store
//! mutation begins.

use alloy::primitives::{Address, B256, PrimitiveSignature as Signature, U256};
use alloy::sol;
use alloy::sol_types::{Eip712Domain, SolStruct};
use chrono::{DateTime, Utc};

use crate::domain::error::EngineError;

sol! {
    /// Cancellation request: binds (maker, salt); the chain and
    /// verifying contract are bound implicitly via the signing domain.
    struct Cancellation {
        address maker;
        uint256 salt;
    }

    /// The order terms a maker authorizes when submitting. Expiry is
    /// a unix timestamp in seconds; 0 means good-til-cancelled.
    struct OrderPayload {
        address maker;
        uint256 salt;
        uint32 outcomeIndex;
        bool isBuy;
        uint256 price;
        uint256 amount;
        uint256 expiry;
    }
}

/// Terms covered by an order-submission signature.
#[derive(Debug, Clone)]
pub struct OrderTerms {
    pub maker: Address,
    pub salt: U256,
    pub outcome_index: u32,
    pub is_buy: bool,
    pub price: U256,
    pub amount: U256,
    pub expiry: Option<DateTime<Utc>>,
}

/// EIP-712 verifier for one (chain, verifying contract) domain.
pub struct Eip712Verifier {
    domain: Eip712Domain,
}

impl Eip712Verifier {
    /// Build the verifier for the configured signing domain.
    pub fn new(
        name: &str,
        version: &str,
        chain_id: u64,
        verifying_contract: Address,
    ) -> Self {
        let domain = Eip712Domain {
            name: Some(name.to_string().into()),
            version: Some(version.to_string().into()),
            chain_id: Some(U256::from(chain_id)),
            verifying_contract: Some(verifying_contract),
            salt: None,
        };
        Self { domain }
    }

    /// Signing digest of a cancellation request for (maker, salt).
    pub fn cancellation_digest(&self, maker: Address, salt: U256) -> B256 {
        Cancellation { maker, salt }.eip712_signing_hash(&self.domain)
    }

    /// Signing digest of an order submission.
    pub fn order_digest(&self, terms: &OrderTerms) -> B256 {
        let expiry = terms
            .expiry
            .map_or(U256::ZERO, |e| U256::from(e.timestamp().max(0) as u64));
        OrderPayload {
            maker: terms.maker,
            salt: terms.salt,
            outcomeIndex: terms.outcome_index,
            isBuy: terms.is_buy,
            price: terms.price,
            amount: terms.amount,
            expiry,
        }
        .eip712_signing_hash(&self.domain)
    }

    /// Recover the signer of a digest.
    ///
    /// Malformed signature bytes or a failed ECDSA recovery are both
    /// `InvalidSignature`; callers compare the result to the claimed
    /// maker themselves or use `verify_maker`.
    pub fn recover_signer(
        &self,
        digest: B256,
        signature: &[u8],
    ) -> Result<Address, EngineError> {
        let sig = Signature::try_from(signature)
            .map_err(|_| EngineError::InvalidSignature)?;
        sig.recover_address_from_prehash(&digest)
            .map_err(|_| EngineError::InvalidSignature)
    }

    /// Require that `signature` over `digest` recovers to `claimed`.
    ///
    /// A mismatch is `Unauthorized` — reported, never silently accepted.
    pub fn verify_maker(
        &self,
        digest: B256,
        signature: &[u8],
        claimed: Address,
    ) -> Result<(), EngineError> {
        let signer = self.recover_signer(digest, signature)?;
        if signer != claimed {
            return Err(EngineError::Unauthorized {
                signer,
                maker: claimed,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::signers::SignerSync;
    use alloy::signers::local::PrivateKeySigner;

    fn verifier() -> Eip712Verifier {
        Eip712Verifier::new("Hybrid CLOB", "1", 137, Address::repeat_byte(0xee))
    }

    #[test]
    fn test_cancellation_roundtrip_recovers_signer() {
        let signer = PrivateKeySigner::random();
        let v = verifier();

        let digest = v.cancellation_digest(signer.address(), U256::from(42u64));
        let sig = signer.sign_hash_sync(&digest).unwrap();

        let recovered = v.recover_signer(digest, &sig.as_bytes()).unwrap();
        assert_eq!(recovered, signer.address());
        v.verify_maker(digest, &sig.as_bytes(), signer.address()).unwrap();
    }

    #[test]
    fn test_wrong_signer_is_unauthorized() {
        let maker = PrivateKeySigner::random();
        let intruder = PrivateKeySigner::random();
        let v = verifier();

        let digest = v.cancellation_digest(maker.address(), U256::from(42u64));
        let sig = intruder.sign_hash_sync(&digest).unwrap();

        assert!(matches!(
            v.verify_maker(digest, &sig.as_bytes(), maker.address()),
            Err(EngineError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_malformed_signature_bytes_rejected() {
        let v = verifier();
        let digest = v.cancellation_digest(Address::ZERO, U256::ZERO);
        assert!(matches!(
            v.recover_signer(digest, &[0u8; 10]),
            Err(EngineError::InvalidSignature)
        ));
    }

    #[test]
    fn test_domain_binds_chain_and_contract() {
        let signer = PrivateKeySigner::random();
        let v_polygon = verifier();
        let v_mainnet =
            Eip712Verifier::new("Hybrid CLOB", "1", 1, Address::repeat_byte(0xee));

        let salt = U256::from(7u64);
        let digest = v_polygon.cancellation_digest(signer.address(), salt);
        let sig = signer.sign_hash_sync(&digest).unwrap();

        // The same message hashed under another chain's domain must not
        // recover the maker.
        let foreign = v_mainnet.cancellation_digest(signer.address(), salt);
        assert_ne!(digest, foreign);
        assert!(
            v_mainnet
                .verify_maker(foreign, &sig.as_bytes(), signer.address())
                .is_err()
        );
    }

    #[test]
    fn test_order_digest_covers_terms() {
        let signer = PrivateKeySigner::random();
        let v = verifier();

        let mut terms = OrderTerms {
            maker: signer.address(),
            salt: U256::from(1u64),
            outcome_index: 0,
            is_buy: true,
            price: U256::from(400_000u64),
            amount: U256::from(100u64),
            expiry: None,
        };
        let digest = v.order_digest(&terms);
        let sig = signer.sign_hash_sync(&digest).unwrap();
        v.verify_maker(digest, &sig.as_bytes(), signer.address()).unwrap();

        // Any mutated term invalidates the signature binding.
        terms.price = U256::from(500_000u64);
        let tampered = v.order_digest(&terms);
        assert_ne!(digest, tampered);
    }
}
