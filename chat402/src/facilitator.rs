//! The seam between the HTTP gate and a chain-specific payment scheme.
//!
//! A [`Facilitator`] verifies payment proofs against the requirement issued
//! for the current request and, when enabled, settles them on-chain. The
//! gate only ever talks to this trait, which keeps it chain-agnostic.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::proto::v1::{PaymentPayload, PaymentRequirements};
use crate::proto::{PaymentVerificationError, SettlementResult};

/// Boxed future returned by [`Facilitator`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a successful verification established about a proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayment {
    /// Address that signed the authorization.
    pub payer: String,
    /// Authorized amount in atomic units.
    pub amount: String,
    /// Token contract the authorization is bound to.
    pub asset: String,
    /// Authorization nonce, `0x`-prefixed hex.
    pub nonce: String,
}

/// Verifies and settles payment proofs.
pub trait Facilitator: Send + Sync {
    /// Checks a proof against the current requirement.
    ///
    /// Implementations must not touch the chain here; verification is a pure
    /// function of the proof, the requirement and the clock.
    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<VerifiedPayment, PaymentVerificationError>>;

    /// Submits a proof on-chain.
    ///
    /// Never fails past its boundary: every problem is reported as a failed
    /// [`SettlementResult`].
    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, SettlementResult>;

    /// Whether [`Facilitator::settle`] should be called after verification.
    fn settles(&self) -> bool;
}

impl<T: Facilitator + ?Sized> Facilitator for Arc<T> {
    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<VerifiedPayment, PaymentVerificationError>> {
        (**self).verify(payload, requirements)
    }

    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, SettlementResult> {
        (**self).settle(payload, requirements)
    }

    fn settles(&self) -> bool {
        (**self).settles()
    }
}
