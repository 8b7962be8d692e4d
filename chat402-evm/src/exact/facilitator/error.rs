//! Error types for on-chain settlement of `exact` EVM payments.

use alloy_primitives::TxHash;
use alloy_transport::TransportError;
use chat402::proto::PaymentVerificationError;

/// Errors raised while settling an authorization.
#[derive(Debug, thiserror::Error)]
pub enum Eip155ExactError {
    /// RPC transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Pending transaction error.
    #[error(transparent)]
    PendingTransaction(#[from] alloy_provider::PendingTransactionError),
    /// On-chain transaction was reverted.
    #[error("transaction {0} reverted")]
    TransactionReverted(TxHash),
    /// Contract call failed.
    #[error("contract call failed: {0}")]
    ContractCall(String),
    /// The authorization itself is unusable (e.g., nonce already consumed).
    #[error(transparent)]
    PaymentVerification(#[from] PaymentVerificationError),
}

impl Eip155ExactError {
    /// Human-readable failure reason reported to the paying client.
    ///
    /// Reverts caused by a consumed nonce are reported as such regardless
    /// of how the node phrased them.
    #[must_use]
    pub fn settlement_reason(&self) -> String {
        let message = self.to_string();
        if matches!(
            self,
            Self::PaymentVerification(PaymentVerificationError::NonceAlreadyUsed)
        ) || message.contains("authorization is used")
        {
            return "authorization nonce already used".to_owned();
        }
        message
    }
}

impl From<alloy_contract::Error> for Eip155ExactError {
    fn from(e: alloy_contract::Error) -> Self {
        match e {
            alloy_contract::Error::TransportError(e) => Self::Transport(e),
            alloy_contract::Error::PendingTransactionError(e) => Self::PendingTransaction(e),
            other => Self::ContractCall(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_reuse_is_named_consistently() {
        let precheck = Eip155ExactError::from(PaymentVerificationError::NonceAlreadyUsed);
        let revert = Eip155ExactError::ContractCall(
            "execution reverted: FiatTokenV2: authorization is used or canceled".into(),
        );
        assert_eq!(precheck.settlement_reason(), "authorization nonce already used");
        assert_eq!(revert.settlement_reason(), "authorization nonce already used");
    }

    #[test]
    fn revert_reason_names_the_transaction() {
        let err = Eip155ExactError::TransactionReverted(TxHash::repeat_byte(0xaa));
        assert!(err.settlement_reason().starts_with("transaction 0xaaaa"));
        assert!(err.settlement_reason().ends_with("reverted"));
    }
}
