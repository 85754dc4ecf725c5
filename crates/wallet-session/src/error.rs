use thiserror::Error;

use crate::network::Network;
use sol_tx::TxError;

/// Failure categories surfaced to the user.
///
/// Validation variants are resolved locally and never reach the network;
/// everything else classifies a failure from an external call. There are no
/// automatic retries anywhere — a failed operation requires an explicit
/// resubmission.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No wallet extension was detected. A displayed state, not a failure.
    #[error("no wallet provider detected")]
    NoProvider,

    #[error("wallet is not connected")]
    NotConnected,

    #[error("connection rejected: {0}")]
    ConnectionRejected(String),

    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("signing rejected: {0}")]
    SigningRejected(String),

    #[error("broadcast failed: {0}")]
    BroadcastFailed(String),

    #[error("confirmation failed: {0}")]
    ConfirmationFailed(String),

    /// Airdrop-specific; detected heuristically from the failure text.
    #[error("airdrop rate limit exceeded")]
    RateLimited,

    /// Non-fatal: the previously displayed balance remains valid.
    #[error("balance fetch failed: {0}")]
    BalanceFetchFailed(String),

    #[error("faucet is not available on {0}")]
    FaucetUnavailable(Network),

    #[error("faucet cooldown active, {0}s remaining")]
    FaucetCooldown(u64),

    /// A second submission was attempted while one is pending.
    #[error("another submission is already in flight")]
    OperationInFlight,

    #[error("{0}")]
    Internal(String),
}

impl From<TxError> for SessionError {
    fn from(e: TxError) -> Self {
        match e {
            TxError::InvalidAddress(m) => SessionError::InvalidRecipient(m),
            TxError::InvalidAmount(m) => SessionError::InvalidAmount(m),
            TxError::Build(m) | TxError::Serialization(m) => SessionError::Internal(m),
        }
    }
}
