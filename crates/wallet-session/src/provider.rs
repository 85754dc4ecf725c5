//! The external wallet capability.
//!
//! In the browser a wallet extension injects itself at a well-known global;
//! here the host detects whatever capability it has and hands the session an
//! explicit `Arc<dyn WalletProvider>` (or nothing — "no provider" is a
//! displayed state, not an error). The provider owns all key material; the
//! session only ever sees public keys and signed bytes.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use sol_tx::{Pubkey, SignedTransaction, UnsignedTransaction};

/// Errors from the wallet provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The user declined the request in the wallet UI.
    #[error("request rejected by user")]
    Rejected,

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("provider error: {0}")]
    Other(String),
}

/// Connection lifecycle events a provider pushes at its subscribers.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    /// The provider granted (or restored) a connection with this identity.
    Connected(Pubkey),
    /// The provider dropped the connection.
    Disconnected,
    /// The active account changed; `None` means no account is exposed
    /// anymore.
    AccountChanged(Option<Pubkey>),
}

/// Capability surface of an external wallet.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Human-readable provider name ("Phantom", "Mock", ...).
    fn name(&self) -> &str;

    /// Identity currently exposed, if any.
    fn public_key(&self) -> Option<Pubkey>;

    /// Whether the provider considers itself connected.
    fn is_connected(&self) -> bool;

    /// Ask the user to authorize this session. Resolves with the granted
    /// identity; fails if the user declines.
    async fn connect(&self) -> Result<Pubkey, ProviderError>;

    async fn disconnect(&self) -> Result<(), ProviderError>;

    /// Sign a single transaction, returning broadcast-ready wire bytes.
    async fn sign_transaction(
        &self,
        tx: &UnsignedTransaction,
    ) -> Result<SignedTransaction, ProviderError>;

    /// Sign a batch in one approval.
    async fn sign_all_transactions(
        &self,
        txs: &[UnsignedTransaction],
    ) -> Result<Vec<SignedTransaction>, ProviderError>;

    /// Sign an arbitrary message (off-chain ownership proofs).
    async fn sign_message(&self, message: &[u8]) -> Result<Vec<u8>, ProviderError>;

    /// Subscribe to lifecycle events. Each call returns a fresh receiver;
    /// dropping the receiver ends the subscription.
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;
}
