//! Headless wallet-session core for a Solana dApp.
//!
//! Owns the connection to an external wallet provider — discovery handoff,
//! connect/disconnect lifecycle, event subscription, balance refresh, and
//! network switching — and drives transfers and faucet airdrops through
//! build → sign → broadcast → confirm against the selected cluster.
//!
//! Presentation layers stay thin: they read [`SessionSnapshot`]s, render
//! [`Notification`]s from a [`Notifier`] sink, and watch the sequencer's
//! [`SubmitStage`]. No key material ever enters this crate; signing is
//! delegated to the [`WalletProvider`] capability.

pub mod error;
pub mod network;
pub mod notify;
pub mod provider;
pub mod rpc;
pub mod sequencer;
pub mod session;

pub use error::SessionError;
pub use network::{explorer_url, ExplorerTarget, Network};
pub use notify::{MemoryNotifier, Notification, NotificationLevel, Notifier, TracingNotifier};
pub use provider::{ProviderError, ProviderEvent, WalletProvider};
pub use rpc::{
    EndpointResolver, HttpResolver, HttpTransport, LatestBlockhash, RpcClient, RpcConfig,
    RpcError, RpcTransport,
};
pub use sequencer::{Sequencer, SequencerConfig, SubmitStage, TransferRequest};
pub use session::{ConnectionState, SessionSnapshot, WalletSession};

// Primitives consumers need alongside the session API.
pub use sol_tx::{Blockhash, Pubkey, SignedTransaction, UnsignedTransaction};
