//! The shared wallet session: single source of truth for connectivity,
//! identity, network, and balance.
//!
//! One `WalletSession` exists per app; clones share state. All mutation
//! goes through the operations here — consumers read [`SessionSnapshot`]s.
//!
//! Balance writes are guarded by a generation counter: every identity or
//! network change bumps it, and a fetch only stores its result if the
//! counter it captured is still current. A slow response from a superseded
//! identity can therefore never overwrite fresher state.

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use sol_tx::{lamports_to_sol, Pubkey};

use crate::error::SessionError;
use crate::network::Network;
use crate::notify::{Notification, Notifier};
use crate::provider::{ProviderEvent, WalletProvider};
use crate::rpc::{EndpointResolver, HttpResolver, RpcClient, RpcConfig};

/// Wallet connection lifecycle.
///
/// The only legal transitions are
/// `Disconnected → Connecting → Connected` and back to `Disconnected`
/// (from either non-idle state). `connect()` in a non-idle state is a
/// no-op, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

struct SessionState {
    provider: Option<Arc<dyn WalletProvider>>,
    connection: ConnectionState,
    public_key: Option<Pubkey>,
    network: Network,
    rpc: RpcClient,
    balance: Option<f64>,
    balance_loading: bool,
    balance_epoch: u64,
}

impl SessionState {
    /// Invalidate any in-flight balance fetch.
    fn supersede_balance(&mut self) {
        self.balance_epoch += 1;
        self.balance_loading = false;
    }
}

/// Read-only view of the session for presentation layers.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub connection: ConnectionState,
    pub public_key: Option<Pubkey>,
    pub network: Network,
    pub endpoint: String,
    /// Display-unit (SOL) balance; `None` while unknown.
    pub balance: Option<f64>,
    pub balance_loading: bool,
    pub has_provider: bool,
}

/// Aborts the provider event pump when the session goes away.
struct EventPump {
    handle: JoinHandle<()>,
}

impl Drop for EventPump {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// The process-wide wallet session.
#[derive(Clone)]
pub struct WalletSession {
    state: Arc<RwLock<SessionState>>,
    notifier: Arc<dyn Notifier>,
    resolver: Arc<dyn EndpointResolver>,
    event_pump: Arc<Mutex<Option<EventPump>>>,
}

impl std::fmt::Debug for WalletSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSession").finish_non_exhaustive()
    }
}

impl WalletSession {
    /// Create a session against `network`'s public endpoint.
    pub fn new(
        network: Network,
        rpc_config: RpcConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, SessionError> {
        Self::with_resolver(network, Arc::new(HttpResolver::new(rpc_config)), notifier)
    }

    /// Create a session with a custom endpoint resolver.
    pub fn with_resolver(
        network: Network,
        resolver: Arc<dyn EndpointResolver>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, SessionError> {
        let rpc = resolver
            .resolve(network)
            .map_err(|e| SessionError::Internal(e.to_string()))?;

        Ok(Self {
            state: Arc::new(RwLock::new(SessionState {
                provider: None,
                connection: ConnectionState::Disconnected,
                public_key: None,
                network,
                rpc,
                balance: None,
                balance_loading: false,
                balance_epoch: 0,
            })),
            notifier,
            resolver,
            event_pump: Arc::new(Mutex::new(None)),
        })
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let s = self.state.read().await;
        SessionSnapshot {
            connection: s.connection,
            public_key: s.public_key,
            network: s.network,
            endpoint: s.rpc.endpoint().to_string(),
            balance: s.balance,
            balance_loading: s.balance_loading,
            has_provider: s.provider.is_some(),
        }
    }

    /// Hand the session the wallet capability the host discovered.
    ///
    /// Subscribes to the provider's lifecycle events for as long as the
    /// session lives. A provider that is already authorized is adopted
    /// immediately, without a `connect()` round trip.
    pub async fn attach_provider(&self, provider: Arc<dyn WalletProvider>) {
        let events = provider.subscribe();

        let adopted = {
            let mut s = self.state.write().await;
            s.provider = Some(provider.clone());
            match provider.public_key() {
                Some(key) if provider.is_connected() => {
                    s.connection = ConnectionState::Connected;
                    s.public_key = Some(key);
                    info!(provider = provider.name(), public_key = %key, "adopted existing wallet connection");
                    true
                }
                _ => {
                    debug!(provider = provider.name(), "wallet provider attached");
                    false
                }
            }
        };

        let pump = EventPump {
            handle: tokio::spawn(Self::pump_events(
                Arc::downgrade(&self.state),
                self.notifier.clone(),
                events,
            )),
        };
        *self.event_pump.lock().await = Some(pump);

        if adopted {
            let _ = self.refresh_balance().await;
        }
    }

    /// Request authorization from the attached provider.
    ///
    /// No-op while already connecting or connected. Without a provider this
    /// reports the "install a wallet" state and fails with `NoProvider`.
    pub async fn connect(&self) -> Result<(), SessionError> {
        let provider = {
            let mut s = self.state.write().await;
            match s.connection {
                ConnectionState::Connecting | ConnectionState::Connected => return Ok(()),
                ConnectionState::Disconnected => {}
            }
            let Some(provider) = s.provider.clone() else {
                self.notifier.notify(Notification::warning(
                    "Wallet not found",
                    "Install a wallet extension to connect",
                ));
                return Err(SessionError::NoProvider);
            };
            s.connection = ConnectionState::Connecting;
            provider
        };

        info!(provider = provider.name(), "connecting wallet");
        match provider.connect().await {
            Ok(key) => {
                {
                    let mut s = self.state.write().await;
                    s.connection = ConnectionState::Connected;
                    s.public_key = Some(key);
                }
                info!(public_key = %key, "wallet connected");
                let _ = self.refresh_balance().await;
                Ok(())
            }
            Err(e) => {
                {
                    let mut s = self.state.write().await;
                    s.connection = ConnectionState::Disconnected;
                    s.public_key = None;
                }
                warn!(error = %e, "wallet connection failed");
                self.notifier
                    .notify(Notification::error("Connection failed", e.to_string()));
                Err(SessionError::ConnectionRejected(e.to_string()))
            }
        }
    }

    /// Disconnect from the provider.
    ///
    /// Local state always resets, even when the provider call errors — the
    /// UI must never be stuck showing a connection that is gone.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        let provider = {
            let s = self.state.read().await;
            if s.connection != ConnectionState::Connected {
                return Ok(());
            }
            s.provider.clone()
        };

        if let Some(provider) = provider {
            if let Err(e) = provider.disconnect().await {
                warn!(error = %e, "provider disconnect failed, resetting locally");
                self.notifier
                    .notify(Notification::warning("Disconnect", e.to_string()));
            }
        }

        let mut s = self.state.write().await;
        s.connection = ConnectionState::Disconnected;
        s.public_key = None;
        s.balance = None;
        s.supersede_balance();
        info!("wallet disconnected");
        Ok(())
    }

    /// Switch clusters. Recreates the endpoint handle and, while connected,
    /// refreshes the balance against the new cluster. Wallet authorization
    /// is untouched.
    pub async fn set_network(&self, network: Network) -> Result<(), SessionError> {
        let connected = {
            let mut s = self.state.write().await;
            if s.network == network {
                return Ok(());
            }
            let rpc = self
                .resolver
                .resolve(network)
                .map_err(|e| SessionError::Internal(e.to_string()))?;
            s.network = network;
            s.rpc = rpc;
            s.supersede_balance();
            info!(network = %network, endpoint = s.rpc.endpoint(), "network changed");
            s.connection == ConnectionState::Connected
        };

        if connected {
            let _ = self.refresh_balance().await;
        }
        Ok(())
    }

    /// Re-query the connected account's balance.
    ///
    /// No-op while disconnected. A failure is non-fatal: the previous
    /// balance stays displayed, a notification is surfaced, and the
    /// `BalanceFetchFailed` this returns is safe to ignore.
    pub async fn refresh_balance(&self) -> Result<(), SessionError> {
        Self::refresh_balance_on(&self.state, &self.notifier).await
    }

    async fn refresh_balance_on(
        state: &Arc<RwLock<SessionState>>,
        notifier: &Arc<dyn Notifier>,
    ) -> Result<(), SessionError> {
        let (rpc, key, epoch) = {
            let mut s = state.write().await;
            if s.connection != ConnectionState::Connected {
                return Ok(());
            }
            let Some(key) = s.public_key else {
                return Ok(());
            };
            s.balance_loading = true;
            (s.rpc.clone(), key, s.balance_epoch)
        };

        debug!(address = %key, "refreshing balance");
        let result = rpc.get_balance(&key).await;

        let mut s = state.write().await;
        if s.balance_epoch != epoch {
            debug!(address = %key, "dropping superseded balance result");
            return Ok(());
        }
        s.balance_loading = false;
        match result {
            Ok(lamports) => {
                s.balance = Some(lamports_to_sol(lamports));
                debug!(lamports, "balance updated");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "balance fetch failed");
                notifier.notify(Notification::error(
                    "Balance",
                    "Failed to fetch wallet balance",
                ));
                Err(SessionError::BalanceFetchFailed(e.to_string()))
            }
        }
    }

    async fn pump_events(
        state: std::sync::Weak<RwLock<SessionState>>,
        notifier: Arc<dyn Notifier>,
        mut events: broadcast::Receiver<ProviderEvent>,
    ) {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "provider event stream lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let Some(state) = state.upgrade() else { break };
            Self::apply_event(&state, &notifier, event).await;
        }
    }

    async fn apply_event(
        state: &Arc<RwLock<SessionState>>,
        notifier: &Arc<dyn Notifier>,
        event: ProviderEvent,
    ) {
        match event {
            ProviderEvent::Connected(key) => {
                let mut s = state.write().await;
                s.connection = ConnectionState::Connected;
                s.public_key = Some(key);
                debug!(public_key = %key, "provider reported connect");
            }
            ProviderEvent::Disconnected | ProviderEvent::AccountChanged(None) => {
                let mut s = state.write().await;
                s.connection = ConnectionState::Disconnected;
                s.public_key = None;
                s.balance = None;
                s.supersede_balance();
                info!("provider reported disconnect");
            }
            ProviderEvent::AccountChanged(Some(key)) => {
                {
                    let mut s = state.write().await;
                    // Clear before the fetch so the old balance is never
                    // shown under the new identity.
                    s.balance = None;
                    s.supersede_balance();
                    s.public_key = Some(key);
                    s.connection = ConnectionState::Connected;
                    info!(public_key = %key, "provider account changed");
                }
                let _ = Self::refresh_balance_on(state, notifier).await;
            }
        }
    }

    /// Everything the sequencer needs to run one submission.
    pub(crate) async fn submission_context(
        &self,
    ) -> Result<(Pubkey, Arc<dyn WalletProvider>, RpcClient, Network), SessionError> {
        let s = self.state.read().await;
        if s.connection != ConnectionState::Connected {
            return Err(SessionError::NotConnected);
        }
        let key = s.public_key.ok_or(SessionError::NotConnected)?;
        let provider = s.provider.clone().ok_or(SessionError::NoProvider)?;
        Ok((key, provider, s.rpc.clone(), s.network))
    }

    pub(crate) fn notifier(&self) -> Arc<dyn Notifier> {
        self.notifier.clone()
    }
}
