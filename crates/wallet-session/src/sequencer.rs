//! Submission sequencing: one user action driven through
//! build → sign → broadcast → confirm.
//!
//! Both the transfer form and the faucet panel funnel through here. Each
//! external failure is classified into a single user-visible category and
//! notified exactly once; the in-flight stage is observable over a watch
//! channel so a UI can disable its submit control and show progress. Only
//! one submission may be in flight at a time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use sol_tx::{
    sol_to_lamports, validate_amount, validate_recipient, Pubkey, UnsignedTransaction,
    LAMPORTS_PER_SOL,
};

use crate::error::SessionError;
use crate::network::{explorer_url, ExplorerTarget};
use crate::notify::{Notification, Notifier};
use crate::rpc::RpcError;
use crate::session::WalletSession;

/// Stage of the submission currently in flight.
///
/// A submission rejected by local validation never leaves `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitStage {
    #[default]
    Idle,
    Building,
    Signing,
    Broadcasting,
    Confirming,
    Done,
    Failed,
}

/// One transfer as entered into the form.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub recipient: String,
    /// Decimal SOL amount as typed; scaled with floor rounding.
    pub amount: String,
}

/// Faucet tunables.
#[derive(Debug, Clone, Copy)]
pub struct SequencerConfig {
    /// Fixed faucet request size.
    pub airdrop_lamports: u64,
    /// Client-side cooldown between faucet requests.
    pub airdrop_cooldown: Duration,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            airdrop_lamports: LAMPORTS_PER_SOL,
            airdrop_cooldown: Duration::from_secs(15),
        }
    }
}

/// Drives transfers and airdrops against the current session.
pub struct Sequencer {
    session: WalletSession,
    notifier: Arc<dyn Notifier>,
    config: SequencerConfig,
    stage: watch::Sender<SubmitStage>,
    in_flight: Mutex<()>,
    cooldown_until: Mutex<Option<Instant>>,
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("config", &self.config)
            .field("stage", &*self.stage.borrow())
            .finish_non_exhaustive()
    }
}

impl Sequencer {
    pub fn new(session: &WalletSession) -> Self {
        Self::with_config(session, SequencerConfig::default())
    }

    pub fn with_config(session: &WalletSession, config: SequencerConfig) -> Self {
        let (stage, _) = watch::channel(SubmitStage::Idle);
        Self {
            session: session.clone(),
            notifier: session.notifier(),
            config,
            stage,
            in_flight: Mutex::new(()),
            cooldown_until: Mutex::new(None),
        }
    }

    /// Watch stage changes of the submission in flight.
    pub fn stage(&self) -> watch::Receiver<SubmitStage> {
        self.stage.subscribe()
    }

    pub fn current_stage(&self) -> SubmitStage {
        *self.stage.borrow()
    }

    fn set_stage(&self, stage: SubmitStage) {
        debug!(?stage, "submission stage");
        self.stage.send_replace(stage);
    }

    /// Submit a transfer: validate, build against a fresh blockhash, have
    /// the wallet sign, broadcast, and wait for confirmed commitment.
    ///
    /// On success the form can be cleared and the balance is refreshed; on
    /// failure the request is returned to the caller untouched for
    /// correction and resubmission.
    pub async fn submit_transfer(&self, request: &TransferRequest) -> Result<String, SessionError> {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| SessionError::OperationInFlight)?;

        let result = self.run_transfer(request).await;
        match &result {
            Ok(signature) => {
                self.set_stage(SubmitStage::Done);
                let network = self.session.snapshot().await.network;
                let url = explorer_url(ExplorerTarget::Transaction(signature), network);
                self.notifier.notify(
                    Notification::success("Transfer successful", "View on explorer")
                        .with_explorer_url(url),
                );
                let _ = self.session.refresh_balance().await;
            }
            Err(error) => {
                match error {
                    // Resolved locally; the submission never started.
                    SessionError::InvalidRecipient(_)
                    | SessionError::InvalidAmount(_)
                    | SessionError::NotConnected => self.set_stage(SubmitStage::Idle),
                    _ => self.set_stage(SubmitStage::Failed),
                }
                self.report_transfer_failure(error);
            }
        }
        result
    }

    fn report_transfer_failure(&self, error: &SessionError) {
        match error {
            // Field-level errors render on the form, not as notifications.
            SessionError::InvalidRecipient(_) | SessionError::InvalidAmount(_) => {
                debug!(%error, "transfer blocked by validation");
            }
            SessionError::NotConnected => {
                self.notifier.notify(Notification::warning(
                    "Not connected",
                    "Connect your wallet first",
                ));
            }
            error => {
                warn!(%error, "transfer failed");
                self.notifier
                    .notify(Notification::error("Transfer failed", error.to_string()));
            }
        }
    }

    async fn run_transfer(&self, request: &TransferRequest) -> Result<String, SessionError> {
        let (sender, provider, rpc, _network) = self.session.submission_context().await?;

        // Both validators must pass before anything touches the network.
        validate_recipient(&request.recipient)?;
        validate_amount(&request.amount)?;

        self.set_stage(SubmitStage::Building);
        let recipient: Pubkey = request.recipient.trim().parse()?;
        let lamports = sol_to_lamports(&request.amount)?;
        let window = rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| SessionError::Internal(format!("failed to fetch blockhash: {e}")))?;
        let tx = UnsignedTransaction::transfer(sender, recipient, lamports, window.blockhash)?;
        debug!(from = %sender, to = %recipient, lamports, "built transfer");

        self.set_stage(SubmitStage::Signing);
        let signed = provider
            .sign_transaction(&tx)
            .await
            .map_err(|e| SessionError::SigningRejected(e.to_string()))?;

        self.set_stage(SubmitStage::Broadcasting);
        let signature = rpc
            .send_transaction(&signed)
            .await
            .map_err(|e| SessionError::BroadcastFailed(e.to_string()))?;
        info!(%signature, "transfer broadcast");

        self.set_stage(SubmitStage::Confirming);
        rpc.confirm_transaction(&signature, &window)
            .await
            .map_err(|e| SessionError::ConfirmationFailed(e.to_string()))?;
        info!(%signature, "transfer confirmed");

        Ok(signature)
    }

    /// Request the fixed faucet amount for the connected account.
    ///
    /// Rejected locally on mainnet and while the cooldown window is open —
    /// neither case makes a network call. A successful drop starts the
    /// cooldown.
    pub async fn request_airdrop(&self) -> Result<String, SessionError> {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| SessionError::OperationInFlight)?;

        if let Some(remaining) = self.cooldown_remaining().await {
            self.notifier.notify(Notification::warning(
                "Faucet",
                format!("Please wait {remaining}s between faucet requests"),
            ));
            return Err(SessionError::FaucetCooldown(remaining));
        }

        let result = self.run_airdrop().await;
        match &result {
            Ok(signature) => {
                self.set_stage(SubmitStage::Done);
                *self.cooldown_until.lock().await =
                    Some(Instant::now() + self.config.airdrop_cooldown);
                let network = self.session.snapshot().await.network;
                let url = explorer_url(ExplorerTarget::Transaction(signature), network);
                self.notifier.notify(
                    Notification::success("Airdrop successful", "View on explorer")
                        .with_explorer_url(url),
                );
                let _ = self.session.refresh_balance().await;
            }
            Err(error) => self.report_airdrop_failure(error),
        }
        result
    }

    fn report_airdrop_failure(&self, error: &SessionError) {
        match error {
            SessionError::FaucetUnavailable(network) => {
                self.set_stage(SubmitStage::Idle);
                self.notifier.notify(Notification::warning(
                    "Faucet",
                    format!("Airdrops are not available on {network}"),
                ));
            }
            SessionError::NotConnected => {
                self.set_stage(SubmitStage::Idle);
                self.notifier.notify(Notification::warning(
                    "Not connected",
                    "Connect your wallet first",
                ));
            }
            SessionError::RateLimited => {
                self.set_stage(SubmitStage::Failed);
                self.notifier.notify(Notification::error(
                    "Airdrop failed",
                    "Rate limit exceeded. Please try again later.",
                ));
            }
            error => {
                self.set_stage(SubmitStage::Failed);
                warn!(%error, "airdrop failed");
                self.notifier
                    .notify(Notification::error("Airdrop failed", error.to_string()));
            }
        }
    }

    async fn cooldown_remaining(&self) -> Option<u64> {
        let until = (*self.cooldown_until.lock().await)?;
        let now = Instant::now();
        (now < until).then(|| (until - now).as_secs().max(1))
    }

    async fn run_airdrop(&self) -> Result<String, SessionError> {
        let (key, _provider, rpc, network) = self.session.submission_context().await?;

        if !network.has_faucet() {
            return Err(SessionError::FaucetUnavailable(network));
        }

        self.set_stage(SubmitStage::Broadcasting);
        info!(address = %key, lamports = self.config.airdrop_lamports, "requesting airdrop");
        // The blockhash fetch rides alongside the faucet request; it only
        // anchors the confirmation window.
        let (window, signature) = tokio::try_join!(
            async {
                rpc.get_latest_blockhash()
                    .await
                    .map_err(classify_faucet_error)
            },
            async {
                rpc.request_airdrop(&key, self.config.airdrop_lamports)
                    .await
                    .map_err(classify_faucet_error)
            },
        )?;

        self.set_stage(SubmitStage::Confirming);
        rpc.confirm_transaction(&signature, &window)
            .await
            .map_err(classify_faucet_error)?;
        info!(%signature, "airdrop confirmed");

        Ok(signature)
    }
}

/// Faucet failures get the distinct rate-limit category when the endpoint
/// is throttling; the signal only exists in the message text.
fn classify_faucet_error(error: RpcError) -> SessionError {
    let text = error.to_string();
    let lowered = text.to_lowercase();
    if lowered.contains("429")
        || lowered.contains("rate limit")
        || lowered.contains("too many requests")
    {
        SessionError::RateLimited
    } else {
        SessionError::BroadcastFailed(text)
    }
}
