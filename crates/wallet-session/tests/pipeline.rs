//! End-to-end tests exercising the full pipeline through the public API:
//! attach a wallet -> connect -> transfer / airdrop -> confirm -> refresh.
//!
//! The wallet is a real Ed25519 signer and the cluster is a scripted
//! JSON-RPC transport, so every byte that would go over the wire is built
//! and checked for real — only the network itself is canned.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use serde_json::{json, Value};
use tokio::sync::broadcast;

use wallet_session::{
    ConnectionState, EndpointResolver, MemoryNotifier, Network, NotificationLevel, ProviderError,
    ProviderEvent, Pubkey, RpcClient, RpcConfig, RpcError, RpcTransport, Sequencer, SessionError,
    SignedTransaction, SubmitStage, TransferRequest, UnsignedTransaction, WalletProvider,
    WalletSession,
};

// ─── Scripted cluster ───────────────────────────────────────────────

/// Answers JSON-RPC calls from per-method queues and records every call.
struct ScriptedTransport {
    url: String,
    responses: Mutex<HashMap<String, VecDeque<Result<Value, RpcError>>>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl ScriptedTransport {
    fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, method: &str, response: Result<Value, RpcError>) {
        self.responses
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push_back(response);
    }

    fn push_balance(&self, lamports: u64) {
        self.push(
            "getBalance",
            Ok(json!({ "context": { "slot": 1 }, "value": lamports })),
        );
    }

    fn push_blockhash(&self) {
        self.push(
            "getLatestBlockhash",
            Ok(json!({
                "context": { "slot": 1 },
                "value": {
                    "blockhash": bs58::encode([0xAAu8; 32]).into_string(),
                    "lastValidBlockHeight": 1000u64
                }
            })),
        );
    }

    fn push_confirmed(&self) {
        self.push(
            "getSignatureStatuses",
            Ok(json!({
                "context": { "slot": 2 },
                "value": [{ "err": null, "confirmationStatus": "confirmed" }]
            })),
        );
    }

    fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    fn calls_to(&self, method: &str) -> usize {
        self.calls().iter().filter(|(m, _)| m == method).count()
    }
}

#[async_trait]
impl RpcTransport for ScriptedTransport {
    async fn send(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params));
        self.responses
            .lock()
            .unwrap()
            .get_mut(method)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(RpcError::Transport(format!("unscripted method {method}"))))
    }

    fn url(&self) -> &str {
        &self.url
    }
}

/// Hands out one scripted transport per cluster.
struct ScriptedResolver {
    transports: Mutex<HashMap<Network, Arc<ScriptedTransport>>>,
}

impl ScriptedResolver {
    fn new() -> Self {
        Self {
            transports: Mutex::new(HashMap::new()),
        }
    }

    fn transport(&self, network: Network) -> Arc<ScriptedTransport> {
        self.transports
            .lock()
            .unwrap()
            .entry(network)
            .or_insert_with(|| Arc::new(ScriptedTransport::new(network.endpoint_url())))
            .clone()
    }
}

impl EndpointResolver for ScriptedResolver {
    fn resolve(&self, network: Network) -> Result<RpcClient, RpcError> {
        let config = RpcConfig {
            confirmation_poll_interval: std::time::Duration::from_millis(1),
            ..RpcConfig::default()
        };
        Ok(RpcClient::new(self.transport(network), config))
    }
}

// ─── Mock wallet extension ──────────────────────────────────────────

/// Wallet with a real Ed25519 key; signs exactly like an extension would.
struct MockWallet {
    signing_key: SigningKey,
    connected: AtomicBool,
    refuse_signing: bool,
    events: broadcast::Sender<ProviderEvent>,
}

impl MockWallet {
    fn new() -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&[0x42; 32]),
            connected: AtomicBool::new(false),
            refuse_signing: false,
            events: broadcast::channel(16).0,
        }
    }

    fn address(&self) -> Pubkey {
        Pubkey::new(self.signing_key.verifying_key().to_bytes())
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    fn name(&self) -> &str {
        "mock"
    }

    fn public_key(&self) -> Option<Pubkey> {
        self.connected
            .load(Ordering::SeqCst)
            .then(|| self.address())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<Pubkey, ProviderError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(self.address())
    }

    async fn disconnect(&self) -> Result<(), ProviderError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn sign_transaction(
        &self,
        tx: &UnsignedTransaction,
    ) -> Result<SignedTransaction, ProviderError> {
        if self.refuse_signing {
            return Err(ProviderError::Rejected);
        }
        let signature = self.signing_key.sign(&tx.message_bytes());
        Ok(tx.signed(&signature.to_bytes()))
    }

    async fn sign_all_transactions(
        &self,
        txs: &[UnsignedTransaction],
    ) -> Result<Vec<SignedTransaction>, ProviderError> {
        let mut signed = Vec::with_capacity(txs.len());
        for tx in txs {
            signed.push(self.sign_transaction(tx).await?);
        }
        Ok(signed)
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Vec<u8>, ProviderError> {
        Ok(self.signing_key.sign(message).to_bytes().to_vec())
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

// ─── Harness ────────────────────────────────────────────────────────

struct Harness {
    session: WalletSession,
    notifier: Arc<MemoryNotifier>,
    resolver: Arc<ScriptedResolver>,
    wallet: Arc<MockWallet>,
}

async fn harness_with(wallet: MockWallet) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let notifier = Arc::new(MemoryNotifier::new());
    let resolver = Arc::new(ScriptedResolver::new());
    let session =
        WalletSession::with_resolver(Network::Devnet, resolver.clone(), notifier.clone()).unwrap();
    let wallet = Arc::new(wallet);
    session.attach_provider(wallet.clone()).await;
    Harness {
        session,
        notifier,
        resolver,
        wallet,
    }
}

async fn harness() -> Harness {
    harness_with(MockWallet::new()).await
}

/// A 44-character recipient, the longest valid shape.
fn long_recipient() -> String {
    let recipient = Pubkey::new([0xEE; 32]).to_string();
    assert_eq!(recipient.len(), 44);
    recipient
}

// ─── Scenario: connect and display balance ──────────────────────────

#[tokio::test]
async fn connect_grants_identity_and_displays_balance() {
    let h = harness().await;
    h.resolver.transport(Network::Devnet).push_balance(2_500_000_000);

    h.session.connect().await.unwrap();

    let snap = h.session.snapshot().await;
    assert_eq!(snap.connection, ConnectionState::Connected);
    assert_eq!(snap.public_key, Some(h.wallet.address()));
    assert_eq!(snap.balance, Some(2.5));
}

// ─── Scenario: devnet transfer, end to end ──────────────────────────

#[tokio::test]
async fn transfer_signs_broadcasts_confirms_and_refreshes() {
    let h = harness().await;
    let devnet = h.resolver.transport(Network::Devnet);
    devnet.push_balance(2_500_000_000); // after connect
    devnet.push_blockhash();
    devnet.push("sendTransaction", Ok(json!("sig1")));
    devnet.push_confirmed();
    devnet.push_balance(2_400_000_000); // after transfer

    h.session.connect().await.unwrap();

    let sequencer = Sequencer::new(&h.session);
    let mut stages = sequencer.stage();
    let request = TransferRequest {
        recipient: long_recipient(),
        amount: "0.1".into(),
    };
    let signature = sequencer.submit_transfer(&request).await.unwrap();
    assert_eq!(signature, "sig1");
    assert_eq!(sequencer.current_stage(), SubmitStage::Done);
    assert_eq!(*stages.borrow_and_update(), SubmitStage::Done);

    // The broadcast wire ends with the instruction data; its final 8 bytes
    // are the lamport amount, so "0.1" must have scaled to 100_000_000.
    let calls = devnet.calls();
    let (_, params) = calls
        .iter()
        .find(|(m, _)| m == "sendTransaction")
        .expect("transaction was broadcast");
    let wire = bs58::decode(params[0].as_str().unwrap()).into_vec().unwrap();
    assert_eq!(&wire[wire.len() - 8..], &100_000_000u64.to_le_bytes());

    // Success notification links to the devnet explorer entry.
    let success = h
        .notifier
        .entries()
        .into_iter()
        .find(|n| n.level == NotificationLevel::Success)
        .expect("success notification");
    assert_eq!(
        success.explorer_url.as_deref(),
        Some("https://explorer.solana.com/tx/sig1?cluster=devnet")
    );

    // Balance was refreshed after confirmation.
    assert_eq!(h.session.snapshot().await.balance, Some(2.4));
}

#[tokio::test]
async fn transfer_validation_failures_never_reach_the_network() {
    let h = harness().await;
    let devnet = h.resolver.transport(Network::Devnet);
    devnet.push_balance(1_000_000_000);
    h.session.connect().await.unwrap();
    let calls_after_connect = devnet.calls().len();

    let sequencer = Sequencer::new(&h.session);

    let short_recipient = TransferRequest {
        recipient: "tooshort".into(),
        amount: "0.1".into(),
    };
    assert!(matches!(
        sequencer.submit_transfer(&short_recipient).await,
        Err(SessionError::InvalidRecipient(_))
    ));

    let bad_amount = TransferRequest {
        recipient: long_recipient(),
        amount: "-3".into(),
    };
    assert!(matches!(
        sequencer.submit_transfer(&bad_amount).await,
        Err(SessionError::InvalidAmount(_))
    ));

    assert_eq!(devnet.calls().len(), calls_after_connect);
    assert_eq!(sequencer.current_stage(), SubmitStage::Idle);
}

#[tokio::test]
async fn signing_rejection_is_classified_and_notified() {
    let mut wallet = MockWallet::new();
    wallet.refuse_signing = true;
    let h = harness_with(wallet).await;
    let devnet = h.resolver.transport(Network::Devnet);
    devnet.push_balance(1_000_000_000);
    devnet.push_blockhash();

    h.session.connect().await.unwrap();

    let sequencer = Sequencer::new(&h.session);
    let request = TransferRequest {
        recipient: long_recipient(),
        amount: "0.5".into(),
    };
    let result = sequencer.submit_transfer(&request).await;

    assert!(matches!(result, Err(SessionError::SigningRejected(_))));
    assert_eq!(sequencer.current_stage(), SubmitStage::Failed);
    assert_eq!(devnet.calls_to("sendTransaction"), 0);

    let errors: Vec<_> = h
        .notifier
        .entries()
        .into_iter()
        .filter(|n| n.level == NotificationLevel::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].title, "Transfer failed");
}

// ─── Scenario: faucet ───────────────────────────────────────────────

#[tokio::test]
async fn airdrop_succeeds_and_starts_cooldown() {
    let h = harness().await;
    let devnet = h.resolver.transport(Network::Devnet);
    devnet.push_balance(0);
    devnet.push_blockhash();
    devnet.push("requestAirdrop", Ok(json!("drop1")));
    devnet.push_confirmed();
    devnet.push_balance(1_000_000_000);

    h.session.connect().await.unwrap();

    let sequencer = Sequencer::new(&h.session);
    let signature = sequencer.request_airdrop().await.unwrap();
    assert_eq!(signature, "drop1");

    let success = h
        .notifier
        .entries()
        .into_iter()
        .find(|n| n.level == NotificationLevel::Success)
        .expect("success notification");
    assert_eq!(
        success.explorer_url.as_deref(),
        Some("https://explorer.solana.com/tx/drop1?cluster=devnet")
    );
    assert_eq!(h.session.snapshot().await.balance, Some(1.0));

    // Immediate resubmission is blocked client-side.
    let again = sequencer.request_airdrop().await;
    assert!(matches!(again, Err(SessionError::FaucetCooldown(_))));
    assert_eq!(devnet.calls_to("requestAirdrop"), 1);
}

#[tokio::test]
async fn airdrop_on_mainnet_is_rejected_without_a_network_call() {
    let h = harness().await;
    let mainnet = h.resolver.transport(Network::Mainnet);
    mainnet.push_balance(5_000_000_000);

    h.session.set_network(Network::Mainnet).await.unwrap();
    h.session.connect().await.unwrap();

    let sequencer = Sequencer::new(&h.session);
    let result = sequencer.request_airdrop().await;

    assert!(matches!(
        result,
        Err(SessionError::FaucetUnavailable(Network::Mainnet))
    ));
    assert_eq!(mainnet.calls_to("requestAirdrop"), 0);
    assert_eq!(mainnet.calls_to("getLatestBlockhash"), 0);

    let warning = h
        .notifier
        .entries()
        .into_iter()
        .find(|n| n.level == NotificationLevel::Warning)
        .expect("warning notification");
    assert!(warning.body.contains("Mainnet"));
}

#[tokio::test]
async fn airdrop_rate_limit_gets_the_friendlier_message() {
    let h = harness().await;
    let devnet = h.resolver.transport(Network::Devnet);
    devnet.push_balance(0);
    devnet.push_blockhash();
    devnet.push(
        "requestAirdrop",
        Err(RpcError::Rpc {
            code: 429,
            message: "429 Too Many Requests".into(),
        }),
    );

    h.session.connect().await.unwrap();

    let sequencer = Sequencer::new(&h.session);
    let result = sequencer.request_airdrop().await;
    assert!(matches!(result, Err(SessionError::RateLimited)));

    let error = h
        .notifier
        .entries()
        .into_iter()
        .find(|n| n.level == NotificationLevel::Error)
        .expect("error notification");
    assert_eq!(error.body, "Rate limit exceeded. Please try again later.");
}

// ─── Scenario: wider provider capability surface ────────────────────

#[tokio::test]
async fn wallet_signs_batches_and_messages() {
    use ed25519_dalek::{Signature, VerifyingKey};
    use wallet_session::Blockhash;

    let wallet = MockWallet::new();
    let sender = wallet.address();
    let blockhash = Blockhash::new([0xAB; 32]);

    let txs = vec![
        UnsignedTransaction::transfer(sender, Pubkey::new([1; 32]), 100, blockhash).unwrap(),
        UnsignedTransaction::transfer(sender, Pubkey::new([2; 32]), 200, blockhash).unwrap(),
    ];
    let signed = wallet.sign_all_transactions(&txs).await.unwrap();
    assert_eq!(signed.len(), 2);
    for (tx, signed) in txs.iter().zip(&signed) {
        assert_eq!(&signed.as_bytes()[65..], &tx.message_bytes()[..]);
    }

    let message = b"ownership check";
    let sig_bytes = wallet.sign_message(message).await.unwrap();
    let signature = Signature::from_bytes(&sig_bytes.try_into().unwrap());
    let vk = VerifyingKey::from_bytes(sender.as_bytes()).unwrap();
    assert!(vk.verify_strict(message, &signature).is_ok());
}

// ─── Scenario: disconnect invariant ─────────────────────────────────

#[tokio::test]
async fn disconnect_clears_identity_state_and_balance() {
    let h = harness().await;
    h.resolver.transport(Network::Devnet).push_balance(1_500_000_000);

    h.session.connect().await.unwrap();
    assert_eq!(h.session.snapshot().await.balance, Some(1.5));

    h.session.disconnect().await.unwrap();

    let snap = h.session.snapshot().await;
    assert_eq!(snap.connection, ConnectionState::Disconnected);
    assert_eq!(snap.public_key, None);
    assert_eq!(snap.balance, None);
}

// ─── Scenario: network switch ───────────────────────────────────────

#[tokio::test]
async fn network_switch_refreshes_against_the_new_cluster() {
    let h = harness().await;
    h.resolver.transport(Network::Devnet).push_balance(1_000_000_000);
    let testnet = h.resolver.transport(Network::Testnet);
    testnet.push_balance(7_000_000_000);

    h.session.connect().await.unwrap();
    h.session.set_network(Network::Testnet).await.unwrap();

    let snap = h.session.snapshot().await;
    assert_eq!(snap.network, Network::Testnet);
    assert_eq!(snap.endpoint, Network::Testnet.endpoint_url());
    assert_eq!(snap.balance, Some(7.0));
    assert_eq!(testnet.calls_to("getBalance"), 1);
}
