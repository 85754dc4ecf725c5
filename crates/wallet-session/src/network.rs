//! Logical cluster names, their RPC endpoints, and explorer links.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The Solana cluster a session talks to.
///
/// Switching clusters never touches wallet authorization — the endpoint is
/// derived from this value and recreated on every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Devnet,
    Testnet,
}

impl Network {
    /// Public RPC endpoint for this cluster.
    pub fn endpoint_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://api.mainnet-beta.solana.com",
            Network::Devnet => "https://api.devnet.solana.com",
            Network::Testnet => "https://api.testnet.solana.com",
        }
    }

    /// Display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Network::Mainnet => "Mainnet",
            Network::Devnet => "Devnet",
            Network::Testnet => "Testnet",
        }
    }

    /// Faucet airdrops only exist on the test clusters.
    pub fn has_faucet(&self) -> bool {
        !matches!(self, Network::Mainnet)
    }

    /// `cluster` query value for explorer links; mainnet is the explorer
    /// default and takes no parameter.
    fn cluster_param(&self) -> Option<&'static str> {
        match self {
            Network::Mainnet => None,
            Network::Devnet => Some("devnet"),
            Network::Testnet => Some("testnet"),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// What an explorer link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplorerTarget<'a> {
    Transaction(&'a str),
    Address(&'a str),
}

/// Build a block-explorer URL for a transaction or address on `network`.
pub fn explorer_url(target: ExplorerTarget<'_>, network: Network) -> String {
    const BASE: &str = "https://explorer.solana.com";
    let (kind, id) = match target {
        ExplorerTarget::Transaction(id) => ("tx", id),
        ExplorerTarget::Address(id) => ("address", id),
    };
    match network.cluster_param() {
        Some(cluster) => format!("{BASE}/{kind}/{id}?cluster={cluster}"),
        None => format!("{BASE}/{kind}/{id}"),
    }
}
