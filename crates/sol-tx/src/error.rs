use thiserror::Error;

/// Errors from address parsing, amount conversion, and transaction building.
#[derive(Debug, Error)]
pub enum TxError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("transaction build error: {0}")]
    Build(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
