//! Solana account addresses.
//!
//! An address is the Base58 encoding of a raw 32-byte Ed25519 public key.
//! There is no hashing step — the public key bytes ARE the address bytes.
//!
//! Two levels of checking live here. [`Pubkey::from_str`] is the strict
//! parse used before anything touches the network. [`validate_recipient`]
//! is the cheap shape check an input field runs on every edit: it only
//! looks at the trimmed length (valid addresses are 32-44 characters), not
//! at the Base58 content.

use std::fmt;
use std::str::FromStr;

use crate::error::TxError;

/// Raw length of a public key.
pub const PUBKEY_BYTES: usize = 32;

/// Shortest Base58 form of a 32-byte key.
pub const MIN_ADDRESS_CHARS: usize = 32;

/// Longest Base58 form of a 32-byte key.
pub const MAX_ADDRESS_CHARS: usize = 44;

/// A 32-byte Ed25519 public key identifying an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pubkey([u8; PUBKEY_BYTES]);

impl Pubkey {
    pub const fn new(bytes: [u8; PUBKEY_BYTES]) -> Self {
        Self(bytes)
    }

    pub const fn to_bytes(self) -> [u8; PUBKEY_BYTES] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; PUBKEY_BYTES] {
        &self.0
    }
}

impl FromStr for Pubkey {
    type Err = TxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| TxError::InvalidAddress(format!("base58 decode failed: {e}")))?;

        let arr: [u8; PUBKEY_BYTES] = bytes.try_into().map_err(|v: Vec<u8>| {
            TxError::InvalidAddress(format!("expected {PUBKEY_BYTES} bytes, got {}", v.len()))
        })?;

        Ok(Self(arr))
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(&self.0).into_string())
    }
}

impl From<[u8; PUBKEY_BYTES]> for Pubkey {
    fn from(bytes: [u8; PUBKEY_BYTES]) -> Self {
        Self(bytes)
    }
}

/// Shape-check a recipient address as typed into a form.
///
/// Rejects empty/whitespace-only input and anything whose trimmed length
/// falls outside the 32-44 character window. Everything else passes — this
/// is deliberately NOT a full Base58 decode, which happens later in
/// [`Pubkey::from_str`] when the transfer is actually built.
pub fn validate_recipient(input: &str) -> Result<(), TxError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TxError::InvalidAddress("recipient address is required".into()));
    }
    if trimmed.len() < MIN_ADDRESS_CHARS || trimmed.len() > MAX_ADDRESS_CHARS {
        return Err(TxError::InvalidAddress(format!(
            "address must be {MIN_ADDRESS_CHARS}-{MAX_ADDRESS_CHARS} characters, got {}",
            trimmed.len()
        )));
    }
    Ok(())
}

/// Middle-truncated display form of an address: `ABCD...WXYZ`.
///
/// Strings too short to truncate are returned unchanged.
pub fn format_address(address: &str) -> String {
    if address.len() < 10 {
        return address.to_string();
    }
    format!("{}...{}", &address[..4], &address[address.len() - 4..])
}
