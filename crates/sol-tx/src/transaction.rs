//! Unsigned Solana transactions in compact wire format.
//!
//! The layout a node expects on `sendTransaction`:
//!
//! ```text
//! Transaction:
//!   num_signatures          compact-u16
//!   signatures              64 bytes * num_signatures
//!   message:
//!     num_required_sigs     u8
//!     num_readonly_signed   u8
//!     num_readonly_unsigned u8
//!     num_accounts          compact-u16
//!     account_keys          32 bytes * num_accounts
//!     recent_blockhash      32 bytes
//!     num_instructions      compact-u16
//!     instructions[]        program index, account indices, opaque data
//! ```
//!
//! This module stops at the signature boundary: it produces the message
//! bytes and an all-zero signature section, and [`UnsignedTransaction::signed`]
//! splices in a detached 64-byte signature obtained from the wallet
//! provider. Key custody stays entirely outside this crate.

use std::fmt;
use std::str::FromStr;

use crate::address::{Pubkey, PUBKEY_BYTES};
use crate::error::TxError;

/// The System Program: 32 zero bytes, `11111111111111111111111111111111`.
pub const SYSTEM_PROGRAM_ID: Pubkey = Pubkey::new([0u8; PUBKEY_BYTES]);

/// System Program `Transfer` instruction index (little-endian u32).
const SYSTEM_TRANSFER_INDEX: u32 = 2;

/// Length of an Ed25519 signature.
pub const SIGNATURE_BYTES: usize = 64;

// ---------------------------------------------------------------------------
// Compact-u16 encoding
// ---------------------------------------------------------------------------

/// Encode a value in Solana's compact-u16 format (1-3 bytes, 7 bits per
/// byte, high bit marks continuation).
pub fn encode_compact_u16(value: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(3);
    let mut rem = u32::from(value);
    while rem >= 0x80 {
        out.push((rem as u8 & 0x7f) | 0x80);
        rem >>= 7;
    }
    out.push(rem as u8);
    out
}

/// Decode a compact-u16, returning `(value, bytes_consumed)`.
pub fn decode_compact_u16(data: &[u8]) -> Result<(u16, usize), TxError> {
    let mut value: u32 = 0;
    for (i, &byte) in data.iter().enumerate().take(3) {
        value |= u32::from(byte & 0x7f) << (7 * i as u32);
        if byte & 0x80 == 0 {
            if value > u32::from(u16::MAX) {
                return Err(TxError::Serialization("compact-u16 overflow".into()));
            }
            return Ok((value as u16, i + 1));
        }
    }
    Err(TxError::Serialization("truncated compact-u16".into()))
}

// ---------------------------------------------------------------------------
// Blockhash
// ---------------------------------------------------------------------------

/// A recent blockhash: a short-lived reference to ledger state that every
/// transaction must cite to be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blockhash([u8; 32]);

impl Blockhash {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for Blockhash {
    type Err = TxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| TxError::Serialization(format!("bad blockhash: {e}")))?;
        let arr: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            TxError::Serialization(format!("bad blockhash: expected 32 bytes, got {}", v.len()))
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Display for Blockhash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(&self.0).into_string())
    }
}

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

/// A single account reference within an instruction.
#[derive(Debug, Clone)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

/// An instruction before compilation into a transaction.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

/// An instruction with account references replaced by u8 indices into the
/// transaction's key table.
#[derive(Debug, Clone)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub account_indices: Vec<u8>,
    pub data: Vec<u8>,
}

/// Build a System Program `Transfer` instruction.
fn system_transfer(from: Pubkey, to: Pubkey, lamports: u64) -> Instruction {
    // Data: u32 LE instruction index (2 = Transfer) + u64 LE lamports.
    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_TRANSFER_INDEX.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());

    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![
            AccountMeta {
                pubkey: from,
                is_signer: true,
                is_writable: true,
            },
            AccountMeta {
                pubkey: to,
                is_signer: false,
                is_writable: true,
            },
        ],
        data,
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// A compiled transaction awaiting its fee payer's signature.
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    account_keys: Vec<Pubkey>,
    num_required_signatures: u8,
    num_readonly_signed: u8,
    num_readonly_unsigned: u8,
    recent_blockhash: Blockhash,
    instructions: Vec<CompiledInstruction>,
}

impl UnsignedTransaction {
    /// Build a native SOL transfer of `lamports` from `from` to `to`, with
    /// `from` as fee payer, bound to `recent_blockhash`.
    pub fn transfer(
        from: Pubkey,
        to: Pubkey,
        lamports: u64,
        recent_blockhash: Blockhash,
    ) -> Result<Self, TxError> {
        if lamports == 0 {
            return Err(TxError::InvalidAmount("amount must be greater than 0".into()));
        }
        Self::compile(&[system_transfer(from, to, lamports)], from, recent_blockhash)
    }

    /// Compile instructions into a transaction with a single fee payer.
    ///
    /// Account keys land in canonical order (writable signers, read-only
    /// signers, writable non-signers, read-only non-signers) with the fee
    /// payer at index 0.
    pub fn compile(
        instructions: &[Instruction],
        fee_payer: Pubkey,
        recent_blockhash: Blockhash,
    ) -> Result<Self, TxError> {
        struct Entry {
            pubkey: Pubkey,
            is_signer: bool,
            is_writable: bool,
        }

        fn upsert(entries: &mut Vec<Entry>, pubkey: Pubkey, is_signer: bool, is_writable: bool) {
            match entries.iter_mut().find(|e| e.pubkey == pubkey) {
                Some(entry) => {
                    entry.is_signer |= is_signer;
                    entry.is_writable |= is_writable;
                }
                None => entries.push(Entry {
                    pubkey,
                    is_signer,
                    is_writable,
                }),
            }
        }

        // Fee payer first; the stable sort below keeps it at index 0.
        let mut entries = vec![Entry {
            pubkey: fee_payer,
            is_signer: true,
            is_writable: true,
        }];

        for ix in instructions {
            for meta in &ix.accounts {
                upsert(&mut entries, meta.pubkey, meta.is_signer, meta.is_writable);
            }
            // Program IDs are read-only non-signers.
            upsert(&mut entries, ix.program_id, false, false);
        }

        entries.sort_by_key(|e| match (e.is_signer, e.is_writable) {
            (true, true) => 0u8,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        });

        let num_required_signatures = entries.iter().filter(|e| e.is_signer).count() as u8;
        let num_readonly_signed = entries
            .iter()
            .filter(|e| e.is_signer && !e.is_writable)
            .count() as u8;
        let num_readonly_unsigned = entries
            .iter()
            .filter(|e| !e.is_signer && !e.is_writable)
            .count() as u8;

        let account_keys: Vec<Pubkey> = entries.iter().map(|e| e.pubkey).collect();

        let index_of = |key: Pubkey| -> Result<u8, TxError> {
            account_keys
                .iter()
                .position(|k| *k == key)
                .map(|i| i as u8)
                .ok_or_else(|| TxError::Build("account missing from key table".into()))
        };

        let mut compiled = Vec::with_capacity(instructions.len());
        for ix in instructions {
            let mut account_indices = Vec::with_capacity(ix.accounts.len());
            for meta in &ix.accounts {
                account_indices.push(index_of(meta.pubkey)?);
            }
            compiled.push(CompiledInstruction {
                program_id_index: index_of(ix.program_id)?,
                account_indices,
                data: ix.data.clone(),
            });
        }

        Ok(Self {
            account_keys,
            num_required_signatures,
            num_readonly_signed,
            num_readonly_unsigned,
            recent_blockhash,
            instructions: compiled,
        })
    }

    /// The fee payer (always the first account key).
    pub fn fee_payer(&self) -> Pubkey {
        self.account_keys[0]
    }

    pub fn account_keys(&self) -> &[Pubkey] {
        &self.account_keys
    }

    pub fn num_required_signatures(&self) -> u8 {
        self.num_required_signatures
    }

    pub fn recent_blockhash(&self) -> Blockhash {
        self.recent_blockhash
    }

    pub fn instructions(&self) -> &[CompiledInstruction] {
        &self.instructions
    }

    /// Serialize the message — the exact bytes the wallet provider signs.
    pub fn message_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);

        buf.push(self.num_required_signatures);
        buf.push(self.num_readonly_signed);
        buf.push(self.num_readonly_unsigned);

        buf.extend_from_slice(&encode_compact_u16(self.account_keys.len() as u16));
        for key in &self.account_keys {
            buf.extend_from_slice(key.as_bytes());
        }

        buf.extend_from_slice(self.recent_blockhash.as_bytes());

        buf.extend_from_slice(&encode_compact_u16(self.instructions.len() as u16));
        for ix in &self.instructions {
            buf.push(ix.program_id_index);
            buf.extend_from_slice(&encode_compact_u16(ix.account_indices.len() as u16));
            buf.extend_from_slice(&ix.account_indices);
            buf.extend_from_slice(&encode_compact_u16(ix.data.len() as u16));
            buf.extend_from_slice(&ix.data);
        }

        buf
    }

    /// Full wire encoding with all signature slots zeroed.
    pub fn wire_bytes(&self) -> Vec<u8> {
        let message = self.message_bytes();
        let slots = self.num_required_signatures as usize;

        let mut wire = Vec::with_capacity(3 + slots * SIGNATURE_BYTES + message.len());
        wire.extend_from_slice(&encode_compact_u16(self.num_required_signatures as u16));
        wire.resize(wire.len() + slots * SIGNATURE_BYTES, 0);
        wire.extend_from_slice(&message);
        wire
    }

    /// Splice the fee payer's detached signature into slot 0 and produce
    /// the broadcast-ready transaction.
    pub fn signed(&self, fee_payer_signature: &[u8; SIGNATURE_BYTES]) -> SignedTransaction {
        let mut wire = self.wire_bytes();
        let offset = encode_compact_u16(self.num_required_signatures as u16).len();
        wire[offset..offset + SIGNATURE_BYTES].copy_from_slice(fee_payer_signature);
        SignedTransaction(wire)
    }
}

/// A fully-serialized signed transaction, ready for `sendTransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction(Vec<u8>);

impl SignedTransaction {
    /// Wrap wire bytes produced elsewhere (e.g. by a provider that signs
    /// and serializes in one step).
    pub fn from_wire(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}
