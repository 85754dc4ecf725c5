//! Solana transaction primitives for an externally-signed wallet flow.
//!
//! This crate builds *unsigned* native SOL transfers in Solana's compact
//! wire format and splices in detached signatures produced elsewhere (a
//! browser wallet extension, a hardware device, a test keypair). It never
//! holds a private key.
//!
//! It also carries the pure input validators the transfer form and the
//! submission path share: recipient shape checks and decimal-amount
//! parsing with floor rounding to lamports.

pub mod address;
pub mod amount;
pub mod error;
pub mod transaction;

// Re-export key public types for ergonomic imports.
pub use address::{format_address, validate_recipient, Pubkey};
pub use amount::{
    format_sol, lamports_to_sol, sol_to_lamports, validate_amount, LAMPORTS_PER_SOL,
};
pub use error::TxError;
pub use transaction::{
    decode_compact_u16, encode_compact_u16, AccountMeta, Blockhash, CompiledInstruction,
    Instruction, SignedTransaction, UnsignedTransaction, SIGNATURE_BYTES, SYSTEM_PROGRAM_ID,
};
