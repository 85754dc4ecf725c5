//! SOL amount parsing, validation, and display formatting.
//!
//! On-chain amounts are lamports (1 SOL = 10^9 lamports). User input
//! arrives as a decimal string and is scaled with floor rounding: any
//! fraction below one lamport is dropped, matching the display precision.

use crate::error::TxError;

/// Lamports per whole SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Validate a transfer amount as typed into a form.
///
/// Accepts any positive finite decimal; rejects empty input, non-numbers,
/// and values ≤ 0.
pub fn validate_amount(input: &str) -> Result<(), TxError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TxError::InvalidAmount("amount is required".into()));
    }

    let value: f64 = trimmed
        .parse()
        .map_err(|_| TxError::InvalidAmount("amount must be a number".into()))?;

    if !value.is_finite() {
        return Err(TxError::InvalidAmount("amount must be a number".into()));
    }
    if value <= 0.0 {
        return Err(TxError::InvalidAmount("amount must be greater than 0".into()));
    }

    Ok(())
}

/// Convert a decimal SOL string to lamports, flooring sub-lamport remainders.
///
/// `"1.5"` becomes `1_500_000_000`; `"0.0000000009"` floors to `0`. Callers
/// that need a spendable amount must still reject a zero result.
pub fn sol_to_lamports(input: &str) -> Result<u64, TxError> {
    validate_amount(input)?;

    let sol: f64 = input
        .trim()
        .parse()
        .map_err(|_| TxError::InvalidAmount("amount must be a number".into()))?;
    let lamports = (sol * LAMPORTS_PER_SOL as f64).floor();
    if lamports > u64::MAX as f64 {
        return Err(TxError::InvalidAmount("amount exceeds the representable range".into()));
    }

    Ok(lamports as u64)
}

/// Convert lamports to a display SOL value.
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// Format lamports as a SOL string with 2-9 decimal places.
///
/// Uses integer arithmetic so display never picks up float noise: trailing
/// zeros are trimmed from the 9-digit fraction, keeping at least two.
pub fn format_sol(lamports: u64) -> String {
    let whole = lamports / LAMPORTS_PER_SOL;
    let frac = lamports % LAMPORTS_PER_SOL;

    let mut digits = format!("{frac:09}");
    while digits.len() > 2 && digits.ends_with('0') {
        digits.pop();
    }

    format!("{whole}.{digits}")
}
