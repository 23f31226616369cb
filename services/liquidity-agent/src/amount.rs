//! Amount handling utilities for SOL and token decimals

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::{AgentError, Result};

/// Wrapped SOL mint, the quote side of every swap
pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// SOL has 9 decimals (lamports)
pub const SOL_DECIMALS: u8 = 9;

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Largest decimals value whose scale fits in u64
pub const MAX_DECIMALS: u8 = 19;

/// UI amount to raw units, truncating fractions of a raw unit. A positive
/// amount that truncates to zero is rejected.
pub fn to_raw_amount(ui_amount: Decimal, decimals: u8) -> Result<u64> {
    if ui_amount < Decimal::ZERO {
        return Err(AgentError::InvalidAmount(format!(
            "amount cannot be negative: {}",
            ui_amount
        )));
    }

    let overflow = || {
        AgentError::InvalidAmount(format!(
            "amount {} with {} decimals overflows u64",
            ui_amount, decimals
        ))
    };
    let raw = ui_amount
        .checked_mul(decimal_scale(decimals)?)
        .ok_or_else(overflow)?
        .trunc();
    let raw_u64 = raw.to_u64().ok_or_else(overflow)?;

    if raw_u64 == 0 && ui_amount > Decimal::ZERO {
        return Err(AgentError::InvalidAmount(format!(
            "amount {} too small for {} decimals (rounds to 0)",
            ui_amount, decimals
        )));
    }

    Ok(raw_u64)
}

/// Raw units to UI amount
pub fn from_raw_amount(raw_amount: u64, decimals: u8) -> Result<Decimal> {
    Ok(Decimal::from(raw_amount) / decimal_scale(decimals)?)
}

/// `10^decimals`; anything past u64 is not a real mint
fn decimal_scale(decimals: u8) -> Result<Decimal> {
    10u64
        .checked_pow(decimals as u32)
        .map(Decimal::from)
        .ok_or_else(|| AgentError::InvalidAmount(format!("unsupported decimals: {}", decimals)))
}

pub fn sol_to_lamports(sol: Decimal) -> Result<u64> {
    to_raw_amount(sol, SOL_DECIMALS)
}

pub fn lamports_to_sol(lamports: u64) -> Decimal {
    Decimal::from(lamports) / Decimal::from(LAMPORTS_PER_SOL)
}

/// `pct` percent of `amount`
pub fn percent_of(amount: Decimal, pct: u32) -> Decimal {
    amount * Decimal::from(pct) / Decimal::ONE_HUNDRED
}

/// Raw-unit percentage, truncated
pub fn percent_of_raw(raw: u64, pct: u32) -> u64 {
    ((raw as u128 * pct as u128) / 100) as u64
}

/// Abbreviate an address for log lines: `3CNH1A...gYwx`
pub fn short_address(address: &str) -> String {
    if address.len() <= 12 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}
