//! Argument handling shared by deploy, call and send

use std::collections::HashMap;

use alloy::primitives::{utils::parse_units, U256};
use color_eyre::eyre::{eyre, Result};
use console::style;
use kiln_core::{ArgSpec, CoercionPolicy, Primitive, TransactionOutcome, TxStage};

/// Split `key=value` pairs given with `--arg`
pub(crate) fn parse_named(pairs: &[String]) -> Result<HashMap<String, String>> {
    let mut named = HashMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| eyre!("--arg expects name=value, got '{}'", pair))?;
        if named.insert(key.trim().to_string(), value.to_string()).is_some() {
            return Err(eyre!("argument '{}' given twice", key.trim()));
        }
    }
    Ok(named)
}

/// Coerce either named (`--arg`) or positional values against `specs`
pub(crate) fn coerce_args(
    policy: CoercionPolicy,
    specs: &[ArgSpec],
    named: &[String],
    positional: &[String],
) -> Result<Vec<Primitive>> {
    if !named.is_empty() && !positional.is_empty() {
        return Err(eyre!("give arguments either positionally or with --arg, not both"));
    }

    if named.is_empty() {
        Ok(policy.coerce_positional(specs, positional)?)
    } else {
        let named = parse_named(named)?;
        if let Some(unknown) = named.keys().find(|k| !specs.iter().any(|s| &s.label == *k)) {
            return Err(eyre!("unknown argument '{}'", unknown));
        }
        Ok(policy.coerce(specs, &named)?)
    }
}

/// Native value: plain wei or a number with a unit, e.g. `0.5ether`, `10gwei`
pub(crate) fn parse_value(raw: &str) -> Result<U256> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(raw.len());
    let (amount, unit) = raw.split_at(split);
    let unit = if unit.is_empty() { "wei" } else { unit };

    let parsed = parse_units(amount.trim(), unit)
        .map_err(|e| eyre!("invalid value '{}': {}", raw, e))?;
    if parsed.is_negative() {
        return Err(eyre!("invalid value '{}': must not be negative", raw));
    }
    Ok(parsed.get_absolute())
}

/// Salt as hex, at most 32 bytes
pub(crate) fn parse_salt(raw: &str) -> Result<Vec<u8>> {
    let bytes = hex::decode(raw.trim().trim_start_matches("0x"))
        .map_err(|e| eyre!("salt must be hex: {}", e))?;
    if bytes.len() > 32 {
        return Err(eyre!("salt must be at most 32 bytes, got {}", bytes.len()));
    }
    Ok(bytes)
}

/// Print one lifecycle stage
pub(crate) fn print_outcome(outcome: &TransactionOutcome) {
    let symbol = match outcome.stage {
        TxStage::Finalized => style("✓").green().bold(),
        TxStage::Failed => style("✗").red().bold(),
        TxStage::InBlock => style("◆").cyan(),
        _ => style("→").blue(),
    };
    println!(
        "{} {:<18} {}",
        symbol,
        style(outcome.stage).bold(),
        outcome.detail
    );
}
