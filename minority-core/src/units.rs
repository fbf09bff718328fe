use crate::error::{MinorityError, Result};
use crate::types::Wei;

pub const GWEI: Wei = 1_000_000_000;
pub const ETHER: Wei = 1_000_000_000_000_000_000;

/// Parse a decimal amount with `decimals` fractional digits into base units.
pub fn parse_units(value: &str, decimals: u32) -> Result<Wei> {
    let value = value.trim();
    if value.is_empty() {
        return Err(MinorityError::invalid_amount("empty amount"));
    }

    let (whole, frac) = match value.split_once('.') {
        Some((w, f)) => (w, f),
        None => (value, ""),
    };

    if frac.len() > decimals as usize {
        return Err(MinorityError::invalid_amount(format!(
            "'{}' has more than {} decimal places",
            value, decimals
        )));
    }
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(whole) || !all_digits(frac) || (whole.is_empty() && frac.is_empty()) {
        return Err(MinorityError::invalid_amount(format!("'{}' is not a number", value)));
    }

    let scale = 10u128.pow(decimals);
    let whole: Wei = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| MinorityError::invalid_amount(format!("'{}' is too large", value)))?
    };
    let frac_padded = format!("{:0<width$}", frac, width = decimals as usize);
    let frac: Wei = if frac_padded.is_empty() {
        0
    } else {
        frac_padded
            .parse()
            .map_err(|_| MinorityError::invalid_amount(format!("'{}' is invalid", value)))?
    };

    whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(|| MinorityError::invalid_amount(format!("'{}' overflows", value)))
}

pub fn parse_ether(value: &str) -> Result<Wei> {
    parse_units(value, 18)
}

pub fn parse_gwei(value: &str) -> Result<Wei> {
    parse_units(value, 9)
}

/// Render base units as a decimal string, trimming trailing zeros.
pub fn format_units(value: Wei, decimals: u32) -> String {
    let scale = 10u128.pow(decimals);
    let whole = value / scale;
    let frac = value % scale;
    if frac == 0 {
        return format!("{}.0", whole);
    }
    let frac = format!("{:0>width$}", frac, width = decimals as usize);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

pub fn format_ether(value: Wei) -> String {
    format_units(value, 18)
}

pub fn format_gwei(value: Wei) -> String {
    format_units(value, 9)
}
