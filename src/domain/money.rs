use std::fmt;

/// Amounts are plain decimal values in a single, unnamed currency.
/// Arithmetic stays in `f64`; only results shown to people are rounded to cents.
pub type Amount = f64;

/// Round to 2 decimal places, half away from zero.
/// Example: 0.005 -> 0.01, -0.005 -> -0.01, -0.001 -> 0.0
pub fn round_to_cents(amount: Amount) -> Amount {
    let rounded = (amount * 100.0).round() / 100.0;
    // -0.0 compares equal to 0.0; keep the positive one so output never shows "-0.00"
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Format an amount as a human-readable string with two decimals.
/// Example: 50.0 -> "50.00", -12.345 -> "-12.35"
pub fn format_amount(amount: Amount) -> String {
    format!("{:.2}", round_to_cents(amount))
}

/// Parse a decimal string into an amount.
/// Example: "50.00" -> 50.0, "12.5" -> 12.5, "100" -> 100.0
pub fn parse_amount(input: &str) -> Result<Amount, ParseAmountError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseAmountError::InvalidFormat);
    }

    let valid_chars = input
        .trim_start_matches('-')
        .chars()
        .all(|c| c.is_ascii_digit() || c == '.');
    if !valid_chars || input.matches('.').count() > 1 {
        return Err(ParseAmountError::InvalidFormat);
    }

    let amount: Amount = input
        .parse()
        .map_err(|_| ParseAmountError::InvalidFormat)?;
    if !amount.is_finite() {
        return Err(ParseAmountError::NotFinite);
    }
    Ok(amount)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    InvalidFormat,
    NotFinite,
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAmountError::InvalidFormat => write!(f, "invalid money format"),
            ParseAmountError::NotFinite => write!(f, "amount is not a finite number"),
        }
    }
}

impl std::error::Error for ParseAmountError {}
