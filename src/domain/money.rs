use std::fmt;

/// Money is represented as integer cents to avoid floating-point drift.
/// 1 currency unit = 100 cents, so a 500.00 deposit is 50000 cents.
pub type Cents = i64;

/// Format cents as a human-readable amount string.
/// Example: 50000 -> "500.00", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parse a decimal amount string into cents.
/// Accepts up to two decimal places; extra digits are truncated.
/// Example: "500" -> 50000, "12.5" -> 1250, "0.01" -> 1
pub fn parse_cents(input: &str) -> Result<Cents, ParseAmountError> {
    let input = input.trim();
    let negative = input.starts_with('-');
    let input = input.trim_start_matches('-');
    if input.is_empty() {
        return Err(ParseAmountError::InvalidFormat);
    }

    let (units_str, decimal_str) = match input.split_once('.') {
        None => (input, ""),
        Some((units, decimals)) => {
            if decimals.contains('.') {
                return Err(ParseAmountError::InvalidFormat);
            }
            (units, decimals)
        }
    };

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str
            .parse()
            .map_err(|_| ParseAmountError::InvalidFormat)?
    };

    let decimal_cents: i64 = match decimal_str.len() {
        0 => 0,
        1 => {
            // A single digit like "5" means 50 cents
            decimal_str
                .parse::<i64>()
                .map_err(|_| ParseAmountError::InvalidFormat)?
                * 10
        }
        // Truncate to two digits; get() refuses a slice that would split
        // a multi-byte character.
        _ => decimal_str
            .get(..2)
            .ok_or(ParseAmountError::InvalidFormat)?
            .parse()
            .map_err(|_| ParseAmountError::InvalidFormat)?,
    };

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(decimal_cents))
        .ok_or(ParseAmountError::InvalidFormat)?;
    Ok(if negative { -cents } else { cents })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    InvalidFormat,
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAmountError::InvalidFormat => write!(f, "invalid amount format"),
        }
    }
}

impl std::error::Error for ParseAmountError {}
