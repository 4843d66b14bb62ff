//! Byte-size arguments.
//!
//! Accepted forms: a plain decimal count (`262144`), a count with a binary
//! unit (`256K`, `256Ki`, `256KiB`, `2M`, `1g`), or a left shift (`1<<18`).
//! Spaces and a leading `+` are ignored. Results must fit in 32 bits.

use thiserror::Error;

/// Why a size argument was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseSizeError {
    /// No digits before the unit or shift
    #[error("expected a number")]
    NoDigits,
    /// Trailing characters that are neither a unit nor a shift
    #[error("unexpected '{0}'")]
    BadSuffix(String),
    /// Shift amount not a number in 0..=31
    #[error("invalid shift amount '{0}'")]
    BadShift(String),
    /// Value does not fit in 32 bits
    #[error("value too large")]
    Overflow,
}

/// Parse a byte size.
///
/// # Errors
///
/// Returns an error for malformed input or values above `u32::MAX`.
pub fn parse_byte_size(input: &str) -> Result<u32, ParseSizeError> {
    let compact: String = input.chars().filter(|c| *c != ' ').collect();
    let s = compact.strip_prefix('+').unwrap_or(&compact);

    let digits_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, suffix) = s.split_at(digits_end);
    if digits.is_empty() {
        return Err(ParseSizeError::NoDigits);
    }
    let value: u64 = digits.parse().map_err(|_| ParseSizeError::Overflow)?;

    let shift = if suffix.is_empty() {
        0
    } else if let Some(amount) = suffix.strip_prefix("<<") {
        match amount.parse::<u32>() {
            Ok(n) if n <= 31 => n,
            _ => return Err(ParseSizeError::BadShift(amount.to_string())),
        }
    } else {
        unit_shift(suffix).ok_or_else(|| ParseSizeError::BadSuffix(suffix.to_string()))?
    };

    value
        .checked_shl(shift)
        .and_then(|v| u32::try_from(v).ok())
        .filter(|v| u64::from(*v) >> shift == value)
        .ok_or(ParseSizeError::Overflow)
}

/// Shift for a unit suffix such as `K`, `Mi` or `GiB`.
fn unit_shift(suffix: &str) -> Option<u32> {
    let mut chars = suffix.chars();
    let shift = match chars.next()? {
        'K' | 'k' => 10,
        'M' | 'm' => 20,
        'G' | 'g' => 30,
        _ => return None,
    };
    let rest = chars.as_str();
    let rest = rest.strip_prefix('i').unwrap_or(rest);
    match rest {
        "" | "b" | "B" => Some(shift),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equivalent_spellings() {
        for s in ["256Ki", "256K", "262144", "1<<18", "256KiB", "256kb", " 256 K", "+262144"] {
            assert_eq!(parse_byte_size(s), Ok(262_144), "{s}");
        }
    }

    #[test]
    fn units() {
        assert_eq!(parse_byte_size("2M"), Ok(2 << 20));
        assert_eq!(parse_byte_size("2G"), Ok(2 << 30));
        assert_eq!(parse_byte_size("0"), Ok(0));
    }

    #[test]
    fn overflow() {
        assert_eq!(parse_byte_size("4G"), Err(ParseSizeError::Overflow));
        assert_eq!(parse_byte_size("3<<31"), Err(ParseSizeError::Overflow));
        assert_eq!(parse_byte_size("99999999999"), Err(ParseSizeError::Overflow));
        assert_eq!(parse_byte_size("4294967295"), Ok(u32::MAX));
    }

    #[test]
    fn malformed() {
        assert_eq!(parse_byte_size(""), Err(ParseSizeError::NoDigits));
        assert_eq!(parse_byte_size("K"), Err(ParseSizeError::NoDigits));
        assert!(matches!(parse_byte_size("12T"), Err(ParseSizeError::BadSuffix(_))));
        assert!(matches!(parse_byte_size("1<<32"), Err(ParseSizeError::BadShift(_))));
        assert!(matches!(parse_byte_size("1<18"), Err(ParseSizeError::BadSuffix(_))));
        assert!(matches!(parse_byte_size("1KiX"), Err(ParseSizeError::BadSuffix(_))));
    }
}
