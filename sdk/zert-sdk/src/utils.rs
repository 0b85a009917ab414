use num_bigint::BigUint;
use num_traits::Zero;

//=============================================================================
// Unit Conversion
//=============================================================================

/// `10^decimals` as an unbounded integer
pub fn unit_scale(decimals: u8) -> BigUint {
    BigUint::from(10u32).pow(u32::from(decimals))
}

/// Parse a human decimal amount into smallest units.
///
/// Fraction digits beyond `decimals` are truncated. Returns `None` for
/// negative, empty or otherwise non-numeric input.
pub fn parse_units(amount: &str, decimals: u8) -> Option<BigUint> {
    let amount = amount.trim();
    let amount = amount.strip_prefix('+').unwrap_or(amount);

    let (whole, fraction) = match amount.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (amount, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let scale = usize::from(decimals);
    let mut fraction_digits: String = fraction.chars().take(scale).collect();
    while fraction_digits.len() < scale {
        fraction_digits.push('0');
    }

    let digits = format!("{}{}", whole, fraction_digits);
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Some(BigUint::zero());
    }
    BigUint::parse_bytes(digits.as_bytes(), 10)
}

/// Render smallest units at full precision, trailing zeros removed
pub fn format_units(raw: &BigUint, decimals: u8) -> String {
    let (whole, fraction) = split_units(raw, decimals, u32::from(decimals));
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole
    } else {
        format!("{}.{}", whole, fraction)
    }
}

/// Render smallest units with precision that adapts to magnitude.
///
/// | value        | fraction digits |
/// |--------------|-----------------|
/// | >= 1000      | 2               |
/// | >= 1         | 4               |
/// | >= 0.01      | 6               |
/// | >= 0.0001    | 8               |
/// | smaller      | `decimals`      |
///
/// Digits are clamped to `[2, decimals]`, always rounded down, and trailing
/// zeros are trimmed but never below two fraction digits.
pub fn format_adaptive(raw: &BigUint, decimals: u8) -> String {
    let one = unit_scale(decimals);
    let precision: u32 = if *raw >= &one * 1000u32 {
        2
    } else if *raw >= one {
        4
    } else if raw * 100u32 >= one {
        6
    } else if raw * 10_000u32 >= one {
        8
    } else {
        u32::from(decimals)
    };

    let max = u32::from(decimals);
    let precision = precision.min(max).max(2.min(max));

    let (whole, fraction) = split_units(raw, decimals, precision);
    if precision == 0 {
        return whole;
    }

    let keep = fraction.trim_end_matches('0').len().max(2.min(precision as usize));
    format!("{}.{}", whole, &fraction[..keep])
}

/// Whole part and the first `precision` fraction digits (floored, zero padded)
fn split_units(raw: &BigUint, decimals: u8, precision: u32) -> (String, String) {
    let precision = precision.min(u32::from(decimals));
    let dropped = u32::from(decimals) - precision;
    let truncated = raw / BigUint::from(10u32).pow(dropped);

    let frac_scale = BigUint::from(10u32).pow(precision);
    let whole = &truncated / &frac_scale;
    let fraction = &truncated % &frac_scale;

    let fraction = if precision == 0 {
        String::new()
    } else {
        format!("{:0>width$}", fraction.to_string(), width = precision as usize)
    };
    (whole.to_string(), fraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(v: u64) -> BigUint {
        BigUint::from(v)
    }

    #[test]
    fn parses_decimal_amounts() {
        assert_eq!(parse_units("1.00", 9), Some(big(1_000_000_000)));
        assert_eq!(parse_units("0.5", 6), Some(big(500_000)));
        assert_eq!(parse_units(".25", 2), Some(big(25)));
        assert_eq!(parse_units("12", 0), Some(big(12)));
        assert_eq!(parse_units("0", 9), Some(big(0)));
        assert_eq!(parse_units(" 3. ", 1), Some(big(30)));
    }

    #[test]
    fn extra_fraction_digits_are_truncated() {
        assert_eq!(parse_units("1.123456789", 6), Some(big(1_123_456)));
        assert_eq!(parse_units("0.0000009", 6), Some(big(0)));
    }

    #[test]
    fn rejects_non_amounts() {
        for input in ["", ".", "-5", "1e9", "abc", "1.2.3", "1_000"] {
            assert_eq!(parse_units(input, 9), None, "{input}");
        }
    }

    #[test]
    fn parses_beyond_u64() {
        let parsed = parse_units("100000000000000000000", 9).unwrap();
        assert_eq!(parsed.to_string(), "100000000000000000000000000000");
    }

    #[test]
    fn full_precision_rendering() {
        assert_eq!(format_units(&big(1_500_000_000), 9), "1.5");
        assert_eq!(format_units(&big(1), 6), "0.000001");
        assert_eq!(format_units(&big(42), 0), "42");
        assert_eq!(format_units(&big(0), 9), "0");
    }

    #[test]
    fn adaptive_rendering_follows_magnitude() {
        // 1234.56789 -> two digits, floored
        assert_eq!(format_adaptive(&big(1_234_567_890_000), 9), "1234.56");
        // 1.23456789 -> four digits
        assert_eq!(format_adaptive(&big(1_234_567_890), 9), "1.2345");
        // 0.0025 -> eight digits then trimmed
        assert_eq!(format_adaptive(&big(2_500_000), 9), "0.0025");
        // 0.00000123 -> all nine digits
        assert_eq!(format_adaptive(&big(1_230), 9), "0.00000123");
        // never fewer than two fraction digits
        assert_eq!(format_adaptive(&big(5_000_000_000), 9), "5.00");
    }

    #[test]
    fn adaptive_rendering_respects_small_decimals() {
        assert_eq!(format_adaptive(&big(12_345), 2), "123.45");
        assert_eq!(format_adaptive(&big(7), 0), "7");
        assert_eq!(format_adaptive(&big(2_500), 6), "0.0025");
    }
}
