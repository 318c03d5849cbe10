//! Fixed-point scaled integer arithmetic.
//!
//! Prices and quantities are represented as `i64` values scaled by the
//! symbol's `price_scale` / `quantity_scale` decimal places. All arithmetic
//! is integer arithmetic; overflow at any step is a hard error, never a
//! wrap or a silent saturation.

use crate::errors::NumericError;

/// Largest scale for which `10^scale` fits in an `i64`.
pub const MAX_SCALE: u32 = 18;

/// Compute `10^scale` as an `i64`, rejecting scales that would overflow.
pub fn pow10(scale: u32) -> Result<i64, NumericError> {
    if scale > MAX_SCALE {
        return Err(NumericError::InvalidScale { scale });
    }
    let mut v: i64 = 1;
    for _ in 0..scale {
        v = v
            .checked_mul(10)
            .ok_or(NumericError::InvalidScale { scale })?;
    }
    Ok(v)
}

/// Parse a positive decimal string into a fixed-scale `i64`.
///
/// Example: `parse_scaled("12.34", 4)` → `123400`.
///
/// Rules: a single leading `+` is stripped; a leading `-` is rejected; at
/// most one `.`; the fractional part may not exceed `scale` digits; the
/// result must fit `i64` and be strictly positive.
pub fn parse_scaled(value: &str, scale: u32) -> Result<i64, NumericError> {
    let mut s = value.trim();
    if s.is_empty() {
        return Err(NumericError::Empty);
    }
    if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }
    if s.starts_with('-') {
        return Err(NumericError::NonPositive);
    }

    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => {
            if f.is_empty() || f.contains('.') {
                return Err(NumericError::InvalidFormat);
            }
            (if i.is_empty() { "0" } else { i }, f)
        }
        None => (s, ""),
    };

    if frac_part.len() as u32 > scale {
        return Err(NumericError::TooManyDecimals { max: scale });
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(NumericError::InvalidDigits);
    }

    let scale_pow = pow10(scale)?;
    let int_val: i64 = int_part.parse().map_err(|_| NumericError::Overflow)?;
    let mut scaled = int_val
        .checked_mul(scale_pow)
        .ok_or(NumericError::Overflow)?;

    if !frac_part.is_empty() {
        // Right-pad the fractional digits out to the full scale.
        let pad = scale as usize - frac_part.len();
        let mut frac_owned = String::with_capacity(scale as usize);
        frac_owned.push_str(frac_part);
        for _ in 0..pad {
            frac_owned.push('0');
        }
        let frac_val: i64 = frac_owned.parse().map_err(|_| NumericError::Overflow)?;
        scaled = scaled.checked_add(frac_val).ok_or(NumericError::Overflow)?;
    }

    if scaled <= 0 {
        return Err(NumericError::NonPositive);
    }
    Ok(scaled)
}

/// Format a scaled `i64` as a canonical decimal string.
///
/// Trailing zeros in the fraction are trimmed; a zero fraction is dropped
/// entirely.
pub fn format_scaled(v: i64, scale: u32) -> String {
    if scale == 0 {
        return v.to_string();
    }
    let scale_pow = match pow10(scale) {
        Ok(p) => p,
        Err(_) => return v.to_string(),
    };
    let (sign, abs) = if v < 0 { ("-", -v) } else { ("", v) };
    let int_part = abs / scale_pow;
    let frac_part = abs % scale_pow;
    if frac_part == 0 {
        return format!("{}{}", sign, int_part);
    }
    let frac = format!("{:0width$}", frac_part, width = scale as usize);
    let frac = frac.trim_end_matches('0');
    format!("{}{}.{}", sign, int_part, frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pow10_values() {
        assert_eq!(pow10(0).unwrap(), 1);
        assert_eq!(pow10(6).unwrap(), 1_000_000);
        assert_eq!(pow10(18).unwrap(), 1_000_000_000_000_000_000);
        assert!(pow10(19).is_err());
    }

    #[test]
    fn test_parse_scaled_basic() {
        assert_eq!(parse_scaled("12.34", 4).unwrap(), 123_400);
        assert_eq!(parse_scaled("1", 6).unwrap(), 1_000_000);
        assert_eq!(parse_scaled("0.000001", 6).unwrap(), 1);
        assert_eq!(parse_scaled(".5", 2).unwrap(), 50);
    }

    #[test]
    fn test_parse_scaled_leading_plus() {
        assert_eq!(parse_scaled("+3.5", 2).unwrap(), 350);
    }

    #[test]
    fn test_parse_scaled_rejects_negative() {
        assert_eq!(parse_scaled("-1", 2), Err(NumericError::NonPositive));
    }

    #[test]
    fn test_parse_scaled_rejects_zero() {
        assert_eq!(parse_scaled("0", 6), Err(NumericError::NonPositive));
        assert_eq!(parse_scaled("0.0", 6), Err(NumericError::NonPositive));
    }

    #[test]
    fn test_parse_scaled_rejects_bad_format() {
        assert_eq!(parse_scaled("", 2), Err(NumericError::Empty));
        assert_eq!(parse_scaled("1.2.3", 2), Err(NumericError::InvalidFormat));
        assert_eq!(parse_scaled("1.", 2), Err(NumericError::InvalidFormat));
        assert_eq!(parse_scaled("a.b", 2), Err(NumericError::InvalidDigits));
        assert_eq!(parse_scaled("1,5", 2), Err(NumericError::InvalidDigits));
    }

    #[test]
    fn test_parse_scaled_rejects_excess_precision() {
        assert_eq!(
            parse_scaled("1.234", 2),
            Err(NumericError::TooManyDecimals { max: 2 })
        );
    }

    #[test]
    fn test_parse_scaled_overflow() {
        assert_eq!(
            parse_scaled("92233720368547758.08", 6),
            Err(NumericError::Overflow)
        );
    }

    #[test]
    fn test_format_scaled_trims_trailing_zeros() {
        assert_eq!(format_scaled(123_400, 4), "12.34");
        assert_eq!(format_scaled(1_000_000, 6), "1");
        assert_eq!(format_scaled(1, 6), "0.000001");
        assert_eq!(format_scaled(1_500_000, 6), "1.5");
    }

    #[test]
    fn test_format_scaled_zero_scale() {
        assert_eq!(format_scaled(42, 0), "42");
    }

    #[test]
    fn test_format_scaled_negative() {
        assert_eq!(format_scaled(-1_500_000, 6), "-1.5");
    }

    #[test]
    fn test_parse_format_roundtrip() {
        for s in ["1", "0.5", "43000", "12.345678"] {
            let v = parse_scaled(s, 6).unwrap();
            assert_eq!(format_scaled(v, 6), s);
        }
    }
}
