//! Money math helpers
//!
//! All monetary and point values in the engine are `i64` minor units.
//! Rates (bonus percentages, propagation decay) are `f64` and are only ever
//! applied through the helpers here, so rounding happens in exactly one place.

/// Apply a fractional rate to an integer amount, rounding half away from zero.
///
/// # Example
/// ```
/// use commission_engine_rs::core::money::apply_rate;
///
/// assert_eq!(apply_rate(3000, 1.0), 3000);
/// assert_eq!(apply_rate(3000, 0.10), 300);
/// assert_eq!(apply_rate(15, 0.10), 2); // 1.5 rounds away from zero
/// assert_eq!(apply_rate(-15, 0.10), -2);
/// ```
pub fn apply_rate(amount: i64, rate: f64) -> i64 {
    (amount as f64 * rate).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_rate_identity() {
        assert_eq!(apply_rate(123_456, 1.0), 123_456);
        assert_eq!(apply_rate(0, 0.37), 0);
    }

    #[test]
    fn test_apply_rate_rounding() {
        assert_eq!(apply_rate(100, 0.125), 13); // 12.5 -> 13
        assert_eq!(apply_rate(-100, 0.125), -13);
        assert_eq!(apply_rate(333, 0.10), 33); // 33.3 -> 33
    }
}
