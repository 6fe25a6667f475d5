// 💵 Currency Precision
// All monetary comparisons happen at cent resolution, never on raw f64 equality.

/// Convert a currency amount to whole cents (half away from zero)
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Round an amount to the nearest cent
pub fn round_cents(amount: f64) -> f64 {
    to_cents(amount) as f64 / 100.0
}

/// Line amount: rate × hours, rounded to cents
pub fn line_amount(rate: f64, hours: f64) -> f64 {
    round_cents(rate * hours)
}

/// Equal at cent resolution; a one-cent difference is a mismatch
pub fn amounts_equal(a: f64, b: f64) -> bool {
    to_cents(a) == to_cents(b)
}

/// Strictly greater at cent resolution
pub fn exceeds(billed: f64, contracted: f64) -> bool {
    to_cents(billed) > to_cents(contracted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_cents_rounding() {
        assert_eq!(to_cents(7750.0), 775_000);
        assert_eq!(to_cents(0.1 + 0.2), 30);
        assert_eq!(to_cents(-45.999), -4600);
    }

    #[test]
    fn test_line_amount() {
        assert_eq!(line_amount(700.0, 5.0), 3500.0);
        assert_eq!(line_amount(425.0, 2.5), 1062.5);
        assert_eq!(line_amount(333.33, 0.3), 100.0);
    }

    #[test]
    fn test_amounts_equal_ignores_float_noise() {
        let sum = 0.1 + 0.2;
        assert!(amounts_equal(sum, 0.3));
        assert!(amounts_equal(1062.5, 425.0 * 2.5));
        assert!(!amounts_equal(7750.0, 7749.0));
        assert!(!amounts_equal(100.00, 100.01));
    }

    #[test]
    fn test_exceeds_is_strict() {
        assert!(exceeds(700.0, 650.0));
        assert!(!exceeds(650.0, 650.0));
        assert!(!exceeds(650.004, 650.0));
        assert!(!exceeds(600.0, 650.0));
    }
}
