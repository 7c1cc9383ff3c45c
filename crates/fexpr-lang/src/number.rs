//! Numeric attribute values.
//!
//! A `Number` keeps the exact `f64` it was read from and prints the shortest text
//! that parses back to that value, so two numbers print alike only when they are
//! equal. Lookup keys rely on this.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Rem, Sub};

#[derive(Debug, Clone, Copy, Default)]
pub struct Number(f64);

impl Number {
    pub fn new(value: f64) -> Self {
        Number(value)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Parses attribute text such as `" 42 "` or `"1.5"`. Non-finite spellings
    /// (`inf`, `NaN`) are not numbers here.
    pub fn parse(text: &str) -> Option<Self> {
        text.trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Number)
    }

    /// The value as an `i64` when it is integral and representable exactly.
    pub fn as_i64(&self) -> Option<i64> {
        // i64::MAX as f64 rounds up to 2^63, which is already out of range.
        let in_range = self.0 >= i64::MIN as f64 && self.0 < i64::MAX as f64;
        (in_range && self.0.fract() == 0.0).then_some(self.0 as i64)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0.0
    }

    pub fn is_truthy(&self) -> bool {
        !self.is_zero() && !self.0.is_nan()
    }

    pub fn abs(&self) -> Self {
        Number(self.0.abs())
    }

    /// Rounds half away from zero to `digits` decimal places.
    pub fn round(&self, digits: i32) -> Self {
        let factor = 10f64.powi(digits);
        Number((self.0 * factor).round() / factor)
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Number(value.into())
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number(value as f64)
    }
}

impl From<usize> for Number {
    fn from(value: usize) -> Self {
        Number(value as f64)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number(value)
    }
}

impl From<Number> for serde_json::Value {
    /// Integral values become JSON integers; NaN and infinities have no JSON form.
    fn from(n: Number) -> Self {
        match n.as_i64() {
            Some(i) => serde_json::Value::from(i),
            None => serde_json::Number::from_f64(n.0)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            // -0 and 0 are equal, so they print alike.
            write!(f, "0")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Number {}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    /// NaN sorts after every other number and equals itself.
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .partial_cmp(&other.0)
            .unwrap_or_else(|| self.0.is_nan().cmp(&other.0.is_nan()))
    }
}

impl Neg for Number {
    type Output = Self;

    fn neg(self) -> Self {
        Number(-self.0)
    }
}

macro_rules! impl_arithmetic {
    ($($trait:ident :: $method:ident => $op:tt),*) => {
        $(
            impl $trait for Number {
                type Output = Self;

                fn $method(self, other: Self) -> Self {
                    Number(self.0 $op other.0)
                }
            }
        )*
    };
}

impl_arithmetic!(Add::add => +, Sub::sub => -, Mul::mul => *, Div::div => /, Rem::rem => %);

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::integer(42.0, "42")]
    #[case::fraction(42.123, "42.123")]
    #[case::negative(-42.0, "-42")]
    #[case::negative_zero(-0.0, "0")]
    #[case::seven_digits(0.1234567, "0.1234567")]
    #[case::small(0.0000001, "0.0000001")]
    #[case::beyond_i64(1e20, "100000000000000000000")]
    fn test_display_is_exact(#[case] input: f64, #[case] expected: &str) {
        assert_eq!(Number::new(input).to_string(), expected);
    }

    #[rstest]
    #[case::close_fractions(0.1234567, 0.1234571)]
    #[case::large_integers(1e20, 1e21)]
    #[case::beyond_f64_precision(9007199254740992.0, 9007199254740994.0)]
    fn test_distinct_numbers_print_differently(#[case] a: f64, #[case] b: f64) {
        assert_ne!(Number::new(a).to_string(), Number::new(b).to_string());
    }

    #[rstest]
    #[case::fraction(0.1234567)]
    #[case::large(1e20)]
    #[case::negative(-3.75)]
    fn test_display_parses_back(#[case] input: f64) {
        let n = Number::new(input);
        assert_eq!(Number::parse(&n.to_string()), Some(n));
    }

    #[rstest]
    #[case::integer(" 42 ", Some(42.0))]
    #[case::fraction("1.5", Some(1.5))]
    #[case::infinity("inf", None)]
    #[case::nan("NaN", None)]
    #[case::text("parcel", None)]
    fn test_parse(#[case] text: &str, #[case] expected: Option<f64>) {
        assert_eq!(Number::parse(text), expected.map(Number::new));
    }

    #[rstest]
    #[case::integer(42.0, Some(42))]
    #[case::negative(-7.0, Some(-7))]
    #[case::fraction(1.5, None)]
    #[case::beyond_i64(1e20, None)]
    #[case::nan(f64::NAN, None)]
    fn test_as_i64(#[case] input: f64, #[case] expected: Option<i64>) {
        assert_eq!(Number::new(input).as_i64(), expected);
    }

    #[rstest]
    #[case::integer(42.0, serde_json::json!(42))]
    #[case::fraction(1.5, serde_json::json!(1.5))]
    #[case::beyond_i64(1e20, serde_json::json!(1e20))]
    #[case::nan(f64::NAN, serde_json::Value::Null)]
    fn test_to_json(#[case] input: f64, #[case] expected: serde_json::Value) {
        assert_eq!(serde_json::Value::from(Number::new(input)), expected);
    }

    #[rstest]
    #[case(2.346, 2, "2.35")]
    #[case(2.5, 0, "3")]
    #[case(-2.5, 0, "-3")]
    fn test_round(#[case] input: f64, #[case] digits: i32, #[case] expected: &str) {
        assert_eq!(Number::new(input).round(digits).to_string(), expected);
    }

    #[rstest]
    #[case(5.0, 2.0, "7", "3", "10", "2.5", "1")]
    #[case(-5.0, 2.0, "-3", "-7", "-10", "-2.5", "-1")]
    fn test_operations(
        #[case] a: f64,
        #[case] b: f64,
        #[case] add: &str,
        #[case] sub: &str,
        #[case] mul: &str,
        #[case] div: &str,
        #[case] rem: &str,
    ) {
        let (a, b) = (Number::new(a), Number::new(b));

        assert_eq!((a + b).to_string(), add);
        assert_eq!((a - b).to_string(), sub);
        assert_eq!((a * b).to_string(), mul);
        assert_eq!((a / b).to_string(), div);
        assert_eq!((a % b).to_string(), rem);
    }

    #[test]
    fn test_equality_and_order() {
        assert_eq!(Number::new(0.0), Number::new(-0.0));
        assert_eq!(Number::new(f64::NAN), Number::new(f64::NAN));
        assert!(Number::new(f64::NAN) > Number::new(1.0));
        assert!(!Number::new(f64::NAN).is_truthy());
        assert!(!Number::new(-0.0).is_truthy());
    }
}
