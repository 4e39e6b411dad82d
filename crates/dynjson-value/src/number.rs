use std::fmt;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// A JSON number.
///
/// The representation remembers whether the literal was an integer or a
/// floating-point form. Small values use the native 64-bit types; literals
/// with more digits than those can carry exactly are promoted to the
/// arbitrary-precision tiers and keep their digits verbatim.
#[derive(Debug, Clone)]
pub enum Number {
    Int(i64),
    Float(f64),
    BigInt(BigInt),
    BigDec(BigDecimal),
}

impl Number {
    /// Whether the numeric value has no fractional part.
    pub fn is_integral(&self) -> bool {
        match self {
            Number::Int(_) | Number::BigInt(_) => true,
            Number::Float(f) => f.fract() == 0.0,
            Number::BigDec(d) => d.is_integer(),
        }
    }

    /// The value as an `i64`, when exactly representable.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Number::Int(i) => Some(*i),
            Number::Float(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    Some(*f as i64)
                } else {
                    None
                }
            }
            Number::BigInt(i) => i.to_i64(),
            Number::BigDec(d) => {
                if d.is_integer() {
                    d.to_i64()
                } else {
                    None
                }
            }
        }
    }

    /// The value as an `f64`. Lossy for the arbitrary-precision tiers.
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Int(i) => *i as f64,
            Number::Float(f) => *f,
            Number::BigInt(i) => i.to_f64().unwrap_or(f64::INFINITY),
            Number::BigDec(d) => d.to_f64().unwrap_or(f64::INFINITY),
        }
    }

    /// The exact decimal digits of the number.
    ///
    /// For the arbitrary-precision tiers this is the only lossless view.
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

/// Numbers compare by value across representations, so `1`, `1.0` and a
/// one-digit big integer are all equal. Same-representation pairs compare
/// exactly; mixed pairs compare through `f64`.
impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            (Number::BigInt(a), Number::BigInt(b)) => a == b,
            (Number::BigDec(a), Number::BigDec(b)) => a == b,
            _ => self.as_f64() == other.as_f64(),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{i}"),
            // `{:?}` is the shortest representation that round-trips,
            // and keeps the `.0` on integral floats.
            Number::Float(x) => {
                if x.is_finite() {
                    write!(f, "{x:?}")
                } else if x.is_nan() {
                    f.write_str("NaN")
                } else if *x > 0.0 {
                    f.write_str("Infinity")
                } else {
                    f.write_str("-Infinity")
                }
            }
            Number::BigInt(i) => write!(f, "{i}"),
            Number::BigDec(d) => write!(f, "{d}"),
        }
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number::Int(value)
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Number::Int(i64::from(value))
    }
}

impl From<u64> for Number {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(value) => Number::Int(value),
            Err(_) => Number::BigInt(BigInt::from(value)),
        }
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::Float(value)
    }
}

impl From<BigInt> for Number {
    fn from(value: BigInt) -> Self {
        Number::BigInt(value)
    }
}

impl From<BigDecimal> for Number {
    fn from(value: BigDecimal) -> Self {
        Number::BigDec(value)
    }
}
