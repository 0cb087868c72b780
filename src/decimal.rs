use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Largest number of fractional digits kept after normalization.
const MAX_SCALE: u32 = 28;
/// Significant digits that always fit in the `i128` mantissa.
const MAX_DIGITS: usize = 38;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{0}' is not a decimal number")]
pub struct ParseDecimalError(pub String);

/// An exact base-10 number.
///
/// Values are normalized on construction: trailing fractional zeros are
/// stripped and zero always has scale 0, so `1000`, `1000.0` and `"1000.00"`
/// share one representation and derived equality is value equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    mantissa: i128,
    scale: u32,
}

impl Decimal {
    pub const ZERO: Decimal = Decimal {
        mantissa: 0,
        scale: 0,
    };

    pub fn new(mantissa: i128, scale: u32) -> Self {
        let mut value = Self { mantissa, scale };
        value.normalize();
        value
    }

    pub fn mantissa(&self) -> i128 {
        self.mantissa
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn is_integer(&self) -> bool {
        self.scale == 0
    }

    pub fn to_i64(&self) -> Option<i64> {
        if self.is_integer() {
            i64::try_from(self.mantissa).ok()
        } else {
            None
        }
    }

    /// Converts a JSON number through its shortest textual rendering.
    pub fn from_json_number(number: &serde_json::Number) -> Result<Self, ParseDecimalError> {
        if let Some(i) = number.as_i64() {
            return Ok(Self::from(i));
        }
        if let Some(u) = number.as_u64() {
            return Ok(Self::new(u as i128, 0));
        }
        match number.as_f64() {
            Some(f) => Self::from_f64(f),
            None => Err(ParseDecimalError(number.to_string())),
        }
    }

    pub fn from_f64(value: f64) -> Result<Self, ParseDecimalError> {
        if !value.is_finite() {
            return Err(ParseDecimalError(value.to_string()));
        }
        value.to_string().parse()
    }

    fn normalize(&mut self) {
        while self.scale > 0 && self.mantissa % 10 == 0 {
            self.mantissa /= 10;
            self.scale -= 1;
        }
        if self.mantissa == 0 {
            self.scale = 0;
        }
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Self::new(value as i128, 0)
    }
}

impl FromStr for Decimal {
    type Err = ParseDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseDecimalError(s.to_string());
        let text = s.trim();

        let (negative, unsigned) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };

        let (coefficient, exponent) = match unsigned.find(['e', 'E']) {
            Some(idx) => {
                let exp: i64 = unsigned[idx + 1..].parse().map_err(|_| invalid())?;
                (&unsigned[..idx], exp)
            }
            None => (unsigned, 0),
        };

        let (int_part, frac_part) = match coefficient.split_once('.') {
            Some((int_part, frac_part)) => (int_part, frac_part),
            None => (coefficient, ""),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        // Leading integer zeros and trailing fractional zeros never change the value.
        let int_digits = int_part.trim_start_matches('0');
        let frac_digits = frac_part.trim_end_matches('0');
        if int_digits.is_empty() && frac_digits.bytes().all(|b| b == b'0') {
            return Ok(Decimal::ZERO);
        }
        if int_digits.len() + frac_digits.len() > MAX_DIGITS {
            return Err(invalid());
        }

        let mut mantissa: i128 = 0;
        for digit in int_digits.bytes().chain(frac_digits.bytes()) {
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add((digit - b'0') as i128))
                .ok_or_else(invalid)?;
        }

        let mut scale = (frac_digits.len() as i64)
            .checked_sub(exponent)
            .ok_or_else(invalid)?;
        // A non-zero mantissa cannot absorb more than MAX_DIGITS powers of ten,
        // and normalization cannot remove more than MAX_DIGITS from the scale.
        if scale < -(MAX_DIGITS as i64) || scale > (MAX_SCALE as i64) + (MAX_DIGITS as i64) {
            return Err(invalid());
        }
        while scale < 0 {
            mantissa = mantissa.checked_mul(10).ok_or_else(invalid)?;
            scale += 1;
        }

        let mut value = Decimal {
            mantissa: if negative { -mantissa } else { mantissa },
            scale: u32::try_from(scale).map_err(|_| invalid())?,
        };
        value.normalize();

        if value.scale > MAX_SCALE {
            return Err(invalid());
        }
        Ok(value)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.mantissa);
        }

        let digits = self.mantissa.unsigned_abs().to_string();
        let scale = self.scale as usize;
        let padded = if digits.len() <= scale {
            format!("{}{}", "0".repeat(scale - digits.len() + 1), digits)
        } else {
            digits
        };
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        let sign = if self.mantissa < 0 { "-" } else { "" };
        write!(f, "{}{}.{}", sign, int_part, frac_part)
    }
}

// Serialized as a string so no precision is lost on the wire.
impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(DecimalVisitor)
    }
}

struct DecimalVisitor;

impl<'de> Visitor<'de> for DecimalVisitor {
    type Value = Decimal;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a decimal number or a string containing one")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Decimal, E> {
        Ok(Decimal::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Decimal, E> {
        Ok(Decimal::new(v as i128, 0))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Decimal, E> {
        Decimal::from_f64(v).map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Decimal, E> {
        v.parse().map_err(E::custom)
    }
}
