//! Decimal and numeric codecs.
//!
//! Native client libraries transport exact numerics in one of two shapes: an
//! ASCII string of decimal digits, or a packed binary structure carrying a
//! little-endian magnitude with precision, scale and sign. The string shape
//! is the default; some drivers mishandle the packed structure, and some
//! databases exceed its 38-digit capacity.

use num_bigint::{BigInt, Sign};
use num_traits::{Signed, ToPrimitive, Zero};

use crate::error::MisuseError;

/// Scale used when a rational is encoded as decimal text without a
/// driver-declared scale. Trailing zeros are trimmed afterwards, so the
/// effective scale is usually much smaller.
pub const DEFAULT_DECIMAL_SCALE: usize = 1000;

/// Maximum number of decimal digits the packed numeric structure can carry.
pub const MAX_NUMERIC_PRECISION: u8 = 38;

/// Byte length of the packed numeric magnitude.
pub const NUMERIC_MAGNITUDE_LEN: usize = 16;

/// Encode an arbitrary-precision integer as ASCII decimal digits.
pub fn encode_big_int(value: &BigInt) -> Vec<u8> {
    value.to_str_radix(10).into_bytes()
}

/// Encode `numerator / denominator` as ASCII decimal text with up to `scale`
/// fractional digits (truncating division). Trailing zero digits are trimmed
/// down to a minimum scale of 1; an exact zero encodes as `0.0`.
pub fn encode_big_rational(
    numerator: &BigInt,
    denominator: &BigInt,
    scale: usize,
) -> Result<Vec<u8>, MisuseError> {
    if denominator.is_zero() {
        // Decimal text has no rendering for Infinity or NaN.
        return Err(MisuseError::NumericOverflow {
            detail: "zero denominator".to_string(),
        });
    }
    let mantissa = (BigInt::from(10).pow(scale as u32) * numerator) / denominator;
    if mantissa.is_zero() {
        return Ok(b"0.0".to_vec());
    }
    let digits = mantissa.to_str_radix(10);
    let (sign, magnitude) = match digits.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", digits.as_str()),
    };
    let mut scale = scale;
    let mut used = magnitude.len();
    while scale >= 2 && magnitude.as_bytes()[used - 1] == b'0' {
        scale -= 1;
        used -= 1;
    }
    let magnitude = &magnitude[..used];
    let mut text = String::with_capacity(magnitude.len() + scale + 3);
    text.push_str(sign);
    if magnitude.len() > scale {
        let point = magnitude.len() - scale;
        text.push_str(&magnitude[..point]);
        text.push('.');
        text.push_str(&magnitude[point..]);
    } else {
        text.push_str("0.");
        for _ in 0..scale - magnitude.len() {
            text.push('0');
        }
        text.push_str(magnitude);
    }
    Ok(text.into_bytes())
}

fn decimal_text(buffer: &[u8], what: &'static str) -> Result<String, MisuseError> {
    std::str::from_utf8(buffer)
        .map(|s| s.trim_end_matches('\0').trim().to_string())
        .map_err(|_| MisuseError::ParseFailed {
            what,
            text: String::from_utf8_lossy(buffer).into_owned(),
        })
}

/// Parse ASCII decimal digits (optional leading sign, no point) as `i64`.
pub fn decode_int(buffer: &[u8]) -> Result<i64, MisuseError> {
    let text = decimal_text(buffer, "integer")?;
    text.parse::<i64>().map_err(|_| MisuseError::ParseFailed {
        what: "integer",
        text,
    })
}

/// Parse ASCII decimal digits (optional leading sign, no point) as `BigInt`.
pub fn decode_big_int(buffer: &[u8]) -> Result<BigInt, MisuseError> {
    let text = decimal_text(buffer, "decimal integer")?;
    text.parse::<BigInt>().map_err(|_| MisuseError::ParseFailed {
        what: "decimal integer",
        text,
    })
}

/// Parse ASCII decimal text with an optional point into a numerator and an
/// implicit power-of-ten denominator.
pub fn decode_big_rational(buffer: &[u8]) -> Result<(BigInt, BigInt), MisuseError> {
    let text = decimal_text(buffer, "decimal")?;
    let mut digits = String::with_capacity(text.len());
    let mut scale = 0usize;
    let mut seen_point = false;
    for (index, ch) in text.chars().enumerate() {
        match ch {
            '0'..='9' => {
                digits.push(ch);
                if seen_point {
                    scale += 1;
                }
            }
            '-' if index == 0 => digits.push(ch),
            '.' if !seen_point => seen_point = true,
            _ => {
                return Err(MisuseError::ParseFailed {
                    what: "decimal",
                    text,
                })
            }
        }
    }
    let numerator = digits
        .parse::<BigInt>()
        .map_err(|_| MisuseError::ParseFailed {
            what: "decimal",
            text,
        })?;
    Ok((numerator, BigInt::from(10).pow(scale as u32)))
}

/// Parse ASCII decimal text as `f64`.
pub fn decode_float(buffer: &[u8]) -> Result<f64, MisuseError> {
    let text = decimal_text(buffer, "float")?;
    text.parse::<f64>().map_err(|_| MisuseError::ParseFailed {
        what: "float",
        text,
    })
}

/// The packed binary numeric structure: little-endian magnitude with
/// precision, scale and sign (1 = non-negative).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlNumeric {
    pub precision: u8,
    pub scale: i8,
    pub sign: u8,
    pub value: [u8; NUMERIC_MAGNITUDE_LEN],
}

impl SqlNumeric {
    /// Total byte length of the wire form.
    pub const WIRE_LEN: usize = 3 + NUMERIC_MAGNITUDE_LEN;

    /// Serialize into the ABI byte layout.
    pub fn to_bytes(&self) -> [u8; Self::WIRE_LEN] {
        let mut bytes = [0u8; Self::WIRE_LEN];
        bytes[0] = self.precision;
        bytes[1] = self.scale as u8;
        bytes[2] = self.sign;
        bytes[3..].copy_from_slice(&self.value);
        bytes
    }

    /// Deserialize from the ABI byte layout.
    pub fn from_bytes(buffer: &[u8]) -> Option<Self> {
        if buffer.len() < Self::WIRE_LEN {
            return None;
        }
        let mut value = [0u8; NUMERIC_MAGNITUDE_LEN];
        value.copy_from_slice(&buffer[3..Self::WIRE_LEN]);
        Some(SqlNumeric {
            precision: buffer[0],
            scale: buffer[1] as i8,
            sign: buffer[2],
            value,
        })
    }

    fn magnitude(&self) -> BigInt {
        BigInt::from_bytes_le(Sign::Plus, &self.value)
    }

    fn signed_magnitude(&self) -> BigInt {
        let magnitude = self.magnitude();
        if self.sign == 1 {
            magnitude
        } else {
            -magnitude
        }
    }
}

fn pack_magnitude(value: &BigInt) -> Result<[u8; NUMERIC_MAGNITUDE_LEN], MisuseError> {
    let (_, bytes) = value.abs().to_bytes_le();
    if bytes.len() > NUMERIC_MAGNITUDE_LEN {
        return Err(MisuseError::NumericOverflow {
            detail: format!("{} magnitude bytes exceed {}", bytes.len(), NUMERIC_MAGNITUDE_LEN),
        });
    }
    let mut packed = [0u8; NUMERIC_MAGNITUDE_LEN];
    packed[..bytes.len()].copy_from_slice(&bytes);
    Ok(packed)
}

/// Encode an arbitrary-precision integer into the packed numeric structure.
pub fn encode_numeric_big_int(value: &BigInt) -> Result<SqlNumeric, MisuseError> {
    Ok(SqlNumeric {
        precision: MAX_NUMERIC_PRECISION,
        scale: 0,
        sign: if value.is_negative() { 0 } else { 1 },
        value: pack_magnitude(value)?,
    })
}

/// Encode `numerator / denominator` into the packed numeric structure with
/// the given scale (truncating division).
pub fn encode_numeric_big_rational(
    numerator: &BigInt,
    denominator: &BigInt,
    scale: i8,
) -> Result<SqlNumeric, MisuseError> {
    if denominator.is_zero() {
        return Err(MisuseError::NumericOverflow {
            detail: "zero denominator".to_string(),
        });
    }
    let mantissa = (BigInt::from(10).pow(scale.max(0) as u32) * numerator) / denominator;
    Ok(SqlNumeric {
        precision: MAX_NUMERIC_PRECISION,
        scale,
        sign: if mantissa.is_negative() { 0 } else { 1 },
        value: pack_magnitude(&mantissa)?,
    })
}

/// Decode the packed numeric structure as `BigInt`. A positive scale means
/// the value has fractional digits and cannot be an integer.
pub fn decode_numeric_big_int(numeric: &SqlNumeric) -> Result<BigInt, MisuseError> {
    if numeric.scale > 0 {
        return Err(MisuseError::NumericOverflow {
            detail: format!("scale {} on integer decode", numeric.scale),
        });
    }
    let mut value = numeric.signed_magnitude();
    if numeric.scale < 0 {
        value *= BigInt::from(10).pow((-numeric.scale) as u32);
    }
    Ok(value)
}

/// Decode the packed numeric structure as `i64`.
pub fn decode_numeric_int(numeric: &SqlNumeric) -> Result<i64, MisuseError> {
    let value = decode_numeric_big_int(numeric)?;
    value.to_i64().ok_or_else(|| MisuseError::NumericOverflow {
        detail: format!("{value} does not fit into 64 bits"),
    })
}

/// Decode the packed numeric structure into a numerator and a power-of-ten
/// denominator.
pub fn decode_numeric_big_rational(numeric: &SqlNumeric) -> (BigInt, BigInt) {
    let mut numerator = numeric.signed_magnitude();
    if numeric.scale < 0 {
        numerator *= BigInt::from(10).pow((-numeric.scale) as u32);
        (numerator, BigInt::from(1))
    } else {
        (numerator, BigInt::from(10).pow(numeric.scale as u32))
    }
}
