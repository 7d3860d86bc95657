use ethnum::U256;
use std::fmt;

use crate::error::{SimError, SimResult};

pub const MAX_WIDTH: u32 = 256;

/// Two-state bit vector of 1..=256 bits. Bits above `width` are always zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Value {
    width: u32,
    bits: U256,
}

impl Value {
    pub fn zero(width: u32) -> SimResult<Self> {
        check_width(width)?;
        Ok(Value {
            width,
            bits: U256::ZERO,
        })
    }

    pub fn bit(high: bool) -> Self {
        Value {
            width: 1,
            bits: if high { U256::ONE } else { U256::ZERO },
        }
    }

    pub fn from_u256(width: u32, bits: U256) -> SimResult<Self> {
        check_width(width)?;
        let needed = MAX_WIDTH - bits.leading_zeros();
        if needed > width {
            return Err(SimError::WidthMismatch {
                signal: format!("{:#x}", HexBits(bits)),
                width,
                needed,
            });
        }
        Ok(Value { width, bits })
    }

    /// Keeps the low `width` bits of `bits`; `width` is clamped to 1..=256.
    pub fn truncated(width: u32, bits: U256) -> Self {
        let width = width.clamp(1, MAX_WIDTH);
        let bits = if width == MAX_WIDTH {
            bits
        } else {
            bits & ((U256::ONE << width) - U256::ONE)
        };
        Value { width, bits }
    }

    pub fn from_u128(width: u32, val: u128) -> SimResult<Self> {
        Value::from_u256(width, U256::from(val))
    }

    /// Parses a hex literal; `0x` prefix and `_` separators are accepted.
    pub fn from_hex(width: u32, literal: &str) -> SimResult<Self> {
        let stripped = strip_literal(literal, "0x");
        let bits = U256::from_str_radix(&stripped, 16)
            .map_err(|_| SimError::InvalidLiteral(literal.to_string()))?;
        Value::from_u256(width, bits)
    }

    /// Parses a binary literal; the digit count must equal `width`.
    pub fn from_bin(width: u32, literal: &str) -> SimResult<Self> {
        let stripped = strip_literal(literal, "0b");
        if stripped.len() != width as usize || !stripped.chars().all(|c| c == '0' || c == '1') {
            return Err(SimError::InvalidLiteral(literal.to_string()));
        }
        let bits = U256::from_str_radix(&stripped, 2)
            .map_err(|_| SimError::InvalidLiteral(literal.to_string()))?;
        Value::from_u256(width, bits)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn bits(&self) -> U256 {
        self.bits
    }

    pub fn is_zero(&self) -> bool {
        self.bits == U256::ZERO
    }

    pub fn is_high(&self) -> bool {
        !self.is_zero()
    }

    /// Lower 32 bits.
    pub fn u32(&self) -> u32 {
        let (_, lo) = self.bits.into_words();
        lo as u32
    }

    pub fn u128(&self) -> u128 {
        let (_, lo) = self.bits.into_words();
        lo
    }

    pub fn bin(&self) -> String {
        (0..self.width)
            .rev()
            .map(|i| {
                if (self.bits >> i) & U256::ONE == U256::ZERO {
                    '0'
                } else {
                    '1'
                }
            })
            .collect()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}'h{:x}", self.width, HexBits(self.bits))
    }
}

struct HexBits(U256);

impl fmt::LowerHex for HexBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (hi, lo) = self.0.into_words();
        if f.alternate() {
            f.write_str("0x")?;
        }
        if hi == 0 {
            write!(f, "{:x}", lo)
        } else {
            write!(f, "{:x}{:032x}", hi, lo)
        }
    }
}

fn check_width(width: u32) -> SimResult<()> {
    if width == 0 || width > MAX_WIDTH {
        Err(SimError::UnsupportedWidth(width))
    } else {
        Ok(())
    }
}

fn strip_literal(literal: &str, prefix: &str) -> String {
    let trimmed = literal.trim();
    let body = trimmed
        .strip_prefix(prefix)
        .or_else(|| trimmed.strip_prefix(&prefix.to_ascii_uppercase()))
        .unwrap_or(trimmed);
    body.replace('_', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_literal_with_separators() {
        let v = Value::from_hex(128, "0xe28336f5_9e6623df_d2c97f5f_7630f5a2").unwrap();
        assert_eq!(v.u128(), 0xe28336f5_9e6623df_d2c97f5f_7630f5a2);
        assert_eq!(v.width(), 128);
        assert_eq!(v.to_string(), "128'he28336f59e6623dfd2c97f5f7630f5a2");
    }

    #[test]
    fn value_wider_than_signal_is_rejected() {
        assert!(matches!(
            Value::from_u128(4, 0x1f),
            Err(SimError::WidthMismatch { needed: 5, width: 4, .. })
        ));
        assert!(Value::from_u128(5, 0x1f).is_ok());
    }

    #[test]
    fn width_limits() {
        assert!(matches!(Value::zero(0), Err(SimError::UnsupportedWidth(0))));
        assert!(matches!(Value::zero(257), Err(SimError::UnsupportedWidth(257))));
        assert!(Value::zero(256).unwrap().is_zero());
    }

    #[test]
    fn truncation_drops_high_bits() {
        let v = Value::truncated(8, U256::from(0x1234_u32));
        assert_eq!(v.u32(), 0x34);
        assert_eq!(Value::truncated(0, U256::MAX).width(), 1);
        assert_eq!(Value::truncated(256, U256::MAX).bits(), U256::MAX);
    }

    #[test]
    fn binary_literal() {
        let v = Value::from_bin(8, "0b1010_0011").unwrap();
        assert_eq!(v.u32(), 0xa3);
        assert_eq!(v.bin(), "10100011");
        assert!(Value::from_bin(8, "1010").is_err());
        assert!(Value::from_bin(4, "10x1").is_err());
    }

    #[test]
    fn full_width_key_displays_both_words() {
        let v = Value::from_u256(256, U256::from_words(1, 2)).unwrap();
        assert_eq!(
            v.to_string(),
            "256'h100000000000000000000000000000002"
        );
    }
}
