// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of tack, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

use std::fmt::{self, Debug, Formatter};

use static_assertions::{assert_eq_size, const_assert_eq};

/// A single cell on the Tack stack: 64 bits with no tag, reinterpretable as a
/// signed integer, an unsigned integer, an IEEE-754 double, or eight raw
/// bytes. Operands in the bytecode stream are always the little-endian image
/// of a `Value`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Value {
    bits: u64,
}

// Backpatching overwrites operands in place, so the operand width is part of
// the wire format and must never change.
const_assert_eq!(std::mem::size_of::<Value>(), 8);
assert_eq_size!(Value, u64);

impl Value {
    pub const ZERO: Value = Value { bits: 0 };

    #[inline(always)]
    pub fn from_u64(v: u64) -> Self {
        Value { bits: v }
    }

    #[inline(always)]
    pub fn from_i64(v: i64) -> Self {
        Value { bits: v as u64 }
    }

    #[inline(always)]
    pub fn from_f64(v: f64) -> Self {
        Value { bits: v.to_bits() }
    }

    #[inline(always)]
    pub fn as_u64(self) -> u64 {
        self.bits
    }

    #[inline(always)]
    pub fn as_i64(self) -> i64 {
        self.bits as i64
    }

    #[inline(always)]
    pub fn as_f64(self) -> f64 {
        f64::from_bits(self.bits)
    }

    /// The byte image emitted after an operand-carrying opcode.
    #[inline(always)]
    pub fn to_le_bytes(self) -> [u8; 8] {
        self.bits.to_le_bytes()
    }

    #[inline(always)]
    pub fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Value {
            bits: u64::from_le_bytes(bytes),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Value({:#018x})", self.bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reinterpretation() {
        assert_eq!(Value::from_i64(-1).as_u64(), u64::MAX);
        assert_eq!(Value::from_u64(u64::MAX).as_i64(), -1);
        assert_eq!(Value::from_f64(2.5).as_f64(), 2.5);
        assert_eq!(Value::from_f64(0.0).as_u64(), 0);
    }

    #[test]
    fn little_endian_image() {
        assert_eq!(
            Value::from_i64(-16).to_le_bytes(),
            [0xf0, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff],
        );
        assert_eq!(Value::from_u64(9).to_le_bytes(), [9, 0, 0, 0, 0, 0, 0, 0]);
        let v = Value::from_f64(-1.25);
        assert_eq!(Value::from_le_bytes(v.to_le_bytes()), v);
    }
}
