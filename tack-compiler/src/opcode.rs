// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of tack, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

use paste::paste;
use static_assertions::const_assert_eq;

macro_rules! opcodes {
    ($($(#[doc = $doc:literal])* $name:ident = $code:literal,)*) => {
        /// An instruction in the Tack bytecode stream. Each instruction is
        /// one opcode byte, optionally followed by an 8-byte little-endian
        /// operand (see [`Opcode::has_operand`]).
        ///
        /// The discriminants are the wire format and never change. Byte
        /// `0x00` is reserved as never-valid, so an unresolved backpatch
        /// placeholder can never be misread as an instruction.
        #[repr(u8)]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $($(#[doc = $doc])* $name = $code,)*
        }

        impl Opcode {
            /// Decodes an opcode byte.
            #[inline]
            pub fn from_u8(byte: u8) -> Option<Opcode> {
                match byte {
                    $($code => Some(Opcode::$name),)*
                    _ => None,
                }
            }

            /// The lowercase mnemonic used in listings.
            pub fn mnemonic(self) -> &'static str {
                paste! {
                    match self {
                        $(Opcode::$name => stringify!([<$name:lower>]),)*
                    }
                }
            }
        }
    };
}

opcodes! {
    /// Pushes the operand.
    Value = 0x01,
    /// Pops a condition and jumps to the operand offset when it is zero.
    If = 0x02,
    /// Jumps to the operand offset.
    Jump = 0x03,
    /// Calls the word whose sequence number is the operand.
    Call = 0x04,
    /// Binds the keyword on the stack to the body that follows, then jumps
    /// past it.
    Func = 0x05,
    Macro = 0x06,
    EndMacro = 0x07,
    Return = 0x08,
    /// Captures the switch subject.
    Switch = 0x09,
    /// Pushes the subject again for the comparison that follows.
    Case = 0x0a,
    EndSwitch = 0x0b,

    Equ = 0x0c,
    Neq = 0x0d,
    Grt = 0x0e,
    Geq = 0x0f,
    Lst = 0x10,
    Leq = 0x11,

    Add = 0x12,
    Sub = 0x13,
    Mul = 0x14,
    Div = 0x15,
    Mod = 0x16,
    Neg = 0x17,
    FAdd = 0x18,
    FSub = 0x19,
    FMul = 0x1a,
    FDiv = 0x1b,
    FNeg = 0x1c,

    And = 0x1d,
    Or = 0x1e,
    Xor = 0x1f,
    Not = 0x20,
    Shl = 0x21,
    Shr = 0x22,

    Dup = 0x23,
    Drop = 0x24,
    Swap = 0x25,
    Over = 0x26,
    Rot = 0x27,

    Getc = 0x28,
    Putc = 0x29,
    Putn = 0x2a,
    Putf = 0x2b,
}

const_assert_eq!(std::mem::size_of::<Opcode>(), 1);

impl Opcode {
    /// Returns whether this opcode is followed by an 8-byte operand.
    ///
    /// `Case` itself carries none; the case unit is emitted as the 11-byte
    /// sequence `Case, Equ, If, operand`.
    #[inline]
    pub fn has_operand(self) -> bool {
        matches!(
            self,
            Opcode::Value
                | Opcode::If
                | Opcode::Jump
                | Opcode::Call
                | Opcode::Func
                | Opcode::Macro
        )
    }
}

macro_rules! operations[($($word:literal => $opcode:ident,)*) => {
    &[$(($word, Opcode::$opcode),)*]
}];

/// The built-in operation words. Each emits exactly its opcode byte.
pub(crate) static OPERATIONS: &[(&str, Opcode)] = operations![
    "+" => Add,
    "-" => Sub,
    "*" => Mul,
    "/" => Div,
    "%" => Mod,
    "neg" => Neg,
    "f+" => FAdd,
    "f-" => FSub,
    "f*" => FMul,
    "f/" => FDiv,
    "fneg" => FNeg,
    "=" => Equ,
    "!=" => Neq,
    ">" => Grt,
    ">=" => Geq,
    "<" => Lst,
    "<=" => Leq,
    "&" => And,
    "|" => Or,
    "^" => Xor,
    "~" => Not,
    "<<" => Shl,
    ">>" => Shr,
    "dup" => Dup,
    "drop" => Drop,
    "swap" => Swap,
    "over" => Over,
    "rot" => Rot,
    "getc" => Getc,
    "putc" => Putc,
    "putn" => Putn,
    "putf" => Putf,
];
