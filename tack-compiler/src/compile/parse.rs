// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of tack, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

use std::{num::IntErrorKind, str};

use memchr::memchr;

use crate::{
    compile::{Compiler, CResult, ErrorKind},
    dict::Word,
    opcode::Opcode,
    value::Value,
};

impl Compiler {
    /// Classifies one token and emits its bytecode: dictionary words
    /// dispatch on their category, everything else on its first byte.
    pub(super) fn parse(&mut self, token: &[u8]) -> CResult<()> {
        if let Some(&word) = self.dictionary.find(token) {
            match word {
                Word::Control(kind) => self.control_word(kind),
                Word::Keyword(id) => {
                    self.emit_value(Opcode::Call, Value::from_u64(id));
                    Ok(())
                }
                Word::Op(op) => {
                    self.emit(op);
                    Ok(())
                }
            }
        } else {
            match token[0] {
                b'+' => self.parse_prefixed_number(token, 1, false),
                b'-' => self.parse_prefixed_number(token, 1, true),
                b'0' => self.parse_prefixed_number(token, 0, false),
                b'.' | b'1'..=b'9' => self.parse_number(token),
                b'$' => self.parse_keyword(&token[1..]),
                b'#' => {
                    self.preproc_tokens.push(token[1..].into());
                    Ok(())
                }
                b'\'' => self.parse_quoted(&token[1..token.len() - 1], false),
                b'"' => self.parse_quoted(&token[1..token.len() - 1], true),
                _ => Err(ErrorKind::UnknownKeyword.into()),
            }
        }
    }

    /// Parses a numeric token whose digits may carry a `0x`/`0o`/`0b` radix
    /// prefix at `index` (1 when a sign was consumed by dispatch).
    fn parse_prefixed_number(&mut self, token: &[u8], index: usize, negate: bool) -> CResult<()> {
        if token.get(index) == Some(&b'0') {
            match token.get(index + 1).copied() {
                Some(b'x') => self.parse_radix_number(token, index, negate, 16),
                Some(b'o') => self.parse_radix_number(token, index, negate, 8),
                Some(b'b') => self.parse_radix_number(token, index, negate, 2),
                _ => self.parse_number(token),
            }
        } else {
            self.parse_number(token)
        }
    }

    /// Parses the digits after a radix prefix. The signed parse is retried
    /// unsigned on positive overflow; negation wraps on the bit pattern.
    fn parse_radix_number(
        &mut self,
        token: &[u8],
        index: usize,
        negate: bool,
        radix: u32,
    ) -> CResult<()> {
        let digits = str::from_utf8(&token[index + 2..]).map_err(|_| ErrorKind::Number)?;
        let value = match i64::from_str_radix(digits, radix) {
            Ok(v) => v,
            Err(err) if *err.kind() == IntErrorKind::PosOverflow => {
                u64::from_str_radix(digits, radix).map_err(|_| ErrorKind::Number)? as i64
            }
            Err(_) => return Err(ErrorKind::Number.into()),
        };
        let value = if negate { value.wrapping_neg() } else { value };
        self.emit_value(Opcode::Value, Value::from_i64(value));
        Ok(())
    }

    /// Parses a decimal token: floating-point iff it contains a dot.
    fn parse_number(&mut self, token: &[u8]) -> CResult<()> {
        let text = str::from_utf8(token).map_err(|_| ErrorKind::Number)?;
        if memchr(b'.', token).is_some() {
            let value: f64 = text.parse().map_err(|_| ErrorKind::Number)?;
            self.emit_value(Opcode::Value, Value::from_f64(value));
        } else {
            let value = match text.parse::<i64>() {
                Ok(v) => v,
                Err(err) if *err.kind() == IntErrorKind::PosOverflow => {
                    text.parse::<u64>().map_err(|_| ErrorKind::Number)? as i64
                }
                Err(_) => return Err(ErrorKind::Number.into()),
            };
            self.emit_value(Opcode::Value, Value::from_i64(value));
        }
        Ok(())
    }

    /// Handles `$name`: interns a new user keyword or reuses an existing
    /// one, and pushes its sequence number. Control words and built-in
    /// operations cannot be shadowed.
    fn parse_keyword(&mut self, name: &[u8]) -> CResult<()> {
        let id = match self.dictionary.find(name) {
            Some(&Word::Keyword(id)) => id,
            Some(_) => return Err(ErrorKind::KeywordCollision.into()),
            None => {
                match name.first().copied() {
                    None => return Err(ErrorKind::InvalidKeyword.into()),
                    Some(b'+' | b'-' | b'.') => {
                        if name.get(1).is_some_and(|b| b.is_ascii_digit()) {
                            return Err(ErrorKind::InvalidKeyword.into());
                        }
                    }
                    Some(b'0'..=b'9' | b'@' | b'#' | b'$' | b'\'' | b'"') => {
                        return Err(ErrorKind::InvalidKeyword.into());
                    }
                    Some(_) => {}
                }
                self.keyword_count += 1;
                self.dictionary.insert(name, Word::Keyword(self.keyword_count));
                self.keyword_count
            }
        };
        self.emit_value(Opcode::Value, Value::from_u64(id));
        Ok(())
    }
}
