// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of tack, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

use std::str;

use crate::{
    compile::{Compiler, CResult, ErrorKind},
    opcode::Opcode,
    value::Value,
};

impl Compiler {
    /// Parses the unquoted content of a `'…'` or `"…"` literal. Each
    /// character becomes one `Value` push; the pushes are emitted in reverse
    /// so the first character ends up on top of the stack. Double-quoted
    /// literals additionally push their length.
    pub(super) fn parse_quoted(&mut self, content: &[u8], push_length: bool) -> CResult<()> {
        let mut values = Vec::new();
        let mut rest = content;
        while let Some(&byte) = rest.first() {
            let value = if byte.is_ascii() {
                match byte {
                    b'\\' => {
                        let (value, len) = escape(&rest[1..])?;
                        rest = &rest[1 + len..];
                        value
                    }
                    // The scanner only leaves quotes behind the escape.
                    b'\'' | b'"' => return Err(ErrorKind::StrayQuote.into()),
                    _ => {
                        rest = &rest[1..];
                        u64::from(byte)
                    }
                }
            } else {
                let (ch, len) = bstr::decode_utf8(rest);
                let ch = ch.ok_or(ErrorKind::Unicode)?;
                rest = &rest[len..];
                u64::from(u32::from(ch))
            };
            values.push(Value::from_u64(value));
        }

        for &value in values.iter().rev() {
            self.emit_value(Opcode::Value, value);
        }
        if push_length {
            self.emit_value(Opcode::Value, Value::from_u64(values.len() as u64));
        }
        Ok(())
    }
}

/// Decodes one escape sequence after a `\`. Returns the character value and
/// the number of bytes consumed.
fn escape(rest: &[u8]) -> Result<(u64, usize), ErrorKind> {
    let &first = rest.first().ok_or(ErrorKind::Escape)?;
    let value = match first {
        b'a' => 0x07,
        b'b' => 0x08,
        b'e' => 0x1b,
        b'f' => 0x0c,
        b'n' => u64::from(b'\n'),
        b'r' => u64::from(b'\r'),
        b't' => u64::from(b'\t'),
        b'v' => 0x0b,
        b'\\' | b'\'' | b'"' => u64::from(first),
        b'0'..=b'7' => {
            // Up to three octal digits.
            let digits = rest
                .iter()
                .take_while(|&&b| matches!(b, b'0'..=b'7'))
                .count()
                .min(3);
            return Ok((digit_value(&rest[..digits], 8)?, digits));
        }
        b'x' => return Ok((digit_value(hex_digits(rest, 2)?, 16)?, 3)),
        b'u' => return Ok((digit_value(hex_digits(rest, 4)?, 16)?, 5)),
        b'U' => return Ok((digit_value(hex_digits(rest, 8)?, 16)?, 9)),
        _ => return Err(ErrorKind::Escape),
    };
    Ok((value, 1))
}

/// The exactly-`count` hex digits following an `x`/`u`/`U` marker.
fn hex_digits(rest: &[u8], count: usize) -> Result<&[u8], ErrorKind> {
    let digits = rest.get(1..1 + count).ok_or(ErrorKind::Escape)?;
    if !digits.iter().all(u8::is_ascii_hexdigit) {
        return Err(ErrorKind::Escape);
    }
    Ok(digits)
}

fn digit_value(digits: &[u8], radix: u32) -> Result<u64, ErrorKind> {
    // The digit sets were validated by the caller.
    let digits = str::from_utf8(digits).map_err(|_| ErrorKind::Escape)?;
    u64::from_str_radix(digits, radix).map_err(|_| ErrorKind::Escape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::CompileError;

    fn compile(source: &str) -> Vec<u8> {
        let mut compiler = Compiler::new();
        if let Err(err) = compiler.compile_text(source) {
            panic!("compile failed for {source:?}: {err}");
        }
        compiler.code().to_vec()
    }

    fn compile_err(source: &str) -> CompileError {
        Compiler::new().compile_text(source).unwrap_err()
    }

    fn value(operand: u64) -> Vec<u8> {
        let mut bytes = vec![Opcode::Value as u8];
        bytes.extend_from_slice(&operand.to_le_bytes());
        bytes
    }

    macro_rules! char_literal(($source:literal => $value:expr) => {
        assert_eq!(compile($source), value($value), "source: {}", $source);
    });
    macro_rules! bad_literal(($source:literal => $kind:ident) => {{
        let err = compile_err($source);
        assert!(
            matches!(err.kind(), ErrorKind::$kind),
            "expected {} for {}: {err}", stringify!($kind), $source,
        );
    }});

    #[test]
    fn character_pushes_no_length() {
        char_literal!("'X'" => 88);
        char_literal!("'0'" => 48);
    }

    #[test]
    fn string_pushes_reversed_plus_length() {
        assert_eq!(
            compile("\"AB\""),
            [value(b'B' as u64), value(b'A' as u64), value(2)].concat(),
        );
        assert_eq!(compile("\"X\""), [value(88), value(1)].concat());
        assert_eq!(compile("\"\""), value(0));
    }

    #[test]
    fn named_escapes() {
        char_literal!("'\\a'" => 0x07);
        char_literal!("'\\b'" => 0x08);
        char_literal!("'\\e'" => 0x1b);
        char_literal!("'\\f'" => 0x0c);
        char_literal!("'\\n'" => 10);
        char_literal!("'\\r'" => 13);
        char_literal!("'\\t'" => 9);
        char_literal!("'\\v'" => 0x0b);
        char_literal!("'\\\\'" => 92);
        char_literal!("'\\''" => 39);
        char_literal!("'\\\"'" => 34);
    }

    #[test]
    fn octal_escapes_take_up_to_three_digits() {
        char_literal!("'\\7'" => 7);
        char_literal!("'\\101'" => 0o101);
        assert_eq!(
            // Four digits: the last is an ordinary character.
            compile("'\\1018'"),
            [value(b'8' as u64), value(0o101)].concat(),
        );
    }

    #[test]
    fn hex_escapes_take_exact_digit_counts() {
        char_literal!("'\\x41'" => 0x41);
        char_literal!("'\\u0041'" => 0x41);
        char_literal!("'\\U00000041'" => 0x41);
        char_literal!("'\\uD55C'" => 0xd55c);
        bad_literal!("'\\x4'" => Escape);
        bad_literal!("'\\u041'" => Escape);
        bad_literal!("'\\U0000041'" => Escape);
        bad_literal!("'\\xgg'" => Escape);
    }

    #[test]
    fn unknown_escape_fails() {
        bad_literal!("'\\q'" => Escape);
    }

    #[test]
    fn stray_quote_inside_literal_fails() {
        bad_literal!("'a\"b'" => StrayQuote);
        bad_literal!("\"a'b\"" => StrayQuote);
    }

    #[test]
    fn utf8_decodes_to_code_points() {
        char_literal!("'é'" => 0xe9);
        char_literal!("'한'" => 0xd55c);
        char_literal!("'🦀'" => 0x1f980);
        assert_eq!(
            compile("\"aé\""),
            [value(0xe9), value(b'a' as u64), value(2)].concat(),
        );
    }

    #[test]
    fn invalid_utf8_fails() {
        let mut compiler = Compiler::new();
        let err = compiler.compile_text(b"'\xff'".to_vec()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Unicode));
    }
}
