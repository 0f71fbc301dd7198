// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of tack, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

use std::rc::Rc;

use crate::compile::{CompileError, Compiler, CResult, ErrorKind};

/// Which quoted-string mode the scanner is inside.
#[derive(Clone, Copy, PartialEq, Eq)]
enum StringMode {
    None,
    Single,
    Double,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CommentMode {
    None,
    /// `\` at a token start; runs to the end of the line.
    Line,
    /// `(` at a token start; runs to the first `)`.
    Stack,
}

impl Compiler {
    /// Scans the source buffer on top of the text stack, passing each
    /// whitespace-delimited token to the parser as it completes.
    ///
    /// The loader guarantees the buffer ends with `'\n'` followed by `'\0'`:
    /// the newline flushes a final unterminated token and the NUL stops the
    /// scan, so no bounds checks are needed past the cursor.
    pub(super) fn scan(&mut self) -> CResult<()> {
        let &index = self.text_stack.last().expect("scan without a source");
        let text = Rc::clone(&self.files[index].text);
        let path = self.files[index].path.clone();

        let mut cursor = 0;
        let mut begin = 0;
        let mut line: u64 = 1;
        let mut column: u64 = 0;
        let mut space = true;
        let mut string = StringMode::None;
        let mut escape = false;
        let mut comment = CommentMode::None;

        while text[cursor] != b'\0' {
            match text[cursor] {
                byte @ (b'\n' | b'\r' | b'\t' | b' ') => {
                    if byte == b'\n' || byte == b'\r' {
                        if comment == CommentMode::Line {
                            space = true;
                            comment = CommentMode::None;
                        }
                    }
                    if comment == CommentMode::None && !space {
                        if string != StringMode::None {
                            // Whitespace is part of a quoted token.
                            escape = false;
                        } else {
                            // Flush before the line bookkeeping below, so a
                            // token ended by a newline is reported on its
                            // own line.
                            let token = &text[begin..cursor];
                            self.parse(token)
                                .map_err(|err| err.locate(&path, Some(token), line, column))?;
                            space = true;
                        }
                    }
                    if byte == b'\n' || byte == b'\r' {
                        column = 0;
                    }
                    if byte == b'\n' {
                        line += 1;
                    }
                }
                b'\'' => {
                    if comment == CommentMode::None {
                        if string != StringMode::None {
                            if escape {
                                escape = false;
                            } else if string == StringMode::Single {
                                string = StringMode::None;
                            }
                        } else if space {
                            space = false;
                            begin = cursor;
                            string = StringMode::Single;
                            escape = false;
                        }
                    }
                }
                b'"' => {
                    if comment == CommentMode::None {
                        if string != StringMode::None {
                            if escape {
                                escape = false;
                            } else if string == StringMode::Double {
                                string = StringMode::None;
                            }
                        } else if space {
                            space = false;
                            begin = cursor;
                            string = StringMode::Double;
                            escape = false;
                        }
                    }
                }
                b'\\' => {
                    if comment == CommentMode::None {
                        if string != StringMode::None {
                            // The escape consumes the next character; the
                            // string mode itself is unchanged.
                            escape = !escape;
                        } else if space {
                            space = false;
                            comment = CommentMode::Line;
                        }
                    }
                }
                b'(' => {
                    if comment == CommentMode::None {
                        if string != StringMode::None {
                            escape = false;
                        } else if space {
                            space = false;
                            comment = CommentMode::Stack;
                        }
                    }
                }
                b')' => {
                    if comment == CommentMode::None && string != StringMode::None {
                        escape = false;
                    }
                    if comment == CommentMode::Stack {
                        space = true;
                        comment = CommentMode::None;
                    }
                }
                _ => {
                    if comment == CommentMode::None {
                        if string != StringMode::None {
                            escape = false;
                        }
                        if space {
                            space = false;
                            begin = cursor;
                        }
                    }
                }
            }
            cursor += 1;
            // The column advances once per character, not per byte: UTF-8
            // continuation bytes do not count.
            if text[cursor] as i8 >= -64 {
                column += 1;
            }
        }

        if string != StringMode::None {
            return Err(
                CompileError::from(ErrorKind::UnterminatedString).locate(&path, None, line, column)
            );
        }
        if !self.control_stack.is_empty() {
            return Err(CompileError::from(ErrorKind::ControlLevel).locate(&path, None, line, column));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::Opcode;

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

    #[test]
    fn tokens_split_on_any_whitespace() {
        let expected = [value(1), value(2), value(3), value(4)].concat();
        assert_eq!(compile("1 2\t3\r\n4"), expected);
    }

    #[test]
    fn line_comment_runs_to_end_of_line() {
        assert_eq!(compile("\\ 1 bogus! (\n2"), value(2));
        assert_eq!(compile("\\comment\r2"), value(2));
    }

    #[test]
    fn stack_comment_runs_to_first_paren() {
        assert_eq!(compile("( a b c ) 2"), value(2));
        assert_eq!(compile("( stray \" quote ) 2"), value(2));
    }

    #[test]
    fn backslash_mid_token_is_part_of_the_token() {
        let err = compile_err("a\\b");
        assert!(matches!(err.kind(), ErrorKind::UnknownKeyword));
        assert_eq!(err.token().unwrap(), "a\\b");
    }

    #[test]
    fn whitespace_stays_inside_strings() {
        assert_eq!(compile("' '"), value(b' ' as u64));
        assert_eq!(
            compile("\"a b\""),
            [value(b'b' as u64), value(b' ' as u64), value(b'a' as u64), value(3)].concat(),
        );
    }

    #[test]
    fn opposite_quote_does_not_close_a_string() {
        // A double quote inside a single-quoted token is scanned through and
        // rejected by the literal parser.
        let err = compile_err("'\"'");
        assert!(matches!(err.kind(), ErrorKind::StrayQuote));
    }

    #[test]
    fn escaped_quote_does_not_close_a_string() {
        assert_eq!(compile("'\\''"), value(b'\'' as u64));
    }

    #[test]
    fn unterminated_string_fails() {
        let err = compile_err("\"abc");
        assert!(matches!(err.kind(), ErrorKind::UnterminatedString));
    }

    #[test]
    fn positions_are_tracked_across_lines() {
        let err = compile_err("1\n2\n bogus!");
        assert_eq!(err.line(), 3);
        assert!(err.column() > 0);
    }

    #[test]
    fn final_token_is_flushed_without_trailing_newline() {
        assert_eq!(compile("7"), value(7));
    }
}
