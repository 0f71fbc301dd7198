// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of tack, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

use std::{
    error,
    fmt::{self, Debug, Display, Formatter},
    fs, io,
    path::{Path, PathBuf},
    rc::Rc,
    str,
};

use bstr::{BStr, BString, ByteSlice};
use thiserror::Error;

use crate::{
    compile::{control::ControlMarker, CResult},
    dict::{Trie, Word, CONTROL_WORDS},
    opcode::{Opcode, OPERATIONS},
    value::Value,
};

/// The Tack compiler: scans source words and emits bytecode in a single
/// pass, resolving forward jumps by overwriting placeholder operands in
/// place.
///
/// One instance owns every structure for the duration of a compile: the word
/// dictionary, the loaded source buffers and their canonical paths, the
/// preprocessor token stack, the control stack, and the bytecode buffer. It
/// may be reused to compile further files into the same buffer.
pub struct Compiler {
    /// Every word the compiler knows, keyed by its UTF-8 bytes.
    pub(super) dictionary: Trie<Word>,
    /// The sequence number handed to the most recent user keyword.
    pub(super) keyword_count: u64,
    /// The loaded source buffers, in load order.
    pub(super) files: Vec<SourceFile>,
    /// Canonical path bytes of every loaded file. Presence means the file
    /// was imported and must not be compiled again.
    pub(super) file_trie: Trie<usize>,
    /// Indices into `files` for the sources currently being scanned; the
    /// top is the current file, and entries below it are its importers.
    pub(super) text_stack: Vec<usize>,
    /// Tokens pushed by `#name`, consumed by `import`.
    pub(super) preproc_tokens: Vec<BString>,
    /// The emitted bytecode. Its length is the current emission offset.
    pub(super) code: Vec<u8>,
    /// One frame per open control construct; closed by `end`.
    pub(super) control_stack: Vec<Vec<ControlMarker>>,
}

/// A loaded source buffer and the canonical path it came from.
pub(super) struct SourceFile {
    pub(super) path: PathBuf,
    /// The file bytes with `'\n'` and `'\0'` sentinels appended, so the
    /// scanner always flushes its final token and can stop on NUL.
    pub(super) text: Rc<[u8]>,
}

/// An error that aborted a compile, with the source position where it was
/// detected when one is known.
#[derive(Debug)]
pub struct CompileError {
    kind: ErrorKind,
    path: Option<PathBuf>,
    token: Option<BString>,
    line: u64,
    column: u64,
}

/// A kind of error from compiling Tack source.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// A source file could not be resolved or read.
    #[error("file reading failure ({0})")]
    Read(#[from] io::Error),
    /// The bytecode output could not be written.
    #[error("file writing failure ({0})")]
    Write(io::Error),

    /// The token is neither a dictionary word nor a literal.
    #[error("unknown keyword")]
    UnknownKeyword,
    #[error("number parsing failure")]
    Number,
    #[error("escape sequence parsing failure")]
    Escape,
    #[error("unicode decoding failure")]
    Unicode,
    /// An unescaped quote inside a quoted literal.
    #[error("string parsing failure")]
    StrayQuote,
    /// A quoted literal was still open when the source ended.
    #[error("string not terminated")]
    UnterminatedString,

    /// A marker word that is not legal inside its enclosing frame.
    #[error("invalid control syntax")]
    InvalidControl,
    /// A marker word with no open construct to attach to.
    #[error("control word without an opening construct")]
    MissingOpener,
    /// Open constructs remained when the source ended.
    #[error("control level does not match")]
    ControlLevel,
    #[error("no preprocessor token for import")]
    EmptyPreproc,

    /// `$name` collides with a control word or built-in operation.
    #[error("control words and built-in operations cannot be keywords")]
    KeywordCollision,
    #[error("invalid keyword name")]
    InvalidKeyword,
    /// An import path fragment was not valid UTF-8.
    #[error("invalid import path")]
    ImportPath,
}

impl CompileError {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The canonical path of the file being compiled when the error was
    /// detected.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The offending token, when the error names one.
    pub fn token(&self) -> Option<&BStr> {
        self.token.as_ref().map(|t| t.as_bstr())
    }

    /// 1-based line of the offending token. 0 when no position is known.
    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn column(&self) -> u64 {
        self.column
    }

    /// Attaches a source position, unless one is already present (an error
    /// surfacing out of an import keeps the inner file's position).
    pub(super) fn locate(
        mut self,
        path: &Path,
        token: Option<&[u8]>,
        line: u64,
        column: u64,
    ) -> Self {
        if self.path.is_none() {
            self.path = Some(path.to_owned());
            self.token = token.map(BString::from);
            self.line = line;
            self.column = column;
        }
        self
    }

    fn with_path(mut self, path: PathBuf) -> Self {
        if self.path.is_none() {
            self.path = Some(path);
        }
        self
    }
}

impl From<ErrorKind> for CompileError {
    fn from(kind: ErrorKind) -> Self {
        CompileError {
            kind,
            path: None,
            token: None,
            line: 0,
            column: 0,
        }
    }
}

impl Display for CompileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(token) = &self.token {
            write!(f, " `{}` in line {}, column {}", token, self.line, self.column)?;
        }
        Ok(())
    }
}

impl error::Error for CompileError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl Compiler {
    /// Creates a compiler with every control word and built-in operation
    /// interned.
    pub fn new() -> Self {
        let mut dictionary = Trie::new();
        for &(word, kind) in CONTROL_WORDS {
            dictionary.insert(word.as_bytes(), Word::Control(kind));
        }
        for &(word, op) in OPERATIONS {
            dictionary.insert(word.as_bytes(), Word::Op(op));
        }
        Compiler {
            dictionary,
            keyword_count: 0,
            files: Vec::new(),
            file_trie: Trie::new(),
            text_stack: Vec::new(),
            preproc_tokens: Vec::new(),
            code: Vec::new(),
            control_stack: Vec::new(),
        }
    }

    /// Compiles `input` and writes the bytecode to `output` as a raw byte
    /// stream with no header or trailer.
    pub fn compile(&mut self, input: &Path, output: &Path) -> CResult<()> {
        self.compile_file(input)?;
        self.write_code(output)
    }

    /// Compiles a source file, appending to the bytecode buffer.
    pub fn compile_file(&mut self, input: &Path) -> CResult<()> {
        let index = self.load(input)?;
        self.scan_index(index)
    }

    /// Compiles an in-memory buffer registered under a synthetic name.
    /// Imports resolve relative to the working directory.
    pub fn compile_text<T: Into<Vec<u8>>>(&mut self, text: T) -> CResult<()> {
        let mut text = text.into();
        text.push(b'\n');
        text.push(b'\0');
        let index = self.files.len();
        self.files.push(SourceFile {
            path: PathBuf::from("<text>"),
            text: Rc::from(text),
        });
        self.scan_index(index)
    }

    /// The bytecode emitted so far.
    #[inline]
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Writes the bytecode buffer to `output` byte-exactly.
    pub fn write_code(&self, output: &Path) -> CResult<()> {
        fs::write(output, &self.code)
            .map_err(|err| CompileError::from(ErrorKind::Write(err)).with_path(output.to_owned()))
    }

    /// Loads a source file: canonicalizes the path, reads the bytes, appends
    /// the `'\n'` and `'\0'` sentinels, and registers the canonical path.
    /// Returns the new buffer index.
    fn load(&mut self, path: &Path) -> CResult<usize> {
        let path = fs::canonicalize(path)
            .map_err(|err| CompileError::from(ErrorKind::Read(err)).with_path(path.to_owned()))?;
        let mut text = fs::read(&path)
            .map_err(|err| CompileError::from(ErrorKind::Read(err)).with_path(path.clone()))?;
        text.reserve_exact(2);
        text.push(b'\n');
        text.push(b'\0');
        let index = self.files.len();
        // Re-registering a path points it at the fresh buffer.
        *self
            .file_trie
            .insert(path.as_os_str().as_encoded_bytes(), index) = index;
        self.files.push(SourceFile {
            path,
            text: Rc::from(text),
        });
        Ok(index)
    }

    /// Scans one loaded buffer, tracking it as the current source.
    fn scan_index(&mut self, index: usize) -> CResult<()> {
        self.text_stack.push(index);
        let result = self.scan();
        self.text_stack.pop();
        result
    }

    /// Resolves and compiles an import. The top preprocessor token is
    /// consumed as a path relative to the directory of the current source
    /// file; a canonical path that was already loaded is a no-op, which
    /// breaks import cycles.
    pub(super) fn import(&mut self) -> CResult<()> {
        let token = self.preproc_tokens.pop().ok_or(ErrorKind::EmptyPreproc)?;
        let &index = self.text_stack.last().expect("import outside of a scan");
        let fragment = str::from_utf8(&token).map_err(|_| ErrorKind::ImportPath)?;
        let joined = match self.files[index].path.parent() {
            Some(dir) => dir.join(fragment),
            None => PathBuf::from(fragment),
        };
        let canonical = fs::canonicalize(&joined)
            .map_err(|err| CompileError::from(ErrorKind::Read(err)).with_path(joined))?;
        if self
            .file_trie
            .find(canonical.as_os_str().as_encoded_bytes())
            .is_some()
        {
            return Ok(());
        }
        let loaded = self.load(&canonical)?;
        self.scan_index(loaded)
    }

    #[inline]
    pub(super) fn emit(&mut self, op: Opcode) {
        self.code.push(op as u8);
    }

    #[inline]
    pub(super) fn emit_value(&mut self, op: Opcode, value: Value) {
        self.code.push(op as u8);
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    /// Emits `op` with an all-zero placeholder operand and returns the
    /// offset of the opcode byte, for a later [`Compiler::patch`].
    #[inline]
    pub(super) fn emit_hole(&mut self, op: Opcode) -> usize {
        let pos = self.code.len();
        self.emit_value(op, Value::ZERO);
        pos
    }

    /// Overwrites the operand of the instruction at `opcode_pos` in place.
    #[inline]
    pub(super) fn patch(&mut self, opcode_pos: usize, target: u64) {
        let bytes = Value::from_u64(target).to_le_bytes();
        self.code[opcode_pos + 1..opcode_pos + 9].copy_from_slice(&bytes);
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new()
    }
}

impl Debug for SourceFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFile")
            .field("path", &self.path)
            .field("text", &self.text.as_bstr())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{env, fs, path::PathBuf, process};

    use super::*;

    fn unit(op: Opcode, operand: u64) -> Vec<u8> {
        let mut bytes = vec![op as u8];
        bytes.extend_from_slice(&operand.to_le_bytes());
        bytes
    }

    fn compile(source: &str) -> Vec<u8> {
        let mut compiler = Compiler::new();
        if let Err(err) = compiler.compile_text(source) {
            panic!("compile failed for {source:?}: {err}");
        }
        compiler.code().to_vec()
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("tack-compiler-{}-{name}", process::id()));
        fs::remove_dir_all(&dir).ok();
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn values_and_operations() {
        assert_eq!(compile("42"), unit(Opcode::Value, 42));
        assert_eq!(
            compile("1 2 +"),
            [
                unit(Opcode::Value, 1),
                unit(Opcode::Value, 2),
                vec![Opcode::Add as u8],
            ]
            .concat(),
        );
        assert_eq!(compile("dup putn"), [Opcode::Dup as u8, Opcode::Putn as u8]);
    }

    #[test]
    fn negative_hex_value() {
        assert_eq!(
            compile("-0x10"),
            [
                Opcode::Value as u8,
                0xf0,
                0xff,
                0xff,
                0xff,
                0xff,
                0xff,
                0xff,
                0xff,
            ],
        );
    }

    #[test]
    fn empty_source_compiles_to_nothing() {
        assert!(compile("").is_empty());
        assert!(compile("  \t\r\n").is_empty());
    }

    #[test]
    fn unknown_keyword_is_located() {
        let mut compiler = Compiler::new();
        let err = compiler.compile_text("1\n  bogus!").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownKeyword));
        assert_eq!(err.token().unwrap(), "bogus!");
        assert_eq!(err.line(), 2);
        assert_eq!(err.path(), Some(Path::new("<text>")));
    }

    #[test]
    fn import_compiles_body_once() {
        let dir = temp_dir("import-once");
        fs::write(dir.join("lib.tack"), "42").unwrap();
        fs::write(dir.join("main.tack"), "#lib.tack import #lib.tack import 7").unwrap();
        let mut compiler = Compiler::new();
        compiler.compile_file(&dir.join("main.tack")).unwrap();
        assert_eq!(
            compiler.code(),
            [unit(Opcode::Value, 42), unit(Opcode::Value, 7)].concat(),
        );
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn import_cycle_terminates() {
        let dir = temp_dir("import-cycle");
        fs::write(dir.join("a.tack"), "#b.tack import 1").unwrap();
        fs::write(dir.join("b.tack"), "#a.tack import 2").unwrap();
        let mut compiler = Compiler::new();
        compiler.compile_file(&dir.join("a.tack")).unwrap();
        // b's body runs first; a's re-import from b is a no-op.
        assert_eq!(
            compiler.code(),
            [unit(Opcode::Value, 2), unit(Opcode::Value, 1)].concat(),
        );
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn import_is_relative_to_the_importing_file() {
        let dir = temp_dir("import-relative");
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::write(dir.join("sub/inner.tack"), "5").unwrap();
        fs::write(dir.join("sub/outer.tack"), "#inner.tack import").unwrap();
        fs::write(dir.join("main.tack"), "#sub/outer.tack import").unwrap();
        let mut compiler = Compiler::new();
        compiler.compile_file(&dir.join("main.tack")).unwrap();
        assert_eq!(compiler.code(), unit(Opcode::Value, 5));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_import_names_the_path() {
        let dir = temp_dir("import-missing");
        fs::write(dir.join("main.tack"), "#nowhere.tack import").unwrap();
        let mut compiler = Compiler::new();
        let err = compiler.compile_file(&dir.join("main.tack")).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Read(_)));
        assert!(err.path().unwrap().ends_with("nowhere.tack"));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn import_without_token_fails() {
        let mut compiler = Compiler::new();
        let err = compiler.compile_text("import").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::EmptyPreproc));
    }

    #[test]
    fn write_code_is_byte_exact() {
        let dir = temp_dir("write-code");
        let out = dir.join("out.tbc");
        let mut compiler = Compiler::new();
        compiler.compile_text("-0x10").unwrap();
        compiler.write_code(&out).unwrap();
        assert_eq!(fs::read(&out).unwrap(), compiler.code());
        fs::remove_dir_all(&dir).ok();
    }
}
