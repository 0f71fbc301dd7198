use std::io::{self, Write};

use tack_compiler::compile::CompileError;

const YELLOW_BOLD: &str = "\x1b[1;33m";
const RESET: &str = "\x1b[0m";

/// Prints a failed compile to stderr: the canonical path of the offending
/// file in bold yellow, then the message with the token and position when
/// they are known.
pub fn report(err: &CompileError) {
    let stderr = io::stderr();
    let mut stderr = stderr.lock();
    if let Some(path) = err.path() {
        let _ = writeln!(stderr, "{YELLOW_BOLD}{}{RESET}", path.display());
    }
    let _ = writeln!(stderr, "error : {err}");
}
