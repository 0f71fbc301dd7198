// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of tack, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

mod compiler;
mod control;
mod literal;
mod parse;
mod scanner;

pub use compiler::*;

pub type CResult<T> = Result<T, CompileError>;
