// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of tack, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

//! Single-pass compiler for the Tack stack language, producing a flat
//! little-endian bytecode stream for the Tack virtual machine.

pub mod compile;
mod dict;
mod dump;
mod opcode;
mod value;

pub use dict::{ControlKind, Trie, Word};
pub use dump::{Dump, Listing};
pub use opcode::Opcode;
pub use value::Value;
