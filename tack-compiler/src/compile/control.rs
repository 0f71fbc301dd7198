// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of tack, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

//! The control engine: each control word opens a frame, marks within the
//! current frame, or closes it. Frames record the offsets of placeholder
//! operands, and `end` resolves them by overwriting the emitted bytes in
//! place. The 8-byte operand width makes every rewrite position-stable.

use crate::{
    compile::{Compiler, CResult, ErrorKind},
    dict::ControlKind,
    opcode::Opcode,
    value::Value,
};

/// A control word occurrence: its kind and the offset of the opcode emitted
/// for it (the frame opener's offset for words that emit nothing, such as
/// `loop`).
#[derive(Clone, Copy, Debug)]
pub(super) struct ControlMarker {
    pub(super) kind: ControlKind,
    pub(super) pos: usize,
}

impl Compiler {
    /// Dispatches one control word.
    pub(super) fn control_word(&mut self, kind: ControlKind) -> CResult<()> {
        let marker = ControlMarker {
            kind,
            pos: self.code.len(),
        };
        match kind {
            ControlKind::If => {
                self.open(marker);
                self.emit_hole(Opcode::If);
            }
            ControlKind::Else => {
                self.mark(marker)?;
                self.emit_hole(Opcode::Jump);
            }
            // `loop` only marks the loop head; nothing is emitted.
            ControlKind::Loop => self.open(marker),
            ControlKind::While => {
                self.mark(marker)?;
                self.emit_hole(Opcode::If);
            }
            ControlKind::Break | ControlKind::Continue => {
                self.mark(marker)?;
                self.emit_hole(Opcode::Jump);
            }
            ControlKind::Switch => {
                self.open(marker);
                self.emit(Opcode::Switch);
            }
            ControlKind::Case => {
                self.mark(marker)?;
                self.emit(Opcode::Case);
                self.emit(Opcode::Equ);
                self.emit_hole(Opcode::If);
            }
            ControlKind::Pass => {
                self.mark(marker)?;
                self.emit_hole(Opcode::Jump);
            }
            ControlKind::Func => {
                self.open(marker);
                self.emit_hole(Opcode::Func);
            }
            ControlKind::Macro => {
                self.open(marker);
                self.emit_hole(Opcode::Macro);
            }
            ControlKind::Return => {
                self.mark(marker)?;
                self.emit(Opcode::Return);
            }
            ControlKind::End => return self.end(marker.pos),
            ControlKind::Import => return self.import(),
        }
        Ok(())
    }

    fn open(&mut self, marker: ControlMarker) {
        self.control_stack.push(vec![marker]);
    }

    /// Appends a marker to the innermost frame.
    fn mark(&mut self, marker: ControlMarker) -> CResult<()> {
        self.control_stack
            .last_mut()
            .ok_or(ErrorKind::MissingOpener)?
            .push(marker);
        Ok(())
    }

    /// Closes the innermost frame, resolving its placeholders.
    fn end(&mut self, end_pos: usize) -> CResult<()> {
        let frame = self.control_stack.pop().ok_or(ErrorKind::MissingOpener)?;
        match frame[0].kind {
            ControlKind::If => self.end_if(&frame, end_pos),
            ControlKind::Loop => self.end_loop(&frame, end_pos),
            ControlKind::Switch => self.end_switch(&frame, end_pos),
            ControlKind::Func => self.end_func(&frame, end_pos),
            ControlKind::Macro => self.end_macro(&frame, end_pos),
            _ => unreachable!("frame opened by a non-opening control word"),
        }
    }

    /// Interior markers: at most one `else`, plus `break`/`continue`/
    /// `return`, which belong to an enclosing loop or definition and are
    /// handed to the frame below for patching when it closes.
    fn end_if(&mut self, frame: &[ControlMarker], end_pos: usize) -> CResult<()> {
        let mut else_marker = None;
        for &marker in &frame[1..] {
            match marker.kind {
                ControlKind::Else => {
                    if else_marker.is_some() {
                        return Err(ErrorKind::InvalidControl.into());
                    }
                    else_marker = Some(marker);
                }
                ControlKind::Break | ControlKind::Continue | ControlKind::Return => {
                    self.mark(marker)?;
                }
                _ => return Err(ErrorKind::InvalidControl.into()),
            }
        }
        let opener = frame[0];
        if let Some(else_marker) = else_marker {
            // A false condition jumps past the else's jump, into the else
            // body; the else's jump skips that body.
            self.patch(opener.pos, (else_marker.pos + 9) as u64);
            self.patch(else_marker.pos, end_pos as u64);
        } else {
            self.patch(opener.pos, end_pos as u64);
        }
        Ok(())
    }

    fn end_loop(&mut self, frame: &[ControlMarker], end_pos: usize) -> CResult<()> {
        let opener = frame[0];
        for &marker in &frame[1..] {
            match marker.kind {
                // Exits jump past the trailing back-jump emitted below.
                ControlKind::While | ControlKind::Break => {
                    self.patch(marker.pos, (end_pos + 9) as u64);
                }
                ControlKind::Continue => self.patch(marker.pos, opener.pos as u64),
                ControlKind::Return => self.mark(marker)?,
                _ => return Err(ErrorKind::InvalidControl.into()),
            }
        }
        self.emit_value(Opcode::Jump, Value::from_u64(opener.pos as u64));
        Ok(())
    }

    /// The interior must start with `case` and pair every case chain with a
    /// `pass`. Consecutive cases with no `pass` between them form a chain
    /// sharing one body: every chain member but the last is rewritten to
    /// compare with `Neq` and jump into the body on a match, so a mismatch
    /// falls through into the next test.
    fn end_switch(&mut self, frame: &[ControlMarker], end_pos: usize) -> CResult<()> {
        let mut cases = Vec::new();
        // The marker following each case: the next case of its chain, or the
        // pass that closes the chain.
        let mut followers = Vec::new();
        let mut chain = false;
        let mut has_case = false;
        let mut has_pass = false;
        for &marker in &frame[1..] {
            match marker.kind {
                ControlKind::Case => {
                    if chain {
                        followers.push(marker);
                    }
                    cases.push(marker);
                    chain = true;
                    has_case = true;
                }
                ControlKind::Pass => {
                    chain = false;
                    self.patch(marker.pos, end_pos as u64);
                    followers.push(marker);
                    has_pass = true;
                }
                ControlKind::Break | ControlKind::Continue | ControlKind::Return => {
                    self.mark(marker)?;
                }
                _ => return Err(ErrorKind::InvalidControl.into()),
            }
        }
        if !has_case || !has_pass || frame[1].kind != ControlKind::Case {
            return Err(ErrorKind::InvalidControl.into());
        }

        let mut chain_members: Vec<ControlMarker> = Vec::new();
        let mut followers = followers.iter();
        for &case in &cases {
            let follower = followers.next().ok_or(ErrorKind::InvalidControl)?;
            if follower.kind == ControlKind::Pass {
                // `case` ends its chain: earlier members jump into the body
                // (just past this case's 11-byte unit) when they match.
                for member in &chain_members {
                    self.patch(member.pos + 2, (case.pos + 11) as u64);
                    self.code[member.pos + 1] = Opcode::Neq as u8;
                }
                chain_members.clear();
                self.patch(case.pos + 2, (follower.pos + 9) as u64);
            } else {
                chain_members.push(case);
            }
        }

        self.emit(Opcode::EndSwitch);
        Ok(())
    }

    fn end_func(&mut self, frame: &[ControlMarker], end_pos: usize) -> CResult<()> {
        for &marker in &frame[1..] {
            if marker.kind != ControlKind::Return {
                return Err(ErrorKind::InvalidControl.into());
            }
        }
        self.patch(frame[0].pos, (end_pos + 1) as u64);
        self.emit(Opcode::Return);
        Ok(())
    }

    fn end_macro(&mut self, frame: &[ControlMarker], end_pos: usize) -> CResult<()> {
        for &marker in &frame[1..] {
            match marker.kind {
                // A return inside a macro body ends the expansion instead of
                // the enclosing call; rewrite the emitted opcode.
                ControlKind::Return => self.code[marker.pos] = Opcode::EndMacro as u8,
                _ => return Err(ErrorKind::InvalidControl.into()),
            }
        }
        self.patch(frame[0].pos, (end_pos + 1) as u64);
        self.emit(Opcode::EndMacro);
        Ok(())
    }
}
