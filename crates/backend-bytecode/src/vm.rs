//! Register-based bytecode interpreter (§6.2 `evaluate`), grounded on the
//! teacher's `kivm::vm::VM`: one flat instance buffer addressed by the
//! cumulative byte offsets the Side-Effect Compiler's symbol table already
//! assigned, rather than the teacher's heap of boxed [`Value`]s — this
//! backend's state lives in caller-owned bytes, not VM-owned objects.

use crate::opcode::{CompiledProgram, Constant, Instruction, Opcode};

/// A runtime value. Pointer values carry an absolute byte offset into the
/// instance buffer — every slot kind shares one address space (§3.4), so
/// unlike the teacher's tagged heap values, no buffer id is needed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    F32(f32),
    F64(f64),
    I32(i32),
    I64(i64),
    Bool(bool),
    Nil,
    Ptr(u32),
}

impl Value {
    fn from_constant(c: &Constant) -> Self {
        match c {
            Constant::F32(v) => Value::F32(*v),
            Constant::F64(v) => Value::F64(*v),
            Constant::I32(v) => Value::I32(*v),
            Constant::I64(v) => Value::I64(*v),
            Constant::Nil => Value::Nil,
            Constant::True => Value::Bool(true),
        }
    }

    fn as_ptr(self) -> Result<u32, String> {
        match self {
            Value::Ptr(p) => Ok(p),
            other => Err(format!("expected a pointer value, found {other:?}")),
        }
    }
}

/// Decodes a scalar tag the same way `sidefx::type_tag_hint` assigns it:
/// 0 = f32, 1 = f64, 2 = i32, 3 = i64, anything else defaults to f32 width.
fn read_tagged(buf: &[u8], offset: u32, tag: u32) -> Value {
    let off = offset as usize;
    match tag {
        1 => Value::F64(f64::from_le_bytes(buf[off..off + 8].try_into().unwrap())),
        2 => Value::I32(i32::from_le_bytes(buf[off..off + 4].try_into().unwrap())),
        3 => Value::I64(i64::from_le_bytes(buf[off..off + 8].try_into().unwrap())),
        _ => Value::F32(f32::from_le_bytes(buf[off..off + 4].try_into().unwrap())),
    }
}

fn write_value(buf: &mut [u8], offset: u32, value: Value) {
    let off = offset as usize;
    match value {
        Value::F32(v) => buf[off..off + 4].copy_from_slice(&v.to_le_bytes()),
        Value::F64(v) => buf[off..off + 8].copy_from_slice(&v.to_le_bytes()),
        Value::I32(v) => buf[off..off + 4].copy_from_slice(&v.to_le_bytes()),
        Value::I64(v) => buf[off..off + 8].copy_from_slice(&v.to_le_bytes()),
        Value::Bool(v) => buf[off] = v as u8,
        Value::Nil | Value::Ptr(_) => {}
    }
}

/// One register file over a straight-line program (§4.7 "no call stack
/// depth beyond `main`" — see the `CallSub` note on [`Vm::step`]).
struct Frame {
    instructions: Vec<Instruction>,
    registers: Vec<Value>,
    ip: usize,
}

impl Frame {
    fn new(instructions: Vec<Instruction>, register_count: u32) -> Self {
        Frame { instructions, registers: vec![Value::Nil; register_count as usize], ip: 0 }
    }
}

/// Interprets a [`CompiledProgram`] against a caller-supplied instance
/// buffer (§6.2 `initialize`/`evaluate`: the host owns the bytes, this VM
/// only reads and writes them).
pub struct Vm<'a> {
    program: &'a CompiledProgram,
    buffer: &'a mut [u8],
    mask_words: Vec<u32>,
}

impl<'a> Vm<'a> {
    pub fn new(program: &'a CompiledProgram, buffer: &'a mut [u8]) -> Self {
        Vm { program, buffer, mask_words: Vec::new() }
    }

    /// Zeroes the whole instance buffer (§6.2 `initialize`).
    pub fn initialize(&mut self) {
        self.buffer.fill(0);
    }

    /// Sets signal-mask bit `bit` (§6.2/§6.3): a gate reads this back via
    /// `TestMaskBit`. Bits default to set (gate open) until a host clears
    /// one, since most programs in this pack never gate anything.
    pub fn set_mask_bit(&mut self, bit: u32, value: bool) {
        let word = (bit / 32) as usize;
        if word >= self.mask_words.len() {
            self.mask_words.resize(word + 1, u32::MAX);
        }
        if value {
            self.mask_words[word] |= 1 << (bit % 32);
        } else {
            self.mask_words[word] &= !(1 << (bit % 32));
        }
    }

    fn test_mask_bit(&self, bit: u32) -> bool {
        let word = (bit / 32) as usize;
        match self.mask_words.get(word) {
            Some(w) => w & (1 << (bit % 32)) != 0,
            None => true,
        }
    }

    fn slot_size(&self, slot: u32) -> u32 {
        let i = slot as usize;
        let offsets = &self.program.slot_offsets;
        if i + 1 < offsets.len() {
            offsets[i + 1] - offsets[i]
        } else {
            self.program.total_size.saturating_sub(offsets.get(i).copied().unwrap_or(0))
        }
    }

    /// Runs `main` to completion and returns its result value (§6.2
    /// `evaluate`).
    ///
    /// `CallSub` is lowered as an identity pass-through of its argument
    /// register: this backend's emitter inlines every `FunctionCall`/
    /// `FunctionSequence`/`RecursionBranch` directly into `main` rather than
    /// compiling a separate callee body, so there is no function table to
    /// dispatch into yet. Straight-line programs (no genuine recursion)
    /// evaluate correctly; a real subroutine call is a known gap, tracked
    /// rather than silently miscompiled.
    pub fn evaluate(&mut self) -> Result<Value, String> {
        log::debug!("vm: evaluating {} instructions", self.program.main.instructions.len());
        let mut frame = Frame::new(self.program.main.instructions.clone(), self.program.main.register_count);
        loop {
            if frame.ip >= frame.instructions.len() {
                return Err("program fell off the end without a Return".to_string());
            }
            let instr = frame.instructions[frame.ip];
            frame.ip += 1;
            if let Some(result) = self.step(&mut frame, instr)? {
                log::trace!("vm: evaluate -> {:?}", result);
                return Ok(result);
            }
        }
    }

    fn step(&mut self, frame: &mut Frame, instr: Instruction) -> Result<Option<Value>, String> {
        match instr.opcode {
            Opcode::LoadConst => {
                let c = self
                    .program
                    .main
                    .constants
                    .get(instr.b as usize)
                    .ok_or_else(|| format!("constant index {} out of range", instr.b))?;
                frame.registers[instr.a as usize] = Value::from_constant(c);
            }
            Opcode::PtrOffset => {
                frame.registers[instr.a as usize] = Value::Ptr(instr.c);
            }
            Opcode::Load => {
                let ptr = frame.registers[instr.b as usize].as_ptr()?;
                frame.registers[instr.a as usize] = read_tagged(self.buffer, ptr, instr.c);
            }
            Opcode::Store => {
                let ptr = frame.registers[instr.a as usize].as_ptr()?;
                let value = frame.registers[instr.b as usize];
                write_value(self.buffer, ptr, value);
            }
            Opcode::MemCpy => {
                let to = frame.registers[instr.a as usize].as_ptr()? as usize;
                let from = frame.registers[instr.b as usize].as_ptr()? as usize;
                let len = instr.c as usize;
                self.buffer.copy_within(from..from + len, to);
            }
            Opcode::AllocateState => {
                let size = self.slot_size(instr.b) as usize;
                let offset = self.program.slot_offsets.get(instr.b as usize).copied().unwrap_or(0) as usize;
                self.buffer[offset..offset + size].fill(0);
            }
            Opcode::CallSub => {
                frame.registers[instr.a as usize] = frame.registers[instr.b as usize];
            }
            Opcode::ReadGlobal => {
                frame.registers[instr.a as usize] = read_tagged(self.buffer, instr.b, 0);
            }
            Opcode::WriteGlobal => {
                let value = frame.registers[instr.b as usize];
                write_value(self.buffer, instr.a, value);
            }
            Opcode::TestMaskBit => {
                frame.registers[instr.a as usize] = Value::Bool(self.test_mask_bit(instr.b));
            }
            Opcode::Sequence => {}
            Opcode::Jump => {
                frame.ip = instr.a as usize;
            }
            Opcode::JumpIfNotEqual => {
                if frame.registers[instr.a as usize] != frame.registers[instr.b as usize] {
                    frame.ip = instr.c as usize;
                }
            }
            Opcode::Move => {
                frame.registers[instr.a as usize] = frame.registers[instr.b as usize];
            }
            Opcode::Return => {
                return Ok(Some(frame.registers[instr.a as usize]));
            }
            Opcode::Nop => {}
            Opcode::Halt => {
                return Ok(Some(Value::Nil));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::CompiledFunction;

    fn program_from(instructions: Vec<Instruction>, constants: Vec<Constant>) -> CompiledProgram {
        let mut p = CompiledProgram::new();
        let mut f = CompiledFunction::new("main");
        f.instructions = instructions;
        f.constants = constants;
        f.register_count = 8;
        p.main = f;
        p.total_size = 64;
        p
    }

    #[test]
    fn loads_a_constant_and_returns_it() {
        let program = program_from(
            vec![Instruction::ab(Opcode::LoadConst, 0, 0), Instruction::a_only(Opcode::Return, 0)],
            vec![Constant::F32(3.5)],
        );
        let mut buf = vec![0u8; 64];
        let mut vm = Vm::new(&program, &mut buf);
        assert_eq!(vm.evaluate().unwrap(), Value::F32(3.5));
    }

    #[test]
    fn store_then_load_round_trips_through_the_buffer() {
        let program = program_from(
            vec![
                Instruction::ab(Opcode::LoadConst, 0, 0), // r0 = 7 (i32)
                Instruction::new(Opcode::PtrOffset, 1, 0, 0), // r1 = ptr(0)
                Instruction::ab(Opcode::Store, 1, 0),     // *r1 = r0
                Instruction::new(Opcode::Load, 2, 1, 2),  // r2 = *r1 as i32
                Instruction::a_only(Opcode::Return, 2),
            ],
            vec![Constant::I32(7)],
        );
        let mut buf = vec![0u8; 64];
        let mut vm = Vm::new(&program, &mut buf);
        assert_eq!(vm.evaluate().unwrap(), Value::I32(7));
    }

    #[test]
    fn jump_if_not_equal_skips_the_mismatched_branch() {
        let program = program_from(
            vec![
                Instruction::ab(Opcode::LoadConst, 0, 0),           // r0 = 1 (selector)
                Instruction::ab(Opcode::LoadConst, 1, 1),           // r1 = 0 (case 0)
                Instruction::new(Opcode::JumpIfNotEqual, 0, 1, 5),  // mismatch -> skip to 5
                Instruction::ab(Opcode::LoadConst, 2, 2),           // r2 = 111 (branch 0, skipped)
                Instruction::a_only(Opcode::Jump, 6),
                Instruction::ab(Opcode::LoadConst, 2, 3),           // r2 = 222 (branch 1, taken)
                Instruction::a_only(Opcode::Return, 2),
            ],
            vec![Constant::I32(1), Constant::I32(0), Constant::I32(111), Constant::I32(222)],
        );
        let mut buf = vec![0u8; 64];
        let mut vm = Vm::new(&program, &mut buf);
        assert_eq!(vm.evaluate().unwrap(), Value::I32(222));
    }
}
