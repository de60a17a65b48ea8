//! Lowers a [`sigflow_core::sidefx::CompiledModule`]'s imperative graph into
//! a [`CompiledProgram`] (§4.7 "Target Emitter", bytecode backend).
//!
//! Each distinct [`INode`] is emitted once and memoized to a register index
//! — the imperative graph is already hash-consed, so this reuses exactly
//! the sharing the Side-Effect Compiler established.

use crate::opcode::{CompiledFunction, CompiledProgram, Constant, Instruction, Opcode};
use sigflow_core::sidefx::{CompiledModule, DataSource, ImperativeKind, INode};
use sigflow_core::symbol::SlotKind;
use std::collections::HashMap;

pub struct Emitter<'a> {
    module: &'a CompiledModule,
    function: CompiledFunction,
    registers: HashMap<INode, u32>,
    next_register: u32,
}

impl<'a> Emitter<'a> {
    pub fn new(module: &'a CompiledModule) -> Self {
        Emitter { module, function: CompiledFunction::new("main"), registers: HashMap::new(), next_register: 0 }
    }

    pub fn emit_program(mut self) -> CompiledProgram {
        let result_reg = self.emit_node(self.module.root);
        self.function.emit(Instruction::a_only(Opcode::Return, result_reg));
        self.function.register_count = self.next_register;

        let mut program = CompiledProgram::new();
        program.main = self.function;
        program.slot_kinds = (0..self.module.symbols.len())
            .map(|i| slot_kind_name(self.module.symbols.slot_info(sigflow_core::symbol::SlotId(i as u32)).kind))
            .collect();
        program.slot_offsets = (0..self.module.symbols.len())
            .map(|i| self.module.symbols.byte_offset(sigflow_core::symbol::SlotId(i as u32)))
            .collect();
        program.total_size = self.module.symbols.total_size();
        program
    }

    fn alloc_register(&mut self) -> u32 {
        let r = self.next_register;
        self.next_register += 1;
        r
    }

    fn emit_node(&mut self, node: INode) -> u32 {
        if let Some(&r) = self.registers.get(&node) {
            return r;
        }
        let kind = self.module.imperative.kind(node).clone();
        let reg = match kind {
            ImperativeKind::PointerOffset { base, byte_offset } => {
                let r = self.alloc_register();
                let tag = data_source_tag(&base);
                self.function.emit(Instruction::new(Opcode::PtrOffset, r, tag, byte_offset));
                r
            }
            ImperativeKind::Load { from, ty_tag } => {
                let rf = self.emit_node(from);
                let r = self.alloc_register();
                self.function.emit(Instruction::new(Opcode::Load, r, rf, ty_tag));
                r
            }
            ImperativeKind::LoadConstant(c) => {
                let r = self.alloc_register();
                let idx = intern_scalar(&mut self.function, &c);
                self.function.emit(Instruction::ab(Opcode::LoadConst, r, idx));
                r
            }
            ImperativeKind::Store { to, value } => {
                let rt = self.emit_node(to);
                let rv = self.emit_node(value);
                self.function.emit(Instruction::ab(Opcode::Store, rt, rv));
                rt
            }
            ImperativeKind::MemCpy { to, from, len } => {
                let rt = self.emit_node(to);
                let rf = self.emit_node(from);
                self.function.emit(Instruction::new(Opcode::MemCpy, rt, rf, len));
                rt
            }
            ImperativeKind::AllocateState { slot } => {
                let r = self.alloc_register();
                self.function.emit(Instruction::ab(Opcode::AllocateState, r, slot.0));
                r
            }
            ImperativeKind::SubroutineCall { args, .. } => {
                let rargs: Vec<u32> = args.iter().map(|a| self.emit_node(*a)).collect();
                let arg_reg = rargs.first().copied().unwrap_or_else(|| self.alloc_register());
                let r = self.alloc_register();
                self.function.emit(Instruction::new(Opcode::CallSub, r, arg_reg, 0));
                r
            }
            ImperativeKind::ReadGlobalSlot { slot } => {
                let r = self.alloc_register();
                let offset = self.module.symbols.byte_offset(slot);
                self.function.emit(Instruction::ab(Opcode::ReadGlobal, r, offset));
                r
            }
            ImperativeKind::WriteGlobalSlot { slot, value } => {
                let rv = self.emit_node(value);
                let offset = self.module.symbols.byte_offset(slot);
                self.function.emit(Instruction::new(Opcode::WriteGlobal, offset, rv, 0));
                rv
            }
            ImperativeKind::Sequence { first, then } => {
                let _ = self.emit_node(first);
                self.emit_node(then)
            }
            ImperativeKind::TestMaskBit { bit } => {
                let r = self.alloc_register();
                self.function.emit(Instruction::ab(Opcode::TestMaskBit, r, bit));
                r
            }
            ImperativeKind::MultiDispatch { selector, branches } => self.emit_multi_dispatch(selector, &branches),
        };
        self.registers.insert(node, reg);
        reg
    }

    /// Sequential case testing (§4.6.4): compare the selector against each
    /// branch index in turn, falling through to the next comparison on a
    /// mismatch and jumping past the remaining branches on a match. No
    /// separate jump-table structure — this mirrors the teacher's `Jump`/
    /// `JumpIfFalse` control flow, just with one comparison per case
    /// instead of one conditional per boolean.
    fn emit_multi_dispatch(&mut self, selector: INode, branches: &[INode]) -> u32 {
        let rsel = self.emit_node(selector);
        let result = self.alloc_register();
        let mut end_jumps = Vec::new();
        let n = branches.len();
        for (i, branch) in branches.iter().enumerate() {
            let case_reg = self.alloc_register();
            let const_idx = self.function.add_constant(Constant::I32(i as i32));
            self.function.emit(Instruction::ab(Opcode::LoadConst, case_reg, const_idx));
            let skip_jump_idx = self.function.instructions.len();
            self.function.emit(Instruction::new(Opcode::JumpIfNotEqual, rsel, case_reg, 0));
            let rb = self.emit_node(*branch);
            self.function.emit(Instruction::ab(Opcode::Move, result, rb));
            if i + 1 < n {
                let end_jump_idx = self.function.instructions.len();
                self.function.emit(Instruction::a_only(Opcode::Jump, 0));
                end_jumps.push(end_jump_idx);
            }
            let after = self.function.instructions.len() as u32;
            self.function.instructions[skip_jump_idx].c = after;
        }
        let end = self.function.instructions.len() as u32;
        for idx in end_jumps {
            self.function.instructions[idx].a = end;
        }
        result
    }
}

fn data_source_tag(source: &DataSource) -> u32 {
    match source {
        DataSource::RingBufferSlot(slot) => 0x1000_0000 | slot.0,
        DataSource::SubroutineLocal(slot) => 0x2000_0000 | slot.0,
        DataSource::BoundaryCache(slot) => 0x3000_0000 | slot.0,
        DataSource::GlobalSlot(slot) => 0x4000_0000 | slot.0,
        DataSource::CallerOutput => 0x5000_0000,
    }
}

fn slot_kind_name(kind: SlotKind) -> String {
    match kind {
        SlotKind::SubroutineLocal => "subroutine_local".to_string(),
        SlotKind::RingBuffer { len } => format!("ring_buffer[{len}]"),
        SlotKind::BoundaryCache => "boundary_cache".to_string(),
        SlotKind::Global => "global".to_string(),
        SlotKind::CallerOutput => "caller_output".to_string(),
    }
}

/// Interns a core [`sigflow_core::ConstantValue`] into `function`'s constant
/// pool, mapping it to the bytecode backend's own [`Constant`] representation.
pub fn intern_scalar(function: &mut CompiledFunction, value: &sigflow_core::ConstantValue) -> u32 {
    let c = match value {
        sigflow_core::ConstantValue::F32Bits(b) => Constant::F32(f32::from_bits(*b)),
        sigflow_core::ConstantValue::F64Bits(b) => Constant::F64(f64::from_bits(*b)),
        sigflow_core::ConstantValue::I32(v) => Constant::I32(*v),
        sigflow_core::ConstantValue::I64(v) => Constant::I64(*v),
        sigflow_core::ConstantValue::Nil => Constant::Nil,
        sigflow_core::ConstantValue::True => Constant::True,
        sigflow_core::ConstantValue::Invariant(_) => Constant::Nil,
    };
    function.add_constant(c)
}
