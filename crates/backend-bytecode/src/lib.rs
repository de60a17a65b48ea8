//! Stack-machine bytecode backend (§4.7): turns a
//! [`sigflow_core::sidefx::CompiledModule`] into a [`CompiledProgram`] and
//! can persist/reload it as a `.kjb` container (§10.4).

pub mod container;
pub mod emit;
pub mod opcode;
pub mod vm;

pub use container::{read_kjb, write_kjb};
pub use emit::Emitter;
pub use opcode::{CompiledFunction, CompiledProgram, Constant, Instruction, Opcode};
pub use vm::{Value, Vm};

use sigflow_core::sidefx::CompiledModule;

/// Compiles an already-lowered module straight to a [`CompiledProgram`].
pub fn compile(module: &CompiledModule) -> CompiledProgram {
    Emitter::new(module).emit_program()
}
