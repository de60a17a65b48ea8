//! Middle- and back-end compiler core for a reactive signal-processing
//! language: type algebra, hash-consed node arenas, reactive clock
//! analysis, code motion, copy elision, and side-effect lowering. A target
//! backend (`sigflow-backend-bytecode`, `sigflow-backend-native`) takes a
//! [`sidefx::CompiledModule`] from here and emits something runnable.

pub mod arena;
pub mod builder;
pub mod code_motion;
pub mod context;
pub mod copy_elision;
pub mod errors;
pub mod node;
pub mod reactive;
pub mod sidefx;
pub mod symbol;
pub mod types;

pub use errors::{CompileError, Result};
pub use node::{ConstantValue, DriverId, Node, NodeKind, Uid};
pub use sidefx::{CompiledModule, SideEffectCompiler};
pub use types::Type;
