//! The public-facing compiler API (§6.1/§6.2): the thin facade an embedding
//! host or CLI drives instead of calling into `sigflow-core`'s passes
//! directly. This crate owns no parser — graphs arrive pre-built (via
//! [`sigflow_core::builder::GraphBuilder`] or an embedder's own front end)
//! and `Compiler::make` runs them through the full pipeline and a target
//! backend.

use sigflow_core::context::{CompileFlags, CompilerContext};
use sigflow_core::node::{DriverId, Node, Uid};
use sigflow_core::sidefx::{CompiledModule, SideEffectCompiler};
use sigflow_core::{CompileError, Result};
use std::collections::HashMap;
use std::rc::Rc;

/// Which target backend `Compiler::make` should emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Bytecode,
    Native,
}

/// A resolved path for a module the embedder's front end asked to import.
/// This crate never reads the filesystem itself (§6.1): the callback is
/// supplied entirely by the host.
pub trait PathResolver {
    fn resolve(&self, package: &str, version: &str, file: &str) -> Option<String>;
}

/// Reports specialization progress back to the host (§6.1
/// `register_specialization_callback`).
pub trait SpecializationObserver {
    fn on_specialized(&self, name: &str, succeeded: bool);
}

/// Resolves a configuration-variable index to backing storage (§6.3
/// `get_configuration_slot`), queried both at compile time (by the Sizing
/// pass, to learn a configuration value's type/size) and at run time (to
/// read the value it currently holds).
pub trait ConfigurationProvider {
    fn get_configuration_slot(&self, index: i32) -> Option<u64>;
}

fn value_as_f32(value: sigflow_backend_bytecode::Value) -> f32 {
    match value {
        sigflow_backend_bytecode::Value::F32(v) => v,
        sigflow_backend_bytecode::Value::F64(v) => v as f32,
        sigflow_backend_bytecode::Value::I32(v) => v as f32,
        sigflow_backend_bytecode::Value::I64(v) => v as f32,
        sigflow_backend_bytecode::Value::Bool(v) => v as i32 as f32,
        sigflow_backend_bytecode::Value::Ptr(v) => v as f32,
        sigflow_backend_bytecode::Value::Nil => 0.0,
    }
}

/// One compiled signal-processing expression, ready to hand to a runtime
/// host (§6.2 "Compiled module interface").
pub enum CompiledClass {
    Bytecode(sigflow_backend_bytecode::CompiledProgram),
    Native { module: CompiledModule },
}

impl CompiledClass {
    /// Total bytes one instance of this module needs (§6.2 `get_size`).
    pub fn get_size(&self) -> i64 {
        match self {
            CompiledClass::Bytecode(program) => program.total_size as i64,
            CompiledClass::Native { module } => module.symbols.total_size() as i64,
        }
    }

    /// Kept for callers that used the earlier naive approximation.
    pub fn instance_size(&self) -> usize {
        self.get_size() as usize
    }

    /// Byte offset of the `index`-th external slot (§6.2 `get_symbol_offset`).
    pub fn get_symbol_offset(&self, index: usize) -> i64 {
        match self {
            CompiledClass::Bytecode(program) => {
                program.slot_offsets.get(index).copied().unwrap_or(0) as i64
            }
            CompiledClass::Native { module } => {
                module.symbols.byte_offset(sigflow_core::symbol::SlotId(index as u32)) as i64
            }
        }
    }

    /// Runs the one-shot init pass over `instance` — zeroes ring-buffer and
    /// boundary-cache state before the first `evaluate` (§6.2 `initialize`).
    pub fn initialize(&self, instance: &mut [u8]) -> Result<()> {
        match self {
            CompiledClass::Bytecode(program) => {
                sigflow_backend_bytecode::Vm::new(program, instance).initialize();
                Ok(())
            }
            CompiledClass::Native { .. } => Err(CompileError::internal(
                "initialize is only implemented for the bytecode backend; a native module's own object code runs its init block directly",
            )),
        }
    }

    /// Runs the evaluation pass once against `instance` and returns the
    /// scalar result (§6.2 `evaluate`).
    pub fn evaluate(&self, instance: &mut [u8]) -> Result<f32> {
        match self {
            CompiledClass::Bytecode(program) => {
                let mut vm = sigflow_backend_bytecode::Vm::new(program, instance);
                vm.evaluate().map(value_as_f32).map_err(CompileError::internal)
            }
            CompiledClass::Native { .. } => Err(CompileError::internal(
                "evaluate is only implemented for the bytecode backend; a native module is invoked through its emitted `evaluate` object-code entry point",
            )),
        }
    }

    /// Runs `evaluate` once per frame under trigger `T`'s driver, filling
    /// `out_frames` (§6.2 `process_T`). The bytecode VM doesn't branch on
    /// the calling driver — every trigger currently shares one compiled
    /// `evaluate` entry point — so `trigger` is accepted for interface
    /// parity with per-driver hosts and is not yet consulted.
    pub fn process(&self, _trigger: &str, instance: &mut [u8], out_frames: &mut [f32]) -> Result<()> {
        for out in out_frames.iter_mut() {
            *out = self.evaluate(instance)?;
        }
        Ok(())
    }
}

/// A compiler instance: the object `create_context` in §6.1 returns.
pub struct Compiler {
    context: CompilerContext,
    path_resolver: Option<Rc<dyn PathResolver>>,
    specialization_observer: Option<Rc<dyn SpecializationObserver>>,
    configuration: Option<Rc<dyn ConfigurationProvider>>,
    drivers: HashMap<DriverId, Rc<str>>,
}

impl Compiler {
    pub fn create_context(flags: CompileFlags) -> Self {
        Compiler {
            context: CompilerContext::new(flags),
            path_resolver: None,
            specialization_observer: None,
            configuration: None,
            drivers: HashMap::new(),
        }
    }

    pub fn set_path_resolver(&mut self, resolver: Rc<dyn PathResolver>) {
        self.path_resolver = Some(resolver);
    }

    /// Registers the host's configuration-slot callback (§6.3
    /// `get_configuration_slot`).
    pub fn set_configuration_provider(&mut self, provider: Rc<dyn ConfigurationProvider>) {
        self.configuration = Some(provider);
    }

    /// Queries the registered configuration provider, if any (§6.3).
    pub fn get_configuration_slot(&self, index: i32) -> Option<u64> {
        self.configuration.as_ref().and_then(|provider| provider.get_configuration_slot(index))
    }

    pub fn set_asset_linker(&mut self, linker: Rc<dyn sigflow_core::context::AssetResolver>) {
        self.context.assets = Some(linker);
    }

    pub fn register_specialization_callback(&mut self, observer: Rc<dyn SpecializationObserver>) {
        self.specialization_observer = Some(observer);
    }

    /// Registers a named reactive driver (a clock source like "audio" or
    /// "midi") so the reactive pass can recognize ticks against it.
    pub fn register_driver(&mut self, id: DriverId, name: impl Into<Rc<str>>) {
        self.drivers.insert(id, name.into());
    }

    pub fn context(&mut self) -> &mut CompilerContext {
        &mut self.context
    }

    /// The main entry point (§6.1 `make`): runs `expression`, already
    /// reduced to one value-graph root, through reactive analysis, code
    /// motion, copy elision, side-effect lowering, and the chosen backend.
    pub fn make(
        &mut self,
        backend: Backend,
        nodes: &mut sigflow_core::arena::Arena<sigflow_core::NodeKind>,
        expression: Node,
        argument_rx: sigflow_core::reactive::RxId,
    ) -> Result<CompiledClass> {
        let compiler = SideEffectCompiler::new(nodes);
        let module = compiler.compile(expression, argument_rx, &self.drivers, &self.context.flags)?;

        if let Some(observer) = &self.specialization_observer {
            observer.on_specialized("make", true);
        }

        match backend {
            Backend::Bytecode => {
                let mut program = sigflow_backend_bytecode::compile(&module);
                program.standalone = self.context.flags.wasm_standalone_module;
                Ok(CompiledClass::Bytecode(program))
            }
            Backend::Native => {
                if !self.context.flags.emit_native {
                    return Err(CompileError::internal(
                        "Backend::Native requested without emit_native set in CompileFlags",
                    ));
                }
                Ok(CompiledClass::Native { module })
            }
        }
    }
}

/// Synonym kept for parity with §6.1's free-function naming; prefer
/// [`Compiler::create_context`] directly.
pub fn create_context(flags: CompileFlags) -> Compiler {
    Compiler::create_context(flags)
}

/// Allocates a fresh [`Uid`] — external variables and globals both need one
/// per distinct binding.
pub fn fresh_uid(counter: &mut u64) -> Uid {
    let uid = Uid(*counter);
    *counter += 1;
    uid
}
