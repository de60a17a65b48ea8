//! `CompilerContext` (§5, §9 Design Notes): the explicit argument every pass
//! threads through instead of reaching into a thread-local singleton. It
//! bundles the type-tag/generator intern tables, compile-time flags, and the
//! three hooks the embedding front end supplies: resolving an asset path,
//! linking a foreign symbol, and running a user specialization callback.

use crate::types::{GeneratorTable, TypeTagTable};
use std::collections::HashMap;
use std::rc::Rc;

/// Compile-time switches a front end may flip (§6.5, §9 flags).
#[derive(Debug, Clone, Default)]
pub struct CompileFlags {
    /// Skip Code Motion entirely — useful for comparing generated code
    /// with and without hoisting in a benchmark harness.
    pub disable_code_motion: bool,
    /// Skip Copy Elision — forces every node into a fresh buffer.
    pub disable_copy_elision: bool,
    /// Emit native (`backend-native`) code instead of bytecode.
    pub emit_native: bool,
    /// Emit only initialization and trigger entry points, no `evaluate`.
    pub omit_evaluate: bool,
    /// Compile without individual driver entry points (batch mode).
    pub omit_reactive_drivers: bool,
    /// Register and materialize external rate variables instead of
    /// treating rates as compile-time constants.
    pub dynamic_rate_support: bool,
    /// Produce a self-contained module rather than a side module.
    pub wasm_standalone_module: bool,
    /// 0 (no optimization) through 3 (most aggressive).
    pub optimization_level: u8,
}

/// Resolves a path referenced by the source program (e.g. a sample file or
/// an imported module) to bytes. Implemented by the embedding front end;
/// this crate never touches the filesystem itself.
pub trait AssetResolver {
    fn resolve(&self, path: &str) -> Option<Vec<u8>>;
}

/// Links a foreign-function symbol name to a callable the runtime can
/// invoke from a `ForeignFunction` node.
pub trait ForeignLinker {
    fn link(&self, symbol: &str) -> Option<usize>;
}

/// Invoked by a polymorphic call site to resolve which monomorphic branch
/// of `FunctionCall`'s `body` to compile for a given argument type — the
/// explicit replacement for the original's virtual `operate` dispatch.
pub trait Specializer {
    fn specialize(&self, generic_body_tag: u32, arg_type: &crate::types::Type) -> Option<crate::node::Node>;
}

/// Shared compilation state, passed by `&mut` reference to every pass
/// instead of living behind a thread-local (§9 Design Notes: "An explicit
/// `&mut CompilerContext` argument, not a thread-local singleton").
pub struct CompilerContext {
    pub flags: CompileFlags,
    pub type_tags: TypeTagTable,
    pub generators: GeneratorTable,
    pub diagnostics: crate::errors::Diagnostics,
    pub assets: Option<Rc<dyn AssetResolver>>,
    pub foreign: Option<Rc<dyn ForeignLinker>>,
    pub specializer: Option<Rc<dyn Specializer>>,
    /// A scratch cache available to any pass that wants one, keyed by an
    /// arbitrary string tag so unrelated passes don't collide.
    scratch: HashMap<String, u64>,
}

impl CompilerContext {
    pub fn new(flags: CompileFlags) -> Self {
        CompilerContext {
            flags,
            type_tags: TypeTagTable::new(),
            generators: GeneratorTable::new(),
            diagnostics: crate::errors::Diagnostics::default(),
            assets: None,
            foreign: None,
            specializer: None,
            scratch: HashMap::new(),
        }
    }

    pub fn with_assets(mut self, assets: Rc<dyn AssetResolver>) -> Self {
        self.assets = Some(assets);
        self
    }

    pub fn with_foreign_linker(mut self, linker: Rc<dyn ForeignLinker>) -> Self {
        self.foreign = Some(linker);
        self
    }

    pub fn with_specializer(mut self, specializer: Rc<dyn Specializer>) -> Self {
        self.specializer = Some(specializer);
        self
    }

    pub fn scratch_counter(&mut self, tag: &str) -> u64 {
        let entry = self.scratch.entry(tag.to_string()).or_insert(0);
        let value = *entry;
        *entry += 1;
        value
    }
}

impl Default for CompilerContext {
    fn default() -> Self {
        Self::new(CompileFlags::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_counters_are_independent_per_tag() {
        let mut ctx = CompilerContext::default();
        assert_eq!(ctx.scratch_counter("a"), 0);
        assert_eq!(ctx.scratch_counter("a"), 1);
        assert_eq!(ctx.scratch_counter("b"), 0);
    }
}
