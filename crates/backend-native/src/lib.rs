//! Native backend (§4.7 "Target Emitter"): lowers a compiled module's
//! imperative graph to LLVM IR via `inkwell`, gated behind the `llvm`
//! feature exactly as the teacher gates its own LLVM backend. Without the
//! feature this crate still builds — every entry point just reports that
//! native codegen isn't compiled in, so a driver can depend on this crate
//! unconditionally and only the `llvm` feature controls whether codegen is
//! actually available.

#[cfg(feature = "llvm")]
mod codegen;

#[cfg(feature = "llvm")]
pub use codegen::NativeCodegen;

/// Compiles `module` to an LLVM object file at `path`, running the
/// optimization pipeline at `optimization_level` (§6.5). Returns an error if
/// this crate was built without the `llvm` feature.
pub fn emit_object(
    module: &sigflow_core::sidefx::CompiledModule,
    path: &std::path::Path,
    optimization_level: u8,
) -> Result<(), String> {
    #[cfg(not(feature = "llvm"))]
    let _ = (module, path, optimization_level);

    #[cfg(feature = "llvm")]
    {
        let context = inkwell::context::Context::create();
        let mut codegen = codegen::NativeCodegen::new(&context, "sigflow_module", optimization_level);
        codegen.compile_module(module)?;
        codegen.emit_object(path)
    }
    #[cfg(not(feature = "llvm"))]
    {
        Err("sigflow-backend-native was built without the `llvm` feature".to_string())
    }
}
