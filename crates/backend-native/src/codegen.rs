use inkwell::context::Context;
use inkwell::builder::Builder;
use inkwell::module::Module;
use inkwell::passes::PassManager;
use inkwell::values::{BasicValue, BasicValueEnum, FunctionValue, PointerValue};
use inkwell::AddressSpace;
use sigflow_core::node::ConstantValue;
use sigflow_core::sidefx::{CompiledModule, DataSource, ImperativeKind, INode};
use sigflow_core::symbol::SlotId;
use std::collections::HashMap;

/// LLVM code generator for one compiled module's `evaluate` entry point.
///
/// The instance, argument, and result pointers are all opaque `i8*` —
/// everything this backend reads or writes is a byte-offset GEP into one of
/// the three, matching the flat layout the Side-Effect Compiler already
/// computed (§4.6.2 "Data sources").
pub struct NativeCodegen<'ctx> {
    context: &'ctx Context,
    module: Module<'ctx>,
    builder: Builder<'ctx>,
    fpm: PassManager<FunctionValue<'ctx>>,
    instance_ptr: Option<PointerValue<'ctx>>,
    arg_ptr: Option<PointerValue<'ctx>>,
    result_ptr: Option<PointerValue<'ctx>>,
    values: HashMap<INode, BasicValueEnum<'ctx>>,
}

impl<'ctx> NativeCodegen<'ctx> {
    /// `optimization_level` is `CompileFlags::optimization_level` (§6.5):
    /// `0` runs no passes at all, `1`-`2` run the pipeline once, `3` runs
    /// the instruction-combining/reassociate pair a second time the way
    /// the teacher's `LLVMCodegen` always does.
    pub fn new(context: &'ctx Context, module_name: &str, optimization_level: u8) -> Self {
        let module = context.create_module(module_name);
        let builder = context.create_builder();
        let fpm = PassManager::create(&module);

        // The fixed pipeline of §4.7 "Optimization", in the same order the
        // teacher's LLVMCodegen runs it.
        if optimization_level > 0 {
            fpm.add_cfg_simplification_pass();
            fpm.add_instruction_combining_pass();
            fpm.add_reassociate_pass();
            fpm.add_gvn_pass();
            fpm.add_basic_alias_analysis_pass();
            fpm.add_promote_memory_to_register_pass();
        }
        if optimization_level >= 3 {
            fpm.add_instruction_combining_pass();
            fpm.add_reassociate_pass();
        }
        fpm.initialize();

        NativeCodegen {
            context,
            module,
            builder,
            fpm,
            instance_ptr: None,
            arg_ptr: None,
            result_ptr: None,
            values: HashMap::new(),
        }
    }

    pub fn compile_module(&mut self, compiled: &CompiledModule) -> Result<(), String> {
        let ptr_type = self.context.ptr_type(AddressSpace::default());
        let void_type = self.context.void_type();
        let fn_type = void_type.fn_type(&[ptr_type.into(), ptr_type.into(), ptr_type.into()], false);
        let function = self.module.add_function("evaluate", fn_type, None);
        let entry = self.context.append_basic_block(function, "entry");
        self.builder.position_at_end(entry);

        self.instance_ptr = Some(function.get_nth_param(0).unwrap().into_pointer_value());
        self.arg_ptr = Some(function.get_nth_param(1).unwrap().into_pointer_value());
        self.result_ptr = Some(function.get_nth_param(2).unwrap().into_pointer_value());

        let root_value = self.compile_node(compiled, compiled.root)?;
        if let Some(result_ptr) = self.result_ptr {
            self.builder.build_store(result_ptr, root_value).map_err(|e| e.to_string())?;
        }
        self.builder.build_return(None).map_err(|e| e.to_string())?;

        self.module.verify().map_err(|e| e.to_string())?;
        self.fpm.run_on(&function);
        Ok(())
    }

    fn compile_node(&mut self, compiled: &CompiledModule, node: INode) -> Result<BasicValueEnum<'ctx>, String> {
        if let Some(&v) = self.values.get(&node) {
            return Ok(v);
        }
        let kind = compiled.imperative.kind(node).clone();
        let value = match kind {
            ImperativeKind::PointerOffset { base, byte_offset } => {
                let base_ptr = self.base_pointer(base);
                let i8_type = self.context.i8_type();
                let offset = self.context.i32_type().const_int(byte_offset as u64, false);
                let gep = unsafe {
                    self.builder.build_gep(i8_type, base_ptr, &[offset], "ptr_offset").map_err(|e| e.to_string())?
                };
                gep.into()
            }
            ImperativeKind::Load { from, ty_tag } => {
                let ptr = self.compile_node(compiled, from)?.into_pointer_value();
                self.builder.build_load(self.llvm_type_for_tag(ty_tag), ptr, "load").map_err(|e| e.to_string())?
            }
            ImperativeKind::LoadConstant(c) => self.compile_constant(&c),
            ImperativeKind::Store { to, value } => {
                let ptr = self.compile_node(compiled, to)?.into_pointer_value();
                let v = self.compile_node(compiled, value)?;
                self.builder.build_store(ptr, v).map_err(|e| e.to_string())?;
                ptr.into()
            }
            ImperativeKind::MemCpy { to, from, len } => {
                let dst = self.compile_node(compiled, to)?.into_pointer_value();
                let src = self.compile_node(compiled, from)?.into_pointer_value();
                let len_val = self.context.i64_type().const_int(len as u64, false);
                self.builder
                    .build_memcpy(dst, 1, src, 1, len_val)
                    .map_err(|e| e.to_string())?;
                dst.into()
            }
            ImperativeKind::AllocateState { .. } => self.context.i32_type().const_zero().into(),
            ImperativeKind::SubroutineCall { args, .. } => {
                // Inlined rather than a real `call`: subroutines aren't
                // compiled as separate LLVM functions yet (§4.7
                // "Subroutines" — memoized-by-signature compilation is
                // future work, see DESIGN.md).
                let mut last = self.context.f32_type().const_zero().into();
                for a in args {
                    last = self.compile_node(compiled, a)?;
                }
                last
            }
            ImperativeKind::ReadGlobalSlot { slot } => {
                let ptr = self.global_slot_pointer(compiled, slot);
                let f32_type = self.context.f32_type();
                self.builder.build_load(f32_type, ptr, "global_load").map_err(|e| e.to_string())?
            }
            ImperativeKind::WriteGlobalSlot { slot, value } => {
                let ptr = self.global_slot_pointer(compiled, slot);
                let v = self.compile_node(compiled, value)?;
                self.builder.build_store(ptr, v).map_err(|e| e.to_string())?;
                v
            }
            ImperativeKind::Sequence { first, then } => {
                self.compile_node(compiled, first)?;
                self.compile_node(compiled, then)?
            }
            ImperativeKind::TestMaskBit { .. } => {
                self.context.bool_type().const_int(1, false).into()
            }
            ImperativeKind::MultiDispatch { selector, branches } => self.compile_multi_dispatch(compiled, selector, &branches)?,
        };
        self.values.insert(node, value);
        Ok(value)
    }

    fn compile_constant(&self, c: &ConstantValue) -> BasicValueEnum<'ctx> {
        match c {
            ConstantValue::F32Bits(bits) => self.context.f32_type().const_float(f32::from_bits(*bits) as f64).into(),
            ConstantValue::F64Bits(bits) => self.context.f64_type().const_float(f64::from_bits(*bits)).into(),
            ConstantValue::I32(v) => self.context.i32_type().const_int(*v as u64, true).into(),
            ConstantValue::I64(v) => self.context.i64_type().const_int(*v as u64, true).into(),
            ConstantValue::True => self.context.bool_type().const_int(1, false).into(),
            ConstantValue::Nil | ConstantValue::Invariant(_) => self.context.f32_type().const_zero().into(),
        }
    }

    fn llvm_type_for_tag(&self, ty_tag: u32) -> inkwell::types::BasicTypeEnum<'ctx> {
        match ty_tag {
            1 => self.context.f64_type().into(),
            2 => self.context.i32_type().into(),
            3 => self.context.i64_type().into(),
            _ => self.context.f32_type().into(),
        }
    }

    /// Lowers a runtime-selected branch to an LLVM `switch` over basic
    /// blocks joined by a phi node (§4.7 "Scheduling"), rather than the
    /// unconditional evaluation of every branch the earlier `Switch`
    /// lowering used to produce.
    fn compile_multi_dispatch(
        &mut self,
        compiled: &CompiledModule,
        selector: INode,
        branches: &[INode],
    ) -> Result<BasicValueEnum<'ctx>, String> {
        let selector_value = self.compile_node(compiled, selector)?.into_int_value();
        let function = self.builder.get_insert_block().ok_or("no current block")?.get_parent().ok_or("no parent fn")?;

        let case_blocks: Vec<_> = (0..branches.len())
            .map(|i| self.context.append_basic_block(function, &format!("dispatch_case_{i}")))
            .collect();
        let default_block = self.context.append_basic_block(function, "dispatch_default");
        let merge_block = self.context.append_basic_block(function, "dispatch_merge");

        let cases: Vec<_> = case_blocks
            .iter()
            .enumerate()
            .map(|(i, bb)| (self.context.i32_type().const_int(i as u64, false), *bb))
            .collect();
        self.builder.build_switch(selector_value, default_block, &cases).map_err(|e| e.to_string())?;

        let mut incoming: Vec<(BasicValueEnum<'ctx>, inkwell::basic_block::BasicBlock<'ctx>)> = Vec::new();
        for (branch, case_block) in branches.iter().zip(case_blocks.iter()) {
            self.builder.position_at_end(*case_block);
            let v = self.compile_node(compiled, *branch)?;
            let ending_block = self.builder.get_insert_block().ok_or("no current block")?;
            self.builder.build_unconditional_branch(merge_block).map_err(|e| e.to_string())?;
            incoming.push((v, ending_block));
        }

        self.builder.position_at_end(default_block);
        let default_value: BasicValueEnum<'ctx> = self.context.f32_type().const_zero().into();
        self.builder.build_unconditional_branch(merge_block).map_err(|e| e.to_string())?;
        incoming.push((default_value, default_block));

        self.builder.position_at_end(merge_block);
        let phi = self.builder.build_phi(incoming[0].0.get_type(), "dispatch_result").map_err(|e| e.to_string())?;
        let refs: Vec<(&dyn BasicValue, inkwell::basic_block::BasicBlock)> =
            incoming.iter().map(|(v, bb)| (v as &dyn BasicValue, *bb)).collect();
        phi.add_incoming(&refs);
        Ok(phi.as_basic_value())
    }

    fn base_pointer(&self, source: DataSource) -> PointerValue<'ctx> {
        match source {
            DataSource::SubroutineLocal(_) | DataSource::RingBufferSlot(_) | DataSource::BoundaryCache(_) => {
                self.instance_ptr.expect("compile_module sets instance_ptr before lowering")
            }
            DataSource::GlobalSlot(_) => self.instance_ptr.expect("instance_ptr"),
            DataSource::CallerOutput => self.result_ptr.expect("compile_module sets result_ptr before lowering"),
        }
    }

    fn global_slot_pointer(&self, compiled: &CompiledModule, slot: SlotId) -> PointerValue<'ctx> {
        let base = self.instance_ptr.expect("instance_ptr");
        let i8_type = self.context.i8_type();
        let offset = self.context.i32_type().const_int(compiled.symbols.byte_offset(slot) as u64, false);
        unsafe { self.builder.build_gep(i8_type, base, &[offset], "global_slot").expect("gep") }
    }

    pub fn emit_object(&self, path: &std::path::Path) -> Result<(), String> {
        use inkwell::targets::{InitializationConfig, Target};

        Target::initialize_native(&InitializationConfig::default()).map_err(|e| e.to_string())?;
        let triple = self.module.get_triple();
        let target = Target::from_triple(&triple).map_err(|e| e.to_string())?;
        let machine = target
            .create_target_machine(
                &triple,
                "generic",
                "",
                inkwell::OptimizationLevel::Default,
                inkwell::targets::RelocMode::Default,
                inkwell::targets::CodeModel::Default,
            )
            .ok_or("could not create target machine")?;

        self.module.set_data_layout(&machine.get_target_data().get_data_layout());
        machine.write_to_file(&self.module, inkwell::targets::FileType::Object, path).map_err(|e| e.to_string())
    }
}
