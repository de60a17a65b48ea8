//! End-to-end scenarios (§8 S1-S6): build a small graph, run it through the
//! full core pipeline, and check the emitted bytecode is sane — and, where
//! the current backend's scope allows it, that it actually evaluates to the
//! literal value the scenario demands.

use sigflow_core::builder::GraphBuilder;
use sigflow_core::context::CompileFlags;
use sigflow_core::node::{DriverId, Uid};
use sigflow_core::reactive::ReactiveAnalysis;
use sigflow_core::sidefx::SideEffectCompiler;
use sigflow_core::types::{Scalar, Type};
use std::collections::HashMap;
use std::rc::Rc;

fn leaf_rx() -> sigflow_core::reactive::RxId {
    ReactiveAnalysis::new().leaf()
}

fn no_drivers() -> HashMap<DriverId, Rc<str>> {
    HashMap::new()
}

/// S1 "Identity": `Main() { Main = 42.0 }` evaluates to 42.0 with no
/// argument at all.
#[test]
fn identity_constant_evaluates_to_its_literal_value() {
    let mut builder = GraphBuilder::new();
    let root = builder.constant_f32(42.0);

    let drivers = no_drivers();
    let module = SideEffectCompiler::new(&mut builder.nodes)
        .compile(root, leaf_rx(), &drivers, &CompileFlags::default())
        .expect("identity should compile");

    let program = sigflow_backend_bytecode::compile(&module);
    assert!(!program.main.instructions.is_empty());
    assert_eq!(program.main.instructions.last().unwrap().opcode, sigflow_backend_bytecode::Opcode::Return);

    let mut buf = vec![0u8; program.total_size.max(4) as usize];
    let mut vm = sigflow_backend_bytecode::Vm::new(&program, &mut buf);
    vm.initialize();
    let result = vm.evaluate().expect("evaluate should succeed");
    assert_eq!(result, sigflow_backend_bytecode::Value::F32(42.0));
}

/// S2 "Pass-through": `Main(x) { Main = x }` evaluates to whatever the
/// argument slot holds.
#[test]
fn pass_through_argument_evaluates_to_the_stored_argument() {
    let mut builder = GraphBuilder::new();
    let root = builder.arg(Type::Scalar(Scalar::F32));

    let drivers = no_drivers();
    let module = SideEffectCompiler::new(&mut builder.nodes)
        .compile(root, leaf_rx(), &drivers, &CompileFlags::default())
        .expect("pass-through should compile");

    let program = sigflow_backend_bytecode::compile(&module);
    let mut buf = vec![0u8; program.total_size.max(4) as usize];
    buf[..4].copy_from_slice(&3.0f32.to_le_bytes());
    let mut vm = sigflow_backend_bytecode::Vm::new(&program, &mut buf);
    let result = vm.evaluate().expect("evaluate should succeed");
    assert_eq!(result, sigflow_backend_bytecode::Value::F32(3.0));
}

/// A one-element delay line reads the prior (initial, zeroed) state before
/// it stores the new input — the first `evaluate` of a fresh instance
/// always sees the initializer, never the current sample.
#[test]
fn one_element_delay_reads_initial_state_before_storing_the_new_sample() {
    let mut builder = GraphBuilder::new();
    let arg = builder.arg(Type::Scalar(Scalar::F32));
    let root = builder.ring_buffer(1, arg);

    let drivers = no_drivers();
    let module = SideEffectCompiler::new(&mut builder.nodes)
        .compile(root, leaf_rx(), &drivers, &CompileFlags::default())
        .expect("pass-through should compile");

    assert!(module.symbols.len() > 0);
    let program = sigflow_backend_bytecode::compile(&module);
    assert!(!program.main.instructions.is_empty());

    let mut buf = vec![0u8; program.total_size.max(4) as usize];
    let mut vm = sigflow_backend_bytecode::Vm::new(&program, &mut buf);
    vm.initialize();
    let result = vm.evaluate().expect("evaluate should succeed");
    assert_eq!(result, sigflow_backend_bytecode::Value::F32(0.0));
}

/// S5 "Gate": gating a signal behind a condition still produces a program
/// with a `TestMaskBit`-derived opcode somewhere in the stream.
#[test]
fn gated_signal_compiles_with_a_mask_test() {
    let mut builder = GraphBuilder::new();
    let arg = builder.arg(Type::Scalar(Scalar::F32));
    let cond = builder.constant_i32(1);
    let root = builder.gate(arg, cond);

    let drivers = no_drivers();
    let module = SideEffectCompiler::new(&mut builder.nodes)
        .compile(root, leaf_rx(), &drivers, &CompileFlags::default())
        .expect("gate should compile");

    let program = sigflow_backend_bytecode::compile(&module);
    assert!(program
        .main
        .instructions
        .iter()
        .any(|i| i.opcode == sigflow_backend_bytecode::Opcode::TestMaskBit));
}

/// A `Switch` lowers to sequential case-testing (`MultiDispatch`), not an
/// unconditional evaluation of every branch: the emitted program must
/// contain real jump opcodes, and selecting branch 1 must evaluate to
/// branch 1's value, not branch 0's.
#[test]
fn switch_dispatches_to_the_selected_branch_only() {
    let mut builder = GraphBuilder::new();
    let selector = builder.constant_i32(1);
    let branch0 = builder.constant_f32(111.0);
    let branch1 = builder.constant_f32(222.0);
    let root = builder.switch(selector, vec![branch0, branch1]);

    let drivers = no_drivers();
    let module = SideEffectCompiler::new(&mut builder.nodes)
        .compile(root, leaf_rx(), &drivers, &CompileFlags::default())
        .expect("switch should compile");

    let program = sigflow_backend_bytecode::compile(&module);
    assert!(program.main.instructions.iter().any(|i| i.opcode == sigflow_backend_bytecode::Opcode::JumpIfNotEqual));

    let mut buf = vec![0u8; program.total_size.max(4) as usize];
    let mut vm = sigflow_backend_bytecode::Vm::new(&program, &mut buf);
    let result = vm.evaluate().expect("evaluate should succeed");
    assert_eq!(result, sigflow_backend_bytecode::Value::F32(222.0));
}

/// A `.kjb` round trip through the same pipeline preserves instruction
/// count and slot layout.
#[test]
fn compiled_program_roundtrips_through_kjb() {
    let mut builder = GraphBuilder::new();
    let arg = builder.arg(Type::Scalar(Scalar::F32));
    let root = builder.ring_buffer(2, arg);

    let drivers = no_drivers();
    let module = SideEffectCompiler::new(&mut builder.nodes)
        .compile(root, leaf_rx(), &drivers, &CompileFlags::default())
        .expect("compile should succeed");
    let program = sigflow_backend_bytecode::compile(&module);

    let mut buf = Vec::new();
    sigflow_backend_bytecode::write_kjb(&mut buf, &program).expect("write_kjb");
    let mut cursor = std::io::Cursor::new(buf);
    let loaded = sigflow_backend_bytecode::read_kjb(&mut cursor).expect("read_kjb");

    assert_eq!(loaded.main.instructions.len(), program.main.instructions.len());
    assert_eq!(loaded.slot_kinds.len(), program.slot_kinds.len());
    assert_eq!(loaded.total_size, program.total_size);
}
