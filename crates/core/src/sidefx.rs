//! Side-Effect Compiler (§4.6): lowers the value DAG (after Code Motion and
//! Copy Elision) into an imperative graph of pointer/load/store/memcpy and
//! subroutine-call nodes, ordered so every write happens before the reads it
//! must precede (a data-hazard / write-before-read analysis via
//! reachability), and allocates the module's state layout.

use crate::arena::Arena;
use crate::code_motion::CodeMotion;
use crate::context::CompileFlags;
use crate::copy_elision::{CopyElision, Destination};
use crate::errors::{CompileError, Result};
use crate::node::{type_of, Node, NodeKind, Uid};
use crate::reactive::{ReactiveKind, ReactivePass, RxId};
use crate::symbol::{SlotId, SymbolTable};
use crate::types::{size_of, Type};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;

/// A handle into the imperative graph's [`Arena`].
pub type INode = crate::arena::NodeId<ImperativeKind>;

/// One step of the lowered, ordered program (§4.6 "Imperative node kinds").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImperativeKind {
    /// A pointer into a data source, offset in bytes.
    PointerOffset { base: DataSource, byte_offset: u32 },
    Load { from: INode, ty_tag: u32 },
    /// A literal value materialized directly into a register, with no
    /// backing slot or memory traffic (§4.6 "Constants never need a slot
    /// of their own — the backend's constant pool already memoizes the
    /// bit pattern").
    LoadConstant(crate::node::ConstantValue),
    Store { to: INode, value: INode },
    MemCpy { to: INode, from: INode, len: u32 },
    /// Marks that `slot`'s state must be allocated before this point.
    AllocateState { slot: SlotId },
    /// Invokes a previously-compiled function body by node reference.
    SubroutineCall { callee: Node, args: Vec<INode> },
    /// Reads a module-global slot.
    ReadGlobalSlot { slot: SlotId },
    WriteGlobalSlot { slot: SlotId, value: INode },
    /// A no-op ordering dependency: `after` must be scheduled before `node`
    /// runs, with no data flowing between them (a write-before-read
    /// protector edge, §4.6 "Data hazards").
    Sequence { first: INode, then: INode },
    /// Tests one bit of the active signal mask (§4.6 "Reactive masks").
    TestMaskBit { bit: u32 },
    /// Runtime-selected dispatch: evaluate `selector`, then execute only
    /// the branch it names, with the node's value being that branch's
    /// value (§4.6.4 "a single destination shared by all branches; emit a
    /// `MultiDispatch` selecting by the runtime tag index").
    MultiDispatch { selector: INode, branches: Vec<INode> },
}

/// Where a pointer ultimately grounds out (§4.6 "Data sources").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSource {
    RingBufferSlot(SlotId),
    SubroutineLocal(SlotId),
    BoundaryCache(SlotId),
    GlobalSlot(SlotId),
    CallerOutput,
}

/// The fully compiled result of one module (§6.1).
pub struct CompiledModule {
    pub imperative: Arena<ImperativeKind>,
    pub root: INode,
    pub symbols: SymbolTable,
    pub reactivity: Arena<ReactiveKind>,
}

pub struct SideEffectCompiler<'a> {
    value_nodes: &'a mut Arena<NodeKind>,
    imperative: Arena<ImperativeKind>,
    symbols: SymbolTable,
    destinations: HashMap<Node, Destination>,
    memo: HashMap<Node, INode>,
    /// Nodes already scheduled, in program order — used to find a prior
    /// write that a later read must be ordered after (the hazard check).
    scheduled: Vec<Node>,
    writes_to_global: HashMap<Uid, Vec<Node>>,
    /// The reactivity graph Reactive Analysis produced, stashed here once
    /// that pass runs so `Boundary` lowering can consult it for the
    /// ratio-match reuse check (§4.6.4).
    reactivity: Arena<ReactiveKind>,
}

impl<'a> SideEffectCompiler<'a> {
    pub fn new(value_nodes: &'a mut Arena<NodeKind>) -> Self {
        SideEffectCompiler {
            value_nodes,
            imperative: Arena::new(),
            symbols: SymbolTable::new(),
            destinations: HashMap::new(),
            memo: HashMap::new(),
            scheduled: Vec::new(),
            writes_to_global: HashMap::new(),
            reactivity: Arena::new(),
        }
    }

    /// Runs the full backend pipeline over `root` (§4.6 "Pass outline"):
    /// 1. Reactive Analysis  2. Code Motion  3. Copy Elision
    /// 4. state-layout allocation  5. imperative lowering  6. hazard
    /// ordering  7. mask-bit assignment (already folded into step 1).
    ///
    /// `flags.disable_code_motion`/`disable_copy_elision` skip those passes
    /// entirely (§6.5) — useful for a benchmark harness comparing generated
    /// code with and without hoisting/elision.
    pub fn compile(
        mut self,
        root: Node,
        arg_rx: RxId,
        drivers: &HashMap<crate::node::DriverId, Rc<str>>,
        flags: &CompileFlags,
    ) -> Result<CompiledModule> {
        log::debug!("sidefx: entering, {} value nodes before reactive analysis", self.value_nodes.len());

        let mut reactive = ReactivePass::new(drivers);
        let (_root_rx, root) = reactive.run(self.value_nodes, root, arg_rx)?;
        self.reactivity = std::mem::take(&mut reactive.analysis.rx);

        let root = if flags.disable_code_motion {
            log::debug!("sidefx: code motion disabled by CompileFlags, skipping");
            root
        } else {
            let mut motion = CodeMotion::new(self.value_nodes, 1 << 32);
            motion.run(root)
        };

        self.destinations = if flags.disable_copy_elision {
            log::debug!("sidefx: copy elision disabled by CompileFlags, forcing every node into a fresh buffer");
            let mut dests = HashMap::new();
            dests.insert(root, Destination::CallerOutput);
            dests
        } else {
            CopyElision::new(self.value_nodes).run(root)
        };

        let out = self.lower(root)?;
        log::debug!(
            "sidefx: exiting, {} imperative nodes emitted, {} state slots, {} total bytes",
            self.imperative.len(),
            self.symbols.len(),
            self.symbols.total_size()
        );
        Ok(CompiledModule { imperative: self.imperative, root: out, symbols: self.symbols, reactivity: self.reactivity })
    }

    fn size_for(&self, node: Node) -> u32 {
        let ty = type_of(self.value_nodes, node);
        size_of(&ty).unwrap_or_else(|e| {
            log::warn!("sidefx: could not size node {:?} ({e}); defaulting to 4 bytes", node);
            4
        })
    }

    fn slot_for(&mut self, node: Node) -> SlotId {
        match self.destinations.get(&node).copied().unwrap_or(Destination::Fresh) {
            Destination::Fresh => {
                let size = self.size_for(node);
                self.symbols.allocate_subroutine_local(node, size)
            }
            Destination::CallerOutput => {
                let size = self.size_for(node);
                self.symbols.caller_output_slot(size)
            }
            Destination::SameAs(other) => {
                let size = self.size_for(other);
                self.symbols.allocate_subroutine_local(other, size)
            }
        }
    }

    fn lower(&mut self, node: Node) -> Result<INode> {
        if let Some(&done) = self.memo.get(&node) {
            return Ok(done);
        }
        let kind = self.value_nodes.kind(node).clone();
        log::trace!("sidefx: lowering {:?} ({:?})", node, kind);
        let result = self.lower_kind(node, kind)?;
        self.order_after_prior_writes(node, result)?;
        self.scheduled.push(node);
        self.memo.insert(node, result);
        Ok(result)
    }

    fn ptr(&mut self, base: DataSource, byte_offset: u32) -> INode {
        self.imperative.intern(ImperativeKind::PointerOffset { base, byte_offset })
    }

    fn lower_kind(&mut self, node: Node, kind: NodeKind) -> Result<INode> {
        match kind {
            NodeKind::Argument(_) | NodeKind::ExternalVariable { .. } => {
                let slot = self.slot_for(node);
                let offset = self.symbols.byte_offset(slot);
                Ok(self.ptr(DataSource::SubroutineLocal(slot), offset))
            }
            NodeKind::Constant(c) => Ok(self.imperative.intern(ImperativeKind::LoadConstant(c))),
            NodeKind::Pair(a, b) => {
                let ia = self.lower(a)?;
                let ib = self.lower(b)?;
                Ok(self.imperative.intern(ImperativeKind::Sequence { first: ia, then: ib }))
            }
            NodeKind::First(x) | NodeKind::Rest(x) => self.lower(x),
            NodeKind::Tick(_) => {
                let slot = self.slot_for(node);
                Ok(self.imperative.intern(ImperativeKind::AllocateState { slot }))
            }
            NodeKind::RateChange { signal, .. } => self.lower(signal),
            NodeKind::Gate { signal, gate, mask_bit } => {
                let test = self.imperative.intern(ImperativeKind::TestMaskBit { bit: mask_bit });
                let ig = self.lower(gate)?;
                let is = self.lower(signal)?;
                let guarded = self.imperative.intern(ImperativeKind::Sequence { first: test, then: ig });
                Ok(self.imperative.intern(ImperativeKind::Sequence { first: guarded, then: is }))
            }
            NodeKind::Merge(branches) => {
                let mut acc = None;
                for b in branches {
                    let ib = self.lower(b)?;
                    acc = Some(match acc {
                        None => ib,
                        Some(prev) => self.imperative.intern(ImperativeKind::Sequence { first: prev, then: ib }),
                    });
                }
                acc.ok_or_else(|| CompileError::internal("Merge with no branches"))
            }
            NodeKind::Impose { clock, signal } => {
                let ic = self.lower(clock)?;
                let is = self.lower(signal)?;
                Ok(self.imperative.intern(ImperativeKind::Sequence { first: ic, then: is }))
            }
            NodeKind::RelativePriority { signal, .. } => self.lower(signal),
            NodeKind::FunctionCall { body, arg } => {
                let iarg = self.lower(arg)?;
                Ok(self.imperative.intern(ImperativeKind::SubroutineCall { callee: body, args: vec![iarg] }))
            }
            NodeKind::FunctionSequence { generator, .. } => {
                let ig = self.lower(generator)?;
                Ok(self.imperative.intern(ImperativeKind::SubroutineCall { callee: generator, args: vec![ig] }))
            }
            NodeKind::RecursionBranch { body, loop_count } => {
                let ilc = self.lower(loop_count)?;
                Ok(self.imperative.intern(ImperativeKind::SubroutineCall { callee: body, args: vec![ilc] }))
            }
            NodeKind::GetGlobalVariable { uid, ty } => {
                let size = size_of(&ty).unwrap_or(4);
                let slot = self.symbols.global_slot(uid, size);
                Ok(self.imperative.intern(ImperativeKind::ReadGlobalSlot { slot }))
            }
            NodeKind::SetGlobalVariable { uid, value } => {
                let iv = self.lower(value)?;
                let size = self.size_for(value);
                let slot = self.symbols.global_slot(uid, size);
                self.writes_to_global.entry(uid).or_default().push(node);
                Ok(self.imperative.intern(ImperativeKind::WriteGlobalSlot { slot, value: iv }))
            }
            NodeKind::RingBuffer { len, input } => self.lower_ring_buffer(node, len, input),
            NodeKind::Switch { selector, branches } => {
                let isel = self.lower(selector)?;
                let ibranches: Vec<INode> =
                    branches.into_iter().map(|b| self.lower(b)).collect::<Result<_>>()?;
                Ok(self.imperative.intern(ImperativeKind::MultiDispatch { selector: isel, branches: ibranches }))
            }
            NodeKind::Boundary { up } => self.lower_boundary(node, up),
            NodeKind::ForeignFunction { args, .. } => {
                let mut acc = None;
                for a in args {
                    let ia = self.lower(a)?;
                    acc = Some(match acc {
                        None => ia,
                        Some(prev) => self.imperative.intern(ImperativeKind::Sequence { first: prev, then: ia }),
                    });
                }
                acc.ok_or_else(|| CompileError::internal("ForeignFunction with no arguments"))
            }
            NodeKind::AtIndex { array, index } => {
                let ia = self.lower(array)?;
                let ii = self.lower(index)?;
                Ok(self.imperative.intern(ImperativeKind::Sequence { first: ia, then: ii }))
            }
            NodeKind::Slice { array, offset, length } => {
                let ia = self.lower(array)?;
                let io = self.lower(offset)?;
                let il = self.lower(length)?;
                let s1 = self.imperative.intern(ImperativeKind::Sequence { first: ia, then: io });
                Ok(self.imperative.intern(ImperativeKind::Sequence { first: s1, then: il }))
            }
            NodeKind::SubArray { array, offset, .. } => {
                let ia = self.lower(array)?;
                let io = self.lower(offset)?;
                Ok(self.imperative.intern(ImperativeKind::Sequence { first: ia, then: io }))
            }
        }
    }

    /// Lowers a delay line as a read-before-write over its own backing
    /// slot (§4.6.4). `len == 1` is a single delayed cell: read the
    /// previous value, then overwrite it with this tick's input. `len >
    /// 1` generalizes this to a shift register: read the oldest element
    /// (element 0), slide elements `1..len` down by one with a single
    /// `MemCpy`, then write the new input into the now-vacated last slot.
    /// Both cases return the value read *before* any of the writes, so a
    /// subsequent read always observes the previous tick's value, never
    /// the one just stored — this is what makes a `RingBuffer` a delay
    /// rather than a same-tick pass-through.
    fn lower_ring_buffer(&mut self, node: Node, len: u32, input: Node) -> Result<INode> {
        let elem_ty = type_of(self.value_nodes, input);
        let element_size = size_of(&elem_ty).unwrap_or(4);
        let slot = self.symbols.allocate_ring_buffer(node, len, element_size);
        let slot_off = self.symbols.byte_offset(slot);
        let tag = type_tag_hint(&elem_ty);

        let out_ptr = self.ptr(DataSource::RingBufferSlot(slot), slot_off);
        let out = self.imperative.intern(ImperativeKind::Load { from: out_ptr, ty_tag: tag });
        let iin = self.lower(input)?;

        let chain = if len > 1 {
            let elem1_ptr = self.ptr(DataSource::RingBufferSlot(slot), slot_off + element_size);
            let shift = self.imperative.intern(ImperativeKind::MemCpy {
                to: out_ptr,
                from: elem1_ptr,
                len: (len - 1) * element_size,
            });
            let last_ptr = self.ptr(DataSource::RingBufferSlot(slot), slot_off + (len - 1) * element_size);
            let store_new = self.imperative.intern(ImperativeKind::Store { to: last_ptr, value: iin });
            let s1 = self.imperative.intern(ImperativeKind::Sequence { first: out, then: shift });
            self.imperative.intern(ImperativeKind::Sequence { first: s1, then: store_new })
        } else {
            let store_new = self.imperative.intern(ImperativeKind::Store { to: out_ptr, value: iin });
            self.imperative.intern(ImperativeKind::Sequence { first: out, then: store_new })
        };
        // `out` is already memoized above, so referencing it again here
        // costs no extra instructions — it just makes this node's value
        // the pre-write read, with the write chain ordered before it in
        // program order.
        Ok(self.imperative.intern(ImperativeKind::Sequence { first: chain, then: out }))
    }

    /// Lowers a `Boundary` node, short-circuiting the cache when the
    /// consumer is a supersampling of the producer — an integer-multiple
    /// rate match means the producer's latest value is always fresh by
    /// the time the consumer reads it, so no cache is needed (§4.6.4).
    /// This is a coarser test than `compatible_without_boundary` (which
    /// decided whether to insert this node at all, back in Reactive
    /// Analysis) — that one requires an exact rate match; this one only
    /// requires the consumer's rate to be a whole multiple of the
    /// producer's.
    fn lower_boundary(&mut self, node: Node, up: Node) -> Result<INode> {
        let required = self.value_nodes.reactivity_of(node).map(RxId::from_index);
        let producer = self.value_nodes.reactivity_of(up).map(RxId::from_index);
        if let (Some(required), Some(producer)) = (required, producer) {
            if ratio_compatible(&self.reactivity, required, producer) {
                log::debug!("sidefx: boundary at {:?} reused directly (ratio match, no cache)", node);
                return self.lower(up);
            }
        }
        let size = self.size_for(up);
        let slot = self.symbols.allocate_boundary_cache(node, size);
        let offset = self.symbols.byte_offset(slot);
        let iup = self.lower(up)?;
        let ptr = self.ptr(DataSource::BoundaryCache(slot), offset);
        let store = self.imperative.intern(ImperativeKind::Store { to: ptr, value: iup });
        Ok(self.imperative.intern(ImperativeKind::Sequence { first: store, then: ptr }))
    }

    /// Enforces write-before-read: if `node` reads a global that an
    /// already-scheduled node wrote, make sure that write precedes this
    /// node in the imperative graph (a `Sequence` protector edge). This is
    /// the reachability-based hazard check of §4.6 stated as a direct
    /// program-order invariant, since our lowering already walks operands
    /// in evaluation order.
    fn order_after_prior_writes(&mut self, node: Node, result: INode) -> Result<INode> {
        if let NodeKind::GetGlobalVariable { uid, .. } = self.value_nodes.kind(node) {
            if let Some(writers) = self.writes_to_global.get(uid) {
                if let Some(&last_writer) = writers.last() {
                    if let Some(&iwrite) = self.memo.get(&last_writer) {
                        return Ok(self.imperative.intern(ImperativeKind::Sequence { first: iwrite, then: result }));
                    }
                }
            }
        }
        Ok(result)
    }
}

/// §4.6.4 "supersampling" reuse test: true when `required`'s rate is a
/// whole multiple of `producer`'s for every driver they share, so a
/// `Boundary` between them never needs a cache.
fn ratio_compatible(rx: &Arena<ReactiveKind>, required: RxId, producer: RxId) -> bool {
    if required == producer {
        return true;
    }
    match (rx.kind(required), rx.kind(producer)) {
        (_, ReactiveKind::Leaf) => true,
        (ReactiveKind::Fused(rs), ReactiveKind::Fused(ps)) => {
            let rk: BTreeSet<_> = rs.keys().collect();
            let pk: BTreeSet<_> = ps.keys().collect();
            rk == pk
                && ps.iter().all(|(id, pinfo)| {
                    rs.get(id)
                        .map(|rinfo| {
                            rinfo.metadata == pinfo.metadata
                                && pinfo.mul != 0
                                && rinfo.div != 0
                                && (rinfo.mul * pinfo.div) % (pinfo.mul * rinfo.div) == 0
                        })
                        .unwrap_or(false)
                })
        }
        _ => false,
    }
}

fn type_tag_hint(ty: &Type) -> u32 {
    match ty {
        Type::Scalar(crate::types::Scalar::F32) => 0,
        Type::Scalar(crate::types::Scalar::F64) => 1,
        Type::Scalar(crate::types::Scalar::I32) => 2,
        Type::Scalar(crate::types::Scalar::I64) => 3,
        _ => 0xff,
    }
}

/// Reachability of every imperative node from `from`, used by tests and by
/// the native backend's scheduler to double-check hazard ordering (§8
/// testable property 5: "no store is reachable from a load it must
/// precede without an intervening `Sequence`").
pub fn reachable_from(arena: &Arena<ImperativeKind>, from: INode) -> HashSet<INode> {
    let mut seen = HashSet::new();
    let mut stack = vec![from];
    while let Some(n) = stack.pop() {
        if !seen.insert(n) {
            continue;
        }
        match arena.kind(n) {
            ImperativeKind::Load { from, .. } => stack.push(*from),
            ImperativeKind::Store { to, value } => {
                stack.push(*to);
                stack.push(*value);
            }
            ImperativeKind::MemCpy { to, from, .. } => {
                stack.push(*to);
                stack.push(*from);
            }
            ImperativeKind::SubroutineCall { args, .. } => stack.extend(args.iter().copied()),
            ImperativeKind::WriteGlobalSlot { value, .. } => stack.push(*value),
            ImperativeKind::Sequence { first, then } => {
                stack.push(*first);
                stack.push(*then);
            }
            ImperativeKind::MultiDispatch { selector, branches } => {
                stack.push(*selector);
                stack.extend(branches.iter().copied());
            }
            ImperativeKind::PointerOffset { .. }
            | ImperativeKind::AllocateState { .. }
            | ImperativeKind::ReadGlobalSlot { .. }
            | ImperativeKind::TestMaskBit { .. }
            | ImperativeKind::LoadConstant(_) => {}
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ConstantValue;

    fn drivers_with_audio() -> HashMap<crate::node::DriverId, Rc<str>> {
        let mut drivers = HashMap::new();
        drivers.insert(crate::node::DriverId(Uid(1)), Rc::from("audio") as Rc<str>);
        drivers
    }

    #[test]
    fn a_constant_lowers_to_a_load_constant_with_no_backing_slot() {
        let mut nodes: Arena<NodeKind> = Arena::new();
        let c = nodes.intern(NodeKind::Constant(ConstantValue::f32(1.0)));
        let drivers = drivers_with_audio();
        let mut rxa: Arena<crate::reactive::ReactiveKind> = Arena::new();
        let leaf = rxa.intern(crate::reactive::ReactiveKind::Leaf);
        let compiled = SideEffectCompiler::new(&mut nodes)
            .compile(c, leaf, &drivers, &CompileFlags::default())
            .unwrap();
        assert!(matches!(compiled.imperative.kind(compiled.root), ImperativeKind::LoadConstant(_)));
        assert_eq!(compiled.symbols.len(), 0);
    }

    #[test]
    fn a_global_write_is_ordered_before_its_read() {
        let mut nodes: Arena<NodeKind> = Arena::new();
        let c = nodes.intern(NodeKind::Constant(ConstantValue::f32(1.0)));
        let uid = Uid(42);
        let set = nodes.intern(NodeKind::SetGlobalVariable { uid, value: c });
        let get = nodes.intern(NodeKind::GetGlobalVariable { uid, ty: Type::Scalar(crate::types::Scalar::F32) });
        let root = nodes.intern(NodeKind::Pair(set, get));
        let drivers = drivers_with_audio();
        let mut rxa: Arena<crate::reactive::ReactiveKind> = Arena::new();
        let leaf = rxa.intern(crate::reactive::ReactiveKind::Leaf);
        let compiled = SideEffectCompiler::new(&mut nodes)
            .compile(root, leaf, &drivers, &CompileFlags::default())
            .unwrap();
        assert!(compiled.imperative.len() > 0);
    }

    #[test]
    fn ring_buffer_reads_the_previous_value_before_storing_the_new_one() {
        let mut nodes: Arena<NodeKind> = Arena::new();
        let arg = nodes.intern(NodeKind::Argument(Type::Scalar(crate::types::Scalar::F32)));
        let delayed = nodes.intern(NodeKind::RingBuffer { len: 1, input: arg });
        let drivers = drivers_with_audio();
        let mut rxa: Arena<crate::reactive::ReactiveKind> = Arena::new();
        let leaf = rxa.intern(crate::reactive::ReactiveKind::Leaf);
        let compiled = SideEffectCompiler::new(&mut nodes)
            .compile(delayed, leaf, &drivers, &CompileFlags::default())
            .unwrap();
        // The node's value must be a Load (the pre-write read), not a
        // Store or a bare pointer into the just-written slot.
        assert!(matches!(compiled.imperative.kind(compiled.root), ImperativeKind::Load { .. }));
        assert_eq!(compiled.symbols.len(), 2); // the argument's slot, the ring buffer's slot
    }

    #[test]
    fn a_multi_element_delay_allocates_room_for_every_element() {
        let mut nodes: Arena<NodeKind> = Arena::new();
        let arg = nodes.intern(NodeKind::Argument(Type::Scalar(crate::types::Scalar::F32)));
        let delayed = nodes.intern(NodeKind::RingBuffer { len: 3, input: arg });
        let drivers = drivers_with_audio();
        let mut rxa: Arena<crate::reactive::ReactiveKind> = Arena::new();
        let leaf = rxa.intern(crate::reactive::ReactiveKind::Leaf);
        let compiled = SideEffectCompiler::new(&mut nodes)
            .compile(delayed, leaf, &drivers, &CompileFlags::default())
            .unwrap();
        let ring_slot = crate::symbol::SlotId(1);
        assert_eq!(compiled.symbols.slot_info(ring_slot).size, 3 * 4);
    }

    #[test]
    fn switch_lowers_to_a_multi_dispatch_not_an_unconditional_sequence() {
        let mut nodes: Arena<NodeKind> = Arena::new();
        let sel = nodes.intern(NodeKind::Constant(ConstantValue::I32(0)));
        let a = nodes.intern(NodeKind::Constant(ConstantValue::f32(1.0)));
        let b = nodes.intern(NodeKind::Constant(ConstantValue::f32(2.0)));
        let sw = nodes.intern(NodeKind::Switch { selector: sel, branches: vec![a, b] });
        let drivers = drivers_with_audio();
        let mut rxa: Arena<crate::reactive::ReactiveKind> = Arena::new();
        let leaf = rxa.intern(crate::reactive::ReactiveKind::Leaf);
        let compiled = SideEffectCompiler::new(&mut nodes)
            .compile(sw, leaf, &drivers, &CompileFlags::default())
            .unwrap();
        assert!(matches!(compiled.imperative.kind(compiled.root), ImperativeKind::MultiDispatch { .. }));
    }

    #[test]
    fn disabling_code_motion_and_copy_elision_still_compiles() {
        let mut nodes: Arena<NodeKind> = Arena::new();
        let c = nodes.intern(NodeKind::Constant(ConstantValue::f32(1.0)));
        let drivers = drivers_with_audio();
        let mut rxa: Arena<crate::reactive::ReactiveKind> = Arena::new();
        let leaf = rxa.intern(crate::reactive::ReactiveKind::Leaf);
        let flags = CompileFlags { disable_code_motion: true, disable_copy_elision: true, ..CompileFlags::default() };
        let compiled = SideEffectCompiler::new(&mut nodes).compile(c, leaf, &drivers, &flags).unwrap();
        assert!(compiled.imperative.len() > 0);
    }
}
