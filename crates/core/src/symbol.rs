//! Module state layout (§3.4): ring buffers, subroutine-local state,
//! boundary caches, the global backing store, and signal-mask words, all
//! addressed indirectly through a UID-to-slot table so the Side-Effect
//! Compiler never has to reason about byte offsets directly.

use crate::node::{Node, Uid};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    SubroutineLocal,
    RingBuffer { len: u32 },
    BoundaryCache,
    Global,
    CallerOutput,
}

#[derive(Debug, Clone)]
pub struct SlotInfo {
    pub kind: SlotKind,
    /// Size in bytes, realized from the type algebra's `size_of` (§4.2) at
    /// allocation time — the Sizing pass (§4.7) sums these to learn the
    /// module's total instance size before any real allocation happens.
    pub size: u32,
    /// Cumulative byte offset of this slot within the flat instance
    /// buffer, assigned once when the slot is first allocated.
    pub byte_offset: u32,
}

/// Allocates and remembers every state slot a module needs.
///
/// Allocation is purely additive and keyed by identity (a [`Node`] or a
/// [`Uid`]) so repeated requests for the same logical piece of state return
/// the same slot instead of growing the layout — the symbol table is the
/// single source of truth the bytecode and native backends both read to
/// compute final byte offsets.
#[derive(Debug, Default)]
pub struct SymbolTable {
    slots: Vec<SlotInfo>,
    subroutine_locals: HashMap<Node, SlotId>,
    ring_buffers: HashMap<Node, SlotId>,
    boundary_caches: HashMap<Node, SlotId>,
    globals: HashMap<Uid, SlotId>,
    caller_output: Option<SlotId>,
    next_mask_word: u32,
    next_byte_offset: u32,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, kind: SlotKind, size: u32) -> SlotId {
        let id = SlotId(self.slots.len() as u32);
        let byte_offset = self.next_byte_offset;
        self.next_byte_offset += size;
        self.slots.push(SlotInfo { kind, size, byte_offset });
        id
    }

    pub fn allocate_subroutine_local(&mut self, node: Node, size: u32) -> SlotId {
        if let Some(&id) = self.subroutine_locals.get(&node) {
            return id;
        }
        let id = self.push(SlotKind::SubroutineLocal, size);
        self.subroutine_locals.insert(node, id);
        id
    }

    /// `element_size` is the byte size of one element (§4.2's `size_of` on
    /// the ring's element type). A single-element ring needs no wrap index;
    /// `len >= 2` reserves an extra 4-byte cell for the wrapping read index
    /// (§4.6.4).
    pub fn allocate_ring_buffer(&mut self, node: Node, len: u32, element_size: u32) -> SlotId {
        if let Some(&id) = self.ring_buffers.get(&node) {
            return id;
        }
        let size = if len < 2 { element_size } else { len * element_size + 4 };
        let id = self.push(SlotKind::RingBuffer { len }, size);
        self.ring_buffers.insert(node, id);
        id
    }

    pub fn allocate_boundary_cache(&mut self, node: Node, size: u32) -> SlotId {
        if let Some(&id) = self.boundary_caches.get(&node) {
            return id;
        }
        let id = self.push(SlotKind::BoundaryCache, size);
        self.boundary_caches.insert(node, id);
        id
    }

    pub fn global_slot(&mut self, uid: Uid, size: u32) -> SlotId {
        if let Some(&id) = self.globals.get(&uid) {
            return id;
        }
        let id = self.push(SlotKind::Global, size);
        self.globals.insert(uid, id);
        id
    }

    pub fn caller_output_slot(&mut self, size: u32) -> SlotId {
        if let Some(id) = self.caller_output {
            return id;
        }
        let id = self.push(SlotKind::CallerOutput, size);
        self.caller_output = Some(id);
        id
    }

    /// Reserves a fresh signal-mask bit, returning its containing word and
    /// bit index within that word (§4.3 "Signal masks" are grouped into
    /// 32-bit words so the native and bytecode backends can test several
    /// gates with one comparison).
    pub fn allocate_mask_bit(&mut self) -> (u32, u32) {
        let flat = self.next_mask_word;
        self.next_mask_word += 1;
        (flat / 32, flat % 32)
    }

    pub fn slot_info(&self, id: SlotId) -> &SlotInfo {
        &self.slots[id.0 as usize]
    }

    /// The real cumulative byte offset of `id` within the instance buffer
    /// (§6.2 `get_symbol_offset`).
    pub fn byte_offset(&self, id: SlotId) -> u32 {
        self.slots[id.0 as usize].byte_offset
    }

    /// The total instance size (§6.2 `get_size`) realized from the Sizing
    /// pass: the sum of every allocated slot's size, not a flat per-slot
    /// stride.
    pub fn total_size(&self) -> u32 {
        self.next_byte_offset
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::node::{ConstantValue, NodeKind};

    #[test]
    fn the_same_node_reuses_its_slot() {
        let mut nodes: Arena<NodeKind> = Arena::new();
        let n = nodes.intern(NodeKind::Constant(ConstantValue::f32(1.0)));
        let mut table = SymbolTable::new();
        let a = table.allocate_subroutine_local(n, 4);
        let b = table.allocate_subroutine_local(n, 4);
        assert_eq!(a, b);
        assert_eq!(table.len(), 1);
        assert_eq!(table.total_size(), 4);
    }

    #[test]
    fn ring_buffers_reserve_a_wrap_index_cell_once_len_is_at_least_two() {
        let mut nodes: Arena<NodeKind> = Arena::new();
        let one = nodes.intern(NodeKind::Constant(ConstantValue::f32(1.0)));
        let two = nodes.intern(NodeKind::Constant(ConstantValue::f32(2.0)));
        let mut table = SymbolTable::new();
        let single = table.allocate_ring_buffer(one, 1, 4);
        assert_eq!(table.slot_info(single).size, 4);
        let delayed = table.allocate_ring_buffer(two, 3, 4);
        assert_eq!(table.slot_info(delayed).size, 3 * 4 + 4);
        assert_eq!(table.byte_offset(delayed), table.byte_offset(single) + table.slot_info(single).size);
    }

    #[test]
    fn mask_bits_pack_into_32_bit_words() {
        let mut table = SymbolTable::new();
        for i in 0..40u32 {
            let (word, bit) = table.allocate_mask_bit();
            if i < 32 {
                assert_eq!(word, 0);
            } else {
                assert_eq!(word, 1);
            }
            assert_eq!(bit, i % 32);
        }
    }
}
