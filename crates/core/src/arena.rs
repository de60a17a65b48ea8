//! The hash-consed node arena (§3.2, §4.1).
//!
//! Nodes are never addressed by raw pointer. Each lives in a flat `Vec`
//! owned by an [`Arena`] and is addressed by a stable 32-bit index
//! ([`NodeId`]); structural equality is realized by interning so that
//! pointer-identity (here, index-identity) coincides with structural
//! equality within one arena (testable property 1, §8). This is the single
//! generic allocator shared by the value graph (§4.3–§4.5), the imperative
//! graph (§4.6), and the reactivity graph (§4.3, via its own instantiation
//! in `reactive.rs`).

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// A stable, arena-local reference to an interned node of kind `K`.
///
/// `K` is a zero-sized phantom tag, not the node kind enum itself, so that
/// ids minted by one arena instantiation can't be confused with ids from
/// another (e.g. a value-graph [`NodeId`] can't be passed where an
/// imperative-graph one is expected) even though both wrap a bare `u32`.
pub struct NodeId<K>(u32, PhantomData<fn() -> K>);

impl<K> NodeId<K> {
    pub fn index(self) -> u32 {
        self.0
    }

    /// Reconstructs an id from a raw arena index, e.g. one recovered from
    /// [`Arena::reactivity_of`]. The caller is responsible for the index
    /// having come from the matching arena instantiation — this is the
    /// one deliberate escape hatch from hash-consing's usual intern-only
    /// construction, needed because reactivity indices cross from the
    /// value arena's bookkeeping back into the reactivity arena itself.
    pub fn from_index(index: u32) -> Self {
        NodeId(index, PhantomData)
    }
}

impl<K> Clone for NodeId<K> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<K> Copy for NodeId<K> {}
impl<K> PartialEq for NodeId<K> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl<K> Eq for NodeId<K> {}
impl<K> PartialOrd for NodeId<K> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<K> Ord for NodeId<K> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}
impl<K> Hash for NodeId<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}
impl<K> std::fmt::Debug for NodeId<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Bound satisfied by any node-kind enum usable with [`Arena`]: it must be
/// comparable for structural equality (which, since operand references are
/// themselves [`NodeId`]s, recurses by index only — O(1) per node, per
/// §4.1 "Structural equality recurses on operands by pointer identity").
pub trait NodeKindData: Clone + Eq + Hash + std::fmt::Debug {}
impl<T: Clone + Eq + Hash + std::fmt::Debug> NodeKindData for T {}

struct Entry<K> {
    kind: K,
    /// Opaque slot for a reactivity-graph reference, assigned by the
    /// Reactive Analysis pass (§3.2 "Optional reactivity pointer"). Kept as
    /// a bare index here so this module has no dependency on `reactive.rs`.
    reactivity: Option<u32>,
    hash: u64,
}

/// A hash-consed, region-bounded store of nodes of kind `K`.
pub struct Arena<K> {
    entries: Vec<Entry<K>>,
    intern: HashMap<K, NodeId<K>>,
}

impl<K> Default for Arena<K> {
    fn default() -> Self {
        Arena { entries: Vec::new(), intern: HashMap::new() }
    }
}

impl<K: NodeKindData> Arena<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `intern(node) -> node_ref`: the combined new_mutable+finalize
    /// operation of §4.1 — our node kinds are plain immutable values (not
    /// uninterned mutable objects), so there is no observable distinction
    /// between "construct" and "finalize" here; the hash is computed once,
    /// on first interning, and never changes after (§3.2 invariant).
    pub fn intern(&mut self, kind: K) -> NodeId<K> {
        if let Some(&id) = self.intern.get(&kind) {
            return id;
        }
        let mut hasher = DefaultHasher::new();
        kind.hash(&mut hasher);
        let hash = hasher.finish();
        let id = NodeId(self.entries.len() as u32, PhantomData);
        self.entries.push(Entry { kind: kind.clone(), reactivity: None, hash });
        self.intern.insert(kind, id);
        id
    }

    /// A mutable clone of a node's kind, the starting point for a rewrite
    /// (§4.1 "mutable-copy operation"). Mutate the returned value and
    /// [`Arena::intern`] it to produce the rewritten node.
    pub fn mutable_copy(&self, id: NodeId<K>) -> K {
        self.entries[id.0 as usize].kind.clone()
    }

    pub fn kind(&self, id: NodeId<K>) -> &K {
        &self.entries[id.0 as usize].kind
    }

    pub fn hash_of(&self, id: NodeId<K>) -> u64 {
        self.entries[id.0 as usize].hash
    }

    pub fn reactivity_of(&self, id: NodeId<K>) -> Option<u32> {
        self.entries[id.0 as usize].reactivity
    }

    pub fn set_reactivity(&mut self, id: NodeId<K>, rx: u32) {
        self.entries[id.0 as usize].reactivity = Some(rx);
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId<K>> + '_ {
        (0..self.entries.len()).map(|i| NodeId(i as u32, PhantomData))
    }

    /// Copy the subgraph reachable from `roots` into a brand-new arena,
    /// releasing everything else (§5 "a pass allocates into a region,
    /// copies live output into its parent's region, and releases the
    /// region"). Requires a `remap` callback so each concrete node kind can
    /// rewrite its own operand ids; this keeps `Arena` itself agnostic to
    /// the shape of `K`.
    pub fn gc(
        &self,
        roots: &[NodeId<K>],
        mut remap_operands: impl FnMut(&K, &HashMap<NodeId<K>, NodeId<K>>) -> K,
        post_order: impl Fn(&K) -> Vec<NodeId<K>>,
    ) -> (Arena<K>, HashMap<NodeId<K>, NodeId<K>>) {
        let mut fresh = Arena::new();
        let mut old_to_new = HashMap::new();
        let mut stack: Vec<(NodeId<K>, bool)> = roots.iter().map(|r| (*r, false)).collect();
        let mut visiting = std::collections::HashSet::new();
        while let Some((id, children_done)) = stack.pop() {
            if old_to_new.contains_key(&id) {
                continue;
            }
            if children_done {
                let rewritten = remap_operands(self.kind(id), &old_to_new);
                let new_id = fresh.intern(rewritten);
                old_to_new.insert(id, new_id);
                continue;
            }
            if !visiting.insert(id) {
                continue;
            }
            stack.push((id, true));
            for child in post_order(self.kind(id)) {
                if !old_to_new.contains_key(&child) {
                    stack.push((child, false));
                }
            }
        }
        (fresh, old_to_new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, Eq, Hash, Debug)]
    enum Toy {
        Leaf(i32),
        Pair(NodeId<Toy>, NodeId<Toy>),
    }

    #[test]
    fn structurally_equal_nodes_share_one_id() {
        let mut a: Arena<Toy> = Arena::new();
        let l1 = a.intern(Toy::Leaf(1));
        let l1_again = a.intern(Toy::Leaf(1));
        assert_eq!(l1, l1_again);
        let l2 = a.intern(Toy::Leaf(2));
        assert_ne!(l1, l2);

        let p1 = a.intern(Toy::Pair(l1, l2));
        let p2 = a.intern(Toy::Pair(l1, l2));
        assert_eq!(p1, p2);
        let p3 = a.intern(Toy::Pair(l2, l1));
        assert_ne!(p1, p3);
    }

    #[test]
    fn hash_is_stable_after_interning() {
        let mut a: Arena<Toy> = Arena::new();
        let id = a.intern(Toy::Leaf(7));
        let h1 = a.hash_of(id);
        let _ = a.intern(Toy::Leaf(8));
        let h2 = a.hash_of(id);
        assert_eq!(h1, h2);
    }
}
