//! Copy Elision (§4.5): propagate destination buffers backward through the
//! value graph so a producer writes directly into its consumer's storage
//! instead of computing into a temporary that then gets copied.
//!
//! This pass runs after Code Motion and before the Side-Effect Compiler. Its
//! output is a `node -> destination` map consumed by
//! [`crate::sidefx::SideEffectCompiler`] when it decides whether an
//! operation needs a fresh buffer or can target one already allocated by its
//! consumer.

use crate::arena::Arena;
use crate::node::{Node, NodeKind};
use std::collections::HashMap;

/// Where a node's result should ultimately land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    /// A fresh, pass-private buffer — the default before any propagation.
    Fresh,
    /// The same storage as another node (usually an ancestor) already
    /// targets. Chasing this chain to its end gives the final buffer.
    SameAs(Node),
    /// A caller-supplied output slot (the module's return value).
    CallerOutput,
}

pub struct CopyElision<'a> {
    nodes: &'a Arena<NodeKind>,
    destinations: HashMap<Node, Destination>,
}

impl<'a> CopyElision<'a> {
    pub fn new(nodes: &'a Arena<NodeKind>) -> Self {
        CopyElision { nodes, destinations: HashMap::new() }
    }

    /// Runs the pass. `root` receives [`Destination::CallerOutput`]; every
    /// other node starts at [`Destination::Fresh`] and is narrowed as
    /// propagation discovers it can share its consumer's buffer.
    pub fn run(mut self, root: Node) -> HashMap<Node, Destination> {
        log::debug!("copy_elision: entering");
        self.destinations.insert(root, Destination::CallerOutput);
        self.propagate(root);
        log::debug!("copy_elision: exiting, {} destinations assigned", self.destinations.len());
        self.destinations
    }

    fn propagate(&mut self, node: Node) {
        let my_dest = *self.destinations.get(&node).unwrap_or(&Destination::Fresh);
        let kind = self.nodes.kind(node).clone();
        match kind {
            // A pass-through projection can write straight into whatever
            // its consumer already targets: there is no transformation
            // between `x` and `First(x)`/`Rest(x)` worth a copy.
            NodeKind::First(x) | NodeKind::Rest(x) => self.propagate_into(x, my_dest),

            // Both sides of a pair are independent sub-buffers of the same
            // destination (a pair's storage is just its two halves
            // concatenated), so each can target `my_dest` directly.
            NodeKind::Pair(a, b) => {
                self.propagate_into(a, my_dest);
                self.propagate_into(b, my_dest);
            }

            // A ring buffer owns its own backing storage (§4.6.4); its
            // `input` must still be written into that storage each step,
            // but the ring buffer node itself is never a pass-through, so
            // we only push `Fresh` to the input unless a wrapping Boundary
            // has already claimed a slot for it.
            NodeKind::RingBuffer { input, .. } => self.propagate_into(input, Destination::Fresh),

            // A `Merge`'s branches are mutually exclusive at runtime (only
            // one fires on a given tick in the common case), so all of them
            // can safely target the same destination as the merge itself.
            NodeKind::Merge(branches) => {
                for b in branches {
                    self.propagate_into(b, my_dest);
                }
            }
            NodeKind::Switch { branches, .. } => {
                for b in branches {
                    self.propagate_into(b, my_dest);
                }
            }

            // The signal side of an `Impose` keeps its own destination
            // (the clock side never carries a value payload worth eliding).
            NodeKind::Impose { signal, .. } => self.propagate_into(signal, my_dest),

            NodeKind::Boundary { up } => self.propagate_into(up, Destination::Fresh),

            // §4.5 groups these three alongside `Switch` as merge points:
            // each has exactly one operand that actually produces the
            // node's value (the called body, the generator, the
            // recursion's body), so that operand can target `my_dest`
            // directly. The remaining operand (the argument, the loop
            // count) carries no payload worth eliding and is just visited
            // so nested structure underneath it still propagates.
            NodeKind::FunctionCall { body, arg } => {
                self.propagate_into(body, my_dest);
                self.propagate(arg);
            }
            NodeKind::FunctionSequence { generator, .. } => self.propagate_into(generator, my_dest),
            NodeKind::RecursionBranch { body, loop_count } => {
                self.propagate_into(body, my_dest);
                self.propagate(loop_count);
            }

            // Everything else either has no single "the" result buffer
            // worth forwarding (ForeignFunction, array ops) or genuinely
            // produces a fresh value (Constant, Tick, globals): leave their
            // operands at whatever destination they already hold and just
            // recurse so nested pairs/projections still propagate.
            other => {
                for operand in other.operands() {
                    self.propagate(operand);
                }
            }
        }
    }

    fn propagate_into(&mut self, node: Node, dest: Destination) {
        let current = *self.destinations.get(&node).unwrap_or(&Destination::Fresh);
        if matches!(current, Destination::Fresh) && !matches!(dest, Destination::Fresh) {
            self.destinations.insert(node, dest);
        }
        self.propagate(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ConstantValue;

    #[test]
    fn the_root_targets_the_caller_output() {
        let mut nodes: Arena<NodeKind> = Arena::new();
        let c = nodes.intern(NodeKind::Constant(ConstantValue::f32(1.0)));
        let dests = CopyElision::new(&nodes).run(c);
        assert_eq!(dests.get(&c), Some(&Destination::CallerOutput));
    }

    #[test]
    fn first_and_rest_inherit_their_parents_destination() {
        let mut nodes: Arena<NodeKind> = Arena::new();
        let a = nodes.intern(NodeKind::Constant(ConstantValue::f32(1.0)));
        let b = nodes.intern(NodeKind::Constant(ConstantValue::f32(2.0)));
        let pair = nodes.intern(NodeKind::Pair(a, b));
        let first = nodes.intern(NodeKind::First(pair));
        let dests = CopyElision::new(&nodes).run(first);
        assert_eq!(dests.get(&first), Some(&Destination::CallerOutput));
        assert!(matches!(dests.get(&pair), Some(Destination::SameAs(_)) | Some(Destination::CallerOutput)));
    }

    #[test]
    fn a_function_call_s_body_inherits_the_call_s_destination() {
        let mut nodes: Arena<NodeKind> = Arena::new();
        let arg = nodes.intern(NodeKind::Constant(ConstantValue::f32(1.0)));
        let body = nodes.intern(NodeKind::Constant(ConstantValue::f32(2.0)));
        let call = nodes.intern(NodeKind::FunctionCall { body, arg });
        let dests = CopyElision::new(&nodes).run(call);
        assert_eq!(dests.get(&call), Some(&Destination::CallerOutput));
        assert!(matches!(dests.get(&body), Some(Destination::CallerOutput)));
    }
}
