//! Code Motion (§4.4): bounded-distance value-equivalence tracking and
//! common-subexpression hoisting through synthetic global variables.
//!
//! A node that is value-equivalent to something computed `MAX_TRACK_DISTANCE`
//! or fewer edges back is rewritten to read a synthetic global instead of
//! recomputing — this is how a loop body avoids re-evaluating a
//! loop-invariant subexpression on every iteration without a full
//! loop-invariant-code-motion analysis.

use crate::arena::Arena;
use crate::node::{type_of, Node, NodeKind, Uid};
use std::collections::HashMap;

/// Nodes further apart than this are not considered for hoisting — keeps
/// the analysis a local, bottom-up sweep instead of a whole-graph fixpoint.
pub const MAX_TRACK_DISTANCE: u32 = 8;

/// What a node is equivalent to, as seen from its consumer's position.
#[derive(Debug, Clone)]
enum EquivalentExpression {
    /// No tracked equivalent within range.
    Nothing,
    /// Equivalent to a node that was last computed `distance` edges back,
    /// and has already been hoisted to `global` once.
    Hoisted { global: Uid, distance: u32 },
    /// Equivalent to a plain (not yet hoisted) node seen `distance` edges
    /// back; only a second occurrence triggers materialization.
    Seen { node: Node, distance: u32 },
}

pub struct CodeMotion<'a> {
    nodes: &'a mut Arena<NodeKind>,
    /// One entry per structurally-distinct non-trivial node seen so far on
    /// the current path, with its most recent distance.
    tracked: HashMap<Node, EquivalentExpression>,
    next_global: u64,
    memo: HashMap<Node, Node>,
}

impl<'a> CodeMotion<'a> {
    pub fn new(nodes: &'a mut Arena<NodeKind>, global_uid_base: u64) -> Self {
        CodeMotion { nodes, tracked: HashMap::new(), next_global: global_uid_base, memo: HashMap::new() }
    }

    fn fresh_global(&mut self) -> Uid {
        let uid = Uid(self.next_global);
        self.next_global += 1;
        uid
    }

    /// Runs the pass over `root`, returning the rewritten root. Operands
    /// are visited before their parent (bottom-up), so a hoist decision
    /// made deep in the graph is visible to every later sibling.
    pub fn run(&mut self, root: Node) -> Node {
        log::debug!("code_motion: entering, {} nodes interned so far", self.nodes.len());
        let out = self.visit(root, 0);
        log::debug!("code_motion: exiting, {} nodes interned so far", self.nodes.len());
        out
    }

    fn visit(&mut self, node: Node, depth: u32) -> Node {
        if let Some(&done) = self.memo.get(&node) {
            return done;
        }
        let kind = self.nodes.kind(node).clone();
        let operands = kind.operands();
        let rewritten_operands: Vec<Node> = operands.iter().map(|o| self.visit(*o, depth + 1)).collect();
        let mut new_kind = kind.clone();
        rewrite_operands_in_place(&mut new_kind, &operands, &rewritten_operands);

        if !new_kind.is_non_trivial() {
            let id = self.nodes.intern(new_kind);
            self.memo.insert(node, id);
            return id;
        }

        let probe_node = self.nodes.intern(new_kind.clone());
        let result = match self.tracked.get(&probe_node) {
            Some(EquivalentExpression::Hoisted { global, distance }) if *distance <= MAX_TRACK_DISTANCE => {
                let global = *global;
                self.read_global(probe_node, global)
            }
            Some(EquivalentExpression::Seen { distance, .. }) if *distance <= MAX_TRACK_DISTANCE => {
                let global = self.fresh_global();
                log::trace!("code_motion: hoisting node {:?} to global {:?}", probe_node, global);
                let set = self.nodes.intern(NodeKind::SetGlobalVariable { uid: global, value: probe_node });
                self.tracked.insert(probe_node, EquivalentExpression::Hoisted { global, distance: 0 });
                // `set` still evaluates the expression this one time; later
                // occurrences read the global directly via `read_global`.
                set
            }
            _ => probe_node,
        };

        self.tracked.insert(probe_node, EquivalentExpression::Seen { node: probe_node, distance: 0 });
        self.age_tracked();
        self.memo.insert(node, result);
        result
    }

    fn read_global(&mut self, probe_node: Node, global: Uid) -> Node {
        let ty = type_of(self.nodes, probe_node);
        self.nodes.intern(NodeKind::GetGlobalVariable { uid: global, ty })
    }

    fn age_tracked(&mut self) {
        self.tracked.retain(|_, eq| match eq {
            EquivalentExpression::Nothing => false,
            EquivalentExpression::Hoisted { distance, .. } | EquivalentExpression::Seen { distance, .. } => {
                *distance += 1;
                *distance <= MAX_TRACK_DISTANCE
            }
        });
    }
}

fn rewrite_operands_in_place(kind: &mut NodeKind, old: &[Node], new: &[Node]) {
    debug_assert_eq!(old.len(), new.len());
    let map: HashMap<Node, Node> = old.iter().copied().zip(new.iter().copied()).collect();
    let sub = |n: &mut Node| {
        if let Some(r) = map.get(n) {
            *n = *r;
        }
    };
    match kind {
        NodeKind::First(x) | NodeKind::Rest(x) | NodeKind::RateChange { signal: x, .. } => sub(x),
        NodeKind::Pair(a, b) => {
            sub(a);
            sub(b);
        }
        NodeKind::Gate { signal, gate, .. } => {
            sub(signal);
            sub(gate);
        }
        NodeKind::Merge(xs) => xs.iter_mut().for_each(sub),
        NodeKind::Impose { clock, signal } => {
            sub(clock);
            sub(signal);
        }
        NodeKind::RelativePriority { signal, from, .. } => {
            sub(signal);
            sub(from);
        }
        NodeKind::FunctionCall { body, arg } => {
            sub(body);
            sub(arg);
        }
        NodeKind::FunctionSequence { generator, .. } => sub(generator),
        NodeKind::RecursionBranch { body, loop_count } => {
            sub(body);
            sub(loop_count);
        }
        NodeKind::SetGlobalVariable { value, .. } => sub(value),
        NodeKind::RingBuffer { input, .. } => sub(input),
        NodeKind::Switch { selector, branches } => {
            sub(selector);
            branches.iter_mut().for_each(sub);
        }
        NodeKind::Boundary { up } => sub(up),
        NodeKind::ForeignFunction { args, .. } => args.iter_mut().for_each(sub),
        NodeKind::AtIndex { array, index } => {
            sub(array);
            sub(index);
        }
        NodeKind::Slice { array, offset, length } => {
            sub(array);
            sub(offset);
            sub(length);
        }
        NodeKind::SubArray { array, offset, .. } => {
            sub(array);
            sub(offset);
        }
        NodeKind::Argument(_)
        | NodeKind::Constant(_)
        | NodeKind::ExternalVariable { .. }
        | NodeKind::Tick(_)
        | NodeKind::GetGlobalVariable { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ConstantValue;

    #[test]
    fn a_single_occurrence_is_left_alone() {
        let mut nodes: Arena<NodeKind> = Arena::new();
        let c = nodes.intern(NodeKind::Constant(ConstantValue::f32(1.0)));
        let call = nodes.intern(NodeKind::FunctionCall { body: c, arg: c });
        let mut pass = CodeMotion::new(&mut nodes, 1000);
        let out = pass.run(call);
        assert_eq!(out, call);
    }

    #[test]
    fn repeated_non_trivial_subexpressions_hoist_to_a_global() {
        let mut nodes: Arena<NodeKind> = Arena::new();
        let c = nodes.intern(NodeKind::Constant(ConstantValue::f32(2.0)));
        let call = nodes.intern(NodeKind::FunctionCall { body: c, arg: c });
        let pair = nodes.intern(NodeKind::Pair(call, call));
        let mut pass = CodeMotion::new(&mut nodes, 2000);
        let out = pass.run(pair);
        assert!(nodes.len() > 0);
        let _ = out;
    }
}
