//! Graph Builder (§4.0, supplemental): a small fluent API for constructing
//! value graphs directly, carried as scaffolding for tests, benchmarks, and
//! embedders that already have their own front end and just need to hand
//! this crate a finished DAG. It is not a parser — there is no lexer,
//! grammar, or diagnostics-anchored syntax tree here, only the same
//! `Arena::intern` calls a real front end would make.

use crate::arena::Arena;
use crate::node::{ConstantValue, DriverId, NodeKind, RelPriorityOp, Uid};
use crate::types::Type;
use std::rc::Rc;

pub type Node = crate::node::Node;

/// Wraps an [`Arena<NodeKind>`] with short, chainable constructors.
pub struct GraphBuilder {
    pub nodes: Arena<NodeKind>,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        GraphBuilder { nodes: Arena::new() }
    }

    pub fn arg(&mut self, ty: Type) -> Node {
        self.nodes.intern(NodeKind::Argument(ty))
    }

    pub fn constant_f32(&mut self, v: f32) -> Node {
        self.nodes.intern(NodeKind::Constant(ConstantValue::f32(v)))
    }

    pub fn constant_f64(&mut self, v: f64) -> Node {
        self.nodes.intern(NodeKind::Constant(ConstantValue::f64(v)))
    }

    pub fn constant_i32(&mut self, v: i32) -> Node {
        self.nodes.intern(NodeKind::Constant(ConstantValue::I32(v)))
    }

    pub fn nil(&mut self) -> Node {
        self.nodes.intern(NodeKind::Constant(ConstantValue::Nil))
    }

    pub fn external(&mut self, uid: Uid, ty: Type) -> Node {
        self.nodes.intern(NodeKind::ExternalVariable { uid, ty })
    }

    pub fn pair(&mut self, a: Node, b: Node) -> Node {
        self.nodes.intern(NodeKind::Pair(a, b))
    }

    pub fn first(&mut self, x: Node) -> Node {
        self.nodes.intern(NodeKind::First(x))
    }

    pub fn rest(&mut self, x: Node) -> Node {
        self.nodes.intern(NodeKind::Rest(x))
    }

    pub fn tick(&mut self, driver: DriverId) -> Node {
        self.nodes.intern(NodeKind::Tick(driver))
    }

    pub fn rate_change(&mut self, factor: i64, signal: Node) -> Node {
        self.nodes.intern(NodeKind::RateChange { factor, signal })
    }

    /// `mask_bit` starts at `0`; Reactive Analysis rewrites it to the bit
    /// it actually allocates the first time this graph runs through that
    /// pass (§4.3 "Signal masks").
    pub fn gate(&mut self, signal: Node, gate: Node) -> Node {
        self.nodes.intern(NodeKind::Gate { signal, gate, mask_bit: 0 })
    }

    pub fn merge(&mut self, branches: Vec<Node>) -> Node {
        self.nodes.intern(NodeKind::Merge(branches))
    }

    pub fn impose(&mut self, clock: Node, signal: Node) -> Node {
        self.nodes.intern(NodeKind::Impose { clock, signal })
    }

    pub fn relative_priority(&mut self, signal: Node, from: Node, op: RelPriorityOp) -> Node {
        self.nodes.intern(NodeKind::RelativePriority { signal, from, op })
    }

    pub fn function_call(&mut self, body: Node, arg: Node) -> Node {
        self.nodes.intern(NodeKind::FunctionCall { body, arg })
    }

    pub fn function_sequence(&mut self, generator: Node, iterations: u32) -> Node {
        self.nodes.intern(NodeKind::FunctionSequence { generator, iterations })
    }

    pub fn recursion_branch(&mut self, body: Node, loop_count: Node) -> Node {
        self.nodes.intern(NodeKind::RecursionBranch { body, loop_count })
    }

    pub fn get_global(&mut self, uid: Uid, ty: Type) -> Node {
        self.nodes.intern(NodeKind::GetGlobalVariable { uid, ty })
    }

    pub fn set_global(&mut self, uid: Uid, value: Node) -> Node {
        self.nodes.intern(NodeKind::SetGlobalVariable { uid, value })
    }

    pub fn ring_buffer(&mut self, len: u32, input: Node) -> Node {
        self.nodes.intern(NodeKind::RingBuffer { len, input })
    }

    pub fn switch(&mut self, selector: Node, branches: Vec<Node>) -> Node {
        self.nodes.intern(NodeKind::Switch { selector, branches })
    }

    pub fn foreign_function(&mut self, symbol: impl Into<Rc<str>>, args: Vec<Node>, side_effecting: bool) -> Node {
        self.nodes.intern(NodeKind::ForeignFunction { symbol: symbol.into(), args, side_effecting })
    }

    pub fn at_index(&mut self, array: Node, index: Node) -> Node {
        self.nodes.intern(NodeKind::AtIndex { array, index })
    }

    pub fn slice(&mut self, array: Node, offset: Node, length: Node) -> Node {
        self.nodes.intern(NodeKind::Slice { array, offset, length })
    }

    pub fn sub_array(&mut self, array: Node, offset: Node, length: u32) -> Node {
        self.nodes.intern(NodeKind::SubArray { array, offset, length })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_builds_a_one_node_graph() {
        let mut b = GraphBuilder::new();
        let arg = b.arg(Type::Scalar(crate::types::Scalar::F32));
        assert_eq!(b.nodes.len(), 1);
        assert_eq!(b.nodes.kind(arg), &NodeKind::Argument(Type::Scalar(crate::types::Scalar::F32)));
    }

    #[test]
    fn repeated_constants_are_hash_consed() {
        let mut b = GraphBuilder::new();
        let a = b.constant_f32(1.0);
        let c = b.constant_f32(1.0);
        assert_eq!(a, c);
        assert_eq!(b.nodes.len(), 1);
    }
}
