//! The value-level DAG's node kinds (§3.2, §4.3–§4.5).
//!
//! These are the operators the Reactive Analysis, Code Motion and Copy
//! Elision passes rewrite. The Side-Effect Compiler (§4.6) lowers them into
//! the separate imperative node kinds of [`crate::imperative`].

use crate::arena::{Arena, NodeId};
use crate::types::{Invariant, Scalar, Type};
use std::rc::Rc;

/// A handle into the value graph's [`crate::arena::Arena`].
pub type Node = NodeId<NodeKind>;

/// A user-visible identifier: a driver, a global variable, or an external
/// input slot. Opaque beyond equality/ordering — the front end mints these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uid(pub u64);

/// Identifies one clock driver (§3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DriverId(pub Uid);

/// §4.3 rule 10: how a `RelativePriority` node rewrites driver priorities
/// relative to another signal's drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelPriorityOp {
    /// priority = min(from) - 1
    Abdicate,
    /// priority = min(from)
    Cohabit,
    /// priority = max(from)
    Share,
    /// priority = max(from) + 1
    Supercede,
}

/// A compile-time scalar or unit constant. Floats are stored by bit
/// pattern so the node kind can derive `Eq`/`Hash` (hash-consing needs
/// both; `NaN != NaN` would otherwise break interning).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstantValue {
    F32Bits(u32),
    F64Bits(u64),
    I32(i32),
    I64(i64),
    Nil,
    True,
    Invariant(Invariant),
}

impl ConstantValue {
    pub fn f32(v: f32) -> Self {
        ConstantValue::F32Bits(v.to_bits())
    }
    pub fn f64(v: f64) -> Self {
        ConstantValue::F64Bits(v.to_bits())
    }
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            ConstantValue::F32Bits(b) => Some(f32::from_bits(*b)),
            _ => None,
        }
    }
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConstantValue::F64Bits(b) => Some(f64::from_bits(*b)),
            _ => None,
        }
    }

    pub fn ty(&self) -> Type {
        match self {
            ConstantValue::F32Bits(_) => Type::Scalar(crate::types::Scalar::F32),
            ConstantValue::F64Bits(_) => Type::Scalar(crate::types::Scalar::F64),
            ConstantValue::I32(_) => Type::Scalar(crate::types::Scalar::I32),
            ConstantValue::I64(_) => Type::Scalar(crate::types::Scalar::I64),
            ConstantValue::Nil => Type::Nil,
            ConstantValue::True => Type::True,
            ConstantValue::Invariant(v) => Type::Invariant(v.clone()),
        }
    }
}

/// Every operator the value graph can contain.
///
/// `Node` operand fields are themselves [`NodeId`]s, so structural equality
/// (used by hash-consing) recurses on index identity only — O(1).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// The module's single externally supplied argument.
    Argument(Type),
    Constant(ConstantValue),
    /// Reads the i-th externally bound variable (§6.2).
    ExternalVariable { uid: Uid, ty: Type },
    Pair(Node, Node),
    First(Node),
    Rest(Node),
    /// One user driver tick; registered with the host at ratio 1:1.
    Tick(DriverId),
    /// Multiply (`factor > 0`) or divide (`factor < 0`) every driver's
    /// ratio in `signal`'s reactivity.
    RateChange { factor: i64, signal: Node },
    /// `mask_bit` is a placeholder (`0`) until Reactive Analysis rewrites
    /// the node with the signal-mask bit it allocated for this gate (§4.3
    /// "Signal masks"); the Side-Effect Compiler reads it back directly
    /// when emitting `TestMaskBit` rather than re-deriving it.
    Gate { signal: Node, gate: Node, mask_bit: u32 },
    Merge(Vec<Node>),
    Impose { clock: Node, signal: Node },
    RelativePriority { signal: Node, from: Node, op: RelPriorityOp },
    FunctionCall { body: Node, arg: Node },
    /// A tail-recursive loop of `iterations` steps over `generator`.
    FunctionSequence { generator: Node, iterations: u32 },
    /// An explicit recursion point (§3.2): `body` may reach back to this
    /// node through a `RecursionPlaceholder`-tagged reactivity; `loop_count`
    /// bounds the number of self-calls.
    RecursionBranch { body: Node, loop_count: Node },
    GetGlobalVariable { uid: Uid, ty: Type },
    SetGlobalVariable { uid: Uid, value: Node },
    /// A delay line of `len` elements backing `z-1`/delay operators.
    RingBuffer { len: u32, input: Node },
    Switch { selector: Node, branches: Vec<Node> },
    /// Inserted by Reactive Analysis where a consumer's clock differs from
    /// its producer's (§4.3 "Boundary insertion").
    Boundary { up: Node },
    ForeignFunction { symbol: Rc<str>, args: Vec<Node>, side_effecting: bool },
    AtIndex { array: Node, index: Node },
    Slice { array: Node, offset: Node, length: Node },
    SubArray { array: Node, offset: Node, length: u32 },
}

impl NodeKind {
    /// Operands in evaluation order, for generic bottom-up traversals.
    pub fn operands(&self) -> Vec<Node> {
        match self {
            NodeKind::Argument(_)
            | NodeKind::Constant(_)
            | NodeKind::ExternalVariable { .. }
            | NodeKind::Tick(_)
            | NodeKind::GetGlobalVariable { .. } => vec![],
            NodeKind::First(x) | NodeKind::Rest(x) | NodeKind::RateChange { signal: x, .. } => vec![*x],
            NodeKind::Pair(a, b) => vec![*a, *b],
            NodeKind::Gate { signal, gate, .. } => vec![*signal, *gate],
            NodeKind::Merge(xs) => xs.clone(),
            NodeKind::Impose { clock, signal } => vec![*clock, *signal],
            NodeKind::RelativePriority { signal, from, .. } => vec![*signal, *from],
            NodeKind::FunctionCall { body, arg } => vec![*body, *arg],
            NodeKind::FunctionSequence { generator, .. } => vec![*generator],
            NodeKind::RecursionBranch { body, loop_count } => vec![*body, *loop_count],
            NodeKind::SetGlobalVariable { value, .. } => vec![*value],
            NodeKind::RingBuffer { input, .. } => vec![*input],
            NodeKind::Switch { selector, branches } => {
                let mut v = vec![*selector];
                v.extend(branches.iter().copied());
                v
            }
            NodeKind::Boundary { up } => vec![*up],
            NodeKind::ForeignFunction { args, .. } => args.clone(),
            NodeKind::AtIndex { array, index } => vec![*array, *index],
            NodeKind::Slice { array, offset, length } => vec![*array, *offset, *length],
            NodeKind::SubArray { array, offset, .. } => vec![*array, *offset],
        }
    }

    pub fn is_non_trivial(&self) -> bool {
        // §4.4: a node is a candidate for code motion only if it contains
        // at least one function call, ring buffer, global-variable read, or
        // reactive base-rate probe.
        matches!(
            self,
            NodeKind::FunctionCall { .. }
                | NodeKind::FunctionSequence { .. }
                | NodeKind::RingBuffer { .. }
                | NodeKind::GetGlobalVariable { .. }
                | NodeKind::Tick(_)
        )
    }
}

/// Derives a node's semantic type from its own payload or, for compound
/// nodes, recursively from its operands (§4.2/§3.1). This is the
/// integration point between the value graph and the type algebra that
/// the front end's type pass stamps onto every node directly in the real
/// pipeline — everything downstream here (state layout, byte offsets,
/// codegen tag widths) goes through this one function instead of
/// re-deriving types ad hoc at each call site.
pub fn type_of(nodes: &Arena<NodeKind>, node: Node) -> Type {
    match nodes.kind(node) {
        NodeKind::Argument(ty) => ty.clone(),
        NodeKind::Constant(c) => c.ty(),
        NodeKind::ExternalVariable { ty, .. } => ty.clone(),
        // A driver tick is a pulse: it carries no payload, only the fact
        // that a frame occurred.
        NodeKind::Tick(_) => Type::True,
        NodeKind::RateChange { signal, .. } => type_of(nodes, *signal),
        NodeKind::Gate { signal, .. } => type_of(nodes, *signal),
        NodeKind::First(pair) => type_of(nodes, *pair).first().unwrap_or(Type::Nil),
        NodeKind::Rest(pair) => type_of(nodes, *pair).rest().unwrap_or(Type::Nil),
        &NodeKind::Pair(head, rest) => Type::pair(type_of(nodes, head), type_of(nodes, rest)),
        NodeKind::Merge(branches) => branches.first().map(|&b| type_of(nodes, b)).unwrap_or(Type::Nil),
        NodeKind::Impose { signal, .. } => type_of(nodes, *signal),
        NodeKind::RelativePriority { signal, .. } => type_of(nodes, *signal),
        NodeKind::FunctionCall { body, .. } => type_of(nodes, *body),
        NodeKind::FunctionSequence { generator, .. } => type_of(nodes, *generator),
        NodeKind::RecursionBranch { body, .. } => type_of(nodes, *body),
        NodeKind::GetGlobalVariable { ty, .. } => ty.clone(),
        NodeKind::SetGlobalVariable { value, .. } => type_of(nodes, *value),
        NodeKind::RingBuffer { input, .. } => type_of(nodes, *input),
        NodeKind::Switch { branches, .. } => branches.first().map(|&b| type_of(nodes, b)).unwrap_or(Type::Nil),
        NodeKind::Boundary { up } => type_of(nodes, *up),
        // No declared return type exists for a foreign symbol in this
        // closed algebra; a scalar is the narrowest real default.
        NodeKind::ForeignFunction { .. } => Type::Scalar(Scalar::F32),
        NodeKind::AtIndex { array, .. } => match type_of(nodes, *array) {
            Type::Pair { element, .. } => (*element).clone(),
            Type::ArrayView(element) => Type::Scalar(element),
            other => other,
        },
        NodeKind::Slice { array, .. } | NodeKind::SubArray { array, .. } => type_of(nodes, *array),
    }
}
