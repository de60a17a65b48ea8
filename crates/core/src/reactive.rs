//! Reactive Analysis (§4.3): assigns a clock to every node and inserts
//! `Boundary` nodes wherever a consumer's clock differs from its
//! producer's.
//!
//! Reactivity nodes (fused driver sets, lazy pairs, recursive-clock
//! placeholders) are themselves hash-consed, using the same generic
//! [`Arena`] the value graph uses — the "one hash-consed typed-node
//! allocator" of §1 is this module's `Arena<ReactiveKind>` instantiation.

use crate::arena::{Arena, NodeId};
use crate::errors::{CompileError, Result};
use crate::node::{DriverId, Node, NodeKind, RelPriorityOp, Uid};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

/// A handle into the reactivity arena.
pub type RxId = NodeId<ReactiveKind>;

/// One driver's metadata, ratio and priority (§3.3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DriverInfo {
    pub metadata: Rc<str>,
    pub mul: i64,
    pub div: i64,
    pub priority: i32,
    /// Signal-mask bits a `Gate` has attached to this driver (§4.3 "Signal
    /// masks"). Tracked alongside the driver, not as a separate type,
    /// since a gated and ungated instance of the same driver are distinct
    /// members of a fused set only insofar as codegen must sample the
    /// extra mask bit — equality here intentionally ignores masks so that
    /// boundary-insertion's compatibility check (which also ignores them)
    /// stays consistent with fused-set identity.
    pub mask_bits: Rc<BTreeSet<u32>>,
}

/// A reactivity node (§3.3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReactiveKind {
    /// No updates — constants and other leaves.
    Leaf,
    /// A canonical, ordered, deduplicated set of drivers.
    Fused(Rc<BTreeMap<DriverId, DriverInfo>>),
    /// Two independent reactivities, one per side of a value pair.
    Lazy(RxId, RxId),
    /// An unresolved recursive-clock placeholder (§4.3 "Recursive clocks").
    Placeholder(u32),
}

pub struct ReactiveAnalysis {
    pub rx: Arena<ReactiveKind>,
    leaf_id: RxId,
    /// Keyed by (value node, ambient argument reactivity) — "one
    /// memoization cache keyed by subgraph-plus-argument-reactivity" (§1).
    memo: HashMap<(Node, RxId), (RxId, Node)>,
    /// The delegate's registered reactivity per global-variable UID
    /// (rules 13/14).
    global_rx: HashMap<Uid, RxId>,
    next_mask_bit: u32,
    next_placeholder: u32,
    placeholder_constraints: HashMap<u32, Vec<RxId>>,
    pub diagnostics: crate::errors::Diagnostics,
}

impl ReactiveAnalysis {
    pub fn new() -> Self {
        let mut rx = Arena::new();
        let leaf_id = rx.intern(ReactiveKind::Leaf);
        ReactiveAnalysis {
            rx,
            leaf_id,
            memo: HashMap::new(),
            global_rx: HashMap::new(),
            next_mask_bit: 0,
            next_placeholder: 0,
            placeholder_constraints: HashMap::new(),
            diagnostics: crate::errors::Diagnostics::default(),
        }
    }

    pub fn leaf(&self) -> RxId {
        self.leaf_id
    }

    fn is_fused(&self, id: RxId) -> bool {
        !matches!(self.rx.kind(id), ReactiveKind::Lazy(..))
    }

    fn fused_map(&self, id: RxId) -> Option<&BTreeMap<DriverId, DriverInfo>> {
        match self.rx.kind(id) {
            ReactiveKind::Fused(m) => Some(m),
            _ => None,
        }
    }

    pub fn lazy_pair(&mut self, a: RxId, b: RxId) -> RxId {
        if a == b && self.is_fused(a) {
            a
        } else {
            self.rx.intern(ReactiveKind::Lazy(a, b))
        }
    }

    fn project_first(&mut self, id: RxId) -> Result<RxId> {
        match self.rx.kind(id).clone() {
            ReactiveKind::Lazy(a, _) => Ok(a),
            _ => Ok(id),
        }
    }

    fn project_rest(&mut self, id: RxId) -> Result<RxId> {
        match self.rx.kind(id).clone() {
            ReactiveKind::Lazy(_, b) => Ok(b),
            _ => Ok(id),
        }
    }

    fn tick(&mut self, driver: DriverId, metadata: Rc<str>) -> RxId {
        let mut map = BTreeMap::new();
        map.insert(
            driver,
            DriverInfo { metadata, mul: 1, div: 1, priority: 0, mask_bits: Rc::new(BTreeSet::new()) },
        );
        self.rx.intern(ReactiveKind::Fused(Rc::new(map)))
    }

    fn rate_change(&mut self, factor: i64, id: RxId) -> Result<RxId> {
        match self.rx.kind(id).clone() {
            ReactiveKind::Lazy(a, b) => {
                let a2 = self.rate_change(factor, a)?;
                let b2 = self.rate_change(factor, b)?;
                Ok(self.lazy_pair(a2, b2))
            }
            ReactiveKind::Leaf => Ok(id),
            ReactiveKind::Placeholder(_) => Ok(id),
            ReactiveKind::Fused(map) => {
                let mut out = BTreeMap::new();
                for (driver, info) in map.iter() {
                    let (mut mul, mut div) = (info.mul, info.div);
                    if factor > 0 {
                        mul *= factor;
                    } else if factor < 0 {
                        div *= -factor;
                    }
                    let g = gcd(mul.unsigned_abs(), div.unsigned_abs()).max(1) as i64;
                    out.insert(
                        *driver,
                        DriverInfo { metadata: info.metadata.clone(), mul: mul / g, div: div / g, ..info.clone() },
                    );
                }
                Ok(self.rx.intern(ReactiveKind::Fused(Rc::new(out))))
            }
        }
    }

    fn gate(&mut self, id: RxId, bit: u32) -> Result<RxId> {
        match self.rx.kind(id).clone() {
            ReactiveKind::Fused(map) => {
                let mut out = BTreeMap::new();
                for (driver, info) in map.iter() {
                    let mut bits = (*info.mask_bits).clone();
                    bits.insert(bit);
                    out.insert(*driver, DriverInfo { mask_bits: Rc::new(bits), ..info.clone() });
                }
                Ok(self.rx.intern(ReactiveKind::Fused(Rc::new(out))))
            }
            _ => Ok(id),
        }
    }

    /// Union two reactivities' driver sets (Merge, §4.3 rule 8). Errors if
    /// the same driver id appears in both with incompatible metadata or
    /// ratio — a `ReactivityError` (§4.3 "Failure").
    pub fn merge2(&mut self, a: RxId, b: RxId) -> Result<RxId> {
        if a == b {
            return Ok(a);
        }
        match (self.rx.kind(a).clone(), self.rx.kind(b).clone()) {
            (ReactiveKind::Leaf, _) => Ok(b),
            (_, ReactiveKind::Leaf) => Ok(a),
            (ReactiveKind::Fused(ma), ReactiveKind::Fused(mb)) => {
                let mut out = (*ma).clone();
                for (driver, info) in mb.iter() {
                    match out.get(driver) {
                        Some(existing) if existing.metadata != info.metadata || existing.mul != info.mul || existing.div != info.div => {
                            return Err(CompileError::program(format!(
                                "inconsistent reactivity merging driver {:?}: {:?} vs {:?}",
                                driver, existing, info
                            )));
                        }
                        Some(existing) => {
                            let mut merged = existing.clone();
                            merged.priority = merged.priority.max(info.priority);
                            let mut bits = (*merged.mask_bits).clone();
                            bits.extend(info.mask_bits.iter().copied());
                            merged.mask_bits = Rc::new(bits);
                            out.insert(*driver, merged);
                        }
                        None => {
                            out.insert(*driver, info.clone());
                        }
                    }
                }
                Ok(self.rx.intern(ReactiveKind::Fused(Rc::new(out))))
            }
            // Merging a pair-shaped (Lazy) reactivity treats each side
            // independently, matching `Pair`'s own componentwise handling.
            (ReactiveKind::Lazy(a1, a2), ReactiveKind::Lazy(b1, b2)) => {
                let f = self.merge2(a1, b1)?;
                let r = self.merge2(a2, b2)?;
                Ok(self.lazy_pair(f, r))
            }
            _ => Err(CompileError::internal("cannot merge incompatible reactivity shapes (fused vs lazy pair)")),
        }
    }

    fn relative_priority(&mut self, signal: RxId, from: RxId, op: RelPriorityOp) -> Result<RxId> {
        let from_map = self
            .fused_map(from)
            .ok_or_else(|| CompileError::internal("RelativePriority requires a fused `from` reactivity"))?;
        if from_map.is_empty() {
            return Ok(signal);
        }
        let min = from_map.values().map(|d| d.priority).min().unwrap();
        let max = from_map.values().map(|d| d.priority).max().unwrap();
        let new_priority = match op {
            RelPriorityOp::Abdicate => min - 1,
            RelPriorityOp::Cohabit => min,
            RelPriorityOp::Share => max,
            RelPriorityOp::Supercede => max + 1,
        };
        match self.rx.kind(signal).clone() {
            ReactiveKind::Fused(map) => {
                let mut out = BTreeMap::new();
                for (driver, info) in map.iter() {
                    out.insert(*driver, DriverInfo { priority: new_priority, ..info.clone() });
                }
                Ok(self.rx.intern(ReactiveKind::Fused(Rc::new(out))))
            }
            _ => Ok(signal),
        }
    }

    /// §4.3 "Boundary insertion": true if a consumer needing `required`
    /// can use `producer` directly, with no cache in between.
    pub fn compatible_without_boundary(&self, required: RxId, producer: RxId) -> bool {
        if required == producer {
            return true;
        }
        match (self.rx.kind(required), self.rx.kind(producer)) {
            (_, ReactiveKind::Leaf) => true,
            (ReactiveKind::Fused(rs), ReactiveKind::Fused(ps)) => ps.iter().all(|(id, pinfo)| {
                rs.get(id).map(|rinfo| rinfo.metadata == pinfo.metadata && rinfo.mul == pinfo.mul && rinfo.div == pinfo.div)
                    .unwrap_or(false)
            }),
            _ => false,
        }
    }

    fn allocate_mask_bit(&mut self) -> u32 {
        let bit = self.next_mask_bit;
        self.next_mask_bit += 1;
        bit
    }

    fn new_placeholder(&mut self) -> RxId {
        let id = self.next_placeholder;
        self.next_placeholder += 1;
        self.placeholder_constraints.insert(id, Vec::new());
        self.rx.intern(ReactiveKind::Placeholder(id))
    }

    fn record_against_placeholder(&mut self, placeholder: RxId, other: RxId) {
        if let ReactiveKind::Placeholder(id) = *self.rx.kind(placeholder) {
            self.placeholder_constraints.entry(id).or_default().push(other);
        }
    }

    fn commit_placeholder(&mut self, placeholder: RxId) -> Result<RxId> {
        let id = match *self.rx.kind(placeholder) {
            ReactiveKind::Placeholder(id) => id,
            _ => return Ok(placeholder),
        };
        let others = self.placeholder_constraints.remove(&id).unwrap_or_default();
        let mut acc = self.leaf_id;
        for other in others {
            acc = self.merge2(acc, other)?;
        }
        Ok(acc)
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Bottom-up, memoized Reactive Analysis over a value graph (§4.3).
///
/// `drivers` maps each [`DriverId`] that appears as a `Tick` to its
/// user-visible metadata string, mimicking the original delegate's driver
/// registry.
pub struct ReactivePass<'a> {
    pub analysis: ReactiveAnalysis,
    drivers: &'a HashMap<DriverId, Rc<str>>,
}

impl<'a> ReactivePass<'a> {
    pub fn new(drivers: &'a HashMap<DriverId, Rc<str>>) -> Self {
        ReactivePass { analysis: ReactiveAnalysis::new(), drivers }
    }

    /// Runs the pass over `root`, mutating `nodes` in place (extending it
    /// with any inserted `Boundary` nodes) and returning the rewritten
    /// root plus its reactivity.
    pub fn run(&mut self, nodes: &mut Arena<NodeKind>, root: Node, arg_rx: RxId) -> Result<(RxId, Node)> {
        self.visit(nodes, root, arg_rx)
    }

    fn visit(&mut self, nodes: &mut Arena<NodeKind>, node: Node, arg_rx: RxId) -> Result<(RxId, Node)> {
        if let Some(&cached) = self.analysis.memo.get(&(node, arg_rx)) {
            return Ok(cached);
        }
        let kind = nodes.kind(node).clone();
        let (rx, new_node) = self.visit_kind(nodes, node, kind, arg_rx)?;
        nodes.set_reactivity(new_node, rx.index());
        self.analysis.memo.insert((node, arg_rx), (rx, new_node));
        Ok((rx, new_node))
    }

    fn wire(&mut self, nodes: &mut Arena<NodeKind>, required: RxId, operand_rx: RxId, operand: Node) -> Node {
        if self.analysis.compatible_without_boundary(required, operand_rx) {
            operand
        } else {
            let boundary = nodes.intern(NodeKind::Boundary { up: operand });
            nodes.set_reactivity(boundary, required.index());
            boundary
        }
    }

    fn visit_kind(
        &mut self,
        nodes: &mut Arena<NodeKind>,
        _orig: Node,
        kind: NodeKind,
        arg_rx: RxId,
    ) -> Result<(RxId, Node)> {
        match kind {
            NodeKind::Argument(ty) => Ok((arg_rx, nodes.intern(NodeKind::Argument(ty)))),
            NodeKind::Constant(c) => Ok((self.analysis.leaf(), nodes.intern(NodeKind::Constant(c)))),
            NodeKind::ExternalVariable { uid, ty } => {
                Ok((self.analysis.leaf(), nodes.intern(NodeKind::ExternalVariable { uid, ty })))
            }
            NodeKind::Pair(a, b) => {
                let (ra, a2) = self.visit(nodes, a, arg_rx)?;
                let (rb, b2) = self.visit(nodes, b, arg_rx)?;
                let rx = if ra == rb && self.analysis.is_fused(ra) { ra } else { self.analysis.lazy_pair(ra, rb) };
                Ok((rx, nodes.intern(NodeKind::Pair(a2, b2))))
            }
            NodeKind::First(x) => {
                let (rxx, x2) = self.visit(nodes, x, arg_rx)?;
                let rx = self.analysis.project_first(rxx)?;
                Ok((rx, nodes.intern(NodeKind::First(x2))))
            }
            NodeKind::Rest(x) => {
                let (rxx, x2) = self.visit(nodes, x, arg_rx)?;
                let rx = self.analysis.project_rest(rxx)?;
                Ok((rx, nodes.intern(NodeKind::Rest(x2))))
            }
            NodeKind::Tick(driver) => {
                let meta = self.drivers.get(&driver).cloned().unwrap_or_else(|| Rc::from("<driver>"));
                let rx = self.analysis.tick(driver, meta);
                Ok((rx, nodes.intern(NodeKind::Tick(driver))))
            }
            NodeKind::RateChange { factor, signal } => {
                let (rxs, s2) = self.visit(nodes, signal, arg_rx)?;
                let rx = self.analysis.rate_change(factor, rxs)?;
                Ok((rx, nodes.intern(NodeKind::RateChange { factor, signal: s2 })))
            }
            NodeKind::Gate { signal, gate, .. } => {
                let (rxs, s2) = self.visit(nodes, signal, arg_rx)?;
                let (_rxg, g2) = self.visit(nodes, gate, arg_rx)?;
                let bit = self.analysis.allocate_mask_bit();
                let rx = self.analysis.gate(rxs, bit)?;
                // The allocated bit is baked into the rewritten node itself
                // so the Side-Effect Compiler can read it back directly
                // instead of re-deriving it from the reactivity arena.
                Ok((rx, nodes.intern(NodeKind::Gate { signal: s2, gate: g2, mask_bit: bit })))
            }
            NodeKind::Merge(elems) => {
                let mut acc = self.analysis.leaf();
                let mut rewritten = Vec::with_capacity(elems.len());
                let mut rxs = Vec::with_capacity(elems.len());
                for e in &elems {
                    let (r, e2) = self.visit(nodes, *e, arg_rx)?;
                    acc = self.analysis.merge2(acc, r)?;
                    rewritten.push(e2);
                    rxs.push(r);
                }
                let wired: Vec<Node> =
                    rewritten.iter().zip(rxs.iter()).map(|(n, r)| self.wire(nodes, acc, *r, *n)).collect();
                Ok((acc, nodes.intern(NodeKind::Merge(wired))))
            }
            NodeKind::Impose { clock, signal } => {
                let (rc, c2) = self.visit(nodes, clock, arg_rx)?;
                let (rs, s2) = self.visit(nodes, signal, arg_rx)?;
                let s3 = self.wire(nodes, rc, rs, s2);
                Ok((rc, nodes.intern(NodeKind::Impose { clock: c2, signal: s3 })))
            }
            NodeKind::RelativePriority { signal, from, op } => {
                let (rs, s2) = self.visit(nodes, signal, arg_rx)?;
                let (rf, f2) = self.visit(nodes, from, arg_rx)?;
                let rx = self.analysis.relative_priority(rs, rf, op)?;
                Ok((rx, nodes.intern(NodeKind::RelativePriority { signal: s2, from: f2, op })))
            }
            NodeKind::FunctionCall { body, arg } => {
                let (ra, arg2) = self.visit(nodes, arg, arg_rx)?;
                // Memoized on (body, ra) per §1 / §4.3 rule 11.
                let (rx, body_result) = self.visit(nodes, body, ra)?;
                Ok((rx, nodes.intern(NodeKind::FunctionCall { body: body_result, arg: arg2 })))
            }
            NodeKind::FunctionSequence { generator, iterations } => {
                let (rx, gen2) = self.analyze_sequence(nodes, generator, iterations, arg_rx)?;
                Ok((rx, nodes.intern(NodeKind::FunctionSequence { generator: gen2, iterations })))
            }
            NodeKind::RecursionBranch { body, loop_count } => {
                let (rlc, lc2) = self.visit(nodes, loop_count, arg_rx)?;
                let (rx, body2) = self.analyze_sequence(nodes, body, u32::MAX, arg_rx)?;
                let lc3 = self.wire(nodes, rx, rlc, lc2);
                Ok((rx, nodes.intern(NodeKind::RecursionBranch { body: body2, loop_count: lc3 })))
            }
            NodeKind::GetGlobalVariable { uid, ty } => {
                let rx = self.analysis.global_rx.get(&uid).copied().unwrap_or_else(|| self.analysis.leaf());
                Ok((rx, nodes.intern(NodeKind::GetGlobalVariable { uid, ty })))
            }
            NodeKind::SetGlobalVariable { uid, value } => {
                let (rv, v2) = self.visit(nodes, value, arg_rx)?;
                if let Some(&existing) = self.analysis.global_rx.get(&uid) {
                    if existing != rv {
                        return Err(CompileError::program(format!(
                            "global variable {:?} observed with inconsistent reactivity across writers",
                            uid
                        )));
                    }
                }
                self.analysis.global_rx.insert(uid, rv);
                Ok((rv, nodes.intern(NodeKind::SetGlobalVariable { uid, value: v2 })))
            }
            NodeKind::RingBuffer { len, input } => {
                let (ri, i2) = self.visit(nodes, input, arg_rx)?;
                Ok((ri, nodes.intern(NodeKind::RingBuffer { len, input: i2 })))
            }
            NodeKind::Switch { selector, branches } => {
                let (_rsel, sel2) = self.visit(nodes, selector, arg_rx)?;
                let mut acc = self.analysis.leaf();
                let mut rewritten = Vec::with_capacity(branches.len());
                let mut rxs = Vec::with_capacity(branches.len());
                for b in &branches {
                    let (r, b2) = self.visit(nodes, *b, arg_rx)?;
                    acc = self.analysis.merge2(acc, r)?;
                    rewritten.push(b2);
                    rxs.push(r);
                }
                let wired: Vec<Node> =
                    rewritten.iter().zip(rxs.iter()).map(|(n, r)| self.wire(nodes, acc, *r, *n)).collect();
                Ok((acc, nodes.intern(NodeKind::Switch { selector: sel2, branches: wired })))
            }
            NodeKind::Boundary { up } => self.visit(nodes, up, arg_rx),
            NodeKind::ForeignFunction { symbol, args, side_effecting } => {
                let mut acc = self.analysis.leaf();
                let mut rewritten = Vec::with_capacity(args.len());
                let mut rxs = Vec::with_capacity(args.len());
                for a in &args {
                    let (r, a2) = self.visit(nodes, *a, arg_rx)?;
                    acc = self.analysis.merge2(acc, r)?;
                    rewritten.push(a2);
                    rxs.push(r);
                }
                let wired: Vec<Node> =
                    rewritten.iter().zip(rxs.iter()).map(|(n, r)| self.wire(nodes, acc, *r, *n)).collect();
                Ok((acc, nodes.intern(NodeKind::ForeignFunction { symbol, args: wired, side_effecting })))
            }
            NodeKind::AtIndex { array, index } => {
                let (ra, a2) = self.visit(nodes, array, arg_rx)?;
                let (ri, i2) = self.visit(nodes, index, arg_rx)?;
                let rx = self.analysis.merge2(ra, ri)?;
                let a3 = self.wire(nodes, rx, ra, a2);
                let i3 = self.wire(nodes, rx, ri, i2);
                Ok((rx, nodes.intern(NodeKind::AtIndex { array: a3, index: i3 })))
            }
            NodeKind::Slice { array, offset, length } => {
                let (ra, a2) = self.visit(nodes, array, arg_rx)?;
                let (ro, o2) = self.visit(nodes, offset, arg_rx)?;
                let (rl, l2) = self.visit(nodes, length, arg_rx)?;
                let rx = self.analysis.merge2(self.analysis.merge2(ra, ro)?, rl)?;
                let a3 = self.wire(nodes, rx, ra, a2);
                let o3 = self.wire(nodes, rx, ro, o2);
                let l3 = self.wire(nodes, rx, rl, l2);
                Ok((rx, nodes.intern(NodeKind::Slice { array: a3, offset: o3, length: l3 })))
            }
            NodeKind::SubArray { array, offset, length } => {
                let (ra, a2) = self.visit(nodes, array, arg_rx)?;
                let (ro, o2) = self.visit(nodes, offset, arg_rx)?;
                let rx = self.analysis.merge2(ra, ro)?;
                let a3 = self.wire(nodes, rx, ra, a2);
                let o3 = self.wire(nodes, rx, ro, o2);
                Ok((rx, nodes.intern(NodeKind::SubArray { array: a3, offset: o3, length })))
            }
        }
    }

    /// Fixed-point reactivity of a `FunctionSequence`/`RecursionBranch`
    /// generator (§4.3 "Recursive clocks"): analyze under a placeholder,
    /// then re-analyze under the placeholder's resolved fixed point; if
    /// they agree the cycle is committed, otherwise peel and retry. Bounded
    /// by `remaining_attempts` so it always terminates (testable property
    /// 7, §8), matching "split the sequence in half and retry".
    fn analyze_sequence(
        &mut self,
        nodes: &mut Arena<NodeKind>,
        generator: Node,
        iterations: u32,
        arg_rx: RxId,
    ) -> Result<(RxId, Node)> {
        let mut remaining_attempts = iterations.max(1).min(64);
        let placeholder = self.analysis.new_placeholder();
        let (first_rx, _) = self.visit(nodes, generator, placeholder)?;
        self.analysis.record_against_placeholder(placeholder, first_rx);
        let mut fixed = self.analysis.commit_placeholder(placeholder)?;
        loop {
            let (confirm_rx, confirm_node) = self.visit(nodes, generator, fixed)?;
            if confirm_rx == fixed || remaining_attempts <= 1 {
                return Ok((confirm_rx, confirm_node));
            }
            remaining_attempts -= 1;
            fixed = self.analysis.merge2(fixed, confirm_rx)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ConstantValue;

    fn drivers() -> HashMap<DriverId, Rc<str>> {
        let mut m = HashMap::new();
        m.insert(DriverId(Uid(1)), Rc::from("audio"));
        m
    }

    #[test]
    fn totality_every_node_carries_a_reactivity() {
        let ds = drivers();
        let mut nodes: Arena<NodeKind> = Arena::new();
        let a = nodes.intern(NodeKind::Constant(ConstantValue::f32(1.0)));
        let b = nodes.intern(NodeKind::Tick(DriverId(Uid(1))));
        let root = nodes.intern(NodeKind::Pair(a, b));

        let mut pass = ReactivePass::new(&ds);
        let leaf = pass.analysis.leaf();
        let (_rx, new_root) = pass.run(&mut nodes, root, leaf).unwrap();
        assert!(nodes.reactivity_of(new_root).is_some());
    }

    #[test]
    fn impose_inserts_a_boundary_on_a_mismatched_signal_leg() {
        let ds = drivers();
        let mut nodes: Arena<NodeKind> = Arena::new();
        let clock = nodes.intern(NodeKind::Tick(DriverId(Uid(1))));
        let other_driver = DriverId(Uid(2));
        let mut ds2 = ds.clone();
        ds2.insert(other_driver, Rc::from("control"));
        let signal = nodes.intern(NodeKind::Tick(other_driver));
        let root = nodes.intern(NodeKind::Impose { clock, signal });

        let mut pass = ReactivePass::new(&ds2);
        let leaf = pass.analysis.leaf();
        let (_rx, new_root) = pass.run(&mut nodes, root, leaf).unwrap();
        match nodes.kind(new_root) {
            NodeKind::Impose { signal, .. } => {
                assert!(matches!(nodes.kind(*signal), NodeKind::Boundary { .. }));
            }
            other => panic!("expected Impose, got {other:?}"),
        }
    }

    #[test]
    fn merge_of_identical_drivers_does_not_insert_a_boundary() {
        let ds = drivers();
        let mut nodes: Arena<NodeKind> = Arena::new();
        let a = nodes.intern(NodeKind::Tick(DriverId(Uid(1))));
        let root = nodes.intern(NodeKind::Merge(vec![a, a]));

        let mut pass = ReactivePass::new(&ds);
        let leaf = pass.analysis.leaf();
        let (_rx, new_root) = pass.run(&mut nodes, root, leaf).unwrap();
        match nodes.kind(new_root) {
            NodeKind::Merge(elems) => {
                for e in elems {
                    assert!(!matches!(nodes.kind(*e), NodeKind::Boundary { .. }));
                }
            }
            other => panic!("expected Merge, got {other:?}"),
        }
    }
}
