//! The closed algebraic type universe (§3.1, §4.2).
//!
//! Every graph node (§3.2) carries one of these. The algebra is closed: no
//! user-extensible type constructors exist outside of [`Type::User`] and
//! [`Type::TypeTag`], which brand an otherwise-ordinary structural type.

use crate::arena::NodeId;
use num_rational::BigRational;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// A native scalar kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scalar {
    F32,
    F64,
    I32,
    I64,
}

impl Scalar {
    pub fn size(self) -> u32 {
        match self {
            Scalar::F32 | Scalar::I32 => 4,
            Scalar::F64 | Scalar::I64 => 8,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scalar::F32 => "f32",
            Scalar::F64 => "f64",
            Scalar::I32 => "i32",
            Scalar::I64 => "i64",
        };
        f.write_str(s)
    }
}

/// An interned, opaque brand used by [`Type::User`] (§3.1 "Type tag").
///
/// The id is an index into [`TypeTagTable`]; equality and ordering on the id
/// realize pointer-identity comparison of the original's descriptor pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTagId(pub u32);

#[derive(Debug, Clone)]
pub struct TypeTagInfo {
    pub name: Rc<str>,
    /// Marks the tag as a discriminated union: `content` carries a runtime
    /// subtype index alongside the selected variant's payload.
    pub is_union: bool,
}

/// Interns [`TypeTagInfo`] records so two type tags compare equal iff they
/// are the same pointer in the original design.
#[derive(Debug, Default)]
pub struct TypeTagTable {
    tags: Vec<TypeTagInfo>,
}

impl TypeTagTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: impl Into<Rc<str>>, is_union: bool) -> TypeTagId {
        let name = name.into();
        if let Some(i) = self.tags.iter().position(|t| t.name == name && t.is_union == is_union) {
            return TypeTagId(i as u32);
        }
        self.tags.push(TypeTagInfo { name, is_union });
        TypeTagId((self.tags.len() - 1) as u32)
    }

    pub fn info(&self, id: TypeTagId) -> &TypeTagInfo {
        &self.tags[id.0 as usize]
    }
}

/// A compile-time constant with full semantic identity (§3.1 "Invariant").
#[derive(Debug, Clone)]
pub enum Invariant {
    /// An arbitrary-precision rational.
    Rational(BigRational),
    /// An interned string.
    Str(Rc<str>),
    /// A quoted subgraph, identified by its hash-consed node.
    Graph(NodeId<crate::node::NodeKind>),
}

impl PartialEq for Invariant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Invariant::Rational(a), Invariant::Rational(b)) => a == b,
            (Invariant::Str(a), Invariant::Str(b)) => a == b,
            (Invariant::Graph(a), Invariant::Graph(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for Invariant {}

impl Hash for Invariant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Invariant::Rational(r) => {
                0u8.hash(state);
                r.numer().to_string().hash(state);
                r.denom().to_string().hash(state);
            }
            Invariant::Str(s) => {
                1u8.hash(state);
                s.hash(state);
            }
            Invariant::Graph(n) => {
                2u8.hash(state);
                n.hash(state);
            }
        }
    }
}

impl PartialOrd for Invariant {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Invariant {
    fn cmp(&self, other: &Self) -> Ordering {
        fn rank(i: &Invariant) -> u8 {
            match i {
                Invariant::Rational(_) => 0,
                Invariant::Str(_) => 1,
                Invariant::Graph(_) => 2,
            }
        }
        match (self, other) {
            (Invariant::Rational(a), Invariant::Rational(b)) => a.cmp(b),
            (Invariant::Str(a), Invariant::Str(b)) => a.cmp(b),
            (Invariant::Graph(a), Invariant::Graph(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

/// A lazily-generated type rule, resolved to a concrete [`Type`] by `fix`.
///
/// Generator ids are allocated by whatever pass produces them (typically
/// the external specializer before handing the graph to this crate); this
/// crate only carries the indirection and the table that resolves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeneratorId(pub u32);

#[derive(Default)]
pub struct GeneratorTable {
    rules: Vec<Box<dyn Fn() -> Type>>,
}

impl fmt::Debug for GeneratorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorTable").field("rules", &self.rules.len()).finish()
    }
}

impl GeneratorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, rule: impl Fn() -> Type + 'static) -> GeneratorId {
        self.rules.push(Box::new(rule));
        GeneratorId((self.rules.len() - 1) as u32)
    }

    pub fn resolve(&self, id: GeneratorId) -> Type {
        (self.rules[id.0 as usize])()
    }
}

/// The closed type universe (§3.1).
#[derive(Debug, Clone)]
pub enum Type {
    Scalar(Scalar),
    /// A fixed-width SIMD-style pack, width 2..256.
    Vector(Scalar, u16),
    /// `(element element ... . tail)`, run-encoded so a homogeneous run of
    /// any length is constant-size (§4.2 "Run encoding").
    Pair { element: Rc<Type>, count: u32, tail: Rc<Type> },
    Nil,
    True,
    Invariant(Invariant),
    TypeTag(TypeTagId),
    /// `(tag, content)`; `tag.is_union` marks a discriminated union.
    User { tag: TypeTagId, content: Rc<Type> },
    /// `(base_ptr, offset, length)` over an array of a native element type.
    ArrayView(Scalar),
    /// An unresolved rule-generator; call [`fix`] to concretize.
    Generator(GeneratorId),
}

impl Type {
    pub fn pair(a: Type, b: Type) -> Type {
        // Collapse `a . (a . (a . tail))` runs as they are built, so a
        // thousand-element homogeneous tuple stays constant-size.
        if let Type::Pair { element, count, tail } = &b {
            if **element == a {
                return Type::Pair { element: element.clone(), count: count + 1, tail: tail.clone() };
            }
        }
        Type::Pair { element: Rc::new(a), count: 1, tail: Rc::new(b) }
    }

    /// The head of this run-encoded pair.
    pub fn first(&self) -> Option<Type> {
        match self {
            Type::Pair { element, .. } => Some((**element).clone()),
            _ => None,
        }
    }

    /// Everything after the head: the remaining run, or the tail if the run
    /// is now exhausted.
    pub fn rest(&self) -> Option<Type> {
        match self {
            Type::Pair { element, count, tail } => {
                if *count > 1 {
                    Some(Type::Pair { element: element.clone(), count: count - 1, tail: tail.clone() })
                } else {
                    Some((**tail).clone())
                }
            }
            _ => None,
        }
    }

    /// The length of the leading run of `element`-equal entries.
    pub fn count_leading(&self, matching: &Type) -> u32 {
        match self {
            Type::Pair { element, count, .. } if **element == *matching => *count,
            _ => 0,
        }
    }

    /// Resolve any [`Type::Generator`] (recursively, through pairs) to its
    /// concrete form.
    pub fn fix(&self, generators: &GeneratorTable) -> Type {
        match self {
            Type::Generator(id) => generators.resolve(*id).fix(generators),
            Type::Pair { element, count, tail } => Type::Pair {
                element: Rc::new(element.fix(generators)),
                count: *count,
                tail: Rc::new(tail.fix(generators)),
            },
            Type::User { tag, content } => Type::User { tag: *tag, content: Rc::new(content.fix(generators)) },
            other => other.clone(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Type::Scalar(_) => 0,
            Type::Vector(..) => 1,
            Type::Pair { .. } => 2,
            Type::Nil => 3,
            Type::True => 4,
            Type::Invariant(_) => 5,
            Type::TypeTag(_) => 6,
            Type::User { .. } => 7,
            Type::ArrayView(_) => 8,
            Type::Generator(_) => 9,
        }
    }
}

/// `size(type(expr)) = size_of_bytes_emitted` (testable property 2, §8).
///
/// Returns `Err` for an unresolved [`Type::Generator`]: a generator has no
/// size until fixed.
pub fn size_of(ty: &Type) -> Result<u32, String> {
    match ty {
        Type::Scalar(s) => Ok(s.size()),
        Type::Vector(s, n) => Ok(s.size() * (*n as u32)),
        Type::Pair { element, count, tail } => {
            Ok(size_of(element)? * count + size_of(tail)?)
        }
        Type::Nil | Type::True | Type::Invariant(_) => Ok(0),
        Type::TypeTag(_) => Ok(0),
        Type::User { content, .. } => size_of(content),
        Type::ArrayView(_) => Ok(16), // 64-bit base + 32-bit offset + 32-bit length
        Type::Generator(_) => Err("cannot size an unresolved type generator; call fix() first".to_string()),
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Scalar(a), Type::Scalar(b)) => a == b,
            (Type::Vector(a, n), Type::Vector(b, m)) => a == b && n == m,
            (
                Type::Pair { element: e1, count: c1, tail: t1 },
                Type::Pair { element: e2, count: c2, tail: t2 },
            ) => c1 == c2 && e1 == e2 && t1 == t2,
            (Type::Nil, Type::Nil) => true,
            (Type::True, Type::True) => true,
            (Type::Invariant(a), Type::Invariant(b)) => a == b,
            (Type::TypeTag(a), Type::TypeTag(b)) => a == b,
            (Type::User { tag: t1, content: c1 }, Type::User { tag: t2, content: c2 }) => {
                t1 == t2 && c1 == c2
            }
            (Type::ArrayView(a), Type::ArrayView(b)) => a == b,
            (Type::Generator(a), Type::Generator(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Type::Scalar(s) => s.hash(state),
            Type::Vector(s, n) => {
                s.hash(state);
                n.hash(state);
            }
            Type::Pair { element, count, tail } => {
                element.hash(state);
                count.hash(state);
                tail.hash(state);
            }
            Type::Nil | Type::True => {}
            Type::Invariant(v) => v.hash(state),
            Type::TypeTag(t) => t.hash(state),
            Type::User { tag, content } => {
                tag.hash(state);
                content.hash(state);
            }
            Type::ArrayView(s) => s.hash(state),
            Type::Generator(g) => g.hash(state),
        }
    }
}

impl PartialOrd for Type {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Total order over types, lexicographic on (kind, local fields, operands) —
/// used to canonicalize reactive driver sets (§4.1 "Ordering").
impl Ord for Type {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Type::Scalar(a), Type::Scalar(b)) => a.cmp(b),
            (Type::Vector(a, n), Type::Vector(b, m)) => a.cmp(b).then(n.cmp(m)),
            (
                Type::Pair { element: e1, count: c1, tail: t1 },
                Type::Pair { element: e2, count: c2, tail: t2 },
            ) => e1.cmp(e2).then(c1.cmp(c2)).then(t1.cmp(t2)),
            (Type::Nil, Type::Nil) | (Type::True, Type::True) => Ordering::Equal,
            (Type::Invariant(a), Type::Invariant(b)) => a.cmp(b),
            (Type::TypeTag(a), Type::TypeTag(b)) => a.cmp(b),
            (Type::User { tag: t1, content: c1 }, Type::User { tag: t2, content: c2 }) => {
                t1.cmp(t2).then(c1.cmp(c2))
            }
            (Type::ArrayView(a), Type::ArrayView(b)) => a.cmp(b),
            (Type::Generator(a), Type::Generator(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Scalar(s) => write!(f, "{s}"),
            Type::Vector(s, n) => write!(f, "{s}x{n}"),
            Type::Pair { element, count, tail } => {
                if *count == 1 {
                    write!(f, "({element} . {tail})")
                } else {
                    write!(f, "({element}*{count} . {tail})")
                }
            }
            Type::Nil => write!(f, "nil"),
            Type::True => write!(f, "true"),
            Type::Invariant(_) => write!(f, "invariant"),
            Type::TypeTag(id) => write!(f, "tag#{}", id.0),
            Type::User { tag, content } => write!(f, "user(tag#{}, {content})", tag.0),
            Type::ArrayView(s) => write!(f, "array<{s}>"),
            Type::Generator(id) => write!(f, "generator#{}", id.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_encoding_stays_constant_size() {
        let mut ty = Type::Nil;
        for _ in 0..1000 {
            ty = Type::pair(Type::Scalar(Scalar::F32), ty);
        }
        match &ty {
            Type::Pair { count, .. } => assert_eq!(*count, 1000),
            _ => panic!("expected a run-encoded pair"),
        }
    }

    #[test]
    fn size_algebra_matches_spec_formulas() {
        let pair = Type::pair(Type::Scalar(Scalar::F32), Type::Scalar(Scalar::F32));
        assert_eq!(size_of(&pair).unwrap(), 8);
        assert_eq!(size_of(&Type::Vector(Scalar::F64, 4)).unwrap(), 32);
        assert_eq!(size_of(&Type::ArrayView(Scalar::I32)).unwrap(), 16);
        assert_eq!(size_of(&Type::Nil).unwrap(), 0);
        assert_eq!(size_of(&Type::True).unwrap(), 0);
    }

    #[test]
    fn count_leading_returns_the_run_length() {
        let ty = Type::pair(
            Type::Scalar(Scalar::F32),
            Type::pair(Type::Scalar(Scalar::F32), Type::pair(Type::Scalar(Scalar::F32), Type::Nil)),
        );
        assert_eq!(ty.count_leading(&Type::Scalar(Scalar::F32)), 3);
    }

    #[test]
    fn first_rest_decompose_a_run_in_place() {
        let ty = Type::pair(Type::Scalar(Scalar::I32), Type::pair(Type::Scalar(Scalar::I32), Type::Nil));
        assert_eq!(ty.first(), Some(Type::Scalar(Scalar::I32)));
        let rest = ty.rest().unwrap();
        assert_eq!(rest.first(), Some(Type::Scalar(Scalar::I32)));
        assert_eq!(rest.rest(), Some(Type::Nil));
    }
}
