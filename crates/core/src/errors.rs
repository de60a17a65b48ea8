//! The four error kinds the compiler surfaces to its caller (§7).

use crate::types::Type;
use thiserror::Error;

/// An opaque position in the front end's source buffer.
///
/// The parser/specializer that produced a node is an external collaborator
/// (§1), so this crate never resolves a `SourcePos` to `file:line:column`
/// itself; it hands the raw value back to the caller's [`SourceResolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourcePos(pub u32);

/// Maps an opaque [`SourcePos`] back to a human-readable location.
///
/// Implemented by the embedding front end, never by this crate.
pub trait SourceResolver {
    fn resolve(&self, pos: SourcePos) -> Option<(String, u32, u32)>;
}

/// The four error kinds of §7.
#[derive(Debug, Error, Clone)]
pub enum CompileError {
    /// A user source bug, anchored to a position in the original buffer.
    #[error("program error at {pos:?}: {message}")]
    Program { pos: Option<SourcePos>, message: String },

    /// A specialization-time type mismatch.
    #[error("type error: expected {expected}, found {found}")]
    Type { expected: Type, found: Type },

    /// I/O or asset-loading failure during compilation.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// A compiler invariant was violated. Not user-recoverable.
    #[error("internal compiler error: {0}")]
    Internal(String),
}

impl CompileError {
    pub fn program(message: impl Into<String>) -> Self {
        CompileError::Program { pos: None, message: message.into() }
    }

    pub fn program_at(pos: SourcePos, message: impl Into<String>) -> Self {
        CompileError::Program { pos: Some(pos), message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CompileError::Internal(message.into())
    }

    pub fn is_fatal(&self) -> bool {
        // All four kinds abort the current compile (§7); none are resumable
        // once returned to the caller. A *branch* of a polymorphic function
        // may fail and be retried by its parent call without unwinding, but
        // that retry happens below this type, not through it.
        true
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;

/// A single non-fatal notice accumulated during a compile (the "XML-like
/// diagnostic stream" of §7, realized as a structured event instead of a
/// text stream).
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub pos: Option<SourcePos>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
}

/// Receives diagnostics as they are produced, so an embedding IDE can show
/// them live instead of waiting for the compile to finish.
pub trait DiagnosticSink {
    fn notify(&mut self, diagnostic: Diagnostic);
}

/// The default sink: just buffer everything.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    pub notices: Vec<Diagnostic>,
}

impl DiagnosticSink for Diagnostics {
    fn notify(&mut self, diagnostic: Diagnostic) {
        self.notices.push(diagnostic);
    }
}

impl Diagnostics {
    pub fn warn(&mut self, pos: Option<SourcePos>, message: impl Into<String>) {
        self.notify(Diagnostic { severity: Severity::Warning, pos, message: message.into() });
    }

    pub fn info(&mut self, pos: Option<SourcePos>, message: impl Into<String>) {
        self.notify(Diagnostic { severity: Severity::Info, pos, message: message.into() });
    }
}
