//! Error taxonomy and diagnostics for the interop boundary.

use std::fmt;

/// Result type for interop operations.
pub type InteropResult<T> = Result<T, InteropError>;

/// Which phase of engine execution a failure came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// Source failed to compile.
    Compile,
    /// Execution raised a runtime error.
    Runtime,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Compile => write!(f, "compile"),
            FailureKind::Runtime => write!(f, "runtime"),
        }
    }
}

/// Interop error types.
///
/// Handle and resource validity failures are raised *before* crossing into
/// the foreign ABI — the engine has no way to validate a pointer it is
/// handed, so fail-fast checking on the host side is the layer's core
/// safety contract. Every strict accessor has a `try_` sibling returning
/// `bool`/`Option` for hot paths that prefer branching.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InteropError {
    /// A handle failed its validity check (released, recycled, or never issued).
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// A resource or slot value did not match the requested type.
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type name
        expected: String,
        /// Actual type name
        got: String,
    },

    /// The engine context failed to start.
    #[error("Engine initialization failed: {0}")]
    InitializationFailure(String),

    /// The engine reported a compile or runtime failure.
    ///
    /// Only produced when the context is configured to raise on failure;
    /// otherwise the result code is returned as-is. Carries the diagnostic
    /// log accumulated during the failed interpret/call.
    #[error("Engine {kind} failure: {summary}")]
    InterpretFailure {
        /// Compile-time or run-time failure
        kind: FailureKind,
        /// Joined diagnostic messages for display
        summary: String,
        /// The diagnostic entries accumulated during the failed run
        diagnostics: Vec<Diagnostic>,
    },

    /// Arity, slot index, or symbol capacity exceeded.
    #[error("Argument out of range: {0}")]
    ArgumentRange(String),
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Category of an engine-reported diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Compile-time error in script source.
    Compile,
    /// Runtime error raised during execution.
    Runtime,
    /// One frame of a runtime error's stack trace.
    StackTrace,
}

/// One entry in the per-context rolling diagnostic log.
///
/// Delivered by the engine's diagnostic callback during interpret/call.
/// Script errors are never fatal to the host process; they accumulate
/// here and the log is cleared at the start of each interpret/call.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    /// Diagnostic category
    pub kind: DiagnosticKind,
    /// Module the diagnostic points at
    pub module: String,
    /// 1-based source line, or 0 when not applicable
    pub line: u32,
    /// Engine-provided message text
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DiagnosticKind::Compile => {
                write!(f, "[{}:{}] compile: {}", self.module, self.line, self.message)
            }
            DiagnosticKind::Runtime => write!(f, "[{}] {}", self.module, self.message),
            DiagnosticKind::StackTrace => {
                write!(f, "  at {}:{} {}", self.module, self.line, self.message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = InteropError::TypeMismatch {
            expected: "number".to_string(),
            got: "string".to_string(),
        };
        assert_eq!(err.to_string(), "Type mismatch: expected number, got string");

        let err = InteropError::InvalidHandle("receiver was released".to_string());
        assert_eq!(err.to_string(), "Invalid handle: receiver was released");
    }

    #[test]
    fn test_interpret_failure_display() {
        let err = InteropError::InterpretFailure {
            kind: FailureKind::Compile,
            summary: "unexpected token".to_string(),
            diagnostics: vec![],
        };
        assert_eq!(err.to_string(), "Engine compile failure: unexpected token");
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic {
            kind: DiagnosticKind::Compile,
            module: "main".to_string(),
            line: 3,
            message: "expected ')'".to_string(),
        };
        assert_eq!(diag.to_string(), "[main:3] compile: expected ')'");
    }
}
