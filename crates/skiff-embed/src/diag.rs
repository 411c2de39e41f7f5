//! Per-context rolling diagnostic log.
//!
//! Engine-reported compile/runtime errors and stack-trace frames are
//! appended here during interpret/call and cleared at the start of each
//! one. Script errors are never fatal to the host process.

use std::collections::VecDeque;

use skiff_sdk::Diagnostic;

/// Bounded FIFO of engine diagnostics. When full, the oldest entry is
/// dropped.
pub struct DiagnosticLog {
    entries: VecDeque<Diagnostic>,
    capacity: usize,
}

impl DiagnosticLog {
    /// Create a log retaining at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        DiagnosticLog {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity: capacity.max(1),
        }
    }

    /// Append an entry, evicting the oldest when at capacity.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(diagnostic);
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate entries oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// Clone the entries oldest-first.
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.entries.iter().cloned().collect()
    }

    /// Join all messages into one display string, newest last.
    pub fn summary(&self) -> String {
        self.entries
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skiff_sdk::DiagnosticKind;

    fn diag(message: &str) -> Diagnostic {
        Diagnostic {
            kind: DiagnosticKind::Runtime,
            module: "main".to_string(),
            line: 0,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_push_and_snapshot() {
        let mut log = DiagnosticLog::new(8);
        log.push(diag("first"));
        log.push(diag("second"));
        let snap = log.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].message, "first");
    }

    #[test]
    fn test_rolls_over_at_capacity() {
        let mut log = DiagnosticLog::new(2);
        log.push(diag("a"));
        log.push(diag("b"));
        log.push(diag("c"));
        let snap = log.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].message, "b", "oldest entry evicted");
        assert_eq!(snap[1].message, "c");
    }

    #[test]
    fn test_clear() {
        let mut log = DiagnosticLog::new(4);
        log.push(diag("a"));
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_summary_joins_messages() {
        let mut log = DiagnosticLog::new(4);
        log.push(diag("a"));
        log.push(diag("b"));
        assert_eq!(log.summary(), "[main] a\n[main] b");
    }
}
