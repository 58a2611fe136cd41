//! Diagnostics collection, modeled on the teacher's `plotnik-lib::diagnostics`
//! module: a builder (`DiagnosticBuilder`) with `.error()/.warning()/.emit()`
//! accumulating into a `Diagnostics` collector. Uses a source line number in
//! place of `rowan::TextRange`, since the PMML DOM this core consumes is not
//! a CST (spec.md §6 "Input").

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    #[default]
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A single diagnostic message: the one-line `<message> (<arg>) at line N`
/// surface of spec.md §7.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticMessage {
    pub severity: Severity,
    pub message: String,
    pub arg: Option<String>,
    pub line: u32,
}

impl DiagnosticMessage {
    fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

impl std::fmt::Display for DiagnosticMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)?;
        if let Some(arg) = &self.arg {
            write!(f, " ({arg})")?;
        }
        write!(f, " at line {}", self.line)
    }
}

/// Collection of non-fatal diagnostic messages accumulated during a
/// compilation: the "recorded and silently omit" cases of spec.md §5, e.g.
/// a derived field unresolvable under the current mining schema.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    messages: Vec<DiagnosticMessage>,
}

/// Builder for constructing a diagnostic message.
#[must_use = "diagnostic not recorded, call .emit()"]
pub struct DiagnosticBuilder<'a> {
    diagnostics: &'a mut Diagnostics,
    message: DiagnosticMessage,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    pub fn error(&mut self, msg: impl Into<String>, line: u32) -> DiagnosticBuilder<'_> {
        DiagnosticBuilder {
            diagnostics: self,
            message: DiagnosticMessage {
                severity: Severity::Error,
                message: msg.into(),
                arg: None,
                line,
            },
        }
    }

    pub fn warning(&mut self, msg: impl Into<String>, line: u32) -> DiagnosticBuilder<'_> {
        DiagnosticBuilder {
            diagnostics: self,
            message: DiagnosticMessage {
                severity: Severity::Warning,
                message: msg.into(),
                arg: None,
                line,
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(DiagnosticMessage::is_error)
    }

    pub fn has_warnings(&self) -> bool {
        self.messages.iter().any(DiagnosticMessage::is_warning)
    }

    pub fn error_count(&self) -> usize {
        self.messages.iter().filter(|d| d.is_error()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiagnosticMessage> {
        self.messages.iter()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.messages.extend(other.messages);
    }
}

impl<'a> DiagnosticBuilder<'a> {
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.message.arg = Some(arg.into());
        self
    }

    pub fn emit(self) {
        self.diagnostics.messages.push(self.message);
    }
}

/// `PassResult<T>` per the teacher's `CompilerBuilder` convention: a pass
/// returns its typed output alongside whatever non-fatal diagnostics it
/// collected, with fatal errors escaping through the outer `Result`.
pub type PassResult<T> = crate::error::Result<(T, Diagnostics)>;

#[cfg(test)]
mod diagnostics_tests {
    use super::*;

    #[test]
    fn records_error_with_arg() {
        let mut diags = Diagnostics::new();
        diags
            .error("unknown mining field", 42)
            .with_arg("foo")
            .emit();
        assert_eq!(diags.len(), 1);
        assert!(diags.has_errors());
        let msg = diags.iter().next().unwrap();
        assert_eq!(msg.to_string(), "error: unknown mining field (foo) at line 42");
    }

    #[test]
    fn warning_does_not_count_as_error() {
        let mut diags = Diagnostics::new();
        diags.warning("derived field omitted", 7).emit();
        assert!(!diags.has_errors());
        assert!(diags.has_warnings());
        assert_eq!(diags.error_count(), 0);
    }

    #[test]
    fn extend_combines_two_collections() {
        let mut a = Diagnostics::new();
        a.error("a", 1).emit();
        let mut b = Diagnostics::new();
        b.error("b", 2).emit();
        a.extend(b);
        assert_eq!(a.len(), 2);
    }
}
