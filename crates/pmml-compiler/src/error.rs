//! Error taxonomy (spec.md §7). `CompileError` is the closed set of kinds a
//! single parse/compile step can fail with; `Error` is the driver-facing
//! surface wrapping it.

use pmml_core::FieldType;

/// One of the six error kinds of spec.md §7, each carrying the offending
/// name/line where applicable.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    #[error("{message} ({arg}) at line {line}")]
    MalformedInput {
        message: String,
        arg: String,
        line: u32,
    },

    #[error("unknown {what} '{name}' at line {line}")]
    UnknownReference {
        what: String,
        name: String,
        line: u32,
    },

    #[error("unsupported feature: {what} at line {line}")]
    UnsupportedFeature { what: String, line: u32 },

    #[error("type mismatch: expected {expected:?}, found {found:?} at line {line}")]
    MismatchedType {
        expected: FieldType,
        found: FieldType,
        line: u32,
    },

    #[error("resource budget exceeded: {locals} locals exceeds cap of {cap}")]
    ResourceBudgetExceeded { locals: usize, cap: usize },

    #[error("internal invariant violated: {message}")]
    InternalInvariant { message: String },
}

impl CompileError {
    /// The one-line `<message> (<arg>) at line N` surface of spec.md §7,
    /// for callers that don't want `Display`'s `{kind}: ` prefix style.
    pub fn to_hook_message(&self) -> String {
        self.to_string()
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalInvariant {
            message: message.into(),
        }
    }
}

/// The driver-facing error surface: either a single hard compile error, or
/// the optimiser's budget having been exceeded after all passes ran.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),
}

pub type Result<T> = std::result::Result<T, Error>;
