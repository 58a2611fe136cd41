//! The emitter (spec.md §4.5): walks an analysed AST and an
//! `AnalyserContext`, producing Lua source text through a `Layout`.

mod emitter;
pub mod layout;

pub use emitter::{emit, emit_missing, Dim, EmitContext};
pub use layout::{Layout, LayoutOptions, Precedence, ScopedOperator, SpaceState, SyntaxState};
