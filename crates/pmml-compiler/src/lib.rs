//! PMML-to-Lua compiler core: the `AstBuilder`, `Analyser`, `Emitter`,
//! `Optimiser`, and `Driver` that sit between XML ingest (out of scope) and
//! textual Lua emission (spec.md §1).
//!
//! - `context` - `ConversionContext` and its scope guards (C2)
//! - `builder` - `AstBuilder`, the Reverse-Polish tree constructor (C3)
//! - `analyze` - the Analyser's assumption stack and queries (C4)
//! - `emit` - the Lua emitter (C5)
//! - `optimise` - dead-code elimination, inlining, aliasing, overflow (C6)
//! - `driver` - top-level orchestration (C7)
//! - `diagnostics` - the non-fatal diagnostics collector (spec.md §5/§7)
//! - `error` - the fatal error taxonomy (spec.md §7)

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod analyze;
pub mod builder;
pub mod context;
pub mod diagnostics;
pub mod driver;
pub mod emit;
pub mod error;
pub mod optimise;

pub use builder::AstBuilder;
pub use context::ConversionContext;
pub use diagnostics::{Diagnostics, PassResult, Severity};
pub use driver::{Driver, DriverConfig};
pub use error::{CompileError, Error, Result};
pub use optimise::OptimiserLimits;
