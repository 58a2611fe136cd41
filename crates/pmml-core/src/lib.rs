#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core data structures for the PMML-to-Lua compiler.
//!
//! This crate holds the language-agnostic parts of the compilation model
//! shared by every stage: the closed value-type enums, the
//! `FunctionCatalog` of built-in operators, the `AstNode` tree, the
//! `FieldDescription` arena, and the scoped-name allocator. The
//! orchestration logic that builds and transforms trees made of these
//! pieces lives in `pmml-compiler`.

pub mod allocator;
pub mod ast;
pub mod catalog;
pub mod field;
pub mod interner;
#[cfg(test)]
mod interner_tests;
pub mod types;

pub use allocator::NameAllocator;
pub use ast::{AstNode, NodeId, NodeIdAllocator};
pub use catalog::{CatalogEntry, FunctionDefinition, FunctionKind, MissingRule, Precedence};
pub use field::{FieldArena, FieldDescription, FieldId, OverflowSlot};
pub use interner::{Interner, Symbol};
pub use types::{FieldOrigin, FieldType, OpType};
