//! `AnalyserContext` (spec.md §4.4): the two refcount maps assertions are
//! registered against, keyed by `FieldId` and `NodeId` respectively.

use indexmap::IndexMap;
use pmml_core::{FieldId, NodeId};

/// Holds the live not-missing assertions for the duration of one
/// compilation pass. Assertions are refcounted rather than boolean so that
/// nested guards asserting the same fact compose correctly (spec.md §4.4
/// "Guards must be destroyed in LIFO order").
#[derive(Debug, Default)]
pub struct AnalyserContext {
    not_missing_vars: IndexMap<FieldId, usize>,
    not_missing_clauses: IndexMap<NodeId, usize>,
}

impl AnalyserContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assert_field_not_missing(&mut self, field: FieldId) {
        *self.not_missing_vars.entry(field).or_insert(0) += 1;
    }

    pub fn retract_field_not_missing(&mut self, field: FieldId) {
        if let Some(count) = self.not_missing_vars.get_mut(&field) {
            *count -= 1;
            if *count == 0 {
                self.not_missing_vars.shift_remove(&field);
            }
        }
    }

    pub fn field_is_asserted_not_missing(&self, field: FieldId) -> bool {
        self.not_missing_vars.contains_key(&field)
    }

    pub fn assert_clause_not_missing(&mut self, node: NodeId) {
        *self.not_missing_clauses.entry(node).or_insert(0) += 1;
    }

    pub fn retract_clause_not_missing(&mut self, node: NodeId) {
        if let Some(count) = self.not_missing_clauses.get_mut(&node) {
            *count -= 1;
            if *count == 0 {
                self.not_missing_clauses.shift_remove(&node);
            }
        }
    }

    pub fn clause_is_asserted_not_missing(&self, node: NodeId) -> bool {
        self.not_missing_clauses.contains_key(&node)
    }
}

#[cfg(test)]
mod context_tests {
    use super::*;

    fn fid(n: u32) -> FieldId {
        // FieldId has no public constructor outside pmml-core; round-trip
        // through a FieldArena to obtain one for this unit test.
        let mut arena = pmml_core::FieldArena::new();
        for _ in 0..n {
            arena.declare(
                "x".into(),
                None,
                pmml_core::FieldType::Number,
                pmml_core::OpType::Continuous,
                pmml_core::FieldOrigin::Temporary,
            );
        }
        arena.declare(
            "x".into(),
            None,
            pmml_core::FieldType::Number,
            pmml_core::OpType::Continuous,
            pmml_core::FieldOrigin::Temporary,
        )
    }

    #[test]
    fn nested_assertions_refcount_and_release_in_lifo_order() {
        let mut ctx = AnalyserContext::new();
        let field = fid(0);
        ctx.assert_field_not_missing(field);
        ctx.assert_field_not_missing(field);
        assert!(ctx.field_is_asserted_not_missing(field));
        ctx.retract_field_not_missing(field);
        assert!(ctx.field_is_asserted_not_missing(field));
        ctx.retract_field_not_missing(field);
        assert!(!ctx.field_is_asserted_not_missing(field));
    }
}
