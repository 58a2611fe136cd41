//! `ChildAssertionIterator` (spec.md §4.4): walks a node's children while
//! maintaining the assertions implied by *being at position i* — per-kind
//! propagation the emitter consults alongside the raw children.

use pmml_core::{AstNode, FunctionKind};

use super::assumption::Assumption;
use super::guard::{register_assertions, Registered};

/// Iterates a node's children, exposing at each step the assertions implied
/// by position alone: `block_assertions` (valid only for the child just
/// yielded) and `running_assertions` (accumulated across prior siblings).
/// Both views are recomputed from the already-seen siblings, per spec.md
/// §4.4's per-kind table.
pub struct ChildAssertionIterator<'a> {
    node: &'a AstNode,
    index: usize,
    running: Registered,
    block: Registered,
}

impl<'a> ChildAssertionIterator<'a> {
    pub fn new(node: &'a AstNode) -> Self {
        Self {
            node,
            index: 0,
            running: Registered::default(),
            block: Registered::default(),
        }
    }

    pub fn running_assertions(&self) -> &Registered {
        &self.running
    }

    pub fn block_assertions(&self) -> &Registered {
        &self.block
    }

    fn compute_block(&self, i: usize) -> Registered {
        let kids = self.node.children();
        match self.node.def().kind {
            FunctionKind::IfChain => {
                // Even-indexed body: the following predicate is assumed
                // TRUE for the duration of that body.
                if i % 2 == 0 && i + 1 < kids.len() {
                    register_assertions(&kids[i + 1], Assumption::True)
                } else {
                    Registered::default()
                }
            }
            FunctionKind::Ternary => match i {
                1 => register_assertions(&kids[0], Assumption::True),
                2 => register_assertions(&kids[0], Assumption::False),
                _ => Registered::default(),
            },
            FunctionKind::Bound => {
                if i == 1 {
                    register_assertions(&kids[0], Assumption::True)
                } else {
                    Registered::default()
                }
            }
            FunctionKind::Surrogate => {
                let mut reg = Registered::default();
                for earlier in &kids[..i] {
                    reg = reg.merge(register_assertions(earlier, Assumption::Missing));
                }
                reg
            }
            _ => Registered::default(),
        }
    }

    fn fold_running(&self, i: usize) -> Registered {
        let kids = self.node.children();
        match self.node.def().kind {
            FunctionKind::BooleanAnd => kids[..i]
                .iter()
                .map(|c| register_assertions(c, Assumption::NotFalse))
                .fold(Registered::default(), Registered::merge),
            FunctionKind::BooleanOr => kids[..i]
                .iter()
                .map(|c| register_assertions(c, Assumption::NotTrue))
                .fold(Registered::default(), Registered::merge),
            FunctionKind::IfChain => {
                // All prior predicates are assumed NOT_TRUE in the running
                // scope (we did not take any earlier branch).
                let mut reg = Registered::default();
                let mut j = 1;
                while j < i {
                    reg = reg.merge(register_assertions(&kids[j], Assumption::NotTrue));
                    j += 2;
                }
                reg
            }
            _ => Registered::default(),
        }
    }
}

impl<'a> Iterator for ChildAssertionIterator<'a> {
    type Item = (usize, &'a AstNode);

    fn next(&mut self) -> Option<Self::Item> {
        let kids = self.node.children();
        if self.index >= kids.len() {
            return None;
        }
        let i = self.index;
        self.running = self.fold_running(i);
        self.block = self.compute_block(i);
        self.index += 1;
        Some((i, &kids[i]))
    }
}
