//! `NonNullAssumptionGuard` (spec.md §4.4): registers the assertions implied
//! by assuming a checked expression takes on a given value, and retracts
//! them (LIFO) on drop.

use std::collections::HashSet;

use pmml_core::{AstNode, FieldId, FunctionKind, NodeId};

use super::assumption::Assumption;
use super::context::AnalyserContext;

/// The set of facts one assumption registration proved: a batch of fields
/// and clause ids now known not-missing.
#[derive(Debug, Clone, Default)]
pub struct Registered {
    pub fields: HashSet<FieldId>,
    pub clauses: HashSet<NodeId>,
}

impl Registered {
    fn with_field(mut self, field: FieldId) -> Self {
        self.fields.insert(field);
        self
    }

    fn with_clause(mut self, node: NodeId) -> Self {
        self.clauses.insert(node);
        self
    }

    pub(crate) fn merge(mut self, other: Registered) -> Self {
        self.fields.extend(other.fields);
        self.clauses.extend(other.clauses);
        self
    }
}

/// Intersects registrations across sibling branches: a fact is only safe to
/// assume in the parent scope if every branch independently proved it
/// (spec.md §4.4 "if-chain registers the intersection of each branch's
/// registrations").
#[derive(Debug, Clone)]
pub struct AssertionIntersection {
    current: Option<Registered>,
}

impl Default for AssertionIntersection {
    fn default() -> Self {
        Self::new()
    }
}

impl AssertionIntersection {
    pub fn new() -> Self {
        Self { current: None }
    }

    pub fn add_branch(&mut self, branch: Registered) {
        self.current = Some(match self.current.take() {
            None => branch,
            Some(existing) => Registered {
                fields: existing.fields.intersection(&branch.fields).copied().collect(),
                clauses: existing
                    .clauses
                    .intersection(&branch.clauses)
                    .copied()
                    .collect(),
            },
        });
    }

    pub fn finish(self) -> Registered {
        self.current.unwrap_or_default()
    }
}

/// Walk `node` under assumption `a`, returning every fact that is now known
/// (spec.md §4.4 "Adding assertions for a checked expression").
pub fn register_assertions(node: &AstNode, a: Assumption) -> Registered {
    use Assumption as A;
    use FunctionKind as K;

    match node.def().kind {
        K::Not => {
            let child = &node.children()[0];
            match a {
                A::True => register_assertions(child, A::False),
                A::False => register_assertions(child, A::True),
                other => register_assertions(child, other),
            }
        }
        K::IsMissing => {
            let child = &node.children()[0];
            if matches!(a, A::False | A::NotTrue) {
                if let Some(field) = child.field() {
                    Registered::default().with_field(field)
                } else {
                    Registered::default()
                }
            } else {
                Registered::default()
            }
        }
        K::IsNotMissing => {
            let child = &node.children()[0];
            if matches!(a, A::True | A::NotFalse) {
                if let Some(field) = child.field() {
                    Registered::default().with_field(field)
                } else {
                    Registered::default()
                }
            } else {
                Registered::default()
            }
        }
        K::BooleanAnd => match a {
            A::True => node
                .children()
                .iter()
                .map(|c| register_assertions(c, A::True))
                .fold(Registered::default(), Registered::merge),
            A::False => {
                let mut intersection = AssertionIntersection::new();
                for c in node.children() {
                    intersection.add_branch(register_assertions(c, A::False));
                }
                intersection.finish()
            }
            _ => Registered::default(),
        },
        K::BooleanOr => match a {
            A::False => node
                .children()
                .iter()
                .map(|c| register_assertions(c, A::False))
                .fold(Registered::default(), Registered::merge),
            A::True => {
                let mut intersection = AssertionIntersection::new();
                for c in node.children() {
                    intersection.add_branch(register_assertions(c, A::True));
                }
                intersection.finish()
            }
            _ => Registered::default(),
        },
        K::IfChain => {
            let kids = node.children();
            let mut intersection = AssertionIntersection::new();
            let mut i = 0;
            let mut has_else = false;
            while i + 1 < kids.len() {
                intersection.add_branch(register_assertions(&kids[i], a));
                i += 2;
            }
            if i < kids.len() {
                intersection.add_branch(register_assertions(&kids[i], a));
                has_else = true;
            }
            if !has_else {
                intersection.add_branch(Registered::default());
            }
            intersection.finish()
        }
        K::Ternary | K::Bound => {
            if matches!(a, A::Missing) {
                return Registered::default();
            }
            let kids = node.children();
            let predicate_field = kids[0].field();
            let mut base = Registered::default().with_clause(kids[0].id());
            if let Some(field) = predicate_field {
                base = base.with_field(field);
            }
            let mut intersection = AssertionIntersection::new();
            intersection.add_branch(register_assertions(&kids[1], a));
            if kids.len() > 2 {
                intersection.add_branch(register_assertions(&kids[2], a));
            }
            base.merge(intersection.finish())
        }
        K::Default => {
            let child = &node.children()[0];
            let default_is_true = node.content().eq_ignore_ascii_case("true");
            let contrary = match a {
                A::True => !default_is_true,
                A::False => default_is_true,
                _ => false,
            };
            if contrary {
                register_assertions(child, a)
            } else {
                Registered::default()
            }
        }
        K::FieldRef => {
            if matches!(a, A::True | A::False | A::NotMissing) {
                let mut reg = Registered::default().with_clause(node.id());
                if let Some(field) = node.field() {
                    reg = reg.with_field(field);
                }
                reg
            } else {
                Registered::default()
            }
        }
        _ => {
            use pmml_core::catalog::MissingRule;
            if node.def().missing_rule == MissingRule::MissingIfAnyArgMissing
                && matches!(a, A::True | A::False | A::NotMissing)
            {
                node.children()
                    .iter()
                    .map(|c| register_assertions(c, A::NotMissing))
                    .fold(Registered::default(), Registered::merge)
            } else {
                Registered::default()
            }
        }
    }
}

/// Applies a `Registered` batch on construction; reverses it (decrementing
/// refcounts) on drop. Nested guards must be destroyed in LIFO order
/// (spec.md §4.4) — Rust's scoping enforces this automatically for
/// stack-allocated guards.
pub struct NonNullAssumptionGuard<'a> {
    ctx: &'a mut AnalyserContext,
    registered: Registered,
}

impl<'a> NonNullAssumptionGuard<'a> {
    pub fn new(ctx: &'a mut AnalyserContext, node: &AstNode, assumption: Assumption) -> Self {
        let registered = register_assertions(node, assumption);
        for &field in &registered.fields {
            ctx.assert_field_not_missing(field);
        }
        for &clause in &registered.clauses {
            ctx.assert_clause_not_missing(clause);
        }
        Self { ctx, registered }
    }

    /// Construct a guard from an already-computed registration (used when
    /// the caller has composed assertions itself, e.g. across an
    /// `if-chain`'s branches).
    pub fn from_registered(ctx: &'a mut AnalyserContext, registered: Registered) -> Self {
        for &field in &registered.fields {
            ctx.assert_field_not_missing(field);
        }
        for &clause in &registered.clauses {
            ctx.assert_clause_not_missing(clause);
        }
        Self { ctx, registered }
    }

    pub fn context(&mut self) -> &mut AnalyserContext {
        self.ctx
    }
}

impl Drop for NonNullAssumptionGuard<'_> {
    fn drop(&mut self) {
        for &field in &self.registered.fields {
            self.ctx.retract_field_not_missing(field);
        }
        for &clause in &self.registered.clauses {
            self.ctx.retract_clause_not_missing(clause);
        }
    }
}
