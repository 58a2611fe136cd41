//! The two queries the emitter drives off of (spec.md §4.4): whether an
//! expression might evaluate to missing at runtime, and whether a boolean
//! expression's value is already known at compile time.

use pmml_core::catalog::MissingRule;
use pmml_core::{AstNode, FunctionKind};

use super::assumption::Assumption;
use super::context::AnalyserContext;
use super::guard::{register_assertions, NonNullAssumptionGuard, Registered};

/// The result of `check_if_trivial`: a boolean expression's compile-time
/// known value, or a sign that it can only be decided at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trivial {
    AlwaysTrue,
    AlwaysFalse,
    RuntimeNeeded,
}

/// `false` iff `E`'s clause id is asserted not-missing, or the
/// kind-dispatched rule below proves it cannot be missing under the
/// current assumptions (spec.md §4.4).
pub fn might_be_missing(ctx: &mut AnalyserContext, node: &AstNode) -> bool {
    if ctx.clause_is_asserted_not_missing(node.id()) {
        return false;
    }

    match node.def().kind {
        FunctionKind::Constant | FunctionKind::IsMissing | FunctionKind::IsNotMissing => false,

        FunctionKind::BooleanAnd => sibling_assumed_missingness(ctx, node, Assumption::NotFalse),
        FunctionKind::BooleanOr => sibling_assumed_missingness(ctx, node, Assumption::NotTrue),

        FunctionKind::Ternary => {
            let kids = node.children();
            match check_if_trivial(ctx, &kids[0]) {
                Trivial::AlwaysTrue => might_be_missing(ctx, &kids[1]),
                Trivial::AlwaysFalse => kids
                    .get(2)
                    .map(|branch| might_be_missing(ctx, branch))
                    .unwrap_or(false),
                Trivial::RuntimeNeeded => {
                    might_be_missing(ctx, &kids[1])
                        || kids.get(2).is_some_and(|branch| might_be_missing(ctx, branch))
                }
            }
        }

        FunctionKind::Bound => {
            let kids = node.children();
            match check_if_trivial(ctx, &kids[0]) {
                Trivial::AlwaysTrue => might_be_missing(ctx, &kids[1]),
                _ => true,
            }
        }

        FunctionKind::Surrogate => node.children().iter().all(|c| might_be_missing(ctx, c)),

        FunctionKind::FieldRef => node
            .field()
            .map(|f| !ctx.field_is_asserted_not_missing(f))
            .unwrap_or(true),

        FunctionKind::RunLambda => {
            if let Some(lambda) = node.children().iter().find(|c| c.def().kind == FunctionKind::Lambda) {
                let body = lambda.children().last();
                body.map(|b| might_be_missing(ctx, b)).unwrap_or(true)
            } else {
                generic_missing_rule(ctx, node)
            }
        }

        _ => generic_missing_rule(ctx, node),
    }
}

fn generic_missing_rule(ctx: &mut AnalyserContext, node: &AstNode) -> bool {
    match node.def().missing_rule {
        MissingRule::NeverMissing => false,
        MissingRule::MaybeMissing => true,
        MissingRule::MissingIfAnyArgMissing | MissingRule::MaybeMissingIfAnyArgMissing => {
            node.children().iter().any(|c| might_be_missing(ctx, c))
        }
    }
}

/// Shared and/or dispatch: for each child, temporarily assume every other
/// child holds the non-short-circuit value, then ask whether this child
/// might be missing under that assumption; any positive answer propagates
/// (spec.md §4.4 "with temporary assumptions pushing the other children...").
fn sibling_assumed_missingness(ctx: &mut AnalyserContext, node: &AstNode, other_assumption: Assumption) -> bool {
    let kids = node.children();
    for i in 0..kids.len() {
        let combined = combine_others(kids, i, other_assumption);
        let mut guard = NonNullAssumptionGuard::from_registered(ctx, combined);
        let missing = might_be_missing(guard.context(), &kids[i]);
        drop(guard);
        if missing {
            return true;
        }
    }
    false
}

fn combine_others(kids: &[AstNode], skip: usize, assumption: Assumption) -> Registered {
    let mut combined = Registered::default();
    for (j, other) in kids.iter().enumerate() {
        if j != skip {
            combined = combined.merge(register_assertions(other, assumption));
        }
    }
    combined
}

/// `{always-true, always-false, runtime-needed}` (spec.md §4.4).
pub fn check_if_trivial(ctx: &mut AnalyserContext, node: &AstNode) -> Trivial {
    use pmml_core::FieldType;

    match node.def().kind {
        FunctionKind::IsMissing => {
            let child = &node.children()[0];
            if !might_be_missing(ctx, child) {
                Trivial::AlwaysFalse
            } else {
                Trivial::RuntimeNeeded
            }
        }
        FunctionKind::IsNotMissing => {
            let child = &node.children()[0];
            if !might_be_missing(ctx, child) {
                Trivial::AlwaysTrue
            } else {
                Trivial::RuntimeNeeded
            }
        }
        FunctionKind::Constant if node.effective_type() == FieldType::Bool => {
            if node.content().eq_ignore_ascii_case("true") {
                Trivial::AlwaysTrue
            } else {
                Trivial::AlwaysFalse
            }
        }
        FunctionKind::BooleanAnd => fold_and_or(ctx, node, true),
        FunctionKind::BooleanOr => fold_and_or(ctx, node, false),
        FunctionKind::BooleanXor => {
            let mut parity = false;
            for child in node.children() {
                match check_if_trivial(ctx, child) {
                    Trivial::AlwaysTrue => parity = !parity,
                    Trivial::AlwaysFalse => {}
                    Trivial::RuntimeNeeded => return Trivial::RuntimeNeeded,
                }
            }
            if parity {
                Trivial::AlwaysTrue
            } else {
                Trivial::AlwaysFalse
            }
        }
        FunctionKind::IsIn => {
            if node.children().len() <= 1 {
                Trivial::AlwaysFalse
            } else {
                Trivial::RuntimeNeeded
            }
        }
        FunctionKind::IsNotIn => {
            if node.children().len() <= 1 {
                Trivial::AlwaysTrue
            } else {
                Trivial::RuntimeNeeded
            }
        }
        _ => Trivial::RuntimeNeeded,
    }
}

/// Shared and/or trivial-fold: `is_and` picks the short-circuit/non-short
/// values (and: false short-circuits, non-short value true; or: dually).
fn fold_and_or(ctx: &mut AnalyserContext, node: &AstNode, is_and: bool) -> Trivial {
    let kids = node.children();
    let (short_circuit, non_short, identity) = if is_and {
        (Trivial::AlwaysFalse, Assumption::True, Trivial::AlwaysTrue)
    } else {
        (Trivial::AlwaysTrue, Assumption::False, Trivial::AlwaysFalse)
    };
    let mut all_identity = true;
    for i in 0..kids.len() {
        let combined = combine_others(kids, i, non_short);
        let mut guard = NonNullAssumptionGuard::from_registered(ctx, combined);
        let t = check_if_trivial(guard.context(), &kids[i]);
        drop(guard);
        if t == short_circuit {
            return short_circuit;
        }
        if t == Trivial::RuntimeNeeded {
            all_identity = false;
        }
    }
    if all_identity {
        identity
    } else {
        Trivial::RuntimeNeeded
    }
}
