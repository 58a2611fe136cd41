//! Dead-code removal pass (spec.md §4.6 pass 3). Runs the analyser's
//! triviality and missingness queries over the tree bottom-up, collapsing
//! branches whose condition is already decided and dropping declarations
//! and assignments to fields nothing ever reads.

use pmml_core::{AstNode, FieldOrigin, FunctionKind};

use crate::analyze::{check_if_trivial, might_be_missing, AnalyserContext, Trivial};
use crate::context::ConversionContext;

use super::var_info::VarInfoMap;

/// One dead-code-removal sweep. Returns whether anything changed, so the
/// caller can iterate passes 1-4 to a fixpoint.
pub fn run(
    ctx: &ConversionContext,
    analyser: &mut AnalyserContext,
    node: &mut AstNode,
    var_info: &VarInfoMap,
) -> bool {
    let mut changed = false;
    simplify(ctx, analyser, node, var_info, &mut changed);
    changed
}

fn simplify(
    ctx: &ConversionContext,
    analyser: &mut AnalyserContext,
    node: &mut AstNode,
    var_info: &VarInfoMap,
    changed: &mut bool,
) {
    for child in node.children_mut() {
        simplify(ctx, analyser, child, var_info, changed);
    }

    match node.def().kind {
        FunctionKind::IfChain => simplify_if_chain(analyser, node, changed),
        FunctionKind::Ternary | FunctionKind::Bound => simplify_ternary_or_bound(analyser, node, changed),
        FunctionKind::Default => simplify_default(analyser, node, changed),
        FunctionKind::Block => remove_dead_declarations(ctx, node, var_info, changed),
        _ => {}
    }
}

fn is_empty_body(node: &AstNode) -> bool {
    node.def().kind == FunctionKind::Block && node.children().is_empty()
}

/// Drops branches whose predicate is always false, stops the chain early
/// (keeping only the body) at the first always-true predicate, trims a
/// trailing empty else, and collapses a chain down to a bare body when
/// everything else has been eliminated (spec.md §4.6 "empty trailing
/// bodies ... are trimmed").
fn simplify_if_chain(analyser: &mut AnalyserContext, node: &mut AstNode, changed: &mut bool) {
    let id = node.id();
    let field_type = node.declared_type();

    let new_children = {
        let kids = node.children();
        let mut out: Vec<AstNode> = Vec::with_capacity(kids.len());
        let mut i = 0;
        let mut stopped_early = false;
        while i + 1 < kids.len() {
            let body = &kids[i];
            let predicate = &kids[i + 1];
            match check_if_trivial(analyser, predicate) {
                Trivial::AlwaysFalse => {
                    *changed = true;
                }
                Trivial::AlwaysTrue => {
                    *changed = true;
                    out.push(body.clone());
                    stopped_early = true;
                    break;
                }
                Trivial::RuntimeNeeded => {
                    out.push(body.clone());
                    out.push(predicate.clone());
                }
            }
            i += 2;
        }
        if !stopped_early && i < kids.len() {
            out.push(kids[i].clone());
        }
        if out.len() % 2 == 1 {
            if let Some(last) = out.last() {
                if is_empty_body(last) {
                    out.pop();
                    *changed = true;
                }
            }
        }
        out
    };

    *node.children_mut() = new_children;

    match node.children().len() {
        0 => {
            *changed = true;
            *node = AstNode::new(id, pmml_core::catalog::internal::BLOCK, field_type);
        }
        1 => {
            *changed = true;
            let only = node.children_mut().pop().expect("len checked above");
            *node = only;
        }
        _ => {}
    }
}

/// Collapses a `Ternary`/`Bound` node whose predicate is compile-time
/// decided down to the taken branch.
fn simplify_ternary_or_bound(analyser: &mut AnalyserContext, node: &mut AstNode, changed: &mut bool) {
    let trivial = {
        let predicate = &node.children()[0];
        check_if_trivial(analyser, predicate)
    };
    match trivial {
        Trivial::AlwaysTrue => {
            *changed = true;
            let true_branch = node.children()[1].clone();
            *node = true_branch;
        }
        Trivial::AlwaysFalse => {
            if node.children().len() > 2 {
                *changed = true;
                let false_branch = node.children()[2].clone();
                *node = false_branch;
            } else if node.def().kind == FunctionKind::Bound {
                *changed = true;
                let id = node.id();
                let ty = node.effective_type();
                *node = AstNode::new(id, pmml_core::catalog::internal::NIL, ty);
            }
        }
        Trivial::RuntimeNeeded => {}
    }
}

/// A `Default`-macro whose value-half can never be missing just becomes
/// that value-half.
fn simplify_default(analyser: &mut AnalyserContext, node: &mut AstNode, changed: &mut bool) {
    let value = &node.children()[0];
    if !might_be_missing(analyser, value) {
        *changed = true;
        let value = node.children()[0].clone();
        *node = value;
    }
}

/// Drops `Declaration`/`Assignment` statements for fields nothing in the
/// tree reads. Safe because PMML expressions have no side effects beyond
/// the write itself.
fn remove_dead_declarations(
    ctx: &ConversionContext,
    node: &mut AstNode,
    var_info: &VarInfoMap,
    changed: &mut bool,
) {
    let kids = std::mem::take(node.children_mut());
    let mut kept = Vec::with_capacity(kids.len());
    for child in kids {
        let dead = matches!(
            child.def().kind,
            FunctionKind::Declaration | FunctionKind::Assignment
        ) && child.field().is_some_and(|field| {
            let origin = ctx.fields().get(field).origin;
            let movable_origin = matches!(
                origin,
                FieldOrigin::Temporary | FieldOrigin::TransformedValue
            );
            let unused = var_info
                .get(&field)
                .map(|v| v.use_count == 0)
                .unwrap_or(true);
            movable_origin && unused
        });
        if dead {
            *changed = true;
        } else {
            kept.push(child);
        }
    }
    *node.children_mut() = kept;
}
