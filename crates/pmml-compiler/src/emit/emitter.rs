//! The recursive emitter (spec.md §4.5/§4.5.1), ground-truthed against
//! `original_source/luaconverter/luaconverter.cpp` and
//! `luaconverter-ternary.cpp` for the ternary/bound dispatch.

use indexmap::IndexMap;

use pmml_core::{AstNode, FieldDescription, FieldId, FieldType, FunctionKind};

use crate::analyze::{check_if_trivial, might_be_missing, AnalyserContext, Trivial};
use crate::context::ConversionContext;

use super::layout::{Layout, Precedence, ScopedOperator};

/// What the caller will do with a missing result (spec.md §4.5): threads
/// down the recursion so every node can pick the cheapest Lua idiom for its
/// particular caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dim {
    /// Caller distinguishes missing from false; do not conflate.
    Nil,
    /// Caller only cares about truthiness; missing may read as false.
    False,
    /// Caller requires the unknown outcome treated as true (scaffolding
    /// inside `and` chains).
    True,
}

/// Bundles the tables the emitter consults at every node: the field
/// arena/alias table from the conversion context, and the analyser's
/// not-missing assertions.
pub struct EmitContext<'a> {
    pub conversion: &'a ConversionContext,
    pub analyser: &'a mut AnalyserContext,
    pub aliases: &'a IndexMap<FieldId, FieldId>,
}

impl<'a> EmitContext<'a> {
    /// Tied to `'a`, not to `&self`, so callers can hold the returned
    /// reference across a later `&mut EmitContext` borrow (e.g. to recurse
    /// into an index expression while still holding the field's own
    /// description).
    fn field(&self, id: FieldId) -> &'a FieldDescription {
        let conversion: &'a ConversionContext = self.conversion;
        conversion.fields().get(id)
    }

    fn alias(&self, id: FieldId) -> Option<&'a FieldDescription> {
        let conversion: &'a ConversionContext = self.conversion;
        self.aliases.get(&id).map(|aliased| conversion.fields().get(*aliased))
    }
}

/// `emit(ctx, node, dim, out)` (spec.md §4.5): guards with a null-check
/// when the node's catalog rule is `missing-if-any-arg-missing` and the
/// analyser says it might be missing here, wrapping the body as
/// `missing-clause and body` (DIM=FALSE/NIL) or `missing-clause or body`
/// (DIM=TRUE), asserting not-missing on sub-expressions inside.
pub fn emit(ctx: &mut EmitContext, node: &AstNode, dim: Dim, out: &mut Layout) {
    use pmml_core::catalog::MissingRule;

    let wrap = node.def().missing_rule == MissingRule::MissingIfAnyArgMissing
        && might_be_missing(ctx.analyser, node);

    if wrap {
        emit_wrapped(ctx, node, dim, out);
    } else {
        emit_core(ctx, node, dim, out);
    }
}

fn emit_wrapped(ctx: &mut EmitContext, node: &AstNode, dim: Dim, out: &mut Layout) {
    let join = if dim == Dim::True { "or" } else { "and" };
    let precedence = if join == "or" { Precedence::Or } else { Precedence::And };
    let scope = ScopedOperator::new(out, precedence);
    emit_missing(ctx, node, true, scope.layout);
    scope.layout.keyword(join);
    for child in node.children() {
        if let Some(field) = child.field() {
            ctx.analyser.assert_field_not_missing(field);
        }
    }
    emit_core(ctx, node, dim, scope.layout);
}

fn emit_core(ctx: &mut EmitContext, node: &AstNode, dim: Dim, out: &mut Layout) {
    match node.def().kind {
        FunctionKind::Constant => emit_constant(node, out),
        FunctionKind::FieldRef => emit_field_ref(ctx, node, dim, out),
        FunctionKind::Operator => emit_operator(ctx, node, out),
        FunctionKind::Comparison => emit_comparison(ctx, node, out),
        FunctionKind::FunctionLike => emit_function_call(ctx, node, out),
        FunctionKind::UnaryMinus => emit_unary(ctx, node, "-", out),
        FunctionKind::Not => emit_not(ctx, node, dim, out),
        FunctionKind::BooleanAnd => emit_and(ctx, node, dim, out),
        FunctionKind::BooleanOr => emit_or(ctx, node, dim, out),
        FunctionKind::BooleanXor => emit_xor(ctx, node, out),
        FunctionKind::Ternary => emit_ternary(ctx, node, dim, out),
        FunctionKind::Bound => emit_bound(ctx, node, dim, out),
        FunctionKind::Default => emit_default(ctx, node, out),
        FunctionKind::Surrogate => emit_surrogate(ctx, node, out),
        FunctionKind::IsMissing => emit_missing(ctx, node.children().first().unwrap_or(node), false, out),
        FunctionKind::IsNotMissing => emit_missing(ctx, node.children().first().unwrap_or(node), true, out),
        FunctionKind::IsIn | FunctionKind::IsNotIn => emit_is_in(ctx, node, out),
        FunctionKind::Block => emit_block(ctx, node, out),
        FunctionKind::IfChain => emit_if_chain(ctx, node, out),
        FunctionKind::Declaration => emit_declaration(ctx, node, out),
        FunctionKind::Assignment => emit_assignment(ctx, node, out),
        FunctionKind::AssignIndirect => emit_assign_indirect(ctx, node, out),
        FunctionKind::Lambda => emit_lambda(ctx, node, out),
        FunctionKind::RunLambda => emit_run_lambda(ctx, node, out),
        FunctionKind::Return => emit_return(ctx, node, out),
        FunctionKind::MakeTuple => emit_tuple(ctx, node, out),
        FunctionKind::Mean => emit_mean(ctx, node, out),
        FunctionKind::Log10 => emit_log10(ctx, node, out),
        FunctionKind::Round => emit_round(ctx, node, out),
        FunctionKind::Threshold => emit_threshold(ctx, node, out),
        FunctionKind::Substring => emit_substring(ctx, node, out),
        FunctionKind::Trim => emit_trim(ctx, node, out),
        FunctionKind::SortTable | FunctionKind::InsertToTable => emit_function_call(ctx, node, out),
        FunctionKind::ListLength => emit_unary(ctx, node, "#", out),
        FunctionKind::Unsupported => {
            out.keyword("error").open_paren().literal("unsupported PMML function", FieldType::String).close_paren();
        }
    }
}

fn emit_constant(node: &AstNode, out: &mut Layout) {
    out.literal(node.content(), node.effective_type());
}

/// `v[i1][i2]...` (spec.md §4.5.1 "field-ref with indirections"): chains
/// `v and v[i1] and v[i1][i2] and ...` so a `nil` at any indirection depth
/// short-circuits to `nil` rather than erroring. Skipped entirely when the
/// field itself is known not-missing.
fn emit_field_ref(ctx: &mut EmitContext, node: &AstNode, dim: Dim, out: &mut Layout) {
    let field_id = node.field().expect("field-ref node must carry a FieldId");
    let indirections = node.children();
    let not_missing = ctx.analyser.field_is_asserted_not_missing(field_id);

    let desc = ctx.field(field_id);
    let alias = ctx.alias(field_id);

    if indirections.is_empty() || not_missing {
        out.field(desc, alias);
        for index in indirections {
            out.open_bracket();
            emit(ctx, index, Dim::Nil, out);
            out.close_bracket();
        }
    } else {
        let scope = ScopedOperator::new(out, Precedence::And);
        let layout = &mut *scope.layout;
        for depth in 1..=indirections.len() {
            if depth > 1 {
                layout.keyword("and");
            }
            layout.field(desc, alias);
            for index in &indirections[..depth] {
                layout.open_bracket();
                emit(ctx, index, Dim::Nil, layout);
                layout.close_bracket();
            }
        }
    }

    if desc.declared_type == FieldType::Bool {
        match dim {
            Dim::True => {
                out.keyword("or").keyword("true");
            }
            Dim::False => {
                out.keyword("or").keyword("false");
            }
            Dim::Nil => {}
        }
    }
}

fn emit_operator(ctx: &mut EmitContext, node: &AstNode, out: &mut Layout) {
    let lua_op = node.def().lua_function.unwrap_or("+");
    let precedence = node.def().precedence;
    let scope = ScopedOperator::new(out, precedence);
    let layout = &mut *scope.layout;
    for (i, child) in node.children().iter().enumerate() {
        if i > 0 {
            layout.keyword(lua_op);
        }
        emit(ctx, child, Dim::Nil, layout);
    }
}

fn emit_comparison(ctx: &mut EmitContext, node: &AstNode, out: &mut Layout) {
    let lua_op = node.def().lua_function.unwrap_or("==");
    let scope = ScopedOperator::new(out, Precedence::Equal);
    let layout = &mut *scope.layout;
    emit(ctx, &node.children()[0], Dim::Nil, layout);
    layout.keyword(lua_op);
    emit(ctx, &node.children()[1], Dim::Nil, layout);
}

fn emit_function_call(ctx: &mut EmitContext, node: &AstNode, out: &mut Layout) {
    let name = node.def().lua_function.unwrap_or("nil");
    out.keyword(name).open_paren();
    for (i, child) in node.children().iter().enumerate() {
        if i > 0 {
            out.comma();
        }
        emit(ctx, child, Dim::Nil, out);
    }
    out.close_paren();
}

/// `avg(x1..xn)` (PMML `avg`): sum over `+` then divide by the arg count.
fn emit_mean(ctx: &mut EmitContext, node: &AstNode, out: &mut Layout) {
    let kids = node.children();
    let scope = ScopedOperator::new(out, Precedence::Times);
    let layout = &mut *scope.layout;
    {
        let sum_scope = ScopedOperator::new(layout, Precedence::Plus);
        let sum_layout = &mut *sum_scope.layout;
        for (i, child) in kids.iter().enumerate() {
            if i > 0 {
                sum_layout.keyword("+");
            }
            emit(ctx, child, Dim::Nil, sum_layout);
        }
    }
    layout.keyword("/").literal(&kids.len().to_string(), FieldType::Number);
}

/// `log10(x)`: Lua's `math.log` has no base argument, so divide by
/// `math.log(10)`.
fn emit_log10(ctx: &mut EmitContext, node: &AstNode, out: &mut Layout) {
    let scope = ScopedOperator::new(out, Precedence::Times);
    let layout = &mut *scope.layout;
    layout.keyword("math.log").open_paren();
    emit(ctx, &node.children()[0], Dim::Nil, layout);
    layout.close_paren();
    layout.keyword("/math.log(10)");
}

/// `round(x)`: `math.floor(x + 0.5)`.
fn emit_round(ctx: &mut EmitContext, node: &AstNode, out: &mut Layout) {
    out.keyword("math.floor").open_paren();
    let scope = ScopedOperator::new(out, Precedence::Plus);
    let layout = &mut *scope.layout;
    emit(ctx, &node.children()[0], Dim::Nil, layout);
    layout.keyword("+").literal("0.5", FieldType::Number);
    drop(scope);
    out.close_paren();
}

/// `threshold(x, a)`: `1` if `x > a`, else `0`.
fn emit_threshold(ctx: &mut EmitContext, node: &AstNode, out: &mut Layout) {
    let kids = node.children();
    let scope = ScopedOperator::new(out, Precedence::Or);
    let layout = &mut *scope.layout;
    {
        let cmp_scope = ScopedOperator::new(layout, Precedence::Equal);
        let cmp_layout = &mut *cmp_scope.layout;
        emit(ctx, &kids[0], Dim::Nil, cmp_layout);
        cmp_layout.keyword(">");
        emit(ctx, &kids[1], Dim::Nil, cmp_layout);
    }
    layout.keyword("and").literal("1", FieldType::Number);
    layout.keyword("or").literal("0", FieldType::Number);
}

/// `substring(s, start, length)`: PMML's 1-based start/length pair maps to
/// Lua's 1-based inclusive `string.sub(s, start, start + length - 1)`.
fn emit_substring(ctx: &mut EmitContext, node: &AstNode, out: &mut Layout) {
    let kids = node.children();
    out.keyword("string.sub").open_paren();
    emit(ctx, &kids[0], Dim::Nil, out);
    out.comma();
    emit(ctx, &kids[1], Dim::Nil, out);
    out.comma();
    {
        let scope = ScopedOperator::new(out, Precedence::Plus);
        let layout = &mut *scope.layout;
        emit(ctx, &kids[1], Dim::Nil, layout);
        layout.keyword("+");
        emit(ctx, &kids[2], Dim::Nil, layout);
        layout.keyword("-").literal("1", FieldType::Number);
    }
    out.close_paren();
}

/// `trimBlanks(s)`: strip leading/trailing whitespace via a capture pattern.
fn emit_trim(ctx: &mut EmitContext, node: &AstNode, out: &mut Layout) {
    out.open_paren();
    emit(ctx, &node.children()[0], Dim::Nil, out);
    out.keyword(":match").open_paren();
    out.literal("^%s*(.-)%s*$", FieldType::String);
    out.close_paren();
    out.close_paren();
}

fn emit_unary(ctx: &mut EmitContext, node: &AstNode, op: &str, out: &mut Layout) {
    let scope = ScopedOperator::new(out, Precedence::Unary);
    let layout = &mut *scope.layout;
    layout.keyword(op);
    emit(ctx, &node.children()[0], Dim::Nil, layout);
}

fn emit_not(ctx: &mut EmitContext, node: &AstNode, dim: Dim, out: &mut Layout) {
    let child = &node.children()[0];
    let flipped = match dim {
        Dim::True => Dim::False,
        Dim::False => Dim::True,
        Dim::Nil => Dim::Nil,
    };
    let scope = ScopedOperator::new(out, Precedence::Unary);
    let layout = &mut *scope.layout;
    layout.keyword("not");
    emit(ctx, child, flipped, layout);
}

/// `and(x1..xn)` (spec.md §4.5.1): partitions children into
/// not-maybe-missing and maybe-missing. The not-maybe-missing group joins
/// with a plain `and` (valid since three-valued `and` is commutative when
/// no operand is missing). For DIM=NIL, the maybe-missing tail emits with
/// DIM=TRUE except the last (DIM=NIL), each non-last one followed by
/// `and outputMissing(xi, true)` to restore a truly-missing state to nil.
fn emit_and(ctx: &mut EmitContext, node: &AstNode, dim: Dim, out: &mut Layout) {
    let kids = node.children();
    let (certain, maybe): (Vec<&AstNode>, Vec<&AstNode>) =
        kids.iter().partition(|c| !might_be_missing(ctx.analyser, c));

    let scope = ScopedOperator::new(out, Precedence::And);
    let layout = &mut *scope.layout;
    let mut wrote_any = false;

    for child in &certain {
        if wrote_any {
            layout.keyword("and");
        }
        emit(ctx, child, Dim::True, layout);
        wrote_any = true;
    }

    match dim {
        Dim::False | Dim::True => {
            for child in &maybe {
                if wrote_any {
                    layout.keyword("and");
                }
                emit(ctx, child, dim, layout);
                wrote_any = true;
            }
        }
        Dim::Nil => {
            let n = maybe.len();
            for (i, child) in maybe.iter().enumerate() {
                if wrote_any {
                    layout.keyword("and");
                }
                let child_dim = if i + 1 == n { Dim::Nil } else { Dim::True };
                emit(ctx, child, child_dim, layout);
                wrote_any = true;
                if i + 1 != n {
                    layout.keyword("and");
                    emit_missing(ctx, child, true, layout);
                }
            }
        }
    }

    if !wrote_any {
        layout.keyword("true");
    }
}

/// `or(x1..xn)` (spec.md §4.5.1): dual of `and`. With DIM=NIL and ≥2
/// deferred children, appends
/// `or (missing(d1) and ... and missing(dk) and false)` so the result is
/// nil, not false, when every deferred child was missing.
fn emit_or(ctx: &mut EmitContext, node: &AstNode, dim: Dim, out: &mut Layout) {
    let kids = node.children();
    let (certain, maybe): (Vec<&AstNode>, Vec<&AstNode>) =
        kids.iter().partition(|c| !might_be_missing(ctx.analyser, c));

    let scope = ScopedOperator::new(out, Precedence::Or);
    let layout = &mut *scope.layout;
    let mut wrote_any = false;

    for child in &certain {
        if wrote_any {
            layout.keyword("or");
        }
        emit(ctx, child, Dim::False, layout);
        wrote_any = true;
    }

    for child in &maybe {
        if wrote_any {
            layout.keyword("or");
        }
        emit(ctx, child, dim, layout);
        wrote_any = true;
    }

    if dim == Dim::Nil && maybe.len() >= 2 {
        layout.keyword("or");
        layout.open_paren();
        for (i, child) in maybe.iter().enumerate() {
            if i > 0 {
                layout.keyword("and");
            }
            emit_missing(ctx, child, false, layout);
        }
        layout.keyword("and").keyword("false");
        layout.close_paren();
    }

    if !wrote_any {
        layout.keyword("false");
    }
}

fn emit_xor(ctx: &mut EmitContext, node: &AstNode, out: &mut Layout) {
    let scope = ScopedOperator::new(out, Precedence::Equal);
    let layout = &mut *scope.layout;
    for (i, child) in node.children().iter().enumerate() {
        if i > 0 {
            layout.keyword("~=");
        }
        emit(ctx, child, Dim::Nil, layout);
    }
}

/// `ternary(p, a, b)` (spec.md §4.5.1). If `p` might be missing, wrap with
/// `not-missing(p) and (inner)` and recurse with `p` assumed not-missing.
/// Then pick the cheapest form: Traditional `p and a or b`, Backwards
/// `not p and b or a`, or the general function-form fallback.
fn emit_ternary(ctx: &mut EmitContext, node: &AstNode, dim: Dim, out: &mut Layout) {
    let predicate = &node.children()[0];

    if might_be_missing(ctx.analyser, predicate) {
        let scope = ScopedOperator::new(out, Precedence::And);
        let layout = &mut *scope.layout;
        emit_missing(ctx, predicate, true, layout);
        layout.keyword("and");
        let asserted_field = predicate.field();
        if let Some(field) = asserted_field {
            ctx.analyser.assert_field_not_missing(field);
        }
        emit_ternary_internal(ctx, node, dim, layout);
        if let Some(field) = asserted_field {
            ctx.analyser.retract_field_not_missing(field);
        }
        return;
    }
    emit_ternary_internal(ctx, node, dim, out);
}

fn emit_ternary_internal(ctx: &mut EmitContext, node: &AstNode, dim: Dim, out: &mut Layout) {
    let kids = node.children();
    let predicate = &kids[0];
    let true_branch = &kids[1];
    let false_branch = kids.get(2);

    let traditional_ok = true_branch.effective_type() != FieldType::Bool
        && !might_be_missing(ctx.analyser, true_branch);

    if traditional_ok {
        let scope = ScopedOperator::new(out, Precedence::Or);
        let layout = &mut *scope.layout;
        emit(ctx, predicate, Dim::False, layout);
        layout.keyword("and");
        emit(ctx, true_branch, Dim::Nil, layout);
        layout.keyword("or");
        match false_branch {
            Some(fb) => emit(ctx, fb, dim, layout),
            None => {
                layout.keyword("nil");
            }
        }
        return;
    }

    let backwards_const = false_branch.filter(|fb| fb.def().kind == FunctionKind::Constant);
    if let Some(constant) = backwards_const {
        let scope = ScopedOperator::new(out, Precedence::Or);
        let layout = &mut *scope.layout;
        layout.keyword("not");
        emit(ctx, predicate, Dim::True, layout);
        layout.keyword("and");
        emit(ctx, constant, Dim::Nil, layout);
        layout.keyword("or");
        emit(ctx, true_branch, dim, layout);
        return;
    }

    // Function-form fallback: always correct, never relies on the branches'
    // truthiness.
    out.start_function(None);
    out.finished_arguments();
    out.start_if();
    emit(ctx, predicate, Dim::False, out);
    out.end_predicate();
    out.keyword("return");
    emit(ctx, true_branch, dim, out);
    out.endline();
    if let Some(fb) = false_branch {
        out.start_else();
        out.keyword("return");
        emit(ctx, fb, dim, out);
        out.endline();
    }
    out.end_block(false);
    out.endline();
    out.keyword("end)()");
}

/// `bound(p, x)`: `(p and x)` scaled by DIM (spec.md §4.5.1).
fn emit_bound(ctx: &mut EmitContext, node: &AstNode, dim: Dim, out: &mut Layout) {
    let kids = node.children();
    let predicate = &kids[0];
    let inner = &kids[1];
    match dim {
        Dim::True => {
            let scope = ScopedOperator::new(out, Precedence::Or);
            let layout = &mut *scope.layout;
            layout.keyword("not");
            emit(ctx, predicate, Dim::True, layout);
            layout.keyword("or");
            emit(ctx, inner, dim, layout);
        }
        Dim::Nil => {
            let scope = ScopedOperator::new(out, Precedence::And);
            let layout = &mut *scope.layout;
            {
                let inner_scope = ScopedOperator::new(layout, Precedence::Or);
                let inner_layout = &mut *inner_scope.layout;
                emit(ctx, predicate, Dim::False, inner_layout);
                inner_layout.keyword("or").keyword("nil");
            }
            layout.keyword("and");
            emit(ctx, inner, dim, layout);
        }
        Dim::False => {
            let scope = ScopedOperator::new(out, Precedence::And);
            let layout = &mut *scope.layout;
            emit(ctx, predicate, Dim::False, layout);
            layout.keyword("and");
            emit(ctx, inner, dim, layout);
        }
    }
}

/// `default-macro(r, x)` (spec.md §4.5.1).
fn emit_default(ctx: &mut EmitContext, node: &AstNode, out: &mut Layout) {
    let child = &node.children()[0];
    let replacement = node.content();
    let result_type = node.effective_type();
    if result_type == FieldType::Bool && replacement.eq_ignore_ascii_case("true") {
        emit(ctx, child, Dim::True, out);
    } else {
        let scope = ScopedOperator::new(out, Precedence::Or);
        let layout = &mut *scope.layout;
        emit(ctx, child, Dim::False, layout);
        layout.null_replacement(replacement, result_type);
    }
}

/// `surrogate(x1..xn)` (spec.md §4.5.1).
fn emit_surrogate(ctx: &mut EmitContext, node: &AstNode, out: &mut Layout) {
    let kids = node.children();
    let is_bool = node.effective_type() == FieldType::Bool;
    let any_maybe_missing = kids.iter().any(|c| might_be_missing(ctx.analyser, c));

    if is_bool && any_maybe_missing {
        out.start_function(None);
        out.finished_arguments();
        for (i, child) in kids.iter().enumerate() {
            if i == 0 {
                out.start_if();
            } else {
                out.start_else_if();
            }
            out.keyword("not");
            emit_missing(ctx, child, false, out);
            out.end_predicate();
            out.keyword("return");
            emit(ctx, child, Dim::Nil, out);
            out.endline();
        }
        out.end_block(false);
        out.endline();
        out.keyword("end)()");
    } else {
        let scope = ScopedOperator::new(out, Precedence::Or);
        let layout = &mut *scope.layout;
        for (i, child) in kids.iter().enumerate() {
            if i > 0 {
                layout.keyword("or");
            }
            emit(ctx, child, Dim::Nil, layout);
        }
    }
}

fn emit_is_in(ctx: &mut EmitContext, node: &AstNode, out: &mut Layout) {
    let kids = node.children();
    let invert = node.def().kind == FunctionKind::IsNotIn;
    let probe = &kids[0];
    let set = &kids[1..];
    let precedence = if invert { Precedence::And } else { Precedence::Or };
    let scope = ScopedOperator::new(out, precedence);
    let layout = &mut *scope.layout;
    for (i, item) in set.iter().enumerate() {
        if i > 0 {
            layout.keyword(if invert { "and" } else { "or" });
        }
        emit(ctx, probe, Dim::Nil, layout);
        layout.keyword(if invert { "~=" } else { "==" });
        emit(ctx, item, Dim::Nil, layout);
    }
}

fn emit_block(ctx: &mut EmitContext, node: &AstNode, out: &mut Layout) {
    for child in node.children() {
        emit(ctx, child, Dim::Nil, out);
        out.endline();
    }
}

/// `if-chain` (spec.md §4.3.1): `[b1, c1, b2, c2, ..., bm, cm, (bm+1)?]`.
fn emit_if_chain(ctx: &mut EmitContext, node: &AstNode, out: &mut Layout) {
    let kids = node.children();
    let mut i = 0;
    let mut first = true;
    while i + 1 < kids.len() {
        let body = &kids[i];
        let predicate = &kids[i + 1];
        if first {
            out.start_if();
        } else {
            out.start_else_if();
        }
        emit(ctx, predicate, Dim::False, out);
        out.end_predicate();
        emit(ctx, body, Dim::Nil, out);
        first = false;
        i += 2;
    }
    if i < kids.len() {
        out.start_else();
        emit(ctx, &kids[i], Dim::Nil, out);
    }
    out.end_block(true);
}

fn emit_declaration(ctx: &mut EmitContext, node: &AstNode, out: &mut Layout) {
    let field_id = node.field().expect("declaration node must carry a FieldId");
    let desc = ctx.field(field_id);
    let alias = ctx.alias(field_id);
    let has_value = !node.children().is_empty();
    out.declare(desc, alias, has_value);
    if has_value {
        emit(ctx, &node.children()[0], Dim::Nil, out);
    }
}

fn emit_assignment(ctx: &mut EmitContext, node: &AstNode, out: &mut Layout) {
    let field_id = node.field().expect("assignment node must carry a FieldId");
    let desc = ctx.field(field_id);
    let alias = ctx.alias(field_id);
    out.assign(desc, alias);
    emit(ctx, &node.children()[0], Dim::Nil, out);
}

fn emit_assign_indirect(ctx: &mut EmitContext, node: &AstNode, out: &mut Layout) {
    let field_id = node.field().expect("assign-indirect node must carry a FieldId");
    let desc = ctx.field(field_id);
    let alias = ctx.alias(field_id);
    let children = node.children();
    let (indices, value) = children.split_at(children.len() - 1);
    out.field(desc, alias);
    for index in indices {
        out.open_bracket();
        emit(ctx, index, Dim::Nil, out);
        out.close_bracket();
    }
    out.keyword("=");
    emit(ctx, &value[0], Dim::Nil, out);
}

/// Lambda bodies come in two shapes: a single expression, implicitly
/// returned, or a `Block` whose last statement is a bare expression that
/// becomes the `return` (multi-statement helper bodies built with
/// `block(n)` then `lambda(a)` - the prologue's `stdNormalCDF`/
/// `stdNormalIDF`/`erf` helpers all take this second shape).
fn emit_lambda(ctx: &mut EmitContext, node: &AstNode, out: &mut Layout) {
    let kids = node.children();
    let (params, body) = kids.split_at(kids.len() - 1);
    out.start_function(None);
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            out.comma();
        }
        if let Some(field) = param.field() {
            out.field(ctx.field(field), ctx.alias(field));
        }
    }
    out.finished_arguments();
    if let Some(body) = body.first() {
        if body.def().kind == FunctionKind::Block {
            let statements = body.children();
            for (i, statement) in statements.iter().enumerate() {
                if i + 1 == statements.len() {
                    out.keyword("return");
                }
                emit(ctx, statement, Dim::Nil, out);
                out.endline();
            }
        } else {
            out.keyword("return");
            emit(ctx, body, Dim::Nil, out);
            out.endline();
        }
    }
    out.end_block(false);
}

/// `run-lambda` calls the *last* child (the callee - a literal `Lambda` or
/// a field-ref to a variable holding one) with the preceding children as
/// arguments (`original_source/luaconverter/luaconverter.cpp`'s
/// `process(Function::RunLambda, ...)`). The Driver's prologue (spec.md
/// §4.7 step 5) is what appends that trailing callee child at every
/// rewritten call site; `node.def().lua_function`, if present, is only a
/// lookup key used to find which helper a call site needs, never emitted.
fn emit_run_lambda(ctx: &mut EmitContext, node: &AstNode, out: &mut Layout) {
    let kids = node.children();
    let (args, callee) = kids.split_at(kids.len() - 1);
    let callee = callee.first().expect("run-lambda node must carry a callee as its last child");

    {
        let scope = ScopedOperator::new(out, Precedence::Parenthesis);
        emit(ctx, callee, Dim::Nil, scope.layout);
    }
    out.open_paren();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.comma();
        }
        emit(ctx, arg, Dim::Nil, out);
    }
    out.close_paren();
}

fn emit_return(ctx: &mut EmitContext, node: &AstNode, out: &mut Layout) {
    out.keyword("return");
    if let Some(value) = node.children().first() {
        emit(ctx, value, Dim::Nil, out);
    }
}

fn emit_tuple(ctx: &mut EmitContext, node: &AstNode, out: &mut Layout) {
    out.keyword("{");
    for (i, child) in node.children().iter().enumerate() {
        if i > 0 {
            out.comma();
        }
        emit(ctx, child, Dim::Nil, out);
    }
    out.keyword("}");
}

/// `emitMissing(ctx, node, invert, out)` (spec.md §4.5.1): outputs an
/// expression truthy-iff-missing (or inverted). Rules mirror the
/// `might-be-missing` query rules, with a brute-force `(compute == nil)`
/// fallback for `maybe-missing` nodes.
pub fn emit_missing(ctx: &mut EmitContext, node: &AstNode, invert: bool, out: &mut Layout) {
    use pmml_core::catalog::MissingRule;

    if !might_be_missing(ctx.analyser, node) {
        out.keyword(if invert { "true" } else { "false" });
        return;
    }

    match node.def().kind {
        FunctionKind::FieldRef => {
            let field_id = node.field().expect("field-ref node must carry a FieldId");
            let desc = ctx.field(field_id);
            let alias = ctx.alias(field_id);
            if invert {
                out.null_check(desc, alias);
            } else {
                let scope = ScopedOperator::new(out, Precedence::Equal);
                let layout = &mut *scope.layout;
                layout.field(desc, alias).keyword("==").keyword("nil");
            }
        }
        FunctionKind::BooleanAnd => {
            let scope = ScopedOperator::new(out, Precedence::And);
            let layout = &mut *scope.layout;
            layout.keyword("not").open_paren();
            for (i, child) in node.children().iter().enumerate() {
                if i > 0 {
                    layout.keyword("and");
                }
                emit(ctx, child, Dim::True, layout);
            }
            layout.close_paren();
            layout.keyword("and");
            for (i, child) in node.children().iter().enumerate() {
                if i > 0 {
                    layout.keyword(if invert { "and" } else { "or" });
                }
                emit_missing(ctx, child, invert, layout);
            }
        }
        FunctionKind::BooleanOr => {
            let scope = ScopedOperator::new(out, Precedence::And);
            let layout = &mut *scope.layout;
            layout.keyword("not").open_paren();
            for (i, child) in node.children().iter().enumerate() {
                if i > 0 {
                    layout.keyword("or");
                }
                emit(ctx, child, Dim::False, layout);
            }
            layout.close_paren();
            layout.keyword("and");
            for (i, child) in node.children().iter().enumerate() {
                if i > 0 {
                    layout.keyword(if invert { "and" } else { "or" });
                }
                emit_missing(ctx, child, invert, layout);
            }
        }
        _ if node.def().missing_rule == MissingRule::MaybeMissing
            || node.def().missing_rule == MissingRule::MaybeMissingIfAnyArgMissing =>
        {
            let scope = ScopedOperator::new(out, Precedence::Equal);
            let layout = &mut *scope.layout;
            emit(ctx, node, Dim::Nil, layout);
            layout.keyword(if invert { "==" } else { "~=" }).keyword("nil");
        }
        _ => {
            let scope = ScopedOperator::new(out, Precedence::Or);
            let layout = &mut *scope.layout;
            let mut wrote = false;
            for child in node.children() {
                if might_be_missing(ctx.analyser, child) {
                    if wrote {
                        layout.keyword("or");
                    }
                    emit_missing(ctx, child, invert, layout);
                    wrote = true;
                }
            }
            if !wrote {
                layout.keyword(if invert { "true" } else { "false" });
            }
        }
    }
}
