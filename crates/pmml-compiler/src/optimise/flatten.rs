//! Flatten pass (spec.md §4.6 pass 1): splices a nested `Block`'s children
//! directly into its parent `Block`, so later passes see the largest
//! possible straight-line statement list to reason about.

use pmml_core::{AstNode, FunctionKind};

/// One flattening sweep, bottom-up. Returns whether anything changed.
pub fn run(node: &mut AstNode) -> bool {
    let mut changed = false;
    flatten_node(node, &mut changed);
    changed
}

fn flatten_node(node: &mut AstNode, changed: &mut bool) {
    for child in node.children_mut() {
        flatten_node(child, changed);
    }

    if node.def().kind != FunctionKind::Block {
        return;
    }

    let kids = std::mem::take(node.children_mut());
    let mut flat = Vec::with_capacity(kids.len());
    for child in kids {
        if child.def().kind == FunctionKind::Block {
            *changed = true;
            flat.extend(child.into_children());
        } else {
            flat.push(child);
        }
    }
    *node.children_mut() = flat;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmml_core::catalog::internal;
    use pmml_core::{FieldType, NodeIdAllocator};

    #[test]
    fn nested_block_children_are_spliced_into_parent() {
        let mut ids = NodeIdAllocator::new();
        let leaf_a =
            AstNode::new(ids.alloc(), internal::CONSTANT, FieldType::Number).with_content("1");
        let leaf_b =
            AstNode::new(ids.alloc(), internal::CONSTANT, FieldType::Number).with_content("2");
        let inner = AstNode::new(ids.alloc(), internal::BLOCK, FieldType::Void)
            .with_children(vec![leaf_a, leaf_b]);
        let leaf_c =
            AstNode::new(ids.alloc(), internal::CONSTANT, FieldType::Number).with_content("3");
        let mut outer = AstNode::new(ids.alloc(), internal::BLOCK, FieldType::Void)
            .with_children(vec![inner, leaf_c]);

        let changed = run(&mut outer);
        assert!(changed);
        assert_eq!(outer.children().len(), 3);
        assert!(outer
            .children()
            .iter()
            .all(|c| c.def().kind == FunctionKind::Constant));
    }

    #[test]
    fn already_flat_block_is_unchanged() {
        let mut ids = NodeIdAllocator::new();
        let leaf =
            AstNode::new(ids.alloc(), internal::CONSTANT, FieldType::Number).with_content("1");
        let mut block =
            AstNode::new(ids.alloc(), internal::BLOCK, FieldType::Void).with_children(vec![leaf]);

        assert!(!run(&mut block));
    }
}
