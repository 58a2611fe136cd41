//! Variable-info map (spec.md §4.6 pass 2): one entry per `FieldId` naming
//! when it is declared, set, and read, in terms of a monotonic statement
//! counter that only advances on procedural steps (a `Block` child, or a
//! body half of an `IfChain`). The remaining passes (`dce`, `inline`,
//! `alias`, `overflow`) all read from this map instead of re-walking the
//! tree themselves.

use indexmap::IndexMap;

use pmml_core::{AstNode, FieldId, FunctionKind};

#[derive(Debug, Clone, Default)]
pub struct VarInfo {
    pub first_declared: Option<u32>,
    pub first_set: Option<u32>,
    pub last_set: Option<u32>,
    pub set_count: u32,
    pub first_used: Option<u32>,
    pub last_used: Option<u32>,
    pub use_count: u32,
    /// Read from inside a lambda body. Such a variable's slot may be
    /// captured as a Lua upvalue, so it is never a candidate for aliasing
    /// or overflow (see the module-level simplification note in `mod.rs`).
    pub unmovable: bool,
}

pub type VarInfoMap = IndexMap<FieldId, VarInfo>;

pub fn collect(root: &AstNode) -> VarInfoMap {
    let mut info = VarInfoMap::new();
    let mut counter = 0u32;
    walk(root, &mut counter, &mut info, false);
    info
}

fn record_set(entry: &mut VarInfo, pos: u32) {
    entry.first_set.get_or_insert(pos);
    entry.last_set = Some(pos);
    entry.set_count += 1;
}

fn record_use(entry: &mut VarInfo, pos: u32, unmovable: bool) {
    entry.first_used.get_or_insert(pos);
    entry.last_used = Some(pos);
    entry.use_count += 1;
    entry.unmovable |= unmovable;
}

fn walk(node: &AstNode, counter: &mut u32, info: &mut VarInfoMap, in_lambda: bool) {
    match node.def().kind {
        FunctionKind::Block => {
            for child in node.children() {
                *counter += 1;
                walk(child, counter, info, in_lambda);
            }
        }
        FunctionKind::Declaration => {
            let pos = *counter;
            if let Some(field) = node.field() {
                let entry = info.entry(field).or_default();
                entry.first_declared.get_or_insert(pos);
                if !node.children().is_empty() {
                    record_set(entry, pos);
                }
            }
            for child in node.children() {
                walk(child, counter, info, in_lambda);
            }
        }
        FunctionKind::Assignment | FunctionKind::AssignIndirect => {
            let pos = *counter;
            if let Some(field) = node.field() {
                let entry = info.entry(field).or_default();
                if node.def().kind == FunctionKind::AssignIndirect {
                    record_use(entry, pos, in_lambda);
                }
                record_set(entry, pos);
            }
            for child in node.children() {
                walk(child, counter, info, in_lambda);
            }
        }
        FunctionKind::FieldRef => {
            let pos = *counter;
            if let Some(field) = node.field() {
                let entry = info.entry(field).or_default();
                record_use(entry, pos, in_lambda);
            }
            for child in node.children() {
                walk(child, counter, info, in_lambda);
            }
        }
        FunctionKind::Lambda => {
            for child in node.children() {
                walk(child, counter, info, true);
            }
        }
        _ => {
            for child in node.children() {
                walk(child, counter, info, in_lambda);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmml_core::catalog::internal;
    use pmml_core::{FieldArena, FieldOrigin, FieldType, NodeIdAllocator, OpType};

    fn fresh_field(arena: &mut FieldArena) -> FieldId {
        arena.declare(
            "x".into(),
            None,
            FieldType::Number,
            OpType::Continuous,
            FieldOrigin::Temporary,
        )
    }

    #[test]
    fn declaration_then_two_uses_is_recorded() {
        let mut arena = FieldArena::new();
        let field = fresh_field(&mut arena);
        let mut ids = NodeIdAllocator::new();

        let constant =
            AstNode::new(ids.alloc(), internal::CONSTANT, FieldType::Number).with_content("1");
        let decl = AstNode::new(ids.alloc(), internal::DECLARATION, FieldType::Number)
            .with_children(vec![constant])
            .with_field(field);
        let use_a = AstNode::new(ids.alloc(), internal::FIELD_REF, FieldType::Number)
            .with_field(field);
        let use_b = AstNode::new(ids.alloc(), internal::FIELD_REF, FieldType::Number)
            .with_field(field);
        let block = AstNode::new(ids.alloc(), internal::BLOCK, FieldType::Void)
            .with_children(vec![decl, use_a, use_b]);

        let info = collect(&block);
        let entry = info.get(&field).expect("field tracked");
        assert_eq!(entry.set_count, 1);
        assert_eq!(entry.use_count, 2);
        assert!(entry.first_declared.is_some());
        assert!(!entry.unmovable);
    }

    #[test]
    fn use_inside_lambda_is_marked_unmovable() {
        let mut arena = FieldArena::new();
        let field = fresh_field(&mut arena);
        let mut ids = NodeIdAllocator::new();

        let use_in_lambda = AstNode::new(ids.alloc(), internal::FIELD_REF, FieldType::Number)
            .with_field(field);
        let lambda = AstNode::new(ids.alloc(), internal::LAMBDA, FieldType::Lambda)
            .with_children(vec![use_in_lambda]);
        let decl = AstNode::new(ids.alloc(), internal::DECLARATION, FieldType::Number)
            .with_children(vec![AstNode::new(
                ids.alloc(),
                internal::CONSTANT,
                FieldType::Number,
            )
            .with_content("1")])
            .with_field(field);
        let block = AstNode::new(ids.alloc(), internal::BLOCK, FieldType::Void)
            .with_children(vec![decl, lambda]);

        let info = collect(&block);
        assert!(info.get(&field).unwrap().unmovable);
    }
}
