//! `AstBuilder` (spec.md §4.3): a Reverse-Polish interface over a node
//! stack. Every call pushes exactly one new node; most calls pop a
//! documented number of operands first.

use pmml_core::{
    catalog::internal, AstNode, FieldId, FieldType, FunctionDefinition, NodeId, NodeIdAllocator,
};

use crate::context::{ConversionContext, MiningField, OutlierTreatment};
use crate::error::CompileError;

/// Reverse-Polish AST construction stack. Ported 1:1 from
/// `original_source/common/ast.cpp`'s `AstBuilder`; `coerce_to_same_type`
/// and `coerce_to_specific_types` return `Result` instead of aborting on a
/// disallowed coercion (spec.md §4.3, supplemented detail).
pub struct AstBuilder {
    stack: Vec<AstNode>,
    ids: NodeIdAllocator,
}

impl Default for AstBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AstBuilder {
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            ids: NodeIdAllocator::new(),
        }
    }

    pub fn stack_size(&self) -> usize {
        self.stack.len()
    }

    fn next_id(&mut self) -> NodeId {
        self.ids.alloc()
    }

    fn pop(&mut self) -> AstNode {
        self.stack.pop().expect("AstBuilder stack underflow")
    }

    fn pop_n(&mut self, n: usize) -> Vec<AstNode> {
        let at = self.stack.len() - n;
        self.stack.split_off(at)
    }

    /// Push a node directly onto the stack, bypassing RPN construction
    /// (used by the driver when splicing in a pre-built subtree).
    pub fn push_node(&mut self, node: AstNode) {
        self.stack.push(node);
    }

    pub fn top_node(&self) -> &AstNode {
        self.stack.last().expect("AstBuilder stack is empty")
    }

    pub fn pop_node(&mut self) -> AstNode {
        self.pop()
    }

    pub fn swap_nodes(&mut self, i: usize, j: usize) {
        self.stack.swap(i, j);
    }

    /// A plain field reference (spec.md §4.3 `field(desc)`).
    pub fn field(&mut self, field: FieldId, field_type: FieldType) -> NodeId {
        let id = self.next_id();
        let node = AstNode::new(id, internal::FIELD_REF, field_type).with_field(field);
        self.stack.push(node);
        id
    }

    /// `v[i1][i2]...` with `n` index expressions already on the stack
    /// (`original_source/common/ast.cpp`'s `fieldIndirect`).
    pub fn field_indirect(&mut self, field: FieldId, n: usize, field_type: FieldType) -> NodeId {
        let children = self.pop_n(n);
        let id = self.next_id();
        let node = AstNode::new(id, internal::FIELD_REF, field_type)
            .with_field(field)
            .with_children(children);
        self.stack.push(node);
        id
    }

    /// A field reference through a mining field's outlier/replacement
    /// expansion (spec.md §4.3 "Mining-field `field(mining-field)`
    /// expansion"):
    /// - `as-extreme-values`: `max(min(field, high), low)`.
    /// - `as-missing-values`: a bound-macro whose predicate is
    ///   `field >= low and field <= high`.
    /// - a replacement value wraps the whole expression in a default-macro.
    pub fn field_from_mining(
        &mut self,
        ctx: &mut ConversionContext,
        mining: &MiningField,
        field_type: FieldType,
    ) -> Result<NodeId, CompileError> {
        self.field(mining.field, field_type);

        match mining.outlier_treatment {
            OutlierTreatment::AsIs => {}
            OutlierTreatment::AsExtremeValues => {
                if let Some(high) = mining.high_value {
                    self.constant(&format_f64(high), FieldType::Number);
                    self.function(internal_min(), 2)?;
                }
                if let Some(low) = mining.low_value {
                    self.constant(&format_f64(low), FieldType::Number);
                    self.function(internal_max(), 2)?;
                }
            }
            OutlierTreatment::AsMissingValues => {
                let inner = self.pop();
                let mut branches = Vec::new();
                if let Some(low) = mining.low_value {
                    self.field(mining.field, field_type);
                    self.constant(&format_f64(low), FieldType::Number);
                    self.function(internal_ge(), 2)?;
                    branches.push(self.pop());
                }
                if let Some(high) = mining.high_value {
                    self.field(mining.field, field_type);
                    self.constant(&format_f64(high), FieldType::Number);
                    self.function(internal_le(), 2)?;
                    branches.push(self.pop());
                }
                let predicate = if branches.is_empty() {
                    let id = self.next_id();
                    AstNode::new(id, internal::NIL, FieldType::Bool).with_content("true")
                } else {
                    let mut iter = branches.into_iter();
                    let mut acc = iter.next().unwrap();
                    for next in iter {
                        self.push_node(acc);
                        self.push_node(next);
                        self.function(internal_and(), 2)?;
                        acc = self.pop();
                    }
                    acc
                };
                self.push_node(inner);
                self.push_node(predicate);
                self.custom_node(internal::BOUND, field_type, "", 2)?;
            }
        }

        if let Some(replacement) = &mining.replacement_value {
            self.default(replacement, field_type)?;
        }

        Ok(self.top_node().id())
    }

    /// A literal value (spec.md §4.3 `constant(text, type)`).
    pub fn constant(&mut self, text: &str, field_type: FieldType) -> NodeId {
        let id = self.next_id();
        let node = AstNode::new(id, internal::CONSTANT, field_type).with_content(text);
        self.stack.push(node);
        id
    }

    /// Wrap the top node in a default-macro (spec.md §4.3 `default(replacement)`).
    pub fn default(&mut self, replacement: &str, field_type: FieldType) -> Result<NodeId, CompileError> {
        let child = self.pop();
        let id = self.next_id();
        let node = AstNode::new(id, internal::DEFAULT, field_type)
            .with_content(replacement)
            .with_children(vec![child]);
        self.stack.push(node);
        Ok(id)
    }

    /// Apply a catalog entry to the top `n` nodes (spec.md §4.3 `function(def, n)`).
    pub fn function(&mut self, def: FunctionDefinition, n: usize) -> Result<NodeId, CompileError> {
        let children = self.pop_n(n);
        let result_type = if def.result_type == FieldType::Invalid {
            unify_children(&children)?
        } else {
            def.result_type
        };
        let id = self.next_id();
        let node = AstNode::new(id, def, result_type).with_children(children);
        self.stack.push(node);
        Ok(id)
    }

    /// Emit an already-chosen internal macro node directly (spec.md §4.3
    /// `custom-node(def, type, content, n)`).
    pub fn custom_node(
        &mut self,
        def: FunctionDefinition,
        field_type: FieldType,
        content: &str,
        n: usize,
    ) -> Result<NodeId, CompileError> {
        let children = self.pop_n(n);
        let id = self.next_id();
        let node = AstNode::new(id, def, field_type)
            .with_content(content)
            .with_children(children);
        self.stack.push(node);
        Ok(id)
    }

    /// Local declaration (spec.md §4.3 `declare(desc, has-init)`).
    pub fn declare(&mut self, field: FieldId, has_init: bool, field_type: FieldType) -> NodeId {
        let children = if has_init { vec![self.pop()] } else { Vec::new() };
        let id = self.next_id();
        let node = AstNode::new(id, internal::DECLARATION, field_type)
            .with_field(field)
            .with_children(children);
        self.stack.push(node);
        id
    }

    /// Assignment (spec.md §4.3 `assign(desc)`).
    pub fn assign(&mut self, field: FieldId, field_type: FieldType) -> NodeId {
        let value = self.pop();
        let id = self.next_id();
        let node = AstNode::new(id, internal::ASSIGNMENT, field_type)
            .with_field(field)
            .with_children(vec![value]);
        self.stack.push(node);
        id
    }

    /// `t[i1][i2]... = v` (spec.md §4.3 `assign-indirect(desc, k)`).
    pub fn assign_indirect(&mut self, field: FieldId, k: usize, field_type: FieldType) -> NodeId {
        let mut children = self.pop_n(k + 1);
        let value = children.remove(0);
        children.push(value);
        let id = self.next_id();
        let node = AstNode::new(id, internal::ASSIGN_INDIRECT, field_type)
            .with_field(field)
            .with_children(children);
        self.stack.push(node);
        id
    }

    /// A sequence of statements (spec.md §4.3 `block(n)`).
    pub fn block(&mut self, n: usize) -> NodeId {
        let children = self.pop_n(n);
        let id = self.next_id();
        let node = AstNode::new(id, internal::BLOCK, FieldType::Void).with_children(children);
        self.stack.push(node);
        id
    }

    /// An if/elseif/else chain (spec.md §4.3.1): k = 2m or 2m+1 children
    /// encoded as `[b1, c1, b2, c2, ..., bm, cm, (bm+1)?]` — the body
    /// precedes its condition; a trailing lone child is the else-body.
    pub fn if_chain(&mut self, n: usize, field_type: FieldType) -> NodeId {
        let children = self.pop_n(n);
        let id = self.next_id();
        let node = AstNode::new(id, internal::IF_CHAIN, field_type).with_children(children);
        self.stack.push(node);
        id
    }

    /// Anonymous function: `a` parameters then the body (spec.md §4.3
    /// `lambda(a)`).
    pub fn lambda(&mut self, a: usize) -> NodeId {
        let children = self.pop_n(a + 1);
        let id = self.next_id();
        let node = AstNode::new(id, internal::LAMBDA, FieldType::Lambda).with_children(children);
        self.stack.push(node);
        id
    }


    /// Sets the top `n` nodes' `coercedType` to the most permissive
    /// non-bool type, or leaves all-bool untouched (spec.md §4.3
    /// `coerce-to-same-type(n)`). Returns `mismatched-type` if the types
    /// cannot be coerced together (supplemented detail per
    /// `original_source/common/ast.cpp`: failure is reported, not a panic).
    pub fn coerce_to_same_type(&mut self, n: usize) -> Result<(), CompileError> {
        let at = self.stack.len() - n;
        let target = unify_children(&self.stack[at..])?;
        for node in &mut self.stack[at..] {
            node.set_coerced_type(target);
        }
        Ok(())
    }

    /// Per-slot coercion; must never narrow (spec.md §4.3
    /// `coerce-to-specific(n, types[])`).
    pub fn coerce_to_specific_types(&mut self, types: &[FieldType]) -> Result<(), CompileError> {
        let n = types.len();
        let at = self.stack.len() - n;
        for (node, &target) in self.stack[at..].iter_mut().zip(types) {
            if target.unify(node.effective_type()).is_none() {
                return Err(CompileError::MismatchedType {
                    expected: target,
                    found: node.effective_type(),
                    line: 0,
                });
            }
            if target < node.effective_type() {
                return Err(CompileError::MismatchedType {
                    expected: target,
                    found: node.effective_type(),
                    line: 0,
                });
            }
            node.set_coerced_type(target);
        }
        Ok(())
    }
}

fn unify_children(children: &[AstNode]) -> Result<FieldType, CompileError> {
    let mut result = FieldType::Number;
    let mut first = true;
    for child in children {
        let t = child.effective_type();
        if first {
            result = t;
            first = false;
            continue;
        }
        result = result.unify(t).ok_or(CompileError::MismatchedType {
            expected: result,
            found: t,
            line: 0,
        })?;
    }
    Ok(result)
}

fn format_f64(v: f64) -> String {
    if v.fract() == 0.0 && v.is_finite() {
        format!("{v:.0}")
    } else {
        v.to_string()
    }
}

fn internal_min() -> FunctionDefinition {
    pmml_core::catalog::find_builtin_function("min").unwrap().def
}

fn internal_max() -> FunctionDefinition {
    pmml_core::catalog::find_builtin_function("max").unwrap().def
}

fn internal_ge() -> FunctionDefinition {
    pmml_core::catalog::find_builtin_function("greaterOrEqual").unwrap().def
}

fn internal_le() -> FunctionDefinition {
    pmml_core::catalog::find_builtin_function("lessOrEqual").unwrap().def
}

fn internal_and() -> FunctionDefinition {
    pmml_core::catalog::find_builtin_function("and").unwrap().def
}

#[cfg(test)]
mod builder_tests {
    use super::*;
    use pmml_core::{FieldOrigin, OpType};

    fn new_field(ctx: &mut ConversionContext, name: &str, ty: FieldType) -> FieldId {
        ctx.add_unscoped_field(name, ty, OpType::Continuous, FieldOrigin::DataDictionary)
    }

    #[test]
    fn field_then_constant_then_comparison_builds_three_node_tree() {
        let mut ctx = ConversionContext::new();
        let f = new_field(&mut ctx, "age", FieldType::Number);
        let mut b = AstBuilder::new();
        b.field(f, FieldType::Number);
        b.constant("18", FieldType::Number);
        let entry = pmml_core::catalog::find_builtin_function("greaterThan").unwrap();
        b.function(entry.def, 2).unwrap();
        assert_eq!(b.stack_size(), 1);
        assert_eq!(b.top_node().children().len(), 2);
        assert_eq!(b.top_node().effective_type(), FieldType::Bool);
    }

    #[test]
    fn if_chain_preserves_body_before_condition_order() {
        let mut b = AstBuilder::new();
        b.constant("1", FieldType::Number);
        b.constant("true", FieldType::Bool);
        b.constant("2", FieldType::Number);
        let id = b.if_chain(3, FieldType::Number);
        assert_eq!(b.top_node().id(), id);
        let kids = b.top_node().children();
        assert_eq!(kids.len(), 3);
        assert_eq!(kids[0].content(), "1");
        assert_eq!(kids[1].content(), "true");
        assert_eq!(kids[2].content(), "2");
    }

    #[test]
    fn coerce_to_same_type_rejects_bool_and_number_mix() {
        let mut b = AstBuilder::new();
        b.constant("true", FieldType::Bool);
        b.constant("1", FieldType::Number);
        assert!(b.coerce_to_same_type(2).is_err());
    }

    #[test]
    fn coerce_to_specific_types_rejects_narrowing() {
        let mut b = AstBuilder::new();
        b.constant("1", FieldType::String);
        let err = b.coerce_to_specific_types(&[FieldType::Number]).unwrap_err();
        assert!(matches!(err, CompileError::MismatchedType { .. }));
    }

    #[test]
    fn lambda_pops_parameters_and_body() {
        let mut b = AstBuilder::new();
        b.constant("p1", FieldType::Number);
        b.constant("p2", FieldType::Number);
        b.constant("body", FieldType::Number);
        b.lambda(2);
        assert_eq!(b.stack_size(), 1);
        assert_eq!(b.top_node().children().len(), 3);
    }
}
