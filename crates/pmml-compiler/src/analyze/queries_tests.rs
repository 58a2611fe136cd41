use pmml_core::catalog::{find_builtin_function, internal};
use pmml_core::{AstNode, FieldOrigin, FieldType, NodeIdAllocator, OpType};

use crate::context::ConversionContext;

use super::context::AnalyserContext;
use super::queries::{check_if_trivial, might_be_missing, Trivial};

fn field_ref(ids: &mut NodeIdAllocator, ctx: &mut ConversionContext) -> AstNode {
    let field = ctx.add_unscoped_field("x", FieldType::Number, OpType::Continuous, FieldOrigin::DataDictionary);
    AstNode::new(ids.alloc(), internal::FIELD_REF, FieldType::Number).with_field(field)
}

fn bool_constant(ids: &mut NodeIdAllocator, value: bool) -> AstNode {
    AstNode::new(ids.alloc(), internal::CONSTANT, FieldType::Bool)
        .with_content(if value { "true" } else { "false" })
}

#[test]
fn unasserted_field_ref_might_be_missing() {
    let mut ctx = ConversionContext::new();
    let mut ids = NodeIdAllocator::new();
    let node = field_ref(&mut ids, &mut ctx);
    let mut analyser = AnalyserContext::new();
    assert!(might_be_missing(&mut analyser, &node));
}

#[test]
fn asserted_field_ref_is_not_missing() {
    let mut ctx = ConversionContext::new();
    let mut ids = NodeIdAllocator::new();
    let node = field_ref(&mut ids, &mut ctx);
    let mut analyser = AnalyserContext::new();
    analyser.assert_field_not_missing(node.field().unwrap());
    assert!(!might_be_missing(&mut analyser, &node));
}

#[test]
fn bool_constant_is_trivially_known() {
    let mut ids = NodeIdAllocator::new();
    let mut analyser = AnalyserContext::new();
    let t = bool_constant(&mut ids, true);
    let f = bool_constant(&mut ids, false);
    assert_eq!(check_if_trivial(&mut analyser, &t), Trivial::AlwaysTrue);
    assert_eq!(check_if_trivial(&mut analyser, &f), Trivial::AlwaysFalse);
}

#[test]
fn and_with_any_false_constant_is_always_false() {
    let mut ids = NodeIdAllocator::new();
    let mut analyser = AnalyserContext::new();
    let entry = find_builtin_function("and").unwrap();
    let node = AstNode::new(ids.alloc(), entry.def, FieldType::Bool).with_children(vec![
        bool_constant(&mut ids, true),
        bool_constant(&mut ids, false),
    ]);
    assert_eq!(check_if_trivial(&mut analyser, &node), Trivial::AlwaysFalse);
}

#[test]
fn or_with_any_true_constant_is_always_true() {
    let mut ids = NodeIdAllocator::new();
    let mut analyser = AnalyserContext::new();
    let entry = find_builtin_function("or").unwrap();
    let node = AstNode::new(ids.alloc(), entry.def, FieldType::Bool).with_children(vec![
        bool_constant(&mut ids, false),
        bool_constant(&mut ids, true),
    ]);
    assert_eq!(check_if_trivial(&mut analyser, &node), Trivial::AlwaysTrue);
}

#[test]
fn is_missing_on_asserted_field_is_always_false() {
    let mut ctx = ConversionContext::new();
    let mut ids = NodeIdAllocator::new();
    let inner = field_ref(&mut ids, &mut ctx);
    let field = inner.field().unwrap();
    let entry = find_builtin_function("isMissing").unwrap();
    let node = AstNode::new(ids.alloc(), entry.def, FieldType::Bool).with_children(vec![inner]);
    let mut analyser = AnalyserContext::new();
    analyser.assert_field_not_missing(field);
    assert_eq!(check_if_trivial(&mut analyser, &node), Trivial::AlwaysFalse);
}
