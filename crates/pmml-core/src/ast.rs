//! `AstNode`: the language-agnostic tree every compiler phase operates on
//! (spec.md §3).

use crate::catalog::FunctionDefinition;
use crate::field::FieldId;
use crate::types::FieldType;

/// Monotonic node id, assigned at construction. The optimiser relies on ids
/// increasing in construction order to remove-by-id within a block without
/// disturbing surviving siblings (spec.md §5 "Ordering guarantees").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// Every expression and statement in the tree (spec.md §3).
///
/// A node's children are owned outright (the tree is a tree, not a DAG).
/// `coerced_type == declared_type` unless an explicit coercion step widened
/// it; coercion never narrows.
#[derive(Debug, Clone)]
pub struct AstNode {
    id: NodeId,
    def: FunctionDefinition,
    children: Vec<AstNode>,
    /// Constant value, default replacement, or custom-node content. Empty
    /// for plain operator/function applications.
    content: String,
    declared_type: FieldType,
    coerced_type: FieldType,
    field: Option<FieldId>,
}

impl AstNode {
    pub fn new(id: NodeId, def: FunctionDefinition, declared_type: FieldType) -> Self {
        Self {
            id,
            def,
            children: Vec::new(),
            content: String::new(),
            declared_type,
            coerced_type: declared_type,
            field: None,
        }
    }

    pub fn with_children(mut self, children: Vec<AstNode>) -> Self {
        self.children = children;
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_field(mut self, field: FieldId) -> Self {
        self.field = Some(field);
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn def(&self) -> &FunctionDefinition {
        &self.def
    }

    pub fn set_def(&mut self, def: FunctionDefinition) {
        self.def = def;
    }

    pub fn children(&self) -> &[AstNode] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<AstNode> {
        &mut self.children
    }

    pub fn into_children(self) -> Vec<AstNode> {
        self.children
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    pub fn declared_type(&self) -> FieldType {
        self.declared_type
    }

    pub fn coerced_type(&self) -> FieldType {
        self.coerced_type
    }

    /// The effective type callers should reason about: the declared result
    /// type of the catalog entry unless it is `Invalid` ("unify from
    /// args"), in which case the node's own coerced type is authoritative.
    pub fn effective_type(&self) -> FieldType {
        if self.def.result_type == FieldType::Invalid {
            self.coerced_type
        } else {
            self.def.result_type
        }
    }

    pub fn set_coerced_type(&mut self, t: FieldType) {
        self.coerced_type = t;
    }

    pub fn field(&self) -> Option<FieldId> {
        self.field
    }
}

/// Allocates monotonically increasing `NodeId`s for one compilation. Moved
/// out of a process-global static into the builder per Design Notes §9.
#[derive(Debug, Default)]
pub struct NodeIdAllocator {
    next: u32,
}

impl NodeIdAllocator {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    pub fn alloc(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}
