//! The output-state machine (spec.md §4.5.2), ground-truthed against
//! `original_source/luaconverter/luaoutputter.{hpp,cpp}`: tracks block
//! nesting, current operator precedence, and pending whitespace, writing
//! indented Lua source into a `String` buffer.

pub use pmml_core::Precedence;

use pmml_core::{FieldDescription, FieldType};

pub const OUTPUT_NAME: &str = "output";
pub const INPUT_NAME: &str = "input";
pub const OVERFLOW_NAME: &str = "overflow";
pub const LUA_INFINITY: &str = "math.huge";

/// Pending-whitespace state: whether the next token needs a fresh indented
/// line, a single separating space, or nothing at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceState {
    AfterLineEnd,
    AfterKeyword,
    AfterSpecial,
}

/// Block-nesting context, one entry per open construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxState {
    Global,
    FunctionBlock,
    IfBlock,
    WhileBlock,
    ElseBlock,
    IfPredicate,
    WhilePredicate,
    FunctionArguments,
    InsideParenthesis,
    InsideBrackets,
}

impl SyntaxState {
    fn is_block(self) -> bool {
        matches!(
            self,
            SyntaxState::Global
                | SyntaxState::FunctionBlock
                | SyntaxState::IfBlock
                | SyntaxState::WhileBlock
                | SyntaxState::ElseBlock
        )
    }
}

/// Whether string literals should be lowercased on emission, and the
/// overflow-array cap consulted by variable emission (spec.md §6).
#[derive(Debug, Clone, Copy)]
pub struct LayoutOptions {
    pub lowercase: bool,
    pub max_locals: usize,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            lowercase: false,
            max_locals: 195,
        }
    }
}

/// The target-text writer: every `emit::emitter` call drives this through
/// its output methods rather than writing to the buffer directly (spec.md
/// §4.5.2).
pub struct Layout {
    buffer: String,
    indent_level: i32,
    operator_precedence: Precedence,
    space_state: SpaceState,
    stack: Vec<SyntaxState>,
    options: LayoutOptions,
}

impl Layout {
    pub fn new(options: LayoutOptions) -> Self {
        Self {
            buffer: String::new(),
            indent_level: 0,
            operator_precedence: Precedence::Parenthesis,
            space_state: SpaceState::AfterLineEnd,
            stack: Vec::new(),
            options,
        }
    }

    pub fn into_source(self) -> String {
        self.buffer
    }

    pub fn lowercase(&self) -> bool {
        self.options.lowercase
    }

    fn context(&self) -> SyntaxState {
        self.stack.last().copied().unwrap_or(SyntaxState::Global)
    }

    fn do_indent(&mut self) {
        match self.space_state {
            SpaceState::AfterLineEnd => {
                for _ in 0..self.indent_level {
                    self.buffer.push_str("  ");
                }
            }
            SpaceState::AfterKeyword => self.buffer.push(' '),
            SpaceState::AfterSpecial => {}
        }
    }

    pub fn start_if(&mut self) -> &mut Self {
        debug_assert!(self.context().is_block());
        self.keyword("if");
        self.indent_level += 1;
        self.stack.push(SyntaxState::IfPredicate);
        self
    }

    pub fn start_else_if(&mut self) -> &mut Self {
        debug_assert_eq!(self.context(), SyntaxState::IfBlock);
        self.indent_level -= 1;
        self.keyword("elseif");
        self.indent_level += 1;
        *self.stack.last_mut().unwrap() = SyntaxState::IfPredicate;
        self
    }

    pub fn start_else(&mut self) -> &mut Self {
        debug_assert_eq!(self.context(), SyntaxState::IfBlock);
        self.indent_level -= 1;
        self.keyword("else").endline();
        self.indent_level += 1;
        *self.stack.last_mut().unwrap() = SyntaxState::ElseBlock;
        self
    }

    pub fn start_while(&mut self) -> &mut Self {
        debug_assert!(self.context().is_block());
        self.keyword("while");
        self.indent_level += 1;
        self.stack.push(SyntaxState::WhilePredicate);
        self
    }

    pub fn start_function(&mut self, name: Option<&str>) -> &mut Self {
        match name {
            Some(name) => {
                self.keyword("function").keyword(name).keyword("(");
            }
            None => {
                self.keyword("function(");
            }
        }
        self.indent_level += 1;
        self.stack.push(SyntaxState::FunctionBlock);
        self.stack.push(SyntaxState::FunctionArguments);
        self
    }

    pub fn finished_arguments(&mut self) -> &mut Self {
        debug_assert_eq!(self.context(), SyntaxState::FunctionArguments);
        self.keyword(")").endline();
        self.stack.pop();
        self
    }

    pub fn do_block(&mut self) -> &mut Self {
        self.keyword("do").endline();
        self.indent_level += 1;
        self.stack.push(SyntaxState::FunctionBlock);
        self
    }

    pub fn end_predicate(&mut self) -> &mut Self {
        match self.context() {
            SyntaxState::IfPredicate => {
                self.keyword("then").endline();
                *self.stack.last_mut().unwrap() = SyntaxState::IfBlock;
            }
            SyntaxState::WhilePredicate => {
                self.keyword("do").endline();
                *self.stack.last_mut().unwrap() = SyntaxState::WhileBlock;
            }
            _ => debug_assert!(false, "end_predicate outside a predicate context"),
        }
        self
    }

    pub fn end_block(&mut self, should_end_line: bool) -> &mut Self {
        debug_assert!(self.context().is_block());
        self.stack.pop();
        self.indent_level -= 1;
        self.keyword("end");
        if should_end_line {
            self.endline();
        }
        self
    }

    pub fn keyword(&mut self, keyword: &str) -> &mut Self {
        self.do_indent();
        self.buffer.push_str(keyword);
        self.space_state = SpaceState::AfterKeyword;
        self
    }

    pub fn endline(&mut self) -> &mut Self {
        if self.space_state != SpaceState::AfterLineEnd {
            self.buffer.push('\n');
            self.space_state = SpaceState::AfterLineEnd;
        }
        self
    }

    pub fn comma(&mut self) -> &mut Self {
        self.buffer.push(',');
        self.space_state = SpaceState::AfterKeyword;
        self
    }

    /// Emit a literal, applying the target language's string-escaping and
    /// lowercase rules (spec.md §6).
    pub fn literal(&mut self, text: &str, field_type: FieldType) -> &mut Self {
        self.do_indent();
        match field_type {
            FieldType::String => {
                let mut escaped = String::with_capacity(text.len());
                for ch in text.chars() {
                    match ch {
                        '\n' => escaped.push_str("\\n"),
                        '\t' => escaped.push_str("\\t"),
                        '\r' => escaped.push_str("\\r"),
                        '\\' => escaped.push_str("\\\\"),
                        '"' => escaped.push_str("\\\""),
                        c if !c.is_ascii_graphic() && c != ' ' => {
                            escaped.push_str(&format!("\\x{:02x}", c as u32));
                        }
                        c => escaped.push(c),
                    }
                }
                if self.options.lowercase {
                    escaped = escaped.to_lowercase();
                }
                self.buffer.push('"');
                self.buffer.push_str(&escaped);
                self.buffer.push('"');
            }
            FieldType::Bool => {
                self.buffer.push_str(&text.to_lowercase());
            }
            _ => self.buffer.push_str(text),
        }
        self.space_state = SpaceState::AfterKeyword;
        self
    }

    /// `~= false`/`== true`, or `or <literal>` (spec.md §4.5.1
    /// default-macro).
    pub fn null_replacement(&mut self, text: &str, field_type: FieldType) -> &mut Self {
        if field_type == FieldType::Bool {
            if text.eq_ignore_ascii_case("true") {
                self.keyword("~= false")
            } else {
                self.keyword("== true")
            }
        } else {
            self.keyword("or").literal(text, field_type)
        }
    }

    fn raw_field(&mut self, field: &FieldDescription, alias: Option<&FieldDescription>) -> &mut Self {
        let resolved = alias.unwrap_or(field);
        if let Some(slot) = resolved.overflow_slot() {
            self.keyword(OVERFLOW_NAME)
                .open_bracket()
                .literal(&slot.to_string(), FieldType::Number)
                .close_bracket();
            return self;
        }
        self.do_indent();
        self.buffer.push_str(resolved.emitted_name());
        self.space_state = SpaceState::AfterKeyword;
        self
    }

    /// A plain variable reference, consulting the alias table then the
    /// overflow slot (spec.md §4.5.2 "Variable emission").
    pub fn field(&mut self, field: &FieldDescription, alias: Option<&FieldDescription>) -> &mut Self {
        self.raw_field(field, alias)
    }

    /// `v ~= nil or nil` for bool fields (so the falsy `false` value isn't
    /// mistaken for nil); a plain field reference otherwise.
    pub fn null_check(&mut self, field: &FieldDescription, alias: Option<&FieldDescription>) -> &mut Self {
        if field.declared_type == FieldType::Bool {
            {
                let scope = ScopedOperator::new(&mut *self, Precedence::Or);
                scope
                    .layout
                    .raw_field(field, alias)
                    .keyword("~= nil")
                    .keyword("or nil");
            }
            self
        } else {
            self.raw_field(field, alias)
        }
    }

    pub fn declare(
        &mut self,
        field: &FieldDescription,
        alias: Option<&FieldDescription>,
        has_value: bool,
    ) -> &mut Self {
        let aliased = alias.is_some_and(|a| a.id() != field.id());
        if !aliased && field.overflow_slot().is_none() {
            self.keyword("local");
        }
        self.raw_field(field, alias);
        self.keyword("=");
        if !has_value {
            match field.declared_type {
                FieldType::Table | FieldType::StringTable => self.keyword("{}"),
                _ => self.keyword("nil"),
            };
        }
        self
    }

    pub fn assign(&mut self, field: &FieldDescription, alias: Option<&FieldDescription>) -> &mut Self {
        self.raw_field(field, alias).keyword("=")
    }

    /// `local overflow = {}` (spec.md §4.6 pass 6): the backing array
    /// `raw_field` indexes into whenever a field carries an overflow slot.
    /// Emitted once, ahead of the root block, only when the overflow pass
    /// actually moved something.
    pub fn declare_overflow_array(&mut self) -> &mut Self {
        self.keyword("local")
            .keyword(OVERFLOW_NAME)
            .keyword("=")
            .keyword("{}")
            .endline()
    }

    pub fn open_paren(&mut self) -> &mut Self {
        self.keyword("(");
        self.space_state = SpaceState::AfterSpecial;
        self.stack.push(SyntaxState::InsideParenthesis);
        self
    }

    pub fn close_paren(&mut self) -> &mut Self {
        debug_assert_eq!(self.context(), SyntaxState::InsideParenthesis);
        self.stack.pop();
        self.buffer.push(')');
        self.space_state = SpaceState::AfterKeyword;
        self
    }

    pub fn open_bracket(&mut self) -> &mut Self {
        self.keyword("[");
        self.space_state = SpaceState::AfterSpecial;
        self.stack.push(SyntaxState::InsideBrackets);
        self
    }

    pub fn close_bracket(&mut self) -> &mut Self {
        debug_assert_eq!(self.context(), SyntaxState::InsideBrackets);
        self.stack.pop();
        self.buffer.push(']');
        self.space_state = SpaceState::AfterKeyword;
        self
    }

    pub fn max_locals(&self) -> usize {
        self.options.max_locals
    }
}

/// RAII parenthesisation helper (spec.md §4.5.2): inserts parens iff the
/// new precedence exceeds the outer, or ties at a non-commutative level
/// (every level but `And`/`Or`, where grouping within the level is
/// cosmetic only). Mirrors `LuaOutputter::OperatorScopeHelper` exactly.
pub struct ScopedOperator<'a> {
    pub(crate) layout: &'a mut Layout,
    old_precedence: Precedence,
    opened_paren: bool,
}

impl<'a> ScopedOperator<'a> {
    fn needs_parenthesis(old: Precedence, new: Precedence) -> bool {
        if old < new {
            return true;
        }
        old == new && old != Precedence::And && old != Precedence::Or
    }

    pub fn new(layout: &'a mut Layout, new_precedence: Precedence) -> Self {
        let old_precedence = layout.operator_precedence;
        let opened_paren = Self::needs_parenthesis(old_precedence, new_precedence);
        if opened_paren {
            layout.open_paren();
        }
        layout.operator_precedence = new_precedence;
        Self {
            layout,
            old_precedence,
            opened_paren,
        }
    }

}

impl Drop for ScopedOperator<'_> {
    fn drop(&mut self) {
        if self.opened_paren {
            self.layout.close_paren();
        }
        self.layout.operator_precedence = self.old_precedence;
    }
}
