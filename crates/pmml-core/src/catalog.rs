//! `FunctionCatalog` (spec.md §4.1): a static table of built-in operators
//! and their semantic attributes, plus the closed `FunctionKind` enum that
//! every compiler phase dispatches on (Design Notes §9 "Kind dispatch" —
//! `match` replaces the original's templated tag-dispatch).

use crate::types::FieldType;

/// Operator-precedence levels, matching `LuaOutputter`'s constants exactly
/// (`original_source/luaconverter/luaoutputter.hpp`) since the emitted
/// text's correctness depends on these exact relative orderings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Precedence {
    Top = 0,
    Power = 1,
    Unary = 2,
    Times = 3,
    Plus = 4,
    Concat = 5,
    Equal = 6,
    And = 7,
    Or = 8,
    Parenthesis = 9,
}

/// How the analyser should reason about a node's result (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MissingRule {
    NeverMissing,
    MissingIfAnyArgMissing,
    MaybeMissingIfAnyArgMissing,
    MaybeMissing,
}

/// The closed set of operator kinds every AST node carries (spec.md §3,
/// `FunctionDefinition`'s operator kind). Includes the handful of
/// internal-only macro kinds used by the Driver's prologue and the
/// AstBuilder's synthesised nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    Operator,
    UnaryMinus,
    Not,
    Comparison,
    FunctionLike,
    BooleanAnd,
    BooleanOr,
    BooleanXor,
    IfChain,
    Ternary,
    Bound,
    Default,
    Surrogate,
    Substring,
    Trim,
    Mean,
    Round,
    Log10,
    Threshold,
    IsIn,
    IsNotIn,
    IsMissing,
    IsNotMissing,
    Constant,
    FieldRef,
    Block,
    Declaration,
    Assignment,
    AssignIndirect,
    MakeTuple,
    Lambda,
    RunLambda,
    Return,
    Unsupported,
    /// Internal-only: used for `Function::prologue`'s generated helpers'
    /// bodies (`sgn`-style sign flip already covered by `UnaryMinus`/`Not`;
    /// this covers the `sortTableDef`/`insertToTableDef`/`listLengthDef`
    /// trio used by MiningModel's `median` multiple-model method).
    SortTable,
    InsertToTable,
    ListLength,
}

/// A single catalog row: the semantic attributes of one operator/function,
/// independent of the PMML name it may be looked up by (spec.md §4.1).
#[derive(Debug, Clone, Copy)]
pub struct FunctionDefinition {
    /// The target-language operator or function name. `None` for pure
    /// macro kinds with no single operator text (e.g. `IfChain`, `Ternary`).
    pub lua_function: Option<&'static str>,
    pub kind: FunctionKind,
    /// `Invalid` means "unify from args" (inherit from children).
    pub result_type: FieldType,
    pub precedence: Precedence,
    pub missing_rule: MissingRule,
}

impl FunctionDefinition {
    const fn new(
        lua_function: Option<&'static str>,
        kind: FunctionKind,
        result_type: FieldType,
        precedence: Precedence,
        missing_rule: MissingRule,
    ) -> Self {
        Self {
            lua_function,
            kind,
            result_type,
            precedence,
            missing_rule,
        }
    }
}

/// A catalog row reachable by PMML name, with its declared arity range.
/// `max_args = usize::MAX` stands in for the original's unbounded arity.
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub pmml_name: &'static str,
    pub def: FunctionDefinition,
    pub min_args: usize,
    pub max_args: usize,
}

use FunctionKind as K;
use MissingRule::{
    MaybeMissing, MaybeMissingIfAnyArgMissing as MaybeMissingArg,
    MissingIfAnyArgMissing as MissingArg, NeverMissing,
};
use Precedence as P;

const MAX: usize = usize::MAX;

/// Sorted by PMML name for binary search, mirroring
/// `original_source/common/function.cpp`'s `functionTable`.
pub static FUNCTION_TABLE: &[CatalogEntry] = &[
    CatalogEntry { pmml_name: "*", def: FunctionDefinition::new(Some("*"), K::Operator, FieldType::Number, P::Times, MissingArg), min_args: 2, max_args: 2 },
    CatalogEntry { pmml_name: "+", def: FunctionDefinition::new(Some("+"), K::Operator, FieldType::Number, P::Plus, MissingArg), min_args: 2, max_args: 2 },
    CatalogEntry { pmml_name: "-", def: FunctionDefinition::new(Some("-"), K::Operator, FieldType::Number, P::Plus, MissingArg), min_args: 2, max_args: 2 },
    CatalogEntry { pmml_name: "/", def: FunctionDefinition::new(Some("/"), K::Operator, FieldType::Number, P::Times, MissingArg), min_args: 2, max_args: 2 },
    CatalogEntry { pmml_name: "abs", def: FunctionDefinition::new(Some("math.abs"), K::FunctionLike, FieldType::Number, P::Top, MissingArg), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "acos", def: FunctionDefinition::new(Some("math.acos"), K::FunctionLike, FieldType::Number, P::Top, MissingArg), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "and", def: FunctionDefinition::new(Some("and"), K::BooleanAnd, FieldType::Bool, P::And, MaybeMissingArg), min_args: 1, max_args: MAX },
    CatalogEntry { pmml_name: "asin", def: FunctionDefinition::new(Some("math.asin"), K::FunctionLike, FieldType::Number, P::Top, MissingArg), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "atan", def: FunctionDefinition::new(Some("math.atan"), K::FunctionLike, FieldType::Number, P::Top, MissingArg), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "avg", def: FunctionDefinition::new(Some("+"), K::Mean, FieldType::Number, P::Times, MissingArg), min_args: 1, max_args: MAX },
    CatalogEntry { pmml_name: "ceil", def: FunctionDefinition::new(Some("math.ceil"), K::FunctionLike, FieldType::Number, P::Times, MissingArg), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "concat", def: FunctionDefinition::new(Some(".."), K::Operator, FieldType::String, P::Concat, MissingArg), min_args: 1, max_args: MAX },
    CatalogEntry { pmml_name: "cos", def: FunctionDefinition::new(Some("math.cos"), K::FunctionLike, FieldType::Number, P::Top, MissingArg), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "cosh", def: FunctionDefinition::new(Some("math.cosh"), K::FunctionLike, FieldType::Number, P::Top, MissingArg), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "dateDaysSinceYear", def: FunctionDefinition::new(None, K::Unsupported, FieldType::Number, P::Top, MissingArg), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "dateSecondsSinceMidnight", def: FunctionDefinition::new(None, K::Unsupported, FieldType::Number, P::Top, MissingArg), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "dateSecondsSinceYear", def: FunctionDefinition::new(None, K::Unsupported, FieldType::Number, P::Top, MissingArg), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "equal", def: FunctionDefinition::new(Some("=="), K::Comparison, FieldType::Bool, P::Equal, MissingArg), min_args: 2, max_args: 2 },
    CatalogEntry { pmml_name: "erf", def: FunctionDefinition::new(Some("erf"), K::RunLambda, FieldType::Number, P::Top, MissingArg), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "exp", def: FunctionDefinition::new(Some("math.exp"), K::FunctionLike, FieldType::Number, P::Top, MissingArg), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "expm1", def: FunctionDefinition::new(None, K::Unsupported, FieldType::Number, P::Top, MissingArg), min_args: 2, max_args: 2 },
    CatalogEntry { pmml_name: "floor", def: FunctionDefinition::new(Some("math.floor"), K::FunctionLike, FieldType::Number, P::Top, MissingArg), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "formatDatetime", def: FunctionDefinition::new(None, K::Unsupported, FieldType::String, P::Top, MissingArg), min_args: 2, max_args: 2 },
    CatalogEntry { pmml_name: "formatNumber", def: FunctionDefinition::new(Some("string.format"), K::FunctionLike, FieldType::String, P::Top, MissingArg), min_args: 2, max_args: 2 },
    CatalogEntry { pmml_name: "greaterOrEqual", def: FunctionDefinition::new(Some(">="), K::Comparison, FieldType::Bool, P::Equal, MissingArg), min_args: 2, max_args: 2 },
    CatalogEntry { pmml_name: "greaterThan", def: FunctionDefinition::new(Some(">"), K::Comparison, FieldType::Bool, P::Equal, MissingArg), min_args: 2, max_args: 2 },
    CatalogEntry { pmml_name: "if", def: FunctionDefinition::new(None, K::Ternary, FieldType::Invalid, P::Top, MaybeMissingArg), min_args: 2, max_args: 3 },
    CatalogEntry { pmml_name: "isIn", def: FunctionDefinition::new(Some("=="), K::IsIn, FieldType::Bool, P::Or, MissingArg), min_args: 2, max_args: MAX },
    CatalogEntry { pmml_name: "isMissing", def: FunctionDefinition::new(Some("=="), K::IsMissing, FieldType::Bool, P::Equal, NeverMissing), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "isNotIn", def: FunctionDefinition::new(Some("~="), K::IsNotIn, FieldType::Bool, P::And, MissingArg), min_args: 2, max_args: MAX },
    CatalogEntry { pmml_name: "isNotMissing", def: FunctionDefinition::new(Some("not"), K::IsNotMissing, FieldType::Bool, P::Unary, NeverMissing), min_args: 1, max_args: 1 },
    // Preserved verbatim per spec.md §9 Open Questions: these aliases are not fully correct
    // (they treat "invalid" and "missing" identically) but are kept as-is, not "fixed".
    CatalogEntry { pmml_name: "isNotValid", def: FunctionDefinition::new(Some("=="), K::IsMissing, FieldType::Bool, P::Equal, NeverMissing), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "isValid", def: FunctionDefinition::new(Some("not"), K::IsNotMissing, FieldType::Bool, P::Unary, NeverMissing), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "lessOrEqual", def: FunctionDefinition::new(Some("<="), K::Comparison, FieldType::Bool, P::Equal, MissingArg), min_args: 2, max_args: 2 },
    CatalogEntry { pmml_name: "lessThan", def: FunctionDefinition::new(Some("<"), K::Comparison, FieldType::Bool, P::Equal, MissingArg), min_args: 2, max_args: 2 },
    CatalogEntry { pmml_name: "ln", def: FunctionDefinition::new(Some("math.log"), K::FunctionLike, FieldType::Number, P::Top, MissingArg), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "log10", def: FunctionDefinition::new(Some("math.log"), K::Log10, FieldType::Number, P::Top, MissingArg), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "lowercase", def: FunctionDefinition::new(Some("string.lower"), K::FunctionLike, FieldType::String, P::Top, MissingArg), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "matches", def: FunctionDefinition::new(None, K::Unsupported, FieldType::Number, P::Top, MissingArg), min_args: 2, max_args: 2 },
    CatalogEntry { pmml_name: "max", def: FunctionDefinition::new(Some("math.max"), K::FunctionLike, FieldType::Number, P::Top, MissingArg), min_args: 1, max_args: MAX },
    CatalogEntry { pmml_name: "median", def: FunctionDefinition::new(None, K::Unsupported, FieldType::Number, P::Top, MissingArg), min_args: 1, max_args: MAX },
    CatalogEntry { pmml_name: "min", def: FunctionDefinition::new(Some("math.min"), K::FunctionLike, FieldType::Number, P::Top, MissingArg), min_args: 1, max_args: MAX },
    CatalogEntry { pmml_name: "modulo", def: FunctionDefinition::new(Some("%"), K::Operator, FieldType::Number, P::Times, MissingArg), min_args: 2, max_args: 2 },
    CatalogEntry { pmml_name: "normalCDF", def: FunctionDefinition::new(Some("normalCDF"), K::Unsupported, FieldType::Number, P::Top, MissingArg), min_args: 3, max_args: 3 },
    CatalogEntry { pmml_name: "normalIDF", def: FunctionDefinition::new(Some("normalIDF"), K::Unsupported, FieldType::Number, P::Top, MissingArg), min_args: 3, max_args: 3 },
    CatalogEntry { pmml_name: "normalPDF", def: FunctionDefinition::new(Some("normalPDF"), K::Unsupported, FieldType::Number, P::Top, MissingArg), min_args: 3, max_args: 3 },
    CatalogEntry { pmml_name: "not", def: FunctionDefinition::new(Some("not"), K::Not, FieldType::Bool, P::Unary, MissingArg), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "notEqual", def: FunctionDefinition::new(Some("~="), K::Comparison, FieldType::Bool, P::Equal, MissingArg), min_args: 2, max_args: 2 },
    CatalogEntry { pmml_name: "or", def: FunctionDefinition::new(Some("or"), K::BooleanOr, FieldType::Bool, P::Or, MaybeMissingArg), min_args: 1, max_args: MAX },
    CatalogEntry { pmml_name: "pow", def: FunctionDefinition::new(Some("^"), K::Operator, FieldType::Number, P::Power, MissingArg), min_args: 2, max_args: 2 },
    CatalogEntry { pmml_name: "product", def: FunctionDefinition::new(Some("*"), K::Operator, FieldType::Number, P::Times, MissingArg), min_args: 1, max_args: MAX },
    CatalogEntry { pmml_name: "replace", def: FunctionDefinition::new(None, K::Unsupported, FieldType::String, P::Top, MissingArg), min_args: 1, max_args: MAX },
    CatalogEntry { pmml_name: "round", def: FunctionDefinition::new(Some("math.floor"), K::Round, FieldType::Number, P::Top, MissingArg), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "sin", def: FunctionDefinition::new(Some("math.sin"), K::FunctionLike, FieldType::Number, P::Top, MissingArg), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "sinh", def: FunctionDefinition::new(Some("math.sinh"), K::FunctionLike, FieldType::Number, P::Top, MissingArg), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "stdNormalCDF", def: FunctionDefinition::new(Some("stdNormalCDF"), K::RunLambda, FieldType::Number, P::Top, MissingArg), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "stdNormalIDF", def: FunctionDefinition::new(Some("stdNormalIDF"), K::RunLambda, FieldType::Number, P::Top, MissingArg), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "stdNormalPDF", def: FunctionDefinition::new(None, K::Unsupported, FieldType::Number, P::Top, MissingArg), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "substring", def: FunctionDefinition::new(Some("string.sub"), K::Substring, FieldType::String, P::Top, MissingArg), min_args: 3, max_args: 3 },
    CatalogEntry { pmml_name: "sum", def: FunctionDefinition::new(Some("+"), K::Operator, FieldType::Number, P::Plus, MissingArg), min_args: 1, max_args: MAX },
    CatalogEntry { pmml_name: "tan", def: FunctionDefinition::new(Some("math.tan"), K::FunctionLike, FieldType::Number, P::Top, MissingArg), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "tanh", def: FunctionDefinition::new(Some("math.tanh"), K::FunctionLike, FieldType::Number, P::Top, MissingArg), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "threshold", def: FunctionDefinition::new(None, K::Threshold, FieldType::Number, P::Or, MissingArg), min_args: 2, max_args: 2 },
    CatalogEntry { pmml_name: "trimBlanks", def: FunctionDefinition::new(None, K::Trim, FieldType::String, P::Or, MissingArg), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "uppercase", def: FunctionDefinition::new(Some("string.upper"), K::FunctionLike, FieldType::String, P::Top, MissingArg), min_args: 1, max_args: 1 },
    CatalogEntry { pmml_name: "x-modulo", def: FunctionDefinition::new(Some("%"), K::Operator, FieldType::Number, P::Times, MissingArg), min_args: 2, max_args: 2 },
];

/// Internal-only definitions: not reachable by PMML name lookup, but used
/// directly by the `AstBuilder`, the Driver's prologue, or by model parsers
/// synthesising macro nodes (spec.md §4.1, `original_source/common/function.cpp`
/// "internal definition" section).
pub mod internal {
    use super::*;

    /// A special case of `if` with only two operands: returns an unknown
    /// value if the predicate is false. Used for mining-field outlier
    /// treatment and transformation normalisation.
    pub const BOUND: FunctionDefinition =
        FunctionDefinition::new(None, K::Bound, FieldType::Invalid, P::Or, MaybeMissing);

    pub const UNARY_MINUS: FunctionDefinition =
        FunctionDefinition::new(Some("-"), K::UnaryMinus, FieldType::Invalid, P::Unary, MissingArg);

    pub const MAKE_TUPLE: FunctionDefinition =
        FunctionDefinition::new(None, K::MakeTuple, FieldType::Invalid, P::Top, MissingArg);

    pub const RUN_LAMBDA: FunctionDefinition =
        FunctionDefinition::new(None, K::RunLambda, FieldType::Invalid, P::Top, MaybeMissing);

    pub const RUN_LAMBDA_ARGS_MISSING: FunctionDefinition =
        FunctionDefinition::new(None, K::RunLambda, FieldType::Invalid, P::Top, MaybeMissingArg);

    pub const RUN_LAMBDA_NEVER_MISSING: FunctionDefinition =
        FunctionDefinition::new(None, K::RunLambda, FieldType::Invalid, P::Top, NeverMissing);

    /// Not reachable from `FUNCTION_TABLE` (its only caller in the original
    /// is the neural-network model parser's activation-function lookup, out
    /// of scope here); kept so the Driver's prologue and its tests can name
    /// a `RunLambda` call site for it, mirroring
    /// `original_source/model/neuralnetworkmodel.cpp`'s `elliottFunction`.
    pub const ELLIOTT: FunctionDefinition =
        FunctionDefinition::new(Some("elliott"), K::RunLambda, FieldType::Invalid, P::Top, MissingArg);

    pub const SQRT: FunctionDefinition =
        FunctionDefinition::new(Some("math.sqrt"), K::FunctionLike, FieldType::Invalid, P::Top, MissingArg);

    pub const SORT_TABLE: FunctionDefinition =
        FunctionDefinition::new(Some("table.sort"), K::SortTable, FieldType::Void, P::Top, MissingArg);

    pub const INSERT_TO_TABLE: FunctionDefinition =
        FunctionDefinition::new(Some("table.insert"), K::InsertToTable, FieldType::Void, P::Top, MissingArg);

    pub const LIST_LENGTH: FunctionDefinition =
        FunctionDefinition::new(Some("#"), K::ListLength, FieldType::Number, P::Unary, MissingArg);

    /// `surrogate`'s Lua function is "or" so it may be emitted as a flat
    /// `A or B or C...` chain for non-bool types (see spec.md §4.5.1).
    pub const SURROGATE: FunctionDefinition =
        FunctionDefinition::new(Some("or"), K::Surrogate, FieldType::Invalid, P::Or, MaybeMissingArg);

    pub const XOR: FunctionDefinition =
        FunctionDefinition::new(Some("~="), K::BooleanXor, FieldType::Invalid, P::Equal, MissingArg);

    pub const CONSTANT: FunctionDefinition =
        FunctionDefinition::new(None, K::Constant, FieldType::Invalid, P::Top, NeverMissing);

    pub const FIELD_REF: FunctionDefinition =
        FunctionDefinition::new(None, K::FieldRef, FieldType::Invalid, P::Top, MaybeMissing);

    pub const BLOCK: FunctionDefinition =
        FunctionDefinition::new(None, K::Block, FieldType::Void, P::Top, NeverMissing);

    pub const IF_CHAIN: FunctionDefinition =
        FunctionDefinition::new(None, K::IfChain, FieldType::Void, P::Top, NeverMissing);

    pub const ASSIGNMENT: FunctionDefinition =
        FunctionDefinition::new(None, K::Assignment, FieldType::Void, P::Top, NeverMissing);

    pub const ASSIGN_INDIRECT: FunctionDefinition =
        FunctionDefinition::new(None, K::AssignIndirect, FieldType::Void, P::Top, NeverMissing);

    pub const DECLARATION: FunctionDefinition =
        FunctionDefinition::new(None, K::Declaration, FieldType::Void, P::Top, NeverMissing);

    pub const DEFAULT: FunctionDefinition =
        FunctionDefinition::new(None, K::Default, FieldType::Invalid, P::Or, NeverMissing);

    pub const LAMBDA: FunctionDefinition =
        FunctionDefinition::new(None, K::Lambda, FieldType::Lambda, P::Top, NeverMissing);

    pub const RETURN: FunctionDefinition =
        FunctionDefinition::new(None, K::Return, FieldType::Void, P::Top, NeverMissing);

    pub const NIL: FunctionDefinition =
        FunctionDefinition::new(Some("nil"), K::Constant, FieldType::Invalid, P::Top, NeverMissing);
}

/// Binary search the catalog by PMML name (the table is kept sorted by
/// construction; see the `FUNCTION_TABLE` listing above).
pub fn find_builtin_function(pmml_name: &str) -> Option<&'static CatalogEntry> {
    FUNCTION_TABLE
        .binary_search_by(|entry| entry.pmml_name.cmp(pmml_name))
        .ok()
        .map(|idx| &FUNCTION_TABLE[idx])
}

#[cfg(test)]
mod catalog_tests {
    use super::*;

    #[test]
    fn table_is_sorted_for_binary_search() {
        for pair in FUNCTION_TABLE.windows(2) {
            assert!(
                pair[0].pmml_name < pair[1].pmml_name,
                "{} should sort before {}",
                pair[0].pmml_name,
                pair[1].pmml_name
            );
        }
    }

    #[test]
    fn finds_known_function() {
        let entry = find_builtin_function("greaterThan").unwrap();
        assert_eq!(entry.def.lua_function, Some(">"));
        assert_eq!(entry.min_args, 2);
        assert_eq!(entry.max_args, 2);
    }

    #[test]
    fn missing_function_is_none() {
        assert!(find_builtin_function("nonexistent").is_none());
    }

    #[test]
    fn is_not_valid_aliases_is_missing() {
        let is_not_valid = find_builtin_function("isNotValid").unwrap();
        let is_missing = find_builtin_function("isMissing").unwrap();
        assert_eq!(is_not_valid.def.kind, is_missing.def.kind);
    }

    #[test]
    fn unbounded_arity_uses_max() {
        let entry = find_builtin_function("sum").unwrap();
        assert_eq!(entry.max_args, usize::MAX);
    }
}
