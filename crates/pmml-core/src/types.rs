//! Closed-set value types shared by every stage of the compiler.

/// The type a value carries through the compilation. Rank order (declaration
/// order below) defines coercion: a coercion may only ever widen a type to a
/// later-ranked one. `Bool` is incompatible with every non-`Bool` type; it
/// never widens into, or accepts a widening from, `Number`/`String`/etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldType {
    Number,
    String,
    Bool,
    Table,
    StringTable,
    Lambda,
    Void,
    Invalid,
}

impl FieldType {
    /// Whether two types may be coerced to a common type without going
    /// through `Invalid`. `Bool` only unifies with `Bool`.
    pub fn coercible_with(self, other: FieldType) -> bool {
        if self == other {
            return true;
        }
        self != FieldType::Bool && other != FieldType::Bool
    }

    /// The more permissive of two coercible types (the higher-ranked one).
    /// Returns `None` if the two types are not coercible with each other.
    pub fn unify(self, other: FieldType) -> Option<FieldType> {
        if !self.coercible_with(other) {
            return None;
        }
        Some(self.max(other))
    }
}

/// The PMML operational type of a field (distinct from its storage
/// `FieldType`). Drives mining-schema defaults but otherwise carried
/// unopinionated through the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpType {
    Categorical,
    Continuous,
    Ordinal,
    Invalid,
}

/// Where a named value came from. Governs the optimiser's freedom to inline
/// or alias it away: `Parameter` and `Special` fields may never be inlined
/// or aliased since their identity (as a distinct local/argument slot) is
/// part of the contract with surrounding code the optimiser doesn't see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldOrigin {
    DataDictionary,
    Parameter,
    Temporary,
    Output,
    TransformedValue,
    Special,
}

impl FieldOrigin {
    /// Parameters and special fields may never be inlined or aliased by the
    /// optimiser (spec.md §3 "FieldOrigin").
    pub fn is_movable(self) -> bool {
        !matches!(self, FieldOrigin::Parameter | FieldOrigin::Special)
    }
}
