//! The Driver (spec.md §4.7, C7): orchestrates the finished model AST
//! through `Function::prologue`'s runtime-helper rewrite, the optimiser,
//! and the emitter. XML ingest (spec.md §4.7 steps 1-4) is out of scope
//! here — a caller hands the Driver a `ConversionContext` already seeded
//! via `setup_inputs`/`setup_outputs` and the single finished model
//! `AstNode` (what a model parser would have pushed via `block(n)`).

use std::collections::HashSet;

use indexmap::IndexMap;

use pmml_core::catalog::{self, internal};
use pmml_core::{AstNode, FieldId, FieldOrigin, FieldType};

use crate::analyze::AnalyserContext;
use crate::builder::AstBuilder;
use crate::context::ConversionContext;
use crate::diagnostics::Diagnostics;
use crate::emit::{emit, Dim, EmitContext, Layout, LayoutOptions};
use crate::error::{CompileError, Error, Result};
use crate::optimise::{self, OptimiserLimits};

/// `A` in Winizki's approximation of the error function
/// (`original_source/common/function.cpp`): keeps the approximation within
/// four decimal places for all real inputs.
const MAGIC_VALUE_FOR_ERF: &str = "0.147";

/// Bundles the optimiser's and the layout's configuration knobs behind one
/// `Copy` struct, following the teacher's single-config-struct-per-pass
/// convention.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverConfig {
    pub layout: LayoutOptions,
    pub optimiser: OptimiserLimits,
}

/// Top-level orchestration (spec.md §4.7 steps 5-7): runtime-helper
/// prologue, optimise, emit.
#[derive(Debug, Clone, Copy, Default)]
pub struct Driver {
    config: DriverConfig,
}

impl Driver {
    pub fn new(config: DriverConfig) -> Self {
        Self { config }
    }

    /// Compiles one finished model AST into Lua source text. `root` is the
    /// single node a model parser would have left on the builder's stack
    /// (spec.md §4.7 step 4); any transformation-dictionary templates or
    /// custom-function lambdas are expected to already be folded into it.
    pub fn compile(&self, ctx: &mut ConversionContext, root: AstNode) -> Result<(String, Diagnostics)> {
        let diagnostics = Diagnostics::new();

        let mut builder = AstBuilder::new();
        builder.push_node(root);
        let wrapped = run_prologue(ctx, &mut builder)?;
        if wrapped {
            let helpers = builder.pop_node();
            let model_body = builder.pop_node();
            builder.push_node(helpers);
            builder.push_node(model_body);
            builder.block(2);
        }
        let mut root = builder.pop_node();

        let aliases = optimise::optimise(ctx, &mut root, self.config.optimiser)?;

        let mut analyser = AnalyserContext::new();
        let mut layout = Layout::new(self.config.layout);
        if ctx.fields().iter().any(|f| f.overflow_slot().is_some()) {
            layout.declare_overflow_array();
        }
        {
            let mut emit_ctx = EmitContext {
                conversion: ctx,
                analyser: &mut analyser,
                aliases: &aliases,
            };
            emit(&mut emit_ctx, &root, Dim::Nil, &mut layout);
        }

        Ok((layout.into_source(), diagnostics))
    }
}

fn lookup(name: &str) -> pmml_core::FunctionDefinition {
    catalog::find_builtin_function(name)
        .unwrap_or_else(|| panic!("internal catalog is missing the '{name}' builtin"))
        .def
}

/// Renders a constant's text the way `builder.rs`'s private `format_f64`
/// does elsewhere in this crate: bare integers print without a decimal
/// point, everything else uses Rust's shortest round-tripping form.
fn format_f64(v: f64) -> String {
    if v.fract() == 0.0 && v.is_finite() {
        format!("{v:.0}")
    } else {
        v.to_string()
    }
}

/// Collects every distinct `lua_function` name reachable from `node`
/// (`original_source/common/function.cpp`'s `gatherAllFunctionNames`) —
/// the set of runtime helpers a call site might need built.
fn gather_function_names(node: &AstNode, out: &mut HashSet<&'static str>) {
    if let Some(name) = node.def().lua_function {
        out.insert(name);
    }
    for child in node.children() {
        gather_function_names(child, out);
    }
}

/// Builds `sqrt(1 - exp(-x^2 * (4/pi + A*x^2) / (1 + A*x^2)))` - Winizki's
/// approximation of the error function - then conditionally flips its
/// sign for negative `xparam` (`original_source/common/function.cpp`'s
/// `writeErfGuts`). Leaves exactly two statement nodes on the builder's
/// stack: the `erfValue` declaration and the sign-flip `if`. Returns the
/// `FieldId` callers should reference afterwards.
fn write_erf_guts(
    builder: &mut AstBuilder,
    ctx: &mut ConversionContext,
    xparam: FieldId,
) -> Result<FieldId> {
    let times = lookup("*");
    let plus = lookup("+");
    let minus = lookup("-");
    let divide = lookup("/");
    let exp = lookup("exp");
    let less_than = lookup("lessThan");

    builder.constant("1", FieldType::Number);

    // -x^2
    builder.field(xparam, FieldType::Number);
    builder.field(xparam, FieldType::Number);
    builder.function(times, 2)?;
    builder.function(internal::UNARY_MINUS, 1)?;

    // * (4/pi + A*x^2)
    builder.constant(&format_f64(std::f64::consts::FRAC_2_PI * 2.0), FieldType::Number);
    builder.constant(MAGIC_VALUE_FOR_ERF, FieldType::Number);
    builder.field(xparam, FieldType::Number);
    builder.field(xparam, FieldType::Number);
    builder.function(times, 3)?;
    builder.function(plus, 2)?;
    builder.function(times, 2)?;

    // / (1 + A*x^2)
    builder.constant("1", FieldType::Number);
    builder.constant(MAGIC_VALUE_FOR_ERF, FieldType::Number);
    builder.field(xparam, FieldType::Number);
    builder.field(xparam, FieldType::Number);
    builder.function(times, 3)?;
    builder.function(plus, 2)?;
    builder.function(divide, 2)?;

    builder.function(exp, 1)?;
    builder.function(minus, 2)?;

    builder.function(internal::SQRT, 1)?;

    let erf_value = ctx.create_variable(FieldType::Number, "erfValue", FieldOrigin::Temporary);
    builder.declare(erf_value, true, FieldType::Number);

    // if x < 0 then erfValue = -erfValue end
    builder.field(erf_value, FieldType::Number);
    builder.function(internal::UNARY_MINUS, 1)?;
    builder.assign(erf_value, FieldType::Number);

    builder.field(xparam, FieldType::Number);
    builder.constant("0", FieldType::Number);
    builder.function(less_than, 2)?;
    builder.if_chain(2, FieldType::Void);

    Ok(erf_value)
}

/// `activation(Z) = Z / (1 + |Z|)` - the Elliott sigmoid some neural-network
/// models use as an activation function. Leaves one declaration statement
/// on the builder's stack.
fn build_elliott(ctx: &mut ConversionContext, builder: &mut AstBuilder) -> Result<FieldId> {
    let abs = lookup("abs");
    let plus = lookup("+");
    let divide = lookup("/");

    let z = ctx.create_variable(FieldType::Number, "Z", FieldOrigin::Parameter);
    builder.field(z, FieldType::Number);

    builder.field(z, FieldType::Number);
    builder.constant("1", FieldType::Number);
    builder.field(z, FieldType::Number);
    builder.function(abs, 1)?;
    builder.function(plus, 2)?;
    builder.function(divide, 2)?;

    builder.lambda(1);

    let def = ctx.create_variable(FieldType::Lambda, "elliott", FieldOrigin::Parameter);
    builder.declare(def, true, FieldType::Lambda);
    Ok(def)
}

/// `stdNormalCDF(X) = (erf(X / sqrt(2)) + 1) * 0.5`. Leaves one declaration
/// statement on the builder's stack.
fn build_std_normal_cdf(ctx: &mut ConversionContext, builder: &mut AstBuilder) -> Result<FieldId> {
    let divide = lookup("/");
    let plus = lookup("+");
    let times = lookup("*");

    let x = ctx.create_variable(FieldType::Number, "X", FieldOrigin::Parameter);
    builder.field(x, FieldType::Number);

    let xvar = ctx.create_variable(FieldType::Number, "x", FieldOrigin::Temporary);
    builder.field(x, FieldType::Number);
    builder.constant(&format_f64(std::f64::consts::SQRT_2), FieldType::Number);
    builder.function(divide, 2)?;
    builder.declare(xvar, true, FieldType::Number);

    let erf_value = write_erf_guts(builder, ctx, xvar)?;

    builder.field(erf_value, FieldType::Number);
    builder.constant("1", FieldType::Number);
    builder.function(plus, 2)?;
    builder.constant("0.5", FieldType::Number);
    builder.function(times, 2)?;

    builder.block(4);
    builder.lambda(1);

    let def = ctx.create_variable(FieldType::Lambda, "stdNormalCDF", FieldOrigin::Parameter);
    builder.declare(def, true, FieldType::Lambda);
    Ok(def)
}

/// The inverse standard normal CDF, approximated in closed form from
/// `logOneMinusXSquare`/`chunkybit`/`invErf` without calling back into
/// `erf` (`original_source/common/function.cpp`'s `stdNormalIDF` branch).
/// Leaves one declaration statement on the builder's stack.
fn build_std_normal_idf(ctx: &mut ConversionContext, builder: &mut AstBuilder) -> Result<FieldId> {
    let times = lookup("*");
    let minus = lookup("-");
    let plus = lookup("+");
    let divide = lookup("/");
    let pow = lookup("pow");
    let ln = lookup("ln");
    let less_than = lookup("lessThan");

    let two_over_pi_a = std::f64::consts::FRAC_2_PI / 0.147;

    let p = ctx.create_variable(FieldType::Number, "p", FieldOrigin::Parameter);
    builder.field(p, FieldType::Number);

    let log_one_minus_x_square =
        ctx.create_variable(FieldType::Number, "logOneMinusXSquare", FieldOrigin::Temporary);
    builder.constant("1", FieldType::Number);
    builder.constant("2", FieldType::Number);
    builder.field(p, FieldType::Number);
    builder.function(times, 2)?;
    builder.constant("1", FieldType::Number);
    builder.function(minus, 2)?;
    builder.constant("2", FieldType::Number);
    builder.function(pow, 2)?;
    builder.function(minus, 2)?;
    builder.function(ln, 1)?;
    builder.declare(log_one_minus_x_square, true, FieldType::Number);

    let chunkybit = ctx.create_variable(FieldType::Number, "chunkybit", FieldOrigin::Temporary);
    builder.constant(&format_f64(two_over_pi_a), FieldType::Number);
    builder.field(log_one_minus_x_square, FieldType::Number);
    builder.constant("2", FieldType::Number);
    builder.function(divide, 2)?;
    builder.function(plus, 2)?;
    builder.declare(chunkybit, true, FieldType::Number);

    let inv_erf = ctx.create_variable(FieldType::Number, "invErf", FieldOrigin::Temporary);
    builder.field(chunkybit, FieldType::Number);
    builder.field(chunkybit, FieldType::Number);
    builder.function(times, 2)?;
    builder.field(log_one_minus_x_square, FieldType::Number);
    builder.constant(MAGIC_VALUE_FOR_ERF, FieldType::Number);
    builder.function(divide, 2)?;
    builder.function(minus, 2)?;
    builder.function(internal::SQRT, 1)?;
    builder.field(chunkybit, FieldType::Number);
    builder.function(minus, 2)?;
    builder.function(internal::SQRT, 1)?;
    builder.declare(inv_erf, true, FieldType::Number);

    // if p < 0.5 then invErf = -invErf end
    builder.field(inv_erf, FieldType::Number);
    builder.function(internal::UNARY_MINUS, 1)?;
    builder.assign(inv_erf, FieldType::Number);
    builder.field(p, FieldType::Number);
    builder.constant("0.5", FieldType::Number);
    builder.function(less_than, 2)?;
    builder.if_chain(2, FieldType::Void);

    builder.constant(&format_f64(std::f64::consts::SQRT_2), FieldType::Number);
    builder.field(inv_erf, FieldType::Number);
    builder.function(times, 2)?;

    builder.block(5);
    builder.lambda(1);

    let def = ctx.create_variable(FieldType::Lambda, "stdNormalIDF", FieldOrigin::Parameter);
    builder.declare(def, true, FieldType::Lambda);
    Ok(def)
}

/// `erf(x)`, exposed directly for models that call it as a PMML function
/// rather than through `stdNormalCDF`/`stdNormalIDF`. Preserves a quirk of
/// the original (`original_source/common/function.cpp`): the field holding
/// this helper's lambda is declared with `FieldType::Number`, not
/// `FieldType::Lambda`, even though it is invoked exactly like the other
/// three helpers above. Kept verbatim rather than "fixed" (spec.md §9 Open
/// Questions style) since it has no observable effect — Lua is dynamically
/// typed, and this compiler's own type checking never re-inspects a
/// `FieldDescription`'s stored type through a `FieldRef` node once built.
fn build_erf(ctx: &mut ConversionContext, builder: &mut AstBuilder) -> Result<FieldId> {
    let x = ctx.create_variable(FieldType::Number, "x", FieldOrigin::Parameter);
    builder.field(x, FieldType::Number);

    let erf_value = write_erf_guts(builder, ctx, x)?;
    builder.field(erf_value, FieldType::Number);

    builder.block(3);
    builder.lambda(1);

    let def = ctx.create_variable(FieldType::Number, "erf", FieldOrigin::Parameter);
    builder.declare(def, true, FieldType::Number);
    Ok(def)
}

/// Rewrites every call site whose `lua_function` matches a built helper to
/// pass that helper's lambda as an extra trailing child
/// (`original_source/common/function.cpp`'s `applyDefinedFunctionToNodes`).
fn apply_fixups(builder: &mut AstBuilder, node: &mut AstNode, fixups: &IndexMap<&'static str, FieldId>) {
    if let Some(name) = node.def().lua_function {
        if let Some(&field) = fixups.get(name) {
            builder.field(field, FieldType::Lambda);
            let callee = builder.pop_node();
            node.children_mut().push(callee);
        }
    }
    for child in node.children_mut() {
        apply_fixups(builder, child, fixups);
    }
}

/// `Function::prologue` (spec.md §4.7 step 5): scans the model body
/// already on `builder`'s stack for runtime-helper names, builds whichever
/// of `elliott`/`stdNormalCDF`/`stdNormalIDF`/`erf` are needed, and rewrites
/// every call site to thread the matching helper's lambda through as a
/// trailing argument. Returns whether anything was built — the caller
/// decides whether to wrap the result in an enclosing `Block`.
fn run_prologue(ctx: &mut ConversionContext, builder: &mut AstBuilder) -> Result<bool> {
    let mut names = HashSet::new();
    gather_function_names(builder.top_node(), &mut names);

    let mut fixups: IndexMap<&'static str, FieldId> = IndexMap::new();
    let mut added = 0usize;

    if names.contains("elliott") {
        let def = build_elliott(ctx, builder)?;
        fixups.insert("elliott", def);
        added += 1;
    }
    if names.contains("stdNormalCDF") {
        let def = build_std_normal_cdf(ctx, builder)?;
        fixups.insert("stdNormalCDF", def);
        added += 1;
    }
    if names.contains("stdNormalIDF") {
        let def = build_std_normal_idf(ctx, builder)?;
        fixups.insert("stdNormalIDF", def);
        added += 1;
    }
    if names.contains("erf") {
        let def = build_erf(ctx, builder)?;
        fixups.insert("erf", def);
        added += 1;
    }

    if added > 1 {
        builder.block(added);
    }

    if !fixups.is_empty() {
        // The original mutates the model body in place via a reference to
        // the builder's top-of-stack node while still issuing further
        // builder calls to construct each fixup's field-ref. Rust's borrow
        // checker won't allow holding that reference across those calls,
        // so the equivalent here is to take ownership of the model body,
        // mutate it, and push it back - same net effect, no aliasing.
        let helpers = builder.pop_node();
        let mut model_body = builder.pop_node();
        apply_fixups(builder, &mut model_body, &fixups);
        builder.push_node(model_body);
        builder.push_node(helpers);
    }

    Ok(added > 0)
}

#[cfg(test)]
mod driver_tests {
    use super::*;
    use pmml_core::OpType;

    fn compile(ctx: &mut ConversionContext, root: AstNode) -> (String, Diagnostics) {
        let driver = Driver::new(DriverConfig::default());
        driver.compile(ctx, root).expect("compilation should succeed")
    }

    #[test]
    fn simple_predicate_emits_declaration_and_comparison() {
        let mut ctx = ConversionContext::new();
        let age = ctx.add_unscoped_field("age", FieldType::Number, OpType::Continuous, FieldOrigin::DataDictionary);
        let result = ctx.add_unscoped_field("result", FieldType::Bool, OpType::Categorical, FieldOrigin::Output);

        let mut b = AstBuilder::new();
        b.field(age, FieldType::Number);
        b.constant("18", FieldType::Number);
        b.function(lookup("greaterOrEqual"), 2).unwrap();
        b.assign(result, FieldType::Bool);
        b.block(1);
        let root = b.pop_node();

        let (lua, diags) = compile(&mut ctx, root);
        assert!(diags.is_empty());
        assert!(lua.contains(">="));
        assert!(lua.contains("result"));
    }

    #[test]
    fn ternary_with_default_picks_a_short_form() {
        let mut ctx = ConversionContext::new();
        let score = ctx.add_unscoped_field("score", FieldType::Number, OpType::Continuous, FieldOrigin::DataDictionary);
        let flag = ctx.add_unscoped_field("flag", FieldType::Bool, OpType::Categorical, FieldOrigin::DataDictionary);
        let out = ctx.add_unscoped_field("out", FieldType::Number, OpType::Continuous, FieldOrigin::Output);

        let mut b = AstBuilder::new();
        b.field(flag, FieldType::Bool);
        b.field(score, FieldType::Number);
        b.constant("0", FieldType::Number);
        b.function(lookup("if"), 3).unwrap();
        b.default("-1", FieldType::Number).unwrap();
        b.assign(out, FieldType::Number);
        b.block(1);
        let root = b.pop_node();

        let (lua, diags) = compile(&mut ctx, root);
        assert!(diags.is_empty());
        assert!(lua.contains("out ="));
    }

    #[test]
    fn three_valued_and_threads_missing_through() {
        let mut ctx = ConversionContext::new();
        let a = ctx.add_unscoped_field("a", FieldType::Bool, OpType::Categorical, FieldOrigin::DataDictionary);
        let c = ctx.add_unscoped_field("b", FieldType::Bool, OpType::Categorical, FieldOrigin::DataDictionary);
        let out = ctx.add_unscoped_field("out", FieldType::Bool, OpType::Categorical, FieldOrigin::Output);

        let mut b = AstBuilder::new();
        b.field(a, FieldType::Bool);
        b.field(c, FieldType::Bool);
        b.function(lookup("and"), 2).unwrap();
        b.assign(out, FieldType::Bool);
        b.block(1);
        let root = b.pop_node();

        let (lua, diags) = compile(&mut ctx, root);
        assert!(diags.is_empty());
        assert!(lua.contains("out"));
    }

    #[test]
    fn surrogate_of_two_field_refs_falls_back_when_first_is_missing() {
        let mut ctx = ConversionContext::new();
        let primary = ctx.add_unscoped_field("primary", FieldType::Number, OpType::Continuous, FieldOrigin::DataDictionary);
        let backup = ctx.add_unscoped_field("backup", FieldType::Number, OpType::Continuous, FieldOrigin::DataDictionary);
        let out = ctx.add_unscoped_field("out", FieldType::Number, OpType::Continuous, FieldOrigin::Output);

        let mut b = AstBuilder::new();
        b.field(primary, FieldType::Number);
        b.field(backup, FieldType::Number);
        b.custom_node(internal::SURROGATE, FieldType::Number, "", 2).unwrap();
        b.assign(out, FieldType::Number);
        b.block(1);
        let root = b.pop_node();

        let (lua, diags) = compile(&mut ctx, root);
        assert!(diags.is_empty());
        assert!(lua.contains("primary"));
        assert!(lua.contains("backup"));
    }

    #[test]
    fn discretize_with_mining_replacement_bins_a_number_into_a_string() {
        use crate::context::{MiningField, OutlierTreatment};

        let mut ctx = ConversionContext::new();
        let x = ctx.add_unscoped_field("x", FieldType::Number, OpType::Continuous, FieldOrigin::DataDictionary);
        let out = ctx.add_unscoped_field("out", FieldType::String, OpType::Categorical, FieldOrigin::Output);

        let mining = MiningField {
            field: x,
            outlier_treatment: OutlierTreatment::AsIs,
            low_value: None,
            high_value: None,
            replacement_value: Some("20".to_string()),
        };

        // Bins [0,10) -> "little", [10,100) -> "medium", [100,inf) -> "big";
        // a value outside every bin (or a missing value the mining schema
        // doesn't cover) leaves `out` at its declared initial value.
        let bin = |b: &mut AstBuilder, ctx: &mut ConversionContext, low: f64, high: Option<f64>, label: &str| {
            b.constant(label, FieldType::String);
            b.assign(out, FieldType::String);

            b.field_from_mining(ctx, &mining, FieldType::Number).unwrap();
            b.constant(&format_f64(low), FieldType::Number);
            b.function(lookup("greaterOrEqual"), 2).unwrap();
            if let Some(high) = high {
                b.field_from_mining(ctx, &mining, FieldType::Number).unwrap();
                b.constant(&format_f64(high), FieldType::Number);
                b.function(lookup("lessThan"), 2).unwrap();
                b.function(lookup("and"), 2).unwrap();
            }
        };

        let mut b = AstBuilder::new();
        b.declare(out, false, FieldType::String);
        bin(&mut b, &mut ctx, 0.0, Some(10.0), "little");
        bin(&mut b, &mut ctx, 10.0, Some(100.0), "medium");
        bin(&mut b, &mut ctx, 100.0, None, "big");
        b.if_chain(6, FieldType::Void);
        b.block(2);
        let root = b.pop_node();

        let (lua, diags) = compile(&mut ctx, root);
        assert!(diags.is_empty());
        assert!(lua.contains("\"little\""));
        assert!(lua.contains("\"medium\""));
        assert!(lua.contains("\"big\""));
        assert!(lua.contains("20"));
    }

    #[test]
    fn std_normal_cdf_call_site_gets_rewritten_with_helper_lambda() {
        let mut ctx = ConversionContext::new();
        let x = ctx.add_unscoped_field("x", FieldType::Number, OpType::Continuous, FieldOrigin::DataDictionary);
        let out = ctx.add_unscoped_field("out", FieldType::Number, OpType::Continuous, FieldOrigin::Output);

        let mut b = AstBuilder::new();
        b.field(x, FieldType::Number);
        b.function(lookup("stdNormalCDF"), 1).unwrap();
        b.assign(out, FieldType::Number);
        b.block(1);
        let root = b.pop_node();

        let (lua, diags) = compile(&mut ctx, root);
        assert!(diags.is_empty());
        assert!(lua.contains("stdNormalCDF"));
        assert!(lua.contains("erfValue"));
    }

    #[test]
    fn overflowing_local_budget_routes_extra_variables_through_the_array() {
        let mut ctx = ConversionContext::new();
        let out = ctx.add_unscoped_field("out", FieldType::Number, OpType::Continuous, FieldOrigin::Output);

        let mut b = AstBuilder::new();
        let mut fields = Vec::new();
        for i in 0..40 {
            let field = ctx.add_unscoped_field(
                &format!("v{i}"),
                FieldType::Number,
                OpType::Continuous,
                FieldOrigin::Temporary,
            );
            b.constant(&i.to_string(), FieldType::Number);
            b.constant(&(i + 1).to_string(), FieldType::Number);
            b.function(lookup("+"), 2).unwrap();
            b.declare(field, true, FieldType::Number);
            fields.push(field);
        }
        for &field in &fields {
            b.field(field, FieldType::Number);
        }
        b.function(lookup("sum"), fields.len()).unwrap();
        b.assign(out, FieldType::Number);
        b.block(fields.len() + 1);
        let root = b.pop_node();

        let driver = Driver::new(DriverConfig {
            layout: LayoutOptions::default(),
            optimiser: OptimiserLimits { max_locals: 10 },
        });
        let (lua, diags) = driver.compile(&mut ctx, root).expect("should fit via overflow");
        assert!(diags.is_empty());
        assert!(lua.contains("overflow"));
    }
}
