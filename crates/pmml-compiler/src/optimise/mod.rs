//! The optimiser (spec.md §4.6): repeatedly inlines, dead-code-eliminates,
//! aliases, and overflows local variables so the emitted program fits the
//! target's per-function local-variable cap.
//!
//! The five named passes run in this order:
//! 1. `flatten` - inline nested `Block` children into their parent.
//! 2. `var_info` - build the per-`FieldId` usage map the remaining passes
//!    read from (first/last set, first/last use, whether it is captured by
//!    a nested lambda).
//! 3. `dce` - dead-code removal (trivial branches, dead declarations).
//! 4. `inline` - substitute single-assignment declarations at their use
//!    sites when doing so is cheaper than keeping the local.
//!
//! Passes 1-4 repeat to a fixpoint (spec.md §4.6 "Repeat 1-4 until
//! fixpoint"), then:
//! 5. `alias` - reuse one variable's slot for another whose live range
//!    doesn't overlap.
//! 6. `overflow` - move the least-used remaining locals into a single
//!    array local when the count still exceeds the cap.
//!
//! Simplification from spec.md (documented in DESIGN.md): `var_info` is
//! computed over the whole compilation rather than re-scoped per lambda
//! function body, and any field referenced inside a nested lambda is
//! conservatively marked `unmovable` even when declared inside that same
//! lambda. This can only make the optimiser *more* conservative than the
//! original (fewer variables get aliased/overflowed than strictly
//! necessary), never less - so the semantic-identity property (spec.md §8
//! item 5) still holds.

mod alias;
mod dce;
mod flatten;
mod inline;
mod overflow;
mod var_info;

use indexmap::IndexMap;

use pmml_core::{AstNode, FieldId};

use crate::analyze::AnalyserContext;
use crate::context::ConversionContext;
use crate::error::CompileError;

pub use var_info::{VarInfo, VarInfoMap};

/// The target-language cap `MaxLocals` is a compile-time constant
/// (reference value 195 for Lua's 200-local limit, spec.md §4.6).
#[derive(Debug, Clone, Copy)]
pub struct OptimiserLimits {
    pub max_locals: usize,
}

impl Default for OptimiserLimits {
    fn default() -> Self {
        Self { max_locals: 195 }
    }
}

/// Maximum number of fixpoint iterations of passes 1-4 before giving up;
/// a backstop against a pass that oscillates rather than converging (no
/// correctly-implemented pass should ever need this many).
const MAX_FIXPOINT_ITERATIONS: usize = 64;

/// Runs the optimiser to completion (spec.md §4.6): passes 1-4 to a
/// fixpoint, then alias computation and overflow-slot assignment. Returns
/// the alias map the emitter consults for variable emission, or
/// `ResourceBudgetExceeded` if, even after overflow, the function still
/// needs more locals than the target allows.
pub fn optimise(
    ctx: &mut ConversionContext,
    root: &mut AstNode,
    limits: OptimiserLimits,
) -> Result<IndexMap<FieldId, FieldId>, CompileError> {
    for _ in 0..MAX_FIXPOINT_ITERATIONS {
        let mut changed = flatten::run(root);

        let info = var_info::collect(root);
        let mut analyser = AnalyserContext::new();
        changed |= dce::run(ctx, &mut analyser, root, &info);

        let near_cap = info.len() > near_cap_threshold(limits);
        changed |= inline::run(ctx, root, &info, near_cap);

        if !changed {
            break;
        }
    }

    let info = var_info::collect(root);
    let aliases = alias::compute(ctx, &info);
    overflow::assign(ctx, &info, &aliases, limits)?;
    Ok(aliases)
}

/// Inlining's `priceOfVariable` switches from 1 to 5 "when approaching the
/// local-variable limit" (spec.md §4.6 pass 4); 80% of the overflow-free
/// budget is the threshold.
fn near_cap_threshold(limits: OptimiserLimits) -> usize {
    limits.max_locals.saturating_sub(2) * 4 / 5
}
