//! Overflow pass (spec.md §4.6 pass 6): when, even after inlining and
//! aliasing, the function still needs more locals than the target allows,
//! the least-used remaining variables are moved into slots of a single
//! overflow-array local instead of their own local (`FieldDescription`'s
//! `overflow_slot`, consulted by `Layout::field` at emission time).

use indexmap::IndexMap;

use pmml_core::FieldId;

use crate::context::ConversionContext;
use crate::error::CompileError;

use super::var_info::VarInfoMap;
use super::OptimiserLimits;

/// Assigns overflow slots until the remaining distinct-local count fits
/// `limits.max_locals`, or reports `ResourceBudgetExceeded` if even every
/// movable field overflowing still isn't enough.
pub fn assign(
    ctx: &mut ConversionContext,
    var_info: &VarInfoMap,
    aliases: &IndexMap<FieldId, FieldId>,
    limits: OptimiserLimits,
) -> Result<(), CompileError> {
    let unmovable_count = var_info.values().filter(|v| v.unmovable).count();
    let budget = limits.max_locals.saturating_sub(2).saturating_sub(unmovable_count);

    let mut representatives: Vec<FieldId> = var_info
        .keys()
        .copied()
        .filter(|f| !aliases.contains_key(f))
        .collect();

    if representatives.len() <= budget {
        return Ok(());
    }

    // Least-used first: these are the cheapest to move off the fast path.
    representatives.sort_by_key(|f| var_info.get(f).map(|v| v.use_count).unwrap_or(0));

    let mut moved = 0usize;
    // 1-based (`original_source/luaconverter/optimiser.cpp:832`): slot 0 is
    // reserved as the "lives in its own local" sentinel, so the first
    // overflowed field takes array index 1.
    let mut next_slot = 1u32;
    for &field in &representatives {
        if representatives.len() - moved <= budget {
            break;
        }
        if !ctx.fields().get(field).origin.is_movable() {
            continue;
        }
        ctx.fields_mut().get_mut(field).set_overflow_slot(next_slot);
        next_slot += 1;
        moved += 1;
    }

    let remaining = representatives.len() - moved;
    if remaining > budget {
        return Err(CompileError::ResourceBudgetExceeded {
            locals: remaining,
            cap: budget,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ConversionContext;
    use pmml_core::{FieldOrigin, FieldType, OpType};

    use super::super::var_info::VarInfo;

    fn field_with_uses(ctx: &mut ConversionContext, name: &str, uses: u32) -> (FieldId, VarInfo) {
        let field = ctx.add_unscoped_field(name, FieldType::Number, OpType::Continuous, FieldOrigin::Temporary);
        (
            field,
            VarInfo {
                first_declared: Some(0),
                use_count: uses,
                last_used: Some(1),
                ..Default::default()
            },
        )
    }

    #[test]
    fn within_budget_does_nothing() {
        let mut ctx = ConversionContext::new();
        let mut info = VarInfoMap::new();
        for i in 0..5 {
            let (field, v) = field_with_uses(&mut ctx, &format!("v{i}"), 1);
            info.insert(field, v);
        }
        let limits = OptimiserLimits { max_locals: 20 };
        assert!(assign(&mut ctx, &info, &IndexMap::new(), limits).is_ok());
        for field in info.keys() {
            assert_eq!(ctx.fields().get(*field).overflow_slot(), None);
        }
    }

    #[test]
    fn over_budget_overflows_least_used_fields() {
        let mut ctx = ConversionContext::new();
        let mut info = VarInfoMap::new();
        let mut ids = Vec::new();
        for i in 0..6 {
            let (field, v) = field_with_uses(&mut ctx, &format!("v{i}"), (i + 1) as u32);
            info.insert(field, v);
            ids.push(field);
        }
        // budget = max_locals - 2 - unmovable(0) = 2
        let limits = OptimiserLimits { max_locals: 4 };
        assert!(assign(&mut ctx, &info, &IndexMap::new(), limits).is_ok());

        let overflowed = ids
            .iter()
            .filter(|f| ctx.fields().get(**f).overflow_slot().is_some())
            .count();
        assert_eq!(overflowed, 4);
        // the least-used field (v0, 1 use) must have been overflowed.
        assert!(ctx.fields().get(ids[0]).overflow_slot().is_some());
        // the most-used field (v5, 6 uses) must not have been.
        assert!(ctx.fields().get(ids[5]).overflow_slot().is_none());
    }
}
