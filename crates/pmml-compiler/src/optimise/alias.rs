//! Alias pass (spec.md §4.6 pass 5): variables whose live ranges don't
//! overlap can share one local-variable slot. A greedy interval-scheduling
//! sweep, the same shape as a register allocator's linear scan.

use indexmap::IndexMap;

use pmml_core::FieldId;

use crate::context::ConversionContext;

use super::var_info::{VarInfo, VarInfoMap};

fn live_range(info: &VarInfo) -> Option<(u32, u32)> {
    let start = [info.first_declared, info.first_set, info.first_used]
        .into_iter()
        .flatten()
        .min()?;
    let end = [info.last_set, info.last_used]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(start);
    Some((start, end))
}

/// Returns a map from an aliased field to the representative field whose
/// slot it now shares. Fields absent from the map keep their own slot.
pub fn compute(ctx: &ConversionContext, var_info: &VarInfoMap) -> IndexMap<FieldId, FieldId> {
    let mut candidates: Vec<(FieldId, (u32, u32))> = var_info
        .iter()
        .filter(|(_, info)| !info.unmovable)
        .filter(|(&field, _)| ctx.fields().get(field).origin.is_movable())
        .filter_map(|(&field, info)| live_range(info).map(|range| (field, range)))
        .collect();
    candidates.sort_by_key(|&(_, (start, _))| start);

    let mut aliases = IndexMap::new();
    // (range end, representative field) for slots not currently live.
    let mut free: Vec<(u32, FieldId)> = Vec::new();

    for (field, (start, end)) in candidates {
        if let Some(pos) = free.iter().position(|&(free_end, _)| free_end <= start) {
            let (_, owner) = free.remove(pos);
            aliases.insert(field, owner);
            free.push((end, owner));
        } else {
            free.push((end, field));
        }
    }

    aliases
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ConversionContext;

    fn context_with_fields(n: usize) -> (ConversionContext, Vec<FieldId>) {
        use pmml_core::{FieldOrigin, FieldType, OpType};
        let mut ctx = ConversionContext::new();
        let fields = (0..n)
            .map(|i| {
                ctx.add_unscoped_field(
                    &format!("v{i}"),
                    FieldType::Number,
                    OpType::Continuous,
                    FieldOrigin::Temporary,
                )
            })
            .collect();
        (ctx, fields)
    }

    #[test]
    fn non_overlapping_ranges_share_a_slot() {
        let (ctx, fields) = context_with_fields(2);
        let mut info = VarInfoMap::new();
        info.insert(
            fields[0],
            VarInfo {
                first_declared: Some(0),
                last_used: Some(1),
                use_count: 1,
                ..Default::default()
            },
        );
        info.insert(
            fields[1],
            VarInfo {
                first_declared: Some(2),
                last_used: Some(3),
                use_count: 1,
                ..Default::default()
            },
        );

        let aliases = compute(&ctx, &info);
        assert_eq!(aliases.get(&fields[1]), Some(&fields[0]));
    }

    #[test]
    fn overlapping_ranges_are_not_aliased() {
        let (ctx, fields) = context_with_fields(2);
        let mut info = VarInfoMap::new();
        info.insert(
            fields[0],
            VarInfo {
                first_declared: Some(0),
                last_used: Some(5),
                use_count: 1,
                ..Default::default()
            },
        );
        info.insert(
            fields[1],
            VarInfo {
                first_declared: Some(1),
                last_used: Some(2),
                use_count: 1,
                ..Default::default()
            },
        );

        let aliases = compute(&ctx, &info);
        assert!(aliases.is_empty());
    }
}
