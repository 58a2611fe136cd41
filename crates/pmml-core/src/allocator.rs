//! The scoped-name allocator (spec.md §3 "Scoped-name allocator"):
//! sanitises a requested PMML identifier into a valid target-language name
//! and guarantees the result is unique within the compilation.

use std::collections::HashSet;

/// Sanitise a name for emission: non-alphanumerics become `_`; a leading
/// digit is prefixed with `_` (target identifiers may not start with a
/// digit).
fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 1);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_alphanumeric() || ch == '_' {
            if i == 0 && ch.is_ascii_digit() {
                out.push('_');
            }
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() {
        out.push('_');
    }
    out
}

/// Allocates unique, sanitised identifiers within one compilation. Every
/// registration is injective (spec.md §8, testable property 4): two
/// distinct registrations, however named, yield distinct emitted
/// identifiers.
#[derive(Debug, Default)]
pub struct NameAllocator {
    used: HashSet<String>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self {
            used: HashSet::new(),
        }
    }

    /// Allocate a unique emitted name for `requested`. Collisions are
    /// resolved by appending `_N`, trying the lowest unused `N` in order.
    pub fn allocate(&mut self, requested: &str) -> String {
        let base = sanitize(requested);
        if self.used.insert(base.clone()) {
            return base;
        }
        let mut n: u64 = 1;
        loop {
            let candidate = format!("{base}_{n}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[cfg(test)]
mod allocator_tests {
    use super::*;

    #[test]
    fn sanitizes_non_alphanumeric() {
        let mut alloc = NameAllocator::new();
        assert_eq!(alloc.allocate("my field!"), "my_field_");
    }

    #[test]
    fn prefixes_leading_digit() {
        let mut alloc = NameAllocator::new();
        assert_eq!(alloc.allocate("3rdField"), "_3rdField");
    }

    #[test]
    fn resolves_collisions_lowest_unused() {
        let mut alloc = NameAllocator::new();
        assert_eq!(alloc.allocate("x"), "x");
        assert_eq!(alloc.allocate("x"), "x_1");
        assert_eq!(alloc.allocate("x"), "x_2");
    }

    #[test]
    fn collision_resolution_skips_preexisting_suffix() {
        let mut alloc = NameAllocator::new();
        assert_eq!(alloc.allocate("x_1"), "x_1");
        assert_eq!(alloc.allocate("x"), "x");
        // x_1 is already taken, so the next collision on "x" must skip to x_2.
        assert_eq!(alloc.allocate("x"), "x_2");
    }

    #[test]
    fn is_injective_across_many_registrations() {
        let mut alloc = NameAllocator::new();
        let mut seen = HashSet::new();
        for name in ["a b", "a.b", "a-b", "a b", "a_b"] {
            let emitted = alloc.allocate(name);
            assert!(seen.insert(emitted), "allocator produced a duplicate name");
        }
    }
}
