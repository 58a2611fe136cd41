//! Semantic analysis (spec.md §4.4): an `AnalyserContext` plus one or more
//! assumption-stack guards layered on top of it, answering two questions
//! the emitter needs at every node — might this be missing, and is this
//! trivially true/false given what's already known.

mod assumption;
mod context;
mod guard;
mod iterator;
mod queries;

#[cfg(test)]
mod queries_tests;

pub use assumption::Assumption;
pub use context::AnalyserContext;
pub use guard::{register_assertions, AssertionIntersection, NonNullAssumptionGuard, Registered};
pub use iterator::ChildAssertionIterator;
pub use queries::{check_if_trivial, might_be_missing, Trivial};
