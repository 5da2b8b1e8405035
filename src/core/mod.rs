//! In-memory authoritative document store and query evaluation.

/// Collection queries: filter, ordering, and stable tie-breaks.
pub mod query;
/// Authoritative document collections.
pub mod store;
