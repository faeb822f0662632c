//! Route patterns and the resolution tree.
//!
//! [`pattern`] compiles route strings into immutable matchers at
//! registration time; [`tree`] resolves (method, path) pairs against them
//! at dispatch time. Both are read-only once setup completes, so dispatch
//! reads them without locks.

pub mod pattern;
pub mod tree;

pub use pattern::{RoutePattern, SPLAT};
pub use tree::{Resolution, RouteEntry, RouteTree};
