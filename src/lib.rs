//! # Switchyard
//!
//! **Switchyard** is a coroutine-powered HTTP request-routing and
//! filter-pipeline dispatch engine for Rust: it maps an incoming
//! method+path to a handler through a compiled pattern tree, runs a staged,
//! short-circuitable filter pipeline around the invocation, and generates
//! URLs back from handler identifiers.
//!
//! ## Architecture
//!
//! - **[`router`]** — pattern compilation and the resolution tree (static,
//!   named, regex-constrained, typed, and wildcard segments; specificity
//!   ordering with registration-order tie breaks)
//! - **[`registry`]** — route and filter registration, convention routing,
//!   introspection, and the configurable error responders
//! - **[`filter`]** — the four-stage filter pipeline (BeforeRouter,
//!   BeforeExec, AfterExec, FinishRouter) with `return_on_output` and
//!   `reset_params` semantics
//! - **[`dispatcher`]** — end-to-end request orchestration with fault
//!   recovery and atomic dispatch counters
//! - **[`context`]** — the per-request abstraction: parameters, response
//!   sink, cancellation token
//! - **[`controller`]** — the handler protocol: free functions and
//!   controllers with lifecycle hooks and explicit method tables
//! - **[`server`]** — host adapter on `may_minihttp`
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use switchyard::prelude::*;
//!
//! let mut registry = ControllerRegistry::new();
//! registry
//!     .get("/person/:last/:first", |ctx| {
//!         let greeting = format!(
//!             "{} {}",
//!             ctx.param("first").unwrap_or(""),
//!             ctx.param("last").unwrap_or("")
//!         );
//!         ctx.write_str(&greeting);
//!     })
//!     .unwrap();
//!
//! let dispatcher = Dispatcher::new(Arc::new(registry), RuntimeConfig::default());
//! let mut ctx = RequestContext::new(http::Method::GET, "/person/xie/asta");
//! dispatcher.dispatch(&mut ctx);
//! assert_eq!(ctx.response().body(), b"asta xie");
//! ```
//!
//! Registration is setup-time work and returns `Result`; once a registry is
//! frozen behind an `Arc`, dispatch reads it without any locking, so
//! requests scale across `may` coroutines with no shared mutable state
//! beyond the atomic counters.

pub mod context;
pub mod controller;
pub mod dispatcher;
pub mod errors;
pub mod filter;
pub mod ids;
pub mod registry;
pub mod reverse;
pub mod router;
pub mod runtime_config;
pub mod server;
pub mod session;

pub use context::{CancelToken, RequestContext};
pub use controller::Controller;
pub use dispatcher::{DispatchMetrics, Dispatcher};
pub use errors::RegistrationError;
pub use filter::{ExecutionPoint, FilterOptions};
pub use registry::{ControllerRegistry, RouteInfo, RouteOptions};
pub use router::{Resolution, RoutePattern, RouteTree};
pub use runtime_config::RuntimeConfig;
pub use session::SessionProvider;

/// Convenience imports for applications.
pub mod prelude {
    pub use crate::context::RequestContext;
    pub use crate::controller::Controller;
    pub use crate::dispatcher::Dispatcher;
    pub use crate::errors::RegistrationError;
    pub use crate::filter::{ExecutionPoint, FilterOptions};
    pub use crate::registry::{ControllerRegistry, RouteOptions};
    pub use crate::runtime_config::RuntimeConfig;
}
