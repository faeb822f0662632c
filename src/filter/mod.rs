//! Staged filter pipeline.
//!
//! Filters run at four fixed execution points around handler invocation:
//! BeforeRouter (before path resolution), BeforeExec (parameters bound,
//! handler not yet run), AfterExec (handler done), FinishRouter (response
//! determined; always attempted). Within a point, filters run in
//! registration order.
//!
//! Two per-filter flags shape execution:
//!
//! - `return_on_output` (default on): if the response body has been written
//!   to — by an earlier filter, the handler, or an error responder — the
//!   filter is skipped and the rest of its point short-circuits. A
//!   short-circuit before the handler also skips the handler and every
//!   remaining pre-Finish point; FinishRouter still runs.
//! - `reset_params` (default off): the parameter table is snapshotted
//!   before the filter and restored after, so its parameter reads and
//!   writes are invisible to everything downstream.
//!
//! A filter's scope is `"*"` (all paths) or a route pattern with the same
//! matcher semantics as routing; a matching pattern scope binds its
//! captures into the context before the filter runs.

use tracing::debug;

use crate::context::RequestContext;
use crate::controller::FilterFn;
use crate::errors::RegistrationError;
use crate::router::pattern::RoutePattern;

/// The four pipeline stages, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionPoint {
    BeforeRouter,
    BeforeExec,
    AfterExec,
    FinishRouter,
}

impl ExecutionPoint {
    fn index(self) -> usize {
        match self {
            ExecutionPoint::BeforeRouter => 0,
            ExecutionPoint::BeforeExec => 1,
            ExecutionPoint::AfterExec => 2,
            ExecutionPoint::FinishRouter => 3,
        }
    }

    fn label(self) -> &'static str {
        match self {
            ExecutionPoint::BeforeRouter => "before_router",
            ExecutionPoint::BeforeExec => "before_exec",
            ExecutionPoint::AfterExec => "after_exec",
            ExecutionPoint::FinishRouter => "finish_router",
        }
    }
}

/// Per-filter flags. `return_on_output` defaults to on, `reset_params`
/// to off.
#[derive(Clone, Copy, Debug)]
pub struct FilterOptions {
    pub return_on_output: bool,
    pub reset_params: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            return_on_output: true,
            reset_params: false,
        }
    }
}

impl FilterOptions {
    pub fn return_on_output(mut self, value: bool) -> Self {
        self.return_on_output = value;
        self
    }

    pub fn reset_params(mut self, value: bool) -> Self {
        self.reset_params = value;
        self
    }
}

enum FilterScope {
    All,
    Pattern(RoutePattern),
}

struct FilterEntry {
    scope: FilterScope,
    filter: FilterFn,
    return_on_output: bool,
    reset_params: bool,
}

/// Flow signal from running one execution point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    ShortCircuit,
}

/// Ordered filter lists, one per execution point. Append-only during
/// setup, read-only during dispatch.
#[derive(Default)]
pub struct FilterChain {
    points: [Vec<FilterEntry>; 4],
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(
        &mut self,
        scope: &str,
        point: ExecutionPoint,
        filter: FilterFn,
        opts: FilterOptions,
    ) -> Result<(), RegistrationError> {
        let scope = if scope == "*" {
            FilterScope::All
        } else {
            FilterScope::Pattern(RoutePattern::compile(scope)?)
        };
        self.points[point.index()].push(FilterEntry {
            scope,
            filter,
            return_on_output: opts.return_on_output,
            reset_params: opts.reset_params,
        });
        Ok(())
    }

    /// Run one execution point against the context.
    pub(crate) fn run(&self, point: ExecutionPoint, ctx: &mut RequestContext) -> Flow {
        for (idx, entry) in self.points[point.index()].iter().enumerate() {
            if entry.return_on_output && ctx.output_started() {
                debug!(
                    request_id = %ctx.request_id,
                    point = point.label(),
                    filter_idx = idx,
                    "filter pipeline short-circuited on written output"
                );
                return Flow::ShortCircuit;
            }

            let scope_params = match &entry.scope {
                FilterScope::All => None,
                FilterScope::Pattern(pattern) => match pattern.matches(&ctx.path) {
                    Some(params) => Some(params),
                    None => continue,
                },
            };

            // snapshot before binding scope captures so those are rolled
            // back too
            let snapshot = entry.reset_params.then(|| ctx.params_snapshot());
            if let Some(params) = scope_params {
                ctx.extend_params(params);
            }

            (entry.filter)(ctx);

            if let Some(snapshot) = snapshot {
                ctx.restore_params(snapshot);
            }

            if entry.return_on_output && ctx.output_started() {
                debug!(
                    request_id = %ctx.request_id,
                    point = point.label(),
                    filter_idx = idx,
                    "filter wrote output, short-circuiting point"
                );
                return Flow::ShortCircuit;
            }
        }
        Flow::Continue
    }
}
