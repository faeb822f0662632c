//! Request dispatcher: one request end to end.
//!
//! The dispatcher owns nothing mutable but its atomic counters. It reads
//! the frozen registry (`Arc`, no locks on the dispatch path), runs the
//! filter pipeline around route resolution and handler invocation, and
//! recovers every per-request failure — not-found, method-not-allowed,
//! payload-too-large, handler panics — into a response while the process
//! keeps serving.
//!
//! Handlers run inline on the request's coroutine under `catch_unwind`;
//! concurrency comes from the host running each request on its own `may`
//! coroutine. Because no lock is held anywhere in `dispatch`, a handler is
//! free to block on I/O.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::context::RequestContext;
use crate::controller::{canonical_method_name, RouteHandler};
use crate::filter::{ExecutionPoint, Flow};
use crate::registry::ControllerRegistry;
use crate::router::tree::RouteEntry;
use crate::router::{Resolution, SPLAT};
use crate::runtime_config::RuntimeConfig;
use crate::session::SessionProvider;

/// Process-wide dispatch counters, updated atomically, readable at any
/// time for diagnostics or a metrics endpoint.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    requests: AtomicU64,
    not_found: AtomicU64,
    method_not_allowed: AtomicU64,
    payload_too_large: AtomicU64,
    handler_faults: AtomicU64,
}

impl DispatchMetrics {
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn not_found(&self) -> u64 {
        self.not_found.load(Ordering::Relaxed)
    }

    pub fn method_not_allowed(&self) -> u64 {
        self.method_not_allowed.load(Ordering::Relaxed)
    }

    pub fn payload_too_large(&self) -> u64 {
        self.payload_too_large.load(Ordering::Relaxed)
    }

    pub fn handler_faults(&self) -> u64 {
        self.handler_faults.load(Ordering::Relaxed)
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// The dispatcher. Cheap to clone via `Arc` in the host service.
pub struct Dispatcher {
    registry: Arc<ControllerRegistry>,
    config: RuntimeConfig,
    session: Option<Arc<dyn SessionProvider>>,
    metrics: DispatchMetrics,
}

impl Dispatcher {
    pub fn new(registry: Arc<ControllerRegistry>, config: RuntimeConfig) -> Self {
        Self {
            registry,
            config,
            session: None,
            metrics: DispatchMetrics::default(),
        }
    }

    /// Install the session accessor invoked when the effective session
    /// switch for a request is on.
    pub fn set_session_provider(&mut self, provider: Arc<dyn SessionProvider>) {
        self.session = Some(provider);
    }

    pub fn metrics(&self) -> &DispatchMetrics {
        &self.metrics
    }

    pub fn registry(&self) -> &ControllerRegistry {
        &self.registry
    }

    /// Serve one request. The context arrives parsed and leaves with the
    /// complete response buffered in its sink.
    pub fn dispatch(&self, ctx: &mut RequestContext) {
        DispatchMetrics::bump(&self.metrics.requests);
        let start = Instant::now();
        debug!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            path = %ctx.path,
            "dispatch start"
        );

        // body ceiling first: an oversized payload never reaches a filter
        // or handler
        if self.config.copy_request_body {
            if let Some(body) = ctx.body() {
                if body.len() > self.config.max_memory {
                    DispatchMetrics::bump(&self.metrics.payload_too_large);
                    warn!(
                        request_id = %ctx.request_id,
                        body_bytes = body.len(),
                        max_memory = self.config.max_memory,
                        "request body over limit, rejecting"
                    );
                    (self.registry.responders.payload_too_large)(ctx);
                    return;
                }
            }
        }

        let filters = self.registry.filters();
        let mut short = filters.run(ExecutionPoint::BeforeRouter, ctx) == Flow::ShortCircuit;

        let mut resolved: Option<Arc<RouteEntry>> = None;
        if !short {
            let method = ctx.method.clone();
            let path = ctx.path.clone();
            match self.registry.resolve(&method, &path) {
                Resolution::Found { entry, params } => {
                    ctx.extend_params(params);
                    bind_positional_params(ctx);
                    resolved = Some(entry);
                }
                Resolution::NotFound => {
                    DispatchMetrics::bump(&self.metrics.not_found);
                    info!(request_id = %ctx.request_id, path = %path, "no route matched");
                    (self.registry.responders.not_found)(ctx);
                }
                Resolution::MethodNotAllowed => {
                    DispatchMetrics::bump(&self.metrics.method_not_allowed);
                    info!(
                        request_id = %ctx.request_id,
                        method = %method,
                        path = %path,
                        "path matched but method not accepted"
                    );
                    (self.registry.responders.method_not_allowed)(ctx);
                }
            }
        }

        if let Some(entry) = resolved {
            if filters.run(ExecutionPoint::BeforeExec, ctx) == Flow::ShortCircuit {
                short = true;
            }
            if !short {
                self.invoke_handler(&entry, ctx);
                filters.run(ExecutionPoint::AfterExec, ctx);
            }
        }

        // FinishRouter always runs once the pipeline was entered,
        // short-circuits and recovered errors included
        filters.run(ExecutionPoint::FinishRouter, ctx);

        info!(
            request_id = %ctx.request_id,
            status = ctx.response().status(),
            latency_us = start.elapsed().as_micros() as u64,
            "dispatch complete"
        );
    }

    fn invoke_handler(&self, entry: &Arc<RouteEntry>, ctx: &mut RequestContext) {
        // per-entry override beats the global switch, for this request only
        let session_on = entry.session_on.unwrap_or(self.config.session_on);
        ctx.session_on = session_on;
        if session_on {
            if let Some(provider) = &self.session {
                provider.attach(ctx);
            }
        }

        let outcome = match &entry.handler {
            RouteHandler::Func(f) => {
                let f = f.clone();
                catch_unwind(AssertUnwindSafe(|| f(ctx)))
            }
            RouteHandler::Controller(ctrl) => {
                let Some(target) = entry.methods.method_for(&ctx.method) else {
                    DispatchMetrics::bump(&self.metrics.method_not_allowed);
                    (self.registry.responders.method_not_allowed)(ctx);
                    return;
                };
                // verb dispatch may name a method the controller lacks
                let Some(target) = canonical_method_name(ctrl.as_ref(), &target) else {
                    DispatchMetrics::bump(&self.metrics.method_not_allowed);
                    debug!(
                        request_id = %ctx.request_id,
                        controller = ctrl.name(),
                        method = %target,
                        "controller has no method for verb"
                    );
                    (self.registry.responders.method_not_allowed)(ctx);
                    return;
                };
                let ctrl = ctrl.clone();
                catch_unwind(AssertUnwindSafe(|| {
                    ctrl.prepare(ctx);
                    // a pre-hook that writes output skips the method itself
                    if !ctx.output_started() {
                        ctrl.invoke(target, ctx);
                    }
                    ctrl.finish(ctx);
                }))
            }
        };

        if let Err(panic) = outcome {
            DispatchMetrics::bump(&self.metrics.handler_faults);
            let panic_message = panic_text(&panic);
            error!(
                request_id = %ctx.request_id,
                path = %ctx.path,
                panic_message = %panic_message,
                "handler panicked, recovering"
            );
            (self.registry.responders.internal_error)(ctx);
        }
    }
}

/// Split the wildcard remainder into positional parameters `"0"`, `"1"`, …
/// so convention-routed methods can read their arguments by index.
fn bind_positional_params(ctx: &mut RequestContext) {
    let Some(splat) = ctx.param(SPLAT).map(str::to_string) else {
        return;
    };
    for (idx, value) in splat.split('/').enumerate() {
        ctx.set_param(&idx.to_string(), value);
    }
}

fn panic_text(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
