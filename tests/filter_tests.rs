//! Filter pipeline behavior through full dispatch: execution points,
//! short-circuiting, parameter isolation, and the always-run FinishRouter
//! stage.

use std::sync::{Arc, Mutex};
use switchyard::prelude::*;

mod tracing_util;
use tracing_util::TestTracing;

/// Shared trace of what ran, in order.
type Trace = Arc<Mutex<Vec<&'static str>>>;

fn trace() -> Trace {
    Arc::new(Mutex::new(Vec::new()))
}

fn record(trace: &Trace, tag: &'static str) {
    trace.lock().unwrap().push(tag);
}

fn dispatch(dispatcher: &Dispatcher, path: &str) -> RequestContext {
    let mut ctx = RequestContext::new(http::Method::GET, path);
    dispatcher.dispatch(&mut ctx);
    ctx
}

#[test]
fn test_all_points_run_in_order_around_handler() {
    let _tracing = TestTracing::init();
    let log = trace();
    let mut registry = ControllerRegistry::new();
    for (point, tag) in [
        (ExecutionPoint::BeforeRouter, "before_router"),
        (ExecutionPoint::BeforeExec, "before_exec"),
        (ExecutionPoint::AfterExec, "after_exec"),
        (ExecutionPoint::FinishRouter, "finish_router"),
    ] {
        let log = log.clone();
        registry
            .insert_filter(
                "*",
                point,
                move |_ctx| record(&log, tag),
                FilterOptions::default().return_on_output(false),
            )
            .unwrap();
    }
    {
        let log = log.clone();
        registry
            .get("/flow", move |ctx| {
                record(&log, "handler");
                ctx.write_str("hello");
            })
            .unwrap();
    }

    let dispatcher = Dispatcher::new(Arc::new(registry), RuntimeConfig::default());
    dispatch(&dispatcher, "/flow");
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "before_router",
            "before_exec",
            "handler",
            "after_exec",
            "finish_router"
        ]
    );
}

#[test]
fn test_before_router_output_short_circuits_to_finish() {
    let _tracing = TestTracing::init();
    let log = trace();
    let mut registry = ControllerRegistry::new();
    {
        let log = log.clone();
        registry
            .insert_filter(
                "*",
                ExecutionPoint::BeforeRouter,
                move |ctx| {
                    record(&log, "gate");
                    ctx.write_str("blocked");
                },
                FilterOptions::default(),
            )
            .unwrap();
    }
    for (point, tag) in [
        (ExecutionPoint::BeforeExec, "before_exec"),
        (ExecutionPoint::AfterExec, "after_exec"),
    ] {
        let log = log.clone();
        registry
            .insert_filter(
                "*",
                point,
                move |_ctx| record(&log, tag),
                FilterOptions::default().return_on_output(false),
            )
            .unwrap();
    }
    {
        let log = log.clone();
        registry
            .insert_filter(
                "*",
                ExecutionPoint::FinishRouter,
                move |_ctx| record(&log, "finish_router"),
                FilterOptions::default().return_on_output(false),
            )
            .unwrap();
    }
    {
        let log = log.clone();
        registry
            .get("/gated", move |_ctx| record(&log, "handler"))
            .unwrap();
    }

    let dispatcher = Dispatcher::new(Arc::new(registry), RuntimeConfig::default());
    let ctx = dispatch(&dispatcher, "/gated");

    // handler and the pre-Finish points never ran; FinishRouter still did
    assert_eq!(*log.lock().unwrap(), vec!["gate", "finish_router"]);
    assert_eq!(ctx.response().body(), b"blocked");
}

#[test]
fn test_short_circuit_skips_rest_of_same_point() {
    let _tracing = TestTracing::init();
    let log = trace();
    let mut registry = ControllerRegistry::new();
    {
        let log = log.clone();
        registry
            .insert_filter(
                "*",
                ExecutionPoint::BeforeRouter,
                move |ctx| {
                    record(&log, "writer");
                    ctx.write_str("x");
                },
                FilterOptions::default(),
            )
            .unwrap();
    }
    {
        let log = log.clone();
        registry
            .insert_filter(
                "*",
                ExecutionPoint::BeforeRouter,
                move |_ctx| record(&log, "after_writer"),
                FilterOptions::default(),
            )
            .unwrap();
    }
    registry.get("/p", |_ctx| {}).unwrap();

    let dispatcher = Dispatcher::new(Arc::new(registry), RuntimeConfig::default());
    dispatch(&dispatcher, "/p");
    assert_eq!(*log.lock().unwrap(), vec!["writer"]);
}

#[test]
fn test_reset_params_invisible_to_handler() {
    let _tracing = TestTracing::init();
    let mut registry = ControllerRegistry::new();
    registry
        .insert_filter(
            "*",
            ExecutionPoint::BeforeExec,
            |ctx| {
                // visible to this filter only
                ctx.set_param("splat", "mutated/by/filter");
            },
            FilterOptions::default().reset_params(true),
        )
        .unwrap();
    registry
        .get("/beams/*", |ctx| {
            let splat = ctx.param("splat").unwrap_or("").to_string();
            ctx.set_header("Splat", splat);
            ctx.write_str("done");
        })
        .unwrap();

    let dispatcher = Dispatcher::new(Arc::new(registry), RuntimeConfig::default());
    let ctx = dispatch(&dispatcher, "/beams/routes/routes");
    assert_eq!(ctx.response().header("Splat"), Some("routes/routes"));
}

#[test]
fn test_mutation_without_reset_is_visible() {
    let _tracing = TestTracing::init();
    let mut registry = ControllerRegistry::new();
    registry
        .insert_filter(
            "*",
            ExecutionPoint::BeforeExec,
            |ctx| ctx.set_param("who", "filter"),
            FilterOptions::default(),
        )
        .unwrap();
    registry
        .get("/w/:who", |ctx| {
            let who = ctx.param("who").unwrap_or("").to_string();
            ctx.write_str(&who);
        })
        .unwrap();

    let dispatcher = Dispatcher::new(Arc::new(registry), RuntimeConfig::default());
    let ctx = dispatch(&dispatcher, "/w/route");
    assert_eq!(ctx.response().body(), b"filter");
}

#[test]
fn test_finish_router_default_flag_skips_after_output() {
    let _tracing = TestTracing::init();
    let log = trace();
    let mut registry = ControllerRegistry::new();
    {
        let log = log.clone();
        registry
            .insert_filter(
                "*",
                ExecutionPoint::FinishRouter,
                move |_ctx| record(&log, "finish_one"),
                FilterOptions::default().return_on_output(false),
            )
            .unwrap();
    }
    {
        let log = log.clone();
        // default return_on_output=true: skipped because the handler wrote
        registry
            .insert_filter(
                "*",
                ExecutionPoint::FinishRouter,
                move |_ctx| record(&log, "finish_two"),
                FilterOptions::default(),
            )
            .unwrap();
    }
    registry.get("/f", |ctx| ctx.write_str("hello")).unwrap();

    let dispatcher = Dispatcher::new(Arc::new(registry), RuntimeConfig::default());
    dispatch(&dispatcher, "/f");
    assert_eq!(*log.lock().unwrap(), vec!["finish_one"]);
}

#[test]
fn test_finish_router_runs_after_not_found() {
    let _tracing = TestTracing::init();
    let log = trace();
    let mut registry = ControllerRegistry::new();
    {
        let log = log.clone();
        registry
            .insert_filter(
                "*",
                ExecutionPoint::FinishRouter,
                move |_ctx| record(&log, "finish"),
                FilterOptions::default().return_on_output(false),
            )
            .unwrap();
    }

    let dispatcher = Dispatcher::new(Arc::new(registry), RuntimeConfig::default());
    let ctx = dispatch(&dispatcher, "/missing");
    assert_eq!(ctx.response().status(), 404);
    assert_eq!(*log.lock().unwrap(), vec!["finish"]);
}

#[test]
fn test_scoped_filter_only_runs_on_matching_path() {
    let _tracing = TestTracing::init();
    let log = trace();
    let mut registry = ControllerRegistry::new();
    {
        let log = log.clone();
        registry
            .insert_filter(
                "/admin/*",
                ExecutionPoint::BeforeExec,
                move |_ctx| record(&log, "admin_filter"),
                FilterOptions::default(),
            )
            .unwrap();
    }
    registry.get("/admin/panel", |ctx| ctx.write_str("a")).unwrap();
    registry.get("/public", |ctx| ctx.write_str("p")).unwrap();

    let dispatcher = Dispatcher::new(Arc::new(registry), RuntimeConfig::default());
    dispatch(&dispatcher, "/public");
    assert!(log.lock().unwrap().is_empty());
    dispatch(&dispatcher, "/admin/panel");
    assert_eq!(*log.lock().unwrap(), vec!["admin_filter"]);
}
