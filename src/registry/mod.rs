//! Controller registry: the owner of the route tree, the filter chain, the
//! reverse-lookup index, and the configurable error responders.
//!
//! A registry is an explicit object with ordinary construction — build one
//! per server (or per test), register everything, then freeze it behind an
//! `Arc` and hand it to a [`Dispatcher`](crate::dispatcher::Dispatcher).
//! There is no ambient global table. All registration calls return
//! `Result` so a bad pattern or mapping is caught before serving begins;
//! after setup the registry is only ever read.

use http::Method;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::context::RequestContext;
use crate::controller::{
    parse_method_mapping, verb_method_name, Controller, HandlerFn, MethodSpec, RouteHandler,
    SUPPORTED_METHODS,
};
use crate::errors::RegistrationError;
use crate::filter::{ExecutionPoint, FilterChain, FilterOptions};
use crate::router::tree::AutoGroup;
use crate::router::{Resolution, RouteEntry, RoutePattern, RouteTree};

/// Per-entry registration options for controller routes.
#[derive(Clone, Debug, Default)]
pub struct RouteOptions {
    methods: Option<String>,
    session_on: Option<bool>,
}

impl RouteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Method mapping string, e.g. `"get:Index"`, `"get,post:Save"`,
    /// `"*:Any"`. Without one the entry accepts every method and
    /// dispatches to the capitalized verb name (`Get`, `Post`, ...).
    pub fn methods(mut self, mapping: &str) -> Self {
        self.methods = Some(mapping.to_string());
        self
    }

    /// Per-entry session switch, overriding the global config for requests
    /// served by this entry only.
    pub fn session_on(mut self, on: bool) -> Self {
        self.session_on = Some(on);
        self
    }
}

/// Introspection record for one registered entry.
#[derive(Clone, Debug)]
pub struct RouteInfo {
    pub pattern: String,
    /// `"ANY"` or a comma-separated method list
    pub methods: String,
    /// Handler identifier, `"<fn>"` for anonymous functions
    pub handler: String,
}

/// Responders for recovered dispatch outcomes. Each writes a complete
/// response into the context; all are replaceable.
pub(crate) struct ErrorResponders {
    pub(crate) not_found: HandlerFn,
    pub(crate) method_not_allowed: HandlerFn,
    pub(crate) payload_too_large: HandlerFn,
    pub(crate) internal_error: HandlerFn,
}

impl Default for ErrorResponders {
    fn default() -> Self {
        Self {
            not_found: Arc::new(|ctx: &mut RequestContext| {
                let path = ctx.path.clone();
                ctx.write_json(404, &json!({ "error": "Not Found", "path": path }));
            }),
            method_not_allowed: Arc::new(|ctx: &mut RequestContext| {
                let method = ctx.method.to_string();
                ctx.write_json(405, &json!({ "error": "Method Not Allowed", "method": method }));
            }),
            payload_too_large: Arc::new(|ctx: &mut RequestContext| {
                ctx.write_json(413, &json!({ "error": "Request Entity Too Large" }));
            }),
            internal_error: Arc::new(|ctx: &mut RequestContext| {
                // drop any half-written handler output
                ctx.response_mut().reset();
                ctx.write_json(500, &json!({ "error": "Internal Server Error" }));
            }),
        }
    }
}

/// The registry. Append-only during setup, read-only during dispatch.
#[derive(Default)]
pub struct ControllerRegistry {
    tree: RouteTree,
    filters: FilterChain,
    /// Every entry in registration order, for introspection.
    entries: Vec<Arc<RouteEntry>>,
    /// Handler identifier → entries answering to it, registration order.
    pub(crate) reverse: HashMap<String, Vec<Arc<RouteEntry>>>,
    pub(crate) responders: ErrorResponders,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller under `pattern` with verb dispatch: any method
    /// is accepted and invokes the capitalized verb name on the controller.
    pub fn add(
        &mut self,
        pattern: &str,
        ctrl: Arc<dyn Controller>,
    ) -> Result<(), RegistrationError> {
        self.add_with_options(pattern, ctrl, RouteOptions::default())
    }

    /// Register a controller with explicit options (method mapping and/or
    /// per-entry session override).
    pub fn add_with_options(
        &mut self,
        pattern: &str,
        ctrl: Arc<dyn Controller>,
        opts: RouteOptions,
    ) -> Result<(), RegistrationError> {
        let pattern = RoutePattern::compile(pattern)?;
        let methods = match &opts.methods {
            Some(mapping) => parse_method_mapping(mapping, ctrl.as_ref())?,
            None => MethodSpec::Verb,
        };
        let idents = controller_idents(ctrl.as_ref(), &methods);
        let entry = Arc::new(RouteEntry {
            pattern,
            methods,
            handler: RouteHandler::Controller(ctrl),
            session_on: opts.session_on,
            idents,
        });
        self.register(entry);
        Ok(())
    }

    /// Register a free-function handler. `name` makes the entry reachable
    /// through `url_for`; `methods` of `None` accepts any method.
    pub fn add_fn<F>(
        &mut self,
        pattern: &str,
        name: Option<&str>,
        methods: Option<&[Method]>,
        handler: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        let pattern = RoutePattern::compile(pattern)?;
        let methods = match methods {
            None => MethodSpec::Map(vec![(None, String::new())]),
            Some(list) => MethodSpec::Map(
                list.iter()
                    .map(|m| (Some(m.clone()), String::new()))
                    .collect(),
            ),
        };
        let entry = Arc::new(RouteEntry {
            pattern,
            methods,
            handler: RouteHandler::Func(Arc::new(handler)),
            session_on: None,
            idents: name.map(str::to_string).into_iter().collect(),
        });
        self.register(entry);
        Ok(())
    }

    pub fn get<F>(&mut self, pattern: &str, f: F) -> Result<(), RegistrationError>
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        self.add_fn(pattern, None, Some(&[Method::GET]), f)
    }

    pub fn post<F>(&mut self, pattern: &str, f: F) -> Result<(), RegistrationError>
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        self.add_fn(pattern, None, Some(&[Method::POST]), f)
    }

    pub fn put<F>(&mut self, pattern: &str, f: F) -> Result<(), RegistrationError>
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        self.add_fn(pattern, None, Some(&[Method::PUT]), f)
    }

    pub fn delete<F>(&mut self, pattern: &str, f: F) -> Result<(), RegistrationError>
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        self.add_fn(pattern, None, Some(&[Method::DELETE]), f)
    }

    pub fn patch<F>(&mut self, pattern: &str, f: F) -> Result<(), RegistrationError>
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        self.add_fn(pattern, None, Some(&[Method::PATCH]), f)
    }

    pub fn head<F>(&mut self, pattern: &str, f: F) -> Result<(), RegistrationError>
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        self.add_fn(pattern, None, Some(&[Method::HEAD]), f)
    }

    pub fn options<F>(&mut self, pattern: &str, f: F) -> Result<(), RegistrationError>
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        self.add_fn(pattern, None, Some(&[Method::OPTIONS]), f)
    }

    pub fn any<F>(&mut self, pattern: &str, f: F) -> Result<(), RegistrationError>
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        self.add_fn(pattern, None, None, f)
    }

    /// Register a controller under convention routing:
    /// `/<typename>/<methodname>[/args...]`, both segments matched
    /// case-insensitively, extra segments bound positionally.
    pub fn add_auto(&mut self, ctrl: Arc<dyn Controller>) -> Result<(), RegistrationError> {
        self.add_auto_prefix("", ctrl)
    }

    /// Convention routing under a literal path prefix.
    pub fn add_auto_prefix(
        &mut self,
        prefix: &str,
        ctrl: Arc<dyn Controller>,
    ) -> Result<(), RegistrationError> {
        let mut group = AutoGroup::new(prefix, &ctrl);
        for method in ctrl.method_names() {
            let lower_method = method.to_ascii_lowercase();
            let mut pattern_text = String::new();
            for seg in &group.prefix_segs {
                pattern_text.push('/');
                pattern_text.push_str(seg);
            }
            pattern_text.push('/');
            pattern_text.push_str(&group.lower_name);
            pattern_text.push('/');
            pattern_text.push_str(&lower_method);

            let pattern = RoutePattern::compile(&pattern_text)?;
            let entry = Arc::new(RouteEntry {
                pattern,
                methods: MethodSpec::Map(vec![(None, method.to_string())]),
                handler: RouteHandler::Controller(ctrl.clone()),
                session_on: None,
                idents: vec![format!("{}.{}", ctrl.name(), method)],
            });
            // reverse index and introspection only; matching goes through
            // the case-insensitive fallthrough, not the tree
            for ident in &entry.idents {
                self.reverse
                    .entry(ident.clone())
                    .or_default()
                    .push(entry.clone());
            }
            self.entries.push(entry.clone());
            group.entries.push((lower_method, entry));
        }
        info!(
            controller = ctrl.name(),
            prefix = prefix,
            methods = group.entries.len(),
            "convention routes registered"
        );
        self.tree.insert_auto(group);
        Ok(())
    }

    /// Register a filter at an execution point. Scope is `"*"` or a route
    /// pattern matched with routing semantics.
    pub fn insert_filter<F>(
        &mut self,
        scope: &str,
        point: ExecutionPoint,
        filter: F,
        opts: FilterOptions,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        self.filters.insert(scope, point, Arc::new(filter), opts)
    }

    pub fn set_not_found_handler<F>(&mut self, f: F)
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        self.responders.not_found = Arc::new(f);
    }

    pub fn set_method_not_allowed_handler<F>(&mut self, f: F)
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        self.responders.method_not_allowed = Arc::new(f);
    }

    pub fn set_payload_too_large_handler<F>(&mut self, f: F)
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        self.responders.payload_too_large = Arc::new(f);
    }

    pub fn set_internal_error_handler<F>(&mut self, f: F)
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        self.responders.internal_error = Arc::new(f);
    }

    /// Resolve a (method, path) pair against the route table.
    pub fn resolve(&self, method: &Method, path: &str) -> Resolution {
        self.tree.resolve(method, path)
    }

    pub(crate) fn filters(&self) -> &FilterChain {
        &self.filters
    }

    /// Enumerate every registered entry for diagnostics or documentation.
    pub fn routes(&self) -> Vec<RouteInfo> {
        self.entries
            .iter()
            .map(|entry| RouteInfo {
                pattern: entry.pattern().raw().to_string(),
                methods: match entry.accepted_methods() {
                    None => "ANY".to_string(),
                    Some(methods) => methods
                        .iter()
                        .map(Method::as_str)
                        .collect::<Vec<_>>()
                        .join(","),
                },
                handler: entry.ident().unwrap_or("<fn>").to_string(),
            })
            .collect()
    }

    fn register(&mut self, entry: Arc<RouteEntry>) {
        info!(
            pattern = entry.pattern().raw(),
            handler = entry.ident().unwrap_or("<fn>"),
            "route registered"
        );
        self.tree.insert(entry.clone());
        for ident in &entry.idents {
            self.reverse
                .entry(ident.clone())
                .or_default()
                .push(entry.clone());
        }
        self.entries.push(entry);
    }
}

/// Reverse-lookup identifiers a controller entry answers to. Verb-dispatch
/// entries answer for every verb-named method; mapped entries answer for
/// each mapping target.
fn controller_idents(ctrl: &dyn Controller, methods: &MethodSpec) -> Vec<String> {
    let mut idents = Vec::new();
    match methods {
        MethodSpec::Verb => {
            for method in &SUPPORTED_METHODS {
                idents.push(format!("{}.{}", ctrl.name(), verb_method_name(method)));
            }
        }
        MethodSpec::Map(entries) => {
            for (_, target) in entries {
                let ident = format!("{}.{}", ctrl.name(), target);
                if !idents.contains(&ident) {
                    idents.push(ident);
                }
            }
        }
    }
    idents
}
