//! Handler protocol: free functions, bound controller methods, and the
//! verb/name method tables that select between them.
//!
//! There is no ambient reflection here. A controller exposes an explicit
//! method-name table; registration validates mappings against it eagerly,
//! and convention routing looks method names up in it case-insensitively.

use http::Method;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::errors::RegistrationError;

/// A handler captured as a plain function value.
pub type HandlerFn = Arc<dyn Fn(&mut RequestContext) + Send + Sync>;

/// A filter function; identical shape to a handler, distinct alias for
/// readability at registration sites.
pub type FilterFn = Arc<dyn Fn(&mut RequestContext) + Send + Sync>;

/// HTTP methods the engine routes. Anything else is rejected at
/// registration time.
pub(crate) const SUPPORTED_METHODS: [Method; 8] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
    Method::OPTIONS,
    Method::HEAD,
    Method::TRACE,
];

/// A request-handling type with lifecycle hooks and an explicit method
/// table.
///
/// `invoke` dispatches by method-name string; the names it accepts must be
/// listed in `method_names`, which is what registration validates mappings
/// against and what convention routing exposes as URLs. `prepare` runs
/// before the selected method; if it writes output the method is skipped.
/// `finish` always runs after.
pub trait Controller: Send + Sync {
    /// Type name used in handler identifiers (`"Name.Method"`) and as the
    /// first path segment under convention routing.
    fn name(&self) -> &'static str;

    /// The public, routable method names, in declaration order.
    fn method_names(&self) -> &'static [&'static str];

    /// Pre-hook; writing output here skips the method itself.
    fn prepare(&self, _ctx: &mut RequestContext) {}

    /// Post-hook; always runs once the method was selected.
    fn finish(&self, _ctx: &mut RequestContext) {}

    /// Run the named method. Called only with names from `method_names`.
    fn invoke(&self, method: &str, ctx: &mut RequestContext);
}

/// Resolve a method name from the controller's table, case-insensitively,
/// returning the canonical spelling.
pub(crate) fn canonical_method_name(ctrl: &dyn Controller, name: &str) -> Option<&'static str> {
    ctrl.method_names()
        .iter()
        .find(|m| m.eq_ignore_ascii_case(name))
        .copied()
}

/// Capitalized method name for an HTTP verb (`GET` → `Get`), the name verb
/// dispatch invokes on a controller.
pub(crate) fn verb_method_name(method: &Method) -> String {
    let verb = method.as_str();
    let mut out = String::with_capacity(verb.len());
    let mut chars = verb.chars();
    if let Some(first) = chars.next() {
        out.push(first.to_ascii_uppercase());
    }
    out.extend(chars.map(|c| c.to_ascii_lowercase()));
    out
}

/// How an entry maps HTTP methods to invocation targets.
#[derive(Clone, Debug)]
pub(crate) enum MethodSpec {
    /// Accept any method; a controller entry invokes the capitalized verb
    /// name (`Get`, `Post`, ...).
    Verb,
    /// Explicit mapping, in registration order. `None` keys accept any
    /// method (`"*"` in mapping strings).
    Map(Vec<(Option<Method>, String)>),
}

impl MethodSpec {
    pub(crate) fn accepts(&self, method: &Method) -> bool {
        match self {
            MethodSpec::Verb => true,
            MethodSpec::Map(entries) => entries
                .iter()
                .any(|(m, _)| m.as_ref().map_or(true, |m| m == method)),
        }
    }

    /// Controller method name for this request's verb: an exact verb match
    /// beats a `*` entry; verb dispatch returns the capitalized verb.
    pub(crate) fn method_for(&self, method: &Method) -> Option<String> {
        match self {
            MethodSpec::Verb => Some(verb_method_name(method)),
            MethodSpec::Map(entries) => entries
                .iter()
                .find(|(m, _)| m.as_ref() == Some(method))
                .or_else(|| entries.iter().find(|(m, _)| m.is_none()))
                .map(|(_, name)| name.clone()),
        }
    }

    /// Accepted methods for introspection; `None` means any.
    pub(crate) fn accepted(&self) -> Option<Vec<Method>> {
        match self {
            MethodSpec::Verb => None,
            MethodSpec::Map(entries) => {
                if entries.iter().any(|(m, _)| m.is_none()) {
                    return None;
                }
                let mut out = Vec::new();
                for (m, _) in entries {
                    let m = m.clone().expect("checked above");
                    if !out.contains(&m) {
                        out.push(m);
                    }
                }
                Some(out)
            }
        }
    }
}

/// Parse a mapping string of the form `"get:Index;post,put:Save;*:Any"`
/// and validate every target against the controller's method table.
pub(crate) fn parse_method_mapping(
    mapping: &str,
    ctrl: &dyn Controller,
) -> Result<MethodSpec, RegistrationError> {
    let mut entries = Vec::new();
    for item in mapping.split(';').filter(|s| !s.trim().is_empty()) {
        let (verbs, target) = item
            .split_once(':')
            .ok_or_else(|| RegistrationError::MalformedMethodMapping {
                mapping: item.to_string(),
            })?;
        let target = target.trim();
        let canonical = canonical_method_name(ctrl, target).ok_or_else(|| {
            RegistrationError::UnknownControllerMethod {
                controller: ctrl.name().to_string(),
                method: target.to_string(),
            }
        })?;
        for verb in verbs.split(',').map(str::trim) {
            if verb == "*" {
                entries.push((None, canonical.to_string()));
                continue;
            }
            let method = parse_http_method(verb)?;
            entries.push((Some(method), canonical.to_string()));
        }
    }
    if entries.is_empty() {
        return Err(RegistrationError::MalformedMethodMapping {
            mapping: mapping.to_string(),
        });
    }
    Ok(MethodSpec::Map(entries))
}

pub(crate) fn parse_http_method(verb: &str) -> Result<Method, RegistrationError> {
    let upper = verb.to_ascii_uppercase();
    SUPPORTED_METHODS
        .iter()
        .find(|m| m.as_str() == upper)
        .cloned()
        .ok_or_else(|| RegistrationError::InvalidMethod {
            method: verb.to_string(),
        })
}

/// Tagged handler variant: a free function or a bound controller method.
#[derive(Clone)]
pub(crate) enum RouteHandler {
    Func(HandlerFn),
    Controller(Arc<dyn Controller>),
}

impl std::fmt::Debug for RouteHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteHandler::Func(_) => f.write_str("Func"),
            RouteHandler::Controller(c) => write!(f, "Controller({})", c.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;

    impl Controller for Probe {
        fn name(&self) -> &'static str {
            "Probe"
        }
        fn method_names(&self) -> &'static [&'static str] {
            &["Get", "Save", "List"]
        }
        fn invoke(&self, _method: &str, _ctx: &mut RequestContext) {}
    }

    #[test]
    fn test_verb_method_name_capitalizes() {
        assert_eq!(verb_method_name(&Method::GET), "Get");
        assert_eq!(verb_method_name(&Method::DELETE), "Delete");
    }

    #[test]
    fn test_mapping_parses_multi_verb_items() {
        let spec = parse_method_mapping("get,post:Save;*:List", &Probe).unwrap();
        assert!(spec.accepts(&Method::PUT)); // via the * entry
        assert_eq!(spec.method_for(&Method::GET).as_deref(), Some("Save"));
        assert_eq!(spec.method_for(&Method::PUT).as_deref(), Some("List"));
    }

    #[test]
    fn test_mapping_is_case_insensitive_on_targets() {
        let spec = parse_method_mapping("get:save", &Probe).unwrap();
        assert_eq!(spec.method_for(&Method::GET).as_deref(), Some("Save"));
    }

    #[test]
    fn test_mapping_rejects_unknown_target() {
        let err = parse_method_mapping("get:Nope", &Probe).unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::UnknownControllerMethod { .. }
        ));
    }

    #[test]
    fn test_mapping_rejects_bad_verb() {
        let err = parse_method_mapping("fetch:Get", &Probe).unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidMethod { .. }));
    }
}
