//! Route resolution tree.
//!
//! Dispatch walks one tree level per path segment: literal children first
//! (exact map lookup), then pattern children ordered by specificity and
//! registration, then the wildcard child. The first full match of the
//! remaining path wins; among siblings of equal specificity the
//! first-registered entry wins ties. There is no global best-match search
//! and no trailing-slash normalization.
//!
//! The tree also owns the convention-routing fallthrough table: when no
//! explicit entry matches, the first path segment is looked up
//! case-insensitively as a controller name and the second as one of its
//! method names.

use http::Method;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::context::ParamVec;
use crate::controller::{Controller, MethodSpec, RouteHandler};
use crate::router::pattern::{RoutePattern, Segment, SegmentMatcher, SPLAT};

/// Extensions recognized on a final path segment; the suffix is stripped
/// for literal lookup and bound (without the dot) under `ext`.
pub(crate) const ALLOW_SUFFIX_EXT: [&str; 3] = [".json", ".xml", ".html"];

/// A registered route: compiled pattern, accepted methods, handler, and
/// per-entry options. Immutable once registered.
pub struct RouteEntry {
    pub(crate) pattern: RoutePattern,
    pub(crate) methods: MethodSpec,
    pub(crate) handler: RouteHandler,
    /// Per-entry session switch override; `None` defers to the global
    /// config for this request.
    pub(crate) session_on: Option<bool>,
    /// Reverse-lookup identifiers this entry answers to.
    pub(crate) idents: Vec<String>,
}

impl RouteEntry {
    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    /// Accepted methods for introspection; `None` means any.
    pub fn accepted_methods(&self) -> Option<Vec<Method>> {
        self.methods.accepted()
    }

    /// Primary identifier for diagnostics (`"Type.Method"` or a registered
    /// function name).
    pub fn ident(&self) -> Option<&str> {
        self.idents.first().map(String::as_str)
    }
}

impl std::fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteEntry")
            .field("pattern", &self.pattern.raw())
            .field("handler", &self.handler)
            .finish()
    }
}

/// Outcome of route resolution. NotFound and MethodNotAllowed are distinct
/// so the dispatcher can map them to different responses.
pub enum Resolution {
    Found {
        entry: Arc<RouteEntry>,
        params: ParamVec,
    },
    MethodNotAllowed,
    NotFound,
}

/// Pattern child of a node: a named/regex segment matcher plus subtree.
/// Children keep (specificity, registration) order; equal specificity
/// resolves by registration order, first wins.
struct PatternChild {
    raw: String,
    matcher: SegmentMatcher,
    rank: u8,
    node: RouteNode,
}

#[derive(Default)]
struct RouteNode {
    literal: HashMap<String, RouteNode>,
    patterns: Vec<PatternChild>,
    /// Terminal wildcard child; consumes all remaining segments.
    wildcard: Option<Box<RouteNode>>,
    entries: Vec<Arc<RouteEntry>>,
}

impl RouteNode {
    fn insert(&mut self, segments: &[Segment], entry: Arc<RouteEntry>) {
        let Some((segment, rest)) = segments.split_first() else {
            self.entries.push(entry);
            return;
        };
        match &segment.matcher {
            SegmentMatcher::Literal(lit) => {
                self.literal
                    .entry(lit.clone())
                    .or_default()
                    .insert(rest, entry);
            }
            SegmentMatcher::Wildcard => {
                self.wildcard
                    .get_or_insert_with(Default::default)
                    .insert(rest, entry);
            }
            SegmentMatcher::Named(_) | SegmentMatcher::Pattern { .. } => {
                let pos = match self.patterns.iter().position(|c| c.raw == segment.raw) {
                    Some(pos) => pos,
                    None => {
                        // keep (specificity, registration) order: a new
                        // child goes after the last of equal or lower rank
                        let rank = segment.matcher.rank();
                        let at = self
                            .patterns
                            .iter()
                            .position(|c| c.rank > rank)
                            .unwrap_or(self.patterns.len());
                        self.patterns.insert(
                            at,
                            PatternChild {
                                raw: segment.raw.clone(),
                                matcher: segment.matcher.clone(),
                                rank,
                                node: RouteNode::default(),
                            },
                        );
                        at
                    }
                };
                self.patterns[pos].node.insert(rest, entry);
            }
        }
    }
}

/// Convention-routing group: one controller registered under a prefix,
/// resolved case-insensitively with positional fallthrough parameters.
pub(crate) struct AutoGroup {
    pub(crate) prefix_segs: Vec<String>,
    pub(crate) lower_name: String,
    /// (lowercase method name, synthesized entry), declaration order.
    pub(crate) entries: Vec<(String, Arc<RouteEntry>)>,
}

impl AutoGroup {
    pub(crate) fn new(prefix: &str, ctrl: &Arc<dyn Controller>) -> Self {
        let prefix_segs = prefix
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            prefix_segs,
            lower_name: ctrl.name().to_ascii_lowercase(),
            entries: Vec::new(),
        }
    }
}

/// The route table: explicit pattern tree plus the convention fallthrough
/// list. Built append-only during setup, read-only during dispatch.
#[derive(Default)]
pub struct RouteTree {
    root: RouteNode,
    autos: Vec<AutoGroup>,
}

impl RouteTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, entry: Arc<RouteEntry>) {
        let segments = entry.pattern.segments().to_vec();
        self.root.insert(&segments, entry);
    }

    pub(crate) fn insert_auto(&mut self, group: AutoGroup) {
        self.autos.push(group);
    }

    /// Resolve (method, path) against the table.
    pub fn resolve(&self, method: &Method, path: &str) -> Resolution {
        let segs: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = ParamVec::new();
        let mut method_miss = false;

        if let Some(entry) = search(&self.root, &segs, method, &mut params, &mut method_miss) {
            debug!(path = %path, pattern = %entry.pattern.raw(), "route matched");
            return Resolution::Found { entry, params };
        }
        if let Some((entry, params)) = self.resolve_auto(&segs) {
            debug!(path = %path, pattern = %entry.pattern.raw(), "route matched by convention");
            return Resolution::Found { entry, params };
        }
        if method_miss {
            Resolution::MethodNotAllowed
        } else {
            Resolution::NotFound
        }
    }

    fn resolve_auto(&self, segs: &[&str]) -> Option<(Arc<RouteEntry>, ParamVec)> {
        for group in &self.autos {
            let p = group.prefix_segs.len();
            if segs.len() < p + 2 {
                continue;
            }
            if !segs[..p]
                .iter()
                .zip(&group.prefix_segs)
                .all(|(got, want)| got == want)
            {
                continue;
            }
            if !segs[p].eq_ignore_ascii_case(&group.lower_name) {
                continue;
            }
            let mut method_seg = segs[p + 1];
            let mut ext: Option<&str> = None;
            if segs.len() == p + 2 {
                for suffix in ALLOW_SUFFIX_EXT {
                    if let Some(stripped) = method_seg.strip_suffix(suffix) {
                        method_seg = stripped;
                        ext = Some(&suffix[1..]);
                        break;
                    }
                }
            }
            let Some((_, entry)) = group
                .entries
                .iter()
                .find(|(lower, _)| method_seg.eq_ignore_ascii_case(lower))
            else {
                continue;
            };
            let mut params = ParamVec::new();
            let remaining = &segs[p + 2..];
            if !remaining.is_empty() {
                params.push((Arc::from(SPLAT), remaining.join("/")));
            }
            if let Some(ext) = ext {
                params.push((Arc::from("ext"), ext.to_string()));
            }
            return Some((entry.clone(), params));
        }
        None
    }
}

fn search(
    node: &RouteNode,
    segs: &[&str],
    method: &Method,
    params: &mut ParamVec,
    method_miss: &mut bool,
) -> Option<Arc<RouteEntry>> {
    if segs.is_empty() {
        for entry in &node.entries {
            if entry.methods.accepts(method) {
                return Some(entry.clone());
            }
        }
        if !node.entries.is_empty() {
            // path matched, method did not; keep searching siblings
            *method_miss = true;
        }
        return None;
    }

    let seg = segs[0];
    let rest = &segs[1..];

    if let Some(child) = node.literal.get(seg) {
        if let Some(entry) = search(child, rest, method, params, method_miss) {
            return Some(entry);
        }
    }

    // recognized-extension retry, final segment only
    if rest.is_empty() {
        for suffix in ALLOW_SUFFIX_EXT {
            if let Some(stripped) = seg.strip_suffix(suffix) {
                if !stripped.is_empty() {
                    if let Some(child) = node.literal.get(stripped) {
                        if let Some(entry) = search(child, rest, method, params, method_miss) {
                            params.push((Arc::from("ext"), suffix[1..].to_string()));
                            return Some(entry);
                        }
                    }
                }
            }
        }
    }

    for child in &node.patterns {
        let before = params.len();
        if child.matcher.match_into(seg, params) {
            if let Some(entry) = search(&child.node, rest, method, params, method_miss) {
                return Some(entry);
            }
        }
        params.truncate(before);
    }

    if let Some(wild) = &node.wildcard {
        for entry in &wild.entries {
            if entry.methods.accepts(method) {
                params.push((Arc::from(SPLAT), segs.join("/")));
                return Some(entry.clone());
            }
        }
        if !wild.entries.is_empty() {
            *method_miss = true;
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::controller::HandlerFn;

    fn noop() -> HandlerFn {
        Arc::new(|_ctx: &mut RequestContext| {})
    }

    fn entry(pattern: &str, methods: MethodSpec) -> Arc<RouteEntry> {
        Arc::new(RouteEntry {
            pattern: RoutePattern::compile(pattern).unwrap(),
            methods,
            handler: RouteHandler::Func(noop()),
            session_on: None,
            idents: vec![pattern.to_string()],
        })
    }

    fn get_only() -> MethodSpec {
        MethodSpec::Map(vec![(Some(Method::GET), String::new())])
    }

    fn any() -> MethodSpec {
        MethodSpec::Map(vec![(None, String::new())])
    }

    fn param<'a>(params: &'a ParamVec, name: &str) -> Option<&'a str> {
        params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    fn resolve_ok(tree: &RouteTree, method: Method, path: &str) -> (Arc<RouteEntry>, ParamVec) {
        match tree.resolve(&method, path) {
            Resolution::Found { entry, params } => (entry, params),
            Resolution::MethodNotAllowed => panic!("unexpected 405 for {path}"),
            Resolution::NotFound => panic!("unexpected 404 for {path}"),
        }
    }

    #[test]
    fn test_literal_beats_named_beats_regex_beats_wildcard() {
        let mut tree = RouteTree::new();
        tree.insert(entry("/x/*", any()));
        tree.insert(entry("/x/:id([a-z]+)", any()));
        tree.insert(entry("/x/:name", any()));
        tree.insert(entry("/x/fixed", any()));

        let (e, _) = resolve_ok(&tree, Method::GET, "/x/fixed");
        assert_eq!(e.pattern.raw(), "/x/fixed");

        // named outranks regex despite later registration order above
        let (e, params) = resolve_ok(&tree, Method::GET, "/x/abc");
        assert_eq!(e.pattern.raw(), "/x/:name");
        assert_eq!(param(&params, "name"), Some("abc"));

        let (e, params) = resolve_ok(&tree, Method::GET, "/x/a/b");
        assert_eq!(e.pattern.raw(), "/x/*");
        assert_eq!(param(&params, "splat"), Some("a/b"));
    }

    #[test]
    fn test_equal_specificity_first_registered_wins() {
        let mut tree = RouteTree::new();
        tree.insert(entry("/y/:a([0-9]+)", any()));
        tree.insert(entry("/y/:b([0-9x]+)", any()));

        let (e, params) = resolve_ok(&tree, Method::GET, "/y/42");
        assert_eq!(e.pattern.raw(), "/y/:a([0-9]+)");
        assert_eq!(param(&params, "a"), Some("42"));

        // only the second pattern accepts 'x'
        let (e, _) = resolve_ok(&tree, Method::GET, "/y/4x2");
        assert_eq!(e.pattern.raw(), "/y/:b([0-9x]+)");
    }

    #[test]
    fn test_method_not_allowed_distinct_from_not_found() {
        let mut tree = RouteTree::new();
        tree.insert(entry("/items", get_only()));

        assert!(matches!(
            tree.resolve(&Method::POST, "/items"),
            Resolution::MethodNotAllowed
        ));
        assert!(matches!(
            tree.resolve(&Method::GET, "/nothing"),
            Resolution::NotFound
        ));
    }

    #[test]
    fn test_method_mismatch_still_tries_later_siblings() {
        let mut tree = RouteTree::new();
        tree.insert(entry("/z/:a([0-9]+)", get_only()));
        tree.insert(entry("/z/:b([0-9]+)", MethodSpec::Map(vec![(Some(Method::POST), String::new())])));

        let (e, _) = resolve_ok(&tree, Method::POST, "/z/7");
        assert_eq!(e.pattern.raw(), "/z/:b([0-9]+)");
    }

    #[test]
    fn test_no_trailing_slash_normalization() {
        let mut tree = RouteTree::new();
        tree.insert(entry("/a/b", any()));
        // "/a/b/" splits to the same two segments; "/a/b/c" must not match
        assert!(matches!(
            tree.resolve(&Method::GET, "/a/b/c"),
            Resolution::NotFound
        ));
        assert!(matches!(
            tree.resolve(&Method::GET, "/a"),
            Resolution::NotFound
        ));
    }

    #[test]
    fn test_recognized_extension_binds_ext() {
        let mut tree = RouteTree::new();
        tree.insert(entry("/report/summary", any()));

        let (e, params) = resolve_ok(&tree, Method::GET, "/report/summary.json");
        assert_eq!(e.pattern.raw(), "/report/summary");
        assert_eq!(param(&params, "ext"), Some("json"));

        assert!(matches!(
            tree.resolve(&Method::GET, "/report/summary.csv"),
            Resolution::NotFound
        ));
    }

    #[test]
    fn test_wildcard_requires_at_least_one_segment() {
        let mut tree = RouteTree::new();
        tree.insert(entry("/files/*", any()));
        assert!(matches!(
            tree.resolve(&Method::GET, "/files"),
            Resolution::NotFound
        ));
        let (_, params) = resolve_ok(&tree, Method::GET, "/files/a/b/c");
        assert_eq!(param(&params, "splat"), Some("a/b/c"));
    }

    #[test]
    fn test_backtracking_restores_params() {
        let mut tree = RouteTree::new();
        // the named branch dead-ends at depth 2; the match must come from
        // the wildcard with no leftover "id" binding
        tree.insert(entry("/p/:id/edit", any()));
        tree.insert(entry("/p/*", any()));

        let (e, params) = resolve_ok(&tree, Method::GET, "/p/9/view");
        assert_eq!(e.pattern.raw(), "/p/*");
        assert_eq!(param(&params, "id"), None);
        assert_eq!(param(&params, "splat"), Some("9/view"));
    }
}
