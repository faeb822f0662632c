//! Route-pattern compiler.
//!
//! Turns a pattern string into an immutable, pre-compiled matcher. All
//! parsing and regex compilation happens here, once, at registration time;
//! the dispatch path only ever walks compiled segments.
//!
//! Segment grammar:
//!
//! - `admin` — literal, exact match
//! - `:name` — named capture, one or more non-slash characters
//! - `:name:int` / `:name:float` — named capture restricted to digits /
//!   decimal digits
//! - `:name(expr)` — named capture matching the embedded regex
//! - `cms_:id(.+)_:page(.+).html` — composite segment mixing literal text
//!   and several captures, compiled to one anchored regex
//! - `*` — wildcard, final segment only, captures the remainder of the
//!   path (one or more segments) under the reserved name `splat`

use regex::Regex;
use std::sync::Arc;

use crate::context::ParamVec;
use crate::errors::RegistrationError;

/// Reserved capture name for the wildcard remainder.
pub const SPLAT: &str = "splat";

/// One piece of a segment: literal text or a capture. The chunk list is
/// what reverse URL generation substitutes values into.
#[derive(Debug, Clone)]
pub(crate) enum Chunk {
    Lit(String),
    Cap(String),
}

/// Compiled matcher for a single path segment.
#[derive(Debug, Clone)]
pub(crate) enum SegmentMatcher {
    /// Exact string comparison
    Literal(String),
    /// Bare `:name`, any non-empty non-slash run
    Named(String),
    /// Anchored regex with one or more named groups, in group order
    Pattern { regex: Regex, names: Vec<String> },
    /// Trailing `*`
    Wildcard,
}

impl SegmentMatcher {
    /// Specificity rank ordering siblings in the tree:
    /// literal > named > regex > wildcard.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            SegmentMatcher::Literal(_) => 0,
            SegmentMatcher::Named(_) => 1,
            SegmentMatcher::Pattern { .. } => 2,
            SegmentMatcher::Wildcard => 3,
        }
    }

    /// Match one path segment, pushing any captures. Path segments are
    /// never empty (the splitter drops empty runs).
    pub(crate) fn match_into(&self, seg: &str, params: &mut ParamVec) -> bool {
        match self {
            SegmentMatcher::Literal(lit) => lit == seg,
            SegmentMatcher::Named(name) => {
                params.push((Arc::from(name.as_str()), seg.to_string()));
                true
            }
            SegmentMatcher::Pattern { regex, names } => match regex.captures(seg) {
                Some(caps) => {
                    for (i, name) in names.iter().enumerate() {
                        if let Some(m) = caps.get(i + 1) {
                            params.push((Arc::from(name.as_str()), m.as_str().to_string()));
                        }
                    }
                    true
                }
                None => false,
            },
            // Wildcards are consumed whole by the caller (the tree keeps
            // them in a separate slot and `matches` short-circuits them),
            // so a wildcard matcher never reaches per-segment matching.
            SegmentMatcher::Wildcard => false,
        }
    }
}

/// One compiled segment: the original text, its matcher, and its chunks.
#[derive(Debug, Clone)]
pub(crate) struct Segment {
    pub(crate) raw: String,
    pub(crate) matcher: SegmentMatcher,
    pub(crate) chunks: Vec<Chunk>,
}

/// An immutable, compiled route pattern.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
    param_names: Vec<String>,
    has_wildcard: bool,
}

impl RoutePattern {
    /// Compile a pattern string. Synchronous, registration-time only.
    pub fn compile(pattern: &str) -> Result<Self, RegistrationError> {
        let seg_texts: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
        let mut segments = Vec::with_capacity(seg_texts.len());
        let mut param_names: Vec<String> = Vec::new();
        let mut has_wildcard = false;

        for (idx, seg) in seg_texts.iter().enumerate() {
            let last = idx + 1 == seg_texts.len();
            let compiled = if *seg == "*" {
                if !last {
                    return Err(RegistrationError::WildcardNotLast {
                        pattern: pattern.to_string(),
                    });
                }
                has_wildcard = true;
                Segment {
                    raw: seg.to_string(),
                    matcher: SegmentMatcher::Wildcard,
                    chunks: vec![Chunk::Cap(SPLAT.to_string())],
                }
            } else if seg.contains('*') {
                return Err(RegistrationError::MalformedSegment {
                    pattern: pattern.to_string(),
                    segment: seg.to_string(),
                    reason: "'*' is only valid as a whole final segment".to_string(),
                });
            } else if seg.contains(':') {
                compile_segment(pattern, seg)?
            } else {
                Segment {
                    raw: seg.to_string(),
                    matcher: SegmentMatcher::Literal(seg.to_string()),
                    chunks: vec![Chunk::Lit(seg.to_string())],
                }
            };

            for chunk in &compiled.chunks {
                if let Chunk::Cap(name) = chunk {
                    if param_names.iter().any(|n| n.as_str() == name.as_str()) {
                        return Err(RegistrationError::DuplicateParam {
                            pattern: pattern.to_string(),
                            name: name.clone(),
                        });
                    }
                    param_names.push(name.clone());
                }
            }
            segments.push(compiled);
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
            param_names,
            has_wildcard,
        })
    }

    /// The original pattern text.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Declared capture names in pattern order (`splat` included for
    /// wildcard patterns).
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    pub fn has_wildcard(&self) -> bool {
        self.has_wildcard
    }

    pub(crate) fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Match a full path against this pattern, returning the captures.
    /// Segment counts must line up exactly; a wildcard consumes one or more
    /// remaining segments. Used for filter scopes, which share matcher
    /// semantics with routing.
    pub fn matches(&self, path: &str) -> Option<ParamVec> {
        let segs: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = ParamVec::new();
        let mut i = 0;
        for segment in &self.segments {
            if let SegmentMatcher::Wildcard = segment.matcher {
                if i >= segs.len() {
                    return None;
                }
                params.push((Arc::from(SPLAT), segs[i..].join("/")));
                return Some(params);
            }
            if i >= segs.len() || !segment.matcher.match_into(segs[i], &mut params) {
                return None;
            }
            i += 1;
        }
        (i == segs.len()).then_some(params)
    }

    /// Substitute values into the pattern text in pattern order. `None`
    /// when a declared capture has no supplied value. Keys are bare names.
    pub(crate) fn build(&self, values: &[(&str, &str)]) -> Option<String> {
        let lookup = |name: &str| {
            values
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| *v)
        };
        if self.segments.is_empty() {
            return Some("/".to_string());
        }
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            for chunk in &segment.chunks {
                match chunk {
                    Chunk::Lit(lit) => out.push_str(lit),
                    Chunk::Cap(name) => out.push_str(lookup(name)?),
                }
            }
        }
        Some(out)
    }
}

/// Compile one segment containing at least one `:` capture.
fn compile_segment(pattern: &str, seg: &str) -> Result<Segment, RegistrationError> {
    let bytes = seg.as_bytes();
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut exprs: Vec<Option<String>> = Vec::new();
    let mut lit_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b':' {
            i += 1;
            continue;
        }
        let name_start = i + 1;
        let mut j = name_start;
        while j < bytes.len() && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_') {
            j += 1;
        }
        if j == name_start {
            return Err(RegistrationError::MalformedSegment {
                pattern: pattern.to_string(),
                segment: seg.to_string(),
                reason: "':' must introduce a capture name".to_string(),
            });
        }
        let name = seg[name_start..j].to_string();
        let mut expr: Option<String> = None;

        if j < bytes.len() && bytes[j] == b'(' {
            let expr_start = j + 1;
            let mut depth = 1usize;
            let mut k = expr_start;
            while k < bytes.len() && depth > 0 {
                match bytes[k] {
                    b'(' => depth += 1,
                    b')' => depth -= 1,
                    _ => {}
                }
                k += 1;
            }
            if depth != 0 {
                return Err(RegistrationError::MalformedSegment {
                    pattern: pattern.to_string(),
                    segment: seg.to_string(),
                    reason: "unbalanced parentheses in capture expression".to_string(),
                });
            }
            expr = Some(seg[expr_start..k - 1].to_string());
            j = k;
        } else if j < bytes.len() && bytes[j] == b':' {
            // built-in typed captures; anything else after ':' starts a new capture
            let type_start = j + 1;
            let mut k = type_start;
            while k < bytes.len() && bytes[k].is_ascii_alphabetic() {
                k += 1;
            }
            match &seg[type_start..k] {
                "int" => {
                    expr = Some("[0-9]+".to_string());
                    j = k;
                }
                "float" => {
                    expr = Some("[0-9.]+".to_string());
                    j = k;
                }
                _ => {}
            }
        }

        if lit_start < i {
            chunks.push(Chunk::Lit(seg[lit_start..i].to_string()));
        }
        chunks.push(Chunk::Cap(name));
        exprs.push(expr);
        i = j;
        lit_start = j;
    }
    if lit_start < bytes.len() {
        chunks.push(Chunk::Lit(seg[lit_start..].to_string()));
    }

    // A lone default capture needs no regex at all.
    let caps: Vec<&String> = chunks
        .iter()
        .filter_map(|c| match c {
            Chunk::Cap(n) => Some(n),
            Chunk::Lit(_) => None,
        })
        .collect();
    let only_default_capture =
        chunks.len() == 1 && caps.len() == 1 && exprs.first().map_or(false, Option::is_none);
    if only_default_capture {
        let name = caps[0].clone();
        return Ok(Segment {
            raw: seg.to_string(),
            matcher: SegmentMatcher::Named(name),
            chunks,
        });
    }

    let mut regex_src = String::from("^");
    let mut names = Vec::with_capacity(caps.len());
    let mut expr_iter = exprs.into_iter();
    for chunk in &chunks {
        match chunk {
            Chunk::Lit(lit) => regex_src.push_str(&regex::escape(lit)),
            Chunk::Cap(name) => {
                let expr = expr_iter
                    .next()
                    .flatten()
                    .unwrap_or_else(|| "[^/]+".to_string());
                regex_src.push('(');
                regex_src.push_str(&expr);
                regex_src.push(')');
                names.push(name.clone());
            }
        }
    }
    regex_src.push('$');

    let regex = Regex::new(&regex_src).map_err(|e| RegistrationError::InvalidRegex {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;

    Ok(Segment {
        raw: seg.to_string(),
        matcher: SegmentMatcher::Pattern { regex, names },
        chunks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param<'a>(params: &'a ParamVec, name: &str) -> Option<&'a str> {
        params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_literal_pattern_matches_exactly() {
        let p = RoutePattern::compile("/api/list").unwrap();
        assert!(p.matches("/api/list").is_some());
        assert!(p.matches("/api/list/extra").is_none());
        assert!(p.matches("/api").is_none());
    }

    #[test]
    fn test_named_segments_capture_values() {
        let p = RoutePattern::compile("/person/:last/:first").unwrap();
        let params = p.matches("/person/xie/asta").unwrap();
        assert_eq!(param(&params, "last"), Some("xie"));
        assert_eq!(param(&params, "first"), Some("asta"));
    }

    #[test]
    fn test_typed_int_segment_rejects_non_digits() {
        let p = RoutePattern::compile("/:year:int/:month:int").unwrap();
        assert!(p.matches("/2009/11").is_some());
        assert!(p.matches("/nope/11").is_none());
    }

    #[test]
    fn test_composite_segment_extracts_all_captures() {
        let p = RoutePattern::compile("/item:id([0-9]+)-:page([0-9]+).html").unwrap();
        let params = p.matches("/item32-12.html").unwrap();
        assert_eq!(param(&params, "id"), Some("32"));
        assert_eq!(param(&params, "page"), Some("12"));
        assert!(p.matches("/item32-12.json").is_none());
    }

    #[test]
    fn test_composite_with_mixed_literals() {
        let p = RoutePattern::compile("/v1/:v/cms_:id(.+)_:page(.+).html").unwrap();
        let params = p.matches("/v1/za/cms_12_123.html").unwrap();
        assert_eq!(param(&params, "v"), Some("za"));
        assert_eq!(param(&params, "id"), Some("12"));
        assert_eq!(param(&params, "page"), Some("123"));
    }

    #[test]
    fn test_wildcard_captures_remainder_as_splat() {
        let p = RoutePattern::compile("/docs/*").unwrap();
        let params = p.matches("/docs/guides/intro").unwrap();
        assert_eq!(param(&params, "splat"), Some("guides/intro"));
        // one or more segments required
        assert!(p.matches("/docs").is_none());
    }

    #[test]
    fn test_wildcard_must_be_final() {
        let err = RoutePattern::compile("/a/*/b").unwrap_err();
        assert!(matches!(err, RegistrationError::WildcardNotLast { .. }));
    }

    #[test]
    fn test_duplicate_capture_rejected() {
        let err = RoutePattern::compile("/a/:id/:id").unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateParam { .. }));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let err = RoutePattern::compile("/a/:id([0-9+").unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::MalformedSegment { .. } | RegistrationError::InvalidRegex { .. }
        ));
    }

    #[test]
    fn test_unicode_capture_value() {
        let p = RoutePattern::compile("/search/:keyword(.+)").unwrap();
        let params = p.matches("/search/你好").unwrap();
        assert_eq!(param(&params, "keyword"), Some("你好"));
    }

    #[test]
    fn test_build_substitutes_in_pattern_order() {
        let p = RoutePattern::compile("/v1/:v/cms_:id(.+)_:page(.+).html").unwrap();
        let url = p
            .build(&[("v", "za"), ("id", "12"), ("page", "123")])
            .unwrap();
        assert_eq!(url, "/v1/za/cms_12_123.html");
    }

    #[test]
    fn test_build_missing_value_yields_none() {
        let p = RoutePattern::compile("/person/:last/:first").unwrap();
        assert!(p.build(&[("last", "xie")]).is_none());
    }

    #[test]
    fn test_param_names_in_pattern_order() {
        let p = RoutePattern::compile("/:a/x_:b(.+)/*").unwrap();
        assert_eq!(p.param_names(), &["a", "b", "splat"]);
    }
}
