//! Reverse URL generation.
//!
//! Builds a concrete path from a handler identifier and supplied parameter
//! values, reading the same entries the registry's route table holds —
//! independently of dispatch, so it is safe to call from handlers, filters,
//! or template code.

use tracing::debug;

use crate::registry::ControllerRegistry;

impl ControllerRegistry {
    /// Build a URL for a handler identifier (`"TypeName.MethodName"` for
    /// controller entries, the registered name for named functions).
    ///
    /// Keys may carry a leading `:`; it is stripped. The first-registered
    /// entry for the identifier whose declared captures are all supplied
    /// wins; its pattern text is rebuilt with the values substituted in
    /// pattern order. Extra keys are ignored. Returns an empty string when
    /// no entry is registered for the identifier or none has its captures
    /// satisfied — callers treat that as "cannot build URL", not an error.
    pub fn url_for(&self, ident: &str, params: &[(&str, &str)]) -> String {
        let normalized: Vec<(&str, &str)> = params
            .iter()
            .map(|(k, v)| (k.strip_prefix(':').unwrap_or(k), *v))
            .collect();

        let Some(entries) = self.reverse.get(ident) else {
            debug!(ident = ident, "url_for: unknown handler identifier");
            return String::new();
        };
        for entry in entries {
            let declared = entry.pattern().param_names();
            let satisfied = declared
                .iter()
                .all(|name| normalized.iter().any(|(k, _)| k == name));
            if !satisfied {
                continue;
            }
            if let Some(url) = entry.pattern().build(&normalized) {
                return url;
            }
        }
        debug!(ident = ident, "url_for: no entry satisfied by supplied params");
        String::new()
    }
}
