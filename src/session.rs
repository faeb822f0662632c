//! Session-store accessor seam.
//!
//! The engine does not own a session store. When the effective session
//! switch for a request is on (entry override, else the global config), the
//! dispatcher invokes the registered provider once, before the handler
//! lifecycle runs. Providers typically restore a session from a cookie and
//! emit a `Set-Cookie` header through the context.

use crate::context::RequestContext;

pub trait SessionProvider: Send + Sync {
    /// Attach session state to the request. Called at most once per
    /// request, never concurrently for the same context.
    fn attach(&self, ctx: &mut RequestContext);
}
