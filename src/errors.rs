//! Setup-time error type.
//!
//! [`RegistrationError`] is the single error returned by all registration
//! and pattern-compilation entry points. Every variant corresponds to a
//! concrete misconfiguration detected while a registry is being built;
//! once a registry is frozen behind an `Arc` no further errors of this
//! kind are possible. The enum is a plain hand-rolled error (std only),
//! with `Display` and `std::error::Error` so callers can bubble it through
//! `anyhow` or `Box<dyn Error>`.

use std::error::Error;
use std::fmt;

/// An error raised while registering routes, filters, or controllers.
#[derive(Debug)]
pub enum RegistrationError {
    /// A regex-constrained capture failed to compile.
    InvalidRegex { pattern: String, reason: String },
    /// A segment could not be parsed into a matcher.
    MalformedSegment {
        pattern: String,
        segment: String,
        reason: String,
    },
    /// The same capture name appeared twice in one pattern.
    DuplicateParam { pattern: String, name: String },
    /// A `*` wildcard segment was not the final segment.
    WildcardNotLast { pattern: String },
    /// An HTTP method token was not recognized.
    InvalidMethod { method: String },
    /// A controller method-table mapping entry was malformed.
    MalformedMethodMapping { mapping: String },
    /// A mapping referenced a method the controller does not expose.
    UnknownControllerMethod { controller: String, method: String },
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::InvalidRegex { pattern, reason } => {
                write!(f, "invalid regex in pattern `{pattern}`: {reason}")
            }
            RegistrationError::MalformedSegment {
                pattern,
                segment,
                reason,
            } => write!(
                f,
                "malformed segment `{segment}` in pattern `{pattern}`: {reason}"
            ),
            RegistrationError::DuplicateParam { pattern, name } => {
                write!(f, "duplicate capture `{name}` in pattern `{pattern}`")
            }
            RegistrationError::WildcardNotLast { pattern } => {
                write!(f, "wildcard `*` must be the final segment in pattern `{pattern}`")
            }
            RegistrationError::InvalidMethod { method } => {
                write!(f, "unrecognized HTTP method `{method}`")
            }
            RegistrationError::MalformedMethodMapping { mapping } => {
                write!(f, "malformed method mapping `{mapping}`")
            }
            RegistrationError::UnknownControllerMethod { controller, method } => {
                write!(
                    f,
                    "controller `{controller}` has no method `{method}`"
                )
            }
        }
    }
}

impl Error for RegistrationError {}
