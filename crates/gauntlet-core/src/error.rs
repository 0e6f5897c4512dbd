//! Error taxonomy for the engine.
//!
//! `Failure` is the payload type for "a body or hook threw": test bodies and
//! hooks report failures as `Failure` values (or by panicking, which the
//! engine converts into one). `EngineError` classifies how an item failed so
//! reporters can distinguish a timeout from a thrown error or a misused
//! completion callback.

use std::any::Any;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::hooks::HookKind;

/// A captured failure value from a test body, hook or suite body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Failure {
    message: String,
}

impl Failure {
    /// Create a failure from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Convert a caught panic payload into a failure.
    ///
    /// Panic payloads are almost always `&str` or `String`; anything else is
    /// reported with a placeholder message.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panicked with a non-string payload".to_string()
        };
        Self { message }
    }
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for Failure {
    fn from(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// What kind of registration call was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationKind {
    Suite,
    Test,
    Hook,
}

impl fmt::Display for RegistrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suite => write!(f, "suite"),
            Self::Test => write!(f, "test"),
            Self::Hook => write!(f, "hook"),
        }
    }
}

/// How a completion callback was misused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneMisuse {
    /// The completion callback was invoked more than once.
    CalledTwice,
    /// The body returned a future and also invoked its completion callback.
    CombinedWithFuture,
}

impl fmt::Display for DoneMisuse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CalledTwice => write!(f, "completion callback invoked more than once"),
            Self::CombinedWithFuture => {
                write!(f, "body returned a future and invoked its completion callback")
            }
        }
    }
}

/// Classified failure of a single collected or executed item.
///
/// Every variant is contained to the item it names: the run always continues
/// to the next sibling and finishes with a summary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A suite body threw while the tree was being collected.
    #[error("uncaught error while collecting suite '{suite}': {source}")]
    Collection {
        suite: String,
        #[source]
        source: Failure,
    },

    /// A registration call was made outside the collection phase.
    #[error("{what} registered outside the collection phase")]
    RegistrationOutOfPhase { what: RegistrationKind },

    /// A hook threw, rejected or was abandoned.
    #[error("{kind} hook failed in '{scope}': {source}")]
    Hook {
        scope: String,
        kind: HookKind,
        #[source]
        source: Failure,
    },

    /// A test body threw or rejected.
    #[error("test body failed: {source}")]
    TestBody {
        #[source]
        source: Failure,
    },

    /// A body or hook did not settle within its time limit.
    #[error("timed out after {}ms", .limit.as_millis())]
    Timeout { limit: Duration },

    /// A completion callback was misused.
    #[error("done callback misused: {0}")]
    DoneCallbackMisuse(DoneMisuse),
}

impl EngineError {
    /// Whether this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_from_panic_str() {
        let failure = Failure::from_panic(Box::new("boom"));
        assert_eq!(failure.message(), "boom");
    }

    #[test]
    fn test_failure_from_panic_string() {
        let failure = Failure::from_panic(Box::new("kaboom".to_string()));
        assert_eq!(failure.message(), "kaboom");
    }

    #[test]
    fn test_failure_from_panic_other_payload() {
        let failure = Failure::from_panic(Box::new(42u32));
        assert_eq!(failure.message(), "panicked with a non-string payload");
    }

    #[test]
    fn test_timeout_display_in_millis() {
        let err = EngineError::Timeout {
            limit: Duration::from_millis(50),
        };
        assert_eq!(err.to_string(), "timed out after 50ms");
        assert!(err.is_timeout());
    }

    #[test]
    fn test_hook_error_names_scope_and_kind() {
        let err = EngineError::Hook {
            scope: "outer > inner".to_string(),
            kind: HookKind::BeforeAll,
            source: Failure::new("db unreachable"),
        };
        assert_eq!(
            err.to_string(),
            "beforeAll hook failed in 'outer > inner': db unreachable"
        );
    }
}
