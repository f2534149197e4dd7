//! Error taxonomy for proxy compilation, construction and dispatch.
//!
//! Every failure is returned synchronously to the immediate caller. Nothing
//! here is logged-and-swallowed, and no cache ever retains a failed result.

use thiserror::Error;

/// Error type returned by classification handlers, verifiers and callbacks.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias used throughout the crate.
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Errors that can occur while compiling, instantiating or invoking a proxy.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The base behavior type exposes no constructor for the requested
    /// argument shape. Caller configuration error, never retried.
    #[error("Construction contract violation: `{owner}` has no constructor accepting ({signature})")]
    ConstructionContractViolation {
        /// Type whose constructor was requested.
        owner: String,
        /// Rendered argument signature that could not be matched.
        signature: String,
    },

    /// An intercepted operation matched no classification and the base
    /// behavior provides no default for it.
    #[error("Operation `{operation}` on `{proxy}` matched no method classification")]
    UnclassifiedOperation {
        /// Name of the generated proxy type.
        proxy: String,
        /// Rendered operation signature.
        operation: String,
    },

    /// Proxy state rejected by the recipe's verifier.
    #[error("Invalid proxy state: {0}")]
    InvalidProxyState(String),

    /// The implementation backend could not produce a live instance.
    #[error("Cannot materialize `{spec}`: {message}")]
    MaterializationFailure {
        /// Name of the dispatch specification.
        spec: String,
        /// What went wrong.
        message: String,
        /// Originating cause, if any.
        #[source]
        source: Option<HandlerError>,
    },

    /// The capability set is malformed (empty, misplaced base behavior, ...).
    #[error("Invalid capability set: {0}")]
    InvalidCapabilitySet(String),

    /// No operation with the given name and arity exists on the instance.
    #[error("No operation `{operation}` taking {arity} argument(s) on `{proxy}`")]
    UnknownOperation {
        /// Name of the generated proxy type.
        proxy: String,
        /// Requested operation name.
        operation: String,
        /// Number of supplied arguments.
        arity: usize,
    },

    /// An operation was invoked before the dispatcher was bound, i.e. from
    /// inside the post-construction callback.
    #[error("Operation `{operation}` invoked before the proxy finished construction")]
    NotYetBound {
        /// Requested operation name.
        operation: String,
    },

    /// A proxy token references a recipe with no registered factory.
    #[error("No deserialization factory registered for recipe `{0}`")]
    UnknownRecipe(String),

    /// The handler, callback or default implementation itself failed.
    #[error("Handler of `{operation}` failed: {source}")]
    Handler {
        /// Rendered operation signature (or callback name).
        operation: String,
        /// Failure returned by the handler.
        #[source]
        source: HandlerError,
    },

    /// JSON (de)serialization of proxy state failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing of a config or contract definition failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// File I/O error while loading a config or contract definition.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProxyError {
    /// Build a [`ProxyError::Handler`] for the given operation.
    pub fn handler(operation: impl Into<String>, source: HandlerError) -> Self {
        Self::Handler {
            operation: operation.into(),
            source,
        }
    }

    /// Build a [`ProxyError::MaterializationFailure`] without a cause.
    pub fn materialization(spec: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MaterializationFailure {
            spec: spec.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Whether repeating the same call could succeed without a configuration
    /// change. Only handler failures qualify; every other kind is
    /// deterministic for the given inputs.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Handler { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProxyError::UnclassifiedOperation {
            proxy: "Greeter_1".into(),
            operation: "farewell() -> string".into(),
        };
        assert_eq!(
            err.to_string(),
            "Operation `farewell() -> string` on `Greeter_1` matched no method classification"
        );
    }

    #[test]
    fn test_materialization_failure_keeps_source() {
        let err = ProxyError::MaterializationFailure {
            spec: "Greeter_1".into(),
            message: "conflict".into(),
            source: Some("backend offline".into()),
        };
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "backend offline");
    }

    #[test]
    fn test_only_handler_errors_are_retryable() {
        assert!(ProxyError::handler("greet", "boom".into()).is_retryable());
        assert!(!ProxyError::InvalidProxyState("wrong type".into()).is_retryable());
        assert!(!ProxyError::ConstructionContractViolation {
            owner: "Base".into(),
            signature: "i64".into(),
        }
        .is_retryable());
    }
}
