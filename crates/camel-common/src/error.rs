//! Error types for the Camel integration operator
//!
//! Errors carry structured context (resource name, trait id, field path) so
//! that status conditions and logs point at the offending input. The
//! controller decides between requeue and terminal failure through
//! [`Error::is_retryable`].

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for operator operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Validation error for user input (trait configuration, mounts, dependencies)
    #[error("validation error for {resource}: {message}")]
    Validation {
        /// Name of the resource with invalid configuration
        resource: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "spec.traits.mount.configs")
        field: Option<String>,
    },

    /// A trait id that is not in the registry
    #[error("trait {trait_id} does not exist")]
    UnknownTrait {
        /// The trait id as written by the user
        trait_id: String,
    },

    /// A property that the trait does not declare
    #[error("trait {trait_id} has no property {property}")]
    UnknownTraitProperty {
        /// Trait owning the property
        trait_id: String,
        /// The unrecognized property name
        property: String,
    },

    /// A named object that is expected to exist but does not
    #[error("{kind} {name} not found")]
    NotFound {
        /// Kind of the missing object (e.g. "Deployment", "repository")
        kind: String,
        /// Name or identifier of the missing object
        name: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "deployer", "reconciler")
        context: String,
    },
}

/// How a call site treats a missing resource.
///
/// Whether NotFound degrades the integration or fails it depends on what is
/// missing, so every call site that inspects cluster state names its policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotFoundPolicy {
    /// The resource may come back (e.g. an imported deployment mid-rollout):
    /// degrade the phase and keep polling.
    Soft,
    /// The resource is required: the reconciliation fails.
    Hard,
}

/// Outcome of classifying an error against a [`NotFoundPolicy`]
#[derive(Debug)]
pub enum Classified {
    /// NotFound under [`NotFoundPolicy::Soft`]
    Missing,
    /// Any other error, or NotFound under [`NotFoundPolicy::Hard`]
    Failed(Error),
}

impl NotFoundPolicy {
    /// Classify an error according to this policy
    pub fn classify(self, err: Error) -> Classified {
        match self {
            NotFoundPolicy::Soft if err.is_not_found() => Classified::Missing,
            _ => Classified::Failed(err),
        }
    }
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            resource: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with resource context
    pub fn validation_for(resource: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            resource: resource.into(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with resource context and field path
    pub fn validation_for_field(
        resource: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            resource: resource.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create an unknown trait error
    pub fn unknown_trait(trait_id: impl Into<String>) -> Self {
        Self::UnknownTrait {
            trait_id: trait_id.into(),
        }
    }

    /// Create an unknown trait property error
    pub fn unknown_trait_property(trait_id: impl Into<String>, property: impl Into<String>) -> Self {
        Self::UnknownTraitProperty {
            trait_id: trait_id.into(),
            property: property.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Validation, property and serialization errors need a spec change.
    /// Kubernetes errors are retried unless the server answered with a 4xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code)
            ),
            Error::Validation { .. } => false,
            Error::UnknownTrait { .. } => false,
            Error::UnknownTraitProperty { .. } => false,
            Error::NotFound { .. } => false,
            Error::Serialization { .. } => false,
            Error::Internal { .. } => true,
        }
    }

    /// True for a 404 from the API server or an explicit [`Error::NotFound`]
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Kube {
                source: kube::Error::Api(ae),
            } => ae.code == 404,
            Error::NotFound { .. } => true,
            _ => false,
        }
    }

    /// True for a 409 AlreadyExists answer to a create
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            Error::Kube { source: kube::Error::Api(ae) }
                if ae.code == 409 && ae.reason == "AlreadyExists"
        )
    }

    /// True when the API server does not support the apply patch content type
    ///
    /// Detected by status code, or by message for proxies that rewrap the
    /// response.
    pub fn is_unsupported_media_type(&self) -> bool {
        match self {
            Error::Kube {
                source: kube::Error::Api(ae),
            } => ae.code == 415 || ae.message.contains("415: Unsupported Media Type"),
            Error::Kube { source } => source.to_string().contains("415: Unsupported Media Type"),
            _ => false,
        }
    }

    /// Get the resource name if this error is associated with a specific resource
    pub fn resource(&self) -> Option<&str> {
        match self {
            Error::Validation { resource, .. } => Some(resource),
            Error::NotFound { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Short machine-readable reason used in status conditions and events
    pub fn reason(&self) -> &'static str {
        match self {
            Error::Kube { .. } => "KubernetesError",
            Error::Validation { .. } => "ValidationFailed",
            Error::UnknownTrait { .. } | Error::UnknownTraitProperty { .. } => {
                "InvalidTraitConfiguration"
            }
            Error::NotFound { .. } => "NotFound",
            Error::Serialization { .. } => "SerializationFailed",
            Error::Internal { .. } => "InternalError",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::serialization(e.to_string())
    }
}
