use thiserror::Error;

/// Errors raised while translating one declared object.
///
/// Every variant is fatal for the item being translated; the engine records
/// it and moves on to the next item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    /// A reference value is syntactically unusable (e.g. a relative `bigip`).
    #[error("invalid reference {reference}: {reason}")]
    InvalidReference { reference: String, reason: String },
    /// A `use` pointer names nothing in the declaration.
    #[error("unable to resolve reference {reference} from {scope}")]
    UnresolvedReference { reference: String, scope: String },
    /// A chain of pointers revisits itself.
    #[error("reference cycle detected at {0}")]
    ReferenceCycle(String),
    /// The pointer resolves to an object of the wrong class.
    #[error("reference {reference} points at a {found}, expected {expected}")]
    WrongClass {
        reference: String,
        found: String,
        expected: String,
    },
    /// Input combination the translator cannot express.
    #[error("{path}: {message}")]
    InvalidDeclaration { path: String, message: String },
    /// The target version does not support a declared feature.
    #[error("{path}: {feature} requires target version {min} or later (target is {target})")]
    UnsupportedVersion {
        path: String,
        feature: String,
        min: String,
        target: String,
    },
}

impl TranslateError {
    pub(crate) fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDeclaration {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TranslateError>;
