//! Error taxonomy for layout mutations, navigation and capability lookup.
//!
//! Structural and input validation failures are returned synchronously from
//! the mutating call that caused them. Capability failures that surface while
//! routing are not errors at all: the element renders a "not found" state and
//! the runtime logs a warning instead.

use std::fmt;

/// Stable error discriminator used in logs and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or contradictory caller input.
    IllegalArgument,
    /// Attempted structural invariant violation.
    IllegalState,
    /// Caller holds no intention for the requested capability.
    NotQualified,
    /// No provider serves the requested capability.
    NullProvider,
    /// Referenced capability is unknown or not visible to the caller.
    NullCapability,
    /// Referenced element is closed or was never created.
    NullView,
    /// Supplied params violate the capability's param contract.
    IntentParamValidation,
    /// Persisted layout document could not be read.
    Persistence,
    /// Configuration could not be loaded or is inconsistent.
    Config,
}

impl ErrorKind {
    /// Name used in log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IllegalArgument => "IllegalArgumentError",
            Self::IllegalState => "IllegalStateError",
            Self::NotQualified => "NotQualifiedError",
            Self::NullProvider => "NullProviderError",
            Self::NullCapability => "NullCapabilityError",
            Self::NullView => "NullViewError",
            Self::IntentParamValidation => "IntentParamValidationError",
            Self::Persistence => "PersistenceError",
            Self::Config => "ConfigError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised by workbench operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkbenchError {
    IllegalArgument { message: String },
    IllegalState { message: String },
    NotQualified { app: String, message: String },
    NullProvider { message: String },
    NullCapability { message: String },
    NullView { id: String },
    IntentParamValidation { capability_id: String, message: String },
    Persistence { message: String },
    Config { message: String },
}

/// Result alias used across the workbench crates.
pub type WorkbenchResult<T> = Result<T, WorkbenchError>;

impl WorkbenchError {
    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::IllegalArgument {
            message: message.into(),
        }
    }

    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    pub fn not_qualified(app: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotQualified {
            app: app.into(),
            message: message.into(),
        }
    }

    pub fn null_provider(message: impl Into<String>) -> Self {
        Self::NullProvider {
            message: message.into(),
        }
    }

    pub fn null_capability(message: impl Into<String>) -> Self {
        Self::NullCapability {
            message: message.into(),
        }
    }

    pub fn null_view(id: impl Into<String>) -> Self {
        Self::NullView { id: id.into() }
    }

    pub fn param_validation(capability_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IntentParamValidation {
            capability_id: capability_id.into(),
            message: message.into(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Prefix the message with `context`, keeping the kind.
    ///
    /// `NullView` carries only the element id and is returned as is.
    #[must_use]
    pub fn context(mut self, context: impl fmt::Display) -> Self {
        match &mut self {
            Self::IllegalArgument { message }
            | Self::IllegalState { message }
            | Self::NotQualified { message, .. }
            | Self::NullProvider { message }
            | Self::NullCapability { message }
            | Self::IntentParamValidation { message, .. }
            | Self::Persistence { message }
            | Self::Config { message } => *message = format!("{context}: {message}"),
            Self::NullView { .. } => {}
        }
        self
    }

    /// Error family.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::IllegalArgument { .. } => ErrorKind::IllegalArgument,
            Self::IllegalState { .. } => ErrorKind::IllegalState,
            Self::NotQualified { .. } => ErrorKind::NotQualified,
            Self::NullProvider { .. } => ErrorKind::NullProvider,
            Self::NullCapability { .. } => ErrorKind::NullCapability,
            Self::NullView { .. } => ErrorKind::NullView,
            Self::IntentParamValidation { .. } => ErrorKind::IntentParamValidation,
            Self::Persistence { .. } => ErrorKind::Persistence,
            Self::Config { .. } => ErrorKind::Config,
        }
    }
}

impl fmt::Display for WorkbenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.kind();
        match self {
            Self::IllegalArgument { message }
            | Self::IllegalState { message }
            | Self::NullProvider { message }
            | Self::NullCapability { message }
            | Self::Persistence { message }
            | Self::Config { message } => write!(f, "[{kind}] {message}"),
            Self::NotQualified { app, message } => {
                write!(f, "[{kind}] application '{app}' is not qualified: {message}")
            }
            Self::NullView { id } => write!(f, "[{kind}] element '{id}' not found"),
            Self::IntentParamValidation {
                capability_id,
                message,
            } => write!(f, "[{kind}] capability '{capability_id}': {message}"),
        }
    }
}

impl std::error::Error for WorkbenchError {}

impl From<serde_json::Error> for WorkbenchError {
    fn from(err: serde_json::Error) -> Self {
        Self::persistence(err.to_string())
    }
}
