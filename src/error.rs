use http::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Resource not found: {kind} {name} in namespace {namespace}")]
    NotFound {
        kind: String,
        name: String,
        namespace: String,
    },

    #[error("Resource already exists: {kind} {name} in namespace {namespace}")]
    AlreadyExists {
        kind: String,
        name: String,
        namespace: String,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Failure returned by a reactor registered by the test harness.
    #[error("Injected error: {0}")]
    Injected(String),

    /// The dispatcher produced a value that does not decode into the requested kind.
    #[error("Result is not a {kind}: {source}")]
    TypeMismatch {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Resource {resource} is not registered")]
    UnknownResource { resource: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON patch error: {0}")]
    PatchError(#[from] json_patch::PatchError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub(crate) fn not_found(kind: &str, namespace: &str, name: &str) -> Self {
        Error::NotFound {
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
        }
    }

    /// HTTP status the API server would answer with for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound { .. } | Error::UnknownResource { .. } => StatusCode::NOT_FOUND,
            Error::AlreadyExists { .. } => StatusCode::CONFLICT,
            Error::InvalidRequest(_) | Error::PatchError(_) | Error::YamlError(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine readable reason, as found in a Kubernetes `Status` object
    pub fn reason(&self) -> &'static str {
        match self {
            Error::NotFound { .. } | Error::UnknownResource { .. } => "NotFound",
            Error::AlreadyExists { .. } => "AlreadyExists",
            Error::InvalidRequest(_) | Error::PatchError(_) | Error::YamlError(_) => "BadRequest",
            _ => "InternalError",
        }
    }
}
