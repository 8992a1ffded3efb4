use thiserror::Error;

/// Failure of a single cluster or context query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("fetch failed: {0}")]
    Other(String),
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound(_))
    }

    /// HTTP-style code carried by the error, 404 for not-found.
    pub fn code(&self) -> u16 {
        match self {
            FetchError::NotFound(_) => 404,
            FetchError::Other(_) => 500,
        }
    }
}

impl From<kube::Error> for FetchError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 404 => FetchError::NotFound(ae.message),
            other => FetchError::Other(other.to_string()),
        }
    }
}

/// Request-level failures surfaced to the command dispatcher.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("No contexts found")]
    NoContextsFound,

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to load {location}: {message}")]
    Load { location: String, message: String },

    #[error("invalid resource document: {0}")]
    InvalidDocument(String),

    #[error("no parameter named {0} was supplied")]
    MissingParameter(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}
