use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("kube error: {0}")]
    Kube(#[source] kube::Error),

    /// Optimistic-concurrency rejection from the API server (HTTP 409 on replace).
    #[error("conflict writing {kind} {name}: {message}")]
    Conflict { kind: &'static str, name: String, message: String },

    #[error("cleanup failed for {name}: {source}")]
    Cleanup { name: String, #[source] source: BoxError },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{kind} {name} is missing metadata.{field}")]
    MissingObjectKey { kind: &'static str, name: String, field: &'static str },

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Whether re-invoking reconciliation may succeed without user action.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube(kube::Error::Api(ae)) => ae.code == 429 || ae.code >= 500,
            Error::Kube(_) | Error::Conflict { .. } | Error::Cleanup { .. } => true,
            Error::Serialization(_) | Error::MissingObjectKey { .. } | Error::Config(_) => false,
        }
    }

    pub fn metric_label(&self) -> &'static str {
        match self {
            Error::Kube(_) => "kube",
            Error::Conflict { .. } => "conflict",
            Error::Cleanup { .. } => "cleanup",
            Error::Serialization(_) => "serialization",
            Error::MissingObjectKey { .. } => "missing_object_key",
            Error::Config(_) => "config",
        }
    }
}

impl From<kube::Error> for Error {
    fn from(e: kube::Error) -> Self { Error::Kube(e) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::error::ErrorResponse;

    fn api(code: u16) -> Error {
        Error::Kube(kube::Error::Api(ErrorResponse { status: "Failure".into(), message: "m".into(), reason: "r".into(), code }))
    }

    #[test]
    fn retryable_classification() {
        assert!(api(500).is_retryable());
        assert!(api(429).is_retryable());
        assert!(!api(403).is_retryable());
        assert!(Error::Conflict { kind: "MySQL", name: "a".into(), message: "stale".into() }.is_retryable());
        assert!(!Error::Config("bad".into()).is_retryable());
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(api(500).metric_label(), "kube");
        assert_eq!(Error::Config("x".into()).metric_label(), "config");
    }
}
