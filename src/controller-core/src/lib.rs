use std::fmt;
use thiserror::Error;

/// Remote operation a failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Get,
    Update,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Operation::List => "list",
            Operation::Get => "get",
            Operation::Update => "update",
        };
        f.write_str(op)
    }
}

/// Identity of a namespaced object addressed by a remote call
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(kind: impl Into<String>, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("RemoteUnavailable during {operation}: {source}")]
    RemoteUnavailable {
        operation: Operation,
        #[source]
        source: kube::Error,
    },

    #[error("{0} not found")]
    NotFound(ObjectKey),

    #[error("Conflict: {0} was modified between read and write")]
    Conflict(ObjectKey),

    #[error("{0} has no pod template")]
    MissingTemplate(ObjectKey),

    #[error("Kube Error: {0}")]
    KubeError(#[source] kube::Error),

    #[error("Kubeconfig Error: {0}")]
    KubeconfigError(#[source] kube::config::KubeconfigError),

    #[error("InferConfig Error: {0}")]
    InferConfigError(#[source] kube::config::InferConfigError),

    #[error("Metrics Error: {0}")]
    MetricsError(#[source] prometheus::Error),

    #[error("Telemetry Error: {0}")]
    TelemetryError(String),
}
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Failure of a call that is not addressed to a single object (e.g. listing)
    pub fn remote(operation: Operation, source: kube::Error) -> Self {
        Error::RemoteUnavailable { operation, source }
    }

    /// Classifies an API failure on a single object by its status code
    pub fn from_kube(operation: Operation, target: ObjectKey, source: kube::Error) -> Self {
        match source {
            kube::Error::Api(ref response) if response.code == 404 => Error::NotFound(target),
            kube::Error::Api(ref response) if response.code == 409 => Error::Conflict(target),
            source => Error::RemoteUnavailable { operation, source },
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    pub fn metric_label(&self) -> String {
        let label = match self {
            Error::RemoteUnavailable { operation, .. } => return format!("remoteunavailable_{operation}"),
            Error::NotFound(_) => "notfound",
            Error::Conflict(_) => "conflict",
            Error::MissingTemplate(_) => "missingtemplate",
            Error::KubeError(_) => "kubeerror",
            Error::KubeconfigError(_) => "kubeconfigerror",
            Error::InferConfigError(_) => "inferconfigerror",
            Error::MetricsError(_) => "metricserror",
            Error::TelemetryError(_) => "telemetryerror",
        };
        label.to_string()
    }
}

/// Log and trace integrations
pub mod telemetry;

/// Metrics
mod metrics;
pub use metrics::Metrics;
