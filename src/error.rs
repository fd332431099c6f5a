use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("a pod name and a label selector cannot be used together")]
    InvalidSelector,
    #[error("no pods found in namespace {namespace}")]
    NotFound { namespace: String },
    #[error("pod {namespace}/{name} not found")]
    PodNotFound { namespace: String, name: String },
    #[error("{context}")]
    Upstream {
        context: String,
        #[source]
        source: kube::Error,
    },
    #[error("unknown sort column: {0}")]
    UnknownSortColumn(String),
    #[error("row has {actual} cells but the table expects {expected}")]
    MalformedRow { expected: usize, actual: usize },
    #[error("column {index} is out of bounds for a table with {len} columns")]
    ColumnOutOfBounds { index: usize, len: usize },
    #[error("failed to build rows for {pod}/{container}")]
    Traversal {
        pod: String,
        container: String,
        #[source]
        source: Box<ReportError>,
    },
}

impl ReportError {
    pub fn upstream(context: impl Into<String>, source: kube::Error) -> Self {
        Self::Upstream {
            context: context.into(),
            source,
        }
    }

    /// Attaches the pod and container a failure happened on.
    pub fn within(self, pod: &str, container: &str) -> Self {
        Self::Traversal {
            pod: pod.to_string(),
            container: container.to_string(),
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
