use thiserror::Error;

#[derive(Error, Debug)]
pub enum IssueGraphError {
    #[error("graph error: {0}")]
    Graph(String),

    #[error("analysis cancelled: {0}")]
    Cancelled(String),

    #[error("metric failed: {0}")]
    Metric(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, IssueGraphError>;
