use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown parameter value type: {0}")]
    UnknownValueType(String),

    #[error("parameter {0} is not in the catalog")]
    UnknownParameter(i32),

    #[error("catalog source failed: {0}")]
    Source(String),

    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid YAML document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),
}
